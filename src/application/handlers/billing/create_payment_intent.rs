//! CreatePaymentIntentHandler - Opens a purchase attempt and its checkout link.
//!
//! A purchase attempt creates a pending subscription and a pending payment in
//! one transaction, superseding any earlier pending attempt for the same plan.
//! The provider is only contacted after the transaction commits.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{BillingError, OrderCode, Payment, PaymentLog, Plan, UserProfile, UserSubscription};
use crate::domain::foundation::{PaymentId, PlanId, SubscriptionId, Timestamp, UserId};
use crate::ports::{
    BillingStore, BillingTransaction, CheckoutItem, CheckoutRequest, InsertOutcome, PaymentGateway,
    PlanCatalog, UserDirectory,
};

use super::intent_resolution::resolve_intent;

/// Fresh order codes tried before giving up on a collision streak.
const MAX_ORDER_CODE_ATTEMPTS: usize = 5;

const DESCRIPTION_PREFIX: &str = "Gói";
const DESCRIPTION_NAME_CHARS: usize = 20;
const ITEM_NAME_CHARS: usize = 50;

/// Command to start a purchase.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntentCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub return_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub id: PlanId,
    pub name: String,
    pub price: i64,
    pub duration_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
}

/// Result of a successfully opened purchase attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentIntentResult {
    pub order_code: OrderCode,
    pub payment_id: PaymentId,
    pub subscription_id: SubscriptionId,
    pub amount: i64,
    pub checkout_url: String,
    pub qr_code: String,
    pub plan: PlanSummary,
    pub user: UserSummary,
}

/// Base URLs used when the caller does not supply redirect targets.
#[derive(Debug, Clone)]
pub struct CheckoutUrlDefaults {
    /// Frontend origin, for the success redirect.
    pub client_url: String,
    /// Public origin of this service, for the cancel callback.
    pub public_url: String,
}

impl CheckoutUrlDefaults {
    pub fn return_url(&self) -> String {
        format!("{}/payment/success", self.client_url.trim_end_matches('/'))
    }

    pub fn cancel_url(&self, order_code: OrderCode) -> String {
        format!(
            "{}/api/payments/cancel-callback/{}",
            self.public_url.trim_end_matches('/'),
            order_code
        )
    }
}

/// Handler for opening purchase attempts.
pub struct CreatePaymentIntentHandler {
    store: Arc<dyn BillingStore>,
    plans: Arc<dyn PlanCatalog>,
    users: Arc<dyn UserDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    urls: CheckoutUrlDefaults,
}

impl CreatePaymentIntentHandler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        plans: Arc<dyn PlanCatalog>,
        users: Arc<dyn UserDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        urls: CheckoutUrlDefaults,
    ) -> Self {
        Self {
            store,
            plans,
            users,
            gateway,
            urls,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreatePaymentIntentCommand,
    ) -> Result<CreatePaymentIntentResult, BillingError> {
        // 1. Collaborators
        let plan = self
            .plans
            .find_plan(cmd.plan_id)
            .await?
            .ok_or_else(|| BillingError::not_found("plan", cmd.plan_id))?;

        if plan.is_free() {
            return Err(BillingError::validation(
                "plan_id",
                "The free plan cannot be purchased",
            ));
        }

        let user = self
            .users
            .find_user(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::not_found("user", &cmd.user_id))?;

        // 2. Local records, atomically
        let now = Timestamp::now();
        let mut tx = self.store.begin().await?;
        let opened = self.open_intent(tx.as_mut(), &user, &plan, now).await?;
        tx.commit().await?;

        self.cancel_superseded_links(&opened.superseded).await;
        let OpenedIntent {
            subscription,
            payment,
            ..
        } = opened;

        tracing::info!(
            user_id = %user.id,
            plan_id = %plan.id,
            order_code = %payment.order_code,
            amount = payment.amount,
            "Payment intent created"
        );

        // 3. Provider link
        let request = self.checkout_request(&cmd, &user, &plan, &payment);
        let link = self.gateway.create_link(request).await.map_err(|e| {
            tracing::error!(
                order_code = %payment.order_code,
                error = %e,
                "Failed to create checkout link, intent left pending"
            );
            BillingError::from(e)
        })?;

        Ok(CreatePaymentIntentResult {
            order_code: payment.order_code,
            payment_id: payment.id,
            subscription_id: subscription.id,
            amount: payment.amount,
            checkout_url: link.checkout_url,
            qr_code: link.qr_code,
            plan: PlanSummary {
                id: plan.id,
                name: plan.name,
                price: plan.price,
                duration_days: plan.duration_days,
            },
            user: UserSummary {
                id: user.id,
                email: user.email,
                name: user.name,
            },
        })
    }

    async fn open_intent(
        &self,
        tx: &mut dyn BillingTransaction,
        user: &UserProfile,
        plan: &Plan,
        now: Timestamp,
    ) -> Result<OpenedIntent, BillingError> {
        tx.lock_user(&user.id).await?;

        let existing = tx.find_user_subscriptions(&user.id).await?;
        if existing
            .iter()
            .any(|s| s.plan_id == plan.id && s.grants_access(&now))
        {
            return Err(BillingError::already_subscribed(plan.id));
        }

        let mut superseded = Vec::new();
        while let Some(pending) = tx.find_pending_payment_for_plan(&user.id, plan.id).await? {
            if !resolve_intent(tx, &pending, PaymentLog::superseded(pending.id, now), now).await? {
                break;
            }
            tracing::info!(
                order_code = %pending.order_code,
                "Superseded pending payment"
            );
            superseded.push(pending.order_code);
        }

        let subscription =
            UserSubscription::new_pending(user.id.clone(), plan.id, plan.duration_days, now);
        tx.insert_subscription(&subscription).await?;

        let mut inserted = None;
        for _ in 0..MAX_ORDER_CODE_ATTEMPTS {
            let payment = Payment::new_pending(
                user.id.clone(),
                subscription.id,
                plan.price,
                OrderCode::generate(&Timestamp::now()),
                now,
            );
            match tx.insert_payment(&payment).await? {
                InsertOutcome::Inserted => {
                    inserted = Some(payment);
                    break;
                }
                InsertOutcome::DuplicateOrderCode => {
                    tracing::warn!(order_code = %payment.order_code, "Order code collision, retrying");
                }
            }
        }
        let payment = inserted.ok_or_else(|| {
            BillingError::infrastructure("Could not allocate a unique order code")
        })?;

        tx.append_log(&PaymentLog::initiated(payment.id, &plan.name, now))
            .await?;

        Ok(OpenedIntent {
            subscription,
            payment,
            superseded,
        })
    }

    async fn cancel_superseded_links(&self, order_codes: &[OrderCode]) {
        for order_code in order_codes {
            if let Err(e) = self
                .gateway
                .cancel_link(*order_code, Some("Creating new payment link"))
                .await
            {
                tracing::warn!(
                    order_code = %order_code,
                    error = %e,
                    "Failed to cancel superseded payment link"
                );
            }
        }
    }

    fn checkout_request(
        &self,
        cmd: &CreatePaymentIntentCommand,
        user: &UserProfile,
        plan: &Plan,
        payment: &Payment,
    ) -> CheckoutRequest {
        CheckoutRequest {
            order_code: payment.order_code,
            amount: payment.amount,
            description: format!(
                "{} {}",
                DESCRIPTION_PREFIX,
                truncate_chars(&plan.name, DESCRIPTION_NAME_CHARS)
            ),
            items: vec![CheckoutItem {
                name: truncate_chars(&plan.name, ITEM_NAME_CHARS),
                quantity: 1,
                price: payment.amount,
            }],
            buyer_name: user.name.clone(),
            buyer_email: Some(user.email.clone()),
            return_url: non_blank(cmd.return_url.as_deref())
                .unwrap_or_else(|| self.urls.return_url()),
            cancel_url: non_blank(cmd.cancel_url.as_deref())
                .unwrap_or_else(|| self.urls.cancel_url(payment.order_code)),
        }
    }
}

struct OpenedIntent {
    subscription: UserSubscription,
    payment: Payment,
    superseded: Vec<OrderCode>,
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
