//! CancelPaymentIntentHandler - Buyer-initiated cancel via the checkout redirect.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{
    Abandonment, BillingError, OrderCode, PaymentLog, PaymentStatus, RestorationPolicy,
};
use crate::domain::foundation::{PaymentId, Timestamp};
use crate::ports::{BillingReader, BillingStore, PaymentGateway};

use super::intent_resolution::resolve_intent;
use super::subscription_lifecycle::{RestoreOutcome, SubscriptionLifecycle};

#[derive(Debug, Clone)]
pub struct CancelPaymentIntentCommand {
    pub order_code: OrderCode,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelPaymentIntentResult {
    pub payment_id: PaymentId,
    pub order_code: OrderCode,
    pub status: PaymentStatus,
    pub restoration: Option<RestoreOutcome>,
}

pub struct CancelPaymentIntentHandler {
    store: Arc<dyn BillingStore>,
    reader: Arc<dyn BillingReader>,
    gateway: Arc<dyn PaymentGateway>,
    lifecycle: SubscriptionLifecycle,
    policy: RestorationPolicy,
}

impl CancelPaymentIntentHandler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        reader: Arc<dyn BillingReader>,
        gateway: Arc<dyn PaymentGateway>,
        lifecycle: SubscriptionLifecycle,
        policy: RestorationPolicy,
    ) -> Self {
        Self {
            store,
            reader,
            gateway,
            lifecycle,
            policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelPaymentIntentCommand,
    ) -> Result<CancelPaymentIntentResult, BillingError> {
        let payment = self
            .reader
            .find_payment_by_order_code(cmd.order_code)
            .await?
            .ok_or_else(|| BillingError::not_found("payment", cmd.order_code))?;

        if !payment.is_pending() {
            return Err(BillingError::invalid_state(payment.status.as_str(), "cancel"));
        }

        let reason = cmd.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());

        if let Err(e) = self
            .gateway
            .cancel_link(payment.order_code, Some(reason.unwrap_or("Cancelled by user")))
            .await
        {
            tracing::warn!(
                order_code = %payment.order_code,
                error = %e,
                "Provider cancel failed, cancelling locally"
            );
        }

        let now = Timestamp::now();
        let mut tx = self.store.begin().await?;
        tx.lock_user(&payment.user_id).await?;
        let entry = PaymentLog::cancelled_by_user(payment.id, reason, now);
        if !resolve_intent(tx.as_mut(), &payment, entry, now).await? {
            // A webhook resolved it between the read and the update.
            return Err(BillingError::invalid_state("resolved", "cancel"));
        }
        tx.commit().await?;

        tracing::info!(order_code = %payment.order_code, "Payment cancelled by user");

        let restoration = if self.policy.applies_to(Abandonment::Cancelled) {
            Some(
                self.lifecycle
                    .restore_after_cancellation(&payment.user_id, payment.subscription_id)
                    .await,
            )
        } else {
            None
        };

        Ok(CancelPaymentIntentResult {
            payment_id: payment.id,
            order_code: payment.order_code,
            status: PaymentStatus::Cancelled,
            restoration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Fixture;
    use crate::domain::billing::SubscriptionStatus;
    use crate::domain::foundation::ErrorCode;

    fn command(order_code: OrderCode, reason: Option<&str>) -> CancelPaymentIntentCommand {
        CancelPaymentIntentCommand {
            order_code,
            reason: reason.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn cancels_pending_payment_and_restores() {
        let fx = Fixture::new().await;
        let (sub, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let result = fx
            .cancel_handler()
            .handle(command(payment.order_code, None))
            .await
            .unwrap();

        assert_eq!(result.status, PaymentStatus::Cancelled);
        assert!(matches!(result.restoration, Some(RestoreOutcome::FreePlanAssigned(_))));
        assert_eq!(fx.store.payment(payment.id).await.unwrap().status, PaymentStatus::Cancelled);
        assert_eq!(
            fx.store.subscription(sub.id).await.unwrap().status,
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            fx.store.logs_for(payment.id).await.last().unwrap().description,
            "Payment cancelled by user"
        );
        assert!(fx.gateway.was_called("cancel_link"));
    }

    #[tokio::test]
    async fn reason_is_recorded() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        fx.cancel_handler()
            .handle(command(payment.order_code, Some("Changed my mind")))
            .await
            .unwrap();

        assert_eq!(
            fx.store.logs_for(payment.id).await.last().unwrap().description,
            "Changed my mind"
        );
    }

    #[tokio::test]
    async fn completed_payment_cannot_be_cancelled() {
        let fx = Fixture::new().await;
        let (_, payment) = fx
            .seed_intent(fx.premium.id, PaymentStatus::Completed, Timestamp::now())
            .await;

        let err = fx
            .cancel_handler()
            .handle(command(payment.order_code, None))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
    }

    #[tokio::test]
    async fn unknown_order_code_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .cancel_handler()
            .handle(command(OrderCode::new(5).unwrap(), None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentNotFound);
    }
}
