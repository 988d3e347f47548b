//! GetPaymentDetailsHandler - Query handler for one payment with its context.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{BillingError, Payment, PaymentLog, Plan, UserProfile, UserSubscription};
use crate::domain::foundation::{PaymentId, UserId};
use crate::ports::{BillingReader, PlanCatalog, UserDirectory};

#[derive(Debug, Clone)]
pub struct GetPaymentDetailsQuery {
    pub user_id: UserId,
    pub payment_id: PaymentId,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetPaymentDetailsResult {
    pub payment: Payment,
    pub subscription: Option<UserSubscription>,
    pub plan: Option<Plan>,
    pub user: Option<UserProfile>,
    /// Ledger entries, oldest first.
    pub logs: Vec<PaymentLog>,
}

pub struct GetPaymentDetailsHandler {
    reader: Arc<dyn BillingReader>,
    plans: Arc<dyn PlanCatalog>,
    users: Arc<dyn UserDirectory>,
}

impl GetPaymentDetailsHandler {
    pub fn new(
        reader: Arc<dyn BillingReader>,
        plans: Arc<dyn PlanCatalog>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            reader,
            plans,
            users,
        }
    }

    pub async fn handle(
        &self,
        query: GetPaymentDetailsQuery,
    ) -> Result<GetPaymentDetailsResult, BillingError> {
        let payment = self
            .reader
            .find_payment(query.payment_id)
            .await?
            .ok_or_else(|| BillingError::not_found("payment", query.payment_id))?;

        if payment.user_id != query.user_id {
            return Err(BillingError::forbidden("You do not have access to this payment"));
        }

        let subscription = self.reader.find_subscription(payment.subscription_id).await?;
        let plan = match &subscription {
            Some(s) => self.plans.find_plan(s.plan_id).await?,
            None => None,
        };
        let user = self.users.find_user(&payment.user_id).await?;
        let logs = self.reader.list_payment_logs(payment.id).await?;

        Ok(GetPaymentDetailsResult {
            payment,
            subscription,
            plan,
            user,
            logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Fixture;
    use crate::domain::foundation::{ErrorCode, Timestamp};

    #[tokio::test]
    async fn returns_payment_with_context() {
        let fx = Fixture::new().await;
        let (sub, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let result = fx
            .details_handler()
            .handle(GetPaymentDetailsQuery {
                user_id: fx.user.id.clone(),
                payment_id: payment.id,
            })
            .await
            .unwrap();

        assert_eq!(result.payment.id, payment.id);
        assert_eq!(result.subscription.map(|s| s.id), Some(sub.id));
        assert_eq!(result.plan.map(|p| p.id), Some(fx.premium.id));
        assert_eq!(result.user.map(|u| u.email), Some(fx.user.email.clone()));
        assert_eq!(result.logs.len(), 1);
    }

    #[tokio::test]
    async fn only_owner_may_read() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let err = fx
            .details_handler()
            .handle(GetPaymentDetailsQuery {
                user_id: UserId::new("intruder").unwrap(),
                payment_id: payment.id,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn missing_payment_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .details_handler()
            .handle(GetPaymentDetailsQuery {
                user_id: fx.user.id.clone(),
                payment_id: PaymentId::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentNotFound);
    }
}
