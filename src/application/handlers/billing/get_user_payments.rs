//! GetUserPaymentsHandler - Query handler for a user's payment history.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Payment};
use crate::domain::foundation::UserId;
use crate::ports::BillingReader;

#[derive(Debug, Clone)]
pub struct GetUserPaymentsQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct GetUserPaymentsResult {
    /// Newest first.
    pub payments: Vec<Payment>,
}

pub struct GetUserPaymentsHandler {
    reader: Arc<dyn BillingReader>,
}

impl GetUserPaymentsHandler {
    pub fn new(reader: Arc<dyn BillingReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(&self, query: GetUserPaymentsQuery) -> Result<GetUserPaymentsResult, BillingError> {
        let payments = self.reader.list_user_payments(&query.user_id).await?;
        Ok(GetUserPaymentsResult { payments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Fixture;
    use crate::domain::foundation::Timestamp;

    #[tokio::test]
    async fn lists_only_own_payments_newest_first() {
        let fx = Fixture::new().await;
        let now = Timestamp::now();
        let (_, older) = fx.seed_pending_intent(fx.premium.id, now.minus_minutes(10)).await;
        let (_, newer) = fx.seed_pending_intent(fx.premium.id, now).await;

        let result = GetUserPaymentsHandler::new(fx.reader())
            .handle(GetUserPaymentsQuery {
                user_id: fx.user.id.clone(),
            })
            .await
            .unwrap();

        let ids: Vec<_> = result.payments.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let other = GetUserPaymentsHandler::new(fx.reader())
            .handle(GetUserPaymentsQuery {
                user_id: UserId::new("other").unwrap(),
            })
            .await
            .unwrap();
        assert!(other.payments.is_empty());
    }
}
