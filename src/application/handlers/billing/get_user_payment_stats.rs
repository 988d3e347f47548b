//! GetUserPaymentStatsHandler - Query handler for a user's payment statistics.

use std::sync::Arc;

use crate::domain::billing::{BillingError, PaymentStats};
use crate::domain::foundation::UserId;
use crate::ports::BillingReader;

#[derive(Debug, Clone)]
pub struct GetUserPaymentStatsQuery {
    pub user_id: UserId,
}

pub struct GetUserPaymentStatsHandler {
    reader: Arc<dyn BillingReader>,
}

impl GetUserPaymentStatsHandler {
    pub fn new(reader: Arc<dyn BillingReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(&self, query: GetUserPaymentStatsQuery) -> Result<PaymentStats, BillingError> {
        let payments = self.reader.list_user_payments(&query.user_id).await?;
        Ok(PaymentStats::from_payments(&payments))
    }
}
