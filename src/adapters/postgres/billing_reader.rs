//! PostgreSQL implementation of the BillingReader port.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::billing::{OrderCode, Payment, PaymentLog, UserSubscription};
use crate::domain::foundation::{DomainError, PaymentId, SubscriptionId, Timestamp, UserId};
use crate::ports::BillingReader;

use super::rows::{
    db_error, PaymentLogRow, PaymentRow, SubscriptionRow, LOG_COLUMNS, PAYMENT_COLUMNS,
    SUBSCRIPTION_COLUMNS,
};

pub struct PostgresBillingReader {
    pool: PgPool,
}

impl PostgresBillingReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingReader for PostgresBillingReader {
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE id = $1 AND deleted_at IS NULL",
            PAYMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_payment_by_order_code(
        &self,
        order_code: OrderCode,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE order_code = $1 AND deleted_at IS NULL",
            PAYMENT_COLUMNS
        ))
        .bind(order_code.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<UserSubscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM user_subscriptions WHERE id = $1 AND deleted_at IS NULL",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(UserSubscription::try_from).transpose()
    }

    async fn list_payment_logs(&self, payment_id: PaymentId) -> Result<Vec<PaymentLog>, DomainError> {
        let rows: Vec<PaymentLogRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_logs WHERE payment_id = $1 ORDER BY created_at ASC",
            LOG_COLUMNS
        ))
        .bind(payment_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list payment logs", e))?;

        rows.into_iter().map(PaymentLog::try_from).collect()
    }

    async fn list_user_payments(&self, user_id: &UserId) -> Result<Vec<Payment>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments \
             WHERE user_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list payments", e))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn find_stale_pending_payments(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments \
             WHERE status = 'pending' AND deleted_at IS NULL AND created_at < $1 \
             ORDER BY created_at ASC \
             LIMIT $2",
            PAYMENT_COLUMNS
        ))
        .bind(cutoff.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find stale payments", e))?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}
