//! PostgreSQL implementation of the BillingStore port.
//!
//! Each unit of work wraps a `sqlx::Transaction`. Status changes are
//! conditional `UPDATE ... WHERE status = ...` statements so concurrent
//! writers cannot both win, and `lock_user` takes a transaction-scoped
//! advisory lock keyed on the user id.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::billing::{
    OrderCode, Payment, PaymentLog, PaymentStatus, SubscriptionStatus, UserSubscription,
};
use crate::domain::foundation::{
    DomainError, PaymentId, PlanId, StateMachine, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{BillingStore, BillingTransaction, InsertOutcome};

use super::rows::{db_error, PaymentRow, SubscriptionRow, PAYMENT_COLUMNS, SUBSCRIPTION_COLUMNS};

pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;
        Ok(Box::new(PgBillingTransaction { tx }))
    }
}

/// Open unit of work. Dropping it without `commit` rolls back.
pub struct PgBillingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BillingTransaction for PgBillingTransaction {
    async fn lock_user(&mut self, user_id: &UserId) -> Result<(), DomainError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(user_id.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to lock user", e))?;
        Ok(())
    }

    async fn find_payment_by_order_code(
        &mut self,
        order_code: OrderCode,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE order_code = $1 AND deleted_at IS NULL FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(order_code.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to find payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_pending_payment_for_plan(
        &mut self,
        user_id: &UserId,
        plan_id: PlanId,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.user_id, p.subscription_id, p.amount, p.currency, p.provider,
                   p.order_code, p.status, p.created_at, p.updated_at, p.deleted_at
            FROM payments p
            JOIN user_subscriptions s ON s.id = p.subscription_id
            WHERE p.user_id = $1
              AND s.plan_id = $2
              AND p.status = 'pending'
              AND p.deleted_at IS NULL
            ORDER BY p.created_at DESC
            LIMIT 1
            FOR UPDATE OF p
            "#,
        )
        .bind(user_id.as_str())
        .bind(plan_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to find pending payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<InsertOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, subscription_id, amount, currency, provider,
                order_code, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (order_code) DO NOTHING
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_str())
        .bind(payment.subscription_id.as_uuid())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.provider.as_str())
        .bind(payment.order_code.value())
        .bind(payment.status.as_str())
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to insert payment", e))?;

        if result.rows_affected() == 0 {
            return Ok(InsertOutcome::DuplicateOrderCode);
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn transition_payment(
        &mut self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        from.transition_to(to)?;

        let result = sqlx::query(
            "UPDATE payments SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(now.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update payment status", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn append_log(&mut self, entry: &PaymentLog) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payment_logs (id, payment_id, status, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.payment_id.as_uuid())
        .bind(entry.status.as_str())
        .bind(&entry.description)
        .bind(entry.created_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to append payment log", e))?;
        Ok(())
    }

    async fn insert_subscription(
        &mut self,
        subscription: &UserSubscription,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_subscriptions (
                id, user_id, plan_id, start_date, end_date, status, auto_renew,
                activated_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_str())
        .bind(subscription.plan_id.as_uuid())
        .bind(subscription.start_date.as_datetime())
        .bind(subscription.end_date.as_datetime())
        .bind(subscription.status.as_str())
        .bind(subscription.auto_renew)
        .bind(subscription.activated_at.map(|t| *t.as_datetime()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to insert subscription", e))?;
        Ok(())
    }

    async fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<UserSubscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM user_subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(UserSubscription::try_from).transpose()
    }

    async fn find_user_subscriptions(
        &mut self,
        user_id: &UserId,
    ) -> Result<Vec<UserSubscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM user_subscriptions \
             WHERE user_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to list subscriptions", e))?;

        rows.into_iter().map(UserSubscription::try_from).collect()
    }

    async fn transition_subscription(
        &mut self,
        id: SubscriptionId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        for status in from {
            status.transition_to(to)?;
        }
        let from: Vec<&str> = from.iter().map(SubscriptionStatus::as_str).collect();

        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions SET
                status = $3::text,
                updated_at = $4,
                activated_at = CASE
                    WHEN $3::text = 'active' THEN COALESCE(activated_at, $4)
                    ELSE activated_at
                END
            WHERE id = $1 AND status = ANY($2)
            "#,
        )
        .bind(id.as_uuid())
        .bind(&from)
        .bind(to.as_str())
        .bind(now.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update subscription status", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel_other_subscriptions(
        &mut self,
        user_id: &UserId,
        except: SubscriptionId,
        now: Timestamp,
    ) -> Result<Vec<SubscriptionId>, DomainError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE user_subscriptions SET status = 'canceled', updated_at = $3
            WHERE user_id = $1
              AND id <> $2
              AND deleted_at IS NULL
              AND status IN ('active', 'pending')
            RETURNING id
            "#,
        )
        .bind(user_id.as_str())
        .bind(except.as_uuid())
        .bind(now.as_datetime())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to cancel subscriptions", e))?;

        Ok(ids.into_iter().map(|(id,)| SubscriptionId::from_uuid(id)).collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }
}
