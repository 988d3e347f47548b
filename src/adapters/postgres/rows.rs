//! Row types shared by the billing store and reader.
//!
//! Rows hold raw column values; `TryFrom` converts them into domain types and
//! reports malformed data as `DatabaseError`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::billing::{
    OrderCode, Payment, PaymentLog, PaymentStatus, Plan, ProviderKind, SubscriptionStatus,
    UserProfile, UserSubscription,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, PaymentLogId, PlanId, SubscriptionId, Timestamp, UserId,
};

pub(super) const PAYMENT_COLUMNS: &str = "id, user_id, subscription_id, amount, currency, provider, \
     order_code, status, created_at, updated_at, deleted_at";

pub(super) const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, start_date, end_date, status, \
     auto_renew, activated_at, created_at, updated_at, deleted_at";

pub(super) const LOG_COLUMNS: &str = "id, payment_id, status, description, created_at";

pub(super) fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::database(format!("{}: {}", context, err))
}

fn parse_column<T: FromStr>(column: &str, raw: &str) -> Result<T, DomainError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid {} value '{}': {}", column, raw, e))
    })
}

fn parse_user_id(raw: String) -> Result<UserId, DomainError> {
    UserId::new(raw)
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e)))
}

fn ts(dt: DateTime<Utc>) -> Timestamp {
    Timestamp::from_datetime(dt)
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PaymentRow {
    id: Uuid,
    user_id: String,
    subscription_id: Uuid,
    amount: i64,
    currency: String,
    provider: String,
    order_code: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            user_id: parse_user_id(row.user_id)?,
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            amount: row.amount,
            currency: row.currency,
            provider: parse_column::<ProviderKind>("provider", &row.provider)?,
            order_code: OrderCode::new(row.order_code).map_err(DomainError::from)?,
            status: parse_column::<PaymentStatus>("status", &row.status)?,
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
            deleted_at: row.deleted_at.map(ts),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    plan_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    auto_renew: bool,
    activated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriptionRow> for UserSubscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(UserSubscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: parse_user_id(row.user_id)?,
            plan_id: PlanId::from_uuid(row.plan_id),
            start_date: ts(row.start_date),
            end_date: ts(row.end_date),
            status: parse_column::<SubscriptionStatus>("status", &row.status)?,
            auto_renew: row.auto_renew,
            activated_at: row.activated_at.map(ts),
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
            deleted_at: row.deleted_at.map(ts),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PaymentLogRow {
    id: Uuid,
    payment_id: Uuid,
    status: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentLogRow> for PaymentLog {
    type Error = DomainError;

    fn try_from(row: PaymentLogRow) -> Result<Self, Self::Error> {
        Ok(PaymentLog {
            id: PaymentLogId::from_uuid(row.id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            status: parse_column::<PaymentStatus>("status", &row.status)?,
            description: row.description,
            created_at: ts(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PlanRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    duration_days: i32,
}

impl From<PlanRow> for Plan {
    fn from(row: PlanRow) -> Self {
        Plan {
            id: PlanId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            duration_days: i64::from(row.duration_days),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserRow {
    id: String,
    email: String,
    name: Option<String>,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            id: parse_user_id(row.id)?,
            email: row.email,
            name: row.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_row(status: &str, provider: &str, order_code: i64) -> PaymentRow {
        let now = Utc::now();
        PaymentRow {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            subscription_id: Uuid::new_v4(),
            amount: 99_000,
            currency: "VND".to_string(),
            provider: provider.to_string(),
            order_code,
            status: status.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn payment_row_converts_to_domain() {
        let payment = Payment::try_from(payment_row("completed", "payos", 42)).unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.provider, ProviderKind::Payos);
        assert_eq!(payment.order_code.value(), 42);
        assert_eq!(payment.user_id.as_str(), "user-1");
    }

    #[test]
    fn payment_row_with_unknown_status_is_database_error() {
        let err = Payment::try_from(payment_row("refunded", "payos", 42)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn payment_row_with_unknown_provider_is_database_error() {
        let err = Payment::try_from(payment_row("pending", "cash", 42)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn subscription_row_keeps_activation_time() {
        let now = Utc::now();
        let row = SubscriptionRow {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            plan_id: Uuid::new_v4(),
            start_date: now,
            end_date: now + chrono::Duration::days(30),
            status: "canceled".to_string(),
            auto_renew: false,
            activated_at: Some(now),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let sub = UserSubscription::try_from(row).unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.activated_at, Some(Timestamp::from_datetime(now)));
    }

    #[test]
    fn empty_user_id_is_rejected() {
        let row = UserRow {
            id: String::new(),
            email: "a@example.com".to_string(),
            name: None,
        };
        assert!(UserProfile::try_from(row).is_err());
    }

    #[test]
    fn plan_row_widens_duration() {
        let plan = Plan::from(PlanRow {
            id: Uuid::new_v4(),
            name: "Premium".to_string(),
            description: None,
            price: 99_000,
            duration_days: 30,
        });
        assert_eq!(plan.duration_days, 30);
    }
}
