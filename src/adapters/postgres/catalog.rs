//! PostgreSQL implementations of the PlanCatalog and UserDirectory ports.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::billing::{Plan, UserProfile};
use crate::domain::foundation::{DomainError, PlanId, UserId};
use crate::ports::{PlanCatalog, UserDirectory};

use super::rows::{db_error, PlanRow, UserRow};

pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanCatalog for PostgresCatalog {
    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, price, duration_days
            FROM subscription_plans
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find plan", e))?;

        Ok(row.map(Plan::from))
    }

    async fn find_free_plan(&self) -> Result<Option<Plan>, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, price, duration_days
            FROM subscription_plans
            WHERE price = 0 AND deleted_at IS NULL
            ORDER BY name ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find free plan", e))?;

        Ok(row.map(Plan::from))
    }
}

#[async_trait]
impl UserDirectory for PostgresCatalog {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, name FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find user", e))?;

        row.map(UserProfile::try_from).transpose()
    }
}
