//! Collaborator ports for data owned by other services.

use async_trait::async_trait;

use crate::domain::billing::{Plan, UserProfile};
use crate::domain::foundation::{DomainError, PlanId, UserId};

/// Subscription plan catalog.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError>;

    /// The designated free plan: the plan priced at zero.
    async fn find_free_plan(&self) -> Result<Option<Plan>, DomainError>;
}

/// User lookup.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserProfile>, DomainError>;
}
