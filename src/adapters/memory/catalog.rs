//! In-memory plan catalog and user directory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::{Plan, UserProfile};
use crate::domain::foundation::{DomainError, PlanId, UserId};
use crate::ports::{PlanCatalog, UserDirectory};

/// Plans and users held in memory. Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    plans: Arc<RwLock<HashMap<PlanId, Plan>>>,
    users: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_plan(&self, plan: Plan) {
        self.plans.write().await.insert(plan.id, plan);
    }

    pub async fn add_user(&self, user: UserProfile) {
        self.users
            .write()
            .await
            .insert(user.id.as_str().to_string(), user);
    }
}

#[async_trait]
impl PlanCatalog for InMemoryCatalog {
    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError> {
        Ok(self.plans.read().await.get(&id).cloned())
    }

    async fn find_free_plan(&self) -> Result<Option<Plan>, DomainError> {
        let plans = self.plans.read().await;
        // Deterministic pick when several zero-priced plans exist.
        Ok(plans
            .values()
            .filter(|p| p.is_free())
            .min_by(|a, b| a.name.cmp(&b.name))
            .cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryCatalog {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        Ok(self.users.read().await.get(id.as_str()).cloned())
    }
}
