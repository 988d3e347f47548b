//! Read-only views of collaborators owned by other services.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PlanId, UserId};

/// A purchasable subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub description: Option<String>,
    /// Price in whole currency units.
    pub price: i64,
    pub duration_days: i64,
}

impl Plan {
    /// The canonical free-plan rule: a plan is free exactly when it costs nothing.
    pub fn is_free(&self) -> bool {
        self.price == 0
    }
}

/// The buyer as seen by billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
}
