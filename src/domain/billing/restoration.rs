//! Policy for restoring entitlement after a purchase attempt is abandoned.

use serde::{Deserialize, Serialize};

/// Why a pending purchase ended without payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Abandonment {
    /// Buyer cancelled, via webhook or the cancel redirect.
    Cancelled,
    /// Provider reported a failure.
    Failed,
    /// No notification arrived before the sweep threshold.
    TimedOut,
}

/// Which abandonment kinds trigger restoration.
///
/// Restoration is a no-op for users who still hold a valid active
/// subscription, so enabling it only affects users left without access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorationPolicy {
    pub on_cancel: bool,
    pub on_failure: bool,
    pub on_timeout: bool,
}

impl RestorationPolicy {
    /// Restores on every abandonment kind.
    pub fn symmetric() -> Self {
        Self {
            on_cancel: true,
            on_failure: true,
            on_timeout: true,
        }
    }

    /// Restores only after an explicit cancel.
    pub fn cancel_only() -> Self {
        Self {
            on_cancel: true,
            on_failure: false,
            on_timeout: false,
        }
    }

    pub fn applies_to(&self, abandonment: Abandonment) -> bool {
        match abandonment {
            Abandonment::Cancelled => self.on_cancel,
            Abandonment::Failed => self.on_failure,
            Abandonment::TimedOut => self.on_timeout,
        }
    }
}

impl Default for RestorationPolicy {
    fn default() -> Self {
        Self::symmetric()
    }
}
