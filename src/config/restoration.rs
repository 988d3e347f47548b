//! Entitlement restoration settings
//!
//! Controls which kinds of abandoned purchase put the user back on their
//! previous subscription (or the free plan).

use serde::Deserialize;

use crate::domain::billing::RestorationPolicy;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RestorationConfig {
    #[serde(default = "enabled")]
    pub on_cancel: bool,

    #[serde(default = "enabled")]
    pub on_failure: bool,

    #[serde(default = "enabled")]
    pub on_timeout: bool,
}

impl RestorationConfig {
    pub fn policy(&self) -> RestorationPolicy {
        RestorationPolicy {
            on_cancel: self.on_cancel,
            on_failure: self.on_failure,
            on_timeout: self.on_timeout,
        }
    }
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            on_cancel: true,
            on_failure: true,
            on_timeout: true,
        }
    }
}

fn enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_symmetric_policy() {
        assert_eq!(RestorationConfig::default().policy(), RestorationPolicy::symmetric());
    }

    #[test]
    fn cancel_only_maps_through() {
        let config = RestorationConfig {
            on_cancel: true,
            on_failure: false,
            on_timeout: false,
        };
        assert_eq!(config.policy(), RestorationPolicy::cancel_only());
    }
}
