//! Classification of provider result codes into payment outcomes.

use serde::{Deserialize, Serialize};

use super::PaymentStatus;

/// Provider result codes the engine recognises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResultCode {
    /// `"00"`: money captured.
    Success,
    /// `"02"`: buyer abandoned the checkout.
    Cancelled,
    /// `"01"`: the provider rejected the request parameters.
    InvalidRequest,
    /// Any other code, kept verbatim for the ledger.
    Other(String),
}

impl ProviderResultCode {
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "00" => ProviderResultCode::Success,
            "02" => ProviderResultCode::Cancelled,
            "01" => ProviderResultCode::InvalidRequest,
            other => ProviderResultCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProviderResultCode::Success => "00",
            ProviderResultCode::InvalidRequest => "01",
            ProviderResultCode::Cancelled => "02",
            ProviderResultCode::Other(code) => code,
        }
    }

    /// Maps the code to an outcome.
    ///
    /// Unrecognised codes whose description mentions cancellation are treated as
    /// a cancel, because some provider flows report abandonment that way.
    pub fn outcome(&self, description: &str) -> PaymentOutcome {
        match self {
            ProviderResultCode::Success => PaymentOutcome::Paid,
            ProviderResultCode::Cancelled => PaymentOutcome::Cancelled,
            ProviderResultCode::InvalidRequest => PaymentOutcome::Failed,
            ProviderResultCode::Other(_) => {
                if description.to_lowercase().contains("cancel") {
                    PaymentOutcome::Cancelled
                } else {
                    PaymentOutcome::Failed
                }
            }
        }
    }
}

/// Terminal result of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid,
    Cancelled,
    Failed,
}

impl PaymentOutcome {
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Paid => PaymentStatus::Completed,
            PaymentOutcome::Cancelled => PaymentStatus::Cancelled,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}
