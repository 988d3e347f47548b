//! Billing-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | AlreadySubscribed | 409 |
//! | InvalidState | 400 |
//! | ValidationFailed | 400 |
//! | Verification | 401 |
//! | Forbidden | 403 |
//! | Provider | 502 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, PlanId, ValidationError};

/// Errors raised by the synchronous billing entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// A referenced plan, user, payment or subscription does not exist.
    NotFound { resource: &'static str, id: String },

    /// The user already holds an active subscription for this plan.
    AlreadySubscribed { plan_id: PlanId },

    /// The payment provider rejected the call or could not be reached.
    Provider { message: String, retryable: bool },

    /// A webhook failed authenticity or shape checks.
    Verification(String),

    /// The record is not in a state that allows the operation.
    InvalidState { current: String, attempted: String },

    /// Input validation failed.
    ValidationFailed { field: String, message: String },

    /// Caller may not access the resource.
    Forbidden(String),

    /// Storage or other infrastructure failure.
    Infrastructure(String),
}

impl BillingError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        BillingError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn already_subscribed(plan_id: PlanId) -> Self {
        BillingError::AlreadySubscribed { plan_id }
    }

    pub fn provider(message: impl Into<String>, retryable: bool) -> Self {
        BillingError::Provider {
            message: message.into(),
            retryable,
        }
    }

    pub fn verification(message: impl Into<String>) -> Self {
        BillingError::Verification(message.into())
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        BillingError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        BillingError::Forbidden(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::NotFound { resource, .. } => match *resource {
                "payment" => ErrorCode::PaymentNotFound,
                "subscription" => ErrorCode::SubscriptionNotFound,
                "plan" => ErrorCode::PlanNotFound,
                "user" => ErrorCode::UserNotFound,
                _ => ErrorCode::NotFound,
            },
            BillingError::AlreadySubscribed { .. } => ErrorCode::AlreadySubscribed,
            BillingError::Provider { .. } => ErrorCode::ProviderError,
            BillingError::Verification(_) => ErrorCode::WebhookVerificationFailed,
            BillingError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            BillingError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            BillingError::Forbidden(_) => ErrorCode::Forbidden,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            BillingError::NotFound { resource, id } => {
                let mut name = resource.to_string();
                if let Some(first) = name.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                format!("{} not found: {}", name, id)
            }
            BillingError::AlreadySubscribed { plan_id } => {
                format!("You are already subscribed to plan {}", plan_id)
            }
            BillingError::Provider { message, .. } => {
                format!("Payment provider error: {}", message)
            }
            BillingError::Verification(msg) => format!("Webhook verification failed: {}", msg),
            BillingError::InvalidState { current, attempted } => {
                format!("Cannot {} a payment in {} state", attempted, current)
            }
            BillingError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            BillingError::Forbidden(msg) => msg.clone(),
            BillingError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Provider { retryable, .. } => *retryable,
            BillingError::Infrastructure(_) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for BillingError {}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::PaymentNotFound => BillingError::not_found("payment", err.message),
            ErrorCode::SubscriptionNotFound => BillingError::not_found("subscription", err.message),
            ErrorCode::PlanNotFound => BillingError::not_found("plan", err.message),
            ErrorCode::UserNotFound => BillingError::not_found("user", err.message),
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => BillingError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition => BillingError::InvalidState {
                current: "unknown".to_string(),
                attempted: err.message,
            },
            ErrorCode::ProviderError => BillingError::provider(err.message, false),
            ErrorCode::WebhookVerificationFailed => BillingError::Verification(err.message),
            ErrorCode::Forbidden | ErrorCode::Unauthorized => BillingError::Forbidden(err.message),
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::validation(err.field().to_string(), err.to_string())
    }
}

impl From<BillingError> for DomainError {
    fn from(err: BillingError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
