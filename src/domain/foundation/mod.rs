//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, the state machine contract, and error types
//! shared by the billing domain.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{PaymentId, PaymentLogId, PlanId, SubscriptionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
