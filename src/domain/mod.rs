//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, state machine, errors)
//! - `billing` - Payments, subscriptions, ledger entries and their lifecycles

pub mod billing;
pub mod foundation;
