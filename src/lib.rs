//! billing-reconciler - Payment-to-subscription reconciliation for PayOS checkouts.
//!
//! Turns a plan purchase into a provider checkout link, reconciles the
//! provider's asynchronous payment notifications into subscription state, and
//! times out purchases the provider never reports on. Abandoned purchases put
//! the buyer back on their previous entitlement.
//!
//! Layout:
//! - `domain` - payments, subscriptions, ledger entries and their state machines
//! - `ports` - storage and gateway traits
//! - `application` - command and query handlers
//! - `adapters` - PayOS, Postgres, in-memory, HTTP and background jobs
//! - `config` - environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
