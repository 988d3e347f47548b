//! In-memory adapters.
//!
//! Used by tests and for running the service without a database.
//! Not intended for production use.

mod billing_store;
mod catalog;

pub use billing_store::InMemoryBillingStore;
pub use catalog::InMemoryCatalog;
