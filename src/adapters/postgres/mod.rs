//! PostgreSQL adapters - Database implementations for the billing ports.
//!
//! - `PostgresBillingStore` - Transactional writes with conditional status updates
//! - `PostgresBillingReader` - Read-side queries for handlers and the sweeper
//! - `PostgresCatalog` - Plans and user profiles

mod billing_reader;
mod billing_store;
mod catalog;
mod rows;

pub use billing_reader::PostgresBillingReader;
pub use billing_store::{PgBillingTransaction, PostgresBillingStore};
pub use catalog::PostgresCatalog;
