//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the billing core to external systems:
//! - `payos` - PayOS payment gateway client and a scriptable mock
//! - `postgres` - sqlx-backed stores
//! - `memory` - In-process stores for tests and local runs
//! - `http` - Axum routes
//! - `jobs` - Background timeout sweeper

pub mod http;
pub mod jobs;
pub mod memory;
pub mod payos;
pub mod postgres;

pub use jobs::{TimeoutSweeper, TimeoutSweeperConfig};
pub use memory::{InMemoryBillingStore, InMemoryCatalog};
pub use payos::{MockPaymentGateway, PayosConfig, PayosGateway};
pub use postgres::{PostgresBillingReader, PostgresBillingStore, PostgresCatalog};
