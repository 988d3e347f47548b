//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `BillingStore` / `BillingTransaction` - Unit of work over payments, subscriptions and ledger
//! - `BillingReader` - Read-side queries (details, history, stale intents)
//!
//! ## Collaborator Ports
//!
//! - `PlanCatalog` - Plan lookup, including the free plan
//! - `UserDirectory` - Buyer lookup
//!
//! ## Provider Ports
//!
//! - `PaymentGateway` - Checkout links, cancellation, status queries, webhook verification

mod billing_reader;
mod billing_store;
mod catalog;
mod payment_gateway;

pub use billing_reader::BillingReader;
pub use billing_store::{BillingStore, BillingTransaction, InsertOutcome};
pub use catalog::{PlanCatalog, UserDirectory};
pub use payment_gateway::{
    CheckoutItem, CheckoutLink, CheckoutRequest, PaymentError, PaymentErrorCode, PaymentGateway,
    ProviderPaymentStatus, WebhookNotification,
};
