//! Billing domain - payments, subscriptions, and the ledger that ties them together.
//!
//! A purchase attempt is an *intent*: one [`Payment`] paired 1:1 with one
//! [`UserSubscription`], both created `Pending`. The payment resolves exactly
//! once into a terminal status; the subscription follows it. Every payment
//! transition is recorded as a [`PaymentLog`] entry.

mod catalog;
mod errors;
mod ledger;
mod payment;
mod restoration;
mod result_code;
mod stats;
mod subscription;

pub use catalog::{Plan, UserProfile};
pub use errors::BillingError;
pub use ledger::PaymentLog;
pub use payment::{
    OrderCode, Payment, PaymentStatus, ProviderKind, DEFAULT_CURRENCY, MAX_ORDER_CODE,
};
pub use restoration::{Abandonment, RestorationPolicy};
pub use result_code::{PaymentOutcome, ProviderResultCode};
pub use stats::PaymentStats;
pub use subscription::{SubscriptionStatus, UserSubscription};
