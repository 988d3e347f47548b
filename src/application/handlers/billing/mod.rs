//! Billing handlers.
//!
//! Command and query handlers for the payment-to-subscription lifecycle:
//!
//! ## Commands
//! - Opening a purchase attempt with a checkout link
//! - Reconciling provider webhooks
//! - Cancelling an attempt from the checkout redirect
//! - Sweeping attempts the provider never reported on
//!
//! ## Queries
//! - Payment status (with provider polling)
//! - Payment details, history, and statistics

mod cancel_payment_intent;
mod check_payment_status;
mod create_payment_intent;
mod get_payment_details;
mod get_user_payment_stats;
mod get_user_payments;
mod intent_resolution;
mod reconcile_webhook;
mod subscription_lifecycle;
mod sweep_payment_timeouts;

#[cfg(test)]
pub(crate) mod test_support;

// Commands
pub use cancel_payment_intent::{
    CancelPaymentIntentCommand, CancelPaymentIntentHandler, CancelPaymentIntentResult,
};
pub use create_payment_intent::{
    CheckoutUrlDefaults, CreatePaymentIntentCommand, CreatePaymentIntentHandler,
    CreatePaymentIntentResult, PlanSummary, UserSummary,
};
pub use reconcile_webhook::{
    ReconcileOutcome, ReconcileWebhookCommand, ReconcileWebhookHandler, ReconcileWebhookResult,
};
pub use subscription_lifecycle::{RestoreOutcome, SubscriptionLifecycle};
pub use sweep_payment_timeouts::{
    SweepPaymentTimeoutsCommand, SweepPaymentTimeoutsHandler, SweepResult,
};

// Queries
pub use check_payment_status::{
    CheckPaymentStatusHandler, CheckPaymentStatusQuery, CheckPaymentStatusResult,
};
pub use get_payment_details::{
    GetPaymentDetailsHandler, GetPaymentDetailsQuery, GetPaymentDetailsResult,
};
pub use get_user_payment_stats::{GetUserPaymentStatsHandler, GetUserPaymentStatsQuery};
pub use get_user_payments::{GetUserPaymentsHandler, GetUserPaymentsQuery, GetUserPaymentsResult};
