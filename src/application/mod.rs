//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers own their unit of work; query handlers only read.

pub mod handlers;

pub use handlers::billing::{
    CancelPaymentIntentCommand, CancelPaymentIntentHandler, CheckPaymentStatusHandler,
    CheckPaymentStatusQuery, CheckoutUrlDefaults, CreatePaymentIntentCommand,
    CreatePaymentIntentHandler, GetPaymentDetailsHandler, GetPaymentDetailsQuery,
    GetUserPaymentStatsHandler, GetUserPaymentStatsQuery, GetUserPaymentsHandler,
    GetUserPaymentsQuery, ReconcileOutcome, ReconcileWebhookCommand, ReconcileWebhookHandler,
    RestoreOutcome, SubscriptionLifecycle, SweepPaymentTimeoutsCommand,
    SweepPaymentTimeoutsHandler, SweepResult,
};
