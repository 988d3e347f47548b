//! HTTP adapter for the payment endpoints.
//!
//! Mounted at `/api/payments`:
//! - `POST /intent` - Open a checkout for a plan
//! - `POST /webhook` - Provider payment notifications
//! - `GET /cancel-callback/:order_code` - Buyer cancelled at the provider
//! - `GET /:order_code/status` - Poll payment status
//! - `GET /:payment_id/details` - Payment details with ledger
//! - `GET /mine`, `GET /mine/stats` - Caller's history and statistics
//! - `POST /admin/sweep-timeouts` - Manual timeout sweep

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AuthenticatedUser, BillingApiError, BillingAppState};
pub use routes::{billing_router, billing_routes};
