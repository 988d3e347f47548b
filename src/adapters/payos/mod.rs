//! PayOS payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for PayOS, including:
//! - Hosted checkout link creation and cancellation
//! - Order status queries
//! - Webhook signature verification
//!
//! # Security
//!
//! - Requests and webhooks are signed with HMAC-SHA256 over the checksum key
//! - Signature comparison is constant-time
//! - All credentials are handled via `secrecy::SecretString`

mod mock_gateway;
mod payos_adapter;
mod webhook_types;

pub use mock_gateway::{MethodCall, MockPaymentGateway};
pub use payos_adapter::{
    validate_request, verify_webhook_body, PayosConfig, PayosGateway, MAX_AMOUNT,
    MAX_DESCRIPTION_CHARS,
};
pub use webhook_types::{data_signature_payload, link_signature_payload, sign, signature_matches};
