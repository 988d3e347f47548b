//! Payment gateway port for the external payment processor.
//!
//! Defines the four operations the reconciliation engine needs from a
//! provider: create a checkout link, cancel it, query its status, and
//! verify an inbound webhook.
//!
//! # Design
//!
//! - **Gateway agnostic**: the PayOS adapter is one implementation
//! - **Best-effort cancellation**: callers log and swallow `cancel_link` failures
//! - **Typed failures**: every provider problem surfaces as [`PaymentError`]

use crate::domain::billing::{BillingError, OrderCode};
use crate::domain::foundation::{DomainError, ErrorCode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout link for an order.
    async fn create_link(&self, request: CheckoutRequest) -> Result<CheckoutLink, PaymentError>;

    /// Cancel an open checkout link.
    async fn cancel_link(
        &self,
        order_code: OrderCode,
        reason: Option<&str>,
    ) -> Result<(), PaymentError>;

    /// Fetch the provider's view of an order.
    async fn query_status(&self, order_code: OrderCode) -> Result<ProviderPaymentStatus, PaymentError>;

    /// Verify authenticity and shape of a webhook body.
    ///
    /// `signature` is the header-supplied signature, if any; providers that
    /// sign inside the body ignore it.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookNotification, PaymentError>;
}

/// One line item on the checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub name: String,
    pub quantity: u32,
    pub price: i64,
}

/// Request to create a checkout link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub order_code: OrderCode,
    pub amount: i64,
    pub description: String,
    pub items: Vec<CheckoutItem>,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
    pub return_url: String,
    pub cancel_url: String,
}

/// Checkout artifact returned to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLink {
    pub checkout_url: String,
    pub qr_code: String,
    /// Provider-side identifier of the payment link.
    pub payment_link_id: Option<String>,
}

/// Provider-side status of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPaymentStatus {
    pub order_code: OrderCode,
    /// Raw provider status (`PENDING`, `PAID`, `CANCELLED`, ...).
    pub status: String,
    pub amount: i64,
    pub amount_paid: i64,
}

impl ProviderPaymentStatus {
    pub fn is_paid(&self) -> bool {
        self.status.eq_ignore_ascii_case("PAID")
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.eq_ignore_ascii_case("CANCELLED")
    }
}

/// A verified webhook notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub order_code: OrderCode,
    /// Provider result code (`"00"` = success).
    pub code: String,
    pub description: String,
    pub amount: i64,
    pub reference: Option<String>,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Timeout, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidRequest, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::NotFound => ErrorCode::NotFound,
            PaymentErrorCode::InvalidRequest => ErrorCode::ValidationFailed,
            PaymentErrorCode::InvalidWebhook => ErrorCode::WebhookVerificationFailed,
            _ => ErrorCode::ProviderError,
        };
        DomainError::new(code, err.message)
    }
}

impl From<PaymentError> for BillingError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::InvalidWebhook => BillingError::verification(err.message),
            _ => BillingError::provider(err.to_string(), err.retryable),
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// Request exceeded the configured timeout.
    Timeout,

    /// API authentication failed.
    AuthenticationError,

    /// Request rejected before or by the provider as malformed.
    InvalidRequest,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Invalid webhook signature or shape.
    InvalidWebhook,

    /// Provider API error.
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::Timeout
                | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
