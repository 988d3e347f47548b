//! PayOS payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against the PayOS REST API
//! (`/v2/payment-requests`).
//!
//! # Security
//!
//! - Link creation is signed with HMAC-SHA256 using the checksum key
//! - Webhook signatures are recomputed and compared in constant time
//! - Credentials are held as `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = PayosConfig::new(client_id, api_key, checksum_key)
//!     .with_timeout(Duration::from_secs(30))
//!     .with_max_retries(3);
//! let gateway = PayosGateway::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::billing::OrderCode;
use crate::ports::{
    CheckoutLink, CheckoutRequest, PaymentError, PaymentErrorCode, PaymentGateway,
    ProviderPaymentStatus, WebhookNotification,
};

use super::webhook_types::{
    data_signature_payload, link_signature_payload, sign, signature_matches, PayosCancelBody,
    PayosCreateLinkBody, PayosEnvelope, PayosItem, PayosLinkData, PayosPaymentInfo,
    PayosWebhookBody, PayosWebhookData,
};

/// Upper bound PayOS accepts for a single amount.
pub const MAX_AMOUNT: i64 = 10_000_000_000;

/// PayOS rejects longer descriptions.
pub const MAX_DESCRIPTION_CHARS: usize = 25;

const DEFAULT_BASE_URL: &str = "https://api-merchant.payos.vn";

/// Delay unit between retries; attempt `n` waits `n` units.
const RETRY_BACKOFF_MS: u64 = 250;

/// PayOS API configuration.
#[derive(Clone)]
pub struct PayosConfig {
    client_id: String,
    api_key: SecretString,
    checksum_key: SecretString,
    base_url: String,
    request_timeout: Duration,
    max_retries: u32,
}

impl PayosConfig {
    pub fn new(
        client_id: impl Into<String>,
        api_key: impl Into<String>,
        checksum_key: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            api_key: SecretString::new(api_key.into()),
            checksum_key: SecretString::new(checksum_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    /// Set a custom API base URL (for sandboxes and tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// PayOS gateway.
pub struct PayosGateway {
    config: PayosConfig,
    http_client: reqwest::Client,
}

impl PayosGateway {
    pub fn new(config: PayosConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PaymentError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn checksum_key(&self) -> &[u8] {
        self.config.checksum_key.expose_secret().as_bytes()
    }

    /// Sends a request, retrying retryable failures with linear backoff.
    async fn send<T, F>(&self, operation: &str, build: F) -> Result<T, PaymentError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(&build).await {
                Ok(data) => return Ok(data),
                Err(err) if err.retryable && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %err,
                        "PayOS request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                }
                Err(err) => {
                    tracing::error!(operation, error = %err, "PayOS request failed");
                    return Err(err);
                }
            }
        }
    }

    async fn send_once<T, F>(&self, build: &F) -> Result<T, PaymentError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let response = build(&self.http_client)
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaymentError::timeout(e.to_string())
                } else {
                    PaymentError::network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &body));
        }

        let envelope: PayosEnvelope<T> = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse PayOS response: {}", e))
        })?;

        if !envelope.is_success() {
            return Err(PaymentError::provider(format!("PayOS error: {}", envelope.desc))
                .with_provider_code(envelope.code));
        }

        envelope
            .data
            .ok_or_else(|| PaymentError::provider("PayOS response has no data"))
    }
}

/// Maps a non-2xx HTTP status to a payment error.
fn classify_http_failure(status: StatusCode, body: &str) -> PaymentError {
    let message = format!("PayOS API error ({}): {}", status.as_u16(), body);
    let err = match status {
        StatusCode::TOO_MANY_REQUESTS => {
            PaymentError::new(PaymentErrorCode::RateLimitExceeded, message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PaymentError::new(PaymentErrorCode::AuthenticationError, message)
        }
        StatusCode::NOT_FOUND => PaymentError::new(PaymentErrorCode::NotFound, message),
        s if s.is_server_error() => {
            let mut err = PaymentError::provider(message);
            err.retryable = true;
            err
        }
        _ => PaymentError::invalid_request(message),
    };
    err.with_provider_code(status.as_u16().to_string())
}

/// Rejects requests PayOS would refuse, before any network call.
pub fn validate_request(request: &CheckoutRequest) -> Result<(), PaymentError> {
    if request.order_code.value() <= 0 {
        return Err(PaymentError::invalid_request("Order code is required"));
    }
    if request.amount < 1 || request.amount > MAX_AMOUNT {
        return Err(PaymentError::invalid_request(format!(
            "Amount must be between 1 and {}",
            MAX_AMOUNT
        )));
    }
    if request.description.trim().is_empty() {
        return Err(PaymentError::invalid_request("Description is required"));
    }
    if request.description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(PaymentError::invalid_request(format!(
            "Description must be max {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    if request.return_url.trim().is_empty() {
        return Err(PaymentError::invalid_request("Return URL is required"));
    }
    if request.cancel_url.trim().is_empty() {
        return Err(PaymentError::invalid_request("Cancel URL is required"));
    }
    for item in &request.items {
        if item.quantity == 0 {
            return Err(PaymentError::invalid_request(format!(
                "Item \"{}\" quantity must be positive",
                item.name
            )));
        }
        if item.price <= 0 || item.price > MAX_AMOUNT {
            return Err(PaymentError::invalid_request(format!(
                "Item \"{}\" price must be between 1 and {}",
                item.name, MAX_AMOUNT
            )));
        }
    }
    Ok(())
}

/// Verifies a webhook body against the checksum key and extracts the notification.
pub fn verify_webhook_body(
    checksum_key: &[u8],
    payload: &[u8],
    header_signature: Option<&str>,
) -> Result<WebhookNotification, PaymentError> {
    let body: PayosWebhookBody = serde_json::from_slice(payload).map_err(|e| {
        tracing::warn!(error = %e, "Failed to parse webhook payload");
        PaymentError::invalid_webhook(format!("Invalid JSON: {}", e))
    })?;

    let data = body
        .data
        .as_object()
        .ok_or_else(|| PaymentError::invalid_webhook("Webhook data must be an object"))?;

    let signature = body
        .signature
        .as_deref()
        .or(header_signature)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| PaymentError::invalid_webhook("Missing signature"))?;

    if !signature_matches(checksum_key, &data_signature_payload(data), signature) {
        tracing::warn!("Invalid webhook signature");
        return Err(PaymentError::invalid_webhook("Invalid signature"));
    }

    let fields: PayosWebhookData = serde_json::from_value(body.data.clone()).map_err(|e| {
        PaymentError::invalid_webhook(format!("Missing required webhook fields: {}", e))
    })?;

    let order_code = OrderCode::new(fields.order_code)
        .map_err(|e| PaymentError::invalid_webhook(e.to_string()))?;

    let description = if fields.desc.is_empty() {
        body.desc.unwrap_or_default()
    } else {
        fields.desc
    };

    Ok(WebhookNotification {
        order_code,
        code: fields.code,
        description,
        amount: fields.amount,
        reference: fields.reference.filter(|r| !r.is_empty()),
    })
}

#[async_trait]
impl PaymentGateway for PayosGateway {
    async fn create_link(&self, request: CheckoutRequest) -> Result<CheckoutLink, PaymentError> {
        validate_request(&request)?;

        let order_code = request.order_code.value();
        let signature = sign(
            self.checksum_key(),
            &link_signature_payload(
                request.amount,
                &request.cancel_url,
                &request.description,
                order_code,
                &request.return_url,
            ),
        );

        let body = PayosCreateLinkBody {
            order_code,
            amount: request.amount,
            description: request.description,
            cancel_url: request.cancel_url,
            return_url: request.return_url,
            items: request
                .items
                .into_iter()
                .map(|i| PayosItem {
                    name: i.name,
                    quantity: i.quantity,
                    price: i.price,
                })
                .collect(),
            buyer_name: request.buyer_name,
            buyer_email: request.buyer_email,
            signature,
        };

        tracing::info!(order_code, amount = body.amount, "Creating PayOS payment link");

        let url = self.url("/v2/payment-requests");
        let data: PayosLinkData = self
            .send("create_link", |client| client.post(&url).json(&body))
            .await?;

        Ok(CheckoutLink {
            checkout_url: data.checkout_url,
            qr_code: data.qr_code,
            payment_link_id: data.payment_link_id,
        })
    }

    async fn cancel_link(
        &self,
        order_code: OrderCode,
        reason: Option<&str>,
    ) -> Result<(), PaymentError> {
        let url = self.url(&format!("/v2/payment-requests/{}/cancel", order_code));
        let body = PayosCancelBody {
            cancellation_reason: reason.map(str::to_string),
        };

        let _: serde_json::Value = self
            .send("cancel_link", |client| client.post(&url).json(&body))
            .await?;

        tracing::info!(order_code = %order_code, "PayOS payment link cancelled");
        Ok(())
    }

    async fn query_status(&self, order_code: OrderCode) -> Result<ProviderPaymentStatus, PaymentError> {
        let url = self.url(&format!("/v2/payment-requests/{}", order_code));
        let info: PayosPaymentInfo = self
            .send("query_status", |client| client.get(&url))
            .await?;

        Ok(ProviderPaymentStatus {
            order_code: OrderCode::new(info.order_code).unwrap_or(order_code),
            status: info.status,
            amount: info.amount,
            amount_paid: info.amount_paid,
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookNotification, PaymentError> {
        let notification = verify_webhook_body(self.checksum_key(), payload, signature)?;

        tracing::info!(
            order_code = %notification.order_code,
            code = %notification.code,
            "Webhook signature verified"
        );

        Ok(notification)
    }
}
