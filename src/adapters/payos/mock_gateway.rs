//! Mock payment gateway for testing.
//!
//! Provides a configurable implementation of `PaymentGateway` for unit
//! and integration tests. Supports:
//! - Error injection, per method or for the next call
//! - Call tracking
//! - Provider-side status fixtures for `query_status`
//! - Unsigned webhook payloads built with [`MockPaymentGateway::webhook_payload`]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::billing::OrderCode;
use crate::ports::{
    CheckoutLink, CheckoutRequest, PaymentError, PaymentGateway, ProviderPaymentStatus,
    WebhookNotification,
};

/// Mock payment gateway.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.set_method_error("create_link", PaymentError::network("down"));
///
/// let payload = MockPaymentGateway::webhook_payload(order_code, "00", "success");
/// let notification = gateway.verify_webhook(&payload, None).await?;
/// ```
#[derive(Clone, Default)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Provider-side status by order code. Unknown codes report `PENDING`.
    statuses: HashMap<i64, String>,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    call_log: Vec<MethodCall>,

    reject_webhooks: bool,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().reject_webhooks = true;
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set the provider-side status reported for an order.
    pub fn set_status(&self, order_code: OrderCode, status: &str) {
        self.state()
            .statuses
            .insert(order_code.value(), status.to_string());
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Order codes passed to `cancel_link`, in call order.
    pub fn cancelled_order_codes(&self) -> Vec<String> {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == "cancel_link")
            .filter_map(|c| c.args.first().cloned())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payload Builders
    // ════════════════════════════════════════════════════════════════════════════

    /// Webhook body this mock accepts, in the provider's envelope shape.
    pub fn webhook_payload(order_code: OrderCode, code: &str, desc: &str) -> Vec<u8> {
        json!({
            "code": "00",
            "desc": "success",
            "success": true,
            "data": {
                "orderCode": order_code.value(),
                "amount": 0,
                "description": "",
                "reference": format!("REF{}", order_code.value()),
                "code": code,
                "desc": desc,
            },
            "signature": "mock",
        })
        .to_string()
        .into_bytes()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_link(&self, request: CheckoutRequest) -> Result<CheckoutLink, PaymentError> {
        self.record_call(
            "create_link",
            vec![
                request.order_code.to_string(),
                request.amount.to_string(),
                request.description.clone(),
                request.return_url.clone(),
                request.cancel_url.clone(),
            ],
        );
        self.check_error("create_link")?;

        Ok(CheckoutLink {
            checkout_url: format!("https://pay.mock/web/{}", request.order_code),
            qr_code: format!("mock-qr-{}", request.order_code),
            payment_link_id: Some(format!("plink_{}", request.order_code)),
        })
    }

    async fn cancel_link(
        &self,
        order_code: OrderCode,
        reason: Option<&str>,
    ) -> Result<(), PaymentError> {
        self.record_call(
            "cancel_link",
            vec![order_code.to_string(), reason.unwrap_or_default().to_string()],
        );
        self.check_error("cancel_link")
    }

    async fn query_status(&self, order_code: OrderCode) -> Result<ProviderPaymentStatus, PaymentError> {
        self.record_call("query_status", vec![order_code.to_string()]);
        self.check_error("query_status")?;

        let status = self
            .state()
            .statuses
            .get(&order_code.value())
            .cloned()
            .unwrap_or_else(|| "PENDING".to_string());

        Ok(ProviderPaymentStatus {
            order_code,
            status,
            amount: 0,
            amount_paid: 0,
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookNotification, PaymentError> {
        self.record_call(
            "verify_webhook",
            vec![
                String::from_utf8_lossy(payload).chars().take(50).collect(),
                signature.unwrap_or_default().chars().take(20).collect(),
            ],
        );
        self.check_error("verify_webhook")?;

        if self.state().reject_webhooks {
            return Err(PaymentError::invalid_webhook("Invalid signature"));
        }

        let parsed: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::invalid_webhook(format!("Invalid JSON: {}", e)))?;
        let data = &parsed["data"];

        let order_code = data["orderCode"]
            .as_i64()
            .and_then(|v| OrderCode::new(v).ok())
            .ok_or_else(|| PaymentError::invalid_webhook("Missing orderCode"))?;
        let code = data["code"]
            .as_str()
            .ok_or_else(|| PaymentError::invalid_webhook("Missing code"))?
            .to_string();

        Ok(WebhookNotification {
            order_code,
            code,
            description: data["desc"].as_str().unwrap_or_default().to_string(),
            amount: data["amount"].as_i64().unwrap_or_default(),
            reference: data["reference"].as_str().map(str::to_string),
        })
    }
}
