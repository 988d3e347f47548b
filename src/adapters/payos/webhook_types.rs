//! PayOS wire types and signature helpers.
//!
//! PayOS wraps every response and webhook in the same envelope:
//!
//! ```text
//! { "code": "00", "desc": "success", "data": { ... }, "signature": "<hex>" }
//! ```
//!
//! Signatures are lowercase hex HMAC-SHA256 over `key=value` pairs joined by
//! `&`, with keys in alphabetical order.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

// ════════════════════════════════════════════════════════════════════════════════
// Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Response envelope of the PayOS REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct PayosEnvelope<T> {
    pub code: String,
    #[serde(default)]
    pub desc: String,
    pub data: Option<T>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl<T> PayosEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == "00"
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Payment Requests
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayosItem {
    pub name: String,
    pub quantity: u32,
    pub price: i64,
}

/// Body of `POST /v2/payment-requests`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayosCreateLinkBody {
    pub order_code: i64,
    pub amount: i64,
    pub description: String,
    pub cancel_url: String,
    pub return_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<PayosItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_email: Option<String>,
    pub signature: String,
}

/// `data` of a successful link creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayosLinkData {
    pub checkout_url: String,
    #[serde(default)]
    pub qr_code: String,
    #[serde(default)]
    pub payment_link_id: Option<String>,
}

/// `data` of `GET /v2/payment-requests/{orderCode}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayosPaymentInfo {
    pub order_code: i64,
    pub status: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
}

/// Body of `POST /v2/payment-requests/{orderCode}/cancel`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayosCancelBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// Webhook body as posted by PayOS.
///
/// `data` is kept as raw JSON so the signature can be recomputed over
/// exactly the fields that were sent.
#[derive(Debug, Clone, Deserialize)]
pub struct PayosWebhookBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    pub data: Value,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Typed view of webhook `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayosWebhookData {
    pub order_code: i64,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
    pub code: String,
    #[serde(default)]
    pub desc: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Signatures
// ════════════════════════════════════════════════════════════════════════════════

/// Payload signed when creating a payment link.
pub fn link_signature_payload(
    amount: i64,
    cancel_url: &str,
    description: &str,
    order_code: i64,
    return_url: &str,
) -> String {
    format!(
        "amount={}&cancelUrl={}&description={}&orderCode={}&returnUrl={}",
        amount, cancel_url, description, order_code, return_url
    )
}

/// Payload signed over a JSON object: sorted `key=value` pairs.
///
/// Nulls render as empty strings; nested arrays and objects as compact JSON.
pub fn data_signature_payload(data: &serde_json::Map<String, Value>) -> String {
    let mut entries: Vec<(&String, &Value)> = data.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Null => String::new(),
                Value::String(s) if s == "null" || s == "undefined" => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex HMAC-SHA256.
pub fn sign(key: &[u8], payload: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn signature_matches(key: &[u8], payload: &str, provided_hex: &str) -> bool {
    let provided = match hex::decode(provided_hex.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let expected = match hex::decode(sign(key, payload)) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    expected.len() == provided.len() && expected.ct_eq(&provided).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn link_payload_uses_fixed_field_order() {
        let payload = link_signature_payload(
            99000,
            "https://api.example.com/cancel",
            "Gói Premium",
            1700000000000123,
            "https://app.example.com/ok",
        );
        assert_eq!(
            payload,
            "amount=99000&cancelUrl=https://api.example.com/cancel&description=Gói Premium\
             &orderCode=1700000000000123&returnUrl=https://app.example.com/ok"
        );
    }

    #[test]
    fn data_payload_sorts_keys_and_blanks_nulls() {
        let data = json!({
            "orderCode": 123,
            "amount": 5000,
            "reference": null,
            "description": "Gói Basic",
        });
        let payload = data_signature_payload(data.as_object().unwrap());
        assert_eq!(
            payload,
            "amount=5000&description=Gói Basic&orderCode=123&reference="
        );
    }

    #[test]
    fn signature_round_trip() {
        let sig = sign(b"checksum", "a=1&b=2");
        assert_eq!(sig.len(), 64);
        assert!(signature_matches(b"checksum", "a=1&b=2", &sig));
        assert!(!signature_matches(b"checksum", "a=1&b=3", &sig));
        assert!(!signature_matches(b"other", "a=1&b=2", &sig));
    }

    #[test]
    fn malformed_signature_never_matches() {
        assert!(!signature_matches(b"checksum", "a=1", "not-hex"));
        assert!(!signature_matches(b"checksum", "a=1", "abcd"));
    }

    #[test]
    fn envelope_success_flag() {
        let env: PayosEnvelope<PayosPaymentInfo> = serde_json::from_value(json!({
            "code": "00",
            "desc": "success",
            "data": { "orderCode": 1, "status": "PAID", "amount": 10, "amountPaid": 10 }
        }))
        .unwrap();
        assert!(env.is_success());
        assert_eq!(env.data.unwrap().status, "PAID");
    }
}
