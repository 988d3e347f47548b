//! HTTP DTOs for the payment endpoints.
//!
//! Request bodies are deserialized here; responses wrap application results
//! into the JSON shapes the checkout frontend and the provider expect.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::handlers::billing::{
    CancelPaymentIntentResult, CheckPaymentStatusResult, CreatePaymentIntentResult, PlanSummary,
    ReconcileOutcome, ReconcileWebhookResult, RestoreOutcome, SweepResult, UserSummary,
};
use crate::domain::billing::{OrderCode, Payment, PaymentStatus, PaymentStats};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to open a checkout for a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub plan_id: Uuid,
    /// Overrides the default post-payment redirect.
    #[serde(default)]
    pub return_url: Option<String>,
    /// Overrides the default cancel callback.
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// Query string of the provider's cancel redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelCallbackParams {
    #[serde(default)]
    pub reason: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentResponse {
    pub order_code: OrderCode,
    pub payment_id: String,
    pub subscription_id: String,
    pub amount: i64,
    pub checkout_url: String,
    pub qr_code: String,
    pub plan: PlanSummary,
    pub user: UserSummary,
}

impl From<CreatePaymentIntentResult> for PaymentIntentResponse {
    fn from(result: CreatePaymentIntentResult) -> Self {
        Self {
            order_code: result.order_code,
            payment_id: result.payment_id.to_string(),
            subscription_id: result.subscription_id.to_string(),
            amount: result.amount,
            checkout_url: result.checkout_url,
            qr_code: result.qr_code,
            plan: result.plan,
            user: result.user,
        }
    }
}

/// Body returned to the provider for every webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconcileOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_code: Option<OrderCode>,
}

impl WebhookAck {
    pub fn ping() -> Self {
        Self {
            success: true,
            message: "Webhook endpoint is reachable".to_string(),
            outcome: None,
            order_code: None,
        }
    }
}

impl From<ReconcileWebhookResult> for WebhookAck {
    fn from(result: ReconcileWebhookResult) -> Self {
        let message = match result.outcome {
            ReconcileOutcome::Rejected => "Invalid webhook signature",
            ReconcileOutcome::UnknownOrder => "Unknown order code",
            ReconcileOutcome::Duplicate => "Payment already processed",
            ReconcileOutcome::Completed => "Payment completed",
            ReconcileOutcome::Cancelled => "Payment cancelled",
            ReconcileOutcome::Failed => "Payment failed",
            ReconcileOutcome::Errored => "Webhook processing failed",
        };
        Self {
            success: result.accepted,
            message: message.to_string(),
            outcome: Some(result.outcome),
            order_code: result.order_code,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelCallbackResponse {
    pub success: bool,
    pub message: String,
    pub payment_id: String,
    pub order_code: OrderCode,
    pub status: PaymentStatus,
    pub restoration: Option<RestoreOutcome>,
    /// Where the frontend should send the user next.
    pub redirect: String,
}

impl CancelCallbackResponse {
    pub fn new(result: CancelPaymentIntentResult, redirect: String) -> Self {
        Self {
            success: true,
            message: "Payment cancelled; previous subscription restored where possible".to_string(),
            payment_id: result.payment_id.to_string(),
            order_code: result.order_code,
            status: result.status,
            restoration: result.restoration,
            redirect,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusResponse {
    pub payment_id: String,
    pub order_code: OrderCode,
    pub status: PaymentStatus,
    pub provider_status: Option<String>,
    pub reconciled: Option<ReconcileOutcome>,
}

impl From<CheckPaymentStatusResult> for PaymentStatusResponse {
    fn from(result: CheckPaymentStatusResult) -> Self {
        Self {
            payment_id: result.payment_id.to_string(),
            order_code: result.order_code,
            status: result.status,
            provider_status: result.provider_status,
            reconciled: result.reconciled,
        }
    }
}

/// Payment as listed in a user's history.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub id: String,
    pub subscription_id: String,
    pub order_code: OrderCode,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// ISO 8601.
    pub created_at: String,
    pub updated_at: String,
}

impl From<Payment> for PaymentView {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            subscription_id: payment.subscription_id.to_string(),
            order_code: payment.order_code,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            created_at: payment.created_at.as_datetime().to_rfc3339(),
            updated_at: payment.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentView>,
    pub total: usize,
}

impl From<Vec<Payment>> for PaymentListResponse {
    fn from(payments: Vec<Payment>) -> Self {
        let payments: Vec<PaymentView> = payments.into_iter().map(PaymentView::from).collect();
        Self {
            total: payments.len(),
            payments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatsResponse {
    pub total_payments: u64,
    pub successful_payments: u64,
    pub pending_payments: u64,
    pub failed_payments: u64,
    pub cancelled_payments: u64,
    pub total_amount: i64,
    pub last_payment_at: Option<String>,
}

impl From<PaymentStats> for PaymentStatsResponse {
    fn from(stats: PaymentStats) -> Self {
        Self {
            total_payments: stats.total,
            successful_payments: stats.successful,
            pending_payments: stats.pending,
            failed_payments: stats.failed,
            cancelled_payments: stats.cancelled,
            total_amount: stats.total_amount,
            last_payment_at: stats.last_payment_at.map(|t| t.as_datetime().to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub success: bool,
    pub message: String,
    pub processed_count: usize,
    pub failed_order_codes: Vec<OrderCode>,
}

impl From<SweepResult> for SweepResponse {
    fn from(result: SweepResult) -> Self {
        Self {
            success: true,
            message: format!("Processed {} timed out payments", result.processed_count),
            processed_count: result.processed_count,
            failed_order_codes: result.failed_order_codes,
        }
    }
}

/// Error body for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
