//! CheckPaymentStatusHandler - Polls the provider for an intent's status.
//!
//! Covers buyers returning from checkout before the webhook arrives. A paid
//! or cancelled provider status is applied through the same reconciliation
//! path as a webhook, so it stays idempotent with late deliveries.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{BillingError, OrderCode, PaymentStatus};
use crate::domain::foundation::{PaymentId, UserId};
use crate::ports::{BillingReader, PaymentGateway, WebhookNotification};

use super::reconcile_webhook::{ReconcileOutcome, ReconcileWebhookHandler};

#[derive(Debug, Clone)]
pub struct CheckPaymentStatusQuery {
    pub user_id: UserId,
    pub order_code: OrderCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckPaymentStatusResult {
    pub payment_id: PaymentId,
    pub order_code: OrderCode,
    pub status: PaymentStatus,
    /// Raw provider status, when the provider was consulted.
    pub provider_status: Option<String>,
    /// Set when the poll resolved the payment.
    pub reconciled: Option<ReconcileOutcome>,
}

pub struct CheckPaymentStatusHandler {
    reader: Arc<dyn BillingReader>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: Arc<ReconcileWebhookHandler>,
}

impl CheckPaymentStatusHandler {
    pub fn new(
        reader: Arc<dyn BillingReader>,
        gateway: Arc<dyn PaymentGateway>,
        reconciler: Arc<ReconcileWebhookHandler>,
    ) -> Self {
        Self {
            reader,
            gateway,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        query: CheckPaymentStatusQuery,
    ) -> Result<CheckPaymentStatusResult, BillingError> {
        let payment = self
            .reader
            .find_payment_by_order_code(query.order_code)
            .await?
            .ok_or_else(|| BillingError::not_found("payment", query.order_code))?;

        if payment.user_id != query.user_id {
            return Err(BillingError::forbidden("You do not have access to this payment"));
        }

        if !payment.is_pending() {
            return Ok(CheckPaymentStatusResult {
                payment_id: payment.id,
                order_code: payment.order_code,
                status: payment.status,
                provider_status: None,
                reconciled: None,
            });
        }

        let provider = self.gateway.query_status(payment.order_code).await?;

        let notification = if provider.is_paid() {
            Some(("00", "Payment confirmed by status check"))
        } else if provider.is_cancelled() {
            Some(("02", "Payment cancelled at provider"))
        } else {
            None
        };

        let reconciled = match notification {
            Some((code, description)) => {
                let result = self
                    .reconciler
                    .apply(WebhookNotification {
                        order_code: payment.order_code,
                        code: code.to_string(),
                        description: description.to_string(),
                        amount: provider.amount_paid,
                        reference: None,
                    })
                    .await;
                Some(result.outcome)
            }
            None => None,
        };

        let status = match reconciled {
            Some(_) => self
                .reader
                .find_payment(payment.id)
                .await?
                .map(|p| p.status)
                .unwrap_or(payment.status),
            None => payment.status,
        };

        Ok(CheckPaymentStatusResult {
            payment_id: payment.id,
            order_code: payment.order_code,
            status,
            provider_status: Some(provider.status),
            reconciled,
        })
    }
}
