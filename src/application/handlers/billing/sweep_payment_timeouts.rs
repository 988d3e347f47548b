//! SweepPaymentTimeoutsHandler - Fails intents the provider never reported on.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{Abandonment, BillingError, OrderCode, Payment, PaymentLog, RestorationPolicy};
use crate::domain::foundation::Timestamp;
use crate::ports::{BillingReader, BillingStore, PaymentGateway};

use super::intent_resolution::resolve_intent;
use super::subscription_lifecycle::SubscriptionLifecycle;

#[derive(Debug, Clone, Copy)]
pub struct SweepPaymentTimeoutsCommand {
    /// Pending payments older than this are timed out.
    pub threshold_minutes: i64,
    /// Maximum payments handled per sweep.
    pub batch_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepResult {
    pub processed_count: usize,
    pub failed_order_codes: Vec<OrderCode>,
}

pub struct SweepPaymentTimeoutsHandler {
    store: Arc<dyn BillingStore>,
    reader: Arc<dyn BillingReader>,
    gateway: Arc<dyn PaymentGateway>,
    lifecycle: SubscriptionLifecycle,
    policy: RestorationPolicy,
}

impl SweepPaymentTimeoutsHandler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        reader: Arc<dyn BillingReader>,
        gateway: Arc<dyn PaymentGateway>,
        lifecycle: SubscriptionLifecycle,
        policy: RestorationPolicy,
    ) -> Self {
        Self {
            store,
            reader,
            gateway,
            lifecycle,
            policy,
        }
    }

    pub async fn handle(&self, cmd: SweepPaymentTimeoutsCommand) -> Result<SweepResult, BillingError> {
        let cutoff = Timestamp::now().minus_minutes(cmd.threshold_minutes);
        let stale = self
            .reader
            .find_stale_pending_payments(cutoff, cmd.batch_size)
            .await?;

        let mut result = SweepResult::default();
        if stale.is_empty() {
            return Ok(result);
        }

        tracing::info!(count = stale.len(), threshold_minutes = cmd.threshold_minutes, "Sweeping timed out payments");

        for payment in stale {
            match self.expire(&payment, cmd.threshold_minutes).await {
                Ok(true) => result.processed_count += 1,
                Ok(false) => {
                    tracing::debug!(order_code = %payment.order_code, "Payment resolved before sweep reached it");
                }
                Err(e) => {
                    tracing::warn!(
                        order_code = %payment.order_code,
                        error = %e,
                        "Failed to time out payment"
                    );
                    result.failed_order_codes.push(payment.order_code);
                }
            }
        }

        tracing::info!(
            processed = result.processed_count,
            failed = result.failed_order_codes.len(),
            "Timeout sweep finished"
        );
        Ok(result)
    }

    async fn expire(&self, payment: &Payment, threshold_minutes: i64) -> Result<bool, BillingError> {
        let now = Timestamp::now();
        let mut tx = self.store.begin().await?;
        tx.lock_user(&payment.user_id).await?;

        let entry = PaymentLog::timed_out(payment.id, threshold_minutes, now);
        if !resolve_intent(tx.as_mut(), payment, entry, now).await? {
            return Ok(false);
        }
        tx.commit().await?;

        if let Err(e) = self
            .gateway
            .cancel_link(payment.order_code, Some("Payment timed out"))
            .await
        {
            tracing::warn!(
                order_code = %payment.order_code,
                error = %e,
                "Failed to cancel timed out payment link"
            );
        }

        if self.policy.applies_to(Abandonment::TimedOut) {
            self.lifecycle
                .restore_after_cancellation(&payment.user_id, payment.subscription_id)
                .await;
        }

        Ok(true)
    }
}
