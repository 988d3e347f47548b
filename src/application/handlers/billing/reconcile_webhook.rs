//! ReconcileWebhookHandler - Applies provider notifications to local state.
//!
//! Deliveries may repeat, arrive out of order, or race each other. Every
//! payment transition is a conditional update out of `Pending`, so exactly
//! one delivery per payment changes anything; the rest are reported as
//! duplicates.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{
    Abandonment, BillingError, OrderCode, PaymentLog, PaymentOutcome, PaymentStatus,
    ProviderResultCode, RestorationPolicy,
};
use crate::domain::foundation::Timestamp;
use crate::ports::{BillingReader, BillingStore, PaymentGateway, WebhookNotification};

use super::intent_resolution::resolve_intent;
use super::subscription_lifecycle::SubscriptionLifecycle;

/// Raw webhook delivery.
#[derive(Debug, Clone)]
pub struct ReconcileWebhookCommand {
    pub payload: Vec<u8>,
    /// Signature supplied out of band (header), if any.
    pub signature: Option<String>,
}

/// What a delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Failed authenticity or shape checks.
    Rejected,
    /// No payment carries the order code.
    UnknownOrder,
    /// The payment was already resolved.
    Duplicate,
    Completed,
    Cancelled,
    Failed,
    /// Authentic, but processing hit an internal error.
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileWebhookResult {
    /// Whether the delivery should be acknowledged as handled.
    pub accepted: bool,
    pub outcome: ReconcileOutcome,
    pub order_code: Option<OrderCode>,
}

impl ReconcileWebhookResult {
    fn new(accepted: bool, outcome: ReconcileOutcome, order_code: Option<OrderCode>) -> Self {
        Self {
            accepted,
            outcome,
            order_code,
        }
    }
}

pub struct ReconcileWebhookHandler {
    store: Arc<dyn BillingStore>,
    reader: Arc<dyn BillingReader>,
    gateway: Arc<dyn PaymentGateway>,
    lifecycle: SubscriptionLifecycle,
    policy: RestorationPolicy,
}

impl ReconcileWebhookHandler {
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

    /// Verifies and applies one delivery. Never fails.
    pub async fn handle(&self, cmd: ReconcileWebhookCommand) -> ReconcileWebhookResult {
        let notification = match self
            .gateway
            .verify_webhook(&cmd.payload, cmd.signature.as_deref())
            .await
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "Webhook rejected");
                return ReconcileWebhookResult::new(false, ReconcileOutcome::Rejected, None);
            }
        };

        self.apply(notification).await
    }

    /// Applies a notification the caller already trusts.
    pub async fn apply(&self, notification: WebhookNotification) -> ReconcileWebhookResult {
        let order_code = notification.order_code;
        match self.try_apply(&notification).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    order_code = %order_code,
                    error = %e,
                    "Webhook processing failed after verification"
                );
                ReconcileWebhookResult::new(true, ReconcileOutcome::Errored, Some(order_code))
            }
        }
    }

    async fn try_apply(
        &self,
        notification: &WebhookNotification,
    ) -> Result<ReconcileWebhookResult, BillingError> {
        let order_code = notification.order_code;

        let payment = match self.reader.find_payment_by_order_code(order_code).await? {
            Some(p) => p,
            None => {
                tracing::warn!(order_code = %order_code, "Webhook for unknown order code");
                return Ok(ReconcileWebhookResult::new(
                    false,
                    ReconcileOutcome::UnknownOrder,
                    Some(order_code),
                ));
            }
        };

        let outcome = ProviderResultCode::parse(&notification.code).outcome(&notification.description);

        if payment.is_terminal() {
            if outcome == PaymentOutcome::Paid && payment.status == PaymentStatus::Cancelled {
                tracing::warn!(
                    order_code = %order_code,
                    payment_id = %payment.id,
                    "Payment success received for a cancelled payment, manual review required"
                );
            } else {
                tracing::info!(
                    order_code = %order_code,
                    status = %payment.status,
                    "Duplicate webhook ignored"
                );
            }
            return Ok(ReconcileWebhookResult::new(
                true,
                ReconcileOutcome::Duplicate,
                Some(order_code),
            ));
        }

        let now = Timestamp::now();
        let entry = match outcome {
            PaymentOutcome::Paid => PaymentLog::completed(
                payment.id,
                notification.reference.as_deref().unwrap_or("N/A"),
                now,
            ),
            PaymentOutcome::Cancelled => {
                PaymentLog::cancelled_by_provider(payment.id, &notification.description, now)
            }
            PaymentOutcome::Failed => PaymentLog::failed(payment.id, &notification.description, now),
        };

        let mut tx = self.store.begin().await?;
        tx.lock_user(&payment.user_id).await?;

        if !resolve_intent(tx.as_mut(), &payment, entry, now).await? {
            tracing::info!(order_code = %order_code, "Concurrent delivery already resolved payment");
            return Ok(ReconcileWebhookResult::new(
                true,
                ReconcileOutcome::Duplicate,
                Some(order_code),
            ));
        }

        if outcome == PaymentOutcome::Paid {
            self.lifecycle
                .activate(tx.as_mut(), &payment.user_id, payment.subscription_id, now)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_code = %order_code,
            payment_id = %payment.id,
            outcome = ?outcome,
            "Payment reconciled"
        );

        let (abandonment, reconciled) = match outcome {
            PaymentOutcome::Paid => {
                return Ok(ReconcileWebhookResult::new(
                    true,
                    ReconcileOutcome::Completed,
                    Some(order_code),
                ))
            }
            PaymentOutcome::Cancelled => (Abandonment::Cancelled, ReconcileOutcome::Cancelled),
            PaymentOutcome::Failed => (Abandonment::Failed, ReconcileOutcome::Failed),
        };

        if self.policy.applies_to(abandonment) {
            let restore = self
                .lifecycle
                .restore_after_cancellation(&payment.user_id, payment.subscription_id)
                .await;
            tracing::info!(order_code = %order_code, restore = ?restore, "Entitlement restoration finished");
        }

        Ok(ReconcileWebhookResult::new(true, reconciled, Some(order_code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::payos::MockPaymentGateway;
    use crate::application::handlers::billing::test_support::Fixture;
    use crate::domain::billing::SubscriptionStatus;

    fn delivery(order_code: OrderCode, code: &str, desc: &str) -> ReconcileWebhookCommand {
        ReconcileWebhookCommand {
            payload: MockPaymentGateway::webhook_payload(order_code, code, desc),
            signature: None,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Outcome Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn success_completes_payment_and_activates_subscription() {
        let fx = Fixture::new().await;
        let (sub, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let result = fx
            .reconcile_handler()
            .handle(delivery(payment.order_code, "00", "success"))
            .await;

        assert!(result.accepted);
        assert_eq!(result.outcome, ReconcileOutcome::Completed);
        assert_eq!(fx.store.payment(payment.id).await.unwrap().status, PaymentStatus::Completed);
        let sub = fx.store.subscription(sub.id).await.unwrap();
        assert!(sub.is_active());
        assert!(sub.activated_at.is_some());

        let logs = fx.store.logs_for(payment.id).await;
        assert_eq!(
            logs.last().unwrap().description,
            format!(
                "Payment completed successfully via PayOS. Reference: REF{}",
                payment.order_code
            )
        );
    }

    #[tokio::test]
    async fn success_deactivates_previous_subscription() {
        let fx = Fixture::new().await;
        let old = fx
            .seed_active_subscription(fx.free.id, Timestamp::now().minus_days(5))
            .await;
        let (sub, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        fx.reconcile_handler()
            .handle(delivery(payment.order_code, "00", "success"))
            .await;

        let active = fx.store.active_subscriptions(&fx.user.id).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, sub.id);
        assert_eq!(
            fx.store.subscription(old.id).await.unwrap().status,
            SubscriptionStatus::Canceled
        );
    }

    #[tokio::test]
    async fn cancel_code_cancels_and_restores() {
        let fx = Fixture::new().await;
        let previous = fx
            .seed_cancelled_paid_subscription(fx.premium.id, Timestamp::now().minus_days(3))
            .await;
        let (sub, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let result = fx
            .reconcile_handler()
            .handle(delivery(payment.order_code, "02", "Buyer left"))
            .await;

        assert_eq!(result.outcome, ReconcileOutcome::Cancelled);
        assert_eq!(fx.store.payment(payment.id).await.unwrap().status, PaymentStatus::Cancelled);
        assert_eq!(
            fx.store.subscription(sub.id).await.unwrap().status,
            SubscriptionStatus::Canceled
        );
        assert!(fx.store.subscription(previous.id).await.unwrap().is_active());
        assert_eq!(
            fx.store.logs_for(payment.id).await.last().unwrap().description,
            "Payment cancelled via PayOS. Reason: Buyer left"
        );
    }

    #[tokio::test]
    async fn unknown_code_mentioning_cancel_is_a_cancel() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let result = fx
            .reconcile_handler()
            .handle(delivery(payment.order_code, "99", "Transaction CANCELLED by bank"))
            .await;

        assert_eq!(result.outcome, ReconcileOutcome::Cancelled);
    }

    #[tokio::test]
    async fn failure_code_fails_payment_and_assigns_free_plan() {
        let fx = Fixture::new().await;
        let (sub, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let result = fx
            .reconcile_handler()
            .handle(delivery(payment.order_code, "01", "Invalid params"))
            .await;

        assert_eq!(result.outcome, ReconcileOutcome::Failed);
        assert_eq!(fx.store.payment(payment.id).await.unwrap().status, PaymentStatus::Failed);
        assert_eq!(
            fx.store.subscription(sub.id).await.unwrap().status,
            SubscriptionStatus::Canceled
        );
        let active = fx.store.active_subscriptions(&fx.user.id).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].plan_id, fx.free.id);
    }

    #[tokio::test]
    async fn failure_without_restoration_policy_leaves_user_unentitled() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        fx.reconcile_handler_with(RestorationPolicy::cancel_only())
            .handle(delivery(payment.order_code, "01", "Invalid params"))
            .await;

        assert!(fx.store.active_subscriptions(&fx.user.id).await.is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Idempotency Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn repeated_delivery_is_duplicate() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;
        let handler = fx.reconcile_handler();

        handler.handle(delivery(payment.order_code, "00", "success")).await;
        let second = handler.handle(delivery(payment.order_code, "00", "success")).await;

        assert!(second.accepted);
        assert_eq!(second.outcome, ReconcileOutcome::Duplicate);
        assert_eq!(fx.store.logs_for(payment.id).await.len(), 2);
    }

    #[tokio::test]
    async fn late_success_does_not_revive_cancelled_payment() {
        let fx = Fixture::new().await;
        let (sub, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;
        let handler = fx.reconcile_handler();

        handler.handle(delivery(payment.order_code, "02", "cancelled")).await;
        let late = handler.handle(delivery(payment.order_code, "00", "success")).await;

        assert_eq!(late.outcome, ReconcileOutcome::Duplicate);
        assert_eq!(fx.store.payment(payment.id).await.unwrap().status, PaymentStatus::Cancelled);
        assert!(!fx.store.subscription(sub.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn concurrent_deliveries_apply_once() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;
        let handler = Arc::new(fx.reconcile_handler());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handler = Arc::clone(&handler);
            let cmd = delivery(payment.order_code, "00", "success");
            tasks.push(tokio::spawn(async move { handler.handle(cmd).await }));
        }

        let mut completed = 0;
        for task in tasks {
            if task.await.unwrap().outcome == ReconcileOutcome::Completed {
                completed += 1;
            }
        }

        assert_eq!(completed, 1);
        assert_eq!(fx.store.logs_for(payment.id).await.len(), 2);
        assert_eq!(fx.store.active_subscriptions(&fx.user.id).await.len(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Rejection Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unverifiable_delivery_is_rejected_without_mutation() {
        let fx = Fixture::with_gateway(MockPaymentGateway::rejecting_webhooks()).await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let result = fx
            .reconcile_handler()
            .handle(delivery(payment.order_code, "00", "success"))
            .await;

        assert!(!result.accepted);
        assert_eq!(result.outcome, ReconcileOutcome::Rejected);
        assert_eq!(fx.store.payment(payment.id).await.unwrap().status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_order_code_is_not_accepted() {
        let fx = Fixture::new().await;

        let result = fx
            .reconcile_handler()
            .handle(delivery(OrderCode::new(123456).unwrap(), "00", "success"))
            .await;

        assert!(!result.accepted);
        assert_eq!(result.outcome, ReconcileOutcome::UnknownOrder);
    }
}
