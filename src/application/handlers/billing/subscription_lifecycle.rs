//! SubscriptionLifecycle - entitlement changes that span several subscriptions.
//!
//! Keeps the "at most one active subscription per user" invariant while
//! payments resolve, and puts users back on a valid plan when a purchase
//! attempt is abandoned.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{BillingError, SubscriptionStatus, UserSubscription};
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId};
use crate::ports::{BillingStore, BillingTransaction, PlanCatalog};

/// What `restore_after_cancellation` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "subscription_id", rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// The user still had a valid active subscription; nothing changed.
    AlreadyEntitled,
    /// A previously active subscription was reactivated.
    Restored(SubscriptionId),
    /// The user was placed on the free plan.
    FreePlanAssigned(SubscriptionId),
    /// Nothing could be restored; needs manual attention.
    Failed,
}

#[derive(Clone)]
pub struct SubscriptionLifecycle {
    store: Arc<dyn BillingStore>,
    plans: Arc<dyn PlanCatalog>,
}

impl SubscriptionLifecycle {
    pub fn new(store: Arc<dyn BillingStore>, plans: Arc<dyn PlanCatalog>) -> Self {
        Self { store, plans }
    }

    /// Cancels every active or pending subscription of the user except `except`.
    pub async fn deactivate_others(
        &self,
        tx: &mut dyn BillingTransaction,
        user_id: &UserId,
        except: SubscriptionId,
        now: Timestamp,
    ) -> Result<Vec<SubscriptionId>, DomainError> {
        let cancelled = tx.cancel_other_subscriptions(user_id, except, now).await?;
        if !cancelled.is_empty() {
            tracing::info!(
                user_id = %user_id,
                kept = %except,
                cancelled = cancelled.len(),
                "Deactivated other subscriptions"
            );
        }
        Ok(cancelled)
    }

    /// Makes `subscription_id` the user's only active subscription.
    ///
    /// Returns `false` when the subscription is neither pending nor cancelled.
    pub async fn activate(
        &self,
        tx: &mut dyn BillingTransaction,
        user_id: &UserId,
        subscription_id: SubscriptionId,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        tx.lock_user(user_id).await?;
        self.deactivate_others(tx, user_id, subscription_id, now).await?;

        let activated = tx
            .transition_subscription(
                subscription_id,
                &[SubscriptionStatus::Pending, SubscriptionStatus::Canceled],
                SubscriptionStatus::Active,
                now,
            )
            .await?;

        if activated {
            tracing::info!(user_id = %user_id, subscription_id = %subscription_id, "Subscription activated");
        } else {
            tracing::warn!(
                user_id = %user_id,
                subscription_id = %subscription_id,
                "Subscription could not be activated from its current state"
            );
        }
        Ok(activated)
    }

    /// Grants the free plan as a new active subscription.
    pub async fn assign_free_plan(
        &self,
        tx: &mut dyn BillingTransaction,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<SubscriptionId, BillingError> {
        let plan = self
            .plans
            .find_free_plan()
            .await?
            .ok_or_else(|| BillingError::not_found("plan", "free"))?;

        let subscription = UserSubscription::new_active(user_id.clone(), plan.id, plan.duration_days, now);

        tx.lock_user(user_id).await?;
        self.deactivate_others(tx, user_id, subscription.id, now).await?;
        tx.insert_subscription(&subscription).await?;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription.id,
            plan = %plan.name,
            "Free plan assigned"
        );
        Ok(subscription.id)
    }

    /// Puts the user back on a valid subscription after `cancelled_id` was abandoned.
    ///
    /// Never fails: errors fall back to a free-plan grant, and if that fails
    /// too the outcome is [`RestoreOutcome::Failed`].
    pub async fn restore_after_cancellation(
        &self,
        user_id: &UserId,
        cancelled_id: SubscriptionId,
    ) -> RestoreOutcome {
        match self.try_restore(user_id, cancelled_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %err,
                    "Restoration failed, falling back to free plan"
                );
                match self.assign_free_plan_in_new_transaction(user_id).await {
                    Ok(id) => RestoreOutcome::FreePlanAssigned(id),
                    Err(fallback_err) => {
                        tracing::error!(
                            user_id = %user_id,
                            cancelled_subscription_id = %cancelled_id,
                            error = %fallback_err,
                            "Could not restore any subscription, manual intervention required"
                        );
                        RestoreOutcome::Failed
                    }
                }
            }
        }
    }

    async fn try_restore(
        &self,
        user_id: &UserId,
        cancelled_id: SubscriptionId,
    ) -> Result<RestoreOutcome, BillingError> {
        let now = Timestamp::now();
        let mut tx = self.store.begin().await?;
        tx.lock_user(user_id).await?;

        let subscriptions = tx.find_user_subscriptions(user_id).await?;

        for lapsed in subscriptions.iter().filter(|s| s.is_lapsed(&now)) {
            tx.transition_subscription(
                lapsed.id,
                &[SubscriptionStatus::Active],
                SubscriptionStatus::Expired,
                now,
            )
            .await?;
            tracing::info!(subscription_id = %lapsed.id, "Lapsed subscription expired");
        }

        if subscriptions.iter().any(|s| s.grants_access(&now)) {
            tx.commit().await?;
            return Ok(RestoreOutcome::AlreadyEntitled);
        }

        // Newest first, as returned by the store.
        let candidate = subscriptions
            .iter()
            .find(|s| s.id != cancelled_id && s.is_restorable(&now));

        let outcome = match candidate {
            Some(previous) => {
                let restored = tx
                    .transition_subscription(
                        previous.id,
                        &[SubscriptionStatus::Canceled],
                        SubscriptionStatus::Active,
                        now,
                    )
                    .await?;
                if !restored {
                    return Err(BillingError::invalid_state(
                        previous.status.to_string(),
                        "restore",
                    ));
                }
                tracing::info!(
                    user_id = %user_id,
                    subscription_id = %previous.id,
                    "Previous subscription restored"
                );
                RestoreOutcome::Restored(previous.id)
            }
            None => RestoreOutcome::FreePlanAssigned(self.assign_free_plan(tx.as_mut(), user_id, now).await?),
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn assign_free_plan_in_new_transaction(
        &self,
        user_id: &UserId,
    ) -> Result<SubscriptionId, BillingError> {
        let mut tx = self.store.begin().await?;
        let id = self.assign_free_plan(tx.as_mut(), user_id, Timestamp::now()).await?;
        tx.commit().await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Fixture;

    #[tokio::test]
    async fn activate_leaves_single_active_subscription() {
        let fx = Fixture::new().await;
        let now = Timestamp::now();
        let old = fx.seed_active_subscription(fx.premium.id, now.minus_days(3)).await;
        let new = fx.seed_pending_subscription(fx.premium.id, now).await;

        let mut tx = fx.store.begin().await.unwrap();
        assert!(fx.lifecycle().activate(tx.as_mut(), &fx.user.id, new.id, now).await.unwrap());
        tx.commit().await.unwrap();

        let active = fx.store.active_subscriptions(&fx.user.id).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, new.id);
        assert_eq!(
            fx.store.subscription(old.id).await.unwrap().status,
            SubscriptionStatus::Canceled
        );
    }

    #[tokio::test]
    async fn restore_is_noop_when_user_still_entitled() {
        let fx = Fixture::new().await;
        let now = Timestamp::now();
        fx.seed_active_subscription(fx.premium.id, now.minus_days(1)).await;
        let abandoned = fx.seed_pending_subscription(fx.premium.id, now).await;

        let outcome = fx.lifecycle().restore_after_cancellation(&fx.user.id, abandoned.id).await;

        assert_eq!(outcome, RestoreOutcome::AlreadyEntitled);
        assert_eq!(fx.store.subscriptions().await.len(), 2);
    }

    #[tokio::test]
    async fn restore_reactivates_previously_paid_subscription() {
        let fx = Fixture::new().await;
        let now = Timestamp::now();
        let previous = fx.seed_cancelled_paid_subscription(fx.premium.id, now.minus_days(2)).await;
        let abandoned = fx.seed_pending_subscription(fx.premium.id, now).await;

        let outcome = fx.lifecycle().restore_after_cancellation(&fx.user.id, abandoned.id).await;

        assert_eq!(outcome, RestoreOutcome::Restored(previous.id));
        assert!(fx.store.subscription(previous.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn restore_never_reactivates_the_abandoned_subscription() {
        let fx = Fixture::new().await;
        let now = Timestamp::now();
        let mut abandoned = UserSubscription::new_pending(fx.user.id.clone(), fx.premium.id, 30, now);
        abandoned.status = SubscriptionStatus::Canceled;
        abandoned.activated_at = Some(now);
        fx.store.seed_subscription(abandoned.clone()).await;

        let outcome = fx.lifecycle().restore_after_cancellation(&fx.user.id, abandoned.id).await;

        assert!(matches!(outcome, RestoreOutcome::FreePlanAssigned(_)));
        assert_eq!(
            fx.store.subscription(abandoned.id).await.unwrap().status,
            SubscriptionStatus::Canceled
        );
    }

    #[tokio::test]
    async fn restore_skips_never_activated_subscriptions() {
        let fx = Fixture::new().await;
        let now = Timestamp::now();
        let mut unpaid = UserSubscription::new_pending(fx.user.id.clone(), fx.premium.id, 30, now.minus_days(1));
        unpaid.status = SubscriptionStatus::Canceled;
        fx.store.seed_subscription(unpaid.clone()).await;
        let abandoned = fx.seed_pending_subscription(fx.premium.id, now).await;

        let outcome = fx.lifecycle().restore_after_cancellation(&fx.user.id, abandoned.id).await;

        match outcome {
            RestoreOutcome::FreePlanAssigned(id) => {
                let sub = fx.store.subscription(id).await.unwrap();
                assert_eq!(sub.plan_id, fx.free.id);
                assert!(sub.is_active());
                assert!(!sub.auto_renew);
            }
            other => panic!("expected free plan, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn restore_expires_lapsed_active_subscription_first() {
        let fx = Fixture::new().await;
        let now = Timestamp::now();
        let mut lapsed = UserSubscription::new_active(fx.user.id.clone(), fx.premium.id, 30, now.minus_days(40));
        lapsed.end_date = now.minus_days(10);
        fx.store.seed_subscription(lapsed.clone()).await;
        let abandoned = fx.seed_pending_subscription(fx.premium.id, now).await;

        let outcome = fx.lifecycle().restore_after_cancellation(&fx.user.id, abandoned.id).await;

        assert!(matches!(outcome, RestoreOutcome::FreePlanAssigned(_)));
        assert_eq!(
            fx.store.subscription(lapsed.id).await.unwrap().status,
            SubscriptionStatus::Expired
        );
        assert_eq!(fx.store.active_subscriptions(&fx.user.id).await.len(), 1);
    }

    #[tokio::test]
    async fn restore_fails_without_free_plan() {
        let fx = Fixture::without_free_plan().await;
        let abandoned = fx.seed_pending_subscription(fx.premium.id, Timestamp::now()).await;

        let outcome = fx.lifecycle().restore_after_cancellation(&fx.user.id, abandoned.id).await;

        assert_eq!(outcome, RestoreOutcome::Failed);
    }
}
