//! Shared step that moves a pending intent to its terminal state.

use crate::domain::billing::{Payment, PaymentLog, PaymentStatus, SubscriptionStatus};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::BillingTransaction;

/// Resolves a pending payment into the status carried by `entry`.
///
/// Writes the conditional payment update, the ledger entry, and for an
/// abandoned intent the paired subscription cancel. Returns `false` without
/// writing anything when the payment is no longer pending.
pub(crate) async fn resolve_intent(
    tx: &mut dyn BillingTransaction,
    payment: &Payment,
    entry: PaymentLog,
    now: Timestamp,
) -> Result<bool, DomainError> {
    let target = entry.status;
    if !tx
        .transition_payment(payment.id, PaymentStatus::Pending, target, now)
        .await?
    {
        return Ok(false);
    }

    tx.append_log(&entry).await?;

    if matches!(target, PaymentStatus::Cancelled | PaymentStatus::Failed) {
        // Already cancelled when another purchase was activated first.
        tx.transition_subscription(
            payment.subscription_id,
            &[SubscriptionStatus::Pending],
            SubscriptionStatus::Canceled,
            now,
        )
        .await?;
    }

    Ok(true)
}
