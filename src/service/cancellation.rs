use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::RefundPolicy,
    domain::*,
    error::{AppError, Result},
    payments::PaymentProvider,
    repository::{BookingRepository, PaymentRepository, RefundRepository, SlotRepository},
};

/// A refund the provider accepted but that could not be written locally.
/// Needs manual review; never retried automatically.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReconciliationGap {
    pub payment_id: Uuid,
    pub provider_refund_id: String,
    pub amount_cents: i64,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    /// False when the booking was already cancelled before this call.
    pub cancelled_now: bool,
    pub refund_eligible: bool,
    pub refunded: bool,
    pub refund_amount_cents: i64,
    /// Payments whose refund could not be attempted because the provider was unreachable.
    pub skipped_payments: Vec<Uuid>,
    /// Payments where the local refund ledger and the provider disagree by
    /// more than the configured alert threshold.
    pub drifted_payments: Vec<Uuid>,
    pub reconciliation_gaps: Vec<ReconciliationGap>,
}

impl CancellationOutcome {
    fn new(booking_id: Uuid, cancelled_now: bool, refund_eligible: bool) -> Self {
        Self {
            booking_id,
            status: BookingStatus::Cancelled,
            cancelled_now,
            refund_eligible,
            refunded: false,
            refund_amount_cents: 0,
            skipped_payments: Vec::new(),
            drifted_payments: Vec::new(),
            reconciliation_gaps: Vec::new(),
        }
    }
}

pub struct CancellationService {
    pool: SqlitePool,
    booking_repo: Arc<dyn BookingRepository>,
    slot_repo: Arc<dyn SlotRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    refund_repo: Arc<dyn RefundRepository>,
    provider: Arc<dyn PaymentProvider>,
    policy: RefundPolicy,
}

impl CancellationService {
    pub fn new(
        pool: SqlitePool,
        booking_repo: Arc<dyn BookingRepository>,
        slot_repo: Arc<dyn SlotRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        refund_repo: Arc<dyn RefundRepository>,
        provider: Arc<dyn PaymentProvider>,
        policy: RefundPolicy,
    ) -> Self {
        Self {
            pool,
            booking_repo,
            slot_repo,
            payment_repo,
            refund_repo,
            provider,
            policy,
        }
    }

    /// Cancel a booking and refund what is still owed on it.
    ///
    /// The booking and its slot are updated before the provider is contacted,
    /// so an unreachable provider never blocks a cancellation. Calling this on
    /// an already-cancelled booking only repeats the refund pass.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        actor: CancelActor,
        client_eligibility_hint: Option<bool>,
    ) -> Result<CancellationOutcome> {
        let booking = self.booking_repo.find_by_id(booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        let slot = self.slot_repo.find_by_id(booking.slot_id).await?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let cancelled_now = self.booking_repo.cancel(&mut *tx, booking_id, actor, now).await?;
        let released = self.slot_repo.release(&mut *tx, slot.id).await?;
        tx.commit().await?;

        if cancelled_now {
            tracing::info!(
                "Booking {} cancelled by {} (slot {} released: {})",
                booking_id,
                actor.as_str(),
                slot.id,
                released
            );
        } else {
            tracing::info!("Booking {} was already cancelled, re-running refunds", booking_id);
        }

        let refund_eligible = self.refund_eligible(&slot, now);

        if let Some(hint) = client_eligibility_hint {
            if hint != refund_eligible {
                tracing::info!(
                    "Client expected refund eligibility {} for booking {}, policy says {}",
                    hint,
                    booking_id,
                    refund_eligible
                );
            }
        }

        let mut outcome = CancellationOutcome::new(booking_id, cancelled_now, refund_eligible);
        if refund_eligible {
            self.refund_pass(booking_id, &mut outcome).await?;
        }

        Ok(outcome)
    }

    /// Refund a booking that is already cancelled, for a payment that settled
    /// after the cancellation. Outside the refund window nothing is refunded.
    pub async fn refund_cancelled(&self, booking_id: Uuid) -> Result<CancellationOutcome> {
        let booking = self.booking_repo.find_by_id(booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        if booking.status != BookingStatus::Cancelled {
            return Err(AppError::Conflict(format!(
                "Booking is {:?}, only cancelled bookings are refunded",
                booking.status
            )));
        }
        let slot = self.slot_repo.find_by_id(booking.slot_id).await?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

        let refund_eligible = self.refund_eligible(&slot, Utc::now());
        let mut outcome = CancellationOutcome::new(booking_id, false, refund_eligible);
        if refund_eligible {
            self.refund_pass(booking_id, &mut outcome).await?;
        } else {
            tracing::info!("Booking {} is outside the refund window, late payment kept", booking_id);
        }

        Ok(outcome)
    }

    fn refund_eligible(&self, slot: &Slot, now: DateTime<Utc>) -> bool {
        self.policy.enabled && now <= slot.start_time - Duration::hours(self.policy.cutoff_hours)
    }

    async fn refund_pass(&self, booking_id: Uuid, outcome: &mut CancellationOutcome) -> Result<()> {
        let payments: Vec<Payment> = self.payment_repo
            .list_by_booking(booking_id)
            .await?
            .into_iter()
            .filter(|p| p.status != PaymentStatus::Canceled)
            .collect();

        // The provider decides what was captured; a local row may still be open
        // when the cancellation overtakes the webhook.
        let mut paid_total = 0;
        let mut captured = Vec::new();
        for payment in payments {
            match self.provider.get_payment(&payment.provider_payment_id).await {
                Ok(observed) if payment.status.is_settled() || observed.status.to_local().is_settled() => {
                    paid_total += payment.amount_cents;
                    captured.push((payment, observed));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Skipping refund for payment {}: {}", payment.id, e);
                    if payment.status.is_settled() {
                        paid_total += payment.amount_cents;
                    }
                    outcome.skipped_payments.push(payment.id);
                }
            }
        }

        if captured.is_empty() {
            return Ok(());
        }

        let mut still_owed = paid_total - self.refund_repo.sum_for_booking(booking_id).await?;

        for (payment, observed) in &captured {
            if !payment.status.is_settled() && observed.status.to_local() == PaymentStatus::Paid {
                let mut conn = self.pool.acquire().await?;
                self.payment_repo
                    .advance_status(&mut *conn, payment.id, PaymentStatus::Paid, Utc::now())
                    .await?;
            }

            if still_owed <= 0 {
                break;
            }

            let local = self.refund_repo.sum_for_payment(payment.id).await?;
            if (local - observed.refunded_cents).abs() > self.policy.drift_alert_cents {
                tracing::warn!(
                    booking_id = %booking_id,
                    payment_id = %payment.id,
                    local_refunded = local,
                    provider_refunded = observed.refunded_cents,
                    "Refund drift between local ledger and provider"
                );
                outcome.drifted_payments.push(payment.id);
            }

            let already = local.max(observed.refunded_cents);
            let remaining = (payment.amount_cents - already).min(still_owed);
            let mut refunded_for_payment = already;

            if remaining > 0 {
                let key = refund_idempotency_key(booking_id, payment.id, remaining);
                let refund = match self.provider
                    .create_refund(&payment.provider_payment_id, remaining, &key)
                    .await
                {
                    Ok(refund) => refund,
                    Err(e) => {
                        tracing::warn!("Refund of {} for payment {} failed: {}", remaining, payment.id, e);
                        outcome.skipped_payments.push(payment.id);
                        continue;
                    }
                };

                still_owed -= refund.amount_cents;
                refunded_for_payment += refund.amount_cents;
                outcome.refund_amount_cents += refund.amount_cents;
                outcome.refunded = true;

                let record = Refund {
                    id: Uuid::new_v4(),
                    booking_id,
                    payment_id: payment.id,
                    amount_cents: refund.amount_cents,
                    currency: payment.currency.clone(),
                    provider: payment.provider.clone(),
                    provider_refund_id: refund.id.clone(),
                    idempotency_key: key,
                    created_at: Utc::now(),
                };

                match self.refund_repo.record(record).await {
                    Ok(_) => {
                        tracing::info!(
                            "Refunded {} on payment {} ({})",
                            refund.amount_cents,
                            payment.id,
                            refund.id
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            booking_id = %booking_id,
                            payment_id = %payment.id,
                            provider_refund_id = %refund.id,
                            amount_cents = refund.amount_cents,
                            "Reconciliation gap: provider refund not recorded locally: {}",
                            e
                        );
                        outcome.reconciliation_gaps.push(ReconciliationGap {
                            payment_id: payment.id,
                            provider_refund_id: refund.id,
                            amount_cents: refund.amount_cents,
                            error: e.to_string(),
                        });
                    }
                }
            }

            if refunded_for_payment >= payment.amount_cents && payment.status != PaymentStatus::Refunded {
                let mut conn = self.pool.acquire().await?;
                self.payment_repo
                    .advance_status(&mut *conn, payment.id, PaymentStatus::Refunded, Utc::now())
                    .await?;
            }
        }

        Ok(())
    }
}

/// Deterministic key for one refund attempt. Retrying the same amount for the
/// same payment reuses the key, so the provider deduplicates it.
pub fn refund_idempotency_key(booking_id: Uuid, payment_id: Uuid, amount_cents: i64) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", booking_id, payment_id, amount_cents).as_bytes());
    let hex = hex::encode(digest);
    format!("refund-{}", &hex[..32])
}
