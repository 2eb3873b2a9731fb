use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::ReconcilerConfig,
    domain::*,
    error::{AppError, Result},
    payments::{CreatePaymentRequest, PaymentProvider, ProviderPayment},
    repository::{BookingRepository, PaymentRepository, SlotRepository},
    service::{cancellation::CancellationService, notification_service::NotificationService},
};

/// What a single provider observation changed locally.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub payment_status: PaymentStatus,
    pub payment_advanced: bool,
    pub booking_confirmed: bool,
    pub booking_released: bool,
    /// Refunded because the payment settled after the booking was cancelled.
    pub refunded_cents: i64,
}

/// Booking state as shown on the customer's return page.
#[derive(Debug, Clone, Serialize)]
pub struct BookingStatusView {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub payment_status: Option<PaymentStatus>,
    pub deposit_amount_cents: i64,
    pub currency: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Mirrors provider payment state onto payments, bookings and slots.
///
/// Webhooks, the return-page sync and the stale-pending sweep all end up in
/// [`Reconciler::apply_provider_state`], which is safe to replay with the
/// same or an older observation.
pub struct Reconciler {
    pool: SqlitePool,
    booking_repo: Arc<dyn BookingRepository>,
    slot_repo: Arc<dyn SlotRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    provider: Arc<dyn PaymentProvider>,
    notifier: Arc<NotificationService>,
    refunds: Arc<CancellationService>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        pool: SqlitePool,
        booking_repo: Arc<dyn BookingRepository>,
        slot_repo: Arc<dyn SlotRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<NotificationService>,
        refunds: Arc<CancellationService>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            pool,
            booking_repo,
            slot_repo,
            payment_repo,
            provider,
            notifier,
            refunds,
            config,
        }
    }

    /// Create the provider payment for a booking's deposit. The booking
    /// itself does not move until the provider reports it paid.
    pub async fn start_checkout(&self, booking_id: Uuid) -> Result<Payment> {
        let booking = self.booking_repo.find_by_id(booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.status != BookingStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Booking is {:?}, checkout is only possible while Pending",
                booking.status
            )));
        }
        if booking.deposit_amount_cents <= 0 {
            return Err(AppError::BadRequest("Booking has no deposit to pay".to_string()));
        }

        let checkout = self.provider
            .create_payment(CreatePaymentRequest {
                booking_id,
                amount_cents: booking.deposit_amount_cents,
                currency: booking.currency.clone(),
                description: format!("Deposit for booking {}", booking_id),
            })
            .await?;

        let now = Utc::now();
        let payment = self.payment_repo
            .create(Payment {
                id: Uuid::new_v4(),
                booking_id,
                provider: self.provider.name().to_string(),
                payment_type: PaymentType::Deposit,
                status: PaymentStatus::Created,
                provider_payment_id: checkout.id,
                amount_cents: booking.deposit_amount_cents,
                currency: booking.currency,
                client_secret: checkout.client_secret,
                checkout_url: checkout.checkout_url,
                paid_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            "Started checkout {} ({}) for booking {}",
            payment.id,
            payment.provider_payment_id,
            booking_id
        );

        Ok(payment)
    }

    /// Webhook entry point. The payload only tells us which payment to look
    /// at; its state is always fetched from the provider.
    pub async fn handle_webhook(&self, provider_payment_id: &str) -> Result<Option<ReconcileOutcome>> {
        let payment = match self.payment_repo.find_by_provider_id(provider_payment_id).await? {
            Some(payment) => payment,
            None => {
                tracing::warn!("Webhook for unknown payment {}, acknowledging", provider_payment_id);
                return Ok(None);
            }
        };

        let observed = self.provider.get_payment(&payment.provider_payment_id).await?;
        self.apply_provider_state(&payment, &observed).await.map(Some)
    }

    /// Pull every open payment of a booking (and always the newest one) from
    /// the provider and apply what it reports.
    pub async fn sync_booking(&self, booking_id: Uuid) -> Result<BookingStatusView> {
        // Existence check before any provider traffic.
        self.booking_repo.find_by_id(booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let payments = self.payment_repo.list_by_booking(booking_id).await?;
        for (index, payment) in payments.iter().enumerate() {
            if index > 0 && payment.status.is_terminal() {
                continue;
            }
            let observed = self.provider.get_payment(&payment.provider_payment_id).await?;
            self.apply_provider_state(payment, &observed).await?;
        }

        self.status(booking_id).await
    }

    /// Read-only status; no provider call.
    pub async fn status(&self, booking_id: Uuid) -> Result<BookingStatusView> {
        let booking = self.booking_repo.find_by_id(booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        let latest = self.payment_repo.list_by_booking(booking_id).await?.into_iter().next();

        Ok(BookingStatusView {
            booking_id,
            status: booking.status,
            payment_status: latest.map(|p| p.status),
            deposit_amount_cents: booking.deposit_amount_cents,
            currency: booking.currency,
            confirmed_at: booking.confirmed_at,
            cancelled_at: booking.cancelled_at,
        })
    }

    /// Apply one provider observation. Payment, booking and slot change in a
    /// single transaction; notifications go out only after it commits.
    pub async fn apply_provider_state(
        &self,
        payment: &Payment,
        observed: &ProviderPayment,
    ) -> Result<ReconcileOutcome> {
        let booking = self.booking_repo.find_by_id(payment.booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if observed.amount_cents != payment.amount_cents {
            tracing::warn!(
                "Provider reports {} cents for payment {}, expected {}",
                observed.amount_cents,
                payment.id,
                payment.amount_cents
            );
        }

        let target = observed.status.to_local();
        let now = Utc::now();
        let mut booking_confirmed = false;
        let mut booking_released = false;
        let mut paid_after_cancel = false;

        let mut tx = self.pool.begin().await?;

        let payment_advanced = self.payment_repo
            .advance_status(&mut *tx, payment.id, target, now)
            .await?;

        match target {
            PaymentStatus::Paid => {
                booking_confirmed = self.booking_repo.confirm(&mut *tx, booking.id, now).await?;
                if booking_confirmed {
                    self.slot_repo.mark_booked(&mut *tx, booking.slot_id).await?;
                } else if booking.status == BookingStatus::Cancelled {
                    paid_after_cancel = true;
                }
            }
            PaymentStatus::Canceled if self.config.release_on_unpaid_terminal => {
                booking_released = self.booking_repo.cancel_if_unpaid(&mut *tx, booking.id, now).await?;
                if booking_released {
                    self.slot_repo.release(&mut *tx, booking.slot_id).await?;
                }
            }
            _ => {}
        }

        tx.commit().await?;

        if payment_advanced {
            tracing::info!("Payment {} is now {:?}", payment.id, target);
        }
        if booking_confirmed {
            tracing::info!("Booking {} confirmed by payment {}", booking.id, payment.id);
        }
        if booking_released {
            tracing::info!("Booking {} released after unpaid {:?} payment", booking.id, target);
        }

        // Also covers a confirmed booking whose earlier email attempt failed;
        // the claim keeps this to one burst.
        if target == PaymentStatus::Paid
            && (booking_confirmed || booking.status == BookingStatus::Confirmed)
        {
            if let Err(e) = self.notifier.notify_confirmed(booking.id).await {
                tracing::error!("Notification for booking {} failed, will retry on next sync: {}", booking.id, e);
            }
        }

        let mut refunded_cents = 0;
        if paid_after_cancel {
            tracing::warn!(
                "Payment {} was paid for cancelled booking {}, running refunds",
                payment.id,
                booking.id
            );
            match self.refunds.refund_cancelled(booking.id).await {
                Ok(outcome) => refunded_cents = outcome.refund_amount_cents,
                Err(e) => tracing::error!("Refund for cancelled booking {} failed: {}", booking.id, e),
            }
        }

        Ok(ReconcileOutcome {
            booking_id: booking.id,
            payment_id: payment.id,
            payment_status: target,
            payment_advanced,
            booking_confirmed,
            booking_released,
            refunded_cents,
        })
    }

    /// Re-sync bookings that have stayed Pending longer than the configured
    /// timeout. Returns how many were synced successfully.
    pub async fn sweep_stale_pending(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::minutes(self.config.pending_timeout_minutes);
        let stale = self.booking_repo.list_stale_pending(cutoff, 100).await?;

        let mut synced = 0;
        for booking in stale {
            match self.sync_booking(booking.id).await {
                Ok(_) => synced += 1,
                Err(e) => tracing::warn!("Sweep could not sync booking {}: {}", booking.id, e),
            }
        }

        if synced > 0 {
            tracing::debug!("Sweep synced {} stale booking(s)", synced);
        }
        Ok(synced)
    }
}
