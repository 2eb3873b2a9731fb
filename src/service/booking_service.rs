use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::PricingPolicy,
    domain::*,
    error::{AppError, Result},
    pricing::{compute_base_total, compute_quote, Quote},
    repository::{
        BookingRepository, CustomerRepository, DiscountCodeRepository, PartnerRepository,
        PaymentRepository, RefundRepository, SlotRepository,
    },
};

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub slot: Slot,
    pub payments: Vec<Payment>,
    pub refunds: Vec<Refund>,
}

pub struct BookingService {
    pool: SqlitePool,
    partner_repo: Arc<dyn PartnerRepository>,
    customer_repo: Arc<dyn CustomerRepository>,
    slot_repo: Arc<dyn SlotRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    refund_repo: Arc<dyn RefundRepository>,
    discount_repo: Arc<dyn DiscountCodeRepository>,
    pricing: PricingPolicy,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        partner_repo: Arc<dyn PartnerRepository>,
        customer_repo: Arc<dyn CustomerRepository>,
        slot_repo: Arc<dyn SlotRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        refund_repo: Arc<dyn RefundRepository>,
        discount_repo: Arc<dyn DiscountCodeRepository>,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            pool,
            partner_repo,
            customer_repo,
            slot_repo,
            booking_repo,
            payment_repo,
            refund_repo,
            discount_repo,
            pricing,
        }
    }

    /// Reserve a slot. The active-slot unique index decides races: the loser
    /// gets `SlotAlreadyReserved` and nothing it wrote survives.
    pub async fn create_booking(&self, partner_slug: &str, request: CreateBookingRequest) -> Result<Booking> {
        request.validate()?;

        let partner = self.partner_by_slug(partner_slug).await?;
        let slot = self.resolve_slot(&partner, request.slot).await?;

        if request.participant_count > slot.max_participants {
            return Err(AppError::Validation(format!(
                "At most {} participants allowed for this slot",
                slot.max_participants
            )));
        }

        let discount_code = match request.discount_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(self.usable_discount(&partner, code).await?),
            _ => None,
        };

        let gross = compute_base_total(&partner.rates, slot.start_time, request.participant_count, &self.pricing);
        let quote = compute_quote(
            gross,
            partner.fee_percent,
            discount_code.as_ref().map(|c| c.discount),
            &self.pricing,
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let customer = self.customer_repo.upsert(&mut *tx, &request.customer).await?;

        let booking = Booking {
            id: Uuid::new_v4(),
            partner_id: partner.id,
            slot_id: slot.id,
            customer_id: customer.id,
            status: BookingStatus::Pending,
            currency: partner.currency.clone(),
            total_amount_cents: quote.total_before_discount_cents,
            discount_amount_cents: quote.discount_amount_cents,
            deposit_amount_cents: quote.deposit_amount_cents,
            rest_amount_cents: quote.rest_amount_cents,
            discount_code: discount_code.map(|c| c.code),
            participant_count: request.participant_count,
            confirmed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            emails_sent_at: None,
            created_at: now,
            updated_at: now,
        };

        self.booking_repo.insert(&mut *tx, &booking).await?;
        if !self.slot_repo.mark_booked(&mut *tx, slot.id).await? {
            tracing::warn!("Slot {} was not Published while booking {}", slot.id, booking.id);
        }

        tx.commit().await?;

        tracing::info!(
            "Booking {} created for slot {} ({} participant(s), deposit {})",
            booking.id,
            slot.id,
            booking.participant_count,
            booking.deposit_amount_cents
        );

        Ok(booking)
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking> {
        self.booking_repo.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    pub async fn booking_detail(&self, id: Uuid) -> Result<BookingDetail> {
        let booking = self.get_booking(id).await?;
        let slot = self.slot_repo.find_by_id(booking.slot_id).await?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;
        let payments = self.payment_repo.list_by_booking(id).await?;
        let refunds = self.refund_repo.list_by_booking(id).await?;

        Ok(BookingDetail { booking, slot, payments, refunds })
    }

    /// Price a booking, optionally with a discount code. Always starts from
    /// the gross total, so repeated or replaced codes never compound. With
    /// `persist` the result is written back to a still-unpaid booking.
    pub async fn quote(&self, booking_id: Uuid, code: Option<&str>, persist: bool) -> Result<Quote> {
        let booking = self.get_booking(booking_id).await?;
        let partner = self.partner_repo.find_by_id(booking.partner_id).await?
            .ok_or_else(|| AppError::NotFound("Partner not found".to_string()))?;
        let slot = self.slot_repo.find_by_id(booking.slot_id).await?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

        let discount_code = match code.map(str::trim) {
            Some(code) if !code.is_empty() => Some(self.usable_discount(&partner, code).await?),
            _ => None,
        };

        let gross = compute_base_total(&partner.rates, slot.start_time, booking.participant_count, &self.pricing);
        let quote = compute_quote(
            gross,
            partner.fee_percent,
            discount_code.as_ref().map(|c| c.discount),
            &self.pricing,
        );

        if persist {
            let stored_code = discount_code.as_ref().map(|c| c.code.as_str());
            if !self.booking_repo.apply_quote(booking_id, &quote, stored_code).await? {
                return Err(AppError::Conflict(
                    "Booking can no longer be repriced".to_string(),
                ));
            }
            tracing::info!(
                "Repriced booking {}: discount {}, deposit {}",
                booking_id,
                quote.discount_amount_cents,
                quote.deposit_amount_cents
            );
        }

        Ok(quote)
    }

    pub async fn create_slot(&self, partner_slug: &str, request: CreateSlotRequest) -> Result<Slot> {
        if request.capacity < 1 || request.max_participants < 1 {
            return Err(AppError::Validation(
                "capacity and max_participants must be at least 1".to_string(),
            ));
        }

        let partner = self.partner_by_slug(partner_slug).await?;
        let slot = self.slot_repo.create(partner.id, request).await?;

        tracing::info!("Created {:?} slot {} for partner {}", slot.status, slot.id, partner.slug);
        Ok(slot)
    }

    /// Slots of a partner in start order. Drafts only when asked for.
    pub async fn list_slots(&self, partner_slug: &str, include_drafts: bool) -> Result<Vec<Slot>> {
        let partner = self.partner_by_slug(partner_slug).await?;
        let slots = self.slot_repo.list_by_partner(partner.id).await?;

        Ok(slots
            .into_iter()
            .filter(|slot| include_drafts || slot.status != SlotStatus::Draft)
            .collect())
    }

    pub async fn publish_slot(&self, id: Uuid) -> Result<Slot> {
        let slot = self.slot_repo.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

        match slot.status {
            SlotStatus::Draft => {
                if !self.slot_repo.publish(id).await? {
                    return Err(AppError::Conflict("Slot changed while publishing".to_string()));
                }
                self.slot_repo.find_by_id(id).await?
                    .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))
            }
            SlotStatus::Published => Ok(slot),
            SlotStatus::Booked => Err(AppError::Conflict("Slot is already booked".to_string())),
        }
    }

    pub async fn delete_slot(&self, id: Uuid) -> Result<()> {
        let slot = self.slot_repo.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

        if !slot.status.is_deletable() || !self.slot_repo.delete_unreferenced(id).await? {
            return Err(AppError::Conflict(
                "Slot has bookings and cannot be deleted".to_string(),
            ));
        }

        tracing::info!("Deleted slot {}", id);
        Ok(())
    }

    async fn partner_by_slug(&self, slug: &str) -> Result<Partner> {
        self.partner_repo.find_by_slug(slug).await?
            .ok_or_else(|| AppError::NotFound(format!("Partner '{}' not found", slug)))
    }

    async fn resolve_slot(&self, partner: &Partner, selector: SlotSelector) -> Result<Slot> {
        let slot = match selector {
            SlotSelector::Id(id) => self.slot_repo.find_by_id(id).await?,
            SlotSelector::StartsAt(start) => {
                self.slot_repo.find_by_partner_and_start(partner.id, start).await?
            }
        };

        // Drafts are invisible to customers.
        match slot {
            Some(slot) if slot.partner_id == partner.id && slot.status != SlotStatus::Draft => Ok(slot),
            _ => Err(AppError::NotFound("Slot not found".to_string())),
        }
    }

    async fn usable_discount(&self, partner: &Partner, code: &str) -> Result<DiscountCode> {
        match self.discount_repo.find_by_code(code).await? {
            Some(found) if found.is_usable_for(partner.id, Utc::now()) => Ok(found),
            _ => Err(AppError::Validation(format!("Discount code '{}' is not valid", code))),
        }
    }
}
