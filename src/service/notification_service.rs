use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    domain::{Booking, Customer, Partner, Slot},
    error::{AppError, Result},
    notifications::{Mailer, OutgoingEmail},
    repository::{BookingRepository, CustomerRepository, PartnerRepository, SlotRepository},
};

/// Sends the confirmation burst (customer, then partner) at most once per booking.
pub struct NotificationService {
    booking_repo: Arc<dyn BookingRepository>,
    customer_repo: Arc<dyn CustomerRepository>,
    partner_repo: Arc<dyn PartnerRepository>,
    slot_repo: Arc<dyn SlotRepository>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        customer_repo: Arc<dyn CustomerRepository>,
        partner_repo: Arc<dyn PartnerRepository>,
        slot_repo: Arc<dyn SlotRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            booking_repo,
            customer_repo,
            partner_repo,
            slot_repo,
            mailer,
        }
    }

    /// Returns `Ok(false)` when another caller already claimed the burst.
    pub async fn notify_confirmed(&self, booking_id: Uuid) -> Result<bool> {
        if !self.booking_repo.claim_notification(booking_id, Utc::now()).await? {
            tracing::debug!("Notifications for booking {} already sent", booking_id);
            return Ok(false);
        }

        match self.send_all(booking_id).await {
            Ok(sent) => {
                tracing::info!("Sent {} confirmation email(s) for booking {}", sent, booking_id);
                Ok(true)
            }
            Err(e) => {
                tracing::error!("Confirmation emails for booking {} failed: {}", booking_id, e);
                if let Err(release_err) = self.booking_repo.release_notification_claim(booking_id).await {
                    tracing::error!(
                        "Could not release notification claim for booking {}: {}",
                        booking_id,
                        release_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn send_all(&self, booking_id: Uuid) -> Result<usize> {
        let booking = self.booking_repo.find_by_id(booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        let customer = self.customer_repo.find_by_id(booking.customer_id).await?
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;
        let partner = self.partner_repo.find_by_id(booking.partner_id).await?
            .ok_or_else(|| AppError::NotFound("Partner not found".to_string()))?;
        let slot = self.slot_repo.find_by_id(booking.slot_id).await?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

        self.mailer.send(&customer_email(&booking, &customer, &partner, &slot)).await?;
        let mut sent = 1;

        match partner.notification_email.as_deref() {
            Some(address) if !address.trim().is_empty() => {
                self.mailer
                    .send(&partner_email(address, &booking, &customer, &slot))
                    .await?;
                sent += 1;
            }
            _ => {
                tracing::debug!("Partner {} has no notification address", partner.slug);
            }
        }

        Ok(sent)
    }
}

fn format_cents(cents: i64, currency: &str) -> String {
    format!("{}.{:02} {}", cents / 100, (cents % 100).abs(), currency)
}

fn customer_email(booking: &Booking, customer: &Customer, partner: &Partner, slot: &Slot) -> OutgoingEmail {
    let mut body = format!(
        "Hello {},\n\nyour booking with {} on {} is confirmed.\n\n",
        customer.full_name,
        partner.name,
        slot.start_time.format("%Y-%m-%d %H:%M UTC"),
    );
    body.push_str(&format!(
        "Participants: {}\nTotal: {}\n",
        booking.participant_count,
        format_cents(booking.total_after_discount_cents(), &booking.currency),
    ));
    if booking.discount_amount_cents > 0 {
        body.push_str(&format!(
            "Discount: {}\n",
            format_cents(booking.discount_amount_cents, &booking.currency)
        ));
    }
    body.push_str(&format!(
        "Deposit paid: {}\nDue on site: {}\n\nBooking reference: {}\n",
        format_cents(booking.deposit_amount_cents, &booking.currency),
        format_cents(booking.rest_amount_cents, &booking.currency),
        booking.id,
    ));

    OutgoingEmail {
        to: customer.email.clone(),
        subject: format!("Your booking with {} is confirmed", partner.name),
        body,
    }
}

fn partner_email(to: &str, booking: &Booking, customer: &Customer, slot: &Slot) -> OutgoingEmail {
    let body = format!(
        "New confirmed booking {}\n\nSlot: {}\nCustomer: {} <{}>\nPhone: {}\nParticipants: {}\nDeposit received: {}\n",
        booking.id,
        slot.start_time.format("%Y-%m-%d %H:%M UTC"),
        customer.full_name,
        customer.email,
        customer.phone.as_deref().unwrap_or("-"),
        booking.participant_count,
        format_cents(booking.deposit_amount_cents, &booking.currency),
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: format!("New booking on {}", slot.start_time.format("%Y-%m-%d %H:%M")),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_render_with_two_decimals() {
        assert_eq!(format_cents(1125, "EUR"), "11.25 EUR");
        assert_eq!(format_cents(4500, "EUR"), "45.00 EUR");
        assert_eq!(format_cents(7, "USD"), "0.07 USD");
    }
}
