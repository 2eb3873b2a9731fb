use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{CustomerInfo, SlotSelector};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub slot_id: Uuid,
    pub customer_id: Uuid,
    pub status: BookingStatus,
    pub currency: String,
    /// Gross price before any discount.
    pub total_amount_cents: i64,
    pub discount_amount_cents: i64,
    pub deposit_amount_cents: i64,
    pub rest_amount_cents: i64,
    pub discount_code: Option<String>,
    pub participant_count: i64,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelActor>,
    pub emails_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn total_after_discount_cents(&self) -> i64 {
        self.total_amount_cents - self.discount_amount_cents
    }

    /// deposit + rest must always add up to the discounted total.
    pub fn amounts_balanced(&self) -> bool {
        self.deposit_amount_cents + self.rest_amount_cents == self.total_after_discount_cents()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Who asked for a cancellation. Recorded for auditing only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CancelActor {
    Customer,
    Partner,
    Admin,
    System,
}

impl CancelActor {
    pub fn as_str(self) -> &'static str {
        match self {
            CancelActor::Customer => "customer",
            CancelActor::Partner => "partner",
            CancelActor::Admin => "admin",
            CancelActor::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(CancelActor::Customer),
            "partner" => Some(CancelActor::Partner),
            "admin" => Some(CancelActor::Admin),
            "system" => Some(CancelActor::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub slot: SlotSelector,
    #[serde(default = "default_participants")]
    #[validate(range(min = 1, max = 100, message = "at least one participant is required"))]
    pub participant_count: i64,
    #[validate(nested)]
    pub customer: CustomerInfo,
    pub discount_code: Option<String>,
}

fn default_participants() -> i64 {
    1
}
