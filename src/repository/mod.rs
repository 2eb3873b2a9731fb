use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;
use crate::domain::*;
use crate::error::{AppError, Result};
use crate::pricing::Quote;

pub mod partner_repository;
pub mod customer_repository;
pub mod slot_repository;
pub mod booking_repository;
pub mod payment_repository;
pub mod refund_repository;
pub mod discount_repository;

pub use partner_repository::SqlitePartnerRepository;
pub use customer_repository::SqliteCustomerRepository;
pub use slot_repository::SqliteSlotRepository;
pub use booking_repository::SqliteBookingRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use refund_repository::SqliteRefundRepository;
pub use discount_repository::SqliteDiscountCodeRepository;

// Methods taking a `SqliteConnection` run inside the caller's transaction so
// that several entities can move together; the rest use the pool directly.

#[async_trait]
pub trait PartnerRepository: Send + Sync {
    async fn create(&self, request: CreatePartnerRequest) -> Result<Partner>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Partner>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Partner>>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Resolve-or-create by normalised email.
    async fn upsert(&self, conn: &mut SqliteConnection, info: &CustomerInfo) -> Result<Customer>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Customer>>;
}

#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn create(&self, partner_id: Uuid, request: CreateSlotRequest) -> Result<Slot>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Slot>>;
    async fn find_by_partner_and_start(&self, partner_id: Uuid, start: DateTime<Utc>) -> Result<Option<Slot>>;
    async fn list_by_partner(&self, partner_id: Uuid) -> Result<Vec<Slot>>;
    /// Draft -> Published. Returns false when the slot was not a draft.
    async fn publish(&self, id: Uuid) -> Result<bool>;
    /// Deletes a Draft/Published slot that no booking has ever referenced.
    async fn delete_unreferenced(&self, id: Uuid) -> Result<bool>;
    async fn mark_booked(&self, conn: &mut SqliteConnection, id: Uuid) -> Result<bool>;
    /// Booked -> Published.
    async fn release(&self, conn: &mut SqliteConnection, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Fails with `SlotAlreadyReserved` when the slot already backs an active booking.
    async fn insert(&self, conn: &mut SqliteConnection, booking: &Booking) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list_active_by_slot(&self, slot_id: Uuid) -> Result<Vec<Booking>>;
    /// Pending -> Confirmed. Exactly one caller observes `true`.
    async fn confirm(&self, conn: &mut SqliteConnection, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    async fn cancel(&self, conn: &mut SqliteConnection, id: Uuid, actor: CancelActor, at: DateTime<Utc>) -> Result<bool>;
    /// Pending -> Cancelled, only while no payment of the booking was ever settled.
    async fn cancel_if_unpaid(&self, conn: &mut SqliteConnection, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    /// Stores a recomputed price on a Pending booking.
    async fn apply_quote(&self, id: Uuid, quote: &Quote, discount_code: Option<&str>) -> Result<bool>;
    /// Sets `emails_sent_at` only if it is still NULL.
    async fn claim_notification(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    async fn release_notification_claim(&self, id: Uuid) -> Result<()>;
    async fn list_stale_pending(&self, created_before: DateTime<Utc>, limit: i64) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_provider_id(&self, provider_payment_id: &str) -> Result<Option<Payment>>;
    /// Newest first.
    async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>>;
    /// Mirrors a provider status unless that would regress the local record.
    async fn advance_status(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait RefundRepository: Send + Sync {
    async fn record(&self, refund: Refund) -> Result<Refund>;
    async fn sum_for_payment(&self, payment_id: Uuid) -> Result<i64>;
    async fn sum_for_booking(&self, booking_id: Uuid) -> Result<i64>;
    async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<Refund>>;
}

#[async_trait]
pub trait DiscountCodeRepository: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}
