pub mod booking_service;
pub mod cancellation;
pub mod notification_service;
pub mod reconciler;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::config::Settings;
use crate::notifications::Mailer;
use crate::payments::PaymentProvider;
use crate::repository::*;
use booking_service::BookingService;
use cancellation::CancellationService;
use notification_service::NotificationService;
use reconciler::Reconciler;

pub use booking_service::BookingDetail;
pub use cancellation::{refund_idempotency_key, CancellationOutcome, ReconciliationGap};
pub use reconciler::{BookingStatusView, ReconcileOutcome};

pub struct ServiceContext {
    pub partner_repo: Arc<dyn PartnerRepository>,
    pub customer_repo: Arc<dyn CustomerRepository>,
    pub slot_repo: Arc<dyn SlotRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub refund_repo: Arc<dyn RefundRepository>,
    pub discount_repo: Arc<dyn DiscountCodeRepository>,
    pub provider: Arc<dyn PaymentProvider>,
    pub booking_service: Arc<BookingService>,
    pub reconciler: Arc<Reconciler>,
    pub cancellation_service: Arc<CancellationService>,
    pub notification_service: Arc<NotificationService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        provider: Arc<dyn PaymentProvider>,
        mailer: Arc<dyn Mailer>,
        settings: &Settings,
    ) -> Self {
        let partner_repo: Arc<dyn PartnerRepository> = Arc::new(SqlitePartnerRepository::new(db_pool.clone()));
        let customer_repo: Arc<dyn CustomerRepository> = Arc::new(SqliteCustomerRepository::new(db_pool.clone()));
        let slot_repo: Arc<dyn SlotRepository> = Arc::new(SqliteSlotRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> = Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let refund_repo: Arc<dyn RefundRepository> = Arc::new(SqliteRefundRepository::new(db_pool.clone()));
        let discount_repo: Arc<dyn DiscountCodeRepository> = Arc::new(SqliteDiscountCodeRepository::new(db_pool.clone()));

        let notification_service = Arc::new(NotificationService::new(
            booking_repo.clone(),
            customer_repo.clone(),
            partner_repo.clone(),
            slot_repo.clone(),
            mailer,
        ));

        let booking_service = Arc::new(BookingService::new(
            db_pool.clone(),
            partner_repo.clone(),
            customer_repo.clone(),
            slot_repo.clone(),
            booking_repo.clone(),
            payment_repo.clone(),
            refund_repo.clone(),
            discount_repo.clone(),
            settings.pricing.clone(),
        ));

        let cancellation_service = Arc::new(CancellationService::new(
            db_pool.clone(),
            booking_repo.clone(),
            slot_repo.clone(),
            payment_repo.clone(),
            refund_repo.clone(),
            provider.clone(),
            settings.refund_policy.clone(),
        ));

        let reconciler = Arc::new(Reconciler::new(
            db_pool.clone(),
            booking_repo.clone(),
            slot_repo.clone(),
            payment_repo.clone(),
            provider.clone(),
            notification_service.clone(),
            cancellation_service.clone(),
            settings.reconciler.clone(),
        ));

        Self {
            partner_repo,
            customer_repo,
            slot_repo,
            booking_repo,
            payment_repo,
            refund_repo,
            discount_repo,
            provider,
            booking_service,
            reconciler,
            cancellation_service,
            notification_service,
            db_pool,
        }
    }
}
