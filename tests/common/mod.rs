#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use slotpay::{
    config::Settings,
    domain::*,
    error::{AppError, Result},
    notifications::{Mailer, OutgoingEmail},
    payments::{ProviderPaymentStatus, SandboxProvider},
    service::ServiceContext,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Captures outgoing mail; can be told to fail every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Email("smtp unreachable".to_string()));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub pool: SqlitePool,
    pub provider: Arc<SandboxProvider>,
    pub mailer: Arc<RecordingMailer>,
    pub ctx: Arc<ServiceContext>,
    pub settings: Settings,
    pub partner: Partner,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    setup_with(Settings::default()).await
}

pub async fn setup_with(settings: Settings) -> anyhow::Result<TestApp> {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    let provider = Arc::new(SandboxProvider::new());
    let mailer = Arc::new(RecordingMailer::default());
    let ctx = Arc::new(ServiceContext::new(
        pool.clone(),
        provider.clone(),
        mailer.clone(),
        &settings,
    ));

    let partner = ctx.partner_repo.create(CreatePartnerRequest {
        slug: "harbour-kayaks".to_string(),
        name: "Harbour Kayaks".to_string(),
        currency: "EUR".to_string(),
        rates: PartnerRates {
            single_cents: 4500,
            group_per_person_cents: 3500,
        },
        fee_percent: 20,
        notification_email: Some("desk@harbour-kayaks.test".to_string()),
    }).await?;

    Ok(TestApp { pool, provider, mailer, ctx, settings, partner })
}

/// Saturday evening, far enough ahead that refunds are always allowed.
pub fn saturday_evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 15, 19, 0, 0).unwrap()
}

pub fn customer(email: &str) -> CustomerInfo {
    CustomerInfo {
        email: email.to_string(),
        full_name: "Jo Tester".to_string(),
        phone: Some("+31 6 1234 5678".to_string()),
    }
}

impl TestApp {
    pub async fn slot_at(&self, start: DateTime<Utc>, publish: bool) -> anyhow::Result<Slot> {
        Ok(self.ctx.slot_repo.create(self.partner.id, CreateSlotRequest {
            start_time: start,
            end_time: start + Duration::minutes(90),
            capacity: 1,
            max_participants: 6,
            publish,
        }).await?)
    }

    pub async fn published_slot(&self) -> anyhow::Result<Slot> {
        self.slot_at(saturday_evening(), true).await
    }

    pub async fn book(&self, slot_id: Uuid, email: &str) -> Result<Booking> {
        self.ctx.booking_service.create_booking(&self.partner.slug, CreateBookingRequest {
            slot: SlotSelector::Id(slot_id),
            participant_count: 1,
            customer: customer(email),
            discount_code: None,
        }).await
    }

    /// Booking with a started checkout, not yet paid.
    pub async fn booking_with_checkout(&self) -> anyhow::Result<(Booking, Payment)> {
        let slot = self.published_slot().await?;
        let booking = self.book(slot.id, "jo@example.com").await?;
        let payment = self.ctx.reconciler.start_checkout(booking.id).await?;
        Ok((booking, payment))
    }

    /// Booking whose deposit the provider reports as paid and that has been reconciled.
    pub async fn paid_booking(&self) -> anyhow::Result<(Booking, Payment)> {
        let (booking, payment) = self.booking_with_checkout().await?;
        self.provider
            .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Paid)
            .await;
        self.ctx.reconciler.handle_webhook(&payment.provider_payment_id).await?;
        Ok((booking, payment))
    }

    pub async fn booking(&self, id: Uuid) -> anyhow::Result<Booking> {
        Ok(self.ctx.booking_service.get_booking(id).await?)
    }

    pub async fn slot(&self, id: Uuid) -> anyhow::Result<Slot> {
        self.ctx.slot_repo.find_by_id(id).await?
            .ok_or_else(|| anyhow::anyhow!("slot {} missing", id))
    }

    pub async fn add_discount_code(&self, code: &str, discount: Discount) -> anyhow::Result<()> {
        let (kind, value) = match discount {
            Discount::Percent(v) => ("Percent", v),
            Discount::Fixed(v) => ("Fixed", v),
        };
        sqlx::query("INSERT INTO discount_codes (code, kind, value, active) VALUES (?, ?, ?, 1)")
            .bind(code)
            .bind(kind)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
