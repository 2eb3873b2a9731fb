mod common;

use common::{customer, saturday_evening, setup};
use slotpay::{
    domain::{BookingStatus, CreateBookingRequest, CreatePartnerRequest, CreateSlotRequest, PartnerRates, SlotSelector},
    error::AppError,
    payments::ProviderPaymentStatus,
};

#[tokio::test]
async fn test_failed_send_releases_claim_for_retry() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, payment) = app.booking_with_checkout().await?;
    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Paid)
        .await;

    app.mailer.set_failing(true);
    let outcome = app.ctx.reconciler
        .handle_webhook(&payment.provider_payment_id)
        .await?
        .unwrap();

    // Confirmation stands even though the emails did not go out.
    assert!(outcome.booking_confirmed);
    let stored = app.booking(booking.id).await?;
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert!(stored.emails_sent_at.is_none());
    assert!(app.mailer.sent().await.is_empty());

    // The next sync retries and succeeds.
    app.mailer.set_failing(false);
    app.ctx.reconciler.sync_booking(booking.id).await?;

    assert!(app.booking(booking.id).await?.emails_sent_at.is_some());
    assert_eq!(app.mailer.sent().await.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_direct_trigger_is_at_most_once() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.published_slot().await?;
    let booking = app.book(slot.id, "jo@example.com").await?;
    let notifier = &app.ctx.notification_service;

    assert!(notifier.notify_confirmed(booking.id).await?);
    assert!(!notifier.notify_confirmed(booking.id).await?);
    assert_eq!(app.mailer.sent().await.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_failed_trigger_returns_error() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.published_slot().await?;
    let booking = app.book(slot.id, "jo@example.com").await?;

    app.mailer.set_failing(true);
    let result = app.ctx.notification_service.notify_confirmed(booking.id).await;
    assert!(matches!(result, Err(AppError::Email(_))));
    assert!(app.booking(booking.id).await?.emails_sent_at.is_none());

    Ok(())
}

#[tokio::test]
async fn test_partner_without_address_gets_no_email() -> anyhow::Result<()> {
    let app = setup().await?;
    let quiet = app.ctx.partner_repo.create(CreatePartnerRequest {
        slug: "quiet-dunes".to_string(),
        name: "Quiet Dunes".to_string(),
        currency: "EUR".to_string(),
        rates: PartnerRates {
            single_cents: 3000,
            group_per_person_cents: 2500,
        },
        fee_percent: 10,
        notification_email: None,
    }).await?;
    let slot = app.ctx.slot_repo.create(quiet.id, CreateSlotRequest {
        start_time: saturday_evening(),
        end_time: saturday_evening() + chrono::Duration::hours(1),
        capacity: 1,
        max_participants: 4,
        publish: true,
    }).await?;

    let booking = app.ctx.booking_service.create_booking(&quiet.slug, CreateBookingRequest {
        slot: SlotSelector::Id(slot.id),
        participant_count: 2,
        customer: customer("pat@example.com"),
        discount_code: None,
    }).await?;

    assert!(app.ctx.notification_service.notify_confirmed(booking.id).await?);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "pat@example.com");
    assert!(sent[0].subject.contains("Quiet Dunes"));

    Ok(())
}
