mod common;

use common::{setup, setup_with};
use slotpay::{
    config::Settings,
    domain::{BookingStatus, CancelActor, PaymentStatus, SlotStatus},
    error::AppError,
    payments::ProviderPaymentStatus,
};

#[tokio::test]
async fn test_duplicate_paid_observations_confirm_once() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, payment) = app.booking_with_checkout().await?;
    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Paid)
        .await;

    let reconciler = &app.ctx.reconciler;
    let (first, second, synced) = tokio::join!(
        reconciler.handle_webhook(&payment.provider_payment_id),
        reconciler.handle_webhook(&payment.provider_payment_id),
        reconciler.sync_booking(booking.id),
    );
    let again = reconciler.handle_webhook(&payment.provider_payment_id).await?;

    let confirmations = [first?, second?, again]
        .into_iter()
        .flatten()
        .filter(|o| o.booking_confirmed)
        .count();
    let synced = synced?;

    // The sync may or may not have been the one that won.
    assert!(confirmations <= 1);
    assert_eq!(synced.status, BookingStatus::Confirmed);
    assert_eq!(synced.payment_status, Some(PaymentStatus::Paid));

    let stored = app.booking(booking.id).await?;
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert!(stored.confirmed_at.is_some());
    assert!(stored.emails_sent_at.is_some());
    assert_eq!(app.slot(booking.slot_id).await?.status, SlotStatus::Booked);

    // One burst: customer plus partner.
    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "jo@example.com");
    assert_eq!(sent[1].to, "desk@harbour-kayaks.test");

    let local = app.ctx.payment_repo.find_by_id(payment.id).await?.unwrap();
    assert_eq!(local.status, PaymentStatus::Paid);
    assert!(local.paid_at.is_some());

    Ok(())
}

#[tokio::test]
async fn test_open_payment_leaves_booking_pending() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, payment) = app.booking_with_checkout().await?;

    let outcome = app.ctx.reconciler
        .handle_webhook(&payment.provider_payment_id)
        .await?
        .unwrap();

    assert_eq!(outcome.payment_status, PaymentStatus::Pending);
    assert!(!outcome.booking_confirmed);
    assert_eq!(app.booking(booking.id).await?.status, BookingStatus::Pending);
    assert!(app.mailer.sent().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_expired_payment_releases_unpaid_booking() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, payment) = app.booking_with_checkout().await?;
    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Expired)
        .await;

    let outcome = app.ctx.reconciler
        .handle_webhook(&payment.provider_payment_id)
        .await?
        .unwrap();

    assert_eq!(outcome.payment_status, PaymentStatus::Canceled);
    assert!(outcome.booking_released);

    let stored = app.booking(booking.id).await?;
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert_eq!(stored.cancelled_by, Some(CancelActor::System));
    assert_eq!(app.slot(booking.slot_id).await?.status, SlotStatus::Published);

    // Replaying the same observation changes nothing.
    let replay = app.ctx.reconciler
        .handle_webhook(&payment.provider_payment_id)
        .await?
        .unwrap();
    assert!(!replay.payment_advanced);
    assert!(!replay.booking_released);

    Ok(())
}

#[tokio::test]
async fn test_expired_payment_keeps_booking_when_release_disabled() -> anyhow::Result<()> {
    let mut settings = Settings::default();
    settings.reconciler.release_on_unpaid_terminal = false;
    let app = setup_with(settings).await?;
    let (booking, payment) = app.booking_with_checkout().await?;
    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Canceled)
        .await;

    app.ctx.reconciler.handle_webhook(&payment.provider_payment_id).await?;

    assert_eq!(app.booking(booking.id).await?.status, BookingStatus::Pending);
    assert_eq!(app.slot(booking.slot_id).await?.status, SlotStatus::Booked);

    Ok(())
}

#[tokio::test]
async fn test_failed_attempt_can_still_be_paid() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, payment) = app.booking_with_checkout().await?;

    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Failed)
        .await;
    app.ctx.reconciler.handle_webhook(&payment.provider_payment_id).await?;

    assert_eq!(app.booking(booking.id).await?.status, BookingStatus::Pending);
    assert_eq!(app.slot(booking.slot_id).await?.status, SlotStatus::Booked);
    let local = app.ctx.payment_repo.find_by_id(payment.id).await?.unwrap();
    assert_eq!(local.status, PaymentStatus::Failed);

    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Paid)
        .await;
    let outcome = app.ctx.reconciler
        .handle_webhook(&payment.provider_payment_id)
        .await?
        .unwrap();

    assert!(outcome.booking_confirmed);
    assert_eq!(app.booking(booking.id).await?.status, BookingStatus::Confirmed);

    Ok(())
}

#[tokio::test]
async fn test_stale_observation_does_not_downgrade_paid() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, payment) = app.paid_booking().await?;

    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Pending)
        .await;
    let outcome = app.ctx.reconciler
        .handle_webhook(&payment.provider_payment_id)
        .await?
        .unwrap();

    assert!(!outcome.payment_advanced);
    let local = app.ctx.payment_repo.find_by_id(payment.id).await?.unwrap();
    assert_eq!(local.status, PaymentStatus::Paid);
    assert_eq!(app.booking(booking.id).await?.status, BookingStatus::Confirmed);

    Ok(())
}

#[tokio::test]
async fn test_payment_for_cancelled_booking_is_refunded() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, payment) = app.booking_with_checkout().await?;

    app.ctx.cancellation_service
        .cancel_booking(booking.id, CancelActor::Customer, None)
        .await?;

    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Paid)
        .await;
    let outcome = app.ctx.reconciler
        .handle_webhook(&payment.provider_payment_id)
        .await?
        .unwrap();

    assert_eq!(outcome.payment_status, PaymentStatus::Paid);
    assert!(!outcome.booking_confirmed);
    assert_eq!(outcome.refunded_cents, 1125);
    assert_eq!(app.booking(booking.id).await?.status, BookingStatus::Cancelled);
    assert_eq!(app.slot(booking.slot_id).await?.status, SlotStatus::Published);
    assert!(app.mailer.sent().await.is_empty());

    assert_eq!(app.provider.refunded_cents(&payment.provider_payment_id).await, 1125);
    let local = app.ctx.payment_repo.find_by_id(payment.id).await?.unwrap();
    assert_eq!(local.status, PaymentStatus::Refunded);

    // A replayed webhook sees the refund and does not repeat it.
    let replay = app.ctx.reconciler
        .handle_webhook(&payment.provider_payment_id)
        .await?
        .unwrap();
    assert_eq!(replay.refunded_cents, 0);
    assert_eq!(app.provider.refund_count().await, 1);

    Ok(())
}

#[tokio::test]
async fn test_unknown_webhook_is_acknowledged() -> anyhow::Result<()> {
    let app = setup().await?;

    let outcome = app.ctx.reconciler.handle_webhook("sbx_pay_does_not_exist").await?;
    assert!(outcome.is_none());

    Ok(())
}

#[tokio::test]
async fn test_sync_during_outage_changes_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, payment) = app.booking_with_checkout().await?;
    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Paid)
        .await;
    app.provider.set_unavailable(true);

    let result = app.ctx.reconciler.sync_booking(booking.id).await;
    assert!(matches!(result, Err(AppError::ProviderUnavailable(_))));
    assert_eq!(app.booking(booking.id).await?.status, BookingStatus::Pending);

    app.provider.set_unavailable(false);
    let view = app.ctx.reconciler.sync_booking(booking.id).await?;
    assert_eq!(view.status, BookingStatus::Confirmed);

    Ok(())
}

#[tokio::test]
async fn test_checkout_requires_pending_booking() -> anyhow::Result<()> {
    let app = setup().await?;
    let (booking, _payment) = app.paid_booking().await?;

    let result = app.ctx.reconciler.start_checkout(booking.id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let missing = app.ctx.reconciler.start_checkout(uuid::Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_checkout_outage_creates_no_payment_row() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.published_slot().await?;
    let booking = app.book(slot.id, "jo@example.com").await?;
    app.provider.set_unavailable(true);

    let result = app.ctx.reconciler.start_checkout(booking.id).await;
    assert!(matches!(result, Err(AppError::ProviderUnavailable(_))));
    assert!(app.ctx.payment_repo.list_by_booking(booking.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_sweep_confirms_stale_paid_booking() -> anyhow::Result<()> {
    let mut settings = Settings::default();
    settings.reconciler.pending_timeout_minutes = 0;
    let app = setup_with(settings).await?;
    let (booking, payment) = app.booking_with_checkout().await?;
    app.provider
        .set_status(&payment.provider_payment_id, ProviderPaymentStatus::Paid)
        .await;

    // Make sure the booking is strictly older than the sweep cutoff.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let synced = app.ctx.reconciler.sweep_stale_pending().await?;

    assert_eq!(synced, 1);
    assert_eq!(app.booking(booking.id).await?.status, BookingStatus::Confirmed);

    Ok(())
}
