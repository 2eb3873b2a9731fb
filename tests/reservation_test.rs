mod common;

use common::{customer, saturday_evening, setup};
use slotpay::{
    domain::{BookingStatus, CancelActor, CreateBookingRequest, Discount, SlotSelector, SlotStatus},
    error::AppError,
};

#[tokio::test]
async fn test_concurrent_reservations_yield_one_booking() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.published_slot().await?;

    let (first, second) = tokio::join!(
        app.book(slot.id, "first@example.com"),
        app.book(slot.id, "second@example.com"),
    );

    let results = [first, second];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::SlotAlreadyReserved)))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 1);

    let active = app.ctx.booking_repo.list_active_by_slot(slot.id).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(app.slot(slot.id).await?.status, SlotStatus::Booked);

    // The losing customer was rolled back together with its booking.
    let customers: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers")
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(customers.0, 1);

    Ok(())
}

#[tokio::test]
async fn test_booking_price_includes_weekend_and_evening_surcharge() -> anyhow::Result<()> {
    let app = setup().await?;
    app.published_slot().await?;

    let booking = app.ctx.booking_service.create_booking(&app.partner.slug, CreateBookingRequest {
        slot: SlotSelector::StartsAt(saturday_evening()),
        participant_count: 1,
        customer: customer("jo@example.com"),
        discount_code: None,
    }).await?;

    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.total_amount_cents, 5625);
    assert_eq!(booking.discount_amount_cents, 0);
    assert_eq!(booking.deposit_amount_cents, 1125);
    assert_eq!(booking.rest_amount_cents, 4500);
    assert!(booking.amounts_balanced());

    Ok(())
}

#[tokio::test]
async fn test_fixed_discount_is_capped() -> anyhow::Result<()> {
    let app = setup().await?;
    app.add_discount_code("BIGFIXED", Discount::Fixed(2000)).await?;
    let slot = app.published_slot().await?;

    let booking = app.ctx.booking_service.create_booking(&app.partner.slug, CreateBookingRequest {
        slot: SlotSelector::Id(slot.id),
        participant_count: 1,
        customer: customer("jo@example.com"),
        discount_code: Some("bigfixed".to_string()),
    }).await?;

    assert_eq!(booking.total_amount_cents, 5625);
    assert_eq!(booking.discount_amount_cents, 1125);
    assert_eq!(booking.deposit_amount_cents, 900);
    assert_eq!(booking.rest_amount_cents, 3600);
    assert_eq!(booking.discount_code.as_deref(), Some("BIGFIXED"));

    Ok(())
}

#[tokio::test]
async fn test_unknown_discount_code_is_rejected() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.published_slot().await?;

    let result = app.ctx.booking_service.create_booking(&app.partner.slug, CreateBookingRequest {
        slot: SlotSelector::Id(slot.id),
        participant_count: 1,
        customer: customer("jo@example.com"),
        discount_code: Some("NOPE".to_string()),
    }).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(app.slot(slot.id).await?.status, SlotStatus::Published);

    Ok(())
}

#[tokio::test]
async fn test_draft_slot_is_not_bookable() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.slot_at(saturday_evening(), false).await?;

    let result = app.book(slot.id, "jo@example.com").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_too_many_participants_is_rejected() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.published_slot().await?;

    let result = app.ctx.booking_service.create_booking(&app.partner.slug, CreateBookingRequest {
        slot: SlotSelector::Id(slot.id),
        participant_count: slot.max_participants + 1,
        customer: customer("jo@example.com"),
        discount_code: None,
    }).await;

    assert!(matches!(result, Err(AppError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn test_invalid_customer_email_is_rejected() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.published_slot().await?;

    let result = app.book(slot.id, "not-an-email").await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn test_cancelled_booking_frees_slot_for_rebooking() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = app.published_slot().await?;

    let first = app.book(slot.id, "first@example.com").await?;
    app.ctx.cancellation_service
        .cancel_booking(first.id, CancelActor::Customer, None)
        .await?;
    assert_eq!(app.slot(slot.id).await?.status, SlotStatus::Published);

    let second = app.book(slot.id, "second@example.com").await?;
    assert_eq!(second.status, BookingStatus::Pending);
    assert_eq!(app.slot(slot.id).await?.status, SlotStatus::Booked);

    Ok(())
}

#[tokio::test]
async fn test_reapplying_discounts_never_compounds() -> anyhow::Result<()> {
    let app = setup().await?;
    app.add_discount_code("TENOFF", Discount::Percent(10)).await?;
    app.add_discount_code("BIGFIXED", Discount::Fixed(2000)).await?;
    let slot = app.published_slot().await?;
    let booking = app.book(slot.id, "jo@example.com").await?;
    let service = &app.ctx.booking_service;

    let a = service.quote(booking.id, Some("TENOFF"), true).await?;
    let a_again = service.quote(booking.id, Some("TENOFF"), true).await?;
    assert_eq!(a, a_again);
    assert_eq!(a.total_before_discount_cents, 5625);
    assert_eq!(a.discount_amount_cents, 562);
    assert_eq!(a.deposit_amount_cents, 1013);
    assert_eq!(a.rest_amount_cents, 4050);

    let b = service.quote(booking.id, Some("BIGFIXED"), true).await?;
    assert_eq!(b.discount_amount_cents, 1125);
    assert_eq!(b.total_after_cents, 4500);

    let cleared = service.quote(booking.id, None, true).await?;
    assert_eq!(cleared.discount_amount_cents, 0);
    assert_eq!(cleared.total_after_cents, 5625);

    let stored = app.booking(booking.id).await?;
    assert_eq!(stored.total_amount_cents, 5625);
    assert_eq!(stored.discount_amount_cents, 0);
    assert_eq!(stored.deposit_amount_cents, 1125);
    assert_eq!(stored.discount_code, None);

    Ok(())
}

#[tokio::test]
async fn test_quote_is_frozen_once_checkout_started() -> anyhow::Result<()> {
    let app = setup().await?;
    app.add_discount_code("TENOFF", Discount::Percent(10)).await?;
    let (booking, _payment) = app.booking_with_checkout().await?;

    // A preview is still fine.
    let preview = app.ctx.booking_service.quote(booking.id, Some("TENOFF"), false).await?;
    assert_eq!(preview.discount_amount_cents, 562);

    let persisted = app.ctx.booking_service.quote(booking.id, Some("TENOFF"), true).await;
    assert!(matches!(persisted, Err(AppError::Conflict(_))));
    assert_eq!(app.booking(booking.id).await?.discount_amount_cents, 0);

    Ok(())
}

#[tokio::test]
async fn test_slot_lifecycle() -> anyhow::Result<()> {
    let app = setup().await?;
    let service = &app.ctx.booking_service;

    let draft = app.slot_at(saturday_evening(), false).await?;
    assert_eq!(draft.status, SlotStatus::Draft);

    let published = service.publish_slot(draft.id).await?;
    assert_eq!(published.status, SlotStatus::Published);
    // Publishing twice is harmless.
    assert_eq!(service.publish_slot(draft.id).await?.status, SlotStatus::Published);

    app.book(draft.id, "jo@example.com").await?;
    assert!(matches!(service.delete_slot(draft.id).await, Err(AppError::Conflict(_))));

    let hidden = app.slot_at(saturday_evening() + chrono::Duration::days(1), false).await?;
    let visible = service.list_slots(&app.partner.slug, false).await?;
    assert_eq!(visible.len(), 1);
    assert!(visible.iter().all(|s| s.id != hidden.id));
    assert_eq!(service.list_slots(&app.partner.slug, true).await?.len(), 2);

    let spare = app.slot_at(saturday_evening() + chrono::Duration::hours(2), true).await?;
    service.delete_slot(spare.id).await?;
    assert!(matches!(service.delete_slot(spare.id).await, Err(AppError::NotFound(_))));

    Ok(())
}
