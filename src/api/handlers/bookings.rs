use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Booking, BookingStatus, CancelActor, CreateBookingRequest, Payment, PaymentStatus},
    error::Result,
    pricing::Quote,
    service::{BookingDetail, CancellationOutcome},
};

#[derive(Debug, Serialize)]
pub struct BookingDto {
    id: Uuid,
    slot_id: Uuid,
    status: BookingStatus,
    currency: String,
    total_amount_cents: i64,
    discount_amount_cents: i64,
    deposit_amount_cents: i64,
    rest_amount_cents: i64,
    discount_code: Option<String>,
    participant_count: i64,
    created_at: String,
}

impl From<Booking> for BookingDto {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            slot_id: booking.slot_id,
            status: booking.status,
            currency: booking.currency,
            total_amount_cents: booking.total_amount_cents,
            discount_amount_cents: booking.discount_amount_cents,
            deposit_amount_cents: booking.deposit_amount_cents,
            rest_amount_cents: booking.rest_amount_cents,
            discount_code: booking.discount_code,
            participant_count: booking.participant_count,
            created_at: booking.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    code: Option<String>,
    #[serde(default)]
    persist: bool,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    booking_id: Uuid,
    code: Option<String>,
    persisted: bool,
    #[serde(flatten)]
    quote: Quote,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    payment_id: Uuid,
    provider: String,
    provider_payment_id: String,
    status: PaymentStatus,
    amount_cents: i64,
    currency: String,
    client_secret: Option<String>,
    checkout_url: Option<String>,
}

impl From<Payment> for CheckoutResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.id,
            provider: payment.provider,
            provider_payment_id: payment.provider_payment_id,
            status: payment.status,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            client_secret: payment.client_secret,
            checkout_url: payment.checkout_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    actor: CancelActor,
    refund_eligible: Option<bool>,
}

pub async fn create(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDto>)> {
    let booking = state.service_context.booking_service
        .create_booking(&slug, request)
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetail>> {
    let detail = state.service_context.booking_service
        .booking_detail(id)
        .await?;

    Ok(Json(detail))
}

pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let view = state.service_context.reconciler.status(id).await?;

    Ok(([(header::CACHE_CONTROL, "no-store")], Json(view)))
}

pub async fn quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>> {
    let quote = state.service_context.booking_service
        .quote(id, request.code.as_deref(), request.persist)
        .await?;

    Ok(Json(QuoteResponse {
        booking_id: id,
        code: request.code,
        persisted: request.persist,
        quote,
    }))
}

pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let payment = state.service_context.reconciler
        .start_checkout(id)
        .await?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

pub async fn sync(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let view = state.service_context.reconciler.sync_booking(id).await?;

    Ok(([(header::CACHE_CONTROL, "no-store")], Json(view)))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<CancellationOutcome>> {
    let outcome = state.service_context.cancellation_service
        .cancel_booking(id, request.actor, request.refund_eligible)
        .await?;

    Ok(Json(outcome))
}
