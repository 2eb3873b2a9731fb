use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{CreateSlotRequest, Slot},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListSlotsQuery {
    #[serde(default)]
    include_drafts: bool,
}

pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ListSlotsQuery>,
) -> Result<Json<Vec<Slot>>> {
    let slots = state.service_context.booking_service
        .list_slots(&slug, query.include_drafts)
        .await?;

    Ok(Json(slots))
}

pub async fn create(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Slot>)> {
    let slot = state.service_context.booking_service
        .create_slot(&slug, request)
        .await?;

    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn publish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Slot>> {
    let slot = state.service_context.booking_service
        .publish_slot(id)
        .await?;

    Ok(Json(slot))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.booking_service
        .delete_slot(id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
