use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let provider = if state.settings.stripe.enabled { "stripe" } else { "sandbox" };

    Json(json!({
        "name": "slotpay",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Slot booking with deposit payments and refunds",
        "status": "operational",
        "base_url": state.settings.server.base_url,
        "payment_provider": provider,
        "endpoints": {
            "health": "/health",
            "bookings": "/api/bookings/:id",
            "webhook": "/api/payments/webhook"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
