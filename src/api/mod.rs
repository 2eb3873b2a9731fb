pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post, delete},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/api", api_routes())

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/partners", partner_routes())
        .nest("/slots", slot_routes())
        .nest("/bookings", booking_routes())
        .nest("/payments", payment_routes())
}

fn partner_routes() -> Router<AppState> {
    Router::new()
        .route("/:slug/bookings", post(handlers::bookings::create))
        .route("/:slug/slots", get(handlers::slots::list).post(handlers::slots::create))
}

fn slot_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", delete(handlers::slots::delete))
        .route("/:id/publish", post(handlers::slots::publish))
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", get(handlers::bookings::get))
        .route("/:id/status", get(handlers::bookings::status))
        .route("/:id/quote", post(handlers::bookings::quote))
        .route("/:id/checkout", post(handlers::bookings::checkout))
        .route("/:id/sync", post(handlers::bookings::sync))
        .route("/:id/cancel", post(handlers::bookings::cancel))
}

fn payment_routes() -> Router<AppState> {
    // Unauthenticated: the provider calls this directly.
    Router::new()
        .route("/webhook", post(handlers::payments::webhook))
}
