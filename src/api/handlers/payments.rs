use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::api::state::AppState;

/// Provider webhook. Only the payment id is taken from the payload; the
/// payment's state is fetched from the provider. Always answers 200 so the
/// provider does not keep redelivering; failures are logged and picked up
/// by the next sync.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let Some(payment_id) = extract_payment_id(&body, is_form) else {
        tracing::warn!("Webhook without a payment id ({} bytes)", body.len());
        return (StatusCode::OK, Json(json!({ "received": true })));
    };

    match state.service_context.reconciler.handle_webhook(&payment_id).await {
        Ok(Some(outcome)) => {
            tracing::debug!("Webhook for {} applied: {:?}", payment_id, outcome);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Webhook for {} failed: {}", payment_id, e);
        }
    }

    (StatusCode::OK, Json(json!({ "received": true })))
}

/// Accepts `id=...` form bodies and JSON bodies carrying `data.object.id`,
/// `paymentId` or `id`.
pub(crate) fn extract_payment_id(body: &[u8], is_form: bool) -> Option<String> {
    if is_form {
        let fields: HashMap<String, String> = serde_urlencoded::from_bytes(body).ok()?;
        return fields.get("id").filter(|id| !id.is_empty()).cloned();
    }

    let value: Value = serde_json::from_slice(body).ok()?;
    let found = [
        value.pointer("/data/object/id"),
        value.get("paymentId"),
        value.get("id"),
    ]
    .into_iter()
    .flatten()
    .find_map(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_string));
    found
}
