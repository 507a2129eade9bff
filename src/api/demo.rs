//! Terminal handlers for the demo pipeline.

use axum::{http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;

use super::request_id::RequestId;
use crate::logger::Logger;

/// `GET /`: plain `Okay`.
pub async fn index() -> &'static str {
    "Okay"
}

/// `GET /healthz`: always returns 200 OK with `{"status": "ok"}`.
///
/// No dependencies and never blocks, so it is safe as a liveness probe.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /whoami`: echoes the correlation id and logs through the
/// request-scoped logger the middleware left in the extensions.
pub async fn whoami(
    Extension(id): Extension<RequestId>,
    Extension(logger): Extension<Logger>,
) -> impl IntoResponse {
    logger.debug(json!({ "handler": "whoami" }), "resolving caller");
    Json(json!({ "id": id.0 }))
}
