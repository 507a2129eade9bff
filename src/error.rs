//! Error types.
//!
//! Library failures are `thiserror` enums so callers can match on them.
//! At the HTTP edge they are folded into [`AppError`], which wraps
//! [`anyhow::Error`] and renders a 500 JSON body via [`IntoResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures raised while building a logger.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("logger namespace must not be empty")]
    EmptyNamespace,

    #[error("binding `{0}` collides with a reserved record key")]
    ReservedBinding(String),

    #[error("unknown log level `{0}`")]
    InvalidLevel(String),
}

/// The correlation id generator could not produce an id.
#[derive(Debug, thiserror::Error)]
#[error("correlation id generation failed: {0}")]
pub struct IdError(pub String);

/// Failure of one middleware invocation.
///
/// `E` is the error type of the downstream continuation.
#[derive(Debug, thiserror::Error)]
pub enum HandleError<E> {
    /// No id, so nothing was logged and the continuation never ran.
    #[error(transparent)]
    CorrelationId(#[from] IdError),

    #[error(transparent)]
    Logger(#[from] LoggerError),

    /// The continuation failed after the `request` record was written.
    #[error("downstream stage failed: {0}")]
    Downstream(#[source] E),
}

/// Wraps [`anyhow::Error`] so it can be returned from axum handlers and
/// middleware.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
