//! HTTP surface of the demo binary.
//!
//! - [`request_id`] : correlation ids and the id generator seam
//! - [`request_log`]: the request/response logging middleware
//! - [`demo`]       : a minimal pipeline to put behind it

pub mod demo;
pub mod request_id;
pub mod request_log;

use std::sync::Arc;

use axum::{routing::get, Router};

use request_log::{with_request_logging, RequestLogging};

/// Demo routes wrapped in the logging middleware.
pub fn router(logging: Arc<RequestLogging>) -> Router {
    let routes = Router::new()
        .route("/", get(demo::index))
        .route("/healthz", get(demo::healthz))
        .route("/whoami", get(demo::whoami));
    with_request_logging(routes, logging)
}
