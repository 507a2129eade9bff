//! Request/response logging middleware.
//!
//! For every request the middleware:
//!
//! 1. starts a timer,
//! 2. generates a correlation id,
//! 3. derives a request-scoped logger (`{ ns: "api", id }`),
//! 4. stores that logger and a [`RequestId`] in the request extensions,
//! 5. logs `request` with `{ req: { method, url } }`,
//! 6. runs the rest of the pipeline,
//! 7. logs `response` with the elapsed time, content length, status code and
//!    the request fields again.
//!
//! If the downstream stage fails, the error is returned as-is and no
//! `response` record is written. The `request` record is always written
//! before the downstream stage starts.
//!
//! Layer order matters: apply this middleware **outside** any handler that
//! wants to read `Extension<Logger>` or `Extension<RequestId>`.

use std::{convert::Infallible, future::Future, sync::Arc, time::Duration, time::Instant};

use axum::{
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use serde_json::{json, Map, Value};
use tracing::Instrument as _;

use super::request_id::{IdGenerator, NanoId, RequestId};
use crate::error::{AppError, HandleError, LoggerError};
use crate::logger::{make_logger, LogRoot, Logger, LoggerOptions};

/// Namespace of the middleware's logger.
pub const NAMESPACE: &str = "api";

/// The logging stage. Holds no per-request state, so one instance serves
/// any number of concurrent requests.
pub struct RequestLogging {
    logger: Logger,
    ids: Arc<dyn IdGenerator>,
}

impl RequestLogging {
    /// Build the stage and its `api` logger.
    ///
    /// Fails only if the logging engine rejects `options`.
    pub fn new(root: &LogRoot, options: LoggerOptions) -> Result<Self, LoggerError> {
        Ok(Self {
            logger: make_logger(root, NAMESPACE, options)?,
            ids: Arc::new(NanoId),
        })
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// The namespaced logger every request-scoped logger derives from.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Run one request through the stage.
    ///
    /// `next` is invoked exactly once, unless id generation fails, in which
    /// case nothing is logged and `next` is never called.
    pub async fn handle<N, Fut, E>(
        &self,
        mut req: Request,
        next: N,
    ) -> Result<Response, HandleError<E>>
    where
        N: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Response, E>>,
    {
        let start = Instant::now();
        let id = self.ids.generate().await?;

        let mut bindings = Map::new();
        bindings.insert("id".into(), Value::String(id.clone()));
        let logger = self.logger.child(bindings)?;

        req.extensions_mut().insert(logger.clone());
        req.extensions_mut().insert(RequestId(id.clone()));

        let request = RequestMeta::from_request(&req);
        logger.info(json!({ "req": request }), "request");

        let span = tracing::debug_span!("request", id = %id);
        let response = next(req)
            .instrument(span)
            .await
            .map_err(HandleError::Downstream)?;

        let meta = ResponseMeta::from_response(&response, start.elapsed());
        logger.info(
            json!({
                "responseTime": meta.response_time,
                "contentLength": meta.content_length,
                "res": { "statusCode": meta.status_code },
                "req": request,
            }),
            "response",
        );

        Ok(response)
    }
}

/// Axum adapter for [`RequestLogging::handle`].
///
/// Mount with `axum::middleware::from_fn_with_state`, or use
/// [`with_request_logging`].
pub async fn request_logging_middleware(
    State(logging): State<Arc<RequestLogging>>,
    req: Request,
    next: Next,
) -> Response {
    let result = logging
        .handle(req, |req| async move { Ok::<_, Infallible>(next.run(req).await) })
        .await;

    match result {
        Ok(response) => response,
        Err(HandleError::Downstream(never)) => match never {},
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Wrap every route of `router` in the logging stage.
pub fn with_request_logging<S>(router: Router<S>, logging: Arc<RequestLogging>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(axum::middleware::from_fn_with_state(
        logging,
        request_logging_middleware,
    ))
}

// ── Field extraction ──────────────────────────────────────────────────────────

/// `{ method, url }` of the incoming request, taken before `next` runs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RequestMeta {
    pub method: String,
    pub url: String,
}

impl RequestMeta {
    pub fn from_request(req: &Request) -> Self {
        Self {
            method: req.method().to_string(),
            url: req.uri().path().to_owned(),
        }
    }
}

/// What the `response` record reports about the finished response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    pub response_time: String,
    /// `None` when the response carries no `Content-Length` header.
    pub content_length: Option<String>,
    pub status_code: u16,
}

impl ResponseMeta {
    pub fn from_response(res: &Response, elapsed: Duration) -> Self {
        Self {
            response_time: format_response_time(elapsed),
            content_length: res
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            status_code: res.status().as_u16(),
        }
    }
}

/// Elapsed time as fractional milliseconds, e.g. `"12.345678ms"`.
pub fn format_response_time(elapsed: Duration) -> String {
    format!("{}ms", elapsed.as_nanos() as f64 / 1_000_000.0)
}
