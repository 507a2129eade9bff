//! # reqlog
//!
//! Request/response logging for axum pipelines.
//!
//! Each request passing through [`RequestLogging`] gets a correlation id and a
//! request-scoped structured [`Logger`], both stored in the request
//! extensions. The stage writes a `request` record before the rest of the
//! pipeline runs and a `response` record, with the elapsed time, after it
//! returns.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use axum::{routing::get, Router};
//! use reqlog::{with_request_logging, LogRoot, LoggerOptions, RequestLogging, TracingSink};
//! use tracing::level_filters::LevelFilter;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let root = LogRoot::new(Arc::new(TracingSink), LevelFilter::INFO);
//! let logging = Arc::new(RequestLogging::new(&root, LoggerOptions::default())?);
//!
//! let app = with_request_logging(Router::new().route("/", get(|| async { "Okay" })), logging);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! root.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logger;

pub use api::request_id::{IdGenerator, NanoId, RequestId};
pub use api::request_log::{request_logging_middleware, with_request_logging, RequestLogging};
pub use config::Config;
pub use error::{AppError, HandleError, IdError, LoggerError};
pub use logger::{
    make_logger, JsonLinesSink, LogRoot, LogSink, Logger, LoggerOptions, MemorySink, Record,
    TracingSink,
};
