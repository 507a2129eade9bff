//! Structured logging engine used by the request-logging middleware.
//!
//! The engine is built around one explicit [`LogRoot`] per process (or per
//! test). Every [`Logger`] is a cheap handle derived from that root: it carries
//! a set of *bindings* that are merged into each record it emits, plus the
//! [`LoggerOptions`] it was created with.
//!
//! ```text
//! LogRoot                         ← built once at startup, owns the sink
//!   └─ make_logger(root, "api")   ← namespaced logger  { ns: "api" }
//!        └─ .child({ id })        ← request-scoped     { ns: "api", id: "…" }
//! ```
//!
//! Records are handed to a [`LogSink`]. The default sink forwards them into
//! `tracing`, so whatever subscriber the binary installs renders them.

mod record;
mod sink;

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing::Level;

use crate::config::LoggingConfig;
use crate::error::LoggerError;

pub use record::Record;
pub use sink::{JsonLinesSink, LogSink, MemorySink, TracingSink};

/// Keys every record sets itself. Bindings may not shadow them.
const RESERVED_KEYS: [&str; 3] = ["level", "time", "msg"];

/// Transform hook applied to the call-site fields of every emitted record.
///
/// The returned map replaces the fields of the record.
pub type LogFormatter = Arc<dyn Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync>;

// ── Options ───────────────────────────────────────────────────────────────────

/// Output hooks recognised by the engine.
#[derive(Clone, Default)]
pub struct Formatters {
    /// Invoked once per emitted record.
    pub log: Option<LogFormatter>,
}

impl fmt::Debug for Formatters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatters")
            .field("log", &self.log.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Options for a derived logger.
///
/// Only the hooks the engine itself interprets are typed; anything else goes
/// into [`engine`](Self::engine) and is carried along untouched.
#[derive(Clone, Debug, Default)]
pub struct LoggerOptions {
    pub formatters: Formatters,
    /// Starting level of the derived logger. Defaults to the parent's
    /// current level; either way the child's level is its own afterwards.
    pub level: Option<LevelFilter>,
    /// Prepended to every message. Nested prefixes concatenate.
    pub msg_prefix: Option<String>,
    /// Engine-specific pass-through options.
    pub engine: Map<String, Value>,
}

impl LoggerOptions {
    pub fn with_log_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.formatters.log = Some(Arc::new(f));
        self
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_msg_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.msg_prefix = Some(prefix.into());
        self
    }

    /// Child options layered over the parent's: hooks are inherited unless
    /// replaced, prefixes concatenate, engine entries are merged.
    fn inherit(&self, child: LoggerOptions) -> LoggerOptions {
        let msg_prefix = match (&self.msg_prefix, child.msg_prefix) {
            (Some(parent), Some(own)) => Some(format!("{parent}{own}")),
            (parent, own) => own.or_else(|| parent.clone()),
        };
        let mut engine = self.engine.clone();
        engine.extend(child.engine);

        LoggerOptions {
            formatters: Formatters {
                log: child.formatters.log.or_else(|| self.formatters.log.clone()),
            },
            level: child.level,
            msg_prefix,
            engine,
        }
    }
}

// ── Level control ─────────────────────────────────────────────────────────────

/// Shared, observable severity threshold.
#[derive(Clone)]
struct LevelControl(Arc<watch::Sender<LevelFilter>>);

impl LevelControl {
    fn new(level: LevelFilter) -> Self {
        let (tx, _) = watch::channel(level);
        Self(Arc::new(tx))
    }

    fn get(&self) -> LevelFilter {
        *self.0.borrow()
    }

    fn set(&self, level: LevelFilter) {
        // send_replace marks the value as changed even when it is equal.
        self.0.send_replace(level);
    }
}

// ── Root ──────────────────────────────────────────────────────────────────────

struct RootShared {
    sink: Arc<dyn LogSink>,
    level: LevelControl,
}

/// Process-scoped root of every logger.
///
/// Cloning is cheap; all clones share the same sink and level.
#[derive(Clone)]
pub struct LogRoot {
    shared: Arc<RootShared>,
}

impl LogRoot {
    pub fn new(sink: Arc<dyn LogSink>, level: LevelFilter) -> Self {
        Self {
            shared: Arc::new(RootShared {
                sink,
                level: LevelControl::new(level),
            }),
        }
    }

    /// Build a root from the `[logging]` section of the config file.
    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggerError> {
        let level = config.level_filter()?;
        let sink: Arc<dyn LogSink> = match config.sink {
            crate::config::SinkKind::Tracing => Arc::new(TracingSink),
            crate::config::SinkKind::Stdout => Arc::new(JsonLinesSink::stdout()),
        };
        Ok(Self::new(sink, level))
    }

    /// The root logger: no bindings, default options.
    pub fn logger(&self) -> Logger {
        Logger {
            root: self.clone(),
            bindings: Arc::new(Map::new()),
            options: Arc::new(LoggerOptions::default()),
            level: self.shared.level.clone(),
        }
    }

    /// Flush the sink. Loggers still alive keep working afterwards, but
    /// nothing written after this call is guaranteed to be flushed.
    pub fn shutdown(self) {
        self.shared.sink.flush();
    }
}

impl fmt::Debug for LogRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRoot")
            .field("sink", &self.shared.sink)
            .field("level", &self.shared.level.get())
            .finish()
    }
}

/// Derive a namespaced logger from `root`.
///
/// Every record the returned logger (and its children) emits carries
/// `ns = namespace`. Each call returns a fresh, independent handle.
pub fn make_logger(
    root: &LogRoot,
    namespace: &str,
    options: LoggerOptions,
) -> Result<Logger, LoggerError> {
    if namespace.is_empty() {
        return Err(LoggerError::EmptyNamespace);
    }
    let mut bindings = Map::new();
    bindings.insert("ns".into(), Value::String(namespace.to_owned()));
    root.logger().child_with(bindings, options)
}

// ── Logger ────────────────────────────────────────────────────────────────────

/// A handle that writes records through its [`LogRoot`].
#[derive(Clone)]
pub struct Logger {
    root: LogRoot,
    bindings: Arc<Map<String, Value>>,
    options: Arc<LoggerOptions>,
    level: LevelControl,
}

impl Logger {
    /// Derive a child carrying `bindings` in addition to this logger's own.
    pub fn child(&self, bindings: Map<String, Value>) -> Result<Logger, LoggerError> {
        self.child_with(bindings, LoggerOptions::default())
    }

    pub fn child_with(
        &self,
        bindings: Map<String, Value>,
        options: LoggerOptions,
    ) -> Result<Logger, LoggerError> {
        if let Some(key) = bindings.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
            return Err(LoggerError::ReservedBinding(key.clone()));
        }

        let mut merged = (*self.bindings).clone();
        merged.extend(bindings);

        let options = self.options.inherit(options);
        // Seeded from the parent, then independent of it.
        let level = LevelControl::new(options.level.unwrap_or_else(|| self.level.get()));

        Ok(Logger {
            root: self.root.clone(),
            bindings: Arc::new(merged),
            options: Arc::new(options),
            level,
        })
    }

    pub fn bindings(&self) -> &Map<String, Value> {
        &self.bindings
    }

    pub fn options(&self) -> &LoggerOptions {
        &self.options
    }

    pub fn level(&self) -> LevelFilter {
        self.level.get()
    }

    /// Change the threshold. Subscribers are notified on every call.
    pub fn set_level(&self, level: LevelFilter) {
        self.level.set(level);
    }

    pub fn subscribe_level(&self) -> watch::Receiver<LevelFilter> {
        self.level.0.subscribe()
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level.get()
    }

    /// Emit one record.
    ///
    /// `fields` is normally a JSON object; any other value is stored under
    /// `value`. Logging never fails.
    pub fn log(&self, level: Level, fields: Value, msg: &str) {
        if !self.enabled(level) {
            return;
        }

        let mut fields = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        if let Some(format) = &self.options.formatters.log {
            fields = format(fields);
        }

        let msg = match &self.options.msg_prefix {
            Some(prefix) => format!("{prefix}{msg}"),
            None => msg.to_owned(),
        };

        let record = Record {
            level,
            time: Utc::now(),
            bindings: (*self.bindings).clone(),
            fields,
            msg,
        };
        self.root.shared.sink.write(&record);
    }

    pub fn trace(&self, fields: Value, msg: &str) {
        self.log(Level::TRACE, fields, msg)
    }

    pub fn debug(&self, fields: Value, msg: &str) {
        self.log(Level::DEBUG, fields, msg)
    }

    pub fn info(&self, fields: Value, msg: &str) {
        self.log(Level::INFO, fields, msg)
    }

    pub fn warn(&self, fields: Value, msg: &str) {
        self.log(Level::WARN, fields, msg)
    }

    pub fn error(&self, fields: Value, msg: &str) {
        self.log(Level::ERROR, fields, msg)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("bindings", &self.bindings)
            .field("level", &self.level.get())
            .finish_non_exhaustive()
    }
}
