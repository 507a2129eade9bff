//! Record sinks.
//!
//! A sink receives every record that passed its logger's level check. Sinks
//! are shared by all in-flight requests, so `write` must be safe to call from
//! many tasks at once.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::Level;

use super::Record;

pub trait LogSink: Send + Sync + fmt::Debug {
    fn write(&self, record: &Record);

    fn flush(&self) {}
}

// ── tracing ───────────────────────────────────────────────────────────────────

/// Forwards records into `tracing` under the `reqlog` target.
///
/// The whole record travels as the `record` field, rendered as one JSON
/// string. A JSON subscriber therefore nests it as an escaped string; use
/// [`JsonLinesSink`] for flat one-object-per-line output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: &Record) {
        let json = record.to_json();
        match record.level {
            Level::ERROR => tracing::error!(target: "reqlog", record = %json, "{}", record.msg),
            Level::WARN => tracing::warn!(target: "reqlog", record = %json, "{}", record.msg),
            Level::INFO => tracing::info!(target: "reqlog", record = %json, "{}", record.msg),
            Level::DEBUG => tracing::debug!(target: "reqlog", record = %json, "{}", record.msg),
            _ => tracing::trace!(target: "reqlog", record = %json, "{}", record.msg),
        }
    }
}

// ── JSON lines ────────────────────────────────────────────────────────────────

/// Newline-delimited JSON, one record per line.
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
    warned: AtomicBool,
}

impl JsonLinesSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
            warned: AtomicBool::new(false),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    fn report(&self, err: io::Error) {
        // Only the first failure is reported; a broken pipe would otherwise
        // produce one warning per record.
        if !self.warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(error = %err, "log sink write failed");
        }
    }
}

impl fmt::Debug for JsonLinesSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesSink")
            .field("warned", &self.warned.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl LogSink for JsonLinesSink {
    fn write(&self, record: &Record) {
        let line = format!("{record}\n");
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.write_all(line.as_bytes()) {
            self.report(e);
        }
    }

    fn flush(&self) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.flush() {
            self.report(e);
        }
    }
}

// ── Memory ────────────────────────────────────────────────────────────────────

/// Keeps every record in memory. Meant for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    /// Snapshot of everything written so far, oldest first.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &Record) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn record(msg: &str) -> Record {
        Record {
            level: Level::INFO,
            time: Utc::now(),
            bindings: Map::new(),
            fields: Map::new(),
            msg: msg.into(),
        }
    }

    #[test]
    fn json_lines_writes_one_line_per_record() {
        let buf = SharedBuf::default();
        let sink = JsonLinesSink::new(buf.clone());

        sink.write(&record("request"));
        sink.write(&record("response"));
        sink.flush();

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["msg"], json!("request"));
        assert_eq!(lines[1]["msg"], json!("response"));
    }

    #[test]
    fn json_lines_swallows_write_errors() {
        let sink = JsonLinesSink::new(Broken);
        sink.write(&record("a"));
        sink.write(&record("b"));
        sink.flush();
        assert!(sink.warned.load(Ordering::Relaxed));
    }

    #[test]
    fn memory_sink_keeps_order_and_clears() {
        let sink = MemorySink::default();
        sink.write(&record("first"));
        sink.write(&record("second"));

        let msgs: Vec<_> = sink.records().into_iter().map(|r| r.msg).collect();
        assert_eq!(msgs, vec!["first", "second"]);

        sink.clear();
        assert!(sink.records().is_empty());
    }

    #[test]
    fn tracing_sink_nests_the_record_as_a_json_string() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        let mut r = record("request");
        r.bindings.insert("ns".into(), json!("api"));
        tracing::subscriber::with_default(subscriber, || TracingSink.write(&r));

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let line: Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(line["target"], json!("reqlog"));
        assert_eq!(line["fields"]["message"], json!("request"));

        let nested: Value =
            serde_json::from_str(line["fields"]["record"].as_str().unwrap()).unwrap();
        assert_eq!(nested["ns"], json!("api"));
        assert_eq!(nested["msg"], json!("request"));
    }

    #[test]
    fn tracing_sink_accepts_every_level() {
        let sink = TracingSink;
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            let mut r = record("level");
            r.level = level;
            sink.write(&r);
        }
    }
}
