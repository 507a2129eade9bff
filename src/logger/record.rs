use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::Level;

/// One emitted log record.
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub time: DateTime<Utc>,
    /// Fields inherited from the logger (`ns`, `id`, …).
    pub bindings: Map<String, Value>,
    /// Call-site fields, after the log formatter ran.
    pub fields: Map<String, Value>,
    pub msg: String,
}

impl Record {
    /// Look a key up in the call-site fields, then in the bindings.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).or_else(|| self.bindings.get(key))
    }

    /// Flatten into a single JSON object.
    ///
    /// `level`, `time` and `msg` are written last so call-site fields can
    /// never overwrite them.
    pub fn to_json(&self) -> Value {
        let mut obj = self.bindings.clone();
        obj.extend(self.fields.clone());
        obj.insert("level".into(), Value::String(level_name(self.level).into()));
        obj.insert("time".into(), Value::from(self.time.timestamp_millis()));
        obj.insert("msg".into(), Value::String(self.msg.clone()));
        Value::Object(obj)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

pub(crate) fn level_name(level: Level) -> &'static str {
    match level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> Record {
        let Value::Object(fields) = fields else { panic!("object expected") };
        let mut bindings = Map::new();
        bindings.insert("ns".into(), json!("api"));
        Record {
            level: Level::INFO,
            time: Utc::now(),
            bindings,
            fields,
            msg: "request".into(),
        }
    }

    #[test]
    fn to_json_flattens_bindings_and_fields() {
        let json = record(json!({ "req": { "method": "GET", "url": "/" } })).to_json();
        assert_eq!(json["ns"], "api");
        assert_eq!(json["req"]["url"], "/");
        assert_eq!(json["level"], "info");
        assert_eq!(json["msg"], "request");
        assert!(json["time"].is_i64());
    }

    #[test]
    fn reserved_keys_win_over_fields() {
        let json = record(json!({ "msg": "spoofed", "level": "fatal" })).to_json();
        assert_eq!(json["msg"], "request");
        assert_eq!(json["level"], "info");
    }

    #[test]
    fn get_prefers_fields_over_bindings() {
        let r = record(json!({ "ns": "shadow" }));
        assert_eq!(r.get("ns"), Some(&json!("shadow")));
        assert_eq!(r.get("missing"), None);
    }

    #[test]
    fn display_is_a_single_json_line() {
        let line = record(json!({})).to_string();
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["msg"], "request");
    }
}
