use super::EventFormatter;
use crate::domain::{FieldValue, LogEvent, UNREPRESENTABLE};
use serde_json::{Map, Number, Value};

/// Containers nested deeper than this are rendered as strings.
pub const MAX_SERIALIZE_DEPTH: usize = 8;

/// Appended to values cut at `max_value_length` characters.
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Keys owned by the formatter; extras with these names are skipped.
pub const RESERVED_KEYS: &[&str] = &[
    "timestamp",
    "level",
    "logger",
    "message",
    "file",
    "line",
    "function",
    "correlation_id",
    "process_name",
    "pid",
    "thread_name",
    "thread_id",
    "hostname",
    "exception",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// One JSON object per event, keys in a fixed order.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    include_runtime_fields: bool,
    max_value_length: usize,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(true, crate::config::DEFAULT_MAX_VALUE_LENGTH)
    }
}

impl JsonFormatter {
    /// `max_value_length` of 0 disables truncation.
    pub fn new(include_runtime_fields: bool, max_value_length: usize) -> Self {
        Self {
            include_runtime_fields,
            max_value_length,
        }
    }

    pub fn to_value(&self, event: &LogEvent) -> Value {
        let mut data = Map::new();
        data.insert(
            "timestamp".into(),
            Value::String(event.timestamp.format(TIMESTAMP_FORMAT).to_string()),
        );
        data.insert("level".into(), Value::String(event.level.name()));
        data.insert("logger".into(), Value::String(event.logger.to_string()));
        data.insert(
            "message".into(),
            Value::String(event.rendered_message().into_owned()),
        );
        data.insert(
            "file".into(),
            Value::String(event.location.file.to_string()),
        );
        data.insert("line".into(), Value::from(event.location.line));
        data.insert(
            "function".into(),
            Value::String(event.location.function_name().to_string()),
        );
        data.insert(
            "correlation_id".into(),
            Value::String(event.correlation_id.clone()),
        );

        for (key, value) in &event.extras {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            data.insert(key.clone(), self.serialize_value(value, 0));
        }

        if self.include_runtime_fields {
            let runtime = &event.runtime;
            data.insert(
                "process_name".into(),
                Value::String(runtime.process_name.to_string()),
            );
            data.insert("pid".into(), Value::from(runtime.pid));
            data.insert(
                "thread_name".into(),
                runtime
                    .thread_name
                    .as_ref()
                    .map_or(Value::Null, |name| Value::String(name.clone())),
            );
            data.insert(
                "thread_id".into(),
                Value::String(runtime.thread_id.clone()),
            );
            data.insert(
                "hostname".into(),
                Value::String(runtime.hostname.to_string()),
            );
        }

        if let Some(exception) = &event.exception {
            data.insert("exception".into(), Value::String(exception.clone()));
        }

        Value::Object(data)
    }

    fn serialize_value(&self, value: &FieldValue, depth: usize) -> Value {
        if depth >= MAX_SERIALIZE_DEPTH {
            return Value::String(self.safe_string(value));
        }

        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::I64(n) => Value::from(*n),
            FieldValue::U64(n) => Value::from(*n),
            // NaN and infinities have no JSON form
            FieldValue::F64(n) => Number::from_f64(*n)
                .map_or_else(|| Value::String(n.to_string()), Value::Number),
            FieldValue::Str(s) => Value::String(self.truncate(s)),
            FieldValue::Bytes(bytes) => {
                Value::String(self.truncate(&String::from_utf8_lossy(bytes)))
            }
            FieldValue::Uuid(id) => Value::String(id.hyphenated().to_string()),
            FieldValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
            FieldValue::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
            FieldValue::Path(path) => Value::String(self.truncate(&path.display().to_string())),
            FieldValue::Seq(items) | FieldValue::Set(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.serialize_value(item, depth + 1))
                    .collect(),
            ),
            FieldValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.serialize_value(v, depth + 1)))
                    .collect(),
            ),
            FieldValue::Json(json) => self.serialize_json(json, depth),
            FieldValue::Unrepresentable => Value::String(UNREPRESENTABLE.to_string()),
        }
    }

    fn serialize_json(&self, value: &Value, depth: usize) -> Value {
        if depth >= MAX_SERIALIZE_DEPTH {
            return Value::String(self.truncate(&value.to_string()));
        }

        match value {
            Value::String(s) => Value::String(self.truncate(s)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.serialize_json(item, depth + 1))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.serialize_json(v, depth + 1)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn safe_string(&self, value: &FieldValue) -> String {
        let mut text = String::new();
        if std::fmt::write(&mut text, format_args!("{value}")).is_err() {
            return UNREPRESENTABLE.to_string();
        }
        self.truncate(&text)
    }

    /// Cuts `value` at `max_value_length` characters, not bytes.
    pub fn truncate(&self, value: &str) -> String {
        if self.max_value_length == 0 {
            return value.to_string();
        }
        match value.char_indices().nth(self.max_value_length) {
            Some((cut, _)) => {
                let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
                out.push_str(&value[..cut]);
                out.push_str(TRUNCATION_MARKER);
                out
            }
            None => value.to_string(),
        }
    }
}

impl EventFormatter for JsonFormatter {
    fn format(&self, event: &LogEvent) -> String {
        serde_json::to_string(&self.to_value(event))
            .unwrap_or_else(|_| format!("{{\"message\":\"{UNREPRESENTABLE}\"}}"))
    }
}
