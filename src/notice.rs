//! Purpose: Define the transient user-visible notification channel.
//! Exports: `Notice`, `NoticeSink`, `StderrNotices`, `MemoryNotices`, `notice_json`.
//! Role: Shared contract for one-shot user messages (request failures, operation failures).
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: The transport layer emits exactly one notice per failed request.
use serde_json::{Map, Value, json};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub op: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Notice {
    pub fn error(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            time: now_rfc3339().unwrap_or_default(),
            op: op.into(),
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("op".to_string(), json!(notice.op));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

pub fn now_rfc3339() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

/// Receives transient user-visible messages. The CLI renders them on stderr;
/// embedders and tests supply their own sink.
pub trait NoticeSink: Send + Sync {
    fn emit(&self, notice: Notice);
}

/// Default sink: one JSON line per notice on stderr.
pub struct StderrNotices;

impl NoticeSink for StderrNotices {
    fn emit(&self, notice: Notice) {
        let value = notice_json(&notice);
        let json = serde_json::to_string(&value).unwrap_or_else(|_| {
            "{\"notice\":{\"kind\":\"error\",\"message\":\"json encode failed\"}}".to_string()
        });
        eprintln!("{json}");
    }
}

/// Recording sink for tests and embedders that surface notices themselves.
#[derive(Default)]
pub struct MemoryNotices {
    recorded: Mutex<Vec<Notice>>,
}

impl MemoryNotices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notice> {
        let mut guard = self.recorded.lock().unwrap_or_else(|poison| poison.into_inner());
        std::mem::take(&mut *guard)
    }

    pub fn len(&self) -> usize {
        self.recorded
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NoticeSink for MemoryNotices {
    fn emit(&self, notice: Notice) {
        self.recorded
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(notice);
    }
}
