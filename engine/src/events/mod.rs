//! Logging hook for gateway calls and LLM exchanges
//!
//! Every call the engine makes to the outside world is reported as an event
//! `(correlation_id, kind, payload)`. The correlation id is scoped to one user
//! turn through a task-local, so gateway code can emit without threading the id
//! through every signature. Payload inclusion is gated by [`PayloadLevel`]:
//! INFO drops payloads, DEBUG truncates them, TRACE keeps them whole. Secret
//! looking keys and values are redacted before anything is recorded.

use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::secrets::{is_secret_key, scrub_secrets};

/// Maximum characters of a payload kept below TRACE level.
pub const DEBUG_PAYLOAD_LIMIT: usize = 600;

/// Capacity of the in-memory recorder before the oldest events are evicted.
const RECORDER_CAPACITY: usize = 512;

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Generate a short correlation id (first 8 hex chars of a v4 uuid).
pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// The correlation id of the turn currently executing, or `"-"` outside one.
pub fn current_correlation_id() -> String {
    CORRELATION_ID
        .try_with(|id| id.clone())
        .unwrap_or_else(|_| "-".to_string())
}

/// Run `fut` with `correlation_id` visible to every event emitted inside it.
pub async fn with_correlation_id<F: Future>(correlation_id: String, fut: F) -> F::Output {
    CORRELATION_ID.scope(correlation_id, fut).await
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TurnStarted,
    ToolRequest,
    ToolResponse,
    ToolFailure,
    LlmRequest,
    LlmResponse,
    LlmFailure,
    ContractRepair,
    Planning,
    Ranking,
    Feedback,
    TurnCompleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TurnStarted => "turn_started",
            EventKind::ToolRequest => "tool_request",
            EventKind::ToolResponse => "tool_response",
            EventKind::ToolFailure => "tool_failure",
            EventKind::LlmRequest => "llm_request",
            EventKind::LlmResponse => "llm_response",
            EventKind::LlmFailure => "llm_failure",
            EventKind::ContractRepair => "contract_repair",
            EventKind::Planning => "planning",
            EventKind::Ranking => "ranking",
            EventKind::Feedback => "feedback",
            EventKind::TurnCompleted => "turn_completed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of an event payload reaches the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PayloadLevel {
    Info,
    Debug,
    Trace,
}

impl PayloadLevel {
    /// Parse a config value; unknown values fall back to DEBUG.
    pub fn parse(level: &str) -> Self {
        match level.trim().to_lowercase().as_str() {
            "info" => PayloadLevel::Info,
            "trace" => PayloadLevel::Trace,
            _ => PayloadLevel::Debug,
        }
    }

    /// Apply this level's inclusion rule to a payload.
    pub fn shape(&self, payload: &Value) -> Option<Value> {
        match self {
            PayloadLevel::Info => None,
            PayloadLevel::Debug => Some(truncate_payload(&redact_payload(payload))),
            PayloadLevel::Trace => Some(redact_payload(payload)),
        }
    }
}

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub correlation_id: String,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Destination for engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, correlation_id: &str, kind: EventKind, payload: Value);

    /// Emit under the correlation id of the current turn.
    fn record(&self, kind: EventKind, payload: Value) {
        self.emit(&current_correlation_id(), kind, payload);
    }
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn EventSink>;

/// Default sink: writes `tracing` events under the `wayfarer_engine::events` target.
pub struct TracingEventSink {
    level: PayloadLevel,
}

impl TracingEventSink {
    pub fn new(level: PayloadLevel) -> Self {
        Self { level }
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, correlation_id: &str, kind: EventKind, payload: Value) {
        match self.level.shape(&payload) {
            None => tracing::info!(correlation_id, event = kind.as_str()),
            Some(shaped) if self.level == PayloadLevel::Trace => {
                tracing::trace!(correlation_id, event = kind.as_str(), payload = %shaped)
            }
            Some(shaped) => {
                tracing::debug!(correlation_id, event = kind.as_str(), payload = %shaped)
            }
        }
    }
}

/// Bounded in-memory sink, used by tests and `--trace-events`.
#[derive(Clone)]
pub struct RecordingSink {
    level: PayloadLevel,
    events: Arc<Mutex<VecDeque<Event>>>,
}

impl RecordingSink {
    pub fn new(level: PayloadLevel) -> Self {
        Self {
            level,
            events: Arc::new(Mutex::new(VecDeque::with_capacity(64))),
        }
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Recorded events of one kind.
    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, correlation_id: &str, kind: EventKind, payload: Value) {
        let event = Event {
            correlation_id: correlation_id.to_string(),
            kind,
            payload: self.level.shape(&payload),
        };
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() == RECORDER_CAPACITY {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that forwards to several sinks.
pub struct FanoutSink {
    sinks: Vec<SharedSink>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, correlation_id: &str, kind: EventKind, payload: Value) {
        for sink in &self.sinks {
            sink.emit(correlation_id, kind, payload.clone());
        }
    }
}

/// Replace values under secret-looking keys and scrub secret-looking strings.
pub fn redact_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if is_secret_key(k) {
                        (k.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (k.clone(), redact_payload(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_payload).collect()),
        Value::String(s) => Value::String(scrub_secrets(s)),
        other => other.clone(),
    }
}

/// Collapse structured payloads longer than [`DEBUG_PAYLOAD_LIMIT`] into a truncated string.
pub fn truncate_payload(payload: &Value) -> Value {
    let text = match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= DEBUG_PAYLOAD_LIMIT {
        return payload.clone();
    }
    let cut: String = text.chars().take(DEBUG_PAYLOAD_LIMIT).collect();
    Value::String(format!("{}...(truncated)", cut))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_correlation_id_shape() {
        let id = new_correlation_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_correlation_id());
    }

    #[tokio::test]
    async fn test_correlation_id_scoped_to_turn() {
        assert_eq!(current_correlation_id(), "-");
        let seen = with_correlation_id("abcd1234".to_string(), async {
            current_correlation_id()
        })
        .await;
        assert_eq!(seen, "abcd1234");
        assert_eq!(current_correlation_id(), "-");
    }

    #[test]
    fn test_info_level_omits_payload() {
        let sink = RecordingSink::new(PayloadLevel::Info);
        sink.emit("c1", EventKind::ToolRequest, json!({"q": "Lisbon"}));
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].payload.is_none());
    }

    #[test]
    fn test_debug_level_truncates_payload() {
        let sink = RecordingSink::new(PayloadLevel::Debug);
        let big: Vec<u32> = (0..1000).collect();
        sink.emit("c1", EventKind::ToolResponse, json!({ "items": big }));
        let payload = sink.events()[0].payload.clone().unwrap();
        let text = payload.as_str().unwrap();
        assert!(text.ends_with("...(truncated)"));
        assert!(text.chars().count() <= DEBUG_PAYLOAD_LIMIT + 20);
    }

    #[test]
    fn test_trace_level_keeps_payload_but_redacts() {
        let sink = RecordingSink::new(PayloadLevel::Trace);
        let big: Vec<u32> = (0..1000).collect();
        sink.emit(
            "c1",
            EventKind::LlmRequest,
            json!({ "items": big, "api_key": "abc", "nested": {"Authorization": "Bearer x"} }),
        );
        let payload = sink.events()[0].payload.clone().unwrap();
        assert_eq!(payload["items"].as_array().unwrap().len(), 1000);
        assert_eq!(payload["api_key"], "[REDACTED]");
        assert_eq!(payload["nested"]["Authorization"], "[REDACTED]");
    }

    #[test]
    fn test_recorder_is_bounded() {
        let sink = RecordingSink::new(PayloadLevel::Info);
        for _ in 0..(RECORDER_CAPACITY + 10) {
            sink.emit("c", EventKind::Planning, Value::Null);
        }
        assert_eq!(sink.events().len(), RECORDER_CAPACITY);
        assert_eq!(sink.drain().len(), RECORDER_CAPACITY);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_fanout_reaches_all_sinks() {
        let a = RecordingSink::new(PayloadLevel::Info);
        let b = RecordingSink::new(PayloadLevel::Info);
        let fanout = FanoutSink::new(vec![Arc::new(a.clone()), Arc::new(b.clone())]);
        fanout.emit("c", EventKind::Feedback, Value::Null);
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }

    #[test]
    fn test_payload_level_parse() {
        assert_eq!(PayloadLevel::parse("INFO"), PayloadLevel::Info);
        assert_eq!(PayloadLevel::parse("trace"), PayloadLevel::Trace);
        assert_eq!(PayloadLevel::parse("whatever"), PayloadLevel::Debug);
    }
}
