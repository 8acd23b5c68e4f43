//! # Celery Event Types
//!
//! Typed representation of the events Celery publishes on its monitoring
//! exchange. A single structured record per event, discriminated by the wire
//! `type` field, replaces ad-hoc inspection of untyped payloads.
//!
//! ## Wire Format
//!
//! Celery serializes each event as a JSON object:
//!
//! ```text
//! {"type": "task-received", "uuid": "...", "name": "tasks.add",
//!  "hostname": "celery@worker-1", "timestamp": 1700000000.1, ...}
//! {"type": "task-succeeded", "uuid": "...", "runtime": 0.42, ...}
//! {"type": "worker-heartbeat", "hostname": "celery@worker-1", ...}
//! ```
//!
//! Grouped dispatchers may ship several events in one message as a JSON array.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

use crate::error::{ExporterError, ExporterResult};

/// Lifecycle state transition reported by a task event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskEventType {
    Received,
    Started,
    Succeeded,
    Failed,
    Retried,
    Revoked,
    Rejected,
    /// Any other `task-*` type (e.g. `task-sent`), kept verbatim for logging
    Unrecognized(String),
}

impl TaskEventType {
    /// Map a wire type string (`task-received`, ...) to its variant
    pub fn from_wire(event_type: &str) -> Self {
        match event_type {
            "task-received" => Self::Received,
            "task-started" => Self::Started,
            "task-succeeded" => Self::Succeeded,
            "task-failed" => Self::Failed,
            "task-retried" => Self::Retried,
            "task-revoked" => Self::Revoked,
            "task-rejected" => Self::Rejected,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Self::Received => "task-received",
            Self::Started => "task-started",
            Self::Succeeded => "task-succeeded",
            Self::Failed => "task-failed",
            Self::Retried => "task-retried",
            Self::Revoked => "task-revoked",
            Self::Rejected => "task-rejected",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for TaskEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One lifecycle notification for one task execution
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEvent {
    /// Task instance id, stable across every event of one execution
    pub uuid: String,
    pub event_type: TaskEventType,
    /// Logical task name; Celery only guarantees it on `task-received`
    pub name: Option<String>,
    pub hostname: Option<String>,
    /// Execution time in seconds; only on `task-succeeded`
    pub runtime: Option<f64>,
    pub timestamp: Option<f64>,
}

impl TaskEvent {
    pub fn new(uuid: impl Into<String>, event_type: TaskEventType) -> Self {
        Self {
            uuid: uuid.into(),
            event_type,
            name: None,
            hostname: None,
            runtime: None,
            timestamp: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_runtime(mut self, runtime: f64) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn received(
        uuid: impl Into<String>,
        name: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self::new(uuid, TaskEventType::Received)
            .with_name(name)
            .with_hostname(hostname)
    }

    pub fn started(uuid: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self::new(uuid, TaskEventType::Started).with_hostname(hostname)
    }

    pub fn succeeded(uuid: impl Into<String>, hostname: impl Into<String>, runtime: f64) -> Self {
        Self::new(uuid, TaskEventType::Succeeded)
            .with_hostname(hostname)
            .with_runtime(runtime)
    }
}

/// Worker presence transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEventKind {
    Online,
    Heartbeat,
    Offline,
    Other(String),
}

impl WorkerEventKind {
    pub fn from_wire(event_type: &str) -> Self {
        match event_type {
            "worker-online" => Self::Online,
            "worker-heartbeat" => Self::Heartbeat,
            "worker-offline" => Self::Offline,
            other => Self::Other(other.to_string()),
        }
    }

    /// Presence implied by this event, if any
    pub fn is_alive(&self) -> Option<bool> {
        match self {
            Self::Online | Self::Heartbeat => Some(true),
            Self::Offline => Some(false),
            Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEvent {
    pub hostname: String,
    pub kind: WorkerEventKind,
}

/// Any event that is neither a task nor a worker event
#[derive(Debug, Clone, PartialEq)]
pub struct GenericEvent {
    pub event_type: String,
    pub hostname: Option<String>,
    pub fields: Map<String, Value>,
}

/// Everything the event source can yield
#[derive(Debug, Clone, PartialEq)]
pub enum CeleryEvent {
    Task(TaskEvent),
    Worker(WorkerEvent),
    Generic(GenericEvent),
}

impl From<TaskEvent> for CeleryEvent {
    fn from(event: TaskEvent) -> Self {
        CeleryEvent::Task(event)
    }
}

impl From<WorkerEvent> for CeleryEvent {
    fn from(event: WorkerEvent) -> Self {
        CeleryEvent::Worker(event)
    }
}

/// Serde shape of a single event on the wire
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    runtime: Option<f64>,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RawEvent> for CeleryEvent {
    type Error = ExporterError;

    fn try_from(raw: RawEvent) -> ExporterResult<Self> {
        if raw.event_type.starts_with("task-") {
            let uuid = raw.uuid.filter(|u| !u.is_empty()).ok_or_else(|| {
                ExporterError::DecodeError(format!("{} event without uuid", raw.event_type))
            })?;

            return Ok(CeleryEvent::Task(TaskEvent {
                uuid,
                event_type: TaskEventType::from_wire(&raw.event_type),
                name: raw.name,
                hostname: raw.hostname,
                runtime: raw.runtime,
                timestamp: raw.timestamp,
            }));
        }

        if raw.event_type.starts_with("worker-") {
            return Ok(CeleryEvent::Worker(WorkerEvent {
                hostname: raw.hostname.unwrap_or_default(),
                kind: WorkerEventKind::from_wire(&raw.event_type),
            }));
        }

        let mut fields = raw.extra;
        if let Some(name) = raw.name {
            fields.insert("name".to_string(), Value::String(name));
        }
        if let Some(uuid) = raw.uuid {
            fields.insert("uuid".to_string(), Value::String(uuid));
        }

        Ok(CeleryEvent::Generic(GenericEvent {
            event_type: raw.event_type,
            hostname: raw.hostname,
            fields,
        }))
    }
}

/// Decode one broker message body into events.
///
/// Accepts a single event object or an array of them. Inside an array each
/// element stands alone: a malformed element is logged and skipped while its
/// siblings are still returned.
pub fn decode_events(body: &[u8]) -> ExporterResult<Vec<CeleryEvent>> {
    let value: Value = serde_json::from_slice(body)?;

    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match decode_event(item) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, error = %e, "Skipping undecodable event in grouped message");
                    None
                }
            })
            .collect()),
        Value::Object(_) => Ok(vec![decode_event(value)?]),
        other => Err(ExporterError::DecodeError(format!(
            "expected event object or array, got {other}"
        ))),
    }
}

fn decode_event(value: Value) -> ExporterResult<CeleryEvent> {
    let raw: RawEvent = serde_json::from_value(value)?;
    CeleryEvent::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_event_type_wire_mapping() {
        assert_eq!(TaskEventType::from_wire("task-received"), TaskEventType::Received);
        assert_eq!(TaskEventType::from_wire("task-rejected"), TaskEventType::Rejected);
        assert_eq!(
            TaskEventType::from_wire("task-bogus"),
            TaskEventType::Unrecognized("task-bogus".to_string())
        );
        assert_eq!(TaskEventType::Retried.as_wire(), "task-retried");
        assert!(!TaskEventType::from_wire("task-sent").is_recognized());
    }

    #[test]
    fn test_decode_received_event() {
        let body = br#"{"type":"task-received","uuid":"abc","name":"tasks.add",
            "hostname":"celery@w1","timestamp":1700000000.5,"args":"(1, 2)","retries":0}"#;

        let events = decode_events(body).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            CeleryEvent::Task(event) => {
                assert_eq!(event.uuid, "abc");
                assert_eq!(event.event_type, TaskEventType::Received);
                assert_eq!(event.name.as_deref(), Some("tasks.add"));
                assert_eq!(event.hostname.as_deref(), Some("celery@w1"));
                assert_eq!(event.timestamp, Some(1700000000.5));
                assert_eq!(event.runtime, None);
            }
            other => panic!("expected task event, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_succeeded_event_carries_runtime() {
        let body = br#"{"type":"task-succeeded","uuid":"abc","runtime":0.42,"result":"3"}"#;
        let events = decode_events(body).unwrap();
        let CeleryEvent::Task(event) = &events[0] else {
            panic!("expected task event");
        };
        assert_eq!(event.runtime, Some(0.42));
        assert_eq!(event.name, None);
    }

    #[test]
    fn test_decode_grouped_events() {
        let body = br#"[{"type":"task-started","uuid":"a","hostname":"h"},
                        {"type":"worker-heartbeat","hostname":"h","active":1}]"#;
        let events = decode_events(body).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CeleryEvent::Task(_)));
        assert_eq!(
            events[1],
            CeleryEvent::Worker(WorkerEvent {
                hostname: "h".to_string(),
                kind: WorkerEventKind::Heartbeat,
            })
        );
    }

    #[test]
    fn test_decode_generic_event_keeps_fields() {
        let body = br#"{"type":"custom-thing","hostname":"h","payload":{"k":1}}"#;
        let events = decode_events(body).unwrap();
        let CeleryEvent::Generic(event) = &events[0] else {
            panic!("expected generic event");
        };
        assert_eq!(event.event_type, "custom-thing");
        assert_eq!(event.hostname.as_deref(), Some("h"));
        assert!(event.fields.contains_key("payload"));
    }

    #[test]
    fn test_decode_task_event_without_uuid_fails() {
        let err = decode_events(br#"{"type":"task-started","hostname":"h"}"#).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_decode_grouped_events_skips_only_malformed_elements() {
        let body = br#"[{"type":"task-received","uuid":"a","name":"tasks.add","hostname":"h"},
                        {"type":"task-started","hostname":"h"},
                        "not-an-event",
                        {"type":"task-succeeded","uuid":"a","hostname":"h","runtime":0.5}]"#;

        let events = decode_events(body).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            CeleryEvent::Task(e) if e.event_type == TaskEventType::Received
                && e.name.as_deref() == Some("tasks.add")
        ));
        assert!(matches!(
            &events[1],
            CeleryEvent::Task(e) if e.event_type == TaskEventType::Succeeded
        ));
    }

    #[test]
    fn test_decode_rejects_non_object_body() {
        assert!(decode_events(b"42").is_err());
        assert!(decode_events(b"not json").is_err());
        assert!(decode_events(br#"{"uuid":"missing-type"}"#).is_err());
    }

    #[test]
    fn test_worker_presence_mapping() {
        assert_eq!(WorkerEventKind::from_wire("worker-online").is_alive(), Some(true));
        assert_eq!(WorkerEventKind::from_wire("worker-heartbeat").is_alive(), Some(true));
        assert_eq!(WorkerEventKind::from_wire("worker-offline").is_alive(), Some(false));
        assert_eq!(WorkerEventKind::from_wire("worker-restarted").is_alive(), None);
    }
}
