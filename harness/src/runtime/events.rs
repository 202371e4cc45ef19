//! Callback event queue
//!
//! FIFO of notifications POSTed by the supervised system. HTTP handler tasks
//! push concurrently; the test task drains it one match at a time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// A single notification received on the callback endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackEvent {
    event_type: String,
    payload: Map<String, Value>,
    received_at: DateTime<Utc>,
}

impl CallbackEvent {
    pub fn new(event_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            received_at: Utc::now(),
        }
    }

    /// Build from an arbitrary JSON value, reading `eventType` if present
    ///
    /// Non-object bodies are kept under a `body` key so nothing sent to the
    /// endpoint is lost.
    pub fn from_json(value: Value) -> Self {
        let payload = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("body".to_string(), other);
                map
            }
        };
        let event_type = payload
            .get("eventType")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_EVENT_TYPE)
            .to_string();
        Self::new(event_type, payload)
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Arc<Mutex<VecDeque<CallbackEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<CallbackEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, event: CallbackEvent) {
        tracing::debug!("📥 Queued callback event '{}'", event.event_type());
        self.lock().push_back(event);
    }

    /// Pop from the head until `predicate` matches
    ///
    /// Non-matching events are discarded for good. Returns `None` once the
    /// queue is empty. Never blocks beyond the single lock acquisition.
    pub fn drain_matching<P>(&self, mut predicate: P) -> Option<CallbackEvent>
    where
        P: FnMut(&CallbackEvent) -> bool,
    {
        let mut events = self.lock();
        while let Some(event) = events.pop_front() {
            if predicate(&event) {
                return Some(event);
            }
            tracing::debug!(
                "⏭️ Event '{}' did not match criteria, skipping to next event",
                event.event_type()
            );
        }
        None
    }

    pub fn clear(&self) {
        let mut events = self.lock();
        let dropped = events.len();
        events.clear();
        if dropped > 0 {
            tracing::info!("🗑️ Cleared {} queued callback events", dropped);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
