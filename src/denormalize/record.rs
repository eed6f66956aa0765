use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Which feed entity a record was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Vehicle,
    TripUpdate,
    Alert,
}

/// One flat document handed to the sink.
///
/// `fields` is keyed by dotted path (`trip.id`, `stop.name`, ...). Keys are
/// only present when the source had a value for them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Stable identity for idempotent indexing. Set on alerts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl OutputRecord {
    pub fn new(kind: RecordKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind,
            id: None,
            entity_id: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub(crate) fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub(crate) fn put_opt<V: Into<Value>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.put(key, value);
        }
    }

    /// Like [`put_opt`](Self::put_opt) but also drops empty strings.
    pub(crate) fn put_text(&mut self, key: impl Into<String>, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.put(key, value);
        }
    }
}
