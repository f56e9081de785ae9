// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telemetry records: untyped, insertion-ordered field maps.
//!
//! Every telemetry call produces one [`TelemetryRecord`], a flat mapping
//! from field name to a [`FieldValue`]. The container preserves insertion
//! order and rejects duplicate field names, so a caller-supplied property
//! can never silently overwrite a reserved field like `UtcDateTime`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A single field value in a telemetry record.
///
/// The closed set of variants covers everything a telemetry call can
/// attach: strings, numbers, booleans, UTC timestamps, and nested maps.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Number(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Map(Vec<(String, FieldValue)>),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Timestamp(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            FieldValue::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(t)
    }
}

/// Error produced while shaping a telemetry record.
///
/// Shaping errors never reach producers; the record is dropped with a
/// logged diagnostic at the call boundary.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("duplicate telemetry field '{0}'")]
    DuplicateField(String),
}

/// The kind of a telemetry event, which determines index routing.
///
/// `Log` and `Trace` are routable for backend compatibility but no
/// producer operation currently emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Metric,
    Event,
    Exception,
    Dependency,
    Request,
    Log,
    Trace,
}

impl EventKind {
    /// The tag embedded in index names for this kind.
    #[must_use]
    pub fn kind_tag(self) -> &'static str {
        match self {
            EventKind::Metric => "metric",
            EventKind::Event => "event",
            EventKind::Exception => "exception",
            EventKind::Dependency => "dependency",
            EventKind::Request => "request",
            EventKind::Log => "log",
            EventKind::Trace => "trace",
        }
    }
}

/// An untyped telemetry document.
///
/// Fields serialize as one flat JSON object in insertion order. The
/// record is built once per telemetry call, enriched with `UtcDateTime`
/// and `MachineName` at intake time, and owned by the pipeline from
/// enqueue to dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryRecord {
    fields: Vec<(String, FieldValue)>,
}

impl TelemetryRecord {
    #[must_use]
    pub fn new() -> Self {
        TelemetryRecord { fields: Vec::new() }
    }

    /// Appends a field, rejecting duplicate names.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), ShapeError> {
        let name = name.into();
        if self.fields.iter().any(|(existing, _)| *existing == name) {
            return Err(ShapeError::DuplicateField(name));
        }
        self.fields.push((name, value.into()));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for TelemetryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_insert_and_get() {
        let mut record = TelemetryRecord::new();
        record.insert("Request", "GetPlayerState").unwrap();
        record.insert("Duration", 12.5).unwrap();
        record.insert("Success", true).unwrap();

        assert_eq!(record.len(), 3);
        assert_eq!(
            record.get("Request"),
            Some(&FieldValue::Str("GetPlayerState".to_string()))
        );
        assert_eq!(record.get("Duration"), Some(&FieldValue::Number(12.5)));
        assert_eq!(record.get("Success"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.get("Missing"), None);
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let mut record = TelemetryRecord::new();
        record.insert("Eventname", "start").unwrap();

        let err = record.insert("Eventname", "again").unwrap_err();
        assert!(matches!(err, ShapeError::DuplicateField(ref name) if name == "Eventname"));
        // The original value is untouched
        assert_eq!(record.len(), 1);
        assert_eq!(
            record.get("Eventname"),
            Some(&FieldValue::Str("start".to_string()))
        );
    }

    #[test]
    fn test_serialize_preserves_insertion_order() {
        let mut record = TelemetryRecord::new();
        record.insert("b", 2.0).unwrap();
        record.insert("a", 1.0).unwrap();
        record.insert("c", "three").unwrap();

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"b":2.0,"a":1.0,"c":"three"}"#);
    }

    #[test]
    fn test_serialize_timestamp_rfc3339() {
        let mut record = TelemetryRecord::new();
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        record.insert("UtcDateTime", instant).unwrap();

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"UtcDateTime":"2024-01-02T03:04:05.000000Z"}"#);
    }

    #[test]
    fn test_serialize_nested_map() {
        let mut record = TelemetryRecord::new();
        record
            .insert(
                "Context",
                FieldValue::Map(vec![
                    ("Silo".to_string(), FieldValue::Str("silo-1".to_string())),
                    ("Generation".to_string(), FieldValue::Number(3.0)),
                ]),
            )
            .unwrap();

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Context":{"Silo":"silo-1","Generation":3.0}}"#);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(EventKind::Metric.kind_tag(), "metric");
        assert_eq!(EventKind::Event.kind_tag(), "event");
        assert_eq!(EventKind::Exception.kind_tag(), "exception");
        assert_eq!(EventKind::Dependency.kind_tag(), "dependency");
        assert_eq!(EventKind::Request.kind_tag(), "request");
        assert_eq!(EventKind::Log.kind_tag(), "log");
        assert_eq!(EventKind::Trace.kind_tag(), "trace");
    }

    #[test]
    fn test_iter_order() {
        let mut record = TelemetryRecord::new();
        record.insert("first", 1.0).unwrap();
        record.insert("second", 2.0).unwrap();

        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
