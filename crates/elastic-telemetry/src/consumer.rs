// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer-facing telemetry API: record shaping and enqueue.
//!
//! [`TelemetryConsumer`] is the handle application code records through.
//! It is cheap to clone and safe to share across tasks and threads.
//! Every `track_*` call shapes the event into a [`TelemetryRecord`],
//! enriches it with `UtcDateTime` and `MachineName`, and sends it on an
//! unbounded channel to the batcher. The call never blocks on I/O and
//! never returns an error: a malformed record (for example a property
//! colliding with a reserved field name) is logged and dropped, and a
//! send after the batcher has stopped is logged at debug and ignored.
//!
//! The channel is unbounded on purpose: if the backend is persistently
//! slower than the arrival rate, memory grows rather than producers
//! stalling. That mirrors the source system and is the documented
//! limitation of this sink.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::record::{EventKind, ShapeError, TelemetryRecord};

/// Field name for the enrichment timestamp.
const FIELD_UTC_DATE_TIME: &str = "UtcDateTime";

/// Field name for the enrichment host identity.
const FIELD_MACHINE_NAME: &str = "MachineName";

/// Cloneable, non-blocking producer handle for the telemetry sink.
#[derive(Debug, Clone)]
pub struct TelemetryConsumer {
    tx: mpsc::UnboundedSender<(EventKind, TelemetryRecord)>,
    machine_name: Arc<str>,
}

impl TelemetryConsumer {
    pub(crate) fn new(tx: mpsc::UnboundedSender<(EventKind, TelemetryRecord)>) -> Self {
        TelemetryConsumer {
            tx,
            machine_name: crate::hostname::machine_name().into(),
        }
    }

    /// Records a numeric metric. Consecutive dots in the name collapse
    /// to one (`a..b` becomes `a.b`).
    pub fn track_metric(&self, name: impl AsRef<str>, value: f64) {
        self.track_metric_with_properties(
            name,
            value,
            std::iter::empty::<(String, String)>(),
        );
    }

    /// Records a numeric metric with additional string properties.
    pub fn track_metric_with_properties(
        &self,
        name: impl AsRef<str>,
        value: f64,
        properties: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) {
        let key = sanitize_metric_name(name.as_ref());
        self.submit(EventKind::Metric, |record| {
            record.insert(key, value)?;
            for (name, value) in properties {
                record.insert(name.into(), value.into())?;
            }
            Ok(())
        });
    }

    /// Records a metric value of +1.
    pub fn increment_metric(&self, name: impl AsRef<str>) {
        self.track_metric(name, 1.0);
    }

    /// Records a positive metric value.
    pub fn increment_metric_by(&self, name: impl AsRef<str>, value: f64) {
        self.track_metric(name, value);
    }

    /// Records a metric value of -1.
    pub fn decrement_metric(&self, name: impl AsRef<str>) {
        self.track_metric(name, -1.0);
    }

    /// Records a negated metric value.
    pub fn decrement_metric_by(&self, name: impl AsRef<str>, value: f64) {
        self.track_metric(name, value * -1.0);
    }

    /// Records a named event.
    pub fn track_event(&self, name: impl Into<String>) {
        self.track_event_with(
            name,
            std::iter::empty::<(String, String)>(),
            std::iter::empty::<(String, f64)>(),
        );
    }

    /// Records a named event with string properties and numeric metrics.
    pub fn track_event_with(
        &self,
        name: impl Into<String>,
        properties: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
        metrics: impl IntoIterator<Item = (impl Into<String>, f64)>,
    ) {
        let name = name.into();
        self.submit(EventKind::Event, |record| {
            record.insert("Eventname", name)?;
            for (name, value) in properties {
                record.insert(name.into(), value.into())?;
            }
            for (name, value) in metrics {
                record.insert(name.into(), value)?;
            }
            Ok(())
        });
    }

    /// Records an error, including its full source chain.
    pub fn track_exception(&self, error: &(dyn Error + 'static)) {
        self.track_exception_with(
            error,
            std::iter::empty::<(String, String)>(),
            std::iter::empty::<(String, f64)>(),
        );
    }

    /// Records an error with string properties and numeric metrics.
    pub fn track_exception_with(
        &self,
        error: &(dyn Error + 'static),
        properties: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
        metrics: impl IntoIterator<Item = (impl Into<String>, f64)>,
    ) {
        let full = format_error_chain(error);
        let message = error.to_string();
        self.submit(EventKind::Exception, |record| {
            record.insert("Exception", full)?;
            record.insert("Message", message)?;
            for (name, value) in properties {
                record.insert(name.into(), value.into())?;
            }
            for (name, value) in metrics {
                record.insert(name.into(), value)?;
            }
            Ok(())
        });
    }

    /// Records an outbound dependency call.
    pub fn track_dependency(
        &self,
        dependency_name: impl Into<String>,
        command_name: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
        success: bool,
    ) {
        let dependency_name = dependency_name.into();
        let command_name = command_name.into();
        self.submit(EventKind::Dependency, |record| {
            record.insert("DependencyName", dependency_name)?;
            record.insert("CommandName", command_name)?;
            record.insert("StartTime", start_time)?;
            record.insert("Duration", duration_millis(duration))?;
            record.insert("Success", success)?;
            Ok(())
        });
    }

    /// Records an inbound request.
    pub fn track_request(
        &self,
        name: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
        response_code: impl Into<String>,
        success: bool,
    ) {
        let name = name.into();
        let response_code = response_code.into();
        self.submit(EventKind::Request, |record| {
            record.insert("Request", name)?;
            record.insert("StartTime", start_time)?;
            record.insert("Duration", duration_millis(duration))?;
            record.insert("ResponseCode", response_code)?;
            record.insert("Success", success)?;
            Ok(())
        });
    }

    /// Shapes one record, enriches it, and enqueues it. Shaping errors
    /// terminate here: the record is dropped and the producer is never
    /// informed.
    fn submit(
        &self,
        kind: EventKind,
        shape: impl FnOnce(&mut TelemetryRecord) -> Result<(), ShapeError>,
    ) {
        let mut record = TelemetryRecord::new();
        let shaped = shape(&mut record).and_then(|()| self.enrich(&mut record));
        match shaped {
            Ok(()) => {
                if let Err(e) = self.tx.send((kind, record)) {
                    debug!("telemetry batcher stopped, dropping record: {}", e);
                }
            }
            Err(e) => {
                warn!("dropping malformed {} record: {}", kind.kind_tag(), e);
            }
        }
    }

    fn enrich(&self, record: &mut TelemetryRecord) -> Result<(), ShapeError> {
        record.insert(FIELD_UTC_DATE_TIME, Utc::now())?;
        record.insert(FIELD_MACHINE_NAME, self.machine_name.as_ref())?;
        Ok(())
    }
}

/// Durations are recorded as fractional milliseconds.
fn duration_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Collapses runs of consecutive dots in a metric name to a single dot.
fn sanitize_metric_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut previous_was_dot = false;
    for c in name.chars() {
        if c == '.' {
            if previous_was_dot {
                continue;
            }
            previous_was_dot = true;
        } else {
            previous_was_dot = false;
        }
        sanitized.push(c);
    }
    sanitized
}

/// Full textual representation of an error: its message followed by
/// every source in the chain.
fn format_error_chain(error: &(dyn Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use chrono::TimeZone;
    use tracing_test::traced_test;

    fn test_consumer() -> (
        TelemetryConsumer,
        mpsc::UnboundedReceiver<(EventKind, TelemetryRecord)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TelemetryConsumer::new(tx), rx)
    }

    fn recv_one(
        rx: &mut mpsc::UnboundedReceiver<(EventKind, TelemetryRecord)>,
    ) -> (EventKind, TelemetryRecord) {
        rx.try_recv().expect("expected a shaped record")
    }

    #[test]
    fn test_track_metric_sanitizes_name() {
        let (consumer, mut rx) = test_consumer();

        consumer.track_metric("a..b", 5.0);

        let (kind, record) = recv_one(&mut rx);
        assert_eq!(kind, EventKind::Metric);
        assert_eq!(record.get("a.b"), Some(&FieldValue::Number(5.0)));
        assert_eq!(record.get("a..b"), None);
    }

    #[test]
    fn test_track_metric_exact_field_set() {
        let (consumer, mut rx) = test_consumer();

        consumer.track_metric("a..b", 5.0);

        let (_, record) = recv_one(&mut rx);
        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a.b", "UtcDateTime", "MachineName"]);
        assert!(matches!(
            record.get("UtcDateTime"),
            Some(FieldValue::Timestamp(_))
        ));
        assert!(matches!(
            record.get("MachineName"),
            Some(FieldValue::Str(name)) if !name.is_empty()
        ));
    }

    #[test]
    fn test_sanitize_collapses_runs_of_dots() {
        assert_eq!(sanitize_metric_name("a...b..c"), "a.b.c");
        assert_eq!(sanitize_metric_name("plain"), "plain");
        assert_eq!(sanitize_metric_name("already.fine"), "already.fine");
    }

    #[test]
    fn test_increment_and_decrement() {
        let (consumer, mut rx) = test_consumer();

        consumer.increment_metric("up");
        consumer.decrement_metric("down");
        consumer.increment_metric_by("up.by", 4.0);
        consumer.decrement_metric_by("down.by", 4.0);

        assert_eq!(recv_one(&mut rx).1.get("up"), Some(&FieldValue::Number(1.0)));
        assert_eq!(
            recv_one(&mut rx).1.get("down"),
            Some(&FieldValue::Number(-1.0))
        );
        assert_eq!(
            recv_one(&mut rx).1.get("up.by"),
            Some(&FieldValue::Number(4.0))
        );
        assert_eq!(
            recv_one(&mut rx).1.get("down.by"),
            Some(&FieldValue::Number(-4.0))
        );
    }

    #[test]
    fn test_track_event_with_properties_and_metrics() {
        let (consumer, mut rx) = test_consumer();

        consumer.track_event_with(
            "grain.activated",
            [("Silo", "silo-1")],
            [("ActivationCount", 17.0)],
        );

        let (kind, record) = recv_one(&mut rx);
        assert_eq!(kind, EventKind::Event);
        assert_eq!(
            record.get("Eventname"),
            Some(&FieldValue::Str("grain.activated".to_string()))
        );
        assert_eq!(
            record.get("Silo"),
            Some(&FieldValue::Str("silo-1".to_string()))
        );
        assert_eq!(
            record.get("ActivationCount"),
            Some(&FieldValue::Number(17.0))
        );
    }

    #[test]
    fn test_track_exception_includes_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("outer failure")]
        struct Outer {
            #[source]
            cause: std::io::Error,
        }

        let (consumer, mut rx) = test_consumer();
        let error = Outer {
            cause: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "socket closed"),
        };

        consumer.track_exception(&error);

        let (kind, record) = recv_one(&mut rx);
        assert_eq!(kind, EventKind::Exception);
        assert_eq!(
            record.get("Exception"),
            Some(&FieldValue::Str(
                "outer failure: socket closed".to_string()
            ))
        );
        assert_eq!(
            record.get("Message"),
            Some(&FieldValue::Str("outer failure".to_string()))
        );
    }

    #[test]
    fn test_track_dependency_field_set() {
        let (consumer, mut rx) = test_consumer();
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();

        consumer.track_dependency(
            "storage",
            "UPSERT grain_state",
            start,
            Duration::from_millis(250),
            true,
        );

        let (kind, record) = recv_one(&mut rx);
        assert_eq!(kind, EventKind::Dependency);
        assert_eq!(
            record.get("DependencyName"),
            Some(&FieldValue::Str("storage".to_string()))
        );
        assert_eq!(
            record.get("CommandName"),
            Some(&FieldValue::Str("UPSERT grain_state".to_string()))
        );
        assert_eq!(record.get("StartTime"), Some(&FieldValue::Timestamp(start)));
        assert_eq!(record.get("Duration"), Some(&FieldValue::Number(250.0)));
        assert_eq!(record.get("Success"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_track_request_field_set() {
        let (consumer, mut rx) = test_consumer();
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();

        consumer.track_request(
            "GetPlayerState",
            start,
            Duration::from_micros(1500),
            "200",
            true,
        );

        let (kind, record) = recv_one(&mut rx);
        assert_eq!(kind, EventKind::Request);
        assert_eq!(
            record.get("Request"),
            Some(&FieldValue::Str("GetPlayerState".to_string()))
        );
        assert_eq!(record.get("Duration"), Some(&FieldValue::Number(1.5)));
        assert_eq!(
            record.get("ResponseCode"),
            Some(&FieldValue::Str("200".to_string()))
        );
    }

    #[test]
    #[traced_test]
    fn test_colliding_property_drops_record_silently() {
        let (consumer, mut rx) = test_consumer();

        // A property reusing the metric key is a shaping error; the
        // record is dropped and the producer call still returns.
        consumer.track_metric_with_properties("queue.depth", 3.0, [("queue.depth", "oops")]);

        assert!(rx.try_recv().is_err());
        assert!(logs_contain("dropping malformed metric record"));
    }

    #[test]
    #[traced_test]
    fn test_reserved_field_collision_drops_record() {
        let (consumer, mut rx) = test_consumer();

        consumer.track_metric_with_properties("m", 1.0, [("UtcDateTime", "not-a-time")]);

        assert!(rx.try_recv().is_err());
        assert!(logs_contain("dropping malformed metric record"));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_swallowed() {
        let (consumer, rx) = test_consumer();
        drop(rx);

        // Must not panic or surface an error.
        consumer.track_metric("orphan", 1.0);
    }

    #[test]
    fn test_format_error_chain_single_error() {
        let error = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline elapsed");
        assert_eq!(format_error_chain(&error), "deadline elapsed");
    }
}
