// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Elasticsearch telemetry sink with windowed batching and bulk dispatch.
//!
//! Application and runtime components record typed telemetry events
//! (metrics, exceptions, dependency calls, inbound requests, generic
//! events) through a cloneable [`TelemetryConsumer`]. Recording never
//! blocks and never fails: each call shapes the event into an untyped
//! document, enriches it with a UTC timestamp and the machine name, and
//! enqueues it on an unbounded channel.
//!
//! A single [`BatcherService`] task drains the channel and groups
//! records into batches bounded by a wall-clock window and a maximum
//! batch size, whichever is reached first. Each batch is shipped as one
//! Elasticsearch `_bulk` request, with every event kind routed to its
//! own date-rotated index (`prefix-kind-2024-01-02-03`). Failed batches
//! are logged and dropped; no error ever reaches a producer.
//!
//! # Example
//!
//! ```rust,no_run
//! use elastic_telemetry::{BatcherService, ElasticBulkWriter, SinkConfig};
//!
//! # async fn run() {
//! let config = SinkConfig {
//!     elasticsearch_url: "http://localhost:9200".to_string(),
//!     ..Default::default()
//! };
//! let writer = ElasticBulkWriter::new(&config);
//! let (service, telemetry) = BatcherService::new(config, writer);
//! tokio::spawn(service.run());
//!
//! telemetry.increment_metric("requests.count");
//! telemetry.track_event("silo.started");
//! # }
//! ```
//!
//! # Delivery guarantees
//!
//! Telemetry is best-effort by design: one dispatch attempt per batch,
//! no retries, no backpressure to producers. A persistently slow or
//! unavailable backend grows the in-memory queue instead of stalling
//! callers. The periodic silo/client statistics publishers that write
//! single documents directly to the same backend are a separate,
//! unbatched producer path and are not part of this crate.

pub mod batcher;
pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod hostname;
pub mod record;
pub mod router;

pub use batcher::BatcherService;
pub use config::SinkConfig;
pub use consumer::TelemetryConsumer;
pub use dispatcher::{
    BatchEnvelope, BulkItem, BulkSummary, BulkWriter, ElasticBulkWriter, ShipError,
};
pub use record::{EventKind, FieldValue, ShapeError, TelemetryRecord};
pub use router::IndexRouter;
