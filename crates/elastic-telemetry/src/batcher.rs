// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Single-consumer batching service between producers and the bulk writer.
//!
//! The service owns the receive half of the telemetry channel and runs
//! one continuous loop: the first record after an idle period opens a
//! batch and arms the flush deadline, then the batch closes when either
//! the deadline passes or it reaches the maximum size. A closed batch is
//! routed and handed to the [`BulkWriter`]; with ordered dispatch the
//! loop awaits each request, otherwise requests are spawned and may
//! overlap. Empty batches are never emitted because a batch only exists
//! once a record has arrived.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error};

use crate::config::SinkConfig;
use crate::consumer::TelemetryConsumer;
use crate::dispatcher::{BatchEnvelope, BulkItem, BulkWriter};
use crate::record::{EventKind, TelemetryRecord};
use crate::router::IndexRouter;

/// The batching task. Construct with [`BatcherService::new`] and drive
/// it with `tokio::spawn(service.run())`.
pub struct BatcherService<W: BulkWriter + 'static> {
    rx: mpsc::UnboundedReceiver<(EventKind, TelemetryRecord)>,
    router: IndexRouter,
    flush_interval: Duration,
    max_batch_size: usize,
    ordered_dispatch: bool,
    writer: Arc<W>,
}

impl<W: BulkWriter + 'static> BatcherService<W> {
    /// Creates the service and the producer handle feeding it.
    #[must_use]
    pub fn new(config: SinkConfig, writer: W) -> (Self, TelemetryConsumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = BatcherService {
            rx,
            router: IndexRouter::new(&config),
            flush_interval: config.flush_interval,
            // A zero-sized batch can never close; clamp to one.
            max_batch_size: config.max_batch_size.max(1),
            ordered_dispatch: config.ordered_dispatch,
            writer: Arc::new(writer),
        };
        (service, TelemetryConsumer::new(tx))
    }

    /// Runs until every producer handle is dropped, then drains the
    /// channel and ships any partial batch before returning.
    pub async fn run(mut self) {
        while let Some(first) = self.rx.recv().await {
            let deadline = Instant::now() + self.flush_interval;
            let mut open = vec![first];
            let closed_channel = loop {
                if open.len() >= self.max_batch_size {
                    break false;
                }
                match timeout_at(deadline, self.rx.recv()).await {
                    Ok(Some(next)) => open.push(next),
                    Ok(None) => break true,
                    // Window elapsed; ship what accumulated.
                    Err(_) => break false,
                }
            };
            self.emit(open).await;
            if closed_channel {
                break;
            }
        }
        debug!("Telemetry channel closed, batcher stopping");
    }

    /// Routes a closed batch and hands it to the writer. Index targets
    /// are resolved against the clock at flush time, so date rotation
    /// follows the flush, not record creation.
    async fn emit(&self, batch: Vec<(EventKind, TelemetryRecord)>) {
        let now = Utc::now();
        let items: Vec<BulkItem> = batch
            .into_iter()
            .map(|(kind, record)| {
                let (index, doc_type) = self.router.resolve(kind, now);
                BulkItem {
                    index,
                    doc_type,
                    record,
                }
            })
            .collect();
        let envelope = BatchEnvelope::new(items);
        if self.ordered_dispatch {
            ship(Arc::clone(&self.writer), envelope).await;
        } else {
            tokio::spawn(ship(Arc::clone(&self.writer), envelope));
        }
    }
}

/// One delivery attempt. Failures are logged and the batch is dropped;
/// nothing is retried and nothing propagates to producers.
async fn ship<W: BulkWriter>(writer: Arc<W>, envelope: BatchEnvelope) {
    let count = envelope.len();
    match writer.write_bulk(envelope).await {
        Ok(summary) => {
            debug!(
                "Shipped batch of {} telemetry documents in {}ms",
                summary.items, summary.took_ms
            );
        }
        Err(e) => {
            error!("dropping batch of {} telemetry documents: {}", count, e);
        }
    }
}
