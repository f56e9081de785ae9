// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bulk dispatch: NDJSON encoding and one-shot delivery to the backend.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::SinkConfig;
use crate::record::TelemetryRecord;

/// One document headed for the backend, with its routing target already
/// resolved.
#[derive(Debug, Clone)]
pub struct BulkItem {
    pub index: String,
    pub doc_type: &'static str,
    pub record: TelemetryRecord,
}

/// A flushed batch, ready for a single `_bulk` request.
#[derive(Debug, Clone, Default)]
pub struct BatchEnvelope {
    pub items: Vec<BulkItem>,
}

impl BatchEnvelope {
    #[must_use]
    pub fn new(items: Vec<BulkItem>) -> Self {
        BatchEnvelope { items }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Encodes the batch as bulk-API NDJSON: an action line followed by
    /// the document source for each item, newline-terminated.
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut body = String::new();
        for item in &self.items {
            let action = json!({
                "index": {
                    "_index": item.index,
                    "_type": item.doc_type,
                }
            });
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&item.record)?);
            body.push('\n');
        }
        Ok(body)
    }
}

/// Error produced while shipping a batch.
///
/// Every variant is terminal for the batch it describes; the caller logs
/// and drops.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    /// The request never produced an HTTP response.
    #[error("bulk request failed: {0}")]
    Transport(reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("bulk request rejected with status {status}: {body}")]
    Backend { status: u16, body: String },
    /// The batch could not be encoded as NDJSON.
    #[error("failed to encode bulk payload: {0}")]
    Payload(#[from] serde_json::Error),
    /// The backend accepted the request but reported per-item failures.
    #[error("bulk response reported {failed} of {total} items failed: {first_error}")]
    ItemFailures {
        failed: usize,
        total: usize,
        first_error: String,
    },
}

/// Outcome of a successful bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkSummary {
    pub items: usize,
    pub took_ms: u64,
}

/// Ships one batch to a telemetry backend.
///
/// Implementations must tolerate overlapping calls; when ordered
/// dispatch is disabled the batcher ships batches concurrently.
#[async_trait]
pub trait BulkWriter: Send + Sync {
    async fn write_bulk(&self, envelope: BatchEnvelope) -> Result<BulkSummary, ShipError>;
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkResponseItem>,
}

#[derive(Debug, Deserialize)]
struct BulkResponseItem {
    #[serde(default)]
    index: Option<BulkItemStatus>,
}

#[derive(Debug, Deserialize)]
struct BulkItemStatus {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// [`BulkWriter`] backed by the Elasticsearch `_bulk` endpoint.
///
/// The reqwest client is built lazily on first use and reused for the
/// lifetime of the writer.
pub struct ElasticBulkWriter {
    bulk_url: String,
    request_timeout: std::time::Duration,
    client: OnceCell<reqwest::Client>,
}

impl ElasticBulkWriter {
    #[must_use]
    pub fn new(config: &SinkConfig) -> Self {
        let base = config.elasticsearch_url.trim_end_matches('/');
        ElasticBulkWriter {
            bulk_url: format!("{base}/_bulk?refresh=false"),
            request_timeout: config.request_timeout,
            client: OnceCell::new(),
        }
    }

    async fn get_client(&self) -> Result<&reqwest::Client, ShipError> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(self.request_timeout)
                    .build()
                    .map_err(ShipError::Client)
            })
            .await
    }
}

#[async_trait]
impl BulkWriter for ElasticBulkWriter {
    async fn write_bulk(&self, envelope: BatchEnvelope) -> Result<BulkSummary, ShipError> {
        let total = envelope.len();
        let body = envelope.to_ndjson()?;
        let client = self.get_client().await?;

        let response = client
            .post(&self.bulk_url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(ShipError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShipError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BulkResponse = response.json().await.map_err(ShipError::Transport)?;
        if parsed.errors {
            let failures: Vec<&BulkItemStatus> = parsed
                .items
                .iter()
                .filter_map(|item| item.index.as_ref())
                .filter(|status| status.error.is_some())
                .collect();
            let first_error = failures
                .first()
                .and_then(|status| status.error.as_ref())
                .map(|error| format!("status {}: {}", failures[0].status, error))
                .unwrap_or_else(|| "unknown item error".to_string());
            return Err(ShipError::ItemFailures {
                failed: failures.len(),
                total,
                first_error,
            });
        }

        debug!("Bulk request indexed {} documents in {}ms", total, parsed.took);
        Ok(BulkSummary {
            items: total,
            took_ms: parsed.took,
        })
    }
}
