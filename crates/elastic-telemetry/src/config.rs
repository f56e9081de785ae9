// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sink configuration, immutable after construction.

use std::time::Duration;

/// Default index-name prefix.
pub const DEFAULT_INDEX_PREFIX: &str = "orleans-telemetry";

/// Default date pattern appended to index names (hourly rotation).
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d-%H";

/// Default wall-clock window during which an open batch accumulates.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Default maximum number of records per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Default timeout for one bulk request against the backend.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the telemetry sink.
///
/// Built once when the sink is constructed and treated as immutable
/// afterwards. A batch is flushed when either `flush_interval` has
/// elapsed since its first record or it holds `max_batch_size` records,
/// whichever comes first.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Base address of the Elasticsearch backend (e.g. "http://localhost:9200").
    pub elasticsearch_url: String,
    /// Prefix for every index name this sink writes to.
    pub index_prefix: String,
    /// chrono strftime pattern for the date suffix of index names.
    pub date_format: String,
    /// Wall-clock window for an open batch, measured from its first record.
    pub flush_interval: Duration,
    /// Maximum number of records per batch.
    pub max_batch_size: usize,
    /// Timeout for a single bulk request.
    pub request_timeout: Duration,
    /// When true, at most one bulk request is in flight at a time and
    /// batches reach the backend in emission order. When false (the
    /// default), dispatches overlap and may complete out of order.
    pub ordered_dispatch: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            elasticsearch_url: "http://localhost:9200".to_string(),
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ordered_dispatch: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SinkConfig::default();

        assert_eq!(config.elasticsearch_url, "http://localhost:9200");
        assert_eq!(config.index_prefix, "orleans-telemetry");
        assert_eq!(config.date_format, "%Y-%m-%d-%H");
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(!config.ordered_dispatch);
    }

    #[test]
    fn test_config_override() {
        let config = SinkConfig {
            index_prefix: "acme".to_string(),
            max_batch_size: 500,
            ordered_dispatch: true,
            ..Default::default()
        };

        assert_eq!(config.index_prefix, "acme");
        assert_eq!(config.max_batch_size, 500);
        assert!(config.ordered_dispatch);
        // Untouched fields keep their defaults
        assert_eq!(config.date_format, DEFAULT_DATE_FORMAT);
    }
}
