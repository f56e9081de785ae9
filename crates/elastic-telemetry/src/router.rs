// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Index routing: event kind + wall-clock time -> destination index.

use chrono::{DateTime, Utc};

use crate::config::SinkConfig;
use crate::record::EventKind;

/// Document type sent with every bulk item. A single constant across
/// all kinds, present for backend compatibility only.
pub const DOCUMENT_TYPE: &str = "doc";

/// Computes destination index names from an event kind and the current
/// UTC time.
///
/// Index names have the shape `prefix-kindtag-date`, where the date
/// suffix follows the configured chrono pattern (hourly by default).
/// Rotation is a function of the clock at flush time, not at record
/// creation time: records flushed after a boundary land in the later
/// index even if they were produced before it.
#[derive(Debug, Clone)]
pub struct IndexRouter {
    prefix: String,
    date_format: String,
}

impl IndexRouter {
    #[must_use]
    pub fn new(config: &SinkConfig) -> Self {
        IndexRouter {
            prefix: config.index_prefix.clone(),
            date_format: config.date_format.clone(),
        }
    }

    /// Resolves the `(index, document type)` target for one record.
    #[must_use]
    pub fn resolve(&self, kind: EventKind, now: DateTime<Utc>) -> (String, &'static str) {
        let index = format!(
            "{}-{}-{}",
            self.prefix,
            kind.kind_tag(),
            now.format(&self.date_format)
        );
        (index, DOCUMENT_TYPE)
    }
}
