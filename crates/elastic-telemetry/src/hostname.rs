// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Machine-name detection for record enrichment.

use std::env;
use tracing::warn;

/// Get the machine name stamped on every telemetry record.
///
/// Tries, in order: the `TELEMETRY_HOSTNAME` environment variable, the
/// standard `HOSTNAME` variable, the system hostname, and finally the
/// literal "unknown".
#[must_use]
pub fn machine_name() -> String {
    if let Ok(hostname) = env::var("TELEMETRY_HOSTNAME") {
        if !hostname.is_empty() {
            return hostname;
        }
    }

    if let Ok(hostname) = env::var("HOSTNAME") {
        if !hostname.is_empty() {
            return hostname;
        }
    }

    match nix::unistd::gethostname() {
        Ok(hostname_osstr) => {
            if let Some(hostname_str) = hostname_osstr.to_str() {
                if !hostname_str.is_empty() {
                    return hostname_str.to_string();
                }
            }
        }
        Err(e) => {
            warn!("Failed to get system hostname: {}", e);
        }
    }

    warn!("Could not determine hostname, using 'unknown'");
    "unknown".to_string()
}
