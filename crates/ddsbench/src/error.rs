// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by the benchmark loops, transports and configuration.
//!
//! A reception timeout is deliberately absent: it is a reportable outcome
//! ([`crate::receiver::ReceiveOutcome::Timeout`]), not a failure.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by ddsbench operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Configuration Errors (fatal, raised before any transport resource exists)
    // ========================================================================
    /// QoS preset name is not one of `reliable`, `high-throughput`, `best-effort`.
    #[error("Unknown QoS preset: {0} (expected reliable, high-throughput or best-effort)")]
    UnknownQosPreset(String),
    /// Numeric or textual argument out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Domain ID out of range (0-232).
    #[error("Invalid domain_id: {0} (must be 0-232)")]
    InvalidDomainId(u32),
    /// Configuration file could not be read.
    #[error("Config file {path}: {source}")]
    ConfigFile {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    // ========================================================================
    // Transport Errors (fatal, never retried)
    // ========================================================================
    /// I/O error with underlying cause.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Failed to bind socket to address.
    #[error("Bind failed: {0}")]
    BindFailed(String),
    /// Failed to join multicast group.
    #[error("Multicast join failed: {0}")]
    MulticastJoinFailed(String),
    /// Send operation failed.
    #[error("Send failed: {0}")]
    SendFailed(String),
    /// Reliable send stayed blocked past `max_blocking_time`.
    #[error("Write timeout after {0:?} (reliable history full)")]
    WriteTimeout(std::time::Duration),
    /// Payload does not fit in a single transport frame.
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Requested payload size.
        size: usize,
        /// Largest payload the transport accepts.
        max: usize,
    },

    // ========================================================================
    // State Errors
    // ========================================================================
    /// Endpoint was used after being closed.
    #[error("Endpoint disconnected from topic {0}")]
    Disconnected(String),
}

impl Error {
    /// True for errors raised while validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::UnknownQosPreset(_)
                | Error::InvalidArgument(_)
                | Error::InvalidDomainId(_)
                | Error::ConfigFile { .. }
                | Error::ConfigParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_classified() {
        assert!(Error::UnknownQosPreset("fast".into()).is_config());
        assert!(Error::InvalidDomainId(300).is_config());
        assert!(!Error::SendFailed("boom".into()).is_config());
        assert!(!Error::WriteTimeout(std::time::Duration::from_secs(1)).is_config());
    }

    #[test]
    fn test_display_mentions_preset_name() {
        let msg = Error::UnknownQosPreset("turbo".into()).to_string();
        assert!(msg.contains("turbo"));
    }
}
