// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Benchmark configuration - constants, typed run configs and the YAML run file.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time defaults and RTPS port constants
//! - **Level 2 (Run file)**: optional [`BenchConfig`] loaded from YAML
//! - **Level 3 (Resolved)**: [`PublisherConfig`] / [`ReceiverConfig`] /
//!   [`TransportConfig`], validated before any transport resource exists
//!
//! No environment variable is consulted here; every transport setting is
//! carried by an explicit [`TransportConfig`].
//!
//! # Example YAML
//!
//! ```yaml
//! topic: benchmark/dds
//! domain: 0
//! qos: high-throughput
//! publisher:
//!   size: 4096
//!   count: 50000
//!   rate: 20000
//! receiver:
//!   timeout_secs: 10
//! transport:
//!   multicast_group: 239.255.0.1
//!   multicast_ttl: 1
//! ```

use crate::error::{Error, Result};
use crate::qos::QosPreset;
use std::net::Ipv4Addr;
use std::time::Duration;

// =======================================================================
// RTPS v2.5 port mapping (OMG DDS-RTPS Sec.9.6.1.1)
// =======================================================================

/// RTPS base port (PB).
pub const PORT_BASE: u16 = 7400;

/// Domain ID gain (DG).
pub const DOMAIN_ID_GAIN: u16 = 250;

/// User traffic multicast offset (d2).
pub const USER_MULTICAST_OFFSET: u16 = 1;

/// Maximum domain ID (valid range 0..=232).
pub const MAX_DOMAIN_ID: u32 = 232;

/// Default multicast group shared by all DDS participants.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

// =======================================================================
// Run defaults
// =======================================================================

/// Default topic name.
pub const DEFAULT_TOPIC: &str = "benchmark/dds";
/// Default payload size in bytes.
pub const DEFAULT_SIZE: usize = 1024;
/// Default message count.
pub const DEFAULT_COUNT: u64 = 1000;
/// Default receiver timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Wait before the first send so a receiver can attach.
pub const DEFAULT_PREROLL: Duration = Duration::from_secs(2);
/// Grace period after the last reliable send.
pub const DEFAULT_DRAIN: Duration = Duration::from_secs(1);
/// Samples taken per poll.
pub const DEFAULT_MAX_BATCH: usize = 1000;
/// Sleep after an empty poll.
pub const DEFAULT_POLL_BACKOFF: Duration = Duration::from_millis(1);
/// Received messages between progress lines.
pub const PROGRESS_EVERY: u64 = 100;

/// Reject domain IDs outside 0..=232.
pub fn validate_domain_id(domain_id: u32) -> Result<()> {
    if domain_id > MAX_DOMAIN_ID {
        return Err(Error::InvalidDomainId(domain_id));
    }
    Ok(())
}

/// Explicit transport settings handed to [`crate::transport::UdpTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Multicast group for user data.
    pub multicast_group: Ipv4Addr,
    /// Local interface for multicast join/send (`0.0.0.0` = kernel choice).
    pub interface: Ipv4Addr,
    /// RTPS port base.
    pub port_base: u16,
    /// RTPS domain gain.
    pub domain_gain: u16,
    /// Multicast TTL (1 = link-local).
    pub multicast_ttl: u32,
    /// Deliver our own multicast datagrams to local sockets.
    pub multicast_loop: bool,
    /// Set SO_REUSEPORT so several receivers on one host share the port.
    pub reuse_port: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            multicast_group: MULTICAST_GROUP,
            interface: Ipv4Addr::UNSPECIFIED,
            port_base: PORT_BASE,
            domain_gain: DOMAIN_ID_GAIN,
            multicast_ttl: 1,
            multicast_loop: true,
            reuse_port: false,
        }
    }
}

impl TransportConfig {
    /// User multicast port for a domain: `PB + DG * domain + d2`.
    pub fn user_multicast_port(&self, domain_id: u32) -> Result<u16> {
        validate_domain_id(domain_id)?;
        let domain = u16::try_from(domain_id).map_err(|_| Error::InvalidDomainId(domain_id))?;
        self.domain_gain
            .checked_mul(domain)
            .and_then(|offset| self.port_base.checked_add(offset))
            .and_then(|port| port.checked_add(USER_MULTICAST_OFFSET))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "port_base {} + {} * domain {} overflows the port range",
                    self.port_base, self.domain_gain, domain_id
                ))
            })
    }

    /// Check the settings before sockets are created.
    pub fn validate(&self) -> Result<()> {
        if !self.multicast_group.is_multicast() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a multicast address",
                self.multicast_group
            )));
        }
        if self.multicast_ttl == 0 || self.multicast_ttl > 255 {
            return Err(Error::InvalidArgument(format!(
                "multicast_ttl must be 1-255 (got {})",
                self.multicast_ttl
            )));
        }
        Ok(())
    }
}

/// Resolved publisher run parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct PublisherConfig {
    /// DDS domain ID.
    pub domain_id: u32,
    /// Topic name.
    pub topic: String,
    /// QoS preset.
    pub qos: QosPreset,
    /// Payload size in bytes.
    pub size: usize,
    /// Number of messages to send.
    pub count: u64,
    /// Target rate in msg/s (0 = unlimited).
    pub rate: f64,
    /// Wait before the first send, excluded from the measurement.
    pub preroll: Duration,
    /// Hold-open after the last send when reliable, excluded from the measurement.
    pub drain: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            domain_id: 0,
            topic: DEFAULT_TOPIC.to_string(),
            qos: QosPreset::Reliable,
            size: DEFAULT_SIZE,
            count: DEFAULT_COUNT,
            rate: 0.0,
            preroll: DEFAULT_PREROLL,
            drain: DEFAULT_DRAIN,
        }
    }
}

impl PublisherConfig {
    /// Validate numeric ranges.
    pub fn validate(&self) -> Result<()> {
        validate_domain_id(self.domain_id)?;
        validate_topic(&self.topic)?;
        if self.count == 0 {
            return Err(Error::InvalidArgument("count must be > 0".to_string()));
        }
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "rate must be a finite value >= 0 (got {})",
                self.rate
            )));
        }
        Ok(())
    }
}

/// Resolved receiver run parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiverConfig {
    /// DDS domain ID.
    pub domain_id: u32,
    /// Topic name.
    pub topic: String,
    /// QoS preset.
    pub qos: QosPreset,
    /// Expected payload size, checked when payload verification is on.
    pub expected_size: usize,
    /// Messages to wait for.
    pub expected_count: u64,
    /// Give up after this long, measured from the start of polling.
    pub timeout: Duration,
    /// Samples taken per poll.
    pub max_batch: usize,
    /// Sleep after an empty poll.
    pub poll_backoff: Duration,
    /// Received messages between progress lines.
    pub progress_every: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            domain_id: 0,
            topic: DEFAULT_TOPIC.to_string(),
            qos: QosPreset::Reliable,
            expected_size: DEFAULT_SIZE,
            expected_count: DEFAULT_COUNT,
            timeout: DEFAULT_TIMEOUT,
            max_batch: DEFAULT_MAX_BATCH,
            poll_backoff: DEFAULT_POLL_BACKOFF,
            progress_every: PROGRESS_EVERY,
        }
    }
}

impl ReceiverConfig {
    /// Validate numeric ranges.
    pub fn validate(&self) -> Result<()> {
        validate_domain_id(self.domain_id)?;
        validate_topic(&self.topic)?;
        if self.expected_count == 0 {
            return Err(Error::InvalidArgument("count must be > 0".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidArgument("timeout must be > 0".to_string()));
        }
        if self.max_batch == 0 {
            return Err(Error::InvalidArgument("max_batch must be > 0".to_string()));
        }
        Ok(())
    }
}

fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(Error::InvalidArgument("topic name must not be empty".to_string()));
    }
    Ok(())
}

/// Convert a seconds value from the command line or run file.
pub fn duration_from_secs(secs: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::InvalidArgument(format!("{} must be >= 0 seconds (got {})", what, secs)))
}

// =======================================================================
// YAML run file
// =======================================================================

/// Optional run file. Every field may be omitted; command-line flags are
/// merged on top before resolving.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, deny_unknown_fields))]
pub struct BenchConfig {
    /// Topic name.
    pub topic: Option<String>,
    /// DDS domain ID.
    pub domain: Option<u32>,
    /// QoS preset name.
    pub qos: Option<String>,
    /// Publisher section.
    pub publisher: PublisherSection,
    /// Receiver section.
    pub receiver: ReceiverSection,
    /// Transport section.
    pub transport: TransportSection,
}

/// `publisher:` section of the run file.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, deny_unknown_fields))]
pub struct PublisherSection {
    /// Payload size in bytes.
    pub size: Option<usize>,
    /// Messages to send.
    pub count: Option<u64>,
    /// Target rate in msg/s.
    pub rate: Option<f64>,
    /// Pre-roll wait in milliseconds.
    pub preroll_ms: Option<u64>,
    /// Reliable drain in milliseconds.
    pub drain_ms: Option<u64>,
}

/// `receiver:` section of the run file.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, deny_unknown_fields))]
pub struct ReceiverSection {
    /// Expected payload size.
    pub size: Option<usize>,
    /// Expected message count.
    pub count: Option<u64>,
    /// Timeout in seconds.
    pub timeout_secs: Option<f64>,
    /// Samples per poll.
    pub max_batch: Option<usize>,
    /// Back-off after an empty poll, in milliseconds.
    pub poll_backoff_ms: Option<u64>,
}

/// `transport:` section of the run file.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, deny_unknown_fields))]
pub struct TransportSection {
    /// Multicast group.
    pub multicast_group: Option<Ipv4Addr>,
    /// Local interface.
    pub interface: Option<Ipv4Addr>,
    /// RTPS port base.
    pub port_base: Option<u16>,
    /// Multicast TTL.
    pub multicast_ttl: Option<u32>,
    /// Multicast loopback.
    pub multicast_loop: Option<bool>,
    /// SO_REUSEPORT.
    pub reuse_port: Option<bool>,
}

impl BenchConfig {
    /// Parse a run file from a YAML string.
    #[cfg(feature = "config-file")]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Parse a run file from disk.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&content)?;
        log::debug!("[CONFIG] loaded run file {}", path.display());
        Ok(config)
    }

    fn preset(&self) -> Result<QosPreset> {
        self.qos
            .as_deref()
            .map_or(Ok(QosPreset::Reliable), str::parse)
    }

    /// Resolve and validate the publisher parameters.
    pub fn publisher_config(&self) -> Result<PublisherConfig> {
        let defaults = PublisherConfig::default();
        let section = &self.publisher;
        let config = PublisherConfig {
            domain_id: self.domain.unwrap_or(defaults.domain_id),
            topic: self.topic.clone().unwrap_or(defaults.topic),
            qos: self.preset()?,
            size: section.size.unwrap_or(defaults.size),
            count: section.count.unwrap_or(defaults.count),
            rate: section.rate.unwrap_or(defaults.rate),
            preroll: section
                .preroll_ms
                .map_or(defaults.preroll, Duration::from_millis),
            drain: section.drain_ms.map_or(defaults.drain, Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve and validate the receiver parameters.
    pub fn receiver_config(&self) -> Result<ReceiverConfig> {
        let defaults = ReceiverConfig::default();
        let section = &self.receiver;
        let timeout = match section.timeout_secs {
            Some(secs) => duration_from_secs(secs, "timeout")?,
            None => defaults.timeout,
        };
        let config = ReceiverConfig {
            domain_id: self.domain.unwrap_or(defaults.domain_id),
            topic: self.topic.clone().unwrap_or(defaults.topic),
            qos: self.preset()?,
            expected_size: section.size.unwrap_or(defaults.expected_size),
            expected_count: section.count.unwrap_or(defaults.expected_count),
            timeout,
            max_batch: section.max_batch.unwrap_or(defaults.max_batch),
            poll_backoff: section
                .poll_backoff_ms
                .map_or(defaults.poll_backoff, Duration::from_millis),
            progress_every: defaults.progress_every,
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve and validate the transport settings.
    pub fn transport_config(&self) -> Result<TransportConfig> {
        let defaults = TransportConfig::default();
        let section = &self.transport;
        let config = TransportConfig {
            multicast_group: section.multicast_group.unwrap_or(defaults.multicast_group),
            interface: section.interface.unwrap_or(defaults.interface),
            port_base: section.port_base.unwrap_or(defaults.port_base),
            domain_gain: defaults.domain_gain,
            multicast_ttl: section.multicast_ttl.unwrap_or(defaults.multicast_ttl),
            multicast_loop: section.multicast_loop.unwrap_or(defaults.multicast_loop),
            reuse_port: section.reuse_port.unwrap_or(defaults.reuse_port),
        };
        config.validate()?;
        Ok(config)
    }
}
