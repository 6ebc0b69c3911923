// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS presets shared by the publisher and the receiver.
//!
//! A single lookup table maps the preset name to a [`QosProfile`], so both
//! sides of a run always agree on reliability, history depth and durability.
//!
//! | Preset            | Reliability | History         | Durability |
//! |-------------------|-------------|-----------------|------------|
//! | `reliable`        | RELIABLE    | KEEP_LAST 10000 | VOLATILE   |
//! | `high-throughput` | BEST_EFFORT | KEEP_LAST 1000  | VOLATILE   |
//! | `best-effort`     | BEST_EFFORT | KEEP_LAST 100   | VOLATILE   |

use crate::error::Error;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Bounded blocking time for reliable writers when history is full.
pub const RELIABLE_MAX_BLOCKING_TIME: Duration = Duration::from_secs(1);

/// Reliability policy
///
/// Determines delivery guarantees for samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reliability {
    /// Fire-and-forget. The writer never blocks; samples may be dropped.
    BestEffort,
    /// Delivery is guaranteed; the writer blocks up to `max_blocking_time`
    /// instead of dropping when history is full.
    Reliable {
        /// Upper bound on a single blocked write.
        max_blocking_time: Duration,
    },
}

impl Reliability {
    /// True if the writer must block rather than drop.
    pub fn is_reliable(&self) -> bool {
        matches!(self, Reliability::Reliable { .. })
    }
}

/// History policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum History {
    /// Keep last N samples (bounded queue, drops oldest for best-effort).
    KeepLast(u32),
}

impl History {
    /// Queue depth in samples.
    pub fn depth(&self) -> usize {
        match self {
            History::KeepLast(n) => *n as usize,
        }
    }
}

/// Durability policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Durability {
    /// Samples are not kept for late joiners.
    Volatile,
}

/// Immutable tuple of transport delivery parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QosProfile {
    /// Reliability policy
    pub reliability: Reliability,
    /// History policy
    pub history: History,
    /// Durability policy
    pub durability: Durability,
}

/// Named QoS preset selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QosPreset {
    /// Guaranteed delivery, generously oversized history.
    Reliable,
    /// Best-effort with a larger buffer to reduce drops under burst.
    HighThroughput,
    /// Best-effort with a small buffer; loss baseline.
    BestEffort,
}

impl QosPreset {
    /// All presets, in table order.
    pub const ALL: [QosPreset; 3] = [
        QosPreset::Reliable,
        QosPreset::HighThroughput,
        QosPreset::BestEffort,
    ];

    /// Resolve a preset name into its profile.
    pub fn select(name: &str) -> Result<QosProfile, Error> {
        name.parse::<QosPreset>().map(|p| p.profile())
    }

    /// Transport parameters for this preset.
    pub fn profile(self) -> QosProfile {
        match self {
            QosPreset::Reliable => QosProfile {
                reliability: Reliability::Reliable {
                    max_blocking_time: RELIABLE_MAX_BLOCKING_TIME,
                },
                history: History::KeepLast(10_000),
                durability: Durability::Volatile,
            },
            QosPreset::HighThroughput => QosProfile {
                reliability: Reliability::BestEffort,
                history: History::KeepLast(1_000),
                durability: Durability::Volatile,
            },
            QosPreset::BestEffort => QosProfile {
                reliability: Reliability::BestEffort,
                history: History::KeepLast(100),
                durability: Durability::Volatile,
            },
        }
    }

    /// Canonical name (`reliable`, `high-throughput`, `best-effort`).
    pub fn name(self) -> &'static str {
        match self {
            QosPreset::Reliable => "reliable",
            QosPreset::HighThroughput => "high-throughput",
            QosPreset::BestEffort => "best-effort",
        }
    }

    /// One-line banner printed at startup.
    pub fn banner(self) -> &'static str {
        match self {
            QosPreset::Reliable => "Using RELIABLE QoS (guaranteed delivery, large history)",
            QosPreset::HighThroughput => "Using HIGH-THROUGHPUT QoS (best-effort, larger buffer)",
            QosPreset::BestEffort => "Using BEST-EFFORT QoS (no guarantees, moderate buffering)",
        }
    }

    /// True when the publisher must hold open after the last send.
    pub fn needs_drain(self) -> bool {
        self.profile().reliability.is_reliable()
    }
}

impl FromStr for QosPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QosPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| Error::UnknownQosPreset(s.to_string()))
    }
}

impl fmt::Display for QosPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
