// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Throughput and loss arithmetic.
//!
//! Byte rates use binary units (MiB/s); the bit rate is `MiB/s * 8` in the
//! same base and is labelled Mbps in summaries.

use std::fmt;
use std::time::Duration;

/// Bytes per MiB.
pub const MIB: f64 = 1024.0 * 1024.0;

/// A rate value, or the sentinel for a zero-length measurement window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rate {
    /// Measured value.
    Finite(f64),
    /// More than one message arrived inside a window the clock could not resolve.
    Unbounded,
}

impl Rate {
    /// Zero rate (nothing measured).
    pub const ZERO: Rate = Rate::Finite(0.0);

    /// Numeric value; `Unbounded` maps to `f64::INFINITY`.
    pub fn value(&self) -> f64 {
        match self {
            Rate::Finite(v) => *v,
            Rate::Unbounded => f64::INFINITY,
        }
    }

    fn scale(self, factor: f64) -> Rate {
        match self {
            Rate::Finite(v) => Rate::Finite(v * factor),
            Rate::Unbounded => Rate::Unbounded,
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Finite(v) => fmt::Display::fmt(v, f),
            Rate::Unbounded => f.write_str("inf"),
        }
    }
}

/// Read-only throughput snapshot computed once at loop exit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Throughput {
    /// Measured span.
    pub elapsed: Duration,
    /// Messages per second.
    pub message_rate: Rate,
    /// MiB per second.
    pub byte_rate_mib: Rate,
    /// `byte_rate_mib * 8`.
    pub bit_rate_mbps: Rate,
}

impl Throughput {
    /// Degenerate result: nothing measurable.
    pub const fn zero() -> Self {
        Self {
            elapsed: Duration::ZERO,
            message_rate: Rate::ZERO,
            byte_rate_mib: Rate::ZERO,
            bit_rate_mbps: Rate::ZERO,
        }
    }

    /// Zero-length window that still contained several messages.
    pub const fn unbounded() -> Self {
        Self {
            elapsed: Duration::ZERO,
            message_rate: Rate::Unbounded,
            byte_rate_mib: Rate::Unbounded,
            bit_rate_mbps: Rate::Unbounded,
        }
    }
}

/// Turn counts, bytes and a span into rates.
///
/// `elapsed_secs <= 0` never divides: a single (or no) message reports
/// zero rates, several messages report [`Rate::Unbounded`].
pub fn report(count: u64, total_bytes: u64, elapsed_secs: f64) -> Throughput {
    if elapsed_secs.is_nan() || elapsed_secs <= 0.0 {
        return if count <= 1 {
            Throughput::zero()
        } else {
            Throughput::unbounded()
        };
    }

    let message_rate = Rate::Finite(count as f64 / elapsed_secs);
    let byte_rate_mib = Rate::Finite(total_bytes as f64 / elapsed_secs / MIB);
    Throughput {
        elapsed: Duration::try_from_secs_f64(elapsed_secs).unwrap_or(Duration::MAX),
        message_rate,
        byte_rate_mib,
        bit_rate_mbps: byte_rate_mib.scale(8.0),
    }
}

/// Loss percentage, `None` when every expected message arrived.
pub fn loss_rate(expected: u64, received: u64) -> Option<f64> {
    if expected == 0 || received >= expected {
        return None;
    }
    Some((expected - received) as f64 / expected as f64 * 100.0)
}
