// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Absolute-schedule rate pacer.
//!
//! Message `i` (0-based) is due at `(i + 1) * interval` after the start
//! instant. Each decision is re-derived from that schedule rather than from
//! accumulated sleeps, so one slow send never shifts the sends after it.
//! A late send gets a zero wait; the pacer never bursts to catch up.
//!
//! ```text
//!   start      expected(0)   expected(1)   expected(2)
//!     |-----------|-------------|-------------|----->
//!     |<interval->|<--interval->|<--interval->|
//! ```

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// Computes the corrective sleep before each send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatePacer {
    /// `None` in unlimited-rate mode.
    interval: Option<Duration>,
}

impl RatePacer {
    /// Pacer for `rate` messages per second. `0` means unlimited.
    pub fn new(rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "rate must be a finite value >= 0 (got {})",
                rate
            )));
        }
        if rate == 0.0 {
            return Ok(Self::unlimited());
        }
        let interval = Duration::try_from_secs_f64(1.0 / rate).map_err(|_| {
            Error::InvalidArgument(format!("rate {} msg/s is too slow to schedule", rate))
        })?;
        Ok(Self {
            interval: Some(interval),
        })
    }

    /// Pacer that never waits.
    pub const fn unlimited() -> Self {
        Self { interval: None }
    }

    /// Spacing between scheduled sends, `None` when unlimited.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Target send offset for message `index`, relative to the start instant.
    pub fn expected(&self, index: u64) -> Option<Duration> {
        self.interval.map(|interval| {
            let nanos = interval
                .as_nanos()
                .saturating_mul(u128::from(index) + 1);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        })
    }

    /// How long to wait after send `index` given `elapsed` since start.
    ///
    /// Zero when unlimited or when the send is already late.
    pub fn sleep_for(&self, index: u64, elapsed: Duration) -> Duration {
        self.expected(index)
            .map_or(Duration::ZERO, |expected| expected.saturating_sub(elapsed))
    }

    /// Sleep until message `index + 1` is due. Returns the time slept.
    pub fn pace(&self, index: u64, start: Instant) -> Duration {
        let wait = self.sleep_for(index, start.elapsed());
        if !wait.is_zero() {
            spin_sleep::sleep(wait);
        }
        wait
    }
}
