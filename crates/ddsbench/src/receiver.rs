// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batched polling receive loop with timeout and loss detection.
//!
//! ```text
//! Init -> Polling --(received == expected)--> Complete
//!            |
//!            +--(now - start > timeout)-----> Timeout
//! ```
//!
//! Throughput is computed over the reception window (first to last arrival),
//! so the wait for the first message is not part of the rate. A timeout is
//! a normal terminal state: partial counts and the loss percentage are the
//! main result for lossy presets.

use crate::config::ReceiverConfig;
use crate::error::Result;
use crate::payload;
use crate::qos::QosPreset;
use crate::report::{self, Throughput};
use crate::transport::{Endpoint, Transport};
use std::fmt;
use std::time::{Duration, Instant};

/// Terminal state of a receive run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Every expected message arrived.
    Complete,
    /// Deadline passed first; results are partial.
    Timeout,
}

/// First/last arrival, count and bytes; only ever grows during a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceptionWindow {
    first_arrival: Option<Instant>,
    last_arrival: Option<Instant>,
    received: u64,
    total_bytes: u64,
}

impl ReceptionWindow {
    /// Empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one data sample of `bytes` that arrived at `at`.
    pub fn record(&mut self, at: Instant, bytes: usize) {
        if self.first_arrival.is_none() {
            self.first_arrival = Some(at);
        }
        self.last_arrival = Some(at);
        self.received += 1;
        self.total_bytes += bytes as u64;
    }

    /// Data samples counted.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Payload bytes counted.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Arrival time of the first data sample.
    pub fn first_arrival(&self) -> Option<Instant> {
        self.first_arrival
    }

    /// Arrival time of the most recent data sample.
    pub fn last_arrival(&self) -> Option<Instant> {
        self.last_arrival
    }

    /// Time between first and last arrival (zero until two batches arrived).
    pub fn span(&self) -> Duration {
        match (self.first_arrival, self.last_arrival) {
            (Some(first), Some(last)) => last.saturating_duration_since(first),
            _ => Duration::ZERO,
        }
    }

    /// Rates over the window.
    ///
    /// The message rate counts the `received - 1` intervals between first
    /// and last arrival. At most one message gives zero rates; several
    /// messages in a zero-length window give [`report::Rate::Unbounded`].
    pub fn throughput(&self) -> Throughput {
        if self.received <= 1 {
            return Throughput::zero();
        }
        let span = self.span();
        if span.is_zero() {
            return Throughput::unbounded();
        }
        report::report(self.received - 1, self.total_bytes, span.as_secs_f64())
    }
}

/// Result of one receive run.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiverReport {
    /// QoS preset used.
    pub qos: QosPreset,
    /// How the run ended.
    pub outcome: ReceiveOutcome,
    /// Messages the run waited for.
    pub expected: u64,
    /// Final reception window.
    pub window: ReceptionWindow,
    /// Rates over the reception window.
    pub throughput: Throughput,
    /// Percentage of expected messages missing, `None` when nothing is missing.
    pub loss_percent: Option<f64>,
    /// Lifecycle notices skipped while polling.
    pub ignored: u64,
    /// Data samples failing the payload pattern check (only when verifying).
    pub corrupted: u64,
    /// Configured timeout.
    pub timeout: Duration,
}

impl fmt::Display for ReceiverReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outcome == ReceiveOutcome::Timeout {
            writeln!(
                f,
                "Timeout reached after {} seconds",
                self.timeout.as_secs_f64()
            )?;
        }
        writeln!(f, "--- Subscriber Results ---")?;
        writeln!(
            f,
            "Messages received: {}/{}",
            self.window.received(),
            self.expected
        )?;
        writeln!(f, "Total bytes received: {}", self.window.total_bytes())?;
        writeln!(
            f,
            "Elapsed time: {:.3} seconds",
            self.throughput.elapsed.as_secs_f64()
        )?;
        writeln!(f, "Throughput: {:.2} msg/s", self.throughput.message_rate)?;
        writeln!(f, "Throughput: {:.2} MB/s", self.throughput.byte_rate_mib)?;
        write!(f, "Throughput: {:.2} Mbps", self.throughput.bit_rate_mbps)?;
        if self.corrupted > 0 {
            write!(f, "\nCorrupted payloads: {}", self.corrupted)?;
        }
        if let Some(loss) = self.loss_percent {
            write!(f, "\nMessage loss: {:.1}%", loss)?;
        }
        Ok(())
    }
}

/// Receive loop bound to one endpoint.
pub struct Receiver<E: Endpoint> {
    endpoint: E,
    config: ReceiverConfig,
    verify_payload: bool,
}

impl<E: Endpoint> Receiver<E> {
    /// Wrap an already connected endpoint.
    pub fn new(endpoint: E, config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            endpoint,
            config,
            verify_payload: false,
        })
    }

    /// Check every payload against the `i mod 256` pattern and the
    /// expected size.
    pub fn verify_payload(mut self, enabled: bool) -> Self {
        self.verify_payload = enabled;
        self
    }

    /// Poll until every expected message arrived or the timeout passed.
    pub fn run(&mut self) -> Result<ReceiverReport> {
        let expected = self.config.expected_count;
        let mut window = ReceptionWindow::new();
        let mut ignored = 0u64;
        let mut corrupted = 0u64;
        let start_wait = Instant::now();

        let outcome = loop {
            if window.received() >= expected {
                break ReceiveOutcome::Complete;
            }
            if start_wait.elapsed() > self.config.timeout {
                log::warn!(
                    "[RX] Timeout reached after {:?} ({}/{} received)",
                    self.config.timeout,
                    window.received(),
                    expected
                );
                break ReceiveOutcome::Timeout;
            }

            let batch = self.endpoint.poll(self.config.max_batch)?;
            if batch.is_empty() {
                std::thread::sleep(self.config.poll_backoff);
                continue;
            }

            let now = Instant::now();
            for sample in &batch {
                let Some(data) = sample.payload() else {
                    ignored += 1;
                    continue;
                };
                if self.verify_payload
                    && (data.len() != self.config.expected_size || !payload::is_valid(data))
                {
                    corrupted += 1;
                }
                window.record(now, data.len());
                if self.config.progress_every > 0
                    && window.received() % self.config.progress_every == 0
                {
                    log::info!(
                        "[RX] Received {}/{} messages...",
                        window.received(),
                        expected
                    );
                }
            }
        };

        let throughput = window.throughput();
        Ok(ReceiverReport {
            qos: self.config.qos,
            outcome,
            expected,
            window,
            throughput,
            loss_percent: report::loss_rate(expected, window.received()),
            ignored,
            corrupted,
            timeout: self.config.timeout,
        })
    }

    /// Give the endpoint back.
    pub fn into_endpoint(self) -> E {
        self.endpoint
    }
}

/// Validate, connect and run a receiver on `transport`.
///
/// Configuration errors surface before `connect` is called.
pub fn run_receiver<T: Transport>(transport: &T, config: &ReceiverConfig) -> Result<ReceiverReport> {
    config.validate()?;
    let qos = config.qos.profile();
    let endpoint = transport.connect(config.domain_id, &config.topic, &qos)?;
    Receiver::new(endpoint, config.clone())?.run()
}
