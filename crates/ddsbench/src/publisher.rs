// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rate-paced publish loop.
//!
//! ```text
//! Init -> Connecting (pre-roll) -> Sending (count x send + pace)
//!      -> Draining (reliable only) -> Done
//! ```
//!
//! Only the Sending phase is measured. Every send is one synchronous call;
//! a failure ends the run with that error and is never retried, since a
//! masked failure would corrupt the measurement.

use crate::config::PublisherConfig;
use crate::error::Result;
use crate::pacer::RatePacer;
use crate::payload;
use crate::qos::QosPreset;
use crate::report::{self, Throughput};
use crate::transport::{Endpoint, Transport};
use std::fmt;
use std::time::{Duration, Instant};

/// Publisher lifecycle phases, reported in debug logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublisherPhase {
    /// Building the payload.
    Init,
    /// Pre-roll wait for receivers to attach.
    Connecting,
    /// Measured send loop.
    Sending,
    /// Reliable grace period so the transport can flush.
    Draining,
    /// Results computed.
    Done,
}

/// Result of one publish run.
#[derive(Clone, Debug, PartialEq)]
pub struct PublisherReport {
    /// QoS preset used.
    pub qos: QosPreset,
    /// Messages sent.
    pub sent: u64,
    /// Payload size.
    pub size: usize,
    /// `sent * size`.
    pub total_bytes: u64,
    /// Sending phase span and derived rates.
    pub throughput: Throughput,
    /// Total corrective sleep applied by the pacer.
    pub pacing_sleep: Duration,
    /// Samples the transport dropped under its best-effort policy.
    pub dropped: u64,
}

impl fmt::Display for PublisherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Publisher Results ---")?;
        writeln!(
            f,
            "Elapsed time: {:.3} seconds",
            self.throughput.elapsed.as_secs_f64()
        )?;
        writeln!(f, "Messages sent: {}", self.sent)?;
        writeln!(f, "Throughput: {:.2} msg/s", self.throughput.message_rate)?;
        writeln!(f, "Throughput: {:.2} MB/s", self.throughput.byte_rate_mib)?;
        write!(f, "Throughput: {:.2} Mbps", self.throughput.bit_rate_mbps)?;
        if self.dropped > 0 {
            write!(f, "\nDropped by transport: {}", self.dropped)?;
        }
        Ok(())
    }
}

/// Publish loop bound to one endpoint.
pub struct Publisher<E: Endpoint> {
    endpoint: E,
    config: PublisherConfig,
    pacer: RatePacer,
    phase: PublisherPhase,
}

impl<E: Endpoint> Publisher<E> {
    /// Wrap an already connected endpoint.
    pub fn new(endpoint: E, config: PublisherConfig) -> Result<Self> {
        config.validate()?;
        let pacer = RatePacer::new(config.rate)?;
        Ok(Self {
            endpoint,
            config,
            pacer,
            phase: PublisherPhase::Init,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> PublisherPhase {
        self.phase
    }

    fn enter(&mut self, phase: PublisherPhase) {
        log::debug!("[PUB] {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Run all phases to completion.
    pub fn run(&mut self) -> Result<PublisherReport> {
        // Init: one payload instance reused for every send.
        let data = payload::generate(self.config.size);

        self.enter(PublisherPhase::Connecting);
        if !self.config.preroll.is_zero() {
            log::info!(
                "[PUB] Waiting {:.1}s for subscriber to connect...",
                self.config.preroll.as_secs_f64()
            );
            std::thread::sleep(self.config.preroll);
        }

        self.enter(PublisherPhase::Sending);
        match self.pacer.interval() {
            Some(interval) => log::info!(
                "[PUB] Target rate: {} msg/s ({:.2} MB/s), interval={:?}",
                self.config.rate,
                self.config.rate * self.config.size as f64 / report::MIB,
                interval
            ),
            None => log::info!("[PUB] Rate: unlimited"),
        }

        let start = Instant::now();
        let mut pacing_sleep = Duration::ZERO;
        for i in 0..self.config.count {
            self.endpoint.send(&data)?;
            pacing_sleep += self.pacer.pace(i, start);
        }
        let elapsed = start.elapsed();

        if self.config.qos.needs_drain() && !self.config.drain.is_zero() {
            self.enter(PublisherPhase::Draining);
            log::debug!(
                "[PUB] holding {:?} for reliable delivery",
                self.config.drain
            );
            std::thread::sleep(self.config.drain);
        }
        // The notice is not a data send; its failure leaves the measurement intact.
        if let Err(e) = self.endpoint.unregister() {
            log::warn!("[PUB] unregister notice failed: {}", e);
        }

        self.enter(PublisherPhase::Done);
        let total_bytes = self.config.count.saturating_mul(self.config.size as u64);
        Ok(PublisherReport {
            qos: self.config.qos,
            sent: self.config.count,
            size: self.config.size,
            total_bytes,
            throughput: report::report(self.config.count, total_bytes, elapsed.as_secs_f64()),
            pacing_sleep,
            dropped: self.endpoint.dropped(),
        })
    }

    /// Give the endpoint back (e.g. to inspect drop counters).
    pub fn into_endpoint(self) -> E {
        self.endpoint
    }
}

/// Validate, connect and run a publisher on `transport`.
///
/// Configuration errors surface before `connect` is called.
pub fn run_publisher<T: Transport>(transport: &T, config: &PublisherConfig) -> Result<PublisherReport> {
    config.validate()?;
    let qos = config.qos.profile();
    let endpoint = transport.connect(config.domain_id, &config.topic, &qos)?;
    Publisher::new(endpoint, config.clone())?.run()
}
