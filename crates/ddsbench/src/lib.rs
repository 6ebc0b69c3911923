// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ddsbench - publish/subscribe throughput benchmark
//!
//! One side sends deterministic payloads at a controlled rate, the other
//! polls them in batches, detects loss and timeout, and reports throughput.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ddsbench::{run_publisher, LoopbackTransport, PublisherConfig, Receiver, ReceiverConfig, Transport};
//! use std::time::Duration;
//!
//! # fn main() -> ddsbench::Result<()> {
//! let bus = LoopbackTransport::new();
//! let publisher = PublisherConfig { preroll: Duration::ZERO, ..PublisherConfig::default() };
//! let receiver = ReceiverConfig::default();
//!
//! // Volatile: the reader must exist before the first send.
//! let reader = bus.connect(receiver.domain_id, &receiver.topic, &receiver.qos.profile())?;
//! let sent = run_publisher(&bus, &publisher)?;
//! let received = Receiver::new(reader, receiver)?.run()?;
//! println!("{}\n\n{}", sent, received);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +----------------+   +-----------+                 +---------------+   +----------+
//! | payload        |-->| Publisher |--> Transport -->| Receiver      |-->| report   |
//! | (i mod 256)    |   | + pacer   |   (loopback,    | (batched poll,|   | (msg/s,  |
//! +----------------+   +-----------+    udp)         |  timeout)     |   |  MiB/s)  |
//!                                                    +---------------+   +----------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`qos`] - shared preset table (`reliable`, `high-throughput`, `best-effort`)
//! - [`pacer`] - absolute-schedule rate pacing
//! - [`publisher`] / [`receiver`] - the two benchmark loops
//! - [`report`] - throughput and loss arithmetic
//! - [`transport`] - `connect` / `send` / `poll` capability traits and transports
//! - [`config`] - defaults, typed run configs, YAML run file

/// Defaults, typed run configs and the YAML run file.
pub mod config;
/// Crate error type.
pub mod error;
/// Absolute-schedule rate pacer.
pub mod pacer;
/// Deterministic payload generator.
pub mod payload;
/// Rate-paced publish loop.
pub mod publisher;
/// QoS preset table.
pub mod qos;
/// Batched polling receive loop.
pub mod receiver;
/// Throughput and loss computation.
pub mod report;
/// Transport capability interface and implementations.
pub mod transport;

pub use config::{BenchConfig, PublisherConfig, ReceiverConfig, TransportConfig};
pub use error::{Error, Result};
pub use pacer::RatePacer;
pub use publisher::{run_publisher, Publisher, PublisherPhase, PublisherReport};
pub use qos::{QosPreset, QosProfile};
pub use receiver::{run_receiver, ReceiveOutcome, Receiver, ReceiverReport, ReceptionWindow};
pub use report::{Rate, Throughput};
pub use transport::{
    Endpoint, LifecycleKind, LoopbackTransport, Sample, Transport, UdpTransport,
};
