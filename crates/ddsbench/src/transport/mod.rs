// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport capability interface used by the benchmark loops.
//!
//! The loops only need three operations: `connect`, `send` and a
//! non-blocking batched `poll`. Delivery guarantees, buffering and discovery
//! belong to the transport behind these traits.
//!
//! # Implementations
//!
//! | Transport              | Scope          | Use case                        |
//! |------------------------|----------------|---------------------------------|
//! | [`LoopbackTransport`]  | Intra-process  | Tests, benches, `loopback` mode |
//! | [`UdpTransport`]       | Inter-process  | `pub` / `sub` across hosts      |

use crate::error::Result;
use crate::qos::QosProfile;

/// Datagram framing for the UDP transport.
pub mod frame;
/// In-process bus with QoS-aware bounded queues.
pub mod loopback;
/// UDP multicast transport.
pub mod udp;

pub use loopback::{LoopbackEndpoint, LoopbackTransport};
pub use udp::{UdpEndpoint, UdpTransport};

/// Instance lifecycle notices a transport may interleave with data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleKind {
    /// Writer disposed the instance.
    Disposed,
    /// Writer unregistered the instance (typically on shutdown).
    Unregistered,
}

/// One item returned by [`Endpoint::poll`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sample {
    /// Genuine data sample carrying a payload.
    Data(Vec<u8>),
    /// Protocol-level notice without payload data.
    Lifecycle(LifecycleKind),
}

impl Sample {
    /// Payload bytes of a data sample; `None` for lifecycle notices, which
    /// must not be counted.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Sample::Data(payload) => Some(payload),
            Sample::Lifecycle(_) => None,
        }
    }
}

/// Factory for endpoints bound to a (domain, topic, QoS) triple.
pub trait Transport {
    /// Endpoint type produced by [`Transport::connect`].
    type Endpoint: Endpoint;

    /// Attach to `topic` in `domain_id` with the given QoS.
    fn connect(&self, domain_id: u32, topic: &str, qos: &QosProfile) -> Result<Self::Endpoint>;
}

/// Exclusive handle owned by one benchmark loop.
pub trait Endpoint {
    /// Publish one payload. A single synchronous attempt, never retried.
    fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Take up to `max_batch` pending samples without blocking.
    ///
    /// Returns an empty vector when nothing is pending.
    fn poll(&mut self, max_batch: usize) -> Result<Vec<Sample>>;

    /// Announce that this writer is leaving the topic.
    fn unregister(&mut self) -> Result<()> {
        Ok(())
    }

    /// Samples this endpoint dropped under its best-effort policy.
    fn dropped(&self) -> u64 {
        0
    }
}

impl<E: Endpoint + ?Sized> Endpoint for Box<E> {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        (**self).send(payload)
    }

    fn poll(&mut self, max_batch: usize) -> Result<Vec<Sample>> {
        (**self).poll(max_batch)
    }

    fn unregister(&mut self) -> Result<()> {
        (**self).unregister()
    }

    fn dropped(&self) -> u64 {
        (**self).dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_classification() {
        let data = Sample::Data(vec![1, 2, 3]);
        let notice = Sample::Lifecycle(LifecycleKind::Unregistered);
        assert_eq!(data.payload(), Some(&[1u8, 2, 3][..]));
        assert_eq!(notice.payload(), None);
    }
}
