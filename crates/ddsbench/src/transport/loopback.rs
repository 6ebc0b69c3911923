// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback transport.
//!
//! Every endpoint gets its own reader queue at `connect`, sized from its
//! history depth and registered on its (domain, topic). A `send` fans the
//! sample out to every other registered reader queue:
//!
//! - RELIABLE writers block while a reader queue is full, up to
//!   `max_blocking_time` per sample, then fail with [`Error::WriteTimeout`].
//! - BEST_EFFORT writers never block; a full KEEP_LAST reader queue evicts
//!   its oldest sample.
//!
//! Durability is VOLATILE: a reader only sees samples sent after it
//! connected, and a sample sent while no reader exists is gone. An endpoint
//! stops being a reader on its first `send` (or `unregister`), so writers
//! never buffer each other's traffic.

use super::{Endpoint, LifecycleKind, Sample, Transport};
use crate::config::validate_domain_id;
use crate::error::{Error, Result};
use crate::qos::{QosProfile, Reliability};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

type TopicKey = (u32, String);

/// Shared in-process bus. Clones refer to the same bus.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    readers: Arc<Mutex<HashMap<TopicKey, Vec<Arc<ReaderQueue>>>>>,
}

/// Bounded history of one reader.
struct ReaderQueue {
    state: Mutex<QueueState>,
    not_full: Condvar,
}

struct QueueState {
    samples: VecDeque<Sample>,
    depth: usize,
    closed: bool,
}

impl QueueState {
    fn is_full(&self) -> bool {
        self.samples.len() >= self.depth
    }
}

impl ReaderQueue {
    fn new(depth: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                samples: VecDeque::with_capacity(depth.min(16_384)),
                depth,
                closed: false,
            }),
            not_full: Condvar::new(),
        }
    }

    /// Drop pending samples and release writers blocked on this queue.
    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.samples.clear();
        drop(state);
        self.not_full.notify_all();
    }
}

impl LoopbackTransport {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn reader_queues(&self, key: &TopicKey) -> Vec<Arc<ReaderQueue>> {
        self.readers.lock().get(key).cloned().unwrap_or_default()
    }

    fn remove_reader(&self, key: &TopicKey, queue: &Arc<ReaderQueue>) {
        let mut readers = self.readers.lock();
        if let Some(list) = readers.get_mut(key) {
            list.retain(|q| !Arc::ptr_eq(q, queue));
            if list.is_empty() {
                readers.remove(key);
            }
        }
        drop(readers);
        queue.close();
    }
}

impl Transport for LoopbackTransport {
    type Endpoint = LoopbackEndpoint;

    fn connect(&self, domain_id: u32, topic: &str, qos: &QosProfile) -> Result<LoopbackEndpoint> {
        validate_domain_id(domain_id)?;
        let depth = qos.history.depth();
        if depth == 0 {
            return Err(Error::InvalidArgument(
                "History::KeepLast(n) requires n > 0".to_string(),
            ));
        }

        let key = (domain_id, topic.to_string());
        let queue = Arc::new(ReaderQueue::new(depth));
        let readers = {
            let mut map = self.readers.lock();
            let list = map.entry(key.clone()).or_default();
            list.push(Arc::clone(&queue));
            list.len()
        };

        log::debug!(
            "[LOOPBACK] connect domain={} topic={} reliability={:?} depth={} readers={}",
            domain_id,
            topic,
            qos.reliability,
            depth,
            readers
        );

        Ok(LoopbackEndpoint {
            bus: self.clone(),
            key,
            queue: Some(queue),
            reliability: qos.reliability,
            dropped: 0,
            unregistered: false,
        })
    }
}

/// Endpoint on a [`LoopbackTransport`] topic.
pub struct LoopbackEndpoint {
    bus: LoopbackTransport,
    key: TopicKey,
    /// Own reader queue, `None` once the endpoint has written.
    queue: Option<Arc<ReaderQueue>>,
    reliability: Reliability,
    dropped: u64,
    unregistered: bool,
}

impl LoopbackEndpoint {
    fn stop_reading(&mut self) {
        if let Some(queue) = self.queue.take() {
            self.bus.remove_reader(&self.key, &queue);
        }
    }

    fn deliver(&mut self, queue: &ReaderQueue, sample: Sample) -> Result<()> {
        let mut state = queue.state.lock();
        if state.closed {
            return Ok(());
        }

        if state.is_full() {
            match self.reliability {
                Reliability::Reliable { max_blocking_time } => {
                    let deadline = Instant::now() + max_blocking_time;
                    while state.is_full() && !state.closed {
                        if queue.not_full.wait_until(&mut state, deadline).timed_out()
                            && state.is_full()
                            && !state.closed
                        {
                            return Err(Error::WriteTimeout(max_blocking_time));
                        }
                    }
                    if state.closed {
                        return Ok(());
                    }
                }
                Reliability::BestEffort => {
                    state.samples.pop_front();
                    self.dropped += 1;
                    log::trace!(
                        "[LOOPBACK] topic={} reader history full, evicted oldest (dropped={})",
                        self.key.1,
                        self.dropped
                    );
                }
            }
        }

        state.samples.push_back(sample);
        Ok(())
    }
}

impl Endpoint for LoopbackEndpoint {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.unregistered {
            return Err(Error::Disconnected(self.key.1.clone()));
        }
        self.stop_reading();

        for queue in self.bus.reader_queues(&self.key) {
            self.deliver(&queue, Sample::Data(payload.to_vec()))?;
        }
        Ok(())
    }

    fn poll(&mut self, max_batch: usize) -> Result<Vec<Sample>> {
        let Some(queue) = self.queue.as_ref() else {
            return Ok(Vec::new());
        };
        let mut state = queue.state.lock();
        let take = max_batch.min(state.samples.len());
        if take == 0 {
            return Ok(Vec::new());
        }
        let batch: Vec<Sample> = state.samples.drain(..take).collect();
        drop(state);
        queue.not_full.notify_all();
        Ok(batch)
    }

    fn unregister(&mut self) -> Result<()> {
        if self.unregistered {
            return Ok(());
        }
        self.unregistered = true;
        self.stop_reading();

        // Lifecycle notices never block a shutting-down writer.
        for queue in self.bus.reader_queues(&self.key) {
            let mut state = queue.state.lock();
            if state.closed {
                continue;
            }
            if state.is_full() {
                log::debug!(
                    "[LOOPBACK] topic={} reader history full, unregister notice skipped",
                    self.key.1
                );
            } else {
                state
                    .samples
                    .push_back(Sample::Lifecycle(LifecycleKind::Unregistered));
            }
        }
        Ok(())
    }

    /// Samples evicted from full reader queues, summed over readers.
    fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Drop for LoopbackEndpoint {
    fn drop(&mut self) {
        self.stop_reading();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::{Durability, History, QosPreset};
    use std::time::Duration;

    fn qos(reliability: Reliability, depth: u32) -> QosProfile {
        QosProfile {
            reliability,
            history: History::KeepLast(depth),
            durability: Durability::Volatile,
        }
    }

    #[test]
    fn test_send_then_poll_in_order() {
        let bus = LoopbackTransport::new();
        let qos = QosPreset::Reliable.profile();
        let mut writer = bus.connect(0, "t", &qos).expect("connect writer");
        let mut reader = bus.connect(0, "t", &qos).expect("connect reader");

        for i in 0..5u8 {
            writer.send(&[i]).expect("send");
        }
        let batch = reader.poll(3).expect("poll");
        assert_eq!(
            batch,
            vec![Sample::Data(vec![0]), Sample::Data(vec![1]), Sample::Data(vec![2])]
        );
        assert_eq!(reader.poll(10).expect("poll").len(), 2);
        assert!(reader.poll(10).expect("poll").is_empty());
        assert!(writer.poll(10).expect("writer has no queue").is_empty());
    }

    #[test]
    fn test_every_reader_gets_every_sample() {
        let bus = LoopbackTransport::new();
        let qos = QosPreset::Reliable.profile();
        let mut reader_a = bus.connect(0, "t", &qos).expect("connect");
        let mut reader_b = bus.connect(0, "t", &qos).expect("connect");
        let mut writer = bus.connect(0, "t", &qos).expect("connect");

        for i in 0..10u8 {
            writer.send(&[i]).expect("send");
        }
        let a = reader_a.poll(100).expect("poll");
        let b = reader_b.poll(100).expect("poll");
        assert_eq!(a.len(), 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_late_reader_sees_no_history() {
        let bus = LoopbackTransport::new();
        let qos = QosPreset::Reliable.profile();
        let mut early = bus.connect(0, "t", &qos).expect("connect");
        let mut writer = bus.connect(0, "t", &qos).expect("connect");
        for i in 0..10u8 {
            writer.send(&[i]).expect("send");
        }

        let mut late = bus.connect(0, "t", &qos).expect("connect");
        assert!(late.poll(100).expect("poll").is_empty());
        writer.send(&[10]).expect("send");
        assert_eq!(late.poll(100).expect("poll"), vec![Sample::Data(vec![10])]);
        assert_eq!(early.poll(100).expect("poll").len(), 11);
    }

    #[test]
    fn test_send_without_readers_is_discarded() {
        let bus = LoopbackTransport::new();
        let qos = QosPreset::Reliable.profile();
        let mut writer = bus.connect(0, "t", &qos).expect("connect");
        for i in 0..20u8 {
            writer.send(&[i]).expect("never blocks without readers");
        }
        let mut reader = bus.connect(0, "t", &qos).expect("connect");
        assert!(reader.poll(100).expect("poll").is_empty());
    }

    #[test]
    fn test_topics_and_domains_are_isolated() {
        let bus = LoopbackTransport::new();
        let qos = QosPreset::BestEffort.profile();
        let mut a_reader = bus.connect(0, "a", &qos).expect("connect");
        let mut b = bus.connect(0, "b", &qos).expect("connect");
        let mut a1 = bus.connect(1, "a", &qos).expect("connect");
        let mut a = bus.connect(0, "a", &qos).expect("connect");

        a.send(b"x").expect("send");
        assert!(b.poll(10).expect("poll").is_empty());
        assert!(a1.poll(10).expect("poll").is_empty());
        assert_eq!(a_reader.poll(10).expect("poll").len(), 1);
    }

    #[test]
    fn test_best_effort_evicts_oldest_per_reader() {
        let bus = LoopbackTransport::new();
        let mut small = bus
            .connect(0, "t", &qos(Reliability::BestEffort, 3))
            .expect("connect");
        let mut large = bus
            .connect(0, "t", &qos(Reliability::BestEffort, 10))
            .expect("connect");
        let mut writer = bus
            .connect(0, "t", &qos(Reliability::BestEffort, 3))
            .expect("connect");

        for i in 0..5u8 {
            writer.send(&[i]).expect("best-effort send never fails");
        }
        assert_eq!(writer.dropped(), 2);
        assert_eq!(
            small.poll(10).expect("poll"),
            vec![Sample::Data(vec![2]), Sample::Data(vec![3]), Sample::Data(vec![4])]
        );
        assert_eq!(large.poll(10).expect("poll").len(), 5);
    }

    #[test]
    fn test_reliable_full_reader_times_out() {
        let bus = LoopbackTransport::new();
        let qos = qos(
            Reliability::Reliable {
                max_blocking_time: Duration::from_millis(20),
            },
            2,
        );
        let _reader = bus.connect(0, "t", &qos).expect("connect");
        let mut writer = bus.connect(0, "t", &qos).expect("connect");
        writer.send(b"1").expect("send");
        writer.send(b"2").expect("send");

        let start = Instant::now();
        let err = writer.send(b"3").unwrap_err();
        assert!(matches!(err, Error::WriteTimeout(_)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(writer.dropped(), 0);
    }

    #[test]
    fn test_reliable_writer_unblocks_when_reader_drains() {
        let bus = LoopbackTransport::new();
        let qos = qos(
            Reliability::Reliable {
                max_blocking_time: Duration::from_secs(5),
            },
            1,
        );
        let mut reader = bus.connect(0, "t", &qos).expect("connect");
        let mut writer = bus.connect(0, "t", &qos).expect("connect");
        writer.send(b"first").expect("send");

        let handle = std::thread::spawn(move || {
            writer.send(b"second").expect("blocked send completes");
        });
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(reader.poll(1).expect("poll").len(), 1);
        handle.join().expect("writer thread");
        assert_eq!(reader.poll(1).expect("poll"), vec![Sample::Data(b"second".to_vec())]);
    }

    #[test]
    fn test_dropped_reader_releases_blocked_writer() {
        let bus = LoopbackTransport::new();
        let qos = qos(
            Reliability::Reliable {
                max_blocking_time: Duration::from_secs(5),
            },
            1,
        );
        let reader = bus.connect(0, "t", &qos).expect("connect");
        let mut writer = bus.connect(0, "t", &qos).expect("connect");
        writer.send(b"first").expect("send");

        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            writer.send(b"second").expect("released send succeeds");
            start.elapsed()
        });
        std::thread::sleep(Duration::from_millis(20));
        drop(reader);
        let blocked = handle.join().expect("writer thread");
        assert!(blocked < Duration::from_secs(5));
    }

    #[test]
    fn test_unregister_emits_notice_and_closes_writer() {
        let bus = LoopbackTransport::new();
        let qos = QosPreset::Reliable.profile();
        let mut reader = bus.connect(0, "t", &qos).expect("connect");
        let mut writer = bus.connect(0, "t", &qos).expect("connect");

        writer.send(b"x").expect("send");
        writer.unregister().expect("unregister");
        writer.unregister().expect("idempotent");
        assert!(matches!(writer.send(b"y"), Err(Error::Disconnected(_))));

        let batch = reader.poll(10).expect("poll");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], Sample::Lifecycle(LifecycleKind::Unregistered));
    }

    #[test]
    fn test_connect_rejects_bad_domain() {
        let bus = LoopbackTransport::new();
        let err = bus
            .connect(233, "t", &QosPreset::Reliable.profile())
            .err()
            .expect("domain out of range");
        assert!(matches!(err, Error::InvalidDomainId(233)));
    }
}
