// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end publisher -> loopback transport -> receiver runs.

use ddsbench::transport::LoopbackEndpoint;
use ddsbench::{
    run_publisher, run_receiver, LoopbackTransport, PublisherConfig, QosPreset, ReceiveOutcome,
    Receiver, ReceiverConfig, ReceiverReport, Transport,
};
use std::thread;
use std::time::Duration;

fn publisher_config(qos: QosPreset, size: usize, count: u64, rate: f64) -> PublisherConfig {
    PublisherConfig {
        topic: "e2e/throughput".to_string(),
        qos,
        size,
        count,
        rate,
        preroll: Duration::ZERO,
        drain: Duration::ZERO,
        ..PublisherConfig::default()
    }
}

fn receiver_config(qos: QosPreset, size: usize, count: u64, timeout: Duration) -> ReceiverConfig {
    ReceiverConfig {
        topic: "e2e/throughput".to_string(),
        qos,
        expected_size: size,
        expected_count: count,
        timeout,
        ..ReceiverConfig::default()
    }
}

/// Connect a reader before anything is published (volatile durability).
fn attach(bus: &LoopbackTransport, config: &ReceiverConfig) -> LoopbackEndpoint {
    bus.connect(config.domain_id, &config.topic, &config.qos.profile())
        .expect("connect reader")
}

fn receive(endpoint: LoopbackEndpoint, config: &ReceiverConfig) -> ReceiverReport {
    Receiver::new(endpoint, config.clone())
        .expect("receiver")
        .run()
        .expect("receive run")
}

#[test]
fn test_reliable_unlimited_rate_delivers_everything() {
    let bus = LoopbackTransport::new();
    let rx_cfg = receiver_config(QosPreset::Reliable, 1024, 1000, Duration::from_secs(30));
    let reader = attach(&bus, &rx_cfg);

    let sent = run_publisher(&bus, &publisher_config(QosPreset::Reliable, 1024, 1000, 0.0))
        .expect("publish run");
    assert_eq!(sent.sent, 1000);
    assert_eq!(sent.pacing_sleep, Duration::ZERO);

    let received = receive(reader, &rx_cfg);
    assert_eq!(received.outcome, ReceiveOutcome::Complete);
    assert_eq!(received.window.received(), 1000);
    assert_eq!(received.window.total_bytes(), 1_024_000);
    assert_eq!(received.loss_percent, None);
}

#[test]
fn test_two_receivers_each_get_every_message() {
    let bus = LoopbackTransport::new();
    let rx_cfg = receiver_config(QosPreset::Reliable, 128, 500, Duration::from_secs(10));
    let first = attach(&bus, &rx_cfg);
    let second = attach(&bus, &rx_cfg);

    run_publisher(&bus, &publisher_config(QosPreset::Reliable, 128, 500, 0.0))
        .expect("publish run");

    for reader in [first, second] {
        let received = receive(reader, &rx_cfg);
        assert_eq!(received.outcome, ReceiveOutcome::Complete);
        assert_eq!(received.window.received(), 500);
        assert_eq!(received.loss_percent, None);
    }
}

#[test]
fn test_receiver_joining_after_publish_sees_nothing() {
    let bus = LoopbackTransport::new();
    run_publisher(&bus, &publisher_config(QosPreset::Reliable, 64, 10, 0.0)).expect("publish");

    let received = run_receiver(
        &bus,
        &receiver_config(QosPreset::Reliable, 64, 10, Duration::from_millis(20)),
    )
    .expect("receive run");
    assert_eq!(received.outcome, ReceiveOutcome::Timeout);
    assert_eq!(received.window.received(), 0);
    assert_eq!(received.loss_percent, Some(100.0));
}

#[test]
fn test_concurrent_paced_run_measures_steady_state() {
    let bus = LoopbackTransport::new();
    let rx_cfg = receiver_config(QosPreset::Reliable, 256, 200, Duration::from_secs(10));
    let reader = attach(&bus, &rx_cfg);

    let rx = thread::spawn(move || receive(reader, &rx_cfg));

    let mut cfg = publisher_config(QosPreset::Reliable, 256, 200, 2000.0);
    cfg.preroll = Duration::from_millis(20);
    let sent = run_publisher(&bus, &cfg).expect("publish run");
    let received = rx.join().expect("receiver thread");

    assert_eq!(received.outcome, ReceiveOutcome::Complete);
    assert_eq!(received.window.received(), 200);
    // 200 messages at 2000 msg/s take at least ~100ms to send.
    assert!(sent.throughput.elapsed >= Duration::from_millis(99));
    assert!(sent.throughput.message_rate.value() <= 2020.0);
    // Window starts at the first arrival, so it is shorter than the full wait.
    assert!(received.window.span() <= sent.throughput.elapsed + Duration::from_millis(50));
}

#[test]
fn test_best_effort_overflow_reports_loss() {
    let bus = LoopbackTransport::new();
    let rx_cfg = receiver_config(QosPreset::BestEffort, 64, 250, Duration::from_millis(50));
    let reader = attach(&bus, &rx_cfg);

    // KEEP_LAST(100) with nobody draining: the 150 oldest samples are evicted.
    let sent = run_publisher(&bus, &publisher_config(QosPreset::BestEffort, 64, 250, 0.0))
        .expect("best-effort publish never blocks");
    assert_eq!(sent.dropped, 150);

    let received = receive(reader, &rx_cfg);
    assert_eq!(received.outcome, ReceiveOutcome::Timeout);
    assert_eq!(received.window.received(), 100);
    assert_eq!(received.loss_percent, Some(60.0));
}

#[test]
fn test_high_throughput_buffers_more_than_best_effort() {
    let bus = LoopbackTransport::new();
    let rx_cfg = receiver_config(QosPreset::HighThroughput, 64, 1000, Duration::from_secs(5));
    let reader = attach(&bus, &rx_cfg);

    let sent = run_publisher(
        &bus,
        &publisher_config(QosPreset::HighThroughput, 64, 1000, 0.0),
    )
    .expect("publish run");
    assert_eq!(sent.dropped, 0);

    let received = receive(reader, &rx_cfg);
    assert_eq!(received.outcome, ReceiveOutcome::Complete);
}

#[test]
fn test_unregister_notice_is_filtered() {
    let bus = LoopbackTransport::new();
    // Expect one more than is sent so the receiver also drains the notice.
    let rx_cfg = receiver_config(QosPreset::Reliable, 8, 6, Duration::from_millis(30));
    let reader = attach(&bus, &rx_cfg);
    run_publisher(&bus, &publisher_config(QosPreset::Reliable, 8, 5, 0.0)).expect("publish");

    let received = receive(reader, &rx_cfg);
    assert_eq!(received.window.received(), 5);
    assert_eq!(received.ignored, 1);
}

#[test]
fn test_unknown_topic_times_out_cleanly() {
    let bus = LoopbackTransport::new();
    let mut rx_cfg = receiver_config(QosPreset::Reliable, 8, 5, Duration::from_millis(20));
    rx_cfg.topic = "e2e/other".to_string();
    let reader = attach(&bus, &rx_cfg);
    run_publisher(&bus, &publisher_config(QosPreset::Reliable, 8, 5, 0.0)).expect("publish");

    let received = receive(reader, &rx_cfg);
    assert_eq!(received.outcome, ReceiveOutcome::Timeout);
    assert_eq!(received.window.received(), 0);
    assert_eq!(received.loss_percent, Some(100.0));
    assert_eq!(received.throughput.message_rate.value(), 0.0);
}
