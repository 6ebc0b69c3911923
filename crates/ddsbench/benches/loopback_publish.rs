// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Loopback publish/poll cost per payload size.
//!
//! Run with: cargo bench -p ddsbench --bench loopback_publish

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ddsbench::payload;
use ddsbench::{Endpoint, LoopbackTransport, QosPreset, Transport};
use std::hint::black_box;

fn bench_send_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("loopback_send_poll");
    let qos = QosPreset::HighThroughput.profile();

    for size in [64usize, 1024, 16 * 1024] {
        let bus = LoopbackTransport::new();
        let mut writer = bus.connect(0, "bench", &qos).expect("writer");
        let mut reader = bus.connect(0, "bench", &qos).expect("reader");
        let data = payload::generate(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| {
                writer.send(black_box(data)).expect("send");
                black_box(reader.poll(1).expect("poll"));
            });
        });
    }
    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    c.bench_function("payload_generate_4k", |b| {
        b.iter(|| black_box(payload::generate(black_box(4096))));
    });
}

criterion_group!(benches, bench_send_poll, bench_generate);
criterion_main!(benches);
