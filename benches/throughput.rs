//! Throughput Benchmark for minikv
//!
//! This benchmark measures the store under various workloads and the
//! frame decoder on typical request frames.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use minikv::commands::CommandHandler;
use minikv::protocol::{FrameDecoder, RespValue};
use minikv::storage::Store;
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            let value = Bytes::from("small_value");
            store.set(key, value);
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, value.clone());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        store.set(key, value);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access (80% reads, 20% writes per thread)
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let store = Arc::new(Store::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i % 1000);
                            if i % 5 == 0 {
                                store.set(Bytes::from(key), Bytes::from("value"));
                            } else {
                                black_box(store.get(key.as_bytes()));
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(store.len());
        });
    });

    group.finish();
}

/// Benchmark decoding and dispatching request frames
fn bench_decode(c: &mut Criterion) {
    let set_frame = RespValue::command(&["SET", "user:101", "Ariz"]).serialize();
    let pipeline: Vec<u8> = (0..100)
        .flat_map(|i| {
            let key = format!("key:{}", i);
            RespValue::command(&["GET", key.as_str()]).serialize()
        })
        .collect();

    let mut group = c.benchmark_group("decode");

    group.throughput(Throughput::Bytes(set_frame.len() as u64));
    group.bench_function("set_frame", |b| {
        let mut decoder = FrameDecoder::new();
        b.iter(|| black_box(decoder.decode(black_box(&set_frame)).unwrap()));
    });

    group.throughput(Throughput::Elements(100));
    group.bench_function("pipeline_100_get", |b| {
        let handler = CommandHandler::new(Arc::new(Store::new()));
        let mut decoder = FrameDecoder::new();
        b.iter(|| {
            let mut offset = 0;
            while let Some((command, consumed)) = decoder.decode(&pipeline[offset..]).unwrap() {
                black_box(handler.execute(command));
                offset += consumed;
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_concurrent, bench_decode);
criterion_main!(benches);
