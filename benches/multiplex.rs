//! Multiplexer throughput benchmarks.
//!
//! - Routing cost per frame (ignored vs delivered)
//! - Content script → sub-stream delivery through a live pipeline
//!
//! Run with: cargo bench --bench multiplex
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use tokio::runtime::Runtime;

use opn_inpage::constants::{CONTENT_SCRIPT, METAMASK_EIP_1193_PROVIDER, METAMASK_INPAGE};
use opn_inpage::multiplex::Frame;
use opn_inpage::{MessageBus, ObjectMultiplex, PostMessageStream, pipeline};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BATCH_SIZES: &[usize] = &[100, 1_000];

fn frame(name: &str, i: usize) -> serde_json::Value {
    Frame::new(name, json!({"jsonrpc": "2.0", "method": "eth_blockNumber", "id": i})).encode()
}

// ============================================================================
// Benchmark: Dispatch
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("dispatch");

    for &batch in BATCH_SIZES {
        group.throughput(Throughput::Elements(batch as u64));

        group.bench_with_input(BenchmarkId::new("ignored", batch), &batch, |b, &batch| {
            let mux = ObjectMultiplex::new();
            mux.ignore_stream("opn-multichain-provider").expect("ignore");

            b.iter(|| {
                for i in 0..batch {
                    black_box(mux.dispatch(frame("opn-multichain-provider", i)));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("delivered", batch), &batch, |b, &batch| {
            b.to_async(&rt).iter(|| async move {
                let mux = ObjectMultiplex::new();
                let mut substream = mux.create_stream(METAMASK_EIP_1193_PROVIDER).expect("stream");

                for i in 0..batch {
                    mux.dispatch(frame(METAMASK_EIP_1193_PROVIDER, i));
                }
                for _ in 0..batch {
                    black_box(substream.recv().await);
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Pipeline
// ============================================================================

fn bench_pipeline(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("pipeline");
    group.measurement_time(Duration::from_secs(10));

    for &batch in BATCH_SIZES {
        group.throughput(Throughput::Elements(batch as u64));

        group.bench_with_input(BenchmarkId::new("deliver", batch), &batch, |b, &batch| {
            b.to_async(&rt).iter(|| async move {
                let bus = MessageBus::new();
                let (mut cs_reader, cs_writer) =
                    PostMessageStream::new(&bus, CONTENT_SCRIPT, METAMASK_INPAGE).split();

                let mux = ObjectMultiplex::new();
                let mut substream = mux.create_stream(METAMASK_EIP_1193_PROVIDER).expect("stream");
                let page = PostMessageStream::new(&bus, METAMASK_INPAGE, CONTENT_SCRIPT);
                let _pipeline = pipeline(page, &mux, |_| {});

                // Drive the content-script handshake in the background
                tokio::spawn(async move { while cs_reader.read().await.is_some() {} });

                for i in 0..batch {
                    cs_writer.write(frame(METAMASK_EIP_1193_PROVIDER, i)).expect("write");
                }
                for _ in 0..batch {
                    black_box(substream.recv().await);
                }

                bus.close();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_pipeline);
criterion_main!(benches);
