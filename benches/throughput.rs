//! Throughput Benchmark for Lamport Bank
//!
//! This benchmark measures the wire codec and the operation dispatcher
//! under various workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lamport_bank::commands::OperationDispatcher;
use lamport_bank::protocol::{decode_request, decode_response, extract_timestamp, Request};
use lamport_bank::storage::{Account, Ledger, MemoryStore};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

const ACCOUNTS: u64 = 1_000;

fn create_dispatcher() -> OperationDispatcher {
    let accounts = (0..ACCOUNTS)
        .map(|i| Account::new(i.to_string(), format!("holder {}", i), Decimal::new(1_000_000, 2)));
    OperationDispatcher::new(Arc::new(Ledger::new(MemoryStore::with_accounts(accounts))))
}

/// Benchmark message encoding and decoding
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    let transfer = Request::Transfer {
        time: 42,
        from_id: "1001".to_string(),
        to_id: "1002".to_string(),
        amount: Decimal::new(12_345, 2),
    };
    let transfer_line = transfer.encode();
    let response_line = "t:43|s:0|resposta:transfer succeeded";

    group.bench_function("encode_transfer", |b| {
        b.iter(|| black_box(transfer.encode()));
    });

    group.bench_function("decode_transfer", |b| {
        b.iter(|| black_box(decode_request(black_box(&transfer_line))));
    });

    group.bench_function("decode_response", |b| {
        b.iter(|| black_box(decode_response(black_box(response_line))));
    });

    group.bench_function("extract_timestamp", |b| {
        b.iter(|| black_box(extract_timestamp(black_box(&transfer_line))));
    });

    group.bench_function("decode_garbage", |b| {
        b.iter(|| black_box(decode_request(black_box("t:9|op:9|nothing"))));
    });

    group.finish();
}

/// Benchmark single-threaded dispatch
fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = create_dispatcher();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("balance", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let line = format!("t:{}|op:1|rg:{}", i, i % ACCOUNTS);
            black_box(dispatcher.execute_line(&line));
            i += 1;
        });
    });

    group.bench_function("deposit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let line = format!("t:{}|op:3|rg:{}|valor:1.00", i, i % ACCOUNTS);
            black_box(dispatcher.execute_line(&line));
            i += 1;
        });
    });

    group.bench_function("transfer", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let from = i % ACCOUNTS;
            let to = (i + 1) % ACCOUNTS;
            let line = format!("t:{}|op:4|rg_origem:{}|rg_destino:{}|valor:0.01", i, from, to);
            black_box(dispatcher.execute_line(&line));
            i += 1;
        });
    });

    group.bench_function("unknown_account", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let line = format!("t:{}|op:1|rg:missing{}", i, i);
            black_box(dispatcher.execute_line(&line));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% balance queries, 20% deposits)
fn bench_mixed(c: &mut Criterion) {
    let dispatcher = create_dispatcher();

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_balance_20_deposit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let line = if i % 5 == 0 {
                format!("t:{}|op:3|rg:{}|valor:0.50", i, i % ACCOUNTS)
            } else {
                format!("t:{}|op:1|rg:{}", i, i % ACCOUNTS)
            };
            black_box(dispatcher.execute_line(&line));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark contention on the single ledger lock
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_transfers", |b| {
        b.iter(|| {
            let dispatcher = create_dispatcher();
            let handles: Vec<_> = (0..4u64)
                .map(|t| {
                    let dispatcher = dispatcher.clone();
                    thread::spawn(move || {
                        for i in 0..2_500u64 {
                            let from = (t * 250 + i) % ACCOUNTS;
                            let to = (from + 1) % ACCOUNTS;
                            let line = format!(
                                "t:{}|op:4|rg_origem:{}|rg_destino:{}|valor:0.01",
                                i, from, to
                            );
                            dispatcher.execute_line(&line);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(dispatcher.ledger().clock_value());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_codec,
    bench_dispatch,
    bench_mixed,
    bench_concurrent,
);

criterion_main!(benches);
