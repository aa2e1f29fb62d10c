//! Table operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rekord_bench::{open_directory, open_in_memory, populate, row};
use tempfile::tempdir;

/// Benchmark single auto-committed inserts.
fn bench_single_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_insert");

    for size in [64, 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("memory", size), size, |b, &size| {
            let db = open_in_memory();
            let table = db.table("bench").unwrap();
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                table.insert(black_box(row(n, size))).unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("directory", size), size, |b, &size| {
            let dir = tempdir().unwrap();
            let db = open_directory(dir.path());
            let table = db.table("bench").unwrap();
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                table.insert(black_box(row(n, size))).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark inserts batched in one transaction.
fn bench_batch_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_insert");

    for batch_size in [10u64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = open_in_memory();
                let table = db.table("bench").unwrap();
                let mut n = 0u64;
                b.iter(|| {
                    db.transaction(|_| {
                        for _ in 0..batch_size {
                            n += 1;
                            table.insert(black_box(row(n, 256)))?;
                        }
                        Ok(())
                    })
                    .unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark full scans at the current and a past revision.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for count in [100u64, 10_000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::new("current", count), count, |b, &count| {
            let db = open_in_memory();
            populate(&db, count, 64);
            let table = db.table("bench").unwrap();
            b.iter(|| black_box(table.items().unwrap().iter().count()));
        });
        group.bench_with_input(BenchmarkId::new("past", count), count, |b, &count| {
            let db = open_in_memory();
            populate(&db, count, 64);
            let past = db.current_revision_id();
            populate_removals(&db, count / 2);
            let table = db.table("bench").unwrap();
            b.iter(|| black_box(table.items_at(past).unwrap().iter().count()));
        });
    }
    group.finish();
}

fn populate_removals(db: &rekord_core::Database, count: u64) {
    let table = db.table("bench").unwrap();
    for n in 0..count {
        table.remove(rekord_core::RecordId(n)).unwrap();
    }
}

criterion_group!(benches, bench_single_insert, bench_batch_insert, bench_scan);
criterion_main!(benches);
