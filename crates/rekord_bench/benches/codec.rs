//! Row codec and segment entry benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rekord_bench::row;
use rekord_codec::{decode_row, encode_row};
use rekord_core::segment::SegmentEntry;
use rekord_core::{RecordId, RevisionId};

/// Benchmark row encoding and decoding.
fn bench_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("row");

    for size in [16, 256, 4096].iter() {
        let fields = row(1, *size);
        let bytes = encode_row(&fields).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &fields, |b, fields| {
            b.iter(|| black_box(encode_row(black_box(fields)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(decode_row(black_box(bytes)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark checksummed segment entry framing.
fn bench_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_entry");

    let payload = encode_row(&row(1, 256)).unwrap();
    let entries: Vec<SegmentEntry> = (0..1000)
        .map(|i| SegmentEntry::insert(RecordId(i), RevisionId(i + 1), payload.clone()))
        .collect();
    let mut data = Vec::new();
    for entry in &entries {
        entry.encode_into(&mut data);
    }
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("encode_1000", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(data.len());
            for entry in &entries {
                entry.encode_into(&mut buf);
            }
            black_box(buf)
        });
    });
    group.bench_function("decode_all_1000", |b| {
        b.iter(|| black_box(SegmentEntry::decode_all(black_box(&data)).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_row, bench_entry);
criterion_main!(benches);
