//! Index codec and hashing benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docsync_bench::file_entries;
use docsync_codec::{content_hash, decode, encode, hash_entries};

fn bench_hash_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_entries");

    for count in [4, 64, 1024].iter() {
        let entries = file_entries(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &entries, |b, entries| {
            b.iter(|| {
                let hash = hash_entries(black_box(entries)).unwrap();
                black_box(hash);
            });
        });
    }

    group.finish();
}

fn bench_index_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("index");

    for count in [64, 1024].iter() {
        let entries = file_entries(*count);
        let blob = encode(&entries);
        group.throughput(Throughput::Bytes(blob.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", count), &entries, |b, entries| {
            b.iter(|| black_box(encode(black_box(entries))));
        });

        group.bench_with_input(BenchmarkId::new("decode", count), &blob, |b, blob| {
            b.iter(|| black_box(decode(black_box(blob)).unwrap()));
        });
    }

    group.finish();
}

fn bench_content_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_hash");

    for size in [1024usize, 1024 * 1024].iter() {
        let data = docsync_bench::payload(0, *size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(content_hash(black_box(data))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_hash_entries,
    bench_index_codec,
    bench_content_hash
);
criterion_main!(benches);
