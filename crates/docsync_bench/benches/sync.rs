//! Mirror and commit benchmarks against a local-directory remote.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use docsync_bench::document_tree;
use docsync_core::{CacheStore, Document, HashTree};
use docsync_storage::{LocalDirectoryStorage, RemoteStorage};
use docsync_sync_engine::{CommitProtocol, Mirror, SyncConfig};
use tempfile::TempDir;

/// Publishes `tree` into a fresh remote directory.
fn published_remote(tree: &HashTree) -> (TempDir, LocalDirectoryStorage) {
    let dir = TempDir::new().unwrap();
    let storage = LocalDirectoryStorage::open(dir.path()).unwrap();
    let cache = CacheStore::new(dir.path().join("publisher.json"));
    let config = SyncConfig::new();
    let mut local = HashTree::new();
    CommitProtocol::new(&storage, &cache, &config)
        .run(&mut local, |t| {
            for doc in tree.documents() {
                t.add(doc.clone())?;
            }
            Ok(())
        })
        .unwrap();
    (dir, storage)
}

fn bench_full_mirror(c: &mut Criterion) {
    let mut group = c.benchmark_group("mirror_full");
    group.sample_size(10);

    for count in [16, 128].iter() {
        let (_dir, storage) = published_remote(&document_tree(*count, 4096));
        for workers in [1usize, 20].iter() {
            group.bench_with_input(
                BenchmarkId::new(format!("{count}_docs"), workers),
                workers,
                |b, &workers| {
                    b.iter(|| {
                        let mut tree = HashTree::new();
                        Mirror::new(workers).run(&mut tree, &storage).unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_up_to_date_mirror(c: &mut Criterion) {
    let (_dir, storage) = published_remote(&document_tree(128, 1024));
    let mut tree = HashTree::new();
    Mirror::new(20).run(&mut tree, &storage).unwrap();

    c.bench_function("mirror_up_to_date", |b| {
        b.iter(|| Mirror::new(20).run(&mut tree, &storage).unwrap());
    });
}

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");
    group.sample_size(10);

    group.bench_function("create_folder", |b| {
        let dir = TempDir::new().unwrap();
        let storage = LocalDirectoryStorage::open(dir.path()).unwrap();
        let cache = CacheStore::new(dir.path().join("cache.json"));
        let config = SyncConfig::new();
        let mut tree = HashTree::new();
        let mut n = 0usize;
        b.iter(|| {
            n += 1;
            let folder = Document::new_collection(format!("f{n}"), "Folder", "").unwrap();
            CommitProtocol::new(&storage, &cache, &config)
                .run(&mut tree, |t| t.add(folder.clone()))
                .unwrap();
        });
        assert_eq!(storage.get_root().unwrap().generation, n as u64);
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_full_mirror,
    bench_up_to_date_mirror,
    bench_commit
);
criterion_main!(benches);
