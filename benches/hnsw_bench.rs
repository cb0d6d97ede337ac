use ann_index::{HnswConfig, Metric};
use ann_index::hnsw::HnswGraph;
use ann_index::vector::VectorRecord;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIMS: usize = 32;
const DATASET_SIZE: usize = 10_000;

fn synthetic_dataset(seed: u64, n: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..DIMS).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect())
        .collect()
}

fn bench_config() -> HnswConfig {
    HnswConfig::default()
        .with_ef_construction(100)
        .with_m0(40)
        .with_ef_search(32)
        .with_seed(1)
}

fn bench_hnsw_insert(c: &mut Criterion) {
    let dataset = synthetic_dataset(42, DATASET_SIZE);

    c.bench_function("hnsw_insert_10k", |b| {
        b.iter(|| {
            let mut graph = HnswGraph::new(Metric::L2, DIMS, bench_config());
            for vec in &dataset {
                graph.insert(VectorRecord::new(1, 0, vec.clone()));
            }
        })
    });
}

fn bench_hnsw_incremental_insert(c: &mut Criterion) {
    let dataset = synthetic_dataset(42, DATASET_SIZE);
    let query = synthetic_dataset(99, 1).remove(0);

    c.bench_function("hnsw_incremental_insert", |b| {
        b.iter_batched(
            || {
                let mut graph = HnswGraph::new(Metric::L2, DIMS, bench_config());
                for (i, vec) in dataset.iter().enumerate() {
                    graph.insert(VectorRecord::new(i as u64 + 1, 0, vec.clone()));
                }
                (graph, query.clone())
            },
            |(mut graph, query)| {
                graph.insert(VectorRecord::new(DATASET_SIZE as u64 + 1, 0, black_box(query)));
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_knn_search(c: &mut Criterion) {
    let dataset = synthetic_dataset(42, DATASET_SIZE);
    let query = synthetic_dataset(99, 1).remove(0);

    let mut graph = HnswGraph::new(Metric::L2, DIMS, bench_config());
    for (i, vec) in dataset.iter().enumerate() {
        graph.insert(VectorRecord::new(i as u64 + 1, 0, vec.clone()));
    }

    c.bench_function("hnsw_search_k10", |b| {
        b.iter(|| {
            graph.knn_search(black_box(&query), 10, Some(32));
        })
    });
}

criterion_group!(benches, bench_hnsw_insert, bench_hnsw_incremental_insert, bench_knn_search);
criterion_main!(benches);
