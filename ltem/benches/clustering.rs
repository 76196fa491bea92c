//! Clustering and significance benchmarks.
//! Run with: cargo bench -p ltem --bench clustering

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ltem::{
    cluster_mask, compute_significance, filter_clusters, ClusterIdSequence, DensityClusterer,
    FilterConfig, Grid,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Frame sizes: a small crop and the stock LTEM sensor.
const SIZES: [(usize, usize); 2] = [(256, 256), (1296, 1728)];

fn random_mask(rows: usize, cols: usize, density: f64) -> Grid<bool> {
    let mut rng = StdRng::seed_from_u64(7);
    Grid::from_fn(rows, cols, |_, _| rng.random::<f64>() < density)
}

fn benchmark_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    group.sample_size(20);

    for (rows, cols) in SIZES {
        group.throughput(Throughput::Elements((rows * cols) as u64));

        for density in [0.3, 0.8] {
            let mask = random_mask(rows, cols, density);
            let id = BenchmarkId::new(format!("density_{}", density), format!("{}x{}", rows, cols));

            let mut clusterer = DensityClusterer::new();
            group.bench_function(id, |b| {
                b.iter(|| {
                    let clustering =
                        clusterer.cluster(black_box(&mask), &mut ClusterIdSequence::new());
                    black_box(clustering)
                })
            });
        }
    }

    group.finish();
}

fn benchmark_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let mask = random_mask(1296, 1728, 0.8);
    let config = FilterConfig::default();

    group.bench_function("default_bounds", |b| {
        b.iter_batched(
            || cluster_mask(&mask),
            |clustering| black_box(filter_clusters(clustering, &config)),
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn benchmark_significance(c: &mut Criterion) {
    let mut group = c.benchmark_group("significance");

    for (rows, cols) in SIZES {
        group.throughput(Throughput::Elements((rows * cols) as u64));
        let signal = Grid::from_fn(rows, cols, |r, c| ((r * 31 + c * 17) % 256) as u8);
        let background = Grid::from_fn(rows, cols, |r, c| ((r / 8 + c / 8 + 64) % 256) as u8);

        group.bench_function(format!("{}x{}", rows, cols), |b| {
            b.iter(|| compute_significance(black_box(&signal), black_box(&background), 1.0))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_clustering,
    benchmark_filter,
    benchmark_significance
);
criterion_main!(benches);
