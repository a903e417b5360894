//! Benchmarks for a full forward/backward search.
//!
//! Run with `cargo bench --bench search`.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ges_core::{Dataset, GesSearch, ScorerConfig, SearchConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Layered model: node `v` depends on `v - 1` and `v - 3` when they exist.
fn make_dataset(n_vars: usize, n_samples: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).expect("normal");
    let mut values = vec![0.0; n_vars * n_samples];
    for row in values.chunks_mut(n_vars) {
        for v in 0..n_vars {
            let mut x = normal.sample(&mut rng);
            if v >= 1 {
                x += 0.8 * row[v - 1];
            }
            if v >= 3 {
                x -= 0.6 * row[v - 3];
            }
            row[v] = x;
        }
    }
    let names = (0..n_vars).map(|v| format!("x{}", v)).collect();
    Dataset::new(names, values, vec![0; n_vars]).expect("dataset")
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("ges_run_to_completion");
    group.sample_size(10);
    for n_vars in [5_usize, 8, 12] {
        let data = make_dataset(n_vars, 1000, n_vars as u64);
        group.bench_with_input(BenchmarkId::from_parameter(n_vars), &data, |b, data| {
            b.iter(|| {
                GesSearch::new(data, SearchConfig::default(), ScorerConfig::default())
                    .and_then(|mut search| search.run_to_completion())
                    .expect("search")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
