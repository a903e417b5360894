//! Benchmarks for the local score.
//!
//! Run with `cargo bench --bench local_score`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ges_core::{Dataset, LocalScorer, ScorerConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Columns 0..4 continuous, 4 and 5 categorical with 3 and 5 categories.
fn make_dataset(n_samples: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).expect("normal");
    let mut values = Vec::with_capacity(n_samples * 6);
    for _ in 0..n_samples {
        let c1 = rng.gen_range(0..3usize);
        let c2 = rng.gen_range(0..5usize);
        let a = normal.sample(&mut rng) + c1 as f64;
        let b = a + normal.sample(&mut rng);
        let c = b - 0.5 * c2 as f64 + normal.sample(&mut rng);
        let d = normal.sample(&mut rng);
        values.extend_from_slice(&[a, b, c, d, c1 as f64, c2 as f64]);
    }
    let names = (0..6).map(|v| format!("x{}", v)).collect();
    Dataset::new(names, values, vec![0, 0, 0, 0, 3, 5]).expect("dataset")
}

fn bench_local_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_score");
    let cases: [(&str, usize, &[usize]); 4] = [
        ("continuous_empty", 2, &[]),
        ("continuous_parents", 2, &[0, 1, 3]),
        ("categorical_parents", 2, &[1, 4, 5]),
        ("categorical_target", 4, &[0, 1]),
    ];
    for n_samples in [500_usize, 2000] {
        let data = make_dataset(n_samples, n_samples as u64);
        let scorer = LocalScorer::new(&data, ScorerConfig::default()).expect("scorer");
        for (name, y, parents) in cases {
            group.bench_with_input(BenchmarkId::new(name, n_samples), &parents, |b, parents| {
                b.iter(|| black_box(scorer.score_details(black_box(y), parents)))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_local_score);
criterion_main!(benches);
