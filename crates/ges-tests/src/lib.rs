//! Shared fixtures for the integration tests: seeded samples from known structural models.

use ges_core::{Dag, Dataset, Edge, GesError, Pdag};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Kind of a synthetic variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    /// Uniform over `k` categories; only allowed as a root.
    Categorical(usize),
}

/// Linear structural model: every continuous node is the weighted sum of its parents plus
/// Gaussian noise. A categorical parent contributes its category code times the arc weight.
#[derive(Debug, Clone)]
pub struct SyntheticModel {
    kinds: Vec<VarKind>,
    arcs: Vec<(usize, usize, f64)>,
    noise_std: f64,
}

impl SyntheticModel {
    /// All-continuous model with unit weights and unit noise.
    pub fn continuous(n: usize, arcs: &[(usize, usize)]) -> Self {
        Self::new(
            vec![VarKind::Continuous; n],
            arcs.iter().map(|&(from, to)| (from, to, 1.0)).collect(),
        )
    }

    pub fn new(kinds: Vec<VarKind>, arcs: Vec<(usize, usize, f64)>) -> Self {
        Self {
            kinds,
            arcs,
            noise_std: 1.0,
        }
    }

    pub fn with_noise_std(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    pub fn n(&self) -> usize {
        self.kinds.len()
    }

    pub fn dag(&self) -> Result<Dag, GesError> {
        let edges: Vec<Edge> = self
            .arcs
            .iter()
            .map(|&(from, to, _)| Edge::Directed { from, to })
            .collect();
        Dag::from_pdag(Pdag::from_edges(self.n(), &edges)?)
    }

    /// The equivalence class the search should recover.
    pub fn cpdag(&self) -> Result<Pdag, GesError> {
        self.dag()?.to_cpdag()
    }

    /// Draws `n_samples` rows with a fixed seed. Columns are named `x0, x1, ...`.
    pub fn sample(&self, n_samples: usize, seed: u64) -> Result<Dataset, GesError> {
        let n = self.n();
        let order = self.dag()?.topological_order()?;
        if let Some(&(_, to, _)) = self
            .arcs
            .iter()
            .find(|&&(_, to, _)| matches!(self.kinds[to], VarKind::Categorical(_)))
        {
            return Err(GesError::ValidationError(format!(
                "categorical node {} cannot have parents",
                to
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let noise = Normal::new(0.0, self.noise_std)
            .map_err(|e| GesError::ValidationError(format!("noise: {}", e)))?;
        let mut values = vec![0.0; n_samples * n];
        for row in values.chunks_mut(n) {
            for &v in &order {
                row[v] = match self.kinds[v] {
                    VarKind::Categorical(k) => rng.gen_range(0..k) as f64,
                    VarKind::Continuous => {
                        let signal: f64 = self
                            .arcs
                            .iter()
                            .filter(|&&(_, to, _)| to == v)
                            .map(|&(from, _, w)| w * row[from])
                            .sum();
                        signal + noise.sample(&mut rng)
                    }
                };
            }
        }

        let names = (0..n).map(|v| format!("x{}", v)).collect();
        let n_categories = self
            .kinds
            .iter()
            .map(|kind| match kind {
                VarKind::Continuous => 0,
                VarKind::Categorical(k) => *k,
            })
            .collect();
        Dataset::new(names, values, n_categories)
    }
}

/// Operators sorted by `(kind, y, x, set)` for order-insensitive comparison.
pub fn sorted_operators(mut ops: Vec<ges_core::Operator>) -> Vec<ges_core::Operator> {
    ops.sort_by(|a, b| {
        (a.kind == ges_core::OperatorKind::Delete, a.y, a.x, a.set.as_slice()).cmp(&(
            b.kind == ges_core::OperatorKind::Delete,
            b.y,
            b.x,
            b.set.as_slice(),
        ))
    });
    ops
}
