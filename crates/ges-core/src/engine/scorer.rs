//! Mixed continuous/categorical local score.
//!
//! `score(y, Pa)` is a BIC-penalised Gaussian log-likelihood of `y` given `Pa`, computed on a
//! joint representation where every categorical variable is replaced by a low-dimensional
//! embedding:
//!
//! - continuous columns enter as they are;
//! - the categorical parents share one embedding block whose dimension is chosen from their
//!   total category count (see [`embedding_dims`]);
//! - a categorical target gets its own block, fitted from its column alone so that its
//!   representation is the same for every candidate parent set.
//!
//! A block holds one centroid and one weight per category. A sample's anchor is the mean of the
//! centroids of its observed categories. The parent block is refined for a fixed number of
//! iterations (`em_iterations`, or a single pass with no categorical parents):
//!
//! 1. blend each anchor with its linear-Gaussian prediction from the continuous parents;
//! 2. soft responsibilities per variable (softmax of `ln w - |z - mu|^2`) and new weights;
//! 3. centroids as responsibility-weighted means, then recentred and rescaled;
//! 4. joint mean and covariance of `embedding ⊕ continuous parents` for the next pass.
//!
//! The target is then scored through the Schur complement of the final joint covariance. A
//! singular conditional covariance is scored by its pseudo-determinant with the effective
//! dimension reduced accordingly.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;

use crate::engine::dataset::Dataset;
use crate::engine::errors::GesError;
use crate::engine::numeric_kernels::{
    conditional_covariance, mean_and_covariance, pseudo_log_determinant, scaled_pseudo_inverse,
    softmax_in_place,
};
use crate::engine::pdag::NodeSet;

const MIN_WEIGHT: f64 = 1e-12;
const MIN_MASS: f64 = 1e-12;
const MIN_SPREAD: f64 = 1e-12;
const MIN_VARIANCE: f64 = 1e-300;

/// Scorer tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct ScorerConfig {
    /// Refinement passes over the categorical-parent embedding.
    pub em_iterations: usize,
    /// Multiplier on the `0.5 ln N` penalty per parameter.
    pub penalty_discount: f64,
    /// Relative eigenvalue cut-off for rank decisions.
    pub eigen_tolerance: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            em_iterations: 30,
            penalty_discount: 1.0,
            eigen_tolerance: 1e-9,
        }
    }
}

impl ScorerConfig {
    fn validate(&self) -> Result<(), GesError> {
        if self.em_iterations == 0 {
            return Err(GesError::ValidationError(
                "em_iterations must be at least 1".into(),
            ));
        }
        if !self.penalty_discount.is_finite() || self.penalty_discount < 0.0 {
            return Err(GesError::ValidationError(format!(
                "penalty_discount must be finite and non-negative, got {}",
                self.penalty_discount
            )));
        }
        if !(self.eigen_tolerance > 0.0 && self.eigen_tolerance < 1.0) {
            return Err(GesError::ValidationError(format!(
                "eigen_tolerance must lie in (0, 1), got {}",
                self.eigen_tolerance
            )));
        }
        Ok(())
    }
}

/// Embedding dimension for a block with `total_categories` categories.
pub fn embedding_dims(total_categories: usize) -> usize {
    match total_categories {
        0 => 0,
        1..=8 => 2,
        9..=27 => 3,
        28..=64 => 4,
        _ => 5,
    }
}

/// Full breakdown of one local score.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalScore {
    /// Gaussian log-likelihood of the target given the rest.
    pub log_likelihood: f64,
    /// `(effective_dims - 1)` plus categorical weight and centroid parameters.
    pub num_parameters: f64,
    /// Kept rank of the target block plus kept rank of the conditioning block.
    pub effective_dims: usize,
    /// Subtracted complexity term.
    pub penalty: f64,
    /// `log_likelihood - penalty`; higher is better.
    pub score: f64,
    /// Whether the conditional covariance was rank deficient.
    pub pseudo_determinant: bool,
}

/// Score cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoising local scorer over one dataset.
///
/// Keys are `(y, sorted parents)`, so the cache never needs invalidation for the lifetime of a
/// run.
#[derive(Debug)]
pub struct LocalScorer<'a> {
    data: &'a Dataset,
    config: ScorerConfig,
    cache: FxHashMap<(usize, NodeSet), f64>,
    stats: CacheStats,
}

impl<'a> LocalScorer<'a> {
    pub fn new(data: &'a Dataset, config: ScorerConfig) -> Result<Self, GesError> {
        config.validate()?;
        Ok(Self {
            data,
            config,
            cache: FxHashMap::default(),
            stats: CacheStats::default(),
        })
    }

    pub fn data(&self) -> &'a Dataset {
        self.data
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Memoised score of `y` given `parents`. Parent order and duplicates are irrelevant.
    pub fn score(&mut self, y: usize, parents: &[usize]) -> Result<f64, GesError> {
        let key = self.key(y, parents)?;
        if let Some(&score) = self.cache.get(&key) {
            self.stats.hits += 1;
            return Ok(score);
        }
        self.stats.misses += 1;
        let score = fit_local_model(self.data, &self.config, key.0, &key.1).score;
        self.cache.insert(key, score);
        Ok(score)
    }

    /// Uncached score with every intermediate quantity.
    pub fn score_details(&self, y: usize, parents: &[usize]) -> Result<LocalScore, GesError> {
        let (y, parents) = self.key(y, parents)?;
        Ok(fit_local_model(self.data, &self.config, y, &parents))
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn key(&self, y: usize, parents: &[usize]) -> Result<(usize, NodeSet), GesError> {
        let n = self.data.n_vars();
        if y >= n {
            return Err(GesError::ValidationError(format!(
                "target {} out of range for {} variables",
                y, n
            )));
        }
        let mut sorted: NodeSet = parents.iter().copied().collect();
        sorted.sort_unstable();
        sorted.dedup();
        if let Some(&bad) = sorted.iter().find(|&&p| p >= n || p == y) {
            return Err(GesError::ValidationError(format!(
                "parent {} is invalid for target {} over {} variables",
                bad, y, n
            )));
        }
        Ok((y, sorted))
    }
}

/// Centroids and weights of the categories of one group of categorical columns.
struct EmbeddingBlock {
    vars: Vec<usize>,
    offsets: Vec<usize>,
    dims: usize,
    centroids: DMatrix<f64>,
    weights: Vec<f64>,
}

impl EmbeddingBlock {
    fn new(data: &Dataset, vars: &[usize]) -> Option<Self> {
        if vars.is_empty() {
            return None;
        }
        let mut offsets = Vec::with_capacity(vars.len());
        let mut total = 0;
        for &var in vars {
            offsets.push(total);
            total += data.n_categories()[var];
        }
        let dims = embedding_dims(total);

        let inv_n = 1.0 / data.n_samples() as f64;
        let mut weights = vec![0.0; total];
        for (k, &var) in vars.iter().enumerate() {
            for row in 0..data.n_samples() {
                weights[offsets[k] + data.code(row, var)] += inv_n;
            }
        }

        Some(Self {
            vars: vars.to_vec(),
            offsets,
            dims,
            centroids: initial_centroids(total, dims),
            weights,
        })
    }

    fn total_categories(&self) -> usize {
        self.weights.len()
    }

    fn parameter_count(&self, data: &Dataset) -> usize {
        let free_weights: usize = self
            .vars
            .iter()
            .map(|&v| data.n_categories()[v].saturating_sub(1))
            .sum();
        free_weights + self.total_categories() * self.dims
    }

    /// Per-sample mean of the observed categories' centroids.
    fn anchors(&self, data: &Dataset) -> DMatrix<f64> {
        let inv_k = 1.0 / self.vars.len() as f64;
        DMatrix::from_fn(data.n_samples(), self.dims, |row, j| {
            self.vars
                .iter()
                .zip(&self.offsets)
                .map(|(&var, &offset)| self.centroids[(offset + data.code(row, var), j)])
                .sum::<f64>()
                * inv_k
        })
    }

    /// One responsibility / weight / centroid pass against embeddings `z`.
    fn update(&mut self, data: &Dataset, z: &DMatrix<f64>) {
        let n = data.n_samples();
        let total = self.total_categories();
        let mut responsibility_sums = vec![0.0; total];
        let mut mass = vec![0.0; total];
        let mut sums = DMatrix::<f64>::zeros(total, self.dims);
        let mut logits = Vec::new();

        for (&var, &offset) in self.vars.iter().zip(&self.offsets) {
            let count = data.n_categories()[var];
            for row in 0..n {
                logits.clear();
                for c in 0..count {
                    let g = offset + c;
                    let dist2: f64 = (0..self.dims)
                        .map(|j| (z[(row, j)] - self.centroids[(g, j)]).powi(2))
                        .sum();
                    logits.push(self.weights[g].max(MIN_WEIGHT).ln() - dist2);
                }
                softmax_in_place(&mut logits);

                let observed = data.code(row, var);
                for (c, &r) in logits.iter().enumerate() {
                    let g = offset + c;
                    responsibility_sums[g] += r;
                    let rho = 0.5 * (r + if c == observed { 1.0 } else { 0.0 });
                    mass[g] += rho;
                    for j in 0..self.dims {
                        sums[(g, j)] += rho * z[(row, j)];
                    }
                }
            }
        }

        let inv_n = 1.0 / n as f64;
        for g in 0..total {
            self.weights[g] = responsibility_sums[g] * inv_n;
            if mass[g] > MIN_MASS {
                for j in 0..self.dims {
                    self.centroids[(g, j)] = sums[(g, j)] / mass[g];
                }
            }
        }
        self.normalise();
    }

    /// Weighted recentring and rescaling to the initial spread; the Gaussian score is
    /// invariant to affine maps of a conditioning block.
    fn normalise(&mut self) {
        let total_weight: f64 = self.weights.iter().sum();
        if total_weight <= MIN_WEIGHT {
            return;
        }
        for j in 0..self.dims {
            let center = (0..self.total_categories())
                .map(|g| self.weights[g] * self.centroids[(g, j)])
                .sum::<f64>()
                / total_weight;
            for g in 0..self.total_categories() {
                self.centroids[(g, j)] -= center;
            }
        }
        let rms = ((0..self.total_categories())
            .map(|g| self.weights[g] * self.centroids.row(g).norm_squared())
            .sum::<f64>()
            / total_weight)
            .sqrt();
        if rms > MIN_SPREAD {
            self.centroids *= centroid_spread(self.total_categories()) / rms;
        }
    }
}

fn centroid_spread(total_categories: usize) -> f64 {
    2.0 * total_categories.max(1) as f64
}

/// Points on the curve `(cos t, cos 2t, ..., cos dt)`, `t in [0, pi)`: distinct, and any
/// `d + 1` of them are affinely independent.
fn initial_centroids(total: usize, dims: usize) -> DMatrix<f64> {
    let spread = centroid_spread(total);
    DMatrix::from_fn(total, dims, |g, j| {
        let t = PI * g as f64 / total as f64;
        spread * (t * (j + 1) as f64).cos()
    })
}

/// Linear-Gaussian prediction of `z` from `cont` under the joint moments `(mean, cov)` of
/// `z ⊕ cont`.
fn predict_from_continuous(
    z_dims: usize,
    cont: &DMatrix<f64>,
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    tolerance: f64,
) -> DMatrix<f64> {
    let c = cont.ncols();
    let s_cc = cov.view((z_dims, z_dims), (c, c)).into_owned();
    let (s_cc_inv, _) = scaled_pseudo_inverse(&s_cc, tolerance);
    let coef = cov.view((0, z_dims), (z_dims, c)).into_owned() * s_cc_inv;
    DMatrix::from_fn(cont.nrows(), z_dims, |row, j| {
        mean[j]
            + (0..c)
                .map(|k| coef[(j, k)] * (cont[(row, k)] - mean[z_dims + k]))
                .sum::<f64>()
    })
}

fn hstack(n: usize, blocks: &[&DMatrix<f64>]) -> DMatrix<f64> {
    let width = blocks.iter().map(|b| b.ncols()).sum();
    let mut out = DMatrix::zeros(n, width);
    let mut col = 0;
    for block in blocks {
        if block.ncols() > 0 {
            out.view_mut((0, col), (n, block.ncols())).copy_from(*block);
            col += block.ncols();
        }
    }
    out
}

/// Representation of the target: its column, or its own embedding when categorical.
fn target_representation(
    data: &Dataset,
    config: &ScorerConfig,
    y: usize,
) -> (DMatrix<f64>, usize) {
    let block = if data.is_categorical(y) {
        EmbeddingBlock::new(data, &[y])
    } else {
        None
    };
    match block {
        Some(mut block) => {
            for _ in 0..config.em_iterations {
                let z = block.anchors(data);
                block.update(data, &z);
            }
            (block.anchors(data), block.parameter_count(data))
        }
        None => (
            DMatrix::from_fn(data.n_samples(), 1, |row, _| data.value(row, y)),
            0,
        ),
    }
}

/// Categorical-parent embedding after the refinement passes.
///
/// From the second pass on, each row's target point is the mean of its category anchor and
/// the linear prediction from the continuous parents, not the prediction alone. Keeping half
/// of the anchor holds every category's centroid near its own rows, so the iteration cannot
/// collapse onto the regression line.
fn parent_embedding(
    data: &Dataset,
    config: &ScorerConfig,
    block: &mut EmbeddingBlock,
    cont: &DMatrix<f64>,
) -> DMatrix<f64> {
    let n = data.n_samples();
    let mut moments: Option<(DVector<f64>, DMatrix<f64>)> = None;
    for _ in 0..config.em_iterations {
        let anchors = block.anchors(data);
        let z = match &moments {
            Some((mean, cov)) if cont.ncols() > 0 => {
                let predicted =
                    predict_from_continuous(block.dims, cont, mean, cov, config.eigen_tolerance);
                (anchors + predicted) * 0.5
            }
            _ => anchors,
        };
        block.update(data, &z);
        let refreshed = hstack(n, &[&block.anchors(data), cont]);
        moments = Some(mean_and_covariance(&refreshed));
    }
    block.anchors(data)
}

fn fit_local_model(data: &Dataset, config: &ScorerConfig, y: usize, parents: &[usize]) -> LocalScore {
    let n = data.n_samples();
    let (target, target_params) = target_representation(data, config, y);

    let (categorical, continuous): (Vec<usize>, Vec<usize>) =
        parents.iter().copied().partition(|&p| data.is_categorical(p));
    let cont = DMatrix::from_fn(n, continuous.len(), |row, k| data.value(row, continuous[k]));

    let (embedding, parent_params) = match EmbeddingBlock::new(data, &categorical) {
        Some(mut block) => {
            let embedding = parent_embedding(data, config, &mut block, &cont);
            (embedding, block.parameter_count(data))
        }
        None => (DMatrix::zeros(n, 0), 0),
    };

    let joint = hstack(n, &[&target, &embedding, &cont]);
    let (_, cov) = mean_and_covariance(&joint);
    let target_dims = target.ncols();
    let (conditional, rest_rank) =
        conditional_covariance(&cov, target_dims, config.eigen_tolerance);

    let target_scale = (0..target_dims)
        .map(|i| cov[(i, i)])
        .fold(MIN_VARIANCE, f64::max);
    let (log_det, target_rank) =
        pseudo_log_determinant(&conditional, config.eigen_tolerance * target_scale);
    let pseudo_determinant = target_rank < target_dims;

    #[cfg(feature = "tracing")]
    if pseudo_determinant {
        tracing::debug!(
            node = y,
            parents = ?parents,
            kept = target_rank,
            dims = target_dims,
            "singular conditional covariance; using pseudo-determinant"
        );
    }

    let log_likelihood =
        -0.5 * n as f64 * (log_det + target_rank as f64 * (1.0 + (2.0 * PI).ln()));
    let effective_dims = target_rank + rest_rank;
    let num_parameters =
        (effective_dims as f64 - 1.0).max(0.0) + (target_params + parent_params) as f64;
    let penalty = config.penalty_discount * 0.5 * (n as f64).ln() * num_parameters;

    LocalScore {
        log_likelihood,
        num_parameters,
        effective_dims,
        penalty,
        score: log_likelihood - penalty,
        pseudo_determinant,
    }
}
