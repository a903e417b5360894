//! Numeric kernels for the Gaussian part of the local score.
//!
//! Dense `nalgebra` routines over small joint covariance matrices (a handful of dimensions per
//! local model). Rank deficiency is an expected case here: every kernel that inverts or takes
//! a determinant works on the spectrum and reports how many eigenvalues it kept.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Variances at or below this are treated as exactly zero before rescaling.
const MIN_VARIANCE: f64 = 1e-300;

/// Equivalence epsilon for kernel-vs-reference numerical checks.
pub const KERNEL_EQUIVALENCE_EPSILON: f64 = 1e-9;

/// Column means and maximum-likelihood covariance (divisor `N`) of an `N × d` sample matrix.
pub fn mean_and_covariance(samples: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let (n, d) = samples.shape();
    if n == 0 {
        return (DVector::zeros(d), DMatrix::zeros(d, d));
    }
    let inv_n = 1.0 / n as f64;
    let mean = DVector::from_fn(d, |j, _| samples.column(j).sum() * inv_n);
    let centered = DMatrix::from_fn(n, d, |i, j| samples[(i, j)] - mean[j]);
    let covariance = (centered.transpose() * &centered) * inv_n;
    (mean, symmetrize(covariance))
}

/// Generalised inverse of a covariance matrix computed on its correlation scale.
///
/// Dimensions with zero variance are dropped, the rest are rescaled to unit variance, and
/// eigenvalues of the correlation matrix at or below `tolerance` are discarded. Returns the
/// inverse (in the original scale) and the number of eigenvalues kept.
pub fn scaled_pseudo_inverse(covariance: &DMatrix<f64>, tolerance: f64) -> (DMatrix<f64>, usize) {
    let d = covariance.nrows();
    if d == 0 {
        return (DMatrix::zeros(0, 0), 0);
    }
    let scale: Vec<f64> = (0..d)
        .map(|i| {
            let var = covariance[(i, i)];
            if var > MIN_VARIANCE {
                1.0 / var.sqrt()
            } else {
                0.0
            }
        })
        .collect();
    let correlation = DMatrix::from_fn(d, d, |i, j| covariance[(i, j)] * scale[i] * scale[j]);
    let eigen = SymmetricEigen::new(symmetrize(correlation));

    let mut inverse = DMatrix::zeros(d, d);
    let mut rank = 0;
    for (k, &lambda) in eigen.eigenvalues.iter().enumerate() {
        if lambda <= tolerance {
            continue;
        }
        rank += 1;
        let v = eigen.eigenvectors.column(k);
        inverse += (v * v.transpose()) / lambda;
    }
    let rescaled = DMatrix::from_fn(d, d, |i, j| inverse[(i, j)] * scale[i] * scale[j]);
    (rescaled, rank)
}

/// Conditional covariance of the leading `n_target` dimensions given the rest.
///
/// Computes the Schur complement `S_yy - S_yr S_rr^+ S_ry` with the generalised inverse of
/// [`scaled_pseudo_inverse`]. Returns the conditional covariance and the rank kept for `S_rr`.
pub fn conditional_covariance(
    covariance: &DMatrix<f64>,
    n_target: usize,
    tolerance: f64,
) -> (DMatrix<f64>, usize) {
    let d = covariance.nrows();
    let n_rest = d - n_target;
    let s_yy = covariance.view((0, 0), (n_target, n_target)).into_owned();
    if n_rest == 0 {
        return (s_yy, 0);
    }
    let s_yr = covariance.view((0, n_target), (n_target, n_rest)).into_owned();
    let s_rr = covariance.view((n_target, n_target), (n_rest, n_rest)).into_owned();
    let (s_rr_inv, rest_rank) = scaled_pseudo_inverse(&s_rr, tolerance);
    let explained = &s_yr * s_rr_inv * s_yr.transpose();
    (symmetrize(s_yy - explained), rest_rank)
}

/// Log of the product of eigenvalues above `threshold`, and how many there were.
///
/// Equals `ln det` for a well-conditioned matrix; for a singular one it is the log
/// pseudo-determinant.
pub fn pseudo_log_determinant(matrix: &DMatrix<f64>, threshold: f64) -> (f64, usize) {
    if matrix.nrows() == 0 {
        return (0.0, 0);
    }
    let eigen = SymmetricEigen::new(symmetrize(matrix.clone()));
    eigen
        .eigenvalues
        .iter()
        .filter(|&&lambda| lambda > threshold)
        .fold((0.0, 0), |(log_det, rank), &lambda| (log_det + lambda.ln(), rank + 1))
}

/// Normalises `logits` in place into probabilities.
pub fn softmax_in_place(logits: &mut [f64]) {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        let uniform = 1.0 / logits.len().max(1) as f64;
        logits.iter_mut().for_each(|v| *v = uniform);
        return;
    }
    let mut total = 0.0;
    for v in logits.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    for v in logits.iter_mut() {
        *v /= total;
    }
}

fn symmetrize(matrix: DMatrix<f64>) -> DMatrix<f64> {
    (&matrix + matrix.transpose()) * 0.5
}
