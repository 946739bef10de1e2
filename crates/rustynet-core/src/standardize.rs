// =============================================================================
// Column Standardization
// =============================================================================
//
// The coordinate descent kernel is calibrated for columns with weighted
// mean 0 and weighted variance 1: the penalty then bites every feature
// equally, and the Gram diagonal entries stay near 1, which keeps the
// soft-threshold updates well conditioned.
//
// This module computes the (center, scale) transform from the design
// matrix and observation weights, applies it to an internal COPY of the
// matrix (the caller's matrix is never mutated), and maps coefficients
// back to the caller's column units when the fit is done.
//
// CONVENTIONS
// -----------
// Observation weights are pre-normalized to sum to nobs, so weighted
// moments divide by n:
//
//     center_j = (1/n) Σ_i w_i x_ij
//     scale_j  = sqrt( (1/n) Σ_i w_i x_ij² − center_j² )
//
// Columns with (numerically) zero variance carry no information; they are
// flagged and the solver pins their coefficient at zero. This is not an
// error — a constant column is a data property, not a caller mistake.
//
// =============================================================================

use ndarray::{Array1, Array2};

use crate::constants::ZERO_VARIANCE_EPS;

/// The per-column transform between caller units and kernel units.
#[derive(Debug, Clone)]
pub struct Standardization {
    /// Weighted column means.
    pub centers: Array1<f64>,

    /// Weighted column standard deviations (1.0 where standardization is
    /// disabled or the column is constant).
    pub scales: Array1<f64>,

    /// Columns flagged as constant under the given weights.
    pub excluded: Vec<bool>,
}

impl Standardization {
    /// Compute centers/scales from the design matrix and normalized weights.
    ///
    /// # Arguments
    /// * `x` - Design matrix, nobs × nvars (caller units; not mutated)
    /// * `weights` - Observation weights, already normalized to sum to nobs
    /// * `standardize` - When false, scales stay at 1.0 but centers are
    ///   still computed (the intercept math needs them); zero-variance
    ///   detection happens either way.
    pub fn weighted(x: &Array2<f64>, weights: &Array1<f64>, standardize: bool) -> Self {
        let n = x.nrows() as f64;
        let nvars = x.ncols();

        let mut centers = Array1::zeros(nvars);
        let mut scales = Array1::from_elem(nvars, 1.0);
        let mut excluded = vec![false; nvars];

        for j in 0..nvars {
            let col = x.column(j);
            let mut mean = 0.0;
            let mut mean_sq = 0.0;
            for (xi, wi) in col.iter().zip(weights.iter()) {
                mean += wi * xi;
                mean_sq += wi * xi * xi;
            }
            mean /= n;
            mean_sq /= n;

            let variance = (mean_sq - mean * mean).max(0.0);
            centers[j] = mean;

            if variance < ZERO_VARIANCE_EPS {
                excluded[j] = true;
                scales[j] = 1.0;
            } else if standardize {
                scales[j] = variance.sqrt();
            }
        }

        Self {
            centers,
            scales,
            excluded,
        }
    }

    /// Materialize the standardized copy of the design matrix the kernel
    /// iterates over: xs_ij = (x_ij − center_j) / scale_j.
    ///
    /// Excluded (constant) columns come out as all zeros, which makes any
    /// accidental update of them a no-op on the residual.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut xs = x.to_owned();
        for (j, mut col) in xs.columns_mut().into_iter().enumerate() {
            let c = self.centers[j];
            let s = self.scales[j];
            col.mapv_inplace(|v| (v - c) / s);
        }
        xs
    }

    /// Map kernel-space coefficients back to caller units.
    ///
    /// Returns the raw coefficient vector and the intercept shift
    /// Σ_j raw_j · center_j that the caller subtracts from the kernel
    /// intercept. Predictions are preserved exactly:
    ///
    ///     b0 + Σ β_j (x_ij − c_j)/s_j  =  (b0 − Σ raw_j c_j) + Σ raw_j x_ij
    pub fn unscale(&self, beta: &Array1<f64>) -> (Array1<f64>, f64) {
        let mut raw = beta.clone();
        let mut shift = 0.0;
        for j in 0..raw.len() {
            raw[j] /= self.scales[j];
            shift += raw[j] * self.centers[j];
        }
        (raw, shift)
    }

    /// Indices of the columns flagged as constant.
    pub fn excluded_indices(&self) -> Vec<usize> {
        self.excluded
            .iter()
            .enumerate()
            .filter_map(|(j, &e)| if e { Some(j) } else { None })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn uniform_weights(n: usize) -> Array1<f64> {
        Array1::from_elem(n, 1.0)
    }

    #[test]
    fn test_unweighted_moments() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0]];
        let w = uniform_weights(4);
        let std = Standardization::weighted(&x, &w, true);

        assert_abs_diff_eq!(std.centers[0], 2.5, epsilon = 1e-12);
        // Population (1/n) standard deviation of {1,2,3,4}
        assert_abs_diff_eq!(std.scales[0], 1.25f64.sqrt(), epsilon = 1e-12);

        // Constant column: flagged, scale left at 1.0
        assert!(std.excluded[1]);
        assert!(!std.excluded[0]);
        assert_abs_diff_eq!(std.scales[1], 1.0, epsilon = 1e-12);
        assert_eq!(std.excluded_indices(), vec![1]);
    }

    #[test]
    fn test_weighted_center() {
        // All the weight on the first two rows: the center must ignore row 3.
        let x = array![[1.0], [3.0], [100.0]];
        let w = array![1.5, 1.5, 0.0];
        let std = Standardization::weighted(&x, &w, true);
        assert_abs_diff_eq!(std.centers[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_standardizes() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let w = uniform_weights(3);
        let std = Standardization::weighted(&x, &w, true);
        let xs = std.transform(&x);

        // Standardized column has weighted mean 0 and variance 1
        let n = 3.0;
        let mean: f64 = xs.column(0).sum() / n;
        let var: f64 = xs.column(0).iter().map(|v| v * v).sum::<f64>() / n;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);

        // Excluded column becomes identically zero
        assert!(xs.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_unscale_roundtrip_predictions() {
        let x = array![[1.0, -2.0], [2.0, 0.5], [3.0, 1.0], [4.0, -1.5]];
        let w = uniform_weights(4);
        let std = Standardization::weighted(&x, &w, true);
        let xs = std.transform(&x);

        let beta = array![0.7, -0.3];
        let b0 = 1.2;
        let (raw, shift) = std.unscale(&beta);
        let raw_intercept = b0 - shift;

        // Predictions in kernel space and caller space must agree exactly.
        for i in 0..4 {
            let pred_std = b0 + xs.row(i).dot(&beta);
            let pred_raw = raw_intercept + x.row(i).dot(&raw);
            assert_abs_diff_eq!(pred_std, pred_raw, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_no_standardize_keeps_unit_scale() {
        let x = array![[1.0], [2.0], [9.0]];
        let w = uniform_weights(3);
        let std = Standardization::weighted(&x, &w, false);
        assert_abs_diff_eq!(std.scales[0], 1.0, epsilon = 1e-12);
        // Centers are still real means: intercept handling relies on them.
        assert_abs_diff_eq!(std.centers[0], 4.0, epsilon = 1e-12);
    }
}
