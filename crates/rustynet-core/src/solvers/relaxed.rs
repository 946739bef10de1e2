// =============================================================================
// Relaxed (Debiased) Refit
// =============================================================================
//
// The elastic-net penalty buys sparsity at the price of shrinkage: the
// surviving coefficients are biased toward zero. The relaxed fit removes
// that bias as an explicit post-processing step — given the active set a
// penalized path point selected, solve the UNPENALIZED weighted least
// squares problem on exactly that support:
//
//     minimize over (b0, b_S)   Σ_i w_i (z_i − b0 − Σ_{j∈S} x_ij b_j)²
//
// with (z, w) the working response and weights at the penalized solution.
// This is deliberately not folded into the kernel: it runs after a path
// point converges, on the raw (caller-unit) columns, through the same
// Cholesky-then-LU route the dense solvers use.
//
// A singular restricted design (e.g. duplicated support columns) is
// reported as a LinearAlgebraError; the path driver downgrades that to a
// logged warning and an absent relaxed fit rather than aborting the path.
//
// =============================================================================

use ndarray::{Array1, Array2};

use crate::convert::{solve_symmetric, to_array1, to_dmatrix, to_dvector};
use crate::error::{Result, RustyNetError};

/// Unpenalized refit of a path point on its active support.
#[derive(Debug, Clone)]
pub struct RelaxedFit {
    /// Full-length coefficient vector, zero off the support.
    pub coefficients: Array1<f64>,
    /// Intercept (0.0 for intercept-free families).
    pub intercept: f64,
}

/// Solve the weighted least squares refit on `support`.
///
/// # Arguments
/// * `x` - Design matrix in caller units (NOT standardized)
/// * `z` - Working response at the penalized solution
/// * `w` - Working weights at the penalized solution
/// * `support` - Column indices with nonzero penalized coefficients
/// * `with_intercept` - Whether to include an unpenalized intercept
pub fn relaxed_refit(
    x: &Array2<f64>,
    z: &Array1<f64>,
    w: &Array1<f64>,
    support: &[usize],
    with_intercept: bool,
) -> Result<RelaxedFit> {
    let n = x.nrows();
    let nvars = x.ncols();
    let k = support.len() + usize::from(with_intercept);

    if k == 0 {
        // Nothing selected and no intercept: the refit is the zero fit.
        return Ok(RelaxedFit {
            coefficients: Array1::zeros(nvars),
            intercept: 0.0,
        });
    }

    // Restricted design, intercept column first. Weighted by sqrt(w) so
    // the normal equations come out as X'WX and X'Wz.
    let mut xw: Array2<f64> = Array2::zeros((n, k));
    let mut zw: Array1<f64> = Array1::zeros(n);
    for i in 0..n {
        let sw = w[i].sqrt();
        let mut c = 0;
        if with_intercept {
            xw[[i, 0]] = sw;
            c = 1;
        }
        for (offset, &j) in support.iter().enumerate() {
            xw[[i, c + offset]] = sw * x[[i, j]];
        }
        zw[i] = sw * z[i];
    }

    let xtx = to_dmatrix(&xw.t().dot(&xw));
    let xtz = to_dvector(&xw.t().dot(&zw));

    let solution = solve_symmetric(&xtx, &xtz).ok_or_else(|| {
        RustyNetError::LinearAlgebraError(format!(
            "relaxed refit on {} support column(s) is singular; \
             the support likely contains collinear columns",
            support.len()
        ))
    })?;
    let solution = to_array1(&solution);

    let mut coefficients = Array1::zeros(nvars);
    let mut intercept = 0.0;
    let mut c = 0;
    if with_intercept {
        intercept = solution[0];
        c = 1;
    }
    for (offset, &j) in support.iter().enumerate() {
        coefficients[j] = solution[c + offset];
    }

    Ok(RelaxedFit {
        coefficients,
        intercept,
    })
}

// =============================================================================
// Tests
// =============================================================================
