// =============================================================================
// Family Entry Points
// =============================================================================
//
// The six exposed operations, one per model family:
//
//   elnet    Gaussian                      y: nobs vector
//   lognet   binomial (logistic)           y: nobs vector of 0/1
//   fishnet  Poisson                       y: nobs vector of counts
//   multnet  multinomial                   y: nobs × K class indicators
//   mrelnet  multi-response Gaussian       y: nobs × K matrix
//   coxnet   Cox proportional hazards      (time, status): two nobs vectors
//
// Every entry point validates shapes and ranges BEFORE any numeric work:
// a malformed call fails fast with a descriptive error and no partial
// output. Everything discovered after validation (non-convergence,
// degeneracy, early stops) is reported on the returned path, not as an
// error.
//
// =============================================================================

use ndarray::{Array1, Array2};

use crate::error::{Result, RustyNetError};
use crate::families::{BinomialNet, CoxNet, GaussianNet, PoissonNet};
use crate::solvers::{
    fit_multigaussian_path, fit_multinomial_path, fit_single_path, ElasticNetPath,
    MultiResponsePath, PathOptions,
};

// =============================================================================
// Validation
// =============================================================================

fn validate_design(x: &Array2<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(RustyNetError::EmptyInput("X has no rows".to_string()));
    }
    if x.ncols() == 0 {
        return Err(RustyNetError::EmptyInput("X has no columns".to_string()));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(RustyNetError::InvalidValue(
            "X contains non-finite entries".to_string(),
        ));
    }
    Ok(())
}

fn validate_response_len(x: &Array2<f64>, len: usize, what: &str) -> Result<()> {
    if x.nrows() != len {
        return Err(RustyNetError::DimensionMismatch(format!(
            "X has {} rows but {} has {} elements",
            x.nrows(),
            what,
            len
        )));
    }
    Ok(())
}

fn validate_options(x: &Array2<f64>, opts: &PathOptions) -> Result<()> {
    if !(0.0..=1.0).contains(&opts.alpha) || !opts.alpha.is_finite() {
        return Err(RustyNetError::InvalidValue(format!(
            "alpha must be in [0, 1], got {}",
            opts.alpha
        )));
    }
    if !(opts.tol > 0.0) {
        return Err(RustyNetError::InvalidValue(format!(
            "tol must be positive, got {}",
            opts.tol
        )));
    }
    if opts.max_iter == 0 {
        return Err(RustyNetError::InvalidValue(
            "max_iter must be positive".to_string(),
        ));
    }
    if opts.nlambda == 0 {
        return Err(RustyNetError::InvalidValue(
            "nlambda must be positive".to_string(),
        ));
    }
    if let Some(ratio) = opts.lambda_min_ratio {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(RustyNetError::InvalidValue(format!(
                "lambda_min_ratio must be in (0, 1), got {}",
                ratio
            )));
        }
    }
    if let Some(seq) = &opts.lambda_sequence {
        if seq.is_empty() {
            return Err(RustyNetError::EmptyInput(
                "lambda sequence is empty".to_string(),
            ));
        }
        if seq.iter().any(|l| !(l.is_finite() && *l > 0.0)) {
            return Err(RustyNetError::InvalidValue(
                "lambda sequence must be positive and finite".to_string(),
            ));
        }
        if seq.windows(2).any(|w| w[1] >= w[0]) {
            return Err(RustyNetError::InvalidValue(
                "lambda sequence must be strictly decreasing".to_string(),
            ));
        }
    }
    if let Some(w) = &opts.weights {
        if w.len() != x.nrows() {
            return Err(RustyNetError::DimensionMismatch(format!(
                "weights has {} elements but X has {} rows",
                w.len(),
                x.nrows()
            )));
        }
        if w.iter().any(|wi| !wi.is_finite() || *wi < 0.0) {
            return Err(RustyNetError::InvalidValue(
                "weights must be non-negative and finite".to_string(),
            ));
        }
        if !(w.sum() > 0.0) {
            return Err(RustyNetError::InvalidValue(
                "weights must not all be zero".to_string(),
            ));
        }
    }
    Ok(())
}

// =============================================================================
// Entry points
// =============================================================================

/// Gaussian elastic-net path: squared-error loss, identity link.
///
/// # Arguments
/// * `x` - Design matrix, nobs × nvars
/// * `y` - Response vector, length nobs
/// * `options` - Path configuration (see [`PathOptions`])
///
/// # Returns
/// One [`crate::solvers::PathPoint`] per λ, largest λ first, with
/// per-point convergence flags and deviance values.
pub fn elnet(x: &Array2<f64>, y: &Array1<f64>, options: &PathOptions) -> Result<ElasticNetPath> {
    validate_design(x)?;
    validate_response_len(x, y.len(), "y")?;
    validate_options(x, options)?;
    if y.iter().any(|v| !v.is_finite()) {
        return Err(RustyNetError::InvalidValue(
            "y contains non-finite entries".to_string(),
        ));
    }
    fit_single_path(x, y, &GaussianNet, options)
}

/// Binomial (logistic) elastic-net path. `y` must be 0/1.
pub fn lognet(x: &Array2<f64>, y: &Array1<f64>, options: &PathOptions) -> Result<ElasticNetPath> {
    validate_design(x)?;
    validate_response_len(x, y.len(), "y")?;
    validate_options(x, options)?;
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(RustyNetError::InvalidValue(
            "binomial response must be 0 or 1".to_string(),
        ));
    }
    fit_single_path(x, y, &BinomialNet, options)
}

/// Poisson elastic-net path. `y` must be non-negative counts.
pub fn fishnet(x: &Array2<f64>, y: &Array1<f64>, options: &PathOptions) -> Result<ElasticNetPath> {
    validate_design(x)?;
    validate_response_len(x, y.len(), "y")?;
    validate_options(x, options)?;
    if y.iter().any(|&v| !v.is_finite() || v < 0.0) {
        return Err(RustyNetError::InvalidValue(
            "Poisson response must be non-negative and finite".to_string(),
        ));
    }
    fit_single_path(x, y, &PoissonNet, options)
}

/// Multinomial elastic-net path. `y` is an nobs × K indicator (or
/// fractional class-membership) matrix with at least two classes; rows
/// must be non-negative and not all zero.
pub fn multnet(x: &Array2<f64>, y: &Array2<f64>, options: &PathOptions) -> Result<MultiResponsePath> {
    validate_design(x)?;
    validate_response_len(x, y.nrows(), "y")?;
    validate_options(x, options)?;
    if y.ncols() < 2 {
        return Err(RustyNetError::InvalidValue(format!(
            "multinomial response needs at least 2 classes, got {}",
            y.ncols()
        )));
    }
    if y.iter().any(|&v| !v.is_finite() || v < 0.0) {
        return Err(RustyNetError::InvalidValue(
            "multinomial response must be non-negative and finite".to_string(),
        ));
    }
    for (i, row) in y.rows().into_iter().enumerate() {
        if !(row.sum() > 0.0) {
            return Err(RustyNetError::InvalidValue(format!(
                "multinomial response row {} has no class membership",
                i
            )));
        }
    }
    fit_multinomial_path(x, y, options)
}

/// Multi-response Gaussian elastic-net path. The K response columns are
/// fit as uncoupled Gaussian problems over one shared λ sequence.
pub fn mrelnet(x: &Array2<f64>, y: &Array2<f64>, options: &PathOptions) -> Result<MultiResponsePath> {
    validate_design(x)?;
    validate_response_len(x, y.nrows(), "y")?;
    validate_options(x, options)?;
    if y.ncols() == 0 {
        return Err(RustyNetError::EmptyInput(
            "response matrix has no columns".to_string(),
        ));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(RustyNetError::InvalidValue(
            "y contains non-finite entries".to_string(),
        ));
    }
    fit_multigaussian_path(x, y, options)
}

/// Cox proportional-hazards elastic-net path over right-censored
/// (time, status) survival data; status 1 = event, 0 = censored. Tie
/// handling follows `options.ties` (Efron by default).
pub fn coxnet(
    x: &Array2<f64>,
    time: &Array1<f64>,
    status: &Array1<f64>,
    options: &PathOptions,
) -> Result<ElasticNetPath> {
    validate_design(x)?;
    validate_response_len(x, time.len(), "time")?;
    validate_response_len(x, status.len(), "status")?;
    validate_options(x, options)?;
    let family = CoxNet::new(time.clone(), status.clone(), options.ties)?;
    fit_single_path(x, status, &family, options)
}

// =============================================================================
// Tests
// =============================================================================
