// =============================================================================
// Regularization Path Driver
// =============================================================================
//
// Fits the whole decreasing sequence of penalties λ_0 > λ_1 > ... in one
// call. Warm starting is what makes this cheap: the solution at λ_k is an
// excellent initial iterate at λ_{k+1}, so each point costs a handful of
// sweeps instead of a cold solve. The coefficient buffer, linear
// predictor, and residual are allocated once and mutated in place across
// the entire path — never reallocated, never shared outside the fit.
//
// Per path point, the nested structure is:
//
//   outer IRLS pass (family linearization, skipped for Gaussian)
//     screen → solve → verify → expand   (active set + KKT loop)
//       coordinate sweeps on the frozen quadratic (the kernel)
//
// Early termination of the PATH (deviance saturation, degeneracy,
// deadline) is a normal recorded outcome. Non-convergence of a POINT is a
// per-point flag. Neither is an error.
//
// =============================================================================

use std::time::{Duration, Instant};

use ndarray::{Array1, Array2};

use crate::constants::{
    ALPHA_FLOOR, DEV_GAIN_FLOOR, DEV_RATIO_CEILING, MAX_KKT_ROUNDS,
};
use crate::error::{Result, RustyNetError};
use crate::families::{Degeneracy, Family, MultinomialWorkspace, TieMethod};
use crate::solvers::active_set::ActiveSet;
use crate::solvers::convergence::{ConvergenceMonitor, OuterStatus};
use crate::solvers::coordinate_descent::{
    gradients, gram_diagonal, reset_residual, solve_on_active,
};
use crate::solvers::relaxed::{relaxed_refit, RelaxedFit};
use crate::standardize::Standardization;

// =============================================================================
// Configuration
// =============================================================================

/// Options shared by all six family entry points.
///
/// The defaults mirror the conventional ones: a 100-point automatic
/// sequence, tolerance 1e-7, standardized columns, Efron ties.
#[derive(Debug, Clone)]
pub struct PathOptions {
    /// Elastic-net mixing: 1.0 = pure lasso, 0.0 = pure ridge.
    pub alpha: f64,

    /// Observation weights (None = uniform). Normalized internally to
    /// sum to nobs; individual zeros are allowed and drop the row from
    /// every inner product.
    pub weights: Option<Array1<f64>>,

    /// Number of points in the automatic λ sequence.
    pub nlambda: usize,

    /// Smallest λ as a fraction of the computed λ_max. None picks the
    /// conventional default: 1e-4 when nobs > nvars, 1e-2 otherwise.
    pub lambda_min_ratio: Option<f64>,

    /// Explicit λ sequence (strictly decreasing, all positive). Overrides
    /// `nlambda` / `lambda_min_ratio`.
    pub lambda_sequence: Option<Vec<f64>>,

    /// Budget of coordinate sweeps per path point.
    pub max_iter: usize,

    /// Ceiling on outer IRLS passes per path point (non-Gaussian
    /// families).
    pub max_outer_passes: usize,

    /// Convergence tolerance on coefficient moves and relative deviance
    /// change.
    pub tol: f64,

    /// Standardize columns to weighted unit variance internally. Output
    /// coefficients are always in caller units either way.
    pub standardize: bool,

    /// Run the unpenalized refit on each point's active set.
    pub relax: bool,

    /// Tie handling for the Cox partial likelihood.
    pub ties: TieMethod,

    /// Cooperative cancellation: give up (recording an early stop) once
    /// this much wall time has elapsed. Checked once per outer pass.
    pub deadline: Option<Duration>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            weights: None,
            nlambda: 100,
            lambda_min_ratio: None,
            lambda_sequence: None,
            max_iter: 100_000,
            max_outer_passes: 25,
            tol: 1e-7,
            standardize: true,
            relax: false,
            ties: TieMethod::default(),
            deadline: None,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Why a path stopped before exhausting its λ sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStop {
    /// Fraction of deviance explained reached its ceiling.
    DevianceSaturated,
    /// Additional path points stopped improving the fit.
    MinimalGain,
    /// A family degeneracy (e.g. separation) was detected.
    Degenerate,
    /// The caller's deadline elapsed.
    DeadlineExceeded,
}

/// The solution at one penalty value.
#[derive(Debug, Clone)]
pub struct PathPoint {
    pub lambda: f64,
    /// Coefficients in caller units (length nvars).
    pub coefficients: Array1<f64>,
    /// Intercept in caller units (0.0 for intercept-free families).
    pub intercept: f64,
    pub deviance: f64,
    /// Fraction of null deviance explained, 1 − dev/null_dev.
    pub dev_ratio: f64,
    /// False when the iteration budget ran out first; the coefficients
    /// are still the best iterate found.
    pub converged: bool,
    pub degeneracy: Option<Degeneracy>,
    /// Coordinate sweeps spent on this point.
    pub passes: usize,
    /// Unpenalized refit on this point's support (when requested and
    /// solvable).
    pub relaxed: Option<RelaxedFit>,
}

/// A fitted single-response path, one entry per λ, in decreasing-λ order.
#[derive(Debug, Clone)]
pub struct ElasticNetPath {
    pub family: &'static str,
    pub points: Vec<PathPoint>,
    pub null_deviance: f64,
    pub early_stop: Option<EarlyStop>,
    /// Zero-variance columns excluded from the fit (coefficients pinned
    /// at zero).
    pub excluded_columns: Vec<usize>,
    pub total_passes: usize,
}

impl ElasticNetPath {
    pub fn lambdas(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.lambda).collect()
    }

    /// Number of nonzero coefficients at a path point.
    pub fn n_nonzero(&self, index: usize) -> usize {
        self.points[index]
            .coefficients
            .iter()
            .filter(|&&b| b != 0.0)
            .count()
    }

    /// Fill a caller-provided buffer with the coefficients at one path
    /// point — the original array-output contract of the boundary.
    pub fn write_coefficients(&self, index: usize, out: &mut Array1<f64>) -> Result<()> {
        let point = self.points.get(index).ok_or_else(|| {
            RustyNetError::InvalidValue(format!(
                "path point {} requested but only {} were fitted",
                index,
                self.points.len()
            ))
        })?;
        if out.len() != point.coefficients.len() {
            return Err(RustyNetError::DimensionMismatch(format!(
                "coefficient buffer has {} elements but the fit has {} variables",
                out.len(),
                point.coefficients.len()
            )));
        }
        out.assign(&point.coefficients);
        Ok(())
    }
}

/// Relaxed refit for a multi-output point (one column per class/response).
#[derive(Debug, Clone)]
pub struct MultiRelaxedFit {
    pub coefficients: Array2<f64>,
    pub intercepts: Array1<f64>,
}

/// The solution at one penalty value for a multi-output family.
#[derive(Debug, Clone)]
pub struct MultiPathPoint {
    pub lambda: f64,
    /// nvars × K coefficient matrix in caller units.
    pub coefficients: Array2<f64>,
    /// K intercepts.
    pub intercepts: Array1<f64>,
    pub deviance: f64,
    pub dev_ratio: f64,
    pub converged: bool,
    pub degeneracy: Option<Degeneracy>,
    pub passes: usize,
    pub relaxed: Option<MultiRelaxedFit>,
}

/// A fitted multi-output path (multinomial, multi-response Gaussian).
#[derive(Debug, Clone)]
pub struct MultiResponsePath {
    pub family: &'static str,
    pub points: Vec<MultiPathPoint>,
    pub null_deviance: f64,
    pub early_stop: Option<EarlyStop>,
    pub excluded_columns: Vec<usize>,
    pub total_passes: usize,
}

impl MultiResponsePath {
    pub fn lambdas(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.lambda).collect()
    }

    /// Fill a caller-provided nvars × K buffer with the coefficients at
    /// one path point.
    pub fn write_coefficients(&self, index: usize, out: &mut Array2<f64>) -> Result<()> {
        let point = self.points.get(index).ok_or_else(|| {
            RustyNetError::InvalidValue(format!(
                "path point {} requested but only {} were fitted",
                index,
                self.points.len()
            ))
        })?;
        if out.dim() != point.coefficients.dim() {
            return Err(RustyNetError::DimensionMismatch(format!(
                "coefficient buffer is {:?} but the fit is {:?}",
                out.dim(),
                point.coefficients.dim()
            )));
        }
        out.assign(&point.coefficients);
        Ok(())
    }
}

// =============================================================================
// Lambda sequence
// =============================================================================

/// Normalize observation weights to sum to nobs.
pub(crate) fn normalize_weights(weights: Option<&Array1<f64>>, nobs: usize) -> Array1<f64> {
    match weights {
        Some(w) => {
            let total: f64 = w.sum();
            w.mapv(|wi| wi * nobs as f64 / total)
        }
        None => Array1::from_elem(nobs, 1.0),
    }
}

fn default_lambda_min_ratio(nobs: usize, nvars: usize) -> f64 {
    if nobs > nvars {
        1e-4
    } else {
        1e-2
    }
}

/// Log-spaced sequence from lambda_max down to lambda_max * ratio.
fn geometric_sequence(lambda_max: f64, nlambda: usize, ratio: f64) -> Vec<f64> {
    if nlambda <= 1 {
        return vec![lambda_max];
    }
    let log_max = lambda_max.ln();
    let log_min = (lambda_max * ratio).ln();
    (0..nlambda)
        .map(|i| {
            let t = i as f64 / (nlambda - 1) as f64;
            (log_max + t * (log_min - log_max)).exp()
        })
        .collect()
}

fn resolve_lambda_sequence(
    opts: &PathOptions,
    forced: Option<&[f64]>,
    lambda_max: f64,
    nobs: usize,
    nvars: usize,
) -> Vec<f64> {
    if let Some(seq) = forced {
        return seq.to_vec();
    }
    if let Some(seq) = &opts.lambda_sequence {
        return seq.clone();
    }
    let ratio = opts
        .lambda_min_ratio
        .unwrap_or_else(|| default_lambda_min_ratio(nobs, nvars));
    geometric_sequence(lambda_max, opts.nlambda, ratio)
}

// =============================================================================
// Single-response driver
// =============================================================================

/// Fit a full path for a single-response family (Gaussian, binomial,
/// Poisson, Cox). `y` is the response vector — for Cox, the status
/// vector, with the ranked times owned by the family adapter.
pub(crate) fn fit_single_path(
    x: &Array2<f64>,
    y: &Array1<f64>,
    family: &dyn Family,
    opts: &PathOptions,
) -> Result<ElasticNetPath> {
    fit_single_path_impl(x, y, family, opts, None, true)
}

/// The worker behind [`fit_single_path`]. `forced_lambdas` and
/// `allow_early_stop` exist for the multi-response Gaussian driver, which
/// fits every column over one shared sequence and needs the per-column
/// paths to stay aligned.
pub(crate) fn fit_single_path_impl(
    x: &Array2<f64>,
    y: &Array1<f64>,
    family: &dyn Family,
    opts: &PathOptions,
    forced_lambdas: Option<&[f64]>,
    allow_early_stop: bool,
) -> Result<ElasticNetPath> {
    let nobs = x.nrows();
    let nvars = x.ncols();
    let alpha = opts.alpha;
    let with_intercept = family.has_intercept();
    let started = Instant::now();

    let w_obs = normalize_weights(opts.weights.as_ref(), nobs);
    let std = Standardization::weighted(x, &w_obs, opts.standardize);
    let xs = std.transform(x);

    // Warm-start state: allocated once, threaded through every λ.
    let mut beta: Array1<f64> = Array1::zeros(nvars);
    let mut b0 = if with_intercept {
        family.null_eta(y, &w_obs)
    } else {
        0.0
    };
    let mut eta = Array1::from_elem(nobs, b0);
    let mut z = Array1::zeros(nobs);
    let mut wk = Array1::zeros(nobs);
    let mut residual = Array1::zeros(nobs);
    let mut grad = Array1::zeros(nvars);

    let null_deviance = family.deviance(y, &eta, &w_obs);

    // Gradient of the null model gives λ_max: the smallest penalty at
    // which every coefficient is exactly zero.
    family.linearize(y, &eta, &w_obs, &mut z, &mut wk);
    residual.assign(&z);
    residual.mapv_inplace(|r| r - b0);
    gradients(&xs, &wk, &residual, &mut grad);

    let mut lambda_max = 0.0f64;
    for (j, g) in grad.iter().enumerate() {
        if !std.excluded[j] {
            lambda_max = lambda_max.max(g.abs());
        }
    }
    lambda_max /= alpha.max(ALPHA_FLOOR);
    if !(lambda_max > 0.0) {
        // Constant response: every penalty yields the null model.
        lambda_max = 1.0;
    }

    let lambdas = resolve_lambda_sequence(opts, forced_lambdas, lambda_max, nobs, nvars);

    let mut active = ActiveSet::new(nvars, std.excluded.clone());
    let mut points: Vec<PathPoint> = Vec::with_capacity(lambdas.len());
    let mut early_stop = None;
    let mut total_passes = 0usize;
    let mut lambda_prev = lambda_max;

    'path: for (k, &lambda) in lambdas.iter().enumerate() {
        active.screen(&grad, alpha, lambda, lambda_prev);
        active.retain_support(&beta);

        let mut monitor = ConvergenceMonitor::new(opts.tol, opts.max_outer_passes);
        let mut budget = opts.max_iter;
        let mut point_passes = 0usize;
        let mut point_converged = true;
        let mut deadline_hit = false;
        let mut deviance;

        loop {
            // Cooperative cancellation: once per outer pass, never per
            // coordinate.
            if let Some(limit) = opts.deadline {
                if started.elapsed() >= limit {
                    deadline_hit = true;
                    point_converged = false;
                    deviance = family.deviance(y, &eta, &w_obs);
                    break;
                }
            }

            // Refresh the quadratic approximation at the current η, then
            // freeze it for the inner solve.
            family.linearize(y, &eta, &w_obs, &mut z, &mut wk);
            let xv = gram_diagonal(&xs, &wk);
            reset_residual(&xs, &z, &beta, b0, active.indices(), &mut residual);

            // screen → solve → verify → expand until the KKT conditions
            // hold over the FULL coefficient set.
            let mut rounds = 0usize;
            let outcome = loop {
                let out = solve_on_active(
                    &xs,
                    &wk,
                    &xv,
                    active.indices(),
                    lambda,
                    alpha,
                    opts.tol,
                    budget.max(1),
                    with_intercept,
                    &mut beta,
                    &mut b0,
                    &mut residual,
                );
                point_passes += out.passes;
                budget = budget.saturating_sub(out.passes);

                gradients(&xs, &wk, &residual, &mut grad);
                let violators = active.kkt_violations(&grad, alpha, lambda);
                if violators.is_empty() {
                    break out;
                }
                for j in violators {
                    active.admit(j);
                }
                rounds += 1;
                if rounds > MAX_KKT_ROUNDS {
                    return Err(RustyNetError::KktInstability {
                        lambda_index: k,
                        lambda,
                        rounds,
                    });
                }
                if budget == 0 {
                    break out;
                }
            };

            if !outcome.converged || budget == 0 {
                point_converged = false;
            }

            // The residual is maintained exactly, so η falls out for free.
            for i in 0..nobs {
                eta[i] = z[i] - residual[i];
            }
            deviance = family.deviance(y, &eta, &w_obs);

            if !family.needs_irls() {
                break;
            }
            match monitor.record(deviance, outcome.max_delta) {
                OuterStatus::Converged => break,
                OuterStatus::Exhausted => {
                    point_converged = false;
                    break;
                }
                OuterStatus::Continue => {}
            }
        }

        total_passes += point_passes;
        let degeneracy = family.check_degeneracy(y, &eta, &w_obs);
        let dev_ratio = if null_deviance.abs() > 0.0 {
            1.0 - deviance / null_deviance
        } else {
            0.0
        };

        let (coefficients, shift) = std.unscale(&beta);
        let intercept = if with_intercept { b0 - shift } else { 0.0 };

        let relaxed = if opts.relax {
            let support: Vec<usize> = coefficients
                .iter()
                .enumerate()
                .filter_map(|(j, &b)| if b != 0.0 { Some(j) } else { None })
                .collect();
            match relaxed_refit(x, &z, &wk, &support, with_intercept) {
                Ok(fit) => Some(fit),
                Err(err) => {
                    log::warn!(
                        "relaxed refit skipped at lambda {:.4e}: {}",
                        lambda,
                        err
                    );
                    None
                }
            }
        } else {
            None
        };

        if !point_converged {
            log::warn!(
                "{} path point {} (lambda = {:.4e}) did not converge within budget",
                family.name(),
                k,
                lambda
            );
        }
        log::debug!(
            "{} lambda[{}] = {:.4e}: {} active, dev_ratio = {:.4}, {} passes",
            family.name(),
            k,
            lambda,
            active.len(),
            dev_ratio,
            point_passes
        );

        let prev_ratio = points.last().map(|p: &PathPoint| p.dev_ratio);
        points.push(PathPoint {
            lambda,
            coefficients,
            intercept,
            deviance,
            dev_ratio,
            converged: point_converged,
            degeneracy,
            passes: point_passes,
            relaxed,
        });
        lambda_prev = lambda;

        if allow_early_stop {
            if let Some(d) = degeneracy {
                log::warn!(
                    "{} path halted early at lambda {:.4e}: {:?}",
                    family.name(),
                    lambda,
                    d
                );
                early_stop = Some(EarlyStop::Degenerate);
                break 'path;
            }
            if dev_ratio > DEV_RATIO_CEILING {
                early_stop = Some(EarlyStop::DevianceSaturated);
                break 'path;
            }
            if let Some(prev) = prev_ratio {
                if dev_ratio - prev < DEV_GAIN_FLOOR * dev_ratio {
                    early_stop = Some(EarlyStop::MinimalGain);
                    break 'path;
                }
            }
        }
        if deadline_hit {
            early_stop = Some(EarlyStop::DeadlineExceeded);
            break 'path;
        }
    }

    Ok(ElasticNetPath {
        family: family.name(),
        points,
        null_deviance,
        early_stop,
        excluded_columns: std.excluded_indices(),
        total_passes,
    })
}

// =============================================================================
// Multinomial driver
// =============================================================================

/// Fit a multinomial path: K classes under a symmetric softmax link,
/// one shared active set, per-class coordinate solves on each outer
/// pass's frozen probabilities.
pub(crate) fn fit_multinomial_path(
    x: &Array2<f64>,
    y: &Array2<f64>,
    opts: &PathOptions,
) -> Result<MultiResponsePath> {
    let nobs = x.nrows();
    let nvars = x.ncols();
    let nclass = y.ncols();
    let alpha = opts.alpha;
    let started = Instant::now();

    let w_obs = normalize_weights(opts.weights.as_ref(), nobs);
    let std = Standardization::weighted(x, &w_obs, opts.standardize);
    let xs = std.transform(x);

    let mut ws = MultinomialWorkspace::new(nobs, nclass);

    // Warm-start state: per-class coefficient vectors and intercepts.
    let mut betas: Vec<Array1<f64>> = vec![Array1::zeros(nvars); nclass];
    let mut b0 = MultinomialWorkspace::null_intercepts(y, &w_obs);
    let mut eta = Array2::zeros((nobs, nclass));
    for k in 0..nclass {
        eta.column_mut(k).fill(b0[k]);
    }
    let mut z = Array1::zeros(nobs);
    let mut wk = Array1::zeros(nobs);
    let mut residual = Array1::zeros(nobs);
    let mut class_grad = Array1::zeros(nvars);
    // Max-over-classes gradient magnitude, the screening statistic.
    let mut grad_max = Array1::<f64>::zeros(nvars);

    ws.update_probabilities(&eta);
    let null_deviance = ws.deviance(y, &w_obs);

    // λ_max from the largest per-class null gradient.
    let mut lambda_max = 0.0f64;
    for k in 0..nclass {
        ws.linearize_class(y, &eta, &w_obs, k, &mut z, &mut wk);
        residual.assign(&z);
        let c = b0[k];
        residual.mapv_inplace(|r| r - c);
        gradients(&xs, &wk, &residual, &mut class_grad);
        for j in 0..nvars {
            if !std.excluded[j] {
                let g = class_grad[j].abs();
                grad_max[j] = grad_max[j].max(g);
                lambda_max = lambda_max.max(g);
            }
        }
    }
    lambda_max /= alpha.max(ALPHA_FLOOR);
    if !(lambda_max > 0.0) {
        lambda_max = 1.0;
    }

    let lambdas = resolve_lambda_sequence(opts, None, lambda_max, nobs, nvars);

    let mut active = ActiveSet::new(nvars, std.excluded.clone());
    let mut points: Vec<MultiPathPoint> = Vec::with_capacity(lambdas.len());
    let mut early_stop = None;
    let mut total_passes = 0usize;
    let mut lambda_prev = lambda_max;

    'path: for (k_lam, &lambda) in lambdas.iter().enumerate() {
        active.screen(&grad_max, alpha, lambda, lambda_prev);
        for beta in &betas {
            active.retain_support(beta);
        }

        let mut monitor = ConvergenceMonitor::new(opts.tol, opts.max_outer_passes);
        let mut budget = opts.max_iter;
        let mut point_passes = 0usize;
        let mut point_converged = true;
        let mut deadline_hit = false;
        let mut deviance;

        loop {
            if let Some(limit) = opts.deadline {
                if started.elapsed() >= limit {
                    deadline_hit = true;
                    point_converged = false;
                    ws.update_probabilities(&eta);
                    deviance = ws.deviance(y, &w_obs);
                    break;
                }
            }

            // One linearization per outer pass: probabilities frozen, then
            // every class solved against them.
            ws.update_probabilities(&eta);

            let mut rounds = 0usize;
            let mut max_delta: f64;
            let mut inner_converged;
            loop {
                max_delta = 0.0;
                inner_converged = true;
                for class in 0..nclass {
                    ws.linearize_class(y, &eta, &w_obs, class, &mut z, &mut wk);
                    let xv = gram_diagonal(&xs, &wk);
                    reset_residual(
                        &xs,
                        &z,
                        &betas[class],
                        b0[class],
                        active.indices(),
                        &mut residual,
                    );
                    let out = solve_on_active(
                        &xs,
                        &wk,
                        &xv,
                        active.indices(),
                        lambda,
                        alpha,
                        opts.tol,
                        budget.max(1),
                        true,
                        &mut betas[class],
                        &mut b0[class],
                        &mut residual,
                    );
                    point_passes += out.passes;
                    budget = budget.saturating_sub(out.passes);
                    max_delta = max_delta.max(out.max_delta);
                    inner_converged &= out.converged;

                    for i in 0..nobs {
                        eta[[i, class]] = z[i] - residual[i];
                    }
                }

                // KKT verification across ALL classes; the active set is
                // shared, so any class's violator admits the feature for
                // every class.
                grad_max.fill(0.0);
                for class in 0..nclass {
                    ws.linearize_class(y, &eta, &w_obs, class, &mut z, &mut wk);
                    reset_residual(
                        &xs,
                        &z,
                        &betas[class],
                        b0[class],
                        active.indices(),
                        &mut residual,
                    );
                    gradients(&xs, &wk, &residual, &mut class_grad);
                    for j in 0..nvars {
                        grad_max[j] = grad_max[j].max(class_grad[j].abs());
                    }
                }
                let violators = active.kkt_violations(&grad_max, alpha, lambda);
                if violators.is_empty() {
                    break;
                }
                for j in violators {
                    active.admit(j);
                }
                rounds += 1;
                if rounds > MAX_KKT_ROUNDS {
                    return Err(RustyNetError::KktInstability {
                        lambda_index: k_lam,
                        lambda,
                        rounds,
                    });
                }
                if budget == 0 {
                    break;
                }
            }

            if !inner_converged || budget == 0 {
                point_converged = false;
            }

            // Symmetric softmax leaves the intercepts unidentified up to a
            // common shift; recentre them (probabilities are unchanged).
            let mean_b0 = b0.sum() / nclass as f64;
            if mean_b0 != 0.0 {
                b0.mapv_inplace(|b| b - mean_b0);
                eta.mapv_inplace(|e| e - mean_b0);
            }

            ws.update_probabilities(&eta);
            deviance = ws.deviance(y, &w_obs);

            match monitor.record(deviance, max_delta) {
                OuterStatus::Converged => break,
                OuterStatus::Exhausted => {
                    point_converged = false;
                    break;
                }
                OuterStatus::Continue => {}
            }
        }

        total_passes += point_passes;
        ws.update_probabilities(&eta);
        let degeneracy = ws.check_degeneracy(y, &w_obs);
        let dev_ratio = if null_deviance.abs() > 0.0 {
            1.0 - deviance / null_deviance
        } else {
            0.0
        };

        // Unscale every class into the nvars × K output matrix.
        let mut coefficients = Array2::zeros((nvars, nclass));
        let mut intercepts = Array1::zeros(nclass);
        for class in 0..nclass {
            let (raw, shift) = std.unscale(&betas[class]);
            intercepts[class] = b0[class] - shift;
            coefficients.column_mut(class).assign(&raw);
        }

        if !point_converged {
            log::warn!(
                "multinomial path point {} (lambda = {:.4e}) did not converge within budget",
                k_lam,
                lambda
            );
        }

        let prev_ratio = points.last().map(|p: &MultiPathPoint| p.dev_ratio);
        points.push(MultiPathPoint {
            lambda,
            coefficients,
            intercepts,
            deviance,
            dev_ratio,
            converged: point_converged,
            degeneracy,
            passes: point_passes,
            relaxed: None,
        });
        lambda_prev = lambda;

        if let Some(d) = degeneracy {
            log::warn!(
                "multinomial path halted early at lambda {:.4e}: {:?}",
                lambda,
                d
            );
            early_stop = Some(EarlyStop::Degenerate);
            break 'path;
        }
        if dev_ratio > DEV_RATIO_CEILING {
            early_stop = Some(EarlyStop::DevianceSaturated);
            break 'path;
        }
        if let Some(prev) = prev_ratio {
            if dev_ratio - prev < DEV_GAIN_FLOOR * dev_ratio {
                early_stop = Some(EarlyStop::MinimalGain);
                break 'path;
            }
        }
        if deadline_hit {
            early_stop = Some(EarlyStop::DeadlineExceeded);
            break 'path;
        }
    }

    Ok(MultiResponsePath {
        family: "multinomial",
        points,
        null_deviance,
        early_stop,
        excluded_columns: std.excluded_indices(),
        total_passes,
    })
}

// =============================================================================
// Multi-response Gaussian driver
// =============================================================================

/// Fit a multi-response Gaussian path: the K response columns are
/// uncoupled, so each is an independent Gaussian elastic-net fit over one
/// SHARED λ sequence (sized by the largest per-column λ_max). Because the
/// columns share no mutable state, they are fanned out across threads;
/// per-column early stopping is disabled so every column reports the same
/// path points.
pub(crate) fn fit_multigaussian_path(
    x: &Array2<f64>,
    y: &Array2<f64>,
    opts: &PathOptions,
) -> Result<MultiResponsePath> {
    use rayon::prelude::*;

    use crate::families::GaussianNet;

    let nobs = x.nrows();
    let nvars = x.ncols();
    let nresp = y.ncols();

    let w_obs = normalize_weights(opts.weights.as_ref(), nobs);
    let std = Standardization::weighted(x, &w_obs, opts.standardize);
    let xs = std.transform(x);

    // Pooled λ_max: the smallest penalty that zeroes EVERY column's
    // coefficients, so the shared sequence starts at the null model.
    let lambdas = if let Some(seq) = &opts.lambda_sequence {
        seq.clone()
    } else {
        let n = nobs as f64;
        let mut lambda_max = 0.0f64;
        let mut residual = Array1::zeros(nobs);
        let mut grad = Array1::zeros(nvars);
        for k in 0..nresp {
            let col = y.column(k);
            let mut mean = 0.0;
            for (yi, wi) in col.iter().zip(w_obs.iter()) {
                mean += wi * yi;
            }
            mean /= n;
            for i in 0..nobs {
                residual[i] = col[i] - mean;
            }
            gradients(&xs, &w_obs, &residual, &mut grad);
            for j in 0..nvars {
                if !std.excluded[j] {
                    lambda_max = lambda_max.max(grad[j].abs());
                }
            }
        }
        lambda_max /= opts.alpha.max(ALPHA_FLOOR);
        if !(lambda_max > 0.0) {
            lambda_max = 1.0;
        }
        let ratio = opts
            .lambda_min_ratio
            .unwrap_or_else(|| default_lambda_min_ratio(nobs, nvars));
        geometric_sequence(lambda_max, opts.nlambda, ratio)
    };

    // Independent columns, independent fits: a parallel map with no
    // shared mutable state.
    let columns: Vec<ElasticNetPath> = (0..nresp)
        .into_par_iter()
        .map(|k| {
            let yk = y.column(k).to_owned();
            fit_single_path_impl(x, &yk, &GaussianNet, opts, Some(&lambdas), false)
        })
        .collect::<Result<Vec<_>>>()?;

    // Zip the aligned per-column paths into one matrix-valued path.
    let npoints = columns.iter().map(|c| c.points.len()).min().unwrap_or(0);
    let null_deviance: f64 = columns.iter().map(|c| c.null_deviance).sum();
    let mut total_passes = 0usize;
    let mut points = Vec::with_capacity(npoints);

    for idx in 0..npoints {
        let mut coefficients = Array2::zeros((nvars, nresp));
        let mut intercepts = Array1::zeros(nresp);
        let mut deviance = 0.0;
        let mut converged = true;
        let mut passes = 0usize;
        let mut relaxed_cols: Vec<Option<&RelaxedFit>> = Vec::with_capacity(nresp);

        for (k, col) in columns.iter().enumerate() {
            let point = &col.points[idx];
            coefficients.column_mut(k).assign(&point.coefficients);
            intercepts[k] = point.intercept;
            deviance += point.deviance;
            converged &= point.converged;
            passes += point.passes;
            relaxed_cols.push(point.relaxed.as_ref());
        }
        total_passes += passes;

        let relaxed = if relaxed_cols.iter().all(|r| r.is_some()) && opts.relax {
            let mut rc = Array2::zeros((nvars, nresp));
            let mut ri = Array1::zeros(nresp);
            for (k, r) in relaxed_cols.iter().enumerate() {
                let fit = r.unwrap();
                rc.column_mut(k).assign(&fit.coefficients);
                ri[k] = fit.intercept;
            }
            Some(MultiRelaxedFit {
                coefficients: rc,
                intercepts: ri,
            })
        } else {
            None
        };

        let dev_ratio = if null_deviance.abs() > 0.0 {
            1.0 - deviance / null_deviance
        } else {
            0.0
        };
        points.push(MultiPathPoint {
            lambda: lambdas[idx],
            coefficients,
            intercepts,
            deviance,
            dev_ratio,
            converged,
            degeneracy: None,
            passes,
            relaxed,
        });
    }

    Ok(MultiResponsePath {
        family: "mgaussian",
        points,
        null_deviance,
        early_stop: None,
        excluded_columns: std.excluded_indices(),
        total_passes,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::{BinomialNet, GaussianNet};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn small_gaussian_fixture() -> (Array2<f64>, Array1<f64>) {
        // y ≈ 2·x0 − 1·x1, x2 pure noise.
        let x = array![
            [0.5, -1.2, 0.3],
            [-0.8, 0.4, -0.5],
            [1.3, 0.9, 0.8],
            [-0.2, -0.7, -1.1],
            [0.9, 1.5, 0.2],
            [-1.4, 0.1, 0.6],
            [0.3, -0.9, -0.4],
            [1.1, 0.6, 1.0],
        ];
        let mut y = Array1::zeros(8);
        for i in 0..8 {
            y[i] = 2.0 * x[[i, 0]] - 1.0 * x[[i, 1]];
        }
        (x, y)
    }

    #[test]
    fn test_geometric_sequence_shape() {
        let seq = geometric_sequence(10.0, 5, 1e-2);
        assert_eq!(seq.len(), 5);
        assert_abs_diff_eq!(seq[0], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(seq[4], 0.1, epsilon = 1e-10);
        // Strictly decreasing
        for w in seq.windows(2) {
            assert!(w[1] < w[0]);
        }
    }

    #[test]
    fn test_normalize_weights_sum_to_nobs() {
        let w = array![1.0, 2.0, 3.0, 4.0];
        let norm = normalize_weights(Some(&w), 4);
        assert_abs_diff_eq!(norm.sum(), 4.0, epsilon = 1e-12);
        // Proportions preserved
        assert_abs_diff_eq!(norm[3] / norm[0], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_path_starts_at_null() {
        let (x, y) = small_gaussian_fixture();
        let opts = PathOptions {
            nlambda: 20,
            ..PathOptions::default()
        };
        let path = fit_single_path(&x, &y, &GaussianNet, &opts).unwrap();

        // First point is λ_max: all coefficients exactly zero, intercept
        // equal to the weighted mean of y.
        let first = &path.points[0];
        assert!(first.coefficients.iter().all(|&b| b == 0.0));
        assert_abs_diff_eq!(first.intercept, y.sum() / 8.0, epsilon = 1e-8);
        assert_abs_diff_eq!(first.dev_ratio, 0.0, epsilon = 1e-10);

        // Deviance ratio is non-decreasing along the path.
        for w in path.points.windows(2) {
            assert!(w[1].dev_ratio >= w[0].dev_ratio - 1e-12);
        }
    }

    #[test]
    fn test_gaussian_path_support_grows() {
        let (x, y) = small_gaussian_fixture();
        let path = fit_single_path(&x, &y, &GaussianNet, &PathOptions::default()).unwrap();

        // Support is non-decreasing along the path (up to the documented
        // one-step reinstatement wobble).
        let mut last_nnz = 0;
        for idx in 0..path.points.len() {
            let nnz = path.n_nonzero(idx);
            assert!(nnz + 1 >= last_nnz, "support shrank: {} -> {}", last_nnz, nnz);
            last_nnz = nnz;
        }
        // The informative features must enter before the noise feature.
        let last = path.points.last().unwrap();
        assert!(last.coefficients[0].abs() > 0.5);
        assert!(last.coefficients[1].abs() > 0.2);
    }

    #[test]
    fn test_kkt_conditions_hold_at_every_point() {
        let (x, y) = small_gaussian_fixture();
        let opts = PathOptions {
            nlambda: 15,
            tol: 1e-10,
            ..PathOptions::default()
        };
        let path = fit_single_path(&x, &y, &GaussianNet, &opts).unwrap();

        // Rebuild the kernel's view of the problem to state KKT in the
        // space the objective is minimized in.
        let w = normalize_weights(None, x.nrows());
        let std = Standardization::weighted(&x, &w, true);
        let xs = std.transform(&x);
        let n = x.nrows() as f64;
        let kkt_tol = 1e-6;

        for point in &path.points {
            // Predictions are identical in both spaces, so the residual
            // can be taken in caller units.
            let mut r = y.clone();
            for i in 0..x.nrows() {
                r[i] -= point.intercept + x.row(i).dot(&point.coefficients);
            }
            for j in 0..x.ncols() {
                let g: f64 =
                    xs.column(j).iter().zip(r.iter()).map(|(xv, rv)| xv * rv).sum::<f64>() / n;
                let beta_std = point.coefficients[j] * std.scales[j];
                if beta_std == 0.0 {
                    // Excluded coordinates: stationarity bound.
                    assert!(
                        g.abs() <= point.lambda + kkt_tol,
                        "inactive KKT violated at lambda {}: |g| = {}",
                        point.lambda,
                        g.abs()
                    );
                } else {
                    // Active coordinates (alpha = 1): g = λ·sign(β).
                    assert_abs_diff_eq!(
                        g,
                        point.lambda * beta_std.signum(),
                        epsilon = kkt_tol
                    );
                }
            }
        }
    }

    #[test]
    fn test_idempotent_refit() {
        let (x, y) = small_gaussian_fixture();
        let opts = PathOptions {
            nlambda: 12,
            ..PathOptions::default()
        };
        let a = fit_single_path(&x, &y, &GaussianNet, &opts).unwrap();
        let b = fit_single_path(&x, &y, &GaussianNet, &opts).unwrap();

        assert_eq!(a.points.len(), b.points.len());
        for (pa, pb) in a.points.iter().zip(b.points.iter()) {
            // Deterministic sweeps: bit-for-bit identical results.
            assert_eq!(pa.intercept.to_bits(), pb.intercept.to_bits());
            for (ca, cb) in pa.coefficients.iter().zip(pb.coefficients.iter()) {
                assert_eq!(ca.to_bits(), cb.to_bits());
            }
        }
    }

    #[test]
    fn test_user_lambda_sequence_is_respected() {
        let (x, y) = small_gaussian_fixture();
        let opts = PathOptions {
            lambda_sequence: Some(vec![1.0, 0.5, 0.1]),
            ..PathOptions::default()
        };
        let path = fit_single_path(&x, &y, &GaussianNet, &opts).unwrap();
        assert!(path.points.len() <= 3);
        assert_abs_diff_eq!(path.points[0].lambda, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_variance_column_excluded() {
        let x = array![
            [1.0, 7.0],
            [2.0, 7.0],
            [3.0, 7.0],
            [4.0, 7.0],
        ];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let path = fit_single_path(&x, &y, &GaussianNet, &PathOptions::default()).unwrap();

        assert_eq!(path.excluded_columns, vec![1]);
        for point in &path.points {
            assert_eq!(point.coefficients[1], 0.0);
        }
    }

    #[test]
    fn test_binomial_path_null_intercept() {
        let x = array![
            [0.1, -0.3],
            [-0.4, 0.2],
            [0.7, 0.5],
            [-0.9, -0.8],
            [0.2, 0.9],
            [-0.1, -0.2],
        ];
        let y = array![1.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        let opts = PathOptions {
            nlambda: 10,
            ..PathOptions::default()
        };
        let path = fit_single_path(&x, &y, &BinomialNet, &opts).unwrap();

        // At λ_max the fit is intercept-only: logit of the mean response.
        let first = &path.points[0];
        assert!(first.coefficients.iter().all(|&b| b == 0.0));
        let p_bar: f64 = 4.0 / 6.0;
        assert_abs_diff_eq!(
            first.intercept,
            (p_bar / (1.0 - p_bar)).ln(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_deadline_records_early_stop() {
        let (x, y) = small_gaussian_fixture();
        let opts = PathOptions {
            deadline: Some(Duration::ZERO),
            ..PathOptions::default()
        };
        let path = fit_single_path(&x, &y, &GaussianNet, &opts).unwrap();

        // An already-elapsed deadline is noticed at the first outer pass:
        // one flagged point, then a clean recorded stop.
        assert_eq!(path.early_stop, Some(EarlyStop::DeadlineExceeded));
        assert_eq!(path.points.len(), 1);
        assert!(!path.points[0].converged);
    }

    #[test]
    fn test_write_coefficients_contract() {
        let (x, y) = small_gaussian_fixture();
        let path = fit_single_path(&x, &y, &GaussianNet, &PathOptions::default()).unwrap();

        let mut buf = Array1::zeros(3);
        path.write_coefficients(0, &mut buf).unwrap();
        assert_eq!(buf, path.points[0].coefficients);

        let mut wrong = Array1::zeros(5);
        assert!(matches!(
            path.write_coefficients(0, &mut wrong),
            Err(RustyNetError::DimensionMismatch(_))
        ));
        assert!(matches!(
            path.write_coefficients(10_000, &mut buf),
            Err(RustyNetError::InvalidValue(_))
        ));
    }
}
