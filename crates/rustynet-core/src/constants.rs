// =============================================================================
// Numerical Constants
// =============================================================================
//
// Floors, caps, and tolerances shared across the solver modules.
// Collected here so the clamping behavior is consistent between the
// family linearizations, the kernel, and the path driver.
//
// =============================================================================

/// Smallest probability the binomial/multinomial linearizations will produce.
///
/// Fitted probabilities are clamped to [PROB_FLOOR, 1 - PROB_FLOOR] before
/// forming working weights w = p(1-p), so the working response
/// z = eta + (y - p) / (p(1-p)) never divides by (numerical) zero.
pub const PROB_FLOOR: f64 = 1e-5;

/// Probability boundary for declaring perfect separation: every fitted
/// probability within this distance of its label means the likelihood is
/// still climbing toward coefficients at ±∞. Looser than [`PROB_FLOOR`]
/// on purpose — separation should be caught while the iterates are still
/// finite and well-scaled.
pub const SEPARATION_PROB: f64 = 1e-3;

/// Cap on the linear predictor before exponentiation (Poisson, Cox).
///
/// exp(30) ~ 1e13, far beyond any sane fitted mean; values above this are
/// a sign the fit is running away, not that the data demand them.
pub const ETA_CAP: f64 = 30.0;

/// Floor on working weights.
///
/// A working weight of exactly zero would make the corresponding working
/// response undefined; observations whose *prior* weight is zero are
/// handled separately (they drop out of every inner product).
pub const WEIGHT_FLOOR: f64 = 1e-9;

/// Floor on alpha when computing lambda_max.
///
/// At alpha = 0 (pure ridge) no finite lambda zeroes all coefficients, so
/// the automatic sequence pretends alpha = ALPHA_FLOOR when sizing the
/// largest penalty, exactly as the reference implementation does.
pub const ALPHA_FLOOR: f64 = 1e-3;

/// Deviance-ratio ceiling for early path termination.
///
/// Once the model explains this fraction of the null deviance, later
/// (smaller) penalties are numerically meaningless refinements.
pub const DEV_RATIO_CEILING: f64 = 0.999;

/// Minimum relative gain in deviance explained between consecutive path
/// points; below this the path has saturated and stops early.
pub const DEV_GAIN_FLOOR: f64 = 1e-5;

/// Slack added to lambda * alpha when checking KKT stationarity of
/// excluded coefficients, to keep the check robust to the inner solve's
/// own tolerance.
pub const KKT_SLACK: f64 = 1e-9;

/// Ceiling on screen -> solve -> verify -> expand rounds at one path
/// point. The active set can only grow, so failure to stabilize within
/// this many rounds indicates a logic defect, not a data property.
pub const MAX_KKT_ROUNDS: usize = 32;

/// Columns whose weighted variance falls below this are treated as
/// constant: excluded from updates, coefficient pinned at zero.
pub const ZERO_VARIANCE_EPS: f64 = 1e-12;
