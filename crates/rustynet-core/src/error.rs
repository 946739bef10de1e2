// =============================================================================
// Error Types
// =============================================================================
//
// The error taxonomy follows a strict policy:
//
//   - Input validation failures abort BEFORE any numeric work starts.
//   - Data properties discovered during the fit (non-convergence, perfect
//     separation, zero-variance columns) are NOT errors. They are recorded
//     as flags on the affected path point and the fit keeps going (or halts
//     the path early as a normal, recorded condition).
//   - The single mid-fit abort is `KktInstability`: the active set failing
//     to stabilize after a bounded number of expansions means the solver
//     itself is wrong, and returning coefficients would be lying.
//
// =============================================================================

use thiserror::Error;

/// Errors that can occur while fitting a regularization path.
#[derive(Error, Debug)]
pub enum RustyNetError {
    /// Array shapes don't line up (e.g., X has 100 rows but y has 90).
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// An input that must be non-empty is empty.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A scalar or vector input is outside its valid range
    /// (negative weights, alpha outside [0, 1], non-decreasing lambdas...).
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A linear system could not be solved. Only reachable from the
    /// relaxed (unpenalized) refit, where the restricted design matrix
    /// may be singular.
    #[error("Linear algebra failure: {0}")]
    LinearAlgebraError(String),

    /// The KKT verification loop kept finding violators after the bounded
    /// number of active-set expansions. This indicates a defect in the
    /// screening/kernel logic rather than a property of the data, so the
    /// fit aborts and reports which path point triggered it.
    #[error(
        "KKT conditions failed to stabilize at path point {lambda_index} \
         (lambda = {lambda:.6e}) after {rounds} active-set expansions"
    )]
    KktInstability {
        lambda_index: usize,
        lambda: f64,
        rounds: usize,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RustyNetError>;
