// =============================================================================
// Model Families
// =============================================================================
//
// Each family turns its loss into the quadratic (weighted least squares)
// approximation the coordinate descent kernel consumes. This is the
// IRLS trick: at the current linear predictor η, compute
//
//     working weight   w_i  (curvature of the loss at η_i)
//     working response z_i = η_i + gradient_i / w_i
//
// and the penalized weighted least-squares problem in (z, w) is the local
// quadratic model of the penalized likelihood. The kernel solves that
// inner problem to convergence on a FROZEN (z, w); the family then
// re-linearizes at the new η. Gaussian is the degenerate case where the
// linearization is exact and a single outer pass suffices.
//
// The set of families is closed: one type per exposed operation, selected
// once per fit call. Multinomial is the odd one out — its response is a
// matrix and its classes share an active set — so it lives in its own
// module with a per-class linearization rather than behind this trait.
//
// =============================================================================

mod binomial;
mod cox;
mod gaussian;
mod multinomial;
mod poisson;

pub use binomial::BinomialNet;
pub use cox::{CoxNet, TieMethod};
pub use gaussian::GaussianNet;
pub use multinomial::MultinomialWorkspace;
pub use poisson::PoissonNet;

use ndarray::Array1;

/// Numerical degeneracies a fit can run into.
///
/// These are data properties, not errors: the affected path point is
/// flagged and the path halts early as a normal, recorded condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// Classification data perfectly separated by the current fit: every
    /// fitted probability is pinned at its clamp boundary, so coefficients
    /// would diverge to ±∞ if the path kept going.
    Separation,

    /// The fitted mean ran into the linear-predictor cap (Poisson/Cox
    /// exponentiation guard) for some observation.
    MeanOverflow,
}

/// The capability every single-response family provides to the path driver.
///
/// Implementors: [`GaussianNet`], [`BinomialNet`], [`PoissonNet`],
/// [`CoxNet`]. For Cox the `y` argument is the event-status vector; the
/// ranked survival times live inside the adapter itself.
pub trait Family {
    /// Short name used in results and log lines.
    fn name(&self) -> &'static str;

    /// Whether the model carries an intercept term.
    /// Cox partial likelihood is invariant to a constant shift of η, so
    /// it is the one family without.
    fn has_intercept(&self) -> bool {
        true
    }

    /// Whether the loss needs outer IRLS passes. Gaussian does not: its
    /// linearization is exact, so the driver runs the kernel once.
    fn needs_irls(&self) -> bool {
        true
    }

    /// The intercept-only linear predictor (null model), e.g. the link of
    /// the weighted response mean. Returned as a single scalar: the null
    /// η is constant across observations.
    fn null_eta(&self, y: &Array1<f64>, weights: &Array1<f64>) -> f64;

    /// Refresh the quadratic approximation at the current η: fill the
    /// working response `z` and working weight `w` buffers. Called once
    /// per outer pass, never per coordinate. `weights` are the normalized
    /// observation weights; implementations fold them into `w`.
    fn linearize(
        &self,
        y: &Array1<f64>,
        eta: &Array1<f64>,
        weights: &Array1<f64>,
        z: &mut Array1<f64>,
        w: &mut Array1<f64>,
    );

    /// Deviance of the fit at η (weighted, up to the family's constant).
    fn deviance(&self, y: &Array1<f64>, eta: &Array1<f64>, weights: &Array1<f64>) -> f64;

    /// Detect conditions under which continuing the path would only chase
    /// numerical blow-up. Checked after each converged path point.
    fn check_degeneracy(
        &self,
        _y: &Array1<f64>,
        _eta: &Array1<f64>,
        _weights: &Array1<f64>,
    ) -> Option<Degeneracy> {
        None
    }
}
