// =============================================================================
// Poisson Family
// =============================================================================
//
// Count loss with log link. Each outer IRLS pass linearizes at the
// current η:
//
//     μ_i = exp(min(η_i, ETA_CAP))
//     w_i = obs_w_i · μ_i
//     z_i = η_i + (y_i − μ_i) / μ_i
//
// The η cap is the overflow guard: exp() of an uncapped runaway predictor
// turns the working weights into infinities and poisons every inner
// product downstream. Hitting the cap is reported as a degeneracy flag.
//
// =============================================================================

use ndarray::Array1;

use super::{Degeneracy, Family};
use crate::constants::{ETA_CAP, WEIGHT_FLOOR};

/// Poisson elastic-net family (log link, y ≥ 0 counts).
#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonNet;

#[inline]
fn capped_mu(eta: f64) -> f64 {
    eta.min(ETA_CAP).exp()
}

impl Family for PoissonNet {
    fn name(&self) -> &'static str {
        "poisson"
    }

    fn null_eta(&self, y: &Array1<f64>, weights: &Array1<f64>) -> f64 {
        let n = y.len() as f64;
        let mut mean = 0.0;
        for (yi, wi) in y.iter().zip(weights.iter()) {
            mean += wi * yi;
        }
        mean /= n;
        mean.max(WEIGHT_FLOOR).ln()
    }

    fn linearize(
        &self,
        y: &Array1<f64>,
        eta: &Array1<f64>,
        weights: &Array1<f64>,
        z: &mut Array1<f64>,
        w: &mut Array1<f64>,
    ) {
        for i in 0..y.len() {
            let mu = capped_mu(eta[i]).max(WEIGHT_FLOOR);
            w[i] = weights[i] * mu;
            z[i] = eta[i] + (y[i] - mu) / mu;
        }
    }

    fn deviance(&self, y: &Array1<f64>, eta: &Array1<f64>, weights: &Array1<f64>) -> f64 {
        // 2 Σ w_i [ y_i log(y_i/μ_i) − (y_i − μ_i) ], with y log y := 0 at y = 0
        let mut dev = 0.0;
        for i in 0..y.len() {
            let mu = capped_mu(eta[i]).max(WEIGHT_FLOOR);
            let yi = y[i];
            let term = if yi > 0.0 {
                yi * (yi / mu).ln() - (yi - mu)
            } else {
                mu
            };
            dev += weights[i] * term;
        }
        2.0 * dev
    }

    fn check_degeneracy(
        &self,
        _y: &Array1<f64>,
        eta: &Array1<f64>,
        weights: &Array1<f64>,
    ) -> Option<Degeneracy> {
        for (ei, wi) in eta.iter().zip(weights.iter()) {
            if *wi > 0.0 && *ei >= ETA_CAP {
                return Some(Degeneracy::MeanOverflow);
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
