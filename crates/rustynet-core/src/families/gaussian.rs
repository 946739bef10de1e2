// =============================================================================
// Gaussian Family
// =============================================================================
//
// Squared-error loss with identity link. The "linearization" is the
// identity: working response = y, working weight = observation weight.
// Because the quadratic model is exact, the path driver skips the outer
// IRLS loop entirely and lets the kernel solve each penalty point in one
// shot. Deviance is the weighted residual sum of squares.
//
// =============================================================================

use ndarray::Array1;

use super::Family;

/// Gaussian (least squares) elastic-net family.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianNet;

impl Family for GaussianNet {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn needs_irls(&self) -> bool {
        false
    }

    fn null_eta(&self, y: &Array1<f64>, weights: &Array1<f64>) -> f64 {
        let n = y.len() as f64;
        let mut mean = 0.0;
        for (yi, wi) in y.iter().zip(weights.iter()) {
            mean += wi * yi;
        }
        mean / n
    }

    fn linearize(
        &self,
        y: &Array1<f64>,
        _eta: &Array1<f64>,
        weights: &Array1<f64>,
        z: &mut Array1<f64>,
        w: &mut Array1<f64>,
    ) {
        z.assign(y);
        w.assign(weights);
    }

    fn deviance(&self, y: &Array1<f64>, eta: &Array1<f64>, weights: &Array1<f64>) -> f64 {
        let mut rss = 0.0;
        for ((yi, ei), wi) in y.iter().zip(eta.iter()).zip(weights.iter()) {
            let r = yi - ei;
            rss += wi * r * r;
        }
        rss
    }
}

// =============================================================================
// Tests
// =============================================================================
