// =============================================================================
// Binomial (Logistic) Family
// =============================================================================
//
// Bernoulli loss with logit link. Each outer IRLS pass linearizes at the
// current η:
//
//     p_i = 1 / (1 + exp(−η_i))        clamped to [ε, 1−ε]
//     w_i = obs_w_i · p_i (1 − p_i)
//     z_i = η_i + (y_i − p_i) / (p_i (1 − p_i))
//
// The clamp is what keeps the working response finite: as a fit approaches
// perfect separation, p → {0, 1} and the raw weight p(1−p) → 0. When EVERY
// observation is pinned at the clamp boundary on the side its label wants,
// the data are separated and the only "better" fit is coefficients at ±∞ —
// that is reported as a degeneracy so the path driver can halt cleanly.
//
// =============================================================================

use ndarray::Array1;

use super::{Degeneracy, Family};
use crate::constants::{PROB_FLOOR, SEPARATION_PROB};

/// Binomial elastic-net family (two-class logistic regression, y ∈ {0, 1}).
#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialNet;

#[inline]
fn sigmoid(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        // Algebraically identical form that avoids exp overflow for eta << 0
        let e = eta.exp();
        e / (1.0 + e)
    }
}

#[inline]
fn clamp_prob(p: f64) -> f64 {
    p.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR)
}

impl Family for BinomialNet {
    fn name(&self) -> &'static str {
        "binomial"
    }

    fn null_eta(&self, y: &Array1<f64>, weights: &Array1<f64>) -> f64 {
        let n = y.len() as f64;
        let mut p = 0.0;
        for (yi, wi) in y.iter().zip(weights.iter()) {
            p += wi * yi;
        }
        p /= n;
        let p = clamp_prob(p);
        (p / (1.0 - p)).ln()
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
            let p = clamp_prob(sigmoid(eta[i]));
            let v = p * (1.0 - p);
            w[i] = weights[i] * v;
            z[i] = eta[i] + (y[i] - p) / v;
        }
    }

    fn deviance(&self, y: &Array1<f64>, eta: &Array1<f64>, weights: &Array1<f64>) -> f64 {
        // −2 Σ w_i [ y_i log p_i + (1−y_i) log(1−p_i) ]
        let mut ll = 0.0;
        for i in 0..y.len() {
            let p = clamp_prob(sigmoid(eta[i]));
            ll += weights[i] * (y[i] * p.ln() + (1.0 - y[i]) * (1.0 - p).ln());
        }
        -2.0 * ll
    }

    fn check_degeneracy(
        &self,
        y: &Array1<f64>,
        eta: &Array1<f64>,
        weights: &Array1<f64>,
    ) -> Option<Degeneracy> {
        // Separation: every (weighted) observation's fitted probability is
        // pinned against the boundary on the side its label demands.
        let boundary = SEPARATION_PROB;
        let mut any = false;
        for i in 0..y.len() {
            if weights[i] == 0.0 {
                continue;
            }
            any = true;
            let p = clamp_prob(sigmoid(eta[i]));
            let pinned = if y[i] > 0.5 {
                p >= 1.0 - boundary
            } else {
                p <= boundary
            };
            if !pinned {
                return None;
            }
        }
        if any {
            Some(Degeneracy::Separation)
        } else {
            None
        }
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

    #[test]
    fn test_sigmoid_extremes_stay_finite() {
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert_abs_diff_eq!(sigmoid(0.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_null_eta_is_logit_of_mean() {
        let y = array![1.0, 1.0, 0.0, 0.0];
        let w = Array1::from_elem(4, 1.0);
        // Mean 0.5 → logit 0
        assert_abs_diff_eq!(BinomialNet.null_eta(&y, &w), 0.0, epsilon = 1e-12);

        let y = array![1.0, 1.0, 1.0, 0.0];
        assert_abs_diff_eq!(
            BinomialNet.null_eta(&y, &w),
            (0.75f64 / 0.25).ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_linearize_at_zero() {
        // At η = 0: p = 0.5, w = 0.25·obs_w, z = (y − 0.5)/0.25 = 4y − 2
        let y = array![1.0, 0.0];
        let eta = array![0.0, 0.0];
        let w_obs = array![1.0, 2.0];
        let mut z = Array1::zeros(2);
        let mut w = Array1::zeros(2);
        BinomialNet.linearize(&y, &eta, &w_obs, &mut z, &mut w);

        assert_abs_diff_eq!(w[0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(z[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_deviance_null_matches_entropy() {
        // Balanced labels at η = 0: deviance = −2 n log(0.5) = 2 n log 2
        let y = array![1.0, 0.0, 1.0, 0.0];
        let eta = Array1::zeros(4);
        let w = Array1::from_elem(4, 1.0);
        let dev = BinomialNet.deviance(&y, &eta, &w);
        assert_abs_diff_eq!(dev, 8.0 * 2.0f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_separation_flagged() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        // Huge η of the right sign for every label: probabilities pinned.
        let eta = array![-50.0, -40.0, 45.0, 60.0];
        let w = Array1::from_elem(4, 1.0);
        assert_eq!(
            BinomialNet.check_degeneracy(&y, &eta, &w),
            Some(Degeneracy::Separation)
        );

        // One observation on the wrong side: not separated.
        let eta = array![-50.0, 1.0, 45.0, 60.0];
        assert_eq!(BinomialNet.check_degeneracy(&y, &eta, &w), None);
    }
}
