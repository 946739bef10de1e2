// =============================================================================
// Multinomial Family
// =============================================================================
//
// K-class logistic regression under the symmetric softmax link:
//
//     p_ik = exp(η_ik) / Σ_m exp(η_im)
//
// Each class gets the binomial-style quadratic approximation (partial
// Newton: the Hessian is approximated by its class-diagonal blocks):
//
//     w_ik = obs_w_i · p_ik (1 − p_ik)       (clamped like the binomial)
//     z_ik = η_ik + (y_ik − p_ik) / (p_ik (1 − p_ik))
//
// The symmetric parameterization is redundant: adding a constant to every
// class's intercept leaves the probabilities unchanged. The penalty pins
// down the coefficients, but the (unpenalized) intercepts are recentered
// to mean zero once per outer pass for identifiability.
//
// The path driver cycles classes within each outer pass and shares ONE
// active set across all classes: a feature is in the model if any class
// uses it. That is what makes the multinomial path consistent with the
// "one coefficient matrix row per feature" output shape.
//
// =============================================================================

use ndarray::{Array1, Array2};

use super::Degeneracy;
use crate::constants::{PROB_FLOOR, SEPARATION_PROB};

/// Scratch state for multinomial linearization: the fitted probability
/// matrix, refreshed from η once per class sweep.
#[derive(Debug, Clone)]
pub struct MultinomialWorkspace {
    nclass: usize,
    prob: Array2<f64>,
}

impl MultinomialWorkspace {
    pub fn new(nobs: usize, nclass: usize) -> Self {
        Self {
            nclass,
            prob: Array2::from_elem((nobs, nclass), 1.0 / nclass as f64),
        }
    }

    pub fn nclass(&self) -> usize {
        self.nclass
    }

    /// Refresh fitted probabilities from the linear predictors via a
    /// max-shifted softmax (the shift keeps exp() in range).
    pub fn update_probabilities(&mut self, eta: &Array2<f64>) {
        for (i, row) in eta.rows().into_iter().enumerate() {
            let m = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut denom = 0.0;
            for k in 0..self.nclass {
                let e = (row[k] - m).exp();
                self.prob[[i, k]] = e;
                denom += e;
            }
            for k in 0..self.nclass {
                self.prob[[i, k]] /= denom;
            }
        }
    }

    /// Quadratic approximation for class k at the current probabilities.
    /// Mirrors the binomial linearization, with the same clamp.
    pub fn linearize_class(
        &self,
        y: &Array2<f64>,
        eta: &Array2<f64>,
        weights: &Array1<f64>,
        k: usize,
        z: &mut Array1<f64>,
        w: &mut Array1<f64>,
    ) {
        for i in 0..y.nrows() {
            let p = self.prob[[i, k]].clamp(PROB_FLOOR, 1.0 - PROB_FLOOR);
            let v = p * (1.0 - p);
            w[i] = weights[i] * v;
            z[i] = eta[[i, k]] + (y[[i, k]] - p) / v;
        }
    }

    /// Multinomial deviance −2 Σ_i w_i Σ_k y_ik log p_ik at the stored
    /// probabilities (call `update_probabilities` first).
    pub fn deviance(&self, y: &Array2<f64>, weights: &Array1<f64>) -> f64 {
        let mut ll = 0.0;
        for i in 0..y.nrows() {
            let mut row = 0.0;
            for k in 0..self.nclass {
                let yik = y[[i, k]];
                if yik > 0.0 {
                    let p = self.prob[[i, k]].max(PROB_FLOOR);
                    row += yik * p.ln();
                }
            }
            ll += weights[i] * row;
        }
        -2.0 * ll
    }

    /// Intercepts of the null (class-proportions) model: log of the
    /// weighted class frequencies, centered to mean zero.
    pub fn null_intercepts(y: &Array2<f64>, weights: &Array1<f64>) -> Array1<f64> {
        let nclass = y.ncols();
        let n = y.nrows() as f64;
        let mut props = Array1::<f64>::zeros(nclass);
        for i in 0..y.nrows() {
            for k in 0..nclass {
                props[k] += weights[i] * y[[i, k]];
            }
        }
        props.mapv_inplace(|p| (p / n).clamp(PROB_FLOOR, 1.0 - PROB_FLOOR).ln());
        let mean = props.sum() / nclass as f64;
        props.mapv_inplace(|b| b - mean);
        props
    }

    /// Separation check across all classes: every observation's fitted
    /// probability for its own class pinned at the clamp ceiling.
    pub fn check_degeneracy(&self, y: &Array2<f64>, weights: &Array1<f64>) -> Option<Degeneracy> {
        let boundary = 1.0 - SEPARATION_PROB;
        let mut any = false;
        for i in 0..y.nrows() {
            if weights[i] == 0.0 {
                continue;
            }
            for k in 0..self.nclass {
                if y[[i, k]] > 0.5 {
                    any = true;
                    if self.prob[[i, k]] < boundary {
                        return None;
                    }
                }
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
    fn test_softmax_rows_sum_to_one() {
        let eta = array![[0.0, 0.0, 0.0], [5.0, -2.0, 1.0], [300.0, 0.0, -300.0]];
        let mut ws = MultinomialWorkspace::new(3, 3);
        ws.update_probabilities(&eta);

        for i in 0..3 {
            let s: f64 = (0..3).map(|k| ws.prob[[i, k]]).sum();
            assert_abs_diff_eq!(s, 1.0, epsilon = 1e-12);
        }
        // Uniform η → uniform probabilities
        assert_abs_diff_eq!(ws.prob[[0, 0]], 1.0 / 3.0, epsilon = 1e-12);
        // Extreme η must not overflow
        assert!(ws.prob[[2, 0]] > 0.999);
        assert!(ws.prob.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_linearize_class_matches_binomial_form() {
        // Two classes at uniform probabilities behave exactly like the
        // binomial linearization at p = 0.5.
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let eta = Array2::zeros((2, 2));
        let w_obs = Array1::from_elem(2, 1.0);
        let mut ws = MultinomialWorkspace::new(2, 2);
        ws.update_probabilities(&eta);

        let mut z = Array1::zeros(2);
        let mut w = Array1::zeros(2);
        ws.linearize_class(&y, &eta, &w_obs, 0, &mut z, &mut w);

        assert_abs_diff_eq!(w[0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(z[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_null_intercepts_centered() {
        let y = array![
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0]
        ];
        let w = Array1::from_elem(4, 1.0);
        let b0 = MultinomialWorkspace::null_intercepts(&y, &w);
        assert_abs_diff_eq!(b0.sum(), 0.0, epsilon = 1e-12);
        // Class 0 is twice as frequent as the others: largest intercept.
        assert!(b0[0] > b0[1]);
        assert_abs_diff_eq!(b0[1], b0[2], epsilon = 1e-12);
    }

    #[test]
    fn test_deviance_at_uniform() {
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let w = Array1::from_elem(2, 1.0);
        let mut ws = MultinomialWorkspace::new(2, 2);
        ws.update_probabilities(&Array2::zeros((2, 2)));
        // −2 · 2 · log(1/2) = 4 log 2
        assert_abs_diff_eq!(ws.deviance(&y, &w), 4.0 * 2.0f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_separation_detection() {
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let w = Array1::from_elem(2, 1.0);
        let mut ws = MultinomialWorkspace::new(2, 2);

        ws.update_probabilities(&array![[40.0, -40.0], [-40.0, 40.0]]);
        assert_eq!(
            ws.check_degeneracy(&y, &w),
            Some(Degeneracy::Separation)
        );

        ws.update_probabilities(&array![[1.0, -1.0], [-1.0, 1.0]]);
        assert_eq!(ws.check_degeneracy(&y, &w), None);
    }
}
