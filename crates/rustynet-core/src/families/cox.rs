// =============================================================================
// Cox Proportional Hazards Family
// =============================================================================
//
// Right-censored survival response (time, status), status 1 = event,
// 0 = censored. There is no intercept: the partial likelihood is invariant
// to a constant shift of η, so one is never identifiable (and never
// needed).
//
// Each outer pass linearizes the weighted log partial likelihood at the
// current η. With observations ranked by time, u_i = w_i·exp(η_i), and
// risk sums taken over everyone still at risk at each event time, the
// gradient and (diagonal) Hessian of observation i are accumulated over
// the event-time groups whose risk set contains i. Working quantities:
//
//     w_i = hess_ii  (floored),   z_i = η_i + grad_i / w_i
//
// TIES
// ----
// Tied event times change the risk-set denominators. Efron's
// approximation (the default here) lets the l-th of m tied events see the
// denominator S − (l/m)·E, where E is the tied events' own hazard mass;
// Breslow simply uses S for all of them. Breslow is cheaper and cruder;
// the two agree when no ties exist. The choice measurably changes
// coefficients on tied data, so it is an explicit knob, not a buried
// constant.
//
// =============================================================================

use ndarray::Array1;

use super::{Degeneracy, Family};
use crate::constants::{ETA_CAP, WEIGHT_FLOOR};
use crate::error::{Result, RustyNetError};

/// Tie-handling policy for the partial likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieMethod {
    /// Efron's approximation (default): tied events progressively leave
    /// the risk denominator.
    #[default]
    Efron,
    /// Breslow's approximation: all tied events see the full risk sum.
    Breslow,
}

/// Cox elastic-net family. Owns the ranked survival structure; the
/// `Family` trait's `y` argument is the event-status vector.
#[derive(Debug, Clone)]
pub struct CoxNet {
    status: Array1<f64>,
    /// Observation indices sorted by ascending time.
    order: Vec<usize>,
    /// Ranges into `order` grouping tied times; the ranked structure is
    /// all the partial likelihood ever needs, so the raw times are not
    /// retained.
    groups: Vec<(usize, usize)>,
    ties: TieMethod,
}

/// Per-observation gradient and Hessian diagonal of the partial
/// likelihood, plus its value (for deviance).
struct PartialFit {
    grad: Array1<f64>,
    hess: Array1<f64>,
    loglik: f64,
}

impl CoxNet {
    pub fn new(time: Array1<f64>, status: Array1<f64>, ties: TieMethod) -> Result<Self> {
        if time.len() != status.len() {
            return Err(RustyNetError::DimensionMismatch(format!(
                "time has {} elements but status has {}",
                time.len(),
                status.len()
            )));
        }
        if time.iter().any(|t| !t.is_finite()) {
            return Err(RustyNetError::InvalidValue(
                "survival times must be finite".to_string(),
            ));
        }
        if status.iter().any(|&s| s != 0.0 && s != 1.0) {
            return Err(RustyNetError::InvalidValue(
                "event status must be 0 (censored) or 1 (event)".to_string(),
            ));
        }
        if !status.iter().any(|&s| s == 1.0) {
            return Err(RustyNetError::InvalidValue(
                "Cox fit needs at least one observed event".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..time.len()).collect();
        order.sort_by(|&a, &b| time[a].total_cmp(&time[b]));

        let mut groups = Vec::new();
        let mut start = 0;
        while start < order.len() {
            let t = time[order[start]];
            let mut end = start + 1;
            while end < order.len() && time[order[end]] == t {
                end += 1;
            }
            groups.push((start, end));
            start = end;
        }

        Ok(Self {
            status,
            order,
            groups,
            ties,
        })
    }

    pub fn tie_method(&self) -> TieMethod {
        self.ties
    }

    /// One sweep over the ranked observations: gradient, Hessian diagonal,
    /// and log partial likelihood at η.
    fn partial_fit(&self, eta: &Array1<f64>, weights: &Array1<f64>) -> PartialFit {
        let n = eta.len();

        // The partial likelihood only sees differences of η, so shift by
        // the mean before exponentiating and cap what remains.
        let shift = eta.sum() / n as f64;
        let u: Array1<f64> =
            Array1::from_iter((0..n).map(|i| weights[i] * (eta[i] - shift).min(ETA_CAP).exp()));

        let mut grad = Array1::zeros(n);
        let mut hess = Array1::zeros(n);
        let mut loglik = 0.0;

        // Suffix risk sum: everyone with time >= current group's time.
        let mut remaining: f64 = u.sum();
        // Accumulated risk-denominator sums over event groups already
        // passed (their times are <= every later observation's time).
        let mut cum1 = 0.0;
        let mut cum2 = 0.0;

        for &(start, end) in &self.groups {
            let members = &self.order[start..end];

            // Event mass within this tied group.
            let mut m = 0usize;
            let mut w_events = 0.0;
            let mut u_events = 0.0;
            for &i in members {
                if self.status[i] == 1.0 {
                    m += 1;
                    w_events += weights[i];
                    u_events += u[i];
                    loglik += weights[i] * (eta[i] - shift);
                }
            }

            // Group-level denominator sums. For Breslow the l-loop
            // collapses to a single full-risk term.
            let (mut c1, mut c2, mut g1, mut g2) = (0.0, 0.0, 0.0, 0.0);
            if m > 0 && w_events > 0.0 {
                match self.ties {
                    TieMethod::Breslow => {
                        let denom = remaining.max(WEIGHT_FLOOR);
                        c1 = w_events / denom;
                        c2 = w_events / (denom * denom);
                        g1 = c1;
                        g2 = c2;
                        loglik -= w_events * denom.ln();
                    }
                    TieMethod::Efron => {
                        let k = w_events / m as f64;
                        for l in 0..m {
                            let frac = l as f64 / m as f64;
                            let denom = (remaining - frac * u_events).max(WEIGHT_FLOOR);
                            c1 += k / denom;
                            c2 += k / (denom * denom);
                            g1 += k * (1.0 - frac) / denom;
                            g2 += k * (1.0 - frac) * (1.0 - frac) / (denom * denom);
                            loglik -= k * denom.ln();
                        }
                    }
                }
            }

            for &i in members {
                let (a, b) = if self.status[i] == 1.0 {
                    // Own group's terms carry the tie-adjusted factors.
                    (cum1 + g1, cum2 + g2)
                } else {
                    // Censored at this time: fully at risk for this
                    // group's events.
                    (cum1 + c1, cum2 + c2)
                };
                let d = if self.status[i] == 1.0 { weights[i] } else { 0.0 };
                grad[i] = d - u[i] * a;
                hess[i] = u[i] * a - u[i] * u[i] * b;
            }

            cum1 += c1;
            cum2 += c2;
            for &i in members {
                remaining -= u[i];
            }
        }

        PartialFit { grad, hess, loglik }
    }
}

impl Family for CoxNet {
    fn name(&self) -> &'static str {
        "cox"
    }

    fn has_intercept(&self) -> bool {
        false
    }

    fn null_eta(&self, _y: &Array1<f64>, _weights: &Array1<f64>) -> f64 {
        0.0
    }

    fn linearize(
        &self,
        _y: &Array1<f64>,
        eta: &Array1<f64>,
        weights: &Array1<f64>,
        z: &mut Array1<f64>,
        w: &mut Array1<f64>,
    ) {
        let fit = self.partial_fit(eta, weights);
        for i in 0..eta.len() {
            let wi = fit.hess[i].max(WEIGHT_FLOOR);
            w[i] = wi;
            z[i] = eta[i] + fit.grad[i] / wi;
        }
    }

    fn deviance(&self, _y: &Array1<f64>, eta: &Array1<f64>, weights: &Array1<f64>) -> f64 {
        -2.0 * self.partial_fit(eta, weights).loglik
    }

    fn check_degeneracy(
        &self,
        _y: &Array1<f64>,
        eta: &Array1<f64>,
        weights: &Array1<f64>,
    ) -> Option<Degeneracy> {
        let n = eta.len() as f64;
        let shift = eta.sum() / n;
        for (ei, wi) in eta.iter().zip(weights.iter()) {
            if *wi > 0.0 && (ei - shift) >= ETA_CAP {
                return Some(Degeneracy::MeanOverflow);
            }
        }
        None
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

    fn unit_weights(n: usize) -> Array1<f64> {
        Array1::from_elem(n, 1.0)
    }

    #[test]
    fn test_rejects_bad_inputs() {
        // No events at all
        let err = CoxNet::new(array![1.0, 2.0], array![0.0, 0.0], TieMethod::Efron);
        assert!(matches!(err, Err(RustyNetError::InvalidValue(_))));

        // Status outside {0, 1}
        let err = CoxNet::new(array![1.0, 2.0], array![1.0, 2.0], TieMethod::Efron);
        assert!(matches!(err, Err(RustyNetError::InvalidValue(_))));

        // Length mismatch
        let err = CoxNet::new(array![1.0, 2.0, 3.0], array![1.0, 0.0], TieMethod::Efron);
        assert!(matches!(err, Err(RustyNetError::DimensionMismatch(_))));
    }

    #[test]
    fn test_null_gradient_untied() {
        // times 1 < 2 < 3, events at 1 and 3, unit weights, η = 0.
        // Breslow risk sums: S(1) = 3, S(3) = 1.
        //   grad_0 = 1 − 1/3 = 2/3
        //   grad_1 = −1/3          (at risk for the first event only)
        //   grad_2 = 1 − (1/3 + 1) = −1/3
        let fam = CoxNet::new(
            array![1.0, 2.0, 3.0],
            array![1.0, 0.0, 1.0],
            TieMethod::Breslow,
        )
        .unwrap();
        let eta = Array1::zeros(3);
        let w = unit_weights(3);
        let fit = fam.partial_fit(&eta, &w);

        assert_abs_diff_eq!(fit.grad[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.grad[1], -1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.grad[2], -1.0 / 3.0, epsilon = 1e-12);
        // The score always sums to zero.
        assert_abs_diff_eq!(fit.grad.sum(), 0.0, epsilon = 1e-12);
        // Efron agrees with Breslow when there are no ties.
        let fam_e = CoxNet::new(
            array![1.0, 2.0, 3.0],
            array![1.0, 0.0, 1.0],
            TieMethod::Efron,
        )
        .unwrap();
        let fit_e = fam_e.partial_fit(&eta, &w);
        for i in 0..3 {
            assert_abs_diff_eq!(fit.grad[i], fit_e.grad[i], epsilon = 1e-12);
            assert_abs_diff_eq!(fit.hess[i], fit_e.hess[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_tie_methods_differ_on_ties() {
        // Two events tied at t = 1, one censored later.
        // Breslow: the censored observation sees c1 = W/S = 2/3.
        // Efron:   c1 = 1/3 + 1/2 = 5/6.
        let time = array![1.0, 1.0, 2.0];
        let status = array![1.0, 1.0, 0.0];
        let eta = Array1::zeros(3);
        let w = unit_weights(3);

        let breslow = CoxNet::new(time.clone(), status.clone(), TieMethod::Breslow).unwrap();
        let efron = CoxNet::new(time, status, TieMethod::Efron).unwrap();

        let fb = breslow.partial_fit(&eta, &w);
        let fe = efron.partial_fit(&eta, &w);

        assert_abs_diff_eq!(fb.grad[2], -2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fe.grad[2], -5.0 / 6.0, epsilon = 1e-12);
        // Both scores still sum to zero.
        assert_abs_diff_eq!(fb.grad.sum(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fe.grad.sum(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_partial_likelihood_shift_invariant() {
        let fam = CoxNet::new(
            array![2.0, 1.0, 3.0, 2.5],
            array![1.0, 1.0, 0.0, 1.0],
            TieMethod::Efron,
        )
        .unwrap();
        let w = unit_weights(4);
        let eta = array![0.3, -0.2, 0.9, 0.1];
        let shifted = eta.mapv(|e| e + 5.0);

        let d1 = fam.deviance(&Array1::zeros(4), &eta, &w);
        let d2 = fam.deviance(&Array1::zeros(4), &shifted, &w);
        assert_abs_diff_eq!(d1, d2, epsilon = 1e-9);
    }

    #[test]
    fn test_linearize_consistent_with_gradient() {
        // w·(z − η) must reproduce the gradient wherever the Hessian floor
        // is inactive.
        let fam = CoxNet::new(
            array![1.0, 2.0, 3.0, 4.0],
            array![1.0, 0.0, 1.0, 1.0],
            TieMethod::Efron,
        )
        .unwrap();
        let w_obs = unit_weights(4);
        let eta = array![0.1, -0.4, 0.2, 0.0];
        let fit = fam.partial_fit(&eta, &w_obs);

        let mut z = Array1::zeros(4);
        let mut w = Array1::zeros(4);
        fam.linearize(&Array1::zeros(4), &eta, &w_obs, &mut z, &mut w);

        for i in 0..4 {
            assert_abs_diff_eq!(w[i] * (z[i] - eta[i]), fit.grad[i], epsilon = 1e-10);
        }
    }
}
