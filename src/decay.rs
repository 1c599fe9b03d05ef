//! Exponential decay with offset, `I(t) = a * exp(-b * t) + c`.
//!
//! The offset matters: bleaching asymptotes to a non-zero background, a pure
//! exponential would push the correction ratios of late frames towards infinity.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Evaluates `a * exp(-b * t) + c`.
pub fn exponential_with_offset(a: f64, b: f64, c: f64, t: f64) -> f64 {
    a * (-b * t).exp() + c
}

/// Fitted parameters of the decay model.
///
/// - `a`: amplitude, the part of the signal that bleaches away
/// - `b`: decay rate per time point
/// - `c`: offset the signal settles at
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DecayModel {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl DecayModel {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        DecayModel { a, b, c }
    }

    pub(crate) fn from_slice(params: &[f64]) -> Self {
        DecayModel::new(params[0], params[1], params[2])
    }

    pub(crate) fn to_array(self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Model intensity at time point `t`.
    pub fn evaluate(&self, t: f64) -> f64 {
        exponential_with_offset(self.a, self.b, self.c, t)
    }

    /// Ratio that brings the modelled intensity at `t` back to the one at `t = 0`.
    ///
    /// Returns `None` when the model value at `t` vanishes or the ratio is not finite.
    pub fn correction_ratio(&self, t: f64) -> Option<f64> {
        let denominator = self.evaluate(t);
        if denominator.abs() < MIN_MODEL_VALUE {
            return None;
        }
        let ratio = self.evaluate(0.0) / denominator;
        ratio.is_finite().then_some(ratio)
    }
}

/// Smallest model value accepted as a ratio denominator.
pub const MIN_MODEL_VALUE: f64 = 1e-12;

impl Display for DecayModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "y = a*exp(-bx) + c, a = {:.4}, b = {:.6}, c = {:.4}",
            self.a, self.b, self.c
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_evaluate() {
        let model = DecayModel::new(150.0, 0.05, 10.0);
        assert_abs_diff_eq!(model.evaluate(0.0), 160.0);
        assert_abs_diff_eq!(
            model.evaluate(20.0),
            150.0 * (-1.0f64).exp() + 10.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(exponential_with_offset(1.0, 0.0, 2.0, 5.0), 3.0);
    }

    #[test]
    fn test_correction_ratio() {
        let model = DecayModel::new(100.0, 0.1, 0.0);
        assert_abs_diff_eq!(model.correction_ratio(0.0).unwrap(), 1.0);
        assert_abs_diff_eq!(
            model.correction_ratio(10.0).unwrap(),
            1.0f64.exp(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_correction_ratio_guards_vanishing_denominator() {
        // a * exp(-b * t) + c crosses zero at t = ln(2) / b
        let model = DecayModel::new(2.0, 1.0, -1.0);
        assert!(model.correction_ratio(2.0f64.ln()).is_none());
        assert!(model.correction_ratio(0.0).is_some());
    }
}
