use crate::error::{BleachError, BleachResult};

/// Cumulative distribution over `levels` intensity levels, linear between control points.
///
/// The control points given by the user are framed by a synthetic start point
/// `(-1, 0)` and a synthetic end point `(levels - 1, 1)`, so the distribution
/// always starts at 0 and reaches 1 at the last level.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinearCdf {
    levels: usize,
    intensities: Vec<f64>,
    probabilities: Vec<f64>,
}

impl PiecewiseLinearCdf {
    /// Builds the distribution from `(intensity, cumulative probability)` pairs.
    ///
    /// Intensities must be strictly increasing and inside `[0, levels - 1]`,
    /// probabilities non-decreasing and inside `[0, 1]`.
    pub fn new(levels: usize, points: &[(usize, f64)]) -> BleachResult<Self> {
        if levels < 2 {
            return Err(BleachError::InvalidControlPoints(format!(
                "at least 2 intensity levels are required, got {levels}"
            )));
        }
        let last_level = levels - 1;

        let mut intensities = Vec::with_capacity(points.len() + 2);
        let mut probabilities = Vec::with_capacity(points.len() + 2);
        intensities.push(-1.0);
        probabilities.push(0.0);

        for (n, &(intensity, probability)) in points.iter().enumerate() {
            if intensity > last_level {
                return Err(BleachError::InvalidControlPoints(format!(
                    "intensity {intensity} of point {n} exceeds the last level {last_level}"
                )));
            }
            if n > 0 && intensity <= points[n - 1].0 {
                return Err(BleachError::InvalidControlPoints(format!(
                    "intensities must be strictly increasing, point {n} has {intensity} after {}",
                    points[n - 1].0
                )));
            }
            if !(0.0..=1.0).contains(&probability) {
                return Err(BleachError::InvalidControlPoints(format!(
                    "probability {probability} of point {n} is outside of [0, 1]"
                )));
            }
            if n > 0 && probability < points[n - 1].1 {
                return Err(BleachError::InvalidControlPoints(format!(
                    "probabilities must be non-decreasing, point {n} has {probability} after {}",
                    points[n - 1].1
                )));
            }
            intensities.push(intensity as f64);
            probabilities.push(probability);
        }

        intensities.push(last_level as f64);
        probabilities.push(1.0);

        Ok(PiecewiseLinearCdf {
            levels,
            intensities,
            probabilities,
        })
    }

    /// Number of intensity levels `K`.
    pub fn levels(&self) -> usize {
        self.levels
    }

    fn last_level(&self) -> f64 {
        (self.levels - 1) as f64
    }

    /// Cumulative probability at intensity `i`.
    pub fn evaluate(&self, i: f64) -> f64 {
        if i < 0.0 {
            return 0.0;
        }
        if i >= self.last_level() {
            return 1.0;
        }
        // last control point with intensity <= i, always exists thanks to (-1, 0)
        let s = self.intensities.partition_point(|&x| x <= i) - 1;
        let (x0, x1) = (self.intensities[s], self.intensities[s + 1]);
        let (p0, p1) = (self.probabilities[s], self.probabilities[s + 1]);
        let dx = x1 - x0;
        if dx <= 0.0 {
            return p0;
        }
        p0 + (i - x0) * (p1 - p0) / dx
    }

    /// Intensity level at which the distribution reaches `p`.
    pub fn invert(&self, p: f64) -> usize {
        if p.is_nan() || p < self.evaluate(0.0) {
            return 0;
        }
        if p >= 1.0 {
            return self.levels - 1;
        }
        // last control point with probability <= p
        let r = self.probabilities.partition_point(|&q| q <= p) - 1;
        let (x0, x1) = (self.intensities[r], self.intensities[r + 1]);
        let (p0, p1) = (self.probabilities[r], self.probabilities[r + 1]);
        let dp = p1 - p0;
        let x = if dp <= 0.0 {
            x0
        } else {
            x0 + (p - p0) * (x1 - x0) / dp
        };
        x.round().clamp(0.0, self.last_level()) as usize
    }

    /// Probability mass of every level implied by the distribution.
    pub fn pdf(&self) -> Vec<f64> {
        (0..self.levels)
            .map(|i| {
                let i = i as f64;
                self.evaluate(i) - self.evaluate(i - 1.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_point_cdf() -> PiecewiseLinearCdf {
        PiecewiseLinearCdf::new(256, &[(50, 0.2), (200, 0.9)]).unwrap()
    }

    #[test]
    fn test_evaluate_interpolates_between_points() {
        let cdf = two_point_cdf();
        assert_abs_diff_eq!(cdf.evaluate(-3.0), 0.0);
        assert_abs_diff_eq!(cdf.evaluate(50.0), 0.2);
        assert_abs_diff_eq!(cdf.evaluate(125.0), 0.55, epsilon = 1e-12);
        assert_abs_diff_eq!(cdf.evaluate(200.0), 0.9);
        assert_abs_diff_eq!(cdf.evaluate(255.0), 1.0);
        assert_abs_diff_eq!(cdf.evaluate(300.0), 1.0);
        // segment from the synthetic start point (-1, 0)
        assert_abs_diff_eq!(cdf.evaluate(0.0), 0.2 / 51.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invert_round_trips_within_one_level() {
        let cdf = two_point_cdf();
        for i in 0..256 {
            let back = cdf.invert(cdf.evaluate(i as f64)) as i64;
            assert!((back - i).abs() <= 1, "level {i} came back as {back}");
        }
    }

    #[test]
    fn test_invert_limits() {
        let cdf = two_point_cdf();
        assert_eq!(cdf.invert(0.0), 0);
        assert_eq!(cdf.invert(f64::NAN), 0);
        assert_eq!(cdf.invert(1.0), 255);
        assert_eq!(cdf.invert(2.0), 255);
    }

    #[test]
    fn test_evaluate_and_invert_are_monotone() {
        let cdf = PiecewiseLinearCdf::new(256, &[(10, 0.1), (11, 0.1), (127, 0.5), (255, 1.0)])
            .unwrap();
        let mut previous = 0.0;
        for i in -1..=256 {
            let p = cdf.evaluate(i as f64);
            assert!(p >= previous);
            previous = p;
        }
        let mut previous = 0;
        for n in 0..=1000 {
            let level = cdf.invert(n as f64 / 1000.0);
            assert!(level >= previous);
            assert!(level <= 255);
            previous = level;
        }
    }

    #[test]
    fn test_flat_segment_is_guarded() {
        // probability stays at 0.5 between 100 and 150
        let cdf = PiecewiseLinearCdf::new(256, &[(100, 0.5), (150, 0.5)]).unwrap();
        assert_eq!(cdf.invert(0.5), 150);
        assert_abs_diff_eq!(cdf.evaluate(120.0), 0.5);
    }

    #[test]
    fn test_pdf_sums_to_one() {
        let cdf = two_point_cdf();
        let pdf = cdf.pdf();
        assert_eq!(pdf.len(), 256);
        assert!(pdf.iter().all(|&p| p >= 0.0));
        assert_abs_diff_eq!(pdf.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_control_points() {
        let invalid = [
            PiecewiseLinearCdf::new(1, &[]),
            PiecewiseLinearCdf::new(256, &[(256, 0.5)]),
            PiecewiseLinearCdf::new(256, &[(100, 0.5), (100, 0.6)]),
            PiecewiseLinearCdf::new(256, &[(100, 0.5), (50, 0.6)]),
            PiecewiseLinearCdf::new(256, &[(100, 0.6), (150, 0.5)]),
            PiecewiseLinearCdf::new(256, &[(100, 1.5)]),
            PiecewiseLinearCdf::new(256, &[(100, f64::NAN)]),
        ];
        for result in invalid {
            assert!(matches!(result, Err(BleachError::InvalidControlPoints(_))));
        }
    }

    #[test]
    fn test_without_user_points_is_uniform() {
        let cdf = PiecewiseLinearCdf::new(256, &[]).unwrap();
        assert_eq!(cdf.levels(), 256);
        assert_abs_diff_eq!(cdf.evaluate(127.0), 0.5);
        assert_eq!(cdf.invert(0.5), 127);
    }
}
