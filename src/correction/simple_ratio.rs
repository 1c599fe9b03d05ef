use super::{
    check_ratios, multiply_frames, CorrectionMethod, CorrectionReport, Corrector, CorrectorConfig,
    RunControl,
};
use crate::error::{BleachError, BleachResult};
use crate::sampling::slice_means;
use crate::stack::{ImageStack, Pixel, Roi};

/// Scales every frame so that its ROI mean equals a baseline intensity.
///
/// Without a baseline (or with `0.0`) the ROI mean of frame 0 is used, also for
/// 3D+time stacks. Each slice of a 3D+time stack is scaled by its own ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimpleRatio {
    pub baseline: Option<f64>,
}

impl SimpleRatio {
    pub fn new(baseline: Option<f64>) -> Self {
        SimpleRatio { baseline }
    }

    /// User baseline, `None` when the first frame should provide it.
    fn requested_baseline(&self) -> BleachResult<Option<f64>> {
        match self.baseline {
            None => Ok(None),
            Some(b) if b == 0.0 => Ok(None),
            Some(b) if b.is_finite() && b > 0.0 => Ok(Some(b)),
            Some(b) => Err(BleachError::InvalidBaseline(b)),
        }
    }

    /// Computes the per-frame ratios without touching the stack.
    pub fn ratios<T: Pixel>(
        &self,
        stack: &ImageStack<T>,
        roi: Option<Roi>,
    ) -> BleachResult<(f64, Vec<f64>)> {
        let requested = self.requested_baseline()?;
        let layout = stack.layout()?;
        log::debug!(
            "simple ratio over {} slices x {} time points",
            layout.zframes,
            layout.tframes
        );
        let roi = stack.resolve_roi(roi)?;
        let means = slice_means(stack, &roi);

        let baseline = match requested {
            Some(b) => b,
            None => means[0],
        };
        log::info!("simple ratio baseline: {baseline:.4}");

        if let Some(frame) = means.iter().position(|&m| m == 0.0) {
            return Err(BleachError::NumericalDegeneracy(format!(
                "ROI mean of frame {frame} is zero"
            )));
        }
        let ratios: Vec<f64> = means.iter().map(|&m| baseline / m).collect();
        for (frame, (mean, ratio)) in means.iter().zip(&ratios).enumerate() {
            log::debug!(
                "frame {frame}: mean {mean:.4}, corrected {:.4}, ratio {ratio:.6}",
                mean * ratio
            );
        }
        check_ratios(&ratios)?;
        Ok((baseline, ratios))
    }
}

impl Corrector for SimpleRatio {
    fn config(&self) -> CorrectorConfig {
        CorrectorConfig {
            name: "Simple Ratio".to_string(),
            description: "Divides every frame by its ROI mean and scales it to the baseline \
                intensity. Suited for stacks with a flat background close to zero."
                .to_string(),
            hyperlink: Some((
                Some("Miura 2020".to_string()),
                "https://doi.org/10.12688/f1000research.27171.1".to_string(),
            )),
            method: CorrectionMethod::SimpleRatio,
        }
    }

    fn apply<T: Pixel>(
        &self,
        stack: &mut ImageStack<T>,
        roi: Option<Roi>,
        control: &RunControl,
    ) -> BleachResult<CorrectionReport> {
        let (_, ratios) = self.ratios(stack, roi)?;
        multiply_frames(stack, &ratios, control)?;
        Ok(CorrectionReport::from_ratios(
            CorrectionMethod::SimpleRatio,
            ratios,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::roi_mean;
    use approx::assert_abs_diff_eq;
    use ndarray::{s, Array3};

    #[test]
    fn test_frames_are_scaled_to_first_frame_mean() {
        let data = Array3::from_shape_fn((5, 6, 6), |(f, _, _)| (200.0 / (1.0 + f as f64)) as f32);
        let mut stack = ImageStack::new(data);
        let report = SimpleRatio::new(None)
            .apply(&mut stack, None, &RunControl::new())
            .unwrap();
        assert_abs_diff_eq!(report.ratios[0], 1.0);
        assert_abs_diff_eq!(report.ratios[3], 4.0, epsilon = 1e-5);
        let roi = Roi::full(6, 6);
        for f in 0..5 {
            assert_abs_diff_eq!(roi_mean(stack.frame(f), &roi), 200.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_explicit_baseline_and_zero_baseline() {
        let data = Array3::from_shape_fn((3, 2, 2), |(f, _, _)| (100 - 20 * f) as u16);
        let stack = ImageStack::new(data);
        let (baseline, ratios) = SimpleRatio::new(Some(50.0)).ratios(&stack, None).unwrap();
        assert_abs_diff_eq!(baseline, 50.0);
        assert_abs_diff_eq!(ratios[0], 0.5);
        assert_abs_diff_eq!(ratios[2], 50.0 / 60.0);

        let (baseline, _) = SimpleRatio::new(Some(0.0)).ratios(&stack, None).unwrap();
        assert_abs_diff_eq!(baseline, 100.0);

        assert!(matches!(
            SimpleRatio::new(Some(-1.0)).ratios(&stack, None),
            Err(BleachError::InvalidBaseline(_))
        ));
    }

    #[test]
    fn test_roi_restricts_sampling() {
        let mut data = Array3::<u8>::zeros((2, 4, 4));
        data.slice_mut(s![0, 0..2, 0..2]).fill(100);
        data.slice_mut(s![1, 0..2, 0..2]).fill(50);
        let stack = ImageStack::new(data);
        let (_, ratios) = SimpleRatio::new(None)
            .ratios(&stack, Some(Roi::new(0, 0, 2, 2)))
            .unwrap();
        assert_abs_diff_eq!(ratios[1], 2.0);
    }

    #[test]
    fn test_3dt_uses_slice_means_and_frame_0_baseline() {
        // 2 slices x 2 time points, slice intensities 100, 60 then 50, 30
        let values = [100u8, 60, 50, 30];
        let data = Array3::from_shape_fn((4, 3, 3), |(f, _, _)| values[f]);
        let mut stack = ImageStack::with_dims(data, 2, 2);
        let report = SimpleRatio::new(None)
            .apply(&mut stack, None, &RunControl::new())
            .unwrap();
        // baseline is the mean of frame 0 (slice 0, time point 0)
        assert_abs_diff_eq!(report.ratios[0], 1.0);
        assert_abs_diff_eq!(report.ratios[1], 100.0 / 60.0);
        assert_abs_diff_eq!(report.ratios[2], 2.0);
        assert_abs_diff_eq!(report.ratios[3], 100.0 / 30.0);
        for f in 0..4 {
            assert!(stack.frame(f).iter().all(|&v| v == 100));
        }
    }

    #[test]
    fn test_zero_mean_frame_leaves_stack_untouched() {
        let mut data = Array3::from_elem((3, 2, 2), 40u8);
        data.slice_mut(s![2, .., ..]).fill(0);
        let mut stack = ImageStack::new(data.clone());
        let result = SimpleRatio::new(None).apply(&mut stack, None, &RunControl::new());
        assert!(matches!(result, Err(BleachError::NumericalDegeneracy(_))));
        assert_eq!(stack.data(), &data);
    }

    #[test]
    fn test_config() {
        let config = SimpleRatio::default().config();
        assert_eq!(config.method, CorrectionMethod::SimpleRatio);
        assert_eq!(config.name, CorrectionMethod::SimpleRatio.to_string());
    }
}
