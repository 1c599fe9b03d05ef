//! Reduction of a stack to one mean intensity per time point.

use crate::error::BleachResult;
use crate::stack::{ImageStack, Pixel, Roi, StackLayout};
use ndarray::parallel::prelude::*;
use ndarray::{s, ArrayView2, Axis};

/// Mean intensity of the pixels of `frame` inside `roi`.
///
/// The ROI must already be validated against the frame size.
pub fn roi_mean<T: Pixel>(frame: ArrayView2<'_, T>, roi: &Roi) -> f64 {
    let window = frame.slice(s![roi.y..roi.y + roi.height, roi.x..roi.x + roi.width]);
    let sum: f64 = window.iter().map(|v| v.intensity()).sum();
    sum / roi.area() as f64
}

/// One sampled intensity per time point.
///
/// `x` holds the time index, `y` the sampled mean.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl TimeSeries {
    /// Builds a series with time indices `0, 1, 2, ...`.
    pub fn from_values(y: Vec<f64>) -> Self {
        let x = (0..y.len()).map(|i| i as f64).collect();
        TimeSeries { x, y }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn first(&self) -> Option<f64> {
        self.y.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.y.last().copied()
    }
}

/// ROI mean of every frame of the stack, in frame order.
///
/// Frames are reduced in parallel; the result does not depend on scheduling.
pub fn slice_means<T: Pixel>(stack: &ImageStack<T>, roi: &Roi) -> Vec<f64> {
    stack
        .data()
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|frame| roi_mean(frame, roi))
        .collect()
}

/// Averages the per-slice means of each time point.
pub fn time_point_means(means: &[f64], layout: &StackLayout) -> Vec<f64> {
    (0..layout.tframes)
        .map(|t| {
            let slices = &means[layout.frames_of(t)];
            slices.iter().sum::<f64>() / layout.zframes as f64
        })
        .collect()
}

/// Samples the mean intensity inside `roi` for every time point of the stack.
///
/// For 3D+time stacks the value of a time point is the arithmetic mean of the
/// ROI means of its slices. The declared dimensions are checked before any
/// frame is read.
pub fn sample_time_series<T: Pixel>(
    stack: &ImageStack<T>,
    roi: Option<Roi>,
) -> BleachResult<TimeSeries> {
    let layout = stack.layout()?;
    let roi = stack.resolve_roi(roi)?;
    log::info!(
        "sampling {} time points x {} slices, ROI {}",
        layout.tframes,
        layout.zframes,
        roi
    );
    let means = slice_means(stack, &roi);
    Ok(TimeSeries::from_values(time_point_means(&means, &layout)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BleachError;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    #[test]
    fn test_roi_mean_uses_only_the_roi() {
        let mut data = Array3::<u8>::zeros((1, 4, 4));
        data.slice_mut(s![0, 1..3, 1..3]).fill(100);
        let stack = ImageStack::new(data);

        let inner = Roi::new(1, 1, 2, 2);
        assert_abs_diff_eq!(roi_mean(stack.frame(0), &inner), 100.0);

        let full = Roi::full(4, 4);
        assert_abs_diff_eq!(roi_mean(stack.frame(0), &full), 25.0);
    }

    #[test]
    fn test_time_series_2d() {
        let data = Array3::from_shape_fn((5, 3, 3), |(f, _, _)| (50 - f * 10) as u16);
        let stack = ImageStack::new(data);
        let series = sample_time_series(&stack, None).unwrap();
        assert_eq!(series.x, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(series.y, vec![50.0, 40.0, 30.0, 20.0, 10.0]);
    }

    #[test]
    fn test_time_series_3dt_averages_slices() {
        // 2 slices x 3 time points, slice z of time t has intensity 10 * t + z
        let data = Array3::from_shape_fn((6, 2, 2), |(f, _, _)| {
            let t = f / 2;
            let z = f % 2;
            (10 * t + z) as f32
        });
        let stack = ImageStack::with_dims(data, 2, 3);
        let series = sample_time_series(&stack, Some(Roi::new(0, 0, 1, 1))).unwrap();
        assert_eq!(series.len(), 3);
        assert_abs_diff_eq!(series.y[0], 0.5);
        assert_abs_diff_eq!(series.y[1], 10.5);
        assert_abs_diff_eq!(series.y[2], 20.5);
    }

    #[test]
    fn test_sampling_rejects_bad_roi() {
        let stack = ImageStack::new(Array3::<u8>::zeros((2, 4, 4)));
        assert!(matches!(
            sample_time_series(&stack, Some(Roi::new(3, 3, 2, 2))),
            Err(BleachError::RoiOutOfBounds { .. })
        ));
    }
}
