//! Intensity histograms, their cumulative distributions and remapping tables.
//!
//! Histograms are plain `u64` counts indexed by intensity level. A CDF is the
//! running sum of a histogram divided by its total count, so its last entry is
//! exactly 1 for any non-empty histogram.

/// Remapping tables from one histogram or distribution to another.
pub mod matcher;

/// Cumulative distribution defined by a few control points.
pub mod piecewise;

use crate::error::{BleachError, BleachResult};
use crate::stack::Pixel;
use ndarray::{ArrayView2, ArrayViewMut2};

/// Number of histogram bins of the pixel type `T`.
pub fn levels_of<T: Pixel>() -> BleachResult<usize> {
    T::LEVELS.ok_or_else(|| {
        BleachError::UnsupportedPixelType(format!(
            "a histogram of {}",
            std::any::type_name::<T>()
        ))
    })
}

/// Counts the intensity levels of `frame` into a histogram with `levels` bins.
///
/// Values above the last bin are counted in the last bin.
pub fn frame_histogram<T: Pixel>(frame: ArrayView2<'_, T>, levels: usize) -> Vec<u64> {
    let mut histogram = vec![0u64; levels];
    let last = levels.saturating_sub(1);
    for value in frame.iter() {
        let level = (value.intensity().max(0.0) as usize).min(last);
        histogram[level] += 1;
    }
    histogram
}

/// Adds `other` bin by bin into `histogram`.
pub fn accumulate(histogram: &mut [u64], other: &[u64]) -> BleachResult<()> {
    if histogram.len() != other.len() {
        return Err(BleachError::HistogramSizeMismatch {
            expected: histogram.len(),
            actual: other.len(),
        });
    }
    for (h, o) in histogram.iter_mut().zip(other) {
        *h += o;
    }
    Ok(())
}

fn total_count(histogram: &[u64]) -> BleachResult<u64> {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        Err(BleachError::NumericalDegeneracy(
            "histogram without any counts".to_string(),
        ))
    } else {
        Ok(total)
    }
}

/// Cumulative distribution of `histogram`.
pub fn cdf(histogram: &[u64]) -> BleachResult<Vec<f64>> {
    let total = total_count(histogram)? as f64;
    let mut running = 0u64;
    Ok(histogram
        .iter()
        .map(|&count| {
            running += count;
            running as f64 / total
        })
        .collect())
}

/// Probability mass of every bin of `histogram`.
pub fn pdf(histogram: &[u64]) -> BleachResult<Vec<f64>> {
    let total = total_count(histogram)? as f64;
    Ok(histogram.iter().map(|&count| count as f64 / total).collect())
}

/// Scales `histogram` so that its largest bin is 1. `None` for an all-zero histogram.
pub fn normalize_histogram(histogram: &[u64]) -> Option<Vec<f64>> {
    let max = histogram.iter().copied().max().filter(|&m| m > 0)? as f64;
    Some(histogram.iter().map(|&count| count as f64 / max).collect())
}

/// Synthetic 256-bin histogram of a Gaussian centred on `mean`.
pub fn gaussian_histogram(mean: f64, sigma: f64) -> Vec<u64> {
    let sigma2 = 2.0 * sigma * sigma;
    (0..256)
        .map(|i| {
            let x = mean - i as f64;
            let g = (-(x * x) / sigma2).exp() / sigma;
            (10000.0 * g).round() as u64
        })
        .collect()
}

/// Replaces every pixel of `frame` by its entry in `table`.
pub fn apply_table<T: Pixel>(mut frame: ArrayViewMut2<'_, T>, table: &[usize]) {
    let last = table.len().saturating_sub(1);
    frame.mapv_inplace(|value| {
        let level = (value.intensity().max(0.0) as usize).min(last);
        T::from_intensity(table[level] as f64)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_cdf_and_pdf() {
        let h = [1, 1, 2, 0];
        let p = cdf(&h).unwrap();
        assert_eq!(p, vec![0.25, 0.5, 1.0, 1.0]);
        let d = pdf(&h).unwrap();
        assert_eq!(d, vec![0.25, 0.25, 0.5, 0.0]);
    }

    #[test]
    fn test_cdf_of_empty_histogram_is_degenerate() {
        assert!(matches!(
            cdf(&[0, 0, 0]),
            Err(BleachError::NumericalDegeneracy(_))
        ));
    }

    #[test]
    fn test_normalize_histogram() {
        assert_eq!(normalize_histogram(&[0, 2, 4]), Some(vec![0.0, 0.5, 1.0]));
        assert_eq!(normalize_histogram(&[0, 0]), None);
    }

    #[test]
    fn test_gaussian_histogram_peaks_at_mean() {
        let h = gaussian_histogram(128.0, 50.0);
        assert_eq!(h.len(), 256);
        // neighbouring levels round to the same count, so check the value not the argmax
        assert!(h.iter().all(|&count| count <= h[128]));
        assert!(h[0] < h[128]);
        assert_eq!(h[128], 200);
        assert_abs_diff_eq!(h[100] as f64, h[156] as f64);
    }

    #[test]
    fn test_frame_histogram_and_table() {
        let frame = array![[0u8, 1, 1], [3, 3, 3]];
        let h = frame_histogram(frame.view(), 4);
        assert_eq!(h, vec![1, 2, 0, 3]);

        let mut total = vec![0u64; 4];
        accumulate(&mut total, &h).unwrap();
        accumulate(&mut total, &h).unwrap();
        assert_eq!(total, vec![2, 4, 0, 6]);
        assert!(accumulate(&mut total, &[1, 2]).is_err());

        let mut frame = frame;
        apply_table(frame.view_mut(), &[3, 2, 1, 0]);
        assert_eq!(frame, array![[3u8, 2, 2], [0, 0, 0]]);
    }

    #[test]
    fn test_levels_of() {
        assert_eq!(levels_of::<u8>().unwrap(), 256);
        assert_eq!(levels_of::<u16>().unwrap(), 65536);
        assert!(matches!(
            levels_of::<f32>(),
            Err(BleachError::UnsupportedPixelType(_))
        ));
    }
}
