use super::{CorrectionMethod, CorrectionReport, Corrector, CorrectorConfig, RunControl};
use crate::cancellable_loops::{par_for_each_cancellable, par_map_cancellable, ProgressCounter};
use crate::error::{BleachError, BleachResult};
use crate::histogram::matcher::match_histograms;
use crate::histogram::{accumulate, apply_table, frame_histogram, levels_of};
use crate::stack::{ImageStack, Pixel, Roi, StackLayout};
use ndarray::parallel::prelude::*;
use ndarray::Axis;

/// Remaps the intensities of every time point onto the histogram of the first one.
///
/// Works on whole frames of integer stacks. For 3D+time stacks the histograms
/// of all slices of a time point are pooled and one table is applied to all of
/// them. Good for segmentation, but the intensities are no longer quantitative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramMatch;

impl HistogramMatch {
    pub fn new() -> Self {
        HistogramMatch
    }

    /// Pooled histogram of every time point, `None` if cancelled.
    fn time_point_histograms<T: Pixel>(
        stack: &ImageStack<T>,
        layout: &StackLayout,
        levels: usize,
        control: &RunControl,
    ) -> BleachResult<Option<Vec<Vec<u64>>>> {
        let pooled = par_map_cancellable(
            0..layout.tframes,
            &control.abort_flag,
            |t| -> BleachResult<Vec<u64>> {
                let mut pooled = vec![0u64; levels];
                for frame in layout.frames_of(t) {
                    accumulate(&mut pooled, &frame_histogram(stack.frame(frame), levels))?;
                }
                Ok(pooled)
            },
        );
        pooled
            .map(|h| h.into_iter().collect::<BleachResult<Vec<_>>>())
            .transpose()
    }

    /// Computes one remapping table per time point without touching the stack.
    pub fn tables<T: Pixel>(
        &self,
        stack: &ImageStack<T>,
        control: &RunControl,
    ) -> BleachResult<Vec<Vec<usize>>> {
        let levels = levels_of::<T>()?;
        let layout = stack.layout()?;
        let histograms = Self::time_point_histograms(stack, &layout, levels, control)?
            .ok_or(BleachError::Aborted)?;
        let reference = &histograms[0];
        log::info!(
            "matching {} time points onto a {}-level reference histogram",
            layout.tframes,
            levels
        );
        histograms
            .iter()
            .map(|h| match_histograms(h, reference))
            .collect()
    }
}

impl Corrector for HistogramMatch {
    fn config(&self) -> CorrectorConfig {
        CorrectorConfig {
            name: "Histogram Matching".to_string(),
            description: "Matches the intensity histogram of every frame to the first frame. \
                Restores the appearance for segmentation, not for intensity quantification."
                .to_string(),
            hyperlink: Some((
                Some("Miura 2020".to_string()),
                "https://doi.org/10.12688/f1000research.27171.1".to_string(),
            )),
            method: CorrectionMethod::HistogramMatching,
        }
    }

    fn apply<T: Pixel>(
        &self,
        stack: &mut ImageStack<T>,
        roi: Option<Roi>,
        control: &RunControl,
    ) -> BleachResult<CorrectionReport> {
        if let Some(roi) = roi {
            log::debug!("histogram matching uses whole frames, ignoring ROI {roi}");
        }
        let tables = self.tables(stack, control)?;
        let layout = stack.layout()?;

        let counter = ProgressCounter::new(stack.n_frames(), &control.progress);
        let completed = par_for_each_cancellable(
            stack
                .data_mut()
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate(),
            &control.abort_flag,
            |(frame, view)| {
                apply_table(view, &tables[layout.time_point_of(frame)]);
                counter.tick();
            },
        );
        if !completed {
            return Err(BleachError::Aborted);
        }

        Ok(CorrectionReport {
            method: CorrectionMethod::HistogramMatching,
            fit: None,
            ratios: Vec::new(),
            tables,
        })
    }
}
