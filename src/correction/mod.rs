//! Bleach correction strategies and the entry point that selects one of them.
//!
//! Every strategy computes everything it needs (sampled means, fitted model,
//! ratios or remapping tables) and checks it before the first pixel of the
//! stack is modified. The per-frame work itself runs in parallel and can be
//! cancelled through [`RunControl`].

pub mod exponential_fit;
pub mod histogram_match;
pub mod simple_ratio;

use crate::cancellable_loops::{par_for_each_cancellable, ProgressCounter};
use crate::config::CorrectionConfig;
use crate::error::{BleachError, BleachResult};
use crate::fitter::FitResult;
use crate::stack::{ImageStack, Pixel, Roi};
use exponential_fit::ExponentialFit;
use histogram_match::HistogramMatch;
use ndarray::parallel::prelude::*;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use simple_ratio::SimpleRatio;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::atomic::Ordering::Relaxed;
use std::sync::{Arc, RwLock};

/// The available correction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CorrectionMethod {
    /// Scale every frame so that its ROI mean matches a baseline.
    #[default]
    SimpleRatio,
    /// Scale every frame by the inverse of a fitted exponential decay.
    ExponentialFit,
    /// Remap the intensities of every frame onto the histogram of the first one.
    HistogramMatching,
}

impl Display for CorrectionMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrectionMethod::SimpleRatio => {
                write!(f, "Simple Ratio")
            }
            CorrectionMethod::ExponentialFit => {
                write!(f, "Exponential Fit")
            }
            CorrectionMethod::HistogramMatching => {
                write!(f, "Histogram Matching")
            }
        }
    }
}

/// Metadata of a correction strategy.
///
/// # Fields
/// - `name`: human-readable name of the strategy.
/// - `description`: what the strategy does and what it is good for.
/// - `hyperlink`: optional DOI or reference link with label.
/// - `method`: the `CorrectionMethod` the strategy implements.
#[derive(Debug, Clone)]
pub struct CorrectorConfig {
    pub name: String,
    pub description: String,
    pub hyperlink: Option<(Option<String>, String)>, // (optional_label, url)
    pub method: CorrectionMethod,
}

/// Progress reporting and cancellation of a correction run.
///
/// `progress` holds `Some(fraction)` while frames are being corrected and
/// `None` otherwise. Raising `abort_flag` stops the run with
/// [`BleachError::Aborted`]; [`correct`] lowers it again before returning.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    pub progress: Arc<RwLock<Option<f32>>>,
    pub abort_flag: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the running correction.
    pub fn abort(&self) {
        self.abort_flag.store(true, Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_flag.load(Relaxed)
    }

    /// Current progress, `None` when no frame loop is running.
    pub fn progress(&self) -> Option<f32> {
        self.progress.read().ok().and_then(|p| *p)
    }
}

/// What a correction run computed and applied.
///
/// - `ratios`: one multiplicative factor per frame (empty for histogram matching).
/// - `tables`: one remapping table per time point (empty for the ratio methods).
#[derive(Debug, Clone)]
pub struct CorrectionReport {
    pub method: CorrectionMethod,
    pub fit: Option<FitResult>,
    pub ratios: Vec<f64>,
    pub tables: Vec<Vec<usize>>,
}

impl CorrectionReport {
    pub(crate) fn from_ratios(method: CorrectionMethod, ratios: Vec<f64>) -> Self {
        CorrectionReport {
            method,
            fit: None,
            ratios,
            tables: Vec::new(),
        }
    }
}

/// A bleach correction strategy.
pub trait Corrector: Debug {
    /// Returns the strategy metadata, including name, description and method.
    fn config(&self) -> CorrectorConfig;

    /// Corrects `stack` in place.
    ///
    /// `roi` selects the sampled region, the whole frame when `None`. Errors
    /// other than [`BleachError::Aborted`] leave the stack untouched.
    fn apply<T: Pixel>(
        &self,
        stack: &mut ImageStack<T>,
        roi: Option<Roi>,
        control: &RunControl,
    ) -> BleachResult<CorrectionReport>;
}

/// Corrects `stack` in place with the method selected in `config`.
///
/// Dimensions declared in `config` replace the ones attached to the stack.
pub fn correct<T: Pixel>(
    stack: &mut ImageStack<T>,
    roi: Option<Roi>,
    config: &CorrectionConfig,
    control: &RunControl,
) -> BleachResult<CorrectionReport> {
    if config.dims.is_some() {
        stack.set_dims(config.dims);
    }
    log::info!(
        "{} correction of {} frames ({}x{})",
        config.method,
        stack.n_frames(),
        stack.width(),
        stack.height()
    );

    let result = match config.method {
        CorrectionMethod::SimpleRatio => {
            SimpleRatio::new(config.baseline).apply(stack, roi, control)
        }
        CorrectionMethod::ExponentialFit => {
            ExponentialFit::new(config.fit).apply(stack, roi, control)
        }
        CorrectionMethod::HistogramMatching => HistogramMatch::new().apply(stack, roi, control),
    };

    match &result {
        Ok(_) => log::info!("{} correction finished", config.method),
        Err(BleachError::Aborted) => {
            log::warn!("{} correction aborted", config.method);
            control.abort_flag.store(false, Relaxed);
        }
        Err(e) => log::error!("{} correction failed: {e}", config.method),
    }
    result
}

/// Checks that every ratio can be applied, naming the first frame that cannot.
pub(crate) fn check_ratios(ratios: &[f64]) -> BleachResult<()> {
    match ratios.iter().position(|r| !r.is_finite()) {
        Some(frame) => Err(BleachError::NumericalDegeneracy(format!(
            "correction ratio of frame {frame} is {}",
            ratios[frame]
        ))),
        None => Ok(()),
    }
}

/// Multiplies every pixel of frame `i` by `ratios[i]`, frames in parallel.
pub(crate) fn multiply_frames<T: Pixel>(
    stack: &mut ImageStack<T>,
    ratios: &[f64],
    control: &RunControl,
) -> BleachResult<()> {
    let counter = ProgressCounter::new(ratios.len(), &control.progress);
    let clamped = AtomicUsize::new(0);
    let completed = par_for_each_cancellable(
        stack
            .data_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(ratios.par_iter()),
        &control.abort_flag,
        |(mut frame, &ratio)| {
            let mut saturated = 0;
            frame.mapv_inplace(|v| {
                let corrected = v.intensity() * ratio;
                if T::saturates(corrected) {
                    saturated += 1;
                }
                T::from_intensity(corrected)
            });
            if saturated > 0 {
                clamped.fetch_add(saturated, Relaxed);
            }
            counter.tick();
        },
    );
    let clamped = clamped.into_inner();
    if clamped > 0 {
        log::warn!("{clamped} corrected pixels were clamped to the range of the sample type");
    }
    if completed {
        Ok(())
    } else {
        Err(BleachError::Aborted)
    }
}
