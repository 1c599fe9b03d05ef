use crate::correction::CorrectionMethod;
use crate::fitter::FitOptions;
use crate::stack::StackDims;
use serde::{Deserialize, Serialize};

/// Settings of a correction run.
///
/// - `method`: strategy used by [`crate::correction::correct`].
/// - `baseline`: target intensity of the simple ratio method, `None` or `0.0`
///   for the ROI mean of the first frame.
/// - `fit`: iteration policy of the exponential fit.
/// - `dims`: z/t structure of the stack, `None` for a plain time series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub method: CorrectionMethod,
    pub baseline: Option<f64>,
    pub fit: FitOptions,
    pub dims: Option<StackDims>,
}
