//! Photobleaching correction for time-lapse image stacks.
//!
//! Three strategies are available through [`correction::correct`]:
//!
//! - **Simple ratio**: every frame is scaled so that its mean intensity inside a
//!   region of interest matches the first frame (or a given baseline).
//! - **Exponential fit**: `a * exp(-b * t) + c` is fitted to the ROI means with
//!   a Nelder-Mead simplex and every frame is divided by the fitted curve.
//! - **Histogram matching**: the intensities of every frame are remapped onto the
//!   histogram of the first frame.
//!
//! 3D+time stacks are supported by declaring the number of z-slices and time
//! points; slices of one time point are then sampled and corrected together.

pub mod cancellable_loops;
pub mod config;
pub mod correction;
pub mod decay;
pub mod error;
pub mod fitter;
pub mod histogram;
pub mod io;
pub mod sampling;
pub mod stack;

pub use config::CorrectionConfig;
pub use correction::{correct, CorrectionMethod, CorrectionReport, RunControl};
pub use error::{BleachError, BleachResult};
pub use stack::{ImageStack, Roi, StackDims};
