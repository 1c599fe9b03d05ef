//! Error types shared by the sampling, fitting, histogram and correction modules.

use std::io;
use thiserror::Error;

/// Result type for bleach correction operations
pub type BleachResult<T> = Result<T, BleachError>;

/// Errors that can occur during a correction run.
///
/// Everything raised by sampling or by the ratio computation is reported before
/// a single pixel of the stack has been touched.
#[derive(Error, Debug)]
pub enum BleachError {
    /// The first sample is not brighter than the last one, the decay model does not apply
    #[error("sequence is not decaying (first = {first:.3}, last = {last:.3})")]
    NotDecaying { first: f64, last: f64 },

    /// Declared z/t structure does not cover the stack
    #[error("{zframes} slices x {tframes} time frames do not match the stack length {frames}")]
    DimensionMismatch {
        zframes: usize,
        tframes: usize,
        frames: usize,
    },

    /// A denominator vanished or a value became non-finite
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// The stack does not contain any frame
    #[error("stack is empty")]
    EmptyStack,

    /// Frames of one stack must share their size
    #[error("frame size mismatch: expected {expected:?}, got {actual:?}")]
    FrameSizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// ROI is empty or reaches outside of the frame
    #[error("ROI ({x}, {y}, {width}x{height}) does not fit into a {frame_width}x{frame_height} frame")]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        frame_width: usize,
        frame_height: usize,
    },

    /// Control points of a piecewise linear CDF violate its invariants
    #[error("invalid control points: {0}")]
    InvalidControlPoints(String),

    /// Histograms of different lengths were combined
    #[error("histogram size mismatch: expected {expected}, got {actual}")]
    HistogramSizeMismatch { expected: usize, actual: usize },

    /// The requested operation needs a pixel type with a finite number of levels
    #[error("{0} is not supported for this pixel type")]
    UnsupportedPixelType(String),

    /// The simple ratio baseline must be finite and positive
    #[error("invalid baseline: {0}")]
    InvalidBaseline(f64),

    /// The run was cancelled through the abort flag
    #[error("correction aborted")]
    Aborted,

    /// Reading or writing frames failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Decoding or encoding an image failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Pixel buffer and frame shape disagree
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Loading or storing the configuration failed
    #[error("configuration error: {0}")]
    Config(String),
}
