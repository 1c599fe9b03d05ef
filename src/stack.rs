//! Image stack container, pixel sample types and ROI geometry.
//!
//! A stack is stored as a single `Array3` of shape `(frames, height, width)`.
//! 3D+time data keeps the same flat frame order as the acquisition software:
//! all z-slices of time point 0, then all z-slices of time point 1, and so on.

use crate::error::{BleachError, BleachResult};
use ndarray::{Array2, Array3, ArrayView2, ArrayViewMut2, Axis};
use num_traits::NumCast;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::ops::Range;
use std::str::FromStr;

/// A pixel sample type. Integer types saturate and round when written back,
/// floating point types are stored as they are.
pub trait Pixel:
    Copy + Default + Debug + Send + Sync + NumCast + 'static
{
    /// Number of representable intensity levels, `None` for floating point samples.
    const LEVELS: Option<usize>;

    /// Converts a corrected intensity back into the sample type.
    fn from_intensity(value: f64) -> Self;

    /// Whether `from_intensity(value)` has to clamp to the range of the type.
    fn saturates(_value: f64) -> bool {
        false
    }

    /// The sample as `f64`.
    fn intensity(self) -> f64 {
        self.to_f64().unwrap_or(0.0)
    }
}

macro_rules! impl_integer_pixel {
    ($t:ty, $levels:expr) => {
        impl Pixel for $t {
            const LEVELS: Option<usize> = Some($levels);

            fn from_intensity(value: f64) -> Self {
                let lo = <$t>::MIN as f64;
                let hi = <$t>::MAX as f64;
                // NaN does not survive the cast and ends up as 0
                NumCast::from(value.round().clamp(lo, hi)).unwrap_or_default()
            }

            fn saturates(value: f64) -> bool {
                let rounded = value.round();
                rounded < <$t>::MIN as f64 || rounded > <$t>::MAX as f64
            }
        }
    };
}

macro_rules! impl_float_pixel {
    ($t:ty) => {
        impl Pixel for $t {
            const LEVELS: Option<usize> = None;

            fn from_intensity(value: f64) -> Self {
                NumCast::from(value).unwrap_or_default()
            }
        }
    };
}

impl_integer_pixel!(u8, 256);
impl_integer_pixel!(u16, 65536);
impl_float_pixel!(f32);
impl_float_pixel!(f64);

/// Rectangular region of interest in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Roi {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Roi {
            x,
            y,
            width,
            height,
        }
    }

    /// ROI covering a whole `width` x `height` frame.
    pub fn full(width: usize, height: usize) -> Self {
        Roi::new(0, 0, width, height)
    }

    /// Checks that the ROI is non-empty and lies inside the frame.
    pub fn validate(&self, frame_width: usize, frame_height: usize) -> BleachResult<()> {
        let fits = self.width > 0
            && self.height > 0
            && self.x + self.width <= frame_width
            && self.y + self.height <= frame_height;
        if fits {
            Ok(())
        } else {
            Err(BleachError::RoiOutOfBounds {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                frame_width,
                frame_height,
            })
        }
    }

    /// Number of pixels covered by the ROI.
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

impl Display for Roi {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `x,y,width,height`.
impl FromStr for Roi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(format!(
                "ROI must be in format x,y,width,height, got: {}",
                s
            ));
        }
        let mut values = [0usize; 4];
        let names = ["x coordinate", "y coordinate", "width", "height"];
        for (i, part) in parts.iter().enumerate() {
            values[i] = part
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("Invalid {}: {}", names[i], part))?;
        }
        Ok(Roi::new(values[0], values[1], values[2], values[3]))
    }
}

/// Declared z/t structure of a 3D+time stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDims {
    pub zframes: usize,
    pub tframes: usize,
}

/// Resolved frame layout used by the samplers and correctors.
///
/// A plain time series is represented with `zframes == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    pub zframes: usize,
    pub tframes: usize,
}

impl StackLayout {
    /// True when each time point holds more than one z-slice.
    pub fn is_3dt(&self) -> bool {
        self.zframes > 1
    }

    /// Flat frame index of slice `z` at time point `t`.
    pub fn frame_index(&self, t: usize, z: usize) -> usize {
        t * self.zframes + z
    }

    /// Time point a flat frame index belongs to.
    pub fn time_point_of(&self, frame: usize) -> usize {
        frame / self.zframes
    }

    /// Flat frame indices of all slices of time point `t`.
    pub fn frames_of(&self, t: usize) -> Range<usize> {
        self.frame_index(t, 0)..self.frame_index(t + 1, 0)
    }
}

/// An ordered sequence of equally sized frames.
#[derive(Debug, Clone)]
pub struct ImageStack<T: Pixel> {
    data: Array3<T>,
    dims: Option<StackDims>,
}

impl<T: Pixel> ImageStack<T> {
    /// Wraps a `(frames, height, width)` array as a plain time series.
    pub fn new(data: Array3<T>) -> Self {
        ImageStack { data, dims: None }
    }

    /// Wraps a `(frames, height, width)` array declared as `zframes` x `tframes`.
    ///
    /// The declaration is only checked when the stack is processed.
    pub fn with_dims(data: Array3<T>, zframes: usize, tframes: usize) -> Self {
        ImageStack {
            data,
            dims: Some(StackDims { zframes, tframes }),
        }
    }

    /// Stacks individual frames. All frames must have the same shape.
    pub fn from_frames(frames: &[Array2<T>]) -> BleachResult<Self> {
        let first = frames.first().ok_or(BleachError::EmptyStack)?;
        let (height, width) = first.dim();
        let mut data = Array3::default((frames.len(), height, width));
        for (mut target, frame) in data.axis_iter_mut(Axis(0)).zip(frames) {
            if frame.dim() != (height, width) {
                return Err(BleachError::FrameSizeMismatch {
                    expected: (width, height),
                    actual: (frame.dim().1, frame.dim().0),
                });
            }
            target.assign(frame);
        }
        Ok(ImageStack::new(data))
    }

    pub fn n_frames(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn dims(&self) -> Option<StackDims> {
        self.dims
    }

    pub fn set_dims(&mut self, dims: Option<StackDims>) {
        self.dims = dims;
    }

    pub fn frame(&self, index: usize) -> ArrayView2<'_, T> {
        self.data.index_axis(Axis(0), index)
    }

    pub fn frame_mut(&mut self, index: usize) -> ArrayViewMut2<'_, T> {
        self.data.index_axis_mut(Axis(0), index)
    }

    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<T> {
        &mut self.data
    }

    pub fn into_data(self) -> Array3<T> {
        self.data
    }

    /// ROI to use for this stack, the whole frame when `roi` is `None`.
    pub fn resolve_roi(&self, roi: Option<Roi>) -> BleachResult<Roi> {
        let roi = roi.unwrap_or_else(|| Roi::full(self.width(), self.height()));
        roi.validate(self.width(), self.height())?;
        Ok(roi)
    }

    /// Resolves the frame layout and checks the declared dimensions.
    ///
    /// Only stacks with more than one slice *and* more than one time point are
    /// processed as 3D+time; every other declaration is treated as a plain time
    /// series over all frames, but must still cover the stack exactly.
    pub fn layout(&self) -> BleachResult<StackLayout> {
        let frames = self.n_frames();
        if frames == 0 || self.width() == 0 || self.height() == 0 {
            return Err(BleachError::EmptyStack);
        }
        match self.dims {
            Some(StackDims { zframes, tframes }) => {
                if zframes * tframes != frames {
                    return Err(BleachError::DimensionMismatch {
                        zframes,
                        tframes,
                        frames,
                    });
                }
                if zframes > 1 && tframes > 1 {
                    Ok(StackLayout { zframes, tframes })
                } else {
                    Ok(StackLayout {
                        zframes: 1,
                        tframes: frames,
                    })
                }
            }
            None => Ok(StackLayout {
                zframes: 1,
                tframes: frames,
            }),
        }
    }
}
