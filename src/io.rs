//! Reading frames from and writing frames to image files.
//!
//! Every file holds one grayscale frame. Colour images are reduced to their
//! luminance, images with more than 8 bits per channel are read as 16-bit.

use crate::error::{BleachError, BleachResult};
use crate::stack::{ImageStack, Pixel};
use image::{ColorType, DynamicImage, ImageBuffer, Luma};
use ndarray::{Array2, ArrayView2, ErrorKind, ShapeError};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// A stack read from disk, in the bit depth of its first file.
#[derive(Debug, Clone)]
pub enum LoadedStack {
    Gray8(ImageStack<u8>),
    Gray16(ImageStack<u16>),
}

impl LoadedStack {
    pub fn n_frames(&self) -> usize {
        match self {
            LoadedStack::Gray8(stack) => stack.n_frames(),
            LoadedStack::Gray16(stack) => stack.n_frames(),
        }
    }
}

fn is_8_bit(color: ColorType) -> bool {
    matches!(
        color,
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8
    )
}

fn to_array<T: Pixel>(width: u32, height: u32, raw: Vec<T>) -> BleachResult<Array2<T>> {
    Ok(Array2::from_shape_vec((height as usize, width as usize), raw)?)
}

/// Sample types that can be written as a grayscale image.
pub trait GrayPixel: Pixel {
    fn save_frame(frame: ArrayView2<'_, Self>, path: &Path) -> BleachResult<()>;
}

macro_rules! impl_gray_pixel {
    ($t:ty) => {
        impl GrayPixel for $t {
            fn save_frame(frame: ArrayView2<'_, Self>, path: &Path) -> BleachResult<()> {
                let (height, width) = frame.dim();
                let buffer = ImageBuffer::<Luma<$t>, Vec<$t>>::from_raw(
                    width as u32,
                    height as u32,
                    frame.iter().copied().collect(),
                )
                .ok_or_else(|| ShapeError::from_kind(ErrorKind::IncompatibleShape))?;
                buffer.save(path)?;
                Ok(())
            }
        }
    };
}

impl_gray_pixel!(u8);
impl_gray_pixel!(u16);

/// Reads one frame per file, in the given order.
pub fn load_frames(paths: &[PathBuf]) -> BleachResult<LoadedStack> {
    if paths.is_empty() {
        return Err(BleachError::EmptyStack);
    }
    let images = paths
        .par_iter()
        .map(image::open)
        .collect::<Result<Vec<DynamicImage>, _>>()?;

    let color = images[0].color();
    log::info!(
        "loaded {} frames of {}x{} ({color:?})",
        images.len(),
        images[0].width(),
        images[0].height()
    );

    if is_8_bit(color) {
        let frames = images
            .into_iter()
            .map(|img| {
                let buffer = img.to_luma8();
                to_array(buffer.width(), buffer.height(), buffer.into_raw())
            })
            .collect::<BleachResult<Vec<_>>>()?;
        Ok(LoadedStack::Gray8(ImageStack::from_frames(&frames)?))
    } else {
        let frames = images
            .into_iter()
            .map(|img| {
                let buffer = img.to_luma16();
                to_array(buffer.width(), buffer.height(), buffer.into_raw())
            })
            .collect::<BleachResult<Vec<_>>>()?;
        Ok(LoadedStack::Gray16(ImageStack::from_frames(&frames)?))
    }
}

/// Writes frame `i` of `stack` to `out_dir` under the file name of `names[i]`.
pub fn save_frames<T: GrayPixel>(
    stack: &ImageStack<T>,
    names: &[PathBuf],
    out_dir: &Path,
) -> BleachResult<()> {
    std::fs::create_dir_all(out_dir)?;
    names
        .par_iter()
        .enumerate()
        .try_for_each(|(i, name)| {
            let file_name = name.file_name().ok_or_else(|| {
                BleachError::Config(format!("{} has no file name", name.display()))
            })?;
            T::save_frame(stack.frame(i), &out_dir.join(file_name))
        })?;
    log::info!("saved {} frames to {}", names.len(), out_dir.display());
    Ok(())
}

/// Writes the corrected stack with the file names of the inputs.
pub fn save_stack(stack: &LoadedStack, names: &[PathBuf], out_dir: &Path) -> BleachResult<()> {
    match stack {
        LoadedStack::Gray8(stack) => save_frames(stack, names, out_dir),
        LoadedStack::Gray16(stack) => save_frames(stack, names, out_dir),
    }
}
