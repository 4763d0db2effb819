use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array2, Array3, s};
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype};

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Unsupported TIFF sample format")]
    UnsupportedSampleFormat,

    #[error("TIFF page size does not match its declared dimensions")]
    PageSizeMismatch,

    #[error("Inconsistent page dimensions in TIFF stack")]
    InconsistentPages,

    #[error("Empty TIFF stack")]
    EmptyStack,

    #[error("Mask shape {actual:?} does not match reference shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
}

/// Read a multi-page TIFF into a `(slice, row, column)` stack.
pub fn load_stack(path: impl AsRef<Path>) -> Result<Array3<f32>, MaskError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut decoder = Decoder::new(reader)?;
    let mut pages: Vec<Array2<f32>> = Vec::new();

    loop {
        let (width, height) = decoder.dimensions()?;
        let page = match decoder.read_image()? {
            DecodingResult::U8(buffer) => to_page(buffer.into_iter().map(f32::from), width, height),
            DecodingResult::U16(buffer) => {
                to_page(buffer.into_iter().map(f32::from), width, height)
            }
            DecodingResult::U32(buffer) => {
                to_page(buffer.into_iter().map(|v| v as f32), width, height)
            }
            DecodingResult::F32(buffer) => to_page(buffer.into_iter(), width, height),
            DecodingResult::F64(buffer) => {
                to_page(buffer.into_iter().map(|v| v as f32), width, height)
            }
            _ => return Err(MaskError::UnsupportedSampleFormat),
        }?;
        pages.push(page);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    stack_pages(pages)
}

/// Write a volume as a multi-page 32-bit float TIFF, one page per slice.
pub fn write_stack(path: impl AsRef<Path>, volume: &Array3<f32>) -> Result<(), MaskError> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder = TiffEncoder::new(writer)?;
    let (_, height, width) = volume.dim();

    for slice in volume.outer_iter() {
        let data: Vec<f32> = slice.iter().copied().collect();
        encoder.write_image::<colortype::Gray32Float>(width as u32, height as u32, &data)?;
    }

    Ok(())
}

/// Union several binary mask stacks into one {0, 1} volume.
///
/// Each stack is loaded, flipped along the slice axis to match the DICOM
/// volume orientation, and summed into a zeroed accumulator of `shape`;
/// the sum is then thresholded at `epsilon`, so partially overlapping
/// regions do not double count. Summation commutes: the result is
/// independent of path order.
pub fn build_mask(
    paths: &[impl AsRef<Path>],
    shape: (usize, usize, usize),
    epsilon: f32,
) -> Result<Array3<f32>, MaskError> {
    let stacks = paths
        .iter()
        .map(|path| load_stack(path.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    union_stacks(stacks, shape, epsilon)
}

/// The accumulate-and-threshold half of [`build_mask`], operating on
/// already-loaded stacks.
pub fn union_stacks(
    stacks: Vec<Array3<f32>>,
    shape: (usize, usize, usize),
    epsilon: f32,
) -> Result<Array3<f32>, MaskError> {
    let mut accumulated = Array3::<f32>::zeros(shape);

    for stack in stacks {
        if stack.dim() != shape {
            return Err(MaskError::ShapeMismatch {
                expected: shape,
                actual: stack.dim(),
            });
        }
        accumulated += &stack.slice(s![..;-1, .., ..]);
    }

    Ok(accumulated.mapv(|value| if value > epsilon { 1.0 } else { 0.0 }))
}

fn to_page(
    values: impl Iterator<Item = f32>,
    width: u32,
    height: u32,
) -> Result<Array2<f32>, MaskError> {
    let data: Vec<f32> = values.collect();
    Array2::from_shape_vec((height as usize, width as usize), data)
        .map_err(|_| MaskError::PageSizeMismatch)
}

fn stack_pages(pages: Vec<Array2<f32>>) -> Result<Array3<f32>, MaskError> {
    let (height, width) = pages.first().ok_or(MaskError::EmptyStack)?.dim();
    if pages.iter().any(|page| page.dim() != (height, width)) {
        return Err(MaskError::InconsistentPages);
    }

    let mut stack = Array3::<f32>::zeros((pages.len(), height, width));
    for (i, page) in pages.iter().enumerate() {
        stack.slice_mut(s![i, .., ..]).assign(page);
    }
    Ok(stack)
}
