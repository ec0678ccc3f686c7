//! Slice rendering and segmentation overlays.

use crate::clahe;
use crate::error::FetcherError;

use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use ndarray_stats::QuantileExt;

/// Rescale a slice so that its maximum maps to 255.
///
/// Values are truncated to 8 bits after scaling. A slice whose maximum is not positive, or which
/// has no defined maximum, becomes all zeros.
///
/// # Arguments
///
/// * `slice`: Slice intensities
pub fn stretch(slice: ArrayView2<f32>) -> Array2<u8> {
    let max = slice.max().map(|max| *max).unwrap_or(0.0);
    if !max.is_finite() || max <= 0.0 {
        return Array2::zeros(slice.dim());
    }
    slice.mapv(|value| (255.0 * (value / max)).clamp(0.0, 255.0) as u8)
}

/// Render a slice for display.
///
/// The slice is max-normalised to 8 bits and then contrast enhanced with CLAHE. An all-zero slice
/// renders as an all-zero image.
///
/// # Arguments
///
/// * `slice`: Slice intensities
pub fn render_slice(slice: ArrayView2<f32>) -> Array2<u8> {
    let stretched = stretch(slice);
    if stretched.iter().all(|value| *value == 0) {
        return stretched;
    }
    clahe::equalize_adapthist(stretched.view(), clahe::TILE_SIZE, clahe::CLIP_LIMIT)
}

/// Replicate a grey image into the three channels of an RGB image of shape `(rows, columns, 3)`.
pub fn to_rgb(image: ArrayView2<u8>) -> Array3<u8> {
    let (rows, columns) = image.dim();
    Array3::from_shape_fn((rows, columns, 3), |(y, x, _)| image[[y, x]])
}

/// Blend a rendered slice with a segmentation mask.
///
/// The tinted image is the RGB slice with its green channel raised to the mask wherever the mask
/// is brighter. The result is `(1 - alpha) * base + alpha * tinted`, rounded to 8 bits.
///
/// # Arguments
///
/// * `image`: Rendered slice
/// * `mask`: Mask of the same shape, 255 inside the segmented region and 0 elsewhere
/// * `alpha`: Blend factor in `0.0..=1.0`
pub fn overlay(
    image: ArrayView2<u8>,
    mask: ArrayView2<u8>,
    alpha: f64,
) -> Result<Array3<u8>, FetcherError> {
    if image.dim() != mask.dim() {
        return Err(FetcherError::SegmentationDecode {
            reason: format!(
                "mask shape {:?} does not match slice shape {:?}",
                mask.dim(),
                image.dim()
            ),
        });
    }
    let base = to_rgb(image);
    let mut tinted = base.clone();
    tinted
        .index_axis_mut(Axis(2), 1)
        .zip_mut_with(&mask, |green, mask| *green = (*green).max(*mask));

    let alpha = alpha.clamp(0.0, 1.0);
    let mut blended = base;
    blended.zip_mut_with(&tinted, |base, tinted| {
        let value = (1.0 - alpha) * f64::from(*base) + alpha * f64::from(*tinted);
        *base = value.round().clamp(0.0, 255.0) as u8;
    });
    Ok(blended)
}

/// Encode a grey image as PNG.
pub fn encode_gray_png(image: &Array2<u8>) -> Result<Vec<u8>, FetcherError> {
    let (rows, columns) = image.dim();
    let pixels: Vec<u8> = image.iter().copied().collect();
    encode_png(&pixels, columns, rows, ExtendedColorType::L8)
}

/// Encode an RGB image of shape `(rows, columns, 3)` as PNG.
pub fn encode_rgb_png(image: &Array3<u8>) -> Result<Vec<u8>, FetcherError> {
    let (rows, columns, _) = image.dim();
    let pixels: Vec<u8> = image.iter().copied().collect();
    encode_png(&pixels, columns, rows, ExtendedColorType::Rgb8)
}

fn encode_png(
    pixels: &[u8],
    width: usize,
    height: usize,
    color_type: ExtendedColorType,
) -> Result<Vec<u8>, FetcherError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    encoder.write_image(
        pixels,
        u32::try_from(width)?,
        u32::try_from(height)?,
        color_type,
    )?;
    Ok(buf)
}
