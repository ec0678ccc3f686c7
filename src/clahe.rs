//! Contrast-limited adaptive histogram equalisation (CLAHE).
//!
//! The image is divided into square tiles. Each tile gets its own equalisation lookup table,
//! built from the tile's histogram after clipping it at a fraction of the tile's pixel count and
//! redistributing the clipped excess over all bins. Every pixel is then mapped through the tables
//! of the four nearest tile centres, bilinearly weighted by distance.

use ndarray::{s, Array2, ArrayView2};

/// Default tile size in pixels.
pub const TILE_SIZE: usize = 15;

/// Default clip limit, as a fraction of the pixels in a tile.
pub const CLIP_LIMIT: f64 = 0.01;

/// Number of histogram bins, one per 8-bit grey level.
const BINS: usize = 256;

/// Lookup table mapping a grey level to its equalised value in `0.0..=255.0`.
type Lut = [f64; BINS];

/// Clip a histogram at `limit` and spread the excess evenly over all bins.
fn clip_histogram(hist: &mut [usize; BINS], limit: usize) {
    let mut excess = 0;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }
    let increment = excess / BINS;
    let remainder = excess % BINS;
    for count in hist.iter_mut() {
        *count += increment;
    }
    if remainder > 0 {
        let step = BINS / remainder;
        for bin in (0..BINS).step_by(step).take(remainder) {
            hist[bin] += 1;
        }
    }
}

/// Build the lookup table of one tile.
fn tile_lut(tile: ArrayView2<u8>, clip_limit: f64) -> Lut {
    let mut hist = [0usize; BINS];
    for value in tile.iter() {
        hist[usize::from(*value)] += 1;
    }
    let pixels = tile.len();
    let limit = ((clip_limit * pixels as f64) as usize).max(1);
    clip_histogram(&mut hist, limit);

    let total: usize = hist.iter().sum();
    let mut lut = [0.0; BINS];
    let mut cumulative = 0;
    for (bin, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[bin] = cumulative as f64 * 255.0 / total as f64;
    }
    lut
}

/// Returns the two neighbouring tiles and the weight of the second for a position expressed in
/// tile-centre coordinates.
fn neighbours(position: f64, tiles: usize) -> (usize, usize, f64) {
    if position <= 0.0 {
        return (0, 0, 0.0);
    }
    let low = position.floor() as usize;
    if low + 1 >= tiles {
        return (tiles - 1, tiles - 1, 0.0);
    }
    (low, low + 1, position - low as f64)
}

/// Equalise an 8-bit image.
///
/// Returns an image of the same shape.
///
/// # Arguments
///
/// * `image`: Image to equalise
/// * `tile_size`: Side of the square tiles in pixels
/// * `clip_limit`: Histogram clip limit as a fraction of the pixels in a tile. `1.0` disables
///   clipping.
pub fn equalize_adapthist(image: ArrayView2<u8>, tile_size: usize, clip_limit: f64) -> Array2<u8> {
    let (rows, columns) = image.dim();
    let tile_size = tile_size.max(1);
    if rows == 0 || columns == 0 {
        return Array2::zeros((rows, columns));
    }
    let tiles_y = (rows + tile_size - 1) / tile_size;
    let tiles_x = (columns + tile_size - 1) / tile_size;

    let mut luts = Vec::with_capacity(tiles_y * tiles_x);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let tile = image.slice(s![
                ty * tile_size..((ty + 1) * tile_size).min(rows),
                tx * tile_size..((tx + 1) * tile_size).min(columns)
            ]);
            luts.push(tile_lut(tile, clip_limit));
        }
    }
    let lut = |ty: usize, tx: usize, value: usize| luts[ty * tiles_x + tx][value];

    let size = tile_size as f64;
    Array2::from_shape_fn((rows, columns), |(y, x)| {
        let value = usize::from(image[[y, x]]);
        let (y0, y1, wy) = neighbours((y as f64 + 0.5) / size - 0.5, tiles_y);
        let (x0, x1, wx) = neighbours((x as f64 + 0.5) / size - 0.5, tiles_x);
        let top = lut(y0, x0, value) * (1.0 - wx) + lut(y0, x1, value) * wx;
        let bottom = lut(y1, x0, value) * (1.0 - wx) + lut(y1, x1, value) * wx;
        (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8
    })
}
