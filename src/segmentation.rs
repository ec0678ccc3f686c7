//! Segmentation file decoding.
//!
//! A segmentation file holds one or more maps. Each map starts with a header of six little-endian
//! `u16` values, the inclusive `x`, `y` and `z` ranges of the segmented box in the order
//! `x0 x1 y0 y1 z0 z1`. The header is followed by one byte per voxel of the box, in `z`, `x`, `y`
//! order. Nonzero bytes mark the segmented region.

use crate::error::FetcherError;

use ndarray::{s, Array3};

/// Size in bytes of a map header.
const HEADER_SIZE: usize = 6 * std::mem::size_of::<u16>();

/// Inclusive range of voxel indices along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisRange {
    /// First index
    pub start: usize,
    /// Last index (inclusive)
    pub end: usize,
}

impl AxisRange {
    /// Number of voxels in the range.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// One segmented box of a segmentation file.
#[derive(Debug, PartialEq)]
pub struct SegmentationMap {
    /// Range along the slice rows
    pub x: AxisRange,
    /// Range along the slice columns
    pub y: AxisRange,
    /// Range along the stack
    pub z: AxisRange,
    /// Voxels of the box with shape `(z, x, y)`
    pub data: Array3<u8>,
}

fn truncated(what: &str) -> FetcherError {
    FetcherError::SegmentationDecode {
        reason: format!("truncated {}", what),
    }
}

fn read_range(header: &[u8], axis: &str) -> Result<AxisRange, FetcherError> {
    let start = usize::from(u16::from_le_bytes([header[0], header[1]]));
    let end = usize::from(u16::from_le_bytes([header[2], header[3]]));
    if end < start {
        return Err(FetcherError::SegmentationDecode {
            reason: format!("{} range {}..={} is empty", axis, start, end),
        });
    }
    Ok(AxisRange { start, end })
}

/// Parse every map of a segmentation file.
///
/// # Arguments
///
/// * `bytes`: Content of the segmentation file
pub fn parse_maps(bytes: &[u8]) -> Result<Vec<SegmentationMap>, FetcherError> {
    let mut maps = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        if rest.len() < HEADER_SIZE {
            return Err(truncated("header"));
        }
        let (header, body) = rest.split_at(HEADER_SIZE);
        let x = read_range(&header[0..4], "x")?;
        let y = read_range(&header[4..8], "y")?;
        let z = read_range(&header[8..12], "z")?;
        let size = z.len() * x.len() * y.len();
        if body.len() < size {
            return Err(truncated("map data"));
        }
        let (data, tail) = body.split_at(size);
        let data = Array3::from_shape_vec((z.len(), x.len(), y.len()), data.to_vec())?;
        maps.push(SegmentationMap { x, y, z, data });
        rest = tail;
    }
    Ok(maps)
}

/// Parse the first map of a segmentation file.
///
/// # Arguments
///
/// * `bytes`: Content of the segmentation file
pub fn parse_first_map(bytes: &[u8]) -> Result<SegmentationMap, FetcherError> {
    parse_maps(bytes)?
        .into_iter()
        .next()
        .ok_or_else(|| FetcherError::SegmentationDecode {
            reason: "file contains no maps".to_string(),
        })
}

/// Place a segmented box into an all-zero mask volume.
///
/// Returns a volume of shape `(num_stacks, rows, columns)` which is 255 inside the segmented
/// region and 0 elsewhere.
///
/// # Arguments
///
/// * `map`: The segmented box
/// * `num_stacks`: Number of slices in the image stack
/// * `output_shape`: `(rows, columns)` of one slice
pub fn build_mask(
    map: &SegmentationMap,
    num_stacks: usize,
    output_shape: (usize, usize),
) -> Result<Array3<u8>, FetcherError> {
    let (rows, columns) = output_shape;
    if map.z.end >= num_stacks || map.x.end >= rows || map.y.end >= columns {
        return Err(FetcherError::SegmentationDecode {
            reason: format!(
                "box z {}..={} x {}..={} y {}..={} exceeds volume {:?}",
                map.z.start,
                map.z.end,
                map.x.start,
                map.x.end,
                map.y.start,
                map.y.end,
                (num_stacks, rows, columns)
            ),
        });
    }
    let mut mask = Array3::<u8>::zeros((num_stacks, rows, columns));
    mask.slice_mut(s![
        map.z.start..=map.z.end,
        map.x.start..=map.x.end,
        map.y.start..=map.y.end
    ])
    .assign(&map.data.mapv(|voxel| if voxel != 0 { 255 } else { 0 }));
    Ok(mask)
}

#[cfg(test)]
pub(crate) fn encode_map(
    x: (u16, u16),
    y: (u16, u16),
    z: (u16, u16),
    data: &[u8],
) -> Vec<u8> {
    let mut bytes = Vec::new();
    for value in [x.0, x.1, y.0, y.1, z.0, z.1] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend_from_slice(data);
    bytes
}
