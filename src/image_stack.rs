//! Image stack fetching.
//!
//! A stack is built by downloading every slice file of a sample into a temporary directory and
//! decoding the files in the order of their sorted links.

use crate::app_state::AppState;
use crate::downloader::{download_to_file, FileFetcher};
use crate::error::FetcherError;
use crate::models::Sample;
use crate::resource_manager::ResourceManager;
use crate::scans;

use dicom::pixeldata::PixelDecoder;
use futures::stream::{self, StreamExt, TryStreamExt};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decoder of one downloaded slice file.
pub trait SliceDecoder: Send + Sync {
    /// Decode a slice file into an intensity image of shape `(rows, columns)`.
    fn decode(&self, path: &Path) -> Result<Array2<f32>, FetcherError>;
}

/// [SliceDecoder] for DICOM files.
///
/// Only the first frame of the pixel data is used.
#[derive(Debug, Default)]
pub struct DicomDecoder;

impl SliceDecoder for DicomDecoder {
    fn decode(&self, path: &Path) -> Result<Array2<f32>, FetcherError> {
        let decode_error = |reason: String| FetcherError::DicomDecode {
            file: path.display().to_string(),
            reason,
        };
        let object = dicom::object::open_file(path).map_err(|err| decode_error(err.to_string()))?;
        let pixel_data = object
            .decode_pixel_data()
            .map_err(|err| decode_error(err.to_string()))?;
        let rows = usize::try_from(pixel_data.rows())?;
        let columns = usize::try_from(pixel_data.columns())?;
        let values: Vec<f32> = pixel_data
            .to_vec_frame(0)
            .map_err(|err| decode_error(err.to_string()))?;
        Array2::from_shape_vec((rows, columns), values)
            .map_err(|err| decode_error(err.to_string()))
    }
}

/// A decoded stack together with the sample it belongs to.
#[derive(Debug)]
pub struct ImageStack {
    /// The resolved sample
    pub sample: Sample,
    /// Volume of shape `(slices, rows, columns)`
    pub volume: Array3<f32>,
}

impl ImageStack {
    /// Number of slices.
    pub fn len(&self) -> usize {
        self.volume.len_of(Axis(0))
    }

    /// Whether the stack has no slices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(rows, columns)` of one slice.
    pub fn slice_shape(&self) -> (usize, usize) {
        let (_, rows, columns) = self.volume.dim();
        (rows, columns)
    }

    /// Return one slice, failing if the index is out of range.
    pub fn slice(&self, slice_number: usize) -> Result<ArrayView2<f32>, FetcherError> {
        if slice_number >= self.len() {
            return Err(FetcherError::not_found(format!(
                "slice {} of sample {} of patient {}",
                slice_number, self.sample.sample, self.sample.patient
            )));
        }
        Ok(self.volume.index_axis(Axis(0), slice_number))
    }
}

/// Download files concurrently into a directory.
///
/// Returns the local paths in the order of `links`. The file for link `i` is named `{i}.dcm`.
/// Every download must succeed.
///
/// # Arguments
///
/// * `fetcher`: Source of the files
/// * `resource_manager`: ResourceManager object
/// * `links`: Links to the files
/// * `dir`: Destination directory
pub async fn download_all(
    fetcher: &dyn FileFetcher,
    resource_manager: &ResourceManager,
    links: &[String],
    dir: &Path,
) -> Result<Vec<PathBuf>, FetcherError> {
    let paths: Vec<PathBuf> = (0..links.len())
        .map(|index| dir.join(format!("{}.dcm", index)))
        .collect();
    // Concurrency is bounded by the resource manager's connection permits.
    let downloads: Vec<_> = links
        .iter()
        .zip(paths.iter())
        .map(|(link, path)| download_to_file(fetcher, resource_manager, link, path))
        .collect();
    stream::iter(downloads)
        .buffer_unordered(links.len().max(1))
        .try_collect::<Vec<_>>()
        .await?;
    Ok(paths)
}

/// Decode slice files into one volume.
///
/// Slice `i` of the volume is decoded from `paths[i]`. All slices must have the same shape.
///
/// # Arguments
///
/// * `decoder`: Slice decoder
/// * `paths`: Local slice files in stack order
pub fn decode_stack(
    decoder: &dyn SliceDecoder,
    paths: &[PathBuf],
) -> Result<Array3<f32>, FetcherError> {
    let slices = paths
        .iter()
        .map(|path| decoder.decode(path))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(first) = slices.first() else {
        return Ok(Array3::zeros((0, 0, 0)));
    };
    let shape = first.dim();
    if let Some((index, slice)) = slices
        .iter()
        .enumerate()
        .find(|(_, slice)| slice.dim() != shape)
    {
        return Err(FetcherError::DicomDecode {
            file: paths[index].display().to_string(),
            reason: format!(
                "slice shape {:?} does not match stack shape {:?}",
                slice.dim(),
                shape
            ),
        });
    }
    let views: Vec<ArrayView2<f32>> = slices.iter().map(|slice| slice.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

/// Fetch the image stack of one sample of a patient.
///
/// # Arguments
///
/// * `state`: Application state
/// * `patient`: Patient identifier
/// * `sample_number`: Index into the patient's sample list
/// * `segmented_files_only`: Only consider samples which have a segmentation file
#[tracing::instrument(level = "DEBUG", skip(state))]
pub async fn fetch_image_stack(
    state: &AppState,
    patient: &str,
    sample_number: usize,
    segmented_files_only: bool,
) -> Result<ImageStack, FetcherError> {
    let sample = scans::resolve_sample(
        state.gateway.as_ref(),
        patient,
        sample_number,
        segmented_files_only,
    )
    .await?;
    if sample.files.is_empty() {
        return Err(FetcherError::not_found(format!(
            "slices of sample {} of patient {}",
            sample_number, patient
        )));
    }

    let dir = state.download_dir()?;
    let paths = download_all(
        state.fetcher.as_ref(),
        &state.resource_manager,
        &sample.files,
        dir.path(),
    )
    .await?;
    let decoder = Arc::clone(&state.decoder);
    let volume = state
        .run_cpu_bound(move || decode_stack(decoder.as_ref(), &paths))
        .await?;
    Ok(ImageStack { sample, volume })
}
