//! Handlers of the MRI endpoints.

use crate::app_state::{AppState, SharedAppState};
use crate::downloader::download_to_file;
use crate::error::FetcherError;
use crate::image_stack::{fetch_image_stack, ImageStack};
use crate::mask_cache::{Mask, MaskKey};
use crate::models::{
    OverlayQuery, PngResponse, Sample, ScansQuery, SliceQuery, StackQuery, VolumeResponse,
};
use crate::render;
use crate::scans::{self, require_patient};
use crate::segmentation;
use crate::validated_query::{Patients, ValidatedQuery};

use axum::{body::Bytes, extract::State, Json};
use ndarray::Axis;
use zerocopy::byteorder::{LittleEndian, F32};
use zerocopy::AsBytes;

/// Samples of each patient.
pub async fn mri_scans(
    State(state): State<SharedAppState>,
    Patients(patients): Patients,
    ValidatedQuery(query): ValidatedQuery<ScansQuery>,
) -> Result<Json<Vec<Vec<Sample>>>, FetcherError> {
    let scans = scans::list_scans(
        state.gateway.as_ref(),
        &patients,
        query.segmented_files_only,
    )
    .await?;
    Ok(Json(scans))
}

/// Validate the patient of a request and fetch the requested stack.
async fn patient_stack(
    state: &AppState,
    patient: Option<String>,
    sample_number: usize,
    segmented_files_only: bool,
) -> Result<ImageStack, FetcherError> {
    let patient = require_patient(patient)?;
    scans::validate_patient(state.gateway.as_ref(), &patient, segmented_files_only).await?;
    fetch_image_stack(state, &patient, sample_number, segmented_files_only).await
}

/// Decoded volume of one sample as raw little-endian `f32` values.
pub async fn mri_scan_stack(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<StackQuery>,
) -> Result<VolumeResponse, FetcherError> {
    let stack = patient_stack(&state, query.patient, query.sample_number, false).await?;
    let shape = stack.volume.shape().to_vec();
    let values: Vec<F32<LittleEndian>> = stack.volume.iter().map(|value| F32::new(*value)).collect();
    Ok(VolumeResponse::new(
        Bytes::copy_from_slice(values.as_bytes()),
        shape,
    ))
}

/// One rendered slice of a sample.
pub async fn mri_scan_slice(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<SliceQuery>,
) -> Result<PngResponse, FetcherError> {
    let stack = patient_stack(&state, query.patient, query.sample_number, false).await?;
    let slice = stack.slice(query.slice_number)?.to_owned();
    let png = state
        .run_cpu_bound(move || render::encode_gray_png(&render::render_slice(slice.view())))
        .await?;
    Ok(PngResponse(png))
}

/// Download and decode the segmentation mask of a stack.
async fn load_mask(
    state: &AppState,
    link: &str,
    num_stacks: usize,
    output_shape: (usize, usize),
) -> Result<ndarray::Array3<u8>, FetcherError> {
    let dir = state.download_dir()?;
    let path = dir.path().join("segmentation");
    download_to_file(
        state.fetcher.as_ref(),
        &state.resource_manager,
        link,
        &path,
    )
    .await?;
    let bytes = tokio::fs::read(&path).await?;
    state
        .run_cpu_bound(move || {
            let map = segmentation::parse_first_map(&bytes)?;
            segmentation::build_mask(&map, num_stacks, output_shape)
        })
        .await
}

/// Return the cached segmentation mask of a stack.
async fn stack_mask(state: &AppState, stack: &ImageStack) -> Result<Mask, FetcherError> {
    let link = stack.sample.segmentation_file.clone().ok_or_else(|| {
        FetcherError::not_found(format!(
            "segmentation file of sample {} of patient {}",
            stack.sample.sample, stack.sample.patient
        ))
    })?;
    let key = MaskKey {
        link: link.clone(),
        output_shape: stack.slice_shape(),
        num_stacks: stack.len(),
    };
    state
        .mask_cache
        .get_or_load(key, || {
            load_mask(state, &link, stack.len(), stack.slice_shape())
        })
        .await
}

/// One rendered slice of a segmented sample with its segmentation overlaid in green.
pub async fn segmentation_slice(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<OverlayQuery>,
) -> Result<PngResponse, FetcherError> {
    let stack = patient_stack(&state, query.patient, query.sample_number, true).await?;
    let slice = stack.slice(query.slice_number)?.to_owned();
    let mask = stack_mask(&state, &stack).await?;
    let slice_number = query.slice_number;
    let alpha = query.alpha;
    let png = state
        .run_cpu_bound(move || {
            let image = render::render_slice(slice.view());
            let blended = render::overlay(
                image.view(),
                mask.index_axis(Axis(0), slice_number),
                alpha,
            )?;
            render::encode_rgb_png(&blended)
        })
        .await?;
    Ok(PngResponse(png))
}
