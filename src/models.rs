//! Data types and associated functions and methods

use axum::body::Bytes;
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use validator::{Validate, ValidationError};

/// Collections of the omics database
#[derive(Clone, Copy, Debug, Display, PartialEq)]
pub enum Collection {
    /// Per-sample MRI rows with links to the slice and segmentation files
    #[strum(serialize = "MRIScans")]
    MriScans,
    /// Survival rows
    Survival,
    /// Copy number rows
    CopyNumber,
    /// Clinical data rows
    ClinicalData,
    /// Mutation status rows
    Mutation,
}

/// One imaging acquisition of a patient.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sample {
    /// Patient identifier
    pub patient: String,
    /// Sample identifier
    pub sample: Bson,
    /// Links to the slice files, sorted by slice location
    pub files: Vec<String>,
    /// Link to the segmentation file, if the sample has been segmented
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation_file: Option<String>,
}

/// All samples of one patient, as produced by the scan listing pipeline.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PatientScans {
    /// Patient identifier
    pub patient: String,
    /// Samples of the patient
    pub samples: Vec<Sample>,
}

/// Age of a patient at diagnosis.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PatientAge {
    /// Patient identifier
    pub patient: String,
    /// Age in years
    pub age: f64,
}

/// Query parameters of the scan listing
#[derive(Debug, Default, Deserialize, PartialEq, Validate)]
pub struct ScansQuery {
    /// Only list samples which have a segmentation file
    #[serde(default)]
    pub segmented_files_only: bool,
}

/// Query parameters identifying a sample of a patient
#[derive(Debug, Deserialize, PartialEq, Validate)]
pub struct StackQuery {
    /// Patient identifier
    #[validate(length(min = 1, message = "patient must not be empty"))]
    pub patient: Option<String>,
    /// Index into the patient's sample list
    #[serde(default)]
    pub sample_number: usize,
}

/// Query parameters identifying a slice of a sample
#[derive(Debug, Deserialize, PartialEq, Validate)]
pub struct SliceQuery {
    /// Patient identifier
    #[validate(length(min = 1, message = "patient must not be empty"))]
    pub patient: Option<String>,
    /// Index into the patient's sample list
    #[serde(default)]
    pub sample_number: usize,
    /// Index into the sample's slice stack
    #[serde(default)]
    pub slice_number: usize,
}

/// Query parameters of the segmentation overlay
#[derive(Debug, Deserialize, PartialEq, Validate)]
pub struct OverlayQuery {
    /// Patient identifier
    #[validate(length(min = 1, message = "patient must not be empty"))]
    pub patient: Option<String>,
    /// Index into the patient's segmented sample list
    #[serde(default)]
    pub sample_number: usize,
    /// Index into the sample's slice stack
    #[serde(default)]
    pub slice_number: usize,
    /// Blend factor of the segmentation tint
    #[serde(default = "default_alpha")]
    #[validate(range(min = 0.0, max = 1.0, message = "alpha must be between 0 and 1"))]
    pub alpha: f64,
}

fn default_alpha() -> f64 {
    0.6
}

/// Query parameters of the mutation lookup
#[derive(Debug, Deserialize, PartialEq, Validate)]
pub struct MutationQuery {
    /// Mutation (gene) name
    #[validate(length(min = 1, message = "mutation must not be empty"))]
    pub mutation: String,
    /// Whether the mutation is present
    #[serde(default = "default_mutation_status")]
    pub mutation_status: bool,
}

fn default_mutation_status() -> bool {
    true
}

/// Query parameters of the feature name listing
#[derive(Debug, Deserialize, PartialEq, Validate)]
pub struct FeatureNamesQuery {
    /// Collection name
    #[validate(length(min = 1, message = "col must not be empty"))]
    pub col: String,
}

/// JSON body carrying a patient allow-list
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatientsBody {
    /// Patient identifiers
    #[serde(default)]
    #[validate(custom = "validate_patient_ids")]
    pub patients: Vec<String>,
}

/// Validate a list of patient identifiers
pub fn validate_patient_ids(patients: &[String]) -> Result<(), ValidationError> {
    if patients.iter().any(|patient| patient.is_empty()) {
        return Err(ValidationError::new("patient identifiers must not be empty"));
    }
    Ok(())
}

/// A decoded volume returned as raw little-endian `f32` bytes.
pub struct VolumeResponse {
    /// Volume data
    pub body: Bytes,
    /// Shape of the volume
    pub shape: Vec<usize>,
}

impl VolumeResponse {
    /// Return a VolumeResponse object
    pub fn new(body: Bytes, shape: Vec<usize>) -> VolumeResponse {
        VolumeResponse { body, shape }
    }
}

/// A PNG encoded image.
pub struct PngResponse(pub Vec<u8>);
