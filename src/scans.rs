//! Scan listing and sample resolution over the MRI collection.

use crate::database::{distinct_strings, Gateway};
use crate::error::FetcherError;
use crate::models::{Collection, PatientScans, Sample};
use crate::pipelines;

use futures::TryStreamExt;
use mongodb::bson::{self, Document};

/// List the samples of each patient.
///
/// Returns one list of samples per patient, patients sorted by identifier. The file links of each
/// sample are sorted, which puts the slices in stack order.
///
/// # Arguments
///
/// * `gateway`: Database gateway
/// * `patients`: Optional allow-list of patients. An empty list selects all patients.
/// * `segmented_files_only`: Only list samples which have a segmentation file
#[tracing::instrument(level = "DEBUG", skip(gateway))]
pub async fn list_scans(
    gateway: &dyn Gateway,
    patients: &[String],
    segmented_files_only: bool,
) -> Result<Vec<Vec<Sample>>, FetcherError> {
    let pipeline = pipelines::mri_scans(patients, segmented_files_only);
    let documents: Vec<Document> = gateway
        .aggregate(&Collection::MriScans.to_string(), pipeline)
        .await?
        .try_collect()
        .await?;
    let mut groups = documents
        .into_iter()
        .map(bson::from_document::<PatientScans>)
        .collect::<Result<Vec<_>, _>>()?;
    groups.sort_by(|a, b| a.patient.cmp(&b.patient));
    Ok(groups
        .into_iter()
        .map(|group| {
            group
                .samples
                .into_iter()
                .map(|mut sample| {
                    sample.files.sort();
                    sample
                })
                .collect()
        })
        .collect())
}

/// Check that a patient may be requested from the MRI endpoints.
///
/// The patient must appear in the live list of MRI patients, restricted to patients with a
/// segmentation file when `segmented_files_only` is set.
///
/// # Arguments
///
/// * `gateway`: Database gateway
/// * `patient`: Patient identifier
/// * `segmented_files_only`: Only accept patients with a segmentation file
pub async fn validate_patient(
    gateway: &dyn Gateway,
    patient: &str,
    segmented_files_only: bool,
) -> Result<(), FetcherError> {
    let values = gateway
        .distinct(
            &Collection::MriScans.to_string(),
            "patient",
            pipelines::mri_patients_filter(segmented_files_only),
        )
        .await?;
    if distinct_strings(values).iter().any(|known| known == patient) {
        Ok(())
    } else {
        Err(FetcherError::InvalidParameter {
            parameter: "patient",
            value: patient.to_string(),
        })
    }
}

/// Return the patient identifier of a query, failing if it was not given.
pub fn require_patient(patient: Option<String>) -> Result<String, FetcherError> {
    patient.ok_or(FetcherError::MissingParameter {
        parameter: "patient",
    })
}

/// Resolve one sample of a patient.
///
/// # Arguments
///
/// * `gateway`: Database gateway
/// * `patient`: Patient identifier
/// * `sample_number`: Index into the patient's sample list
/// * `segmented_files_only`: Only consider samples which have a segmentation file
pub async fn resolve_sample(
    gateway: &dyn Gateway,
    patient: &str,
    sample_number: usize,
    segmented_files_only: bool,
) -> Result<Sample, FetcherError> {
    let groups = list_scans(gateway, &[patient.to_string()], segmented_files_only).await?;
    let samples = groups
        .into_iter()
        .find(|samples| samples.iter().any(|sample| sample.patient == patient))
        .ok_or_else(|| FetcherError::not_found(format!("samples of patient {}", patient)))?;
    samples.into_iter().nth(sample_number).ok_or_else(|| {
        FetcherError::not_found(format!("sample {} of patient {}", sample_number, patient))
    })
}
