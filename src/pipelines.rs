//! Aggregation pipelines and query filters.
//!
//! These functions only build documents. Executing them is left to the
//! [Gateway](crate::database::Gateway).

use mongodb::bson::{doc, Document};

/// Name of the clinical data feature holding the age at diagnosis in days.
pub const AGE_AT_DIAGNOSIS: &str = "age_at_diagnosis";

/// Returns a `$match` stage restricting rows to a list of patients.
fn match_patients(patients: &[String]) -> Document {
    doc! { "$match": { "patient": { "$in": patients } } }
}

/// Returns a `$match` stage restricting rows to samples with a segmentation file.
fn match_segmented() -> Document {
    doc! { "$match": { "segmentation_file": { "$exists": true } } }
}

/// Scan listing pipeline over the MRI collection.
///
/// Groups the per-sample rows by patient into `{patient, samples: [{patient, sample, files,
/// segmentation_file}]}` documents. Samples keep their sample order and patients are sorted by
/// identifier. The file lists are not sorted here.
///
/// # Arguments
///
/// * `patients`: Optional allow-list of patients. An empty list selects all patients.
/// * `segmented_files_only`: Only include samples which have a segmentation file
pub fn mri_scans(patients: &[String], segmented_files_only: bool) -> Vec<Document> {
    let mut pipeline = Vec::new();
    if !patients.is_empty() {
        pipeline.push(match_patients(patients));
    }
    if segmented_files_only {
        pipeline.push(match_segmented());
    }
    pipeline.extend([
        doc! {
            "$project": {
                "patient": 1,
                "sample": 1,
                "value": 1,
                "segmentation_file": 1,
            }
        },
        doc! { "$sort": { "patient": 1, "sample": 1 } },
        doc! {
            "$addFields": {
                "temp": {
                    "patient": "$patient",
                    "sample": "$sample",
                    "files": "$value",
                    "segmentation_file": "$segmentation_file",
                }
            }
        },
        doc! {
            "$group": {
                "_id": "$patient",
                "samples": { "$push": "$temp" },
            }
        },
        doc! {
            "$project": {
                "patient": "$_id",
                "_id": 0,
                "samples": 1,
            }
        },
        doc! { "$sort": { "patient": 1 } },
    ]);
    pipeline
}

/// Filter selecting the MRI rows whose patients may be requested.
///
/// # Arguments
///
/// * `segmented_files_only`: Only select rows which have a segmentation file
pub fn mri_patients_filter(segmented_files_only: bool) -> Document {
    if segmented_files_only {
        doc! { "segmentation_file": { "$exists": true } }
    } else {
        doc! {}
    }
}

/// Omics aggregation pipeline over a flat `(patient, sample, name, value)` collection.
///
/// Groups the rows by sample and pairs the names with their values into
/// `{patient, sample, field: [{name, value}]}` documents.
///
/// # Arguments
///
/// * `patients`: Optional allow-list of patients. An empty list selects all patients.
pub fn omics(patients: &[String]) -> Vec<Document> {
    let first = if patients.is_empty() {
        doc! { "$match": {} }
    } else {
        match_patients(patients)
    };
    vec![
        first,
        doc! {
            "$group": {
                "_id": "$sample",
                "patient": { "$first": "$patient" },
                "names": { "$push": "$name" },
                "values": { "$push": "$value" },
            }
        },
        doc! {
            "$project": {
                "field": {
                    "$map": {
                        "input": { "$zip": { "inputs": ["$names", "$values"] } },
                        "as": "el",
                        "in": {
                            "name": { "$arrayElemAt": ["$$el", 0] },
                            "value": { "$arrayElemAt": ["$$el", 1] },
                        },
                    }
                },
                "patient": 1,
                "sample": "$_id",
                "_id": 0,
            }
        },
    ]
}

/// Filter selecting the mutation rows of one mutation with a given status.
///
/// The status is stored as a number, `1` when the mutation is present and `0` otherwise.
///
/// # Arguments
///
/// * `mutation`: Mutation name
/// * `status`: Mutation status
pub fn mutation_filter(mutation: &str, status: bool) -> Document {
    let value = if status { 1 } else { 0 };
    doc! { "name": mutation, "value": value }
}

/// Age at diagnosis pipeline over the clinical data collection.
///
/// Only rows whose value is stored as a double are selected.
///
/// # Arguments
///
/// * `patients`: Optional allow-list of patients. An empty list selects all patients.
pub fn patient_ages(patients: &[String]) -> Vec<Document> {
    let mut filter = doc! {
        "name": AGE_AT_DIAGNOSIS,
        "value": { "$type": "double" },
    };
    if !patients.is_empty() {
        filter.insert("patient", doc! { "$in": patients });
    }
    vec![
        doc! { "$match": filter },
        doc! { "$project": { "_id": 0, "patient": 1, "value": 1 } },
        doc! { "$sort": { "patient": 1 } },
    ]
}

/// Filter selecting every document of a collection.
pub fn all() -> Document {
    doc! {}
}
