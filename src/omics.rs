//! Handlers of the omics endpoints.

use crate::app_state::SharedAppState;
use crate::database::{distinct_strings, Gateway};
use crate::error::FetcherError;
use crate::models::{Collection, FeatureNamesQuery, MutationQuery, PatientAge, PatientsBody};
use crate::pipelines;
use crate::validated_json::ValidatedJson;
use crate::validated_query::{Patients, ValidatedQuery};

use axum::{
    body::{Bytes, StreamBody},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{Bson, Document};

/// Media type of newline-delimited JSON.
pub const APPLICATION_NDJSON: &str = "application/x-ndjson";

/// Serialise a document as one line of relaxed extended JSON.
fn ndjson_line(document: Document) -> Result<Bytes, FetcherError> {
    let mut line = serde_json::to_vec(&Bson::Document(document).into_relaxed_extjson())?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Stream the omics records of one collection as NDJSON.
async fn omics_records(
    state: SharedAppState,
    collection: Collection,
    patients: Vec<String>,
) -> Result<Response, FetcherError> {
    let documents = state
        .gateway
        .aggregate(&collection.to_string(), pipelines::omics(&patients))
        .await?;
    let lines = documents.map(move |document| {
        document.and_then(ndjson_line).map_err(|err| {
            tracing::error!("omics stream over {} failed: {}", collection, err);
            err
        })
    });
    Ok((
        [(header::CONTENT_TYPE, APPLICATION_NDJSON)],
        StreamBody::new(lines),
    )
        .into_response())
}

/// Survival records, one per sample.
pub async fn survival(
    State(state): State<SharedAppState>,
    Patients(patients): Patients,
) -> Result<Response, FetcherError> {
    omics_records(state, Collection::Survival, patients).await
}

/// Copy number records, one per sample.
pub async fn copy_number(
    State(state): State<SharedAppState>,
    Patients(patients): Patients,
) -> Result<Response, FetcherError> {
    omics_records(state, Collection::CopyNumber, patients).await
}

/// Clinical data records, one per sample.
pub async fn clinical_data(
    State(state): State<SharedAppState>,
    Patients(patients): Patients,
) -> Result<Response, FetcherError> {
    omics_records(state, Collection::ClinicalData, patients).await
}

/// Patients with or without a mutation.
pub async fn patients_by_mutation(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<MutationQuery>,
) -> Result<Json<Vec<String>>, FetcherError> {
    let values = state
        .gateway
        .distinct(
            &Collection::Mutation.to_string(),
            "patient",
            pipelines::mutation_filter(&query.mutation, query.mutation_status),
        )
        .await?;
    let mut patients = distinct_strings(values);
    patients.sort();
    Ok(Json(patients))
}

/// Compute the age at diagnosis in years of a list of patients.
///
/// Rows whose value is not a double are skipped.
///
/// # Arguments
///
/// * `gateway`: Database gateway
/// * `patients`: Optional allow-list of patients. An empty list selects all patients.
#[tracing::instrument(level = "DEBUG", skip(gateway))]
pub async fn patient_ages(
    gateway: &dyn Gateway,
    patients: &[String],
) -> Result<Vec<PatientAge>, FetcherError> {
    let documents: Vec<Document> = gateway
        .aggregate(
            &Collection::ClinicalData.to_string(),
            pipelines::patient_ages(patients),
        )
        .await?
        .try_collect()
        .await?;
    Ok(documents.iter().filter_map(patient_age).collect())
}

fn patient_age(document: &Document) -> Option<PatientAge> {
    let patient = document.get_str("patient").ok()?;
    match document.get("value") {
        Some(Bson::Double(days)) => Some(PatientAge {
            patient: patient.to_string(),
            age: days / 365.0,
        }),
        _ => None,
    }
}

/// Ages of the patients given as query parameters.
pub async fn patients_age(
    State(state): State<SharedAppState>,
    Patients(patients): Patients,
) -> Result<Json<Vec<PatientAge>>, FetcherError> {
    Ok(Json(patient_ages(state.gateway.as_ref(), &patients).await?))
}

/// Ages of the patients given in a JSON body.
pub async fn patients_age_body(
    State(state): State<SharedAppState>,
    ValidatedJson(body): ValidatedJson<PatientsBody>,
) -> Result<Json<Vec<PatientAge>>, FetcherError> {
    Ok(Json(patient_ages(state.gateway.as_ref(), &body.patients).await?))
}

/// Names of the collections of the database.
pub async fn column_names(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<String>>, FetcherError> {
    let mut names = state.gateway.collection_names().await?;
    names.sort();
    Ok(Json(names))
}

/// Distinct feature names of one collection.
pub async fn feature_names(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<FeatureNamesQuery>,
) -> Result<Json<Vec<String>>, FetcherError> {
    let names = state.gateway.collection_names().await?;
    if !names.contains(&query.col) {
        return Err(FetcherError::InvalidParameter {
            parameter: "col",
            value: query.col,
        });
    }
    let values = state
        .gateway
        .distinct(&query.col, "name", pipelines::all())
        .await?;
    let mut features = distinct_strings(values);
    features.sort();
    Ok(Json(features))
}
