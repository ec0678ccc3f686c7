//! Axum extractors for query parameters

use crate::error::FetcherError;
use crate::models::validate_patient_ids;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use url::form_urlencoded;
use validator::Validate;

/// An axum extractor based on the Query extractor that also performs validation using the
/// validator crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = FetcherError;

    /// Extract a `ValidatedQuery` from the request parts.
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

/// Patient allow-list given as repeated query parameters.
///
/// Both `patients=a&patients=b` and `patients[]=a&patients[]=b` are accepted. An empty list
/// means that no filtering is requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patients(pub Vec<String>);

impl Patients {
    /// Parse the patient allow-list from a raw query string.
    pub fn from_query(query: Option<&str>) -> Result<Self, FetcherError> {
        let patients: Vec<String> = match query {
            Some(query) => form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == "patients" || key == "patients[]")
                .map(|(_, value)| value.into_owned())
                .collect(),
            None => Vec::new(),
        };
        validate_patient_ids(&patients)?;
        Ok(Patients(patients))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Patients
where
    S: Send + Sync,
{
    type Rejection = FetcherError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Patients::from_query(parts.uri.query())
    }
}
