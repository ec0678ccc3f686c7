//! Error handling.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ndarray::ShapeError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{event, Level};

/// Fetcher server error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum FetcherError {
    /// Error deserialising query parameters
    #[error("request query is not valid")]
    RequestQueryRejection(#[from] QueryRejection),

    /// Error deserialising a JSON request body
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// A required query parameter was not provided
    #[error("missing required parameter {parameter}")]
    MissingParameter { parameter: &'static str },

    /// A parameter value is not among the values currently allowed
    #[error("invalid value {value} for {parameter}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
    },

    /// A patient, sample or slice does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Error sending a download request or receiving its body
    #[error("failed to download {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A download returned a non-success HTTP status
    #[error("download of {url} failed with status {status}")]
    FetchStatus { url: String, status: u16 },

    /// Error decoding a DICOM slice
    #[error("failed to decode DICOM file {file}: {reason}")]
    DicomDecode { file: String, reason: String },

    /// Error decoding a segmentation file
    #[error("invalid segmentation file: {reason}")]
    SegmentationDecode { reason: String },

    /// Error creating ndarray array from shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Error executing a database query
    #[error("database query failed")]
    Database(#[from] mongodb::error::Error),

    /// Error converting a database document into a response type
    #[error("failed to decode database document")]
    DocumentDecode(#[from] mongodb::bson::de::Error),

    /// Error encoding an image
    #[error("failed to encode image")]
    ImageEncode(#[from] image::ImageError),

    /// Error reading or writing temporary files
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Error serialising a response body
    #[error("failed to serialise response")]
    Serialise(#[from] serde_json::Error),

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// A blocking task panicked or was cancelled
    #[error("background task failed")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl FetcherError {
    /// Return a NotFound error for a resource description.
    pub fn not_found(resource: impl Into<String>) -> Self {
        FetcherError::NotFound {
            resource: resource.into(),
        }
    }
}

impl IntoResponse for FetcherError {
    /// Convert from a `FetcherError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// Return a 502 bad gateway ErrorResponse
    fn bad_gateway<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_GATEWAY, error)
    }
}

impl From<FetcherError> for ErrorResponse {
    /// Convert from a `FetcherError` into an `ErrorResponse`.
    fn from(error: FetcherError) -> Self {
        let response = match &error {
            // Bad request
            FetcherError::RequestQueryRejection(_)
            | FetcherError::RequestDataJsonRejection(_)
            | FetcherError::RequestDataValidationSingle(_)
            | FetcherError::RequestDataValidation(_)
            | FetcherError::MissingParameter { parameter: _ }
            | FetcherError::InvalidParameter {
                parameter: _,
                value: _,
            } => Self::bad_request(&error),

            // Not found
            FetcherError::NotFound { resource: _ } => Self::not_found(&error),

            // Bad gateway
            FetcherError::Fetch { url: _, source: _ }
            | FetcherError::FetchStatus { url: _, status: _ } => Self::bad_gateway(&error),

            // Internal server error
            FetcherError::DicomDecode { file: _, reason: _ }
            | FetcherError::SegmentationDecode { reason: _ }
            | FetcherError::ShapeInvalid(_)
            | FetcherError::Database(_)
            | FetcherError::DocumentDecode(_)
            | FetcherError::ImageEncode(_)
            | FetcherError::Io(_)
            | FetcherError::Serialise(_)
            | FetcherError::SemaphoreAcquireError(_)
            | FetcherError::TaskJoin(_)
            | FetcherError::TryFromInt(_) => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hyper::HeaderMap;

    // Jump through the hoops to get the body as a string.
    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    async fn test_fetcher_error(
        error: FetcherError,
        status: StatusCode,
        message: &str,
        caused_by: Option<Vec<&'static str>>,
    ) {
        let response = error.into_response();
        assert_eq!(status, response.status());
        let mut headers = HeaderMap::new();
        headers.insert(&header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert_eq!(headers, *response.headers());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(message.to_string(), error_response.error.message);
        // Map Vec items from str to String
        let caused_by = caused_by.map(|cb| cb.iter().map(|s| s.to_string()).collect());
        assert_eq!(caused_by, error_response.error.caused_by);
    }

    #[tokio::test]
    async fn request_data_validation_single() {
        let validation_error = validator::ValidationError::new("foo");
        let error = FetcherError::RequestDataValidationSingle(validation_error);
        let message = "request data is not valid";
        let caused_by = Some(vec!["Validation error: foo [{}]"]);
        test_fetcher_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn request_data_validation() {
        let mut validation_errors = validator::ValidationErrors::new();
        let validation_error = validator::ValidationError::new("foo");
        validation_errors.add("bar", validation_error);
        let error = FetcherError::RequestDataValidation(validation_errors);
        let message = "request data is not valid";
        let caused_by = Some(vec!["bar: Validation error: foo [{}]"]);
        test_fetcher_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn missing_parameter() {
        let error = FetcherError::MissingParameter {
            parameter: "patient",
        };
        let message = "missing required parameter patient";
        test_fetcher_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn invalid_parameter() {
        let error = FetcherError::InvalidParameter {
            parameter: "col",
            value: "Foo".to_string(),
        };
        let message = "invalid value Foo for col";
        test_fetcher_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn not_found() {
        let error = FetcherError::not_found("sample 3 of patient TCGA-AO-A03M");
        let message = "sample 3 of patient TCGA-AO-A03M not found";
        test_fetcher_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn fetch_status() {
        let error = FetcherError::FetchStatus {
            url: "http://example.com/1.dcm".to_string(),
            status: 404,
        };
        let message = "download of http://example.com/1.dcm failed with status 404";
        test_fetcher_error(error, StatusCode::BAD_GATEWAY, message, None).await;
    }

    #[tokio::test]
    async fn dicom_decode() {
        let error = FetcherError::DicomDecode {
            file: "0.dcm".to_string(),
            reason: "missing pixel data".to_string(),
        };
        let message = "failed to decode DICOM file 0.dcm: missing pixel data";
        test_fetcher_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn segmentation_decode() {
        let error = FetcherError::SegmentationDecode {
            reason: "truncated header".to_string(),
        };
        let message = "invalid segmentation file: truncated header";
        test_fetcher_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn io_error() {
        let error = FetcherError::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        let message = "I/O error";
        let caused_by = Some(vec!["unexpected end of file"]);
        test_fetcher_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }

    #[tokio::test]
    async fn semaphore_acquire_error() {
        let sem = tokio::sync::Semaphore::new(1);
        sem.close();
        let error = FetcherError::SemaphoreAcquireError(sem.acquire().await.unwrap_err());
        let message = "error acquiring resources";
        let caused_by = Some(vec!["semaphore closed"]);
        test_fetcher_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }

    #[tokio::test]
    async fn shape_error() {
        let error =
            FetcherError::ShapeInvalid(ShapeError::from_kind(ndarray::ErrorKind::OutOfBounds));
        let message = "failed to create array from shape";
        let caused_by = Some(vec!["ShapeError/OutOfBounds: out of bounds indexing"]);
        test_fetcher_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }

    #[tokio::test]
    async fn try_from_int_error() {
        let error = FetcherError::TryFromInt(u8::try_from(-1_i8).unwrap_err());
        let message = "out of range integral type conversion attempted";
        let caused_by = None;
        test_fetcher_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }
}
