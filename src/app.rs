//! Axum router and service.

use crate::app_state::SharedAppState;
use crate::error::FetcherError;
use crate::metrics::{metrics_handler, record_response_metrics, request_counter};
use crate::models::{PngResponse, VolumeResponse};
use crate::mri;
use crate::omics;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

static HEADER_DTYPE: header::HeaderName = header::HeaderName::from_static("x-fetcher-dtype");
static HEADER_SHAPE: header::HeaderName = header::HeaderName::from_static("x-fetcher-shape");

impl IntoResponse for VolumeResponse {
    fn into_response(self) -> Response {
        let shape = match serde_json::to_string(&self.shape) {
            Ok(shape) => shape,
            Err(err) => return FetcherError::from(err).into_response(),
        };
        (
            [
                (
                    &header::CONTENT_TYPE,
                    mime::APPLICATION_OCTET_STREAM.to_string(),
                ),
                (&HEADER_DTYPE, "float32".to_string()),
                (&HEADER_SHAPE, shape),
            ],
            self.body,
        )
            .into_response()
    }
}

impl IntoResponse for PngResponse {
    fn into_response(self) -> Response {
        (
            [(&header::CONTENT_TYPE, mime::IMAGE_PNG.to_string())],
            self.0,
        )
            .into_response()
    }
}

/// Description of one endpoint, as listed by `/docs`.
#[derive(Serialize)]
struct Endpoint {
    method: &'static str,
    path: &'static str,
    params: &'static [&'static str],
    returns: &'static str,
}

const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        method: "GET",
        path: "/mri_scans",
        params: &["patients", "segmented_files_only"],
        returns: "samples of each patient",
    },
    Endpoint {
        method: "GET",
        path: "/mri_scan_stack",
        params: &["patient", "sample_number"],
        returns: "raw little-endian float32 volume",
    },
    Endpoint {
        method: "GET",
        path: "/mri_scan_slice",
        params: &["patient", "sample_number", "slice_number"],
        returns: "PNG image",
    },
    Endpoint {
        method: "GET",
        path: "/segmentation_slice",
        params: &["patient", "sample_number", "slice_number", "alpha"],
        returns: "PNG image",
    },
    Endpoint {
        method: "GET",
        path: "/survival",
        params: &["patients"],
        returns: "NDJSON records",
    },
    Endpoint {
        method: "GET",
        path: "/copy_number",
        params: &["patients"],
        returns: "NDJSON records",
    },
    Endpoint {
        method: "GET",
        path: "/clinical_data",
        params: &["patients"],
        returns: "NDJSON records",
    },
    Endpoint {
        method: "GET",
        path: "/patients_by_mutation",
        params: &["mutation", "mutation_status"],
        returns: "patient identifiers",
    },
    Endpoint {
        method: "GET, POST",
        path: "/patients_age",
        params: &["patients"],
        returns: "age at diagnosis of each patient in years",
    },
    Endpoint {
        method: "GET",
        path: "/column_names",
        params: &[],
        returns: "collection names",
    },
    Endpoint {
        method: "GET",
        path: "/feature_names",
        params: &["col"],
        returns: "feature names of a collection",
    },
    Endpoint {
        method: "GET",
        path: "/metrics",
        params: &[],
        returns: "Prometheus metrics",
    },
];

async fn docs() -> Json<&'static [Endpoint]> {
    Json(ENDPOINTS)
}

async fn index() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/docs")])
}

/// Returns a [axum::Router] for the Fetcher API
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/docs", get(docs))
        .route("/metrics", get(metrics_handler))
        .route("/mri_scans", get(mri::mri_scans))
        .route("/mri_scan_stack", get(mri::mri_scan_stack))
        .route("/mri_scan_slice", get(mri::mri_scan_slice))
        .route("/segmentation_slice", get(mri::segmentation_slice))
        .route("/survival", get(omics::survival))
        .route("/copy_number", get(omics::copy_number))
        .route("/clinical_data", get(omics::clinical_data))
        .route("/patients_by_mutation", get(omics::patients_by_mutation))
        .route(
            "/patients_age",
            get(omics::patients_age).post(omics::patients_age_body),
        )
        .route("/column_names", get(omics::column_names))
        .route("/feature_names", get(omics::feature_names))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        request_id = %Uuid::new_v4(),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(request_counter)
                .on_response(record_response_metrics),
        )
}

/// The Fetcher service type.
///
/// We need to use a named type to pass the service to the server.
pub type Service = NormalizePath<Router>;

/// Returns a [crate::app::Service] for the Fetcher API
///
/// The service is populated with all routes as well as the following middleware:
///
/// * a [tower_http::trace::TraceLayer] providing tracing and metrics hooks on requests and
///   responses
/// * a [tower_http::normalize_path::NormalizePathLayer] for trimming trailing slashes from
///   requests
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn service(state: SharedAppState) -> Service {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}
