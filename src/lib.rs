//! This crate provides Fetcher, an HTTP query layer over a MongoDB database of omics and MRI
//! imaging metadata.
//!
//! Omics endpoints translate query parameters into aggregation pipelines and stream the results
//! back as newline-delimited JSON. MRI endpoints download the DICOM slices of a sample, decode them
//! into a volume and either return the raw volume or render one slice as a PNG image, optionally
//! with the sample's segmentation overlaid in green.
//!
//! Fetcher is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * The [MongoDB driver](mongodb) runs queries and aggregation pipelines.
//! * [reqwest] downloads slice and segmentation files.
//! * [dicom] decodes DICOM slices.
//! * [ndarray] provides the n-dimensional arrays used for volumes, masks and images.
//! * [image] encodes PNG images.

pub mod app;
pub mod app_state;
pub mod clahe;
pub mod cli;
pub mod database;
pub mod downloader;
pub mod error;
pub mod image_stack;
pub mod mask_cache;
pub mod metrics;
pub mod models;
pub mod mri;
pub mod omics;
pub mod pipelines;
pub mod render;
pub mod resource_manager;
pub mod scans;
pub mod segmentation;
pub mod server;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;
pub mod validated_query;
