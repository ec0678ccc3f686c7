use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::database::{DocumentStream, Gateway};
use crate::downloader::FileFetcher;
use crate::error::FetcherError;
use crate::image_stack::SliceDecoder;

use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;
use futures::stream::{self, StreamExt};
use mongodb::bson::{doc, Bson, Document};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// In-memory [Gateway].
///
/// `find` and `distinct` evaluate simple filters over canned documents. `aggregate` returns the
/// canned output documents of a collection and records the pipeline it was given.
#[derive(Default)]
pub(crate) struct FakeGateway {
    documents: HashMap<String, Vec<Document>>,
    aggregates: HashMap<String, Vec<Document>>,
    pipelines: Mutex<Vec<(String, Vec<Document>)>>,
}

impl FakeGateway {
    /// Add the stored documents of a collection.
    pub(crate) fn with_documents(mut self, collection: &str, documents: Vec<Document>) -> Self {
        self.documents.insert(collection.to_string(), documents);
        self
    }

    /// Add the documents returned by any aggregation over a collection.
    pub(crate) fn with_aggregate(mut self, collection: &str, documents: Vec<Document>) -> Self {
        self.aggregates.insert(collection.to_string(), documents);
        self
    }

    /// Pipelines passed to `aggregate`, in call order.
    pub(crate) fn recorded_pipelines(&self) -> Vec<(String, Vec<Document>)> {
        self.pipelines.lock().unwrap().clone()
    }
}

// Evaluate the subset of the query language used by the routers.
fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| {
        let value = document.get(key);
        match condition {
            Bson::Document(operators) => operators.iter().all(|(operator, operand)| {
                match (operator.as_str(), operand) {
                    ("$exists", Bson::Boolean(exists)) => value.is_some() == *exists,
                    ("$in", Bson::Array(values)) => value.map_or(false, |v| values.contains(v)),
                    ("$type", Bson::String(name)) if name == "double" => {
                        matches!(value, Some(Bson::Double(_)))
                    }
                    _ => false,
                }
            }),
            expected => value == Some(expected),
        }
    })
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn collection_names(&self) -> Result<Vec<String>, FetcherError> {
        let mut names: Vec<String> = self
            .documents
            .keys()
            .chain(self.aggregates.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Vec<Document>, FetcherError> {
        Ok(self
            .documents
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches(document, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>, FetcherError> {
        let mut values: Vec<Bson> = Vec::new();
        for document in self.find(collection, filter).await? {
            if let Some(value) = document.get(field) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<DocumentStream, FetcherError> {
        self.pipelines
            .lock()
            .unwrap()
            .push((collection.to_string(), pipeline));
        let documents = self.aggregates.get(collection).cloned().unwrap_or_default();
        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }
}

/// Build a scan listing output document for one patient.
pub(crate) fn scans_document(
    patient: &str,
    samples: &[(i32, &[&str], Option<&str>)],
) -> Document {
    let samples: Vec<Document> = samples
        .iter()
        .map(|(sample, files, segmentation_file)| {
            let mut document = doc! {
                "patient": patient,
                "sample": *sample,
                "files": files.iter().map(|file| file.to_string()).collect::<Vec<String>>(),
            };
            if let Some(segmentation_file) = segmentation_file {
                document.insert("segmentation_file", *segmentation_file);
            }
            document
        })
        .collect();
    doc! { "patient": patient, "samples": samples }
}

/// In-memory [FileFetcher] serving canned file contents.
///
/// Unknown links fail with a 404 status.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    files: HashMap<String, Bytes>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeFetcher {
    /// Add a file.
    pub(crate) fn with_file(mut self, url: &str, body: impl Into<Bytes>) -> Self {
        self.files.insert(url.to_string(), body.into());
        self
    }

    /// Number of times a link has been fetched.
    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FileFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetcherError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| FetcherError::FetchStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// [SliceDecoder] for a minimal raw format.
///
/// A file is one byte holding the number of rows, one byte holding the number of columns and one
/// byte per pixel in row-major order.
pub(crate) struct RawDecoder;

impl SliceDecoder for RawDecoder {
    fn decode(&self, path: &Path) -> Result<Array2<f32>, FetcherError> {
        let bytes = std::fs::read(path)?;
        let decode_error = |reason: &str| FetcherError::DicomDecode {
            file: path.display().to_string(),
            reason: reason.to_string(),
        };
        if bytes.len() < 2 {
            return Err(decode_error("missing header"));
        }
        let shape = (usize::from(bytes[0]), usize::from(bytes[1]));
        let pixels: Vec<f32> = bytes[2..].iter().map(|value| f32::from(*value)).collect();
        Array2::from_shape_vec(shape, pixels).map_err(|_| decode_error("wrong pixel count"))
    }
}

/// Encode a slice in the [RawDecoder] format.
pub(crate) fn raw_slice(rows: u8, columns: u8, pixel: impl Fn(usize, usize) -> u8) -> Vec<u8> {
    let mut bytes = vec![rows, columns];
    for y in 0..usize::from(rows) {
        for x in 0..usize::from(columns) {
            bytes.push(pixel(y, x));
        }
    }
    bytes
}

/// Command line arguments with default values.
pub(crate) fn test_args() -> CommandLineArgs {
    CommandLineArgs::parse_from(["fetcher"])
}

/// Application state over fake collaborators.
pub(crate) fn test_state(gateway: FakeGateway, fetcher: Arc<FakeFetcher>) -> SharedAppState {
    Arc::new(AppState::with_components(
        &test_args(),
        Arc::new(gateway),
        fetcher,
        Arc::new(RawDecoder),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_gateway_filters() {
        let gateway = FakeGateway::default().with_documents(
            "ClinicalData",
            vec![
                doc! { "patient": "a", "name": "age_at_diagnosis", "value": 7300.0 },
                doc! { "patient": "b", "name": "age_at_diagnosis", "value": 7300 },
                doc! { "patient": "c", "name": "stage", "value": "II" },
            ],
        );
        let found = gateway
            .find(
                "ClinicalData",
                doc! { "name": "age_at_diagnosis", "value": { "$type": "double" } },
            )
            .await
            .unwrap();
        assert_eq!(1, found.len());
        assert_eq!("a", found[0].get_str("patient").unwrap());

        let names = gateway
            .distinct("ClinicalData", "name", doc! { "patient": { "$in": ["a", "c"] } })
            .await
            .unwrap();
        assert_eq!(
            vec![Bson::from("age_at_diagnosis"), Bson::from("stage")],
            names
        );
    }
}
