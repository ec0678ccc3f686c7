//! Downloads of remote slice and segmentation files.

use crate::error::FetcherError;
use crate::metrics::FILE_DOWNLOADS;
use crate::resource_manager::ResourceManager;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;

/// Source of remote files.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Download the file behind a link.
    ///
    /// Returns the file content.
    ///
    /// # Arguments
    ///
    /// * `url`: Link to the file
    async fn fetch(&self, url: &str) -> Result<Bytes, FetcherError>;
}

/// HTTP file downloader.
///
/// Implements [FileFetcher] for HTTP(S) links. Every request is bounded by a fixed timeout and
/// is never retried.
#[derive(Debug)]
pub struct HttpDownloader {
    reqwest_client: reqwest::Client,
}

impl HttpDownloader {
    /// Create a new HTTP downloader.
    ///
    /// # Arguments
    ///
    /// * `timeout`: Timeout applied to every request, from connecting until the body is read
    pub fn new(timeout: Duration) -> Self {
        let reqwest_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self { reqwest_client }
    }
}

#[async_trait]
impl FileFetcher for HttpDownloader {
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Bytes, FetcherError> {
        let fetch_error = |source| FetcherError::Fetch {
            url: url.to_string(),
            source,
        };
        let response = self
            .reqwest_client
            .get(url)
            .send()
            .await
            .map_err(fetch_error)?;
        if !response.status().is_success() {
            return Err(FetcherError::FetchStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body = response.bytes().await.map_err(fetch_error)?;
        FILE_DOWNLOADS.inc();
        Ok(body)
    }
}

/// Download a file and write it to a local path.
///
/// A connection permit is held for the duration of the download.
///
/// # Arguments
///
/// * `fetcher`: Source of the file
/// * `resource_manager`: ResourceManager object
/// * `url`: Link to the file
/// * `path`: Destination path
pub async fn download_to_file(
    fetcher: &dyn FileFetcher,
    resource_manager: &ResourceManager,
    url: &str,
    path: &Path,
) -> Result<(), FetcherError> {
    let body = {
        let _conn_permit = resource_manager.connection().await?;
        fetcher.fetch(url).await?
    };
    tokio::fs::write(path, &body).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{http::StatusCode, routing::get, Router};
    use std::net::{SocketAddr, TcpListener};

    // Serve a router on an ephemeral port and return its address.
    fn spawn_server(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router.into_make_service());
        tokio::spawn(server);
        addr
    }

    fn test_router() -> Router {
        Router::new()
            .route("/0.dcm", get(|| async { "slice zero" }))
            .route("/missing.dcm", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/slow.dcm",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "too late"
                }),
            )
    }

    #[tokio::test]
    async fn fetch_ok() {
        let addr = spawn_server(test_router());
        let downloader = HttpDownloader::new(Duration::from_secs(5));
        let body = downloader
            .fetch(&format!("http://{}/0.dcm", addr))
            .await
            .unwrap();
        assert_eq!(Bytes::from("slice zero"), body);
    }

    #[tokio::test]
    async fn fetch_not_found() {
        let addr = spawn_server(test_router());
        let downloader = HttpDownloader::new(Duration::from_secs(5));
        let url = format!("http://{}/missing.dcm", addr);
        let result = downloader.fetch(&url).await;
        match result {
            Err(FetcherError::FetchStatus { url: failed, status }) => {
                assert_eq!(url, failed);
                assert_eq!(404, status);
            }
            _ => panic!("expected FetchStatus error"),
        }
    }

    #[tokio::test]
    async fn fetch_timeout() {
        let addr = spawn_server(test_router());
        let downloader = HttpDownloader::new(Duration::from_millis(100));
        let result = downloader
            .fetch(&format!("http://{}/slow.dcm", addr))
            .await;
        match result {
            Err(FetcherError::Fetch { url: _, source }) => assert!(source.is_timeout()),
            _ => panic!("expected Fetch error"),
        }
    }

    #[tokio::test]
    async fn download_to_file_writes_body() {
        let addr = spawn_server(test_router());
        let downloader = HttpDownloader::new(Duration::from_secs(5));
        let resource_manager = ResourceManager::new(Some(1), None);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.dcm");
        download_to_file(
            &downloader,
            &resource_manager,
            &format!("http://{}/0.dcm", addr),
            &path,
        )
        .await
        .unwrap();
        assert_eq!(b"slice zero".to_vec(), std::fs::read(&path).unwrap());
    }
}
