use crate::cli::CommandLineArgs;
use crate::database::Gateway;
use crate::downloader::{FileFetcher, HttpDownloader};
use crate::error::FetcherError;
use crate::image_stack::{DicomDecoder, SliceDecoder};
use crate::mask_cache::MaskCache;
use crate::resource_manager::ResourceManager;

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Database gateway.
    pub gateway: Arc<dyn Gateway>,

    /// Downloader of slice and segmentation files.
    pub fetcher: Arc<dyn FileFetcher>,

    /// Decoder of slice files.
    pub decoder: Arc<dyn SliceDecoder>,

    /// Resource manager.
    pub resource_manager: ResourceManager,

    /// Segmentation mask cache.
    pub mask_cache: MaskCache,
}

impl AppState {
    /// Create and return an [AppState] which downloads over HTTP and decodes DICOM files.
    pub fn new(args: &CommandLineArgs, gateway: Arc<dyn Gateway>) -> Self {
        let fetcher = HttpDownloader::new(Duration::from_secs(args.download_timeout));
        Self::with_components(args, gateway, Arc::new(fetcher), Arc::new(DicomDecoder))
    }

    /// Create and return an [AppState] from its collaborators.
    pub fn with_components(
        args: &CommandLineArgs,
        gateway: Arc<dyn Gateway>,
        fetcher: Arc<dyn FileFetcher>,
        decoder: Arc<dyn SliceDecoder>,
    ) -> Self {
        let task_limit = args
            .thread_limit
            .or_else(|| Some(num_cpus::get().saturating_sub(1).max(1)));
        let resource_manager = ResourceManager::new(args.connection_limit, task_limit);
        let mask_cache = MaskCache::new(args.mask_cache_ttl);

        Self {
            args: args.clone(),
            gateway,
            fetcher,
            decoder,
            resource_manager,
            mask_cache,
        }
    }

    /// Create a temporary directory for the downloads of one request.
    ///
    /// The directory and its contents are removed when the returned [TempDir] is dropped.
    pub fn download_dir(&self) -> Result<TempDir, FetcherError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("fetcher-");
        let dir = match &self.args.download_dir {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// Run a CPU-bound function off the async executor.
    ///
    /// A task permit is held while the function runs. The function runs on the Rayon thread pool
    /// if enabled, otherwise on Tokio's blocking thread pool.
    pub async fn run_cpu_bound<F, T>(&self, f: F) -> Result<T, FetcherError>
    where
        F: FnOnce() -> Result<T, FetcherError> + Send + 'static,
        T: Send + 'static,
    {
        let _task_permit = self.resource_manager.task().await?;
        if self.args.use_rayon {
            tokio_rayon::spawn(f).await
        } else {
            tokio::task::spawn_blocking(f).await?
        }
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
