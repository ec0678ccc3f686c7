//! Command Line Interface (CLI) arguments.

use clap::Parser;

/// Fetcher command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "FETCHER_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "FETCHER_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "FETCHER_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/fetcher/certs/cert.pem",
        env = "FETCHER_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/fetcher/certs/key.pem",
        env = "FETCHER_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "FETCHER_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Whether to enable sending traces to Jaeger.
    #[arg(long, default_value_t = false, env = "FETCHER_ENABLE_JAEGER")]
    pub enable_jaeger: bool,
    /// Whether to use Rayon for execution of CPU-bound tasks.
    #[arg(long, default_value_t = false, env = "FETCHER_USE_RAYON")]
    pub use_rayon: bool,
    /// MongoDB connection string of the omics database
    #[arg(
        long,
        default_value = "mongodb://localhost:27017",
        env = "FETCHER_MONGODB_URI"
    )]
    pub mongodb_uri: String,
    /// Name of the database holding the omics and MRI collections
    #[arg(long, default_value = "omics-database", env = "FETCHER_DB_NAME")]
    pub db_name: String,
    /// Timeout in seconds applied to every outbound file download
    #[arg(long, default_value_t = 30, env = "FETCHER_DOWNLOAD_TIMEOUT")]
    pub download_timeout: u64,
    /// Directory under which per-request download directories are created.
    /// Defaults to the system temporary directory.
    #[arg(long, env = "FETCHER_DOWNLOAD_DIR")]
    pub download_dir: Option<String>,
    /// Lifespan in seconds of decoded segmentation masks in the mask cache
    #[arg(long, default_value_t = 300, env = "FETCHER_MASK_CACHE_TTL")]
    pub mask_cache_ttl: u64,
    /// Maximum number of simultaneous outbound download connections
    #[arg(long, env = "FETCHER_CONNECTION_LIMIT")]
    pub connection_limit: Option<usize>,
    /// Maximum number of threads to use for CPU-bound tasks.
    /// Defaults to one less than the number of CPUs.
    #[arg(long, env = "FETCHER_THREAD_LIMIT")]
    pub thread_limit: Option<usize>,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
