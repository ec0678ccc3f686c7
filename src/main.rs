//! This file defines the fetcher binary entry point.

use fetcher::app;
use fetcher::app_state::AppState;
use fetcher::cli;
use fetcher::database::MongoGateway;
use fetcher::metrics;
use fetcher::server;
use fetcher::tracing;

use std::sync::Arc;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing(&args);
    metrics::register_metrics();
    let gateway = MongoGateway::connect(&args.mongodb_uri, &args.db_name)
        .await
        .expect("invalid MongoDB connection string");
    let state = Arc::new(AppState::new(&args, Arc::new(gateway)));
    let service = app::service(state);
    server::serve(&args, service).await;
    tracing::shutdown_tracing();
}
