//! Database gateway.
//!
//! All queries issued by the routers go through the [Gateway] trait. The production
//! implementation, [MongoGateway], wraps a [mongodb::Database] handle which is created once at
//! start-up and shared by every request through the application state.

use crate::error::FetcherError;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::bson::{Bson, Document};
use mongodb::options::{AggregateOptions, ClientOptions};
use mongodb::{Client, Collection, Database};

/// A lazily evaluated sequence of documents produced by an aggregation.
pub type DocumentStream = BoxStream<'static, Result<Document, FetcherError>>;

/// Query and aggregation primitives over the collections of one database.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Names of all collections in the database.
    async fn collection_names(&self) -> Result<Vec<String>, FetcherError>;

    /// Documents of a collection matching a filter.
    ///
    /// The routers use [Gateway::distinct] and [Gateway::aggregate]; plain lookups are part of the
    /// gateway for callers that need whole documents.
    ///
    /// # Arguments
    ///
    /// * `collection`: Collection name
    /// * `filter`: Query filter document
    async fn find(&self, collection: &str, filter: Document)
        -> Result<Vec<Document>, FetcherError>;

    /// Distinct values of a field over the documents of a collection matching a filter.
    ///
    /// # Arguments
    ///
    /// * `collection`: Collection name
    /// * `field`: Field whose values to collect
    /// * `filter`: Query filter document
    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>, FetcherError>;

    /// Run an aggregation pipeline over a collection.
    ///
    /// # Arguments
    ///
    /// * `collection`: Collection name
    /// * `pipeline`: Aggregation pipeline stages
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<DocumentStream, FetcherError>;
}

/// [Gateway] backed by a MongoDB deployment.
#[derive(Clone, Debug)]
pub struct MongoGateway {
    database: Database,
}

impl MongoGateway {
    /// Create a gateway for a database.
    ///
    /// The driver connects lazily, so this only fails if the connection string is invalid.
    ///
    /// # Arguments
    ///
    /// * `uri`: MongoDB connection string
    /// * `db_name`: Name of the database
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, FetcherError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("fetcher".to_string());
        let client = Client::with_options(options)?;
        Ok(Self {
            database: client.database(db_name),
        })
    }

    /// Returns a handle to a collection of the database.
    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl Gateway for MongoGateway {
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn collection_names(&self) -> Result<Vec<String>, FetcherError> {
        Ok(self.database.list_collection_names(None).await?)
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn find(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Vec<Document>, FetcherError> {
        let cursor = self.collection(collection).find(filter, None).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>, FetcherError> {
        Ok(self
            .collection(collection)
            .distinct(field, filter, None)
            .await?)
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<DocumentStream, FetcherError> {
        let options = AggregateOptions::builder().allow_disk_use(true).build();
        let cursor = self
            .collection(collection)
            .aggregate(pipeline, options)
            .await?;
        Ok(cursor.map_err(FetcherError::from).boxed())
    }
}

/// Collect the string values of a distinct query, ignoring values of any other type.
pub fn distinct_strings(values: Vec<Bson>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Bson::String(value) => Some(value),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_strings_drops_other_types() {
        let values = vec![
            Bson::String("TCGA-AO-A03M".to_string()),
            Bson::Int32(3),
            Bson::Null,
            Bson::String("TCGA-E2-A14U".to_string()),
        ];
        assert_eq!(
            vec!["TCGA-AO-A03M".to_string(), "TCGA-E2-A14U".to_string()],
            distinct_strings(values)
        );
    }

    #[tokio::test]
    async fn connect_invalid_uri() {
        let result = MongoGateway::connect("not-a-uri", "omics-database").await;
        assert!(matches!(result, Err(FetcherError::Database(_))));
    }
}
