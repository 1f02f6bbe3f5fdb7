//! MongoDB collection backend

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOneOptions};
use mongodb::{Client, Database};

use super::{DocumentCollection, FindOptions, StoreError, StoreResult, UpdateOutcome};
use crate::{config::StoreConfig, error::Result};

/// MongoDB server error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

/// [`DocumentCollection`] over a `mongodb::Collection<Document>`
///
/// # Example
///
/// ```rust,ignore
/// use acton_repository::prelude::*;
///
/// let config = Config::load()?;
/// let database = connect(&config.store).await?;
/// let users = MongoCollection::new(database.collection("users"));
/// let repository = DocumentRepository::<i64, User>::new(Arc::new(users))?;
/// ```
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: mongodb::Collection<Document>,
}

impl MongoCollection {
    pub fn new(inner: mongodb::Collection<Document>) -> Self {
        Self { inner }
    }

    /// Open `name` in `database`
    pub fn from_database(database: &Database, name: &str) -> Self {
        Self::new(database.collection(name))
    }

    /// The wrapped driver collection
    pub fn inner(&self) -> &mongodb::Collection<Document> {
        &self.inner
    }
}

impl From<mongodb::Collection<Document>> for MongoCollection {
    fn from(inner: mongodb::Collection<Document>) -> Self {
        Self::new(inner)
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        let result = self.inner.insert_one(document).await.map_err(map_error)?;
        Ok(result.inserted_id)
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<Option<Document>> {
        let options = FindOneOptions::builder()
            .sort(options.sort)
            .skip(options.skip)
            .projection(options.projection)
            .build();
        self.inner
            .find_one(filter)
            .with_options(options)
            .await
            .map_err(map_error)
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        let options = mongodb::options::FindOptions::builder()
            .sort(options.sort)
            .skip(options.skip)
            .limit(options.limit)
            .projection(options.projection)
            .build();
        let cursor = self
            .inner
            .find(filter)
            .with_options(options)
            .await
            .map_err(map_error)?;
        cursor.try_collect().await.map_err(map_error)
    }

    async fn count_documents(&self, filter: Document) -> StoreResult<u64> {
        self.inner.count_documents(filter).await.map_err(map_error)
    }

    async fn update_one(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        let result = self
            .inner
            .update_one(filter, update)
            .await
            .map_err(map_error)?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        let result = self
            .inner
            .update_many(filter, update)
            .await
            .map_err(map_error)?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<u64> {
        let result = self.inner.delete_one(filter).await.map_err(map_error)?;
        Ok(result.deleted_count)
    }

    async fn delete_many(&self, filter: Document) -> StoreResult<u64> {
        let result = self.inner.delete_many(filter).await.map_err(map_error)?;
        Ok(result.deleted_count)
    }
}

/// Translate a driver error into a [`StoreError`], keeping it as the source
fn map_error(err: mongodb::error::Error) -> StoreError {
    let message = err.to_string();
    let error = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE => {
            StoreError::duplicate_key(message)
        }
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY_CODE => StoreError::duplicate_key(message),
        ErrorKind::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => StoreError::timeout(message),
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::connection(message)
        }
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            StoreError::serialization(message)
        }
        _ => StoreError::other(message),
    };
    error.with_source(err)
}

/// Connect to MongoDB and return a handle to the configured database
///
/// Pings the server before returning and retries with exponential backoff
/// according to `max_retries` and `retry_delay_secs`.
pub async fn connect(config: &StoreConfig) -> Result<Database> {
    let mut attempt = 0;
    let base_delay = config.retry_delay();

    loop {
        match try_connect(config).await {
            Ok(database) => {
                if attempt > 0 {
                    tracing::info!(
                        "MongoDB connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "MongoDB connected: {} (database: {})",
                        sanitize_connection_url(&config.uri),
                        config.database
                    );
                }
                return Ok(database);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "Failed to connect to MongoDB after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay_multiplier = 2_u32.pow(attempt.saturating_sub(1));
                let delay = base_delay * delay_multiplier;

                tracing::warn!(
                    "MongoDB connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Single connection attempt: parse options, build the client, ping
async fn try_connect(config: &StoreConfig) -> Result<Database> {
    let mut options = ClientOptions::parse(config.uri.as_str()).await?;
    apply_store_options(&mut options, config);

    let client = Client::with_options(options)?;
    let database = client.database(&config.database);
    database.run_command(doc! { "ping": 1 }).await?;
    Ok(database)
}

/// Overlay the configured app name and timeouts on parsed client options
///
/// An app name given in the connection string wins over the configured one.
fn apply_store_options(options: &mut ClientOptions, config: &StoreConfig) {
    if options.app_name.is_none() {
        options.app_name = config.app_name.clone();
    }
    options.connect_timeout = Some(config.connect_timeout());
    options.server_selection_timeout = Some(config.server_selection_timeout());
}

/// Sanitize connection URL for safe logging (remove password)
fn sanitize_connection_url(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let after_at = &url[at_pos..];
            if let Some(colon_pos) = url[scheme_end + 3..at_pos].find(':') {
                let username = &url[scheme_end + 3..scheme_end + 3 + colon_pos];
                return format!("{}{}:***{}", scheme, username, after_at);
            }
        }
    }
    url.to_string()
}
