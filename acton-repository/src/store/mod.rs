//! Document store collaborator trait and backend implementations
//!
//! The [`DocumentCollection`] trait is the only thing a repository needs from
//! the surrounding system: a handle to one named collection of documents.
//!
//! # Available Backends
//!
//! - **MongoDB** (`mongodb` feature): [`MongoCollection`] over the official driver
//! - **In-memory**: [`MemoryCollection`], always available, for tests and embedded use

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document};

pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use memory::MemoryCollection;

#[cfg(feature = "mongodb")]
pub use mongo::{connect, MongoCollection};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Options for `find` / `find_one` calls
///
/// `limit` follows MongoDB semantics: `None` or `Some(0)` means unlimited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort specification (`field: 1 | -1`)
    pub sort: Option<Document>,
    /// Number of matching documents to skip
    pub skip: Option<u64>,
    /// Maximum number of documents to return
    pub limit: Option<i64>,
    /// Projection specification (`field: 1` to include, `field: 0` to exclude)
    pub projection: Option<Document>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<Option<Document>>) -> Self {
        self.sort = sort.into();
        self
    }

    #[must_use]
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// Counts reported by an update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter
    pub matched: u64,
    /// Documents actually changed
    pub modified: u64,
}

/// Category of store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// A single-document lookup matched nothing
    NoDocuments,
    /// A write violated a uniqueness constraint
    DuplicateKey,
    /// The store could not be reached
    Connection,
    /// The store did not answer in time
    Timeout,
    /// A document could not be encoded or decoded
    Serialization,
    /// Anything else
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDocuments => write!(f, "no_documents"),
            Self::DuplicateKey => write!(f, "duplicate_key"),
            Self::Connection => write!(f, "connection"),
            Self::Timeout => write!(f, "timeout"),
            Self::Serialization => write!(f, "serialization"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Error reported by a [`DocumentCollection`]
#[derive(Debug, Clone)]
pub struct StoreError {
    /// The category of error
    pub kind: StoreErrorKind,
    /// Human-readable error message
    pub message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the backend's native error as the source
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn no_documents() -> Self {
        Self::new(StoreErrorKind::NoDocuments, "no documents in result")
    }

    pub fn duplicate_key(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::DuplicateKey, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Timeout, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Serialization, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Other, message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store {} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// A handle to one named collection of documents
///
/// Implementations perform exactly one round trip per call and never retry.
/// A `find_one` that matches nothing may either return `Ok(None)` or a
/// [`StoreErrorKind::NoDocuments`] error; repositories treat both the same.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Collection name, for diagnostics
    fn name(&self) -> &str;

    /// Insert one document, returning the stored `_id`
    async fn insert_one(&self, document: Document) -> StoreResult<Bson>;

    /// Return the first document matching `filter`
    async fn find_one(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<Option<Document>>;

    /// Return every document matching `filter`
    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>>;

    /// Count documents matching `filter`
    async fn count_documents(&self, filter: Document) -> StoreResult<u64>;

    /// Apply an update document to the first match
    async fn update_one(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome>;

    /// Apply an update document to every match
    async fn update_many(&self, filter: Document, update: Document)
        -> StoreResult<UpdateOutcome>;

    /// Remove the first match, returning the number removed
    async fn delete_one(&self, filter: Document) -> StoreResult<u64>;

    /// Remove every match, returning the number removed
    async fn delete_many(&self, filter: Document) -> StoreResult<u64>;
}
