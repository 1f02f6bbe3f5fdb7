//! Crate-level error type
//!
//! Repository calls return [`RepositoryError`](crate::repository::RepositoryError)
//! directly; this type is for the surrounding plumbing (configuration,
//! tracing setup, connecting to a store) and wraps repository and store
//! errors so applications can use a single `Result` alias.

use thiserror::Error;

use crate::repository::RepositoryError;
use crate::store::StoreError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised outside the repository call path
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured repository error
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Document store error
    #[error("{0}")]
    Store(#[from] StoreError),

    /// MongoDB driver error (connection setup)
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(Box<mongodb::error::Error>),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error::Mongo(Box::new(err))
    }
}
