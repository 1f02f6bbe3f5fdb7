//! # acton-repository
//!
//! Generic, soft-delete aware CRUD repositories over document stores.
//!
//! ## Features
//!
//! - **One repository for every entity**: describe an entity's fields once, get create,
//!   find, paginate, count, exists, update and delete
//! - **Soft delete**: entities with a `DeletedAt` attribute are stamped, not removed, and
//!   hidden from reads until you ask for an unscoped view
//! - **Partial updates**: only the non-zero fields of an entity are written
//! - **Backends**: MongoDB (`mongodb` feature, on by default) and an in-memory collection
//! - **Configuration**: figment-based, from files and `ACTON_` environment variables
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use acton_repository::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct User {
//!     #[serde(rename = "_id")]
//!     id: i64,
//!     name: String,
//!     deleted_at: i64,
//! }
//!
//! impl Entity<i64> for User {
//!     fn fields() -> &'static [EntityField] {
//!         const FIELDS: &[EntityField] = &[
//!             EntityField::new("ID").with_storage("_id"),
//!             EntityField::new("Name").with_storage("name"),
//!             EntityField::new("DeletedAt").with_storage("deleted_at"),
//!         ];
//!         FIELDS
//!     }
//!
//!     fn id(&self) -> i64 {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: i64) {
//!         self.id = id;
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let users = DocumentRepository::<i64, User>::new(Arc::new(MemoryCollection::new("users")))?;
//!
//!     let mut user = User { id: 1, name: "Ada".to_string(), ..Default::default() };
//!     users.create(&mut user).await?;
//!     users.delete_by_id(&user.id).await?;
//!
//!     assert_eq!(users.count().await?, 0);
//!     assert_eq!(users.unscoped().count().await?, 1);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod repository;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, ServiceConfig, StoreConfig};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;

    pub use crate::repository::{
        Collection, CrudRepository, Dict, DocumentRepository, Entity, EntityField, EntityId,
        Order, OrderDirection, RepositoryError, RepositoryErrorKind, RepositoryOperation,
        RepositoryResult,
    };

    pub use crate::store::{
        DocumentCollection, FindOptions, MemoryCollection, StoreError, StoreErrorKind,
    };

    #[cfg(feature = "mongodb")]
    pub use crate::store::{connect, MongoCollection};

    pub use bson::{doc, Document};
}
