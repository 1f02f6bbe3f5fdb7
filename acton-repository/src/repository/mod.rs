//! Generic CRUD repositories over document stores
//!
//! # Features
//!
//! - **Generic CRUD**: [`CrudRepository`] implemented once by [`DocumentRepository`] for every [`Entity`]
//! - **Soft Delete**: entities with a `DeletedAt` attribute are stamped instead of removed,
//!   and hidden from scoped reads; [`CrudRepository::unscoped`] reveals them
//! - **Partial Updates**: [`non_zero_fields`] turns a sparsely populated entity into a `$set`
//! - **Result Sets**: [`Collection`] with lazy lookup by id, [`Dict`] for existence checks
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use acton_repository::repository::{CrudRepository, DocumentRepository, Order};
//! use acton_repository::store::MemoryCollection;
//! use bson::doc;
//!
//! let repo = DocumentRepository::<i64, User>::new(Arc::new(MemoryCollection::new("users")))?;
//!
//! let mut user = User { id: 1, name: "a".into(), ..Default::default() };
//! repo.create(&mut user).await?;
//!
//! let page = repo.find_by_page(10, 0, &[Order::asc("name")]).await?;
//! let found = repo.find_by_filter(doc! { "name": "a" }).await?;
//! assert!(found.contains(&1));
//! ```

mod collection;
mod crud;
mod entity;
mod error;
mod filter;
mod order;
mod projection;
mod traits;

// Re-export all public types
pub use collection::{Collection, Dict};
pub use crud::DocumentRepository;
pub use entity::{
    resolve_id_field, resolve_soft_delete_field, Entity, EntityField, EntityId, DEFAULT_ID_FIELD,
    DEFAULT_SOFT_DELETE_FIELD,
};
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use filter::{build_filter, NOT_DELETED};
pub use order::{orders_to_sort, Order, OrderDirection};
pub use projection::{is_zero, non_zero_fields};
pub use traits::{CrudRepository, RepositoryResult};
