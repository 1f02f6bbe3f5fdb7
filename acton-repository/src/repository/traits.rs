//! Repository trait definitions
//!
//! Async methods use RPITIT (Return Position Impl Trait In Traits), so
//! implementations can be written with plain `async fn`.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::repository::{CrudRepository, Order};
//! use bson::doc;
//!
//! async fn newest_active(repo: &impl CrudRepository<i64, User>) -> RepositoryResult<User> {
//!     repo.find_one(doc! { "status": "active" }, &[Order::desc("created_at")]).await
//! }
//! ```

use std::future::Future;

use bson::Document;

use super::collection::{Collection, Dict};
use super::entity::{Entity, EntityId};
use super::error::RepositoryError;
use super::order::Order;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Generic CRUD operations over one entity type
///
/// Filters are storage documents (`{field: value}` or operator expressions)
/// and are passed through untouched apart from the soft-delete visibility
/// clause added while the repository is scoped.
///
/// # Type Parameters
///
/// - `Id`: The identifier type for the entity (e.g., `i64`, `ObjectId`, `String`)
/// - `E`: The entity type
pub trait CrudRepository<Id, E>: Send + Sync
where
    Id: EntityId,
    E: Entity<Id>,
{
    /// A copy of this repository that also sees soft-deleted records
    ///
    /// The receiver is not changed.
    fn unscoped(&self) -> Self
    where
        Self: Sized;

    fn is_unscoped(&self) -> bool;

    /// Storage name of the identifier
    fn id_field(&self) -> &str;

    /// Storage name of the soft-delete timestamp, if the entity has one
    fn soft_delete_field(&self) -> Option<&str>;

    fn soft_delete_enabled(&self) -> bool {
        self.soft_delete_field().is_some()
    }

    /// Insert `entity`, write the stored identifier back onto it and return it
    ///
    /// # Errors
    ///
    /// `DuplicatedKey` when the store reports a uniqueness conflict.
    fn create(&self, entity: &mut E) -> impl Future<Output = RepositoryResult<Id>> + Send;

    /// First visible entity matching `filter`, sorted by `orders`
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing matches.
    fn find_one(
        &self,
        filter: Document,
        orders: &[Order],
    ) -> impl Future<Output = RepositoryResult<E>> + Send;

    fn find_by_id(&self, id: &Id) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Visible entities whose identifier is in `ids`
    ///
    /// An empty slice returns an empty collection without touching the store.
    /// Unknown identifiers are simply absent from the result.
    fn find_by_ids(
        &self,
        ids: &[Id],
    ) -> impl Future<Output = RepositoryResult<Collection<Id, E>>> + Send;

    /// `limit` entities after skipping `offset` (`limit == 0` means no limit)
    fn find_by_page(
        &self,
        limit: u64,
        offset: u64,
        orders: &[Order],
    ) -> impl Future<Output = RepositoryResult<Collection<Id, E>>> + Send;

    fn find_by_filter(
        &self,
        filter: Document,
    ) -> impl Future<Output = RepositoryResult<Collection<Id, E>>> + Send;

    fn find_by_filter_with_page(
        &self,
        filter: Document,
        limit: u64,
        offset: u64,
        orders: &[Order],
    ) -> impl Future<Output = RepositoryResult<Collection<Id, E>>> + Send;

    fn find_all(&self) -> impl Future<Output = RepositoryResult<Collection<Id, E>>> + Send;

    fn count(&self) -> impl Future<Output = RepositoryResult<u64>> + Send;

    fn count_by_filter(&self, filter: Document)
        -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Whether a visible entity matches `filter`
    fn exists(&self, filter: Document) -> impl Future<Output = RepositoryResult<bool>> + Send;

    fn exists_by_id(&self, id: &Id) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// `true` for every identifier in `ids` that has a visible entity
    ///
    /// Identifiers without one are missing from the map, which
    /// [`Dict::exists`] reads as `false`.
    fn exists_by_ids(
        &self,
        ids: &[Id],
    ) -> impl Future<Output = RepositoryResult<Dict<Id, bool>>> + Send;

    /// `$set` `data` on every visible entity matching `filter`
    fn update(
        &self,
        filter: Document,
        data: Document,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    fn update_by_id(
        &self,
        id: &Id,
        data: Document,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// `$set` the non-zero fields of `entity`; a no-op when there are none
    fn update_non_zero(
        &self,
        filter: Document,
        entity: &E,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    fn update_non_zero_by_id(
        &self,
        id: &Id,
        entity: &E,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Delete entities matching `filter`
    ///
    /// Scoped repositories over soft-deletable entities stamp the deletion
    /// time instead of removing. Physical removal uses `filter` as given,
    /// without the visibility clause.
    fn delete(&self, filter: Document) -> impl Future<Output = RepositoryResult<()>> + Send;

    fn delete_by_id(&self, id: &Id) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// An empty slice is a no-op
    fn delete_by_ids(&self, ids: &[Id]) -> impl Future<Output = RepositoryResult<()>> + Send;

    fn delete_all(&self) -> impl Future<Output = RepositoryResult<()>> + Send;

    fn delete_all_by_filter(
        &self,
        filter: Document,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;
}
