//! Document-store repository engine
//!
//! [`DocumentRepository`] implements [`CrudRepository`] for any [`Entity`]
//! over any [`DocumentCollection`]. Entity metadata is resolved once in
//! [`DocumentRepository::new`]; every call afterwards builds its filter,
//! performs a single store round trip and normalizes the store's error.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use acton_repository::prelude::*;
//! use bson::doc;
//!
//! let users = DocumentRepository::<i64, User>::new(Arc::new(MemoryCollection::new("users")))?;
//!
//! let mut ada = User { id: 1, name: "Ada".into(), ..Default::default() };
//! users.create(&mut ada).await?;
//! users.delete_by_id(&1).await?;
//!
//! // Soft-deleted: hidden from scoped reads, still there unscoped
//! assert!(users.find_by_id(&1).await.unwrap_err().is_not_found());
//! assert!(users.unscoped().find_by_id(&1).await?.deleted_at > 0);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::{doc, Bson, Document};

use super::collection::{Collection, Dict};
use super::entity::{
    entity_name, resolve_id_field, resolve_soft_delete_field, Entity, EntityId, DEFAULT_ID_FIELD,
};
use super::error::{RepositoryError, RepositoryOperation};
use super::filter::build_filter;
use super::order::{orders_to_sort, Order};
use super::projection::non_zero_fields;
use super::traits::{CrudRepository, RepositoryResult};
use crate::store::{DocumentCollection, FindOptions, StoreError, StoreErrorKind};

/// Repository for entities of type `E` identified by `Id`
///
/// Cheap to clone; clones share the collection handle. Scoped by default.
pub struct DocumentRepository<Id, E> {
    collection: Arc<dyn DocumentCollection>,
    unscoped: bool,
    id_field: String,
    soft_delete_field: Option<String>,
    _marker: PhantomData<fn() -> (Id, E)>,
}

impl<Id, E> Clone for DocumentRepository<Id, E> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            unscoped: self.unscoped,
            id_field: self.id_field.clone(),
            soft_delete_field: self.soft_delete_field.clone(),
            _marker: PhantomData,
        }
    }
}

impl<Id, E> fmt::Debug for DocumentRepository<Id, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentRepository")
            .field("collection", &self.collection.name())
            .field("unscoped", &self.unscoped)
            .field("id_field", &self.id_field)
            .field("soft_delete_field", &self.soft_delete_field)
            .finish()
    }
}

impl<Id, E> DocumentRepository<Id, E>
where
    Id: EntityId,
    E: Entity<Id>,
{
    /// Create a scoped repository over `collection`
    ///
    /// # Errors
    ///
    /// `Configuration` when `E` declares no identifier attribute or no
    /// fields at all.
    pub fn new(collection: Arc<dyn DocumentCollection>) -> RepositoryResult<Self> {
        let fields = E::fields();
        let id_field = resolve_id_field(fields)?;
        let soft_delete_field = resolve_soft_delete_field(fields)?;

        tracing::debug!(
            "Repository for {} on collection '{}': id field '{}', soft delete {}",
            entity_name::<E>(),
            collection.name(),
            id_field,
            soft_delete_field.as_deref().unwrap_or("disabled")
        );

        Ok(Self {
            collection,
            unscoped: false,
            id_field,
            soft_delete_field,
            _marker: PhantomData,
        })
    }

    /// Convenience for [`new`](Self::new) with an owned collection
    pub fn with_collection(collection: impl DocumentCollection + 'static) -> RepositoryResult<Self> {
        Self::new(Arc::new(collection))
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    fn scoped_filter(&self, predicate: Document) -> Document {
        build_filter(predicate, self.soft_delete_field.as_deref(), self.unscoped)
    }

    /// Soft-delete instead of removing
    fn soft_deletes(&self) -> bool {
        self.soft_delete_field.is_some() && !self.unscoped
    }

    fn store_error(
        &self,
        operation: RepositoryOperation,
        filter: &Document,
        error: StoreError,
    ) -> RepositoryError {
        RepositoryError::from_store(
            operation,
            format_args!("{} on '{}' with filter {}", operation, self.collection_name(), filter),
            error,
        )
    }

    fn encode_id(&self, operation: RepositoryOperation, id: &Id) -> RepositoryResult<Bson> {
        bson::to_bson(id).map_err(|e| {
            RepositoryError::serialization(operation, format!("failed to encode id {:?}: {}", id, e))
        })
    }

    fn id_filter(&self, operation: RepositoryOperation, id: &Id) -> RepositoryResult<Document> {
        let mut filter = Document::new();
        filter.insert(self.id_field.clone(), self.encode_id(operation, id)?);
        Ok(filter)
    }

    fn ids_filter(&self, operation: RepositoryOperation, ids: &[Id]) -> RepositoryResult<Document> {
        let encoded = ids
            .iter()
            .map(|id| self.encode_id(operation, id))
            .collect::<RepositoryResult<Vec<_>>>()?;
        let mut filter = Document::new();
        filter.insert(self.id_field.clone(), doc! { "$in": encoded });
        Ok(filter)
    }

    fn id_projection(&self) -> Document {
        let mut projection = Document::new();
        projection.insert(self.id_field.clone(), 1);
        projection
    }

    fn decode_id(&self, operation: RepositoryOperation, raw: Bson) -> RepositoryResult<Id> {
        let element_type = raw.element_type();
        bson::from_bson(raw).map_err(|e| {
            RepositoryError::serialization(
                operation,
                format!(
                    "unexpected type {:?} for {} id: {}",
                    element_type,
                    entity_name::<E>(),
                    e
                ),
            )
        })
    }

    fn decode(&self, operation: RepositoryOperation, document: Document) -> RepositoryResult<E> {
        bson::from_document(document).map_err(|e| {
            RepositoryError::serialization(
                operation,
                format!("failed to decode {}: {}", entity_name::<E>(), e),
            )
        })
    }

    async fn fetch_one(
        &self,
        operation: RepositoryOperation,
        predicate: Document,
        orders: &[Order],
    ) -> RepositoryResult<E> {
        let filter = self.scoped_filter(predicate);
        let options = FindOptions::new().with_sort(orders_to_sort(orders));

        match self.collection.find_one(filter.clone(), options).await {
            Ok(Some(document)) => self.decode(operation, document),
            Ok(None) => Err(self.store_error(operation, &filter, StoreError::no_documents())),
            Err(e) => Err(self.store_error(operation, &filter, e)),
        }
    }

    async fn fetch_many(
        &self,
        operation: RepositoryOperation,
        predicate: Document,
        options: FindOptions,
    ) -> RepositoryResult<Collection<Id, E>> {
        let filter = self.scoped_filter(predicate);
        let documents = self
            .collection
            .find(filter.clone(), options)
            .await
            .map_err(|e| self.store_error(operation, &filter, e))?;

        tracing::debug!(
            "{} on '{}' returned {} document(s)",
            operation,
            self.collection_name(),
            documents.len()
        );

        let entities = documents
            .into_iter()
            .map(|document| self.decode(operation, document))
            .collect::<RepositoryResult<Vec<_>>>()?;
        Ok(Collection::new(entities))
    }

    async fn check_exists(&self, operation: RepositoryOperation, predicate: Document) -> RepositoryResult<bool> {
        let filter = self.scoped_filter(predicate);
        let options = FindOptions::new().with_projection(self.id_projection());

        match self.collection.find_one(filter.clone(), options).await {
            Ok(found) => Ok(found.is_some()),
            Err(e) if e.kind == StoreErrorKind::NoDocuments => Ok(false),
            Err(e) => Err(self.store_error(operation, &filter, e)),
        }
    }

    async fn count_visible(&self, predicate: Document) -> RepositoryResult<u64> {
        let filter = self.scoped_filter(predicate);
        self.collection
            .count_documents(filter.clone())
            .await
            .map_err(|e| self.store_error(RepositoryOperation::Count, &filter, e))
    }

    /// `$set` `fields` on the visible matches of `predicate`
    async fn set_fields(
        &self,
        operation: RepositoryOperation,
        predicate: Document,
        fields: Document,
        many: bool,
    ) -> RepositoryResult<()> {
        let filter = self.scoped_filter(predicate);
        let update = doc! { "$set": fields };

        let outcome = if many {
            self.collection.update_many(filter.clone(), update).await
        } else {
            self.collection.update_one(filter.clone(), update).await
        }
        .map_err(|e| self.store_error(operation, &filter, e))?;

        tracing::debug!(
            "{} on '{}': matched {}, modified {}",
            operation,
            self.collection_name(),
            outcome.matched,
            outcome.modified
        );
        Ok(())
    }

    async fn soft_delete(&self, predicate: Document, many: bool) -> RepositoryResult<()> {
        let Some(field) = &self.soft_delete_field else {
            return Ok(());
        };
        let mut stamp = Document::new();
        stamp.insert(field.clone(), chrono::Utc::now().timestamp());
        self.set_fields(RepositoryOperation::SoftDelete, predicate, stamp, many)
            .await
    }

    /// Physical removal with `filter` exactly as given
    async fn remove(&self, filter: Document, many: bool) -> RepositoryResult<()> {
        let removed = if many {
            self.collection.delete_many(filter.clone()).await
        } else {
            self.collection.delete_one(filter.clone()).await
        }
        .map_err(|e| self.store_error(RepositoryOperation::Delete, &filter, e))?;

        tracing::debug!(
            "delete on '{}' removed {} document(s)",
            self.collection_name(),
            removed
        );
        Ok(())
    }
}

impl<Id, E> CrudRepository<Id, E> for DocumentRepository<Id, E>
where
    Id: EntityId,
    E: Entity<Id>,
{
    fn unscoped(&self) -> Self {
        Self {
            unscoped: true,
            ..self.clone()
        }
    }

    fn is_unscoped(&self) -> bool {
        self.unscoped
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn soft_delete_field(&self) -> Option<&str> {
        self.soft_delete_field.as_deref()
    }

    async fn create(&self, entity: &mut E) -> RepositoryResult<Id> {
        let operation = RepositoryOperation::Create;
        let document = bson::to_document(&*entity).map_err(|e| {
            RepositoryError::serialization(
                operation,
                format!("failed to encode {}: {}", entity_name::<E>(), e),
            )
        })?;
        let carried = document.get(&self.id_field).cloned();

        let inserted = match self.collection.insert_one(document).await {
            Ok(inserted) => inserted,
            Err(e) => {
                let error = RepositoryError::from_store(
                    operation,
                    format_args!("{} into '{}'", operation, self.collection_name()),
                    e,
                );
                return Err(match carried {
                    Some(id) if error.is_duplicated_key() => {
                        error.with_entity(entity_name::<E>(), id.to_string())
                    }
                    _ => error,
                });
            }
        };

        // Only `_id` is reported back by the store
        let raw = match carried {
            Some(value) if self.id_field != DEFAULT_ID_FIELD => value,
            _ => inserted,
        };
        let id = self.decode_id(operation, raw)?;
        entity.set_id(id.clone());

        tracing::debug!(
            "Created {} {:?} in '{}'",
            entity_name::<E>(),
            id,
            self.collection_name()
        );
        Ok(id)
    }

    async fn find_one(&self, filter: Document, orders: &[Order]) -> RepositoryResult<E> {
        self.fetch_one(RepositoryOperation::FindOne, filter, orders)
            .await
    }

    async fn find_by_id(&self, id: &Id) -> RepositoryResult<E> {
        let operation = RepositoryOperation::FindById;
        let filter = self.id_filter(operation, id)?;
        self.fetch_one(operation, filter, &[]).await.map_err(|e| {
            if e.is_not_found() {
                e.with_entity(entity_name::<E>(), format!("{:?}", id))
            } else {
                e
            }
        })
    }

    async fn find_by_ids(&self, ids: &[Id]) -> RepositoryResult<Collection<Id, E>> {
        if ids.is_empty() {
            tracing::debug!("find_by_ids on '{}' with no ids", self.collection_name());
            return Ok(Collection::default());
        }
        let operation = RepositoryOperation::FindByIds;
        let filter = self.ids_filter(operation, ids)?;
        self.fetch_many(operation, filter, FindOptions::new()).await
    }

    async fn find_by_page(
        &self,
        limit: u64,
        offset: u64,
        orders: &[Order],
    ) -> RepositoryResult<Collection<Id, E>> {
        self.fetch_many(
            RepositoryOperation::FindByPage,
            Document::new(),
            page_options(limit, offset, orders),
        )
        .await
    }

    async fn find_by_filter(&self, filter: Document) -> RepositoryResult<Collection<Id, E>> {
        self.fetch_many(RepositoryOperation::FindByFilter, filter, FindOptions::new())
            .await
    }

    async fn find_by_filter_with_page(
        &self,
        filter: Document,
        limit: u64,
        offset: u64,
        orders: &[Order],
    ) -> RepositoryResult<Collection<Id, E>> {
        self.fetch_many(
            RepositoryOperation::FindByFilterWithPage,
            filter,
            page_options(limit, offset, orders),
        )
        .await
    }

    async fn find_all(&self) -> RepositoryResult<Collection<Id, E>> {
        self.fetch_many(RepositoryOperation::FindAll, Document::new(), FindOptions::new())
            .await
    }

    async fn count(&self) -> RepositoryResult<u64> {
        self.count_visible(Document::new()).await
    }

    async fn count_by_filter(&self, filter: Document) -> RepositoryResult<u64> {
        self.count_visible(filter).await
    }

    async fn exists(&self, filter: Document) -> RepositoryResult<bool> {
        self.check_exists(RepositoryOperation::Exists, filter).await
    }

    async fn exists_by_id(&self, id: &Id) -> RepositoryResult<bool> {
        let operation = RepositoryOperation::Exists;
        let filter = self.id_filter(operation, id)?;
        self.check_exists(operation, filter).await
    }

    async fn exists_by_ids(&self, ids: &[Id]) -> RepositoryResult<Dict<Id, bool>> {
        if ids.is_empty() {
            tracing::debug!("exists_by_ids on '{}' with no ids", self.collection_name());
            return Ok(Dict::new());
        }
        let operation = RepositoryOperation::ExistsByIds;
        let filter = self.scoped_filter(self.ids_filter(operation, ids)?);
        let options = FindOptions::new().with_projection(self.id_projection());
        let documents = self
            .collection
            .find(filter.clone(), options)
            .await
            .map_err(|e| self.store_error(operation, &filter, e))?;

        let mut exists = Dict::with_capacity(documents.len());
        for mut document in documents {
            if let Some(raw) = document.remove(&self.id_field) {
                exists.set(self.decode_id(operation, raw)?, true);
            }
        }
        Ok(exists)
    }

    async fn update(&self, filter: Document, data: Document) -> RepositoryResult<()> {
        self.set_fields(RepositoryOperation::Update, filter, data, true)
            .await
    }

    async fn update_by_id(&self, id: &Id, data: Document) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Update;
        let filter = self.id_filter(operation, id)?;
        self.set_fields(operation, filter, data, false).await
    }

    async fn update_non_zero(&self, filter: Document, entity: &E) -> RepositoryResult<()> {
        let fields = non_zero_fields::<Id, E>(entity)?;
        if fields.is_empty() {
            tracing::debug!(
                "update_non_zero on '{}' skipped: nothing to set",
                self.collection_name()
            );
            return Ok(());
        }
        self.set_fields(RepositoryOperation::UpdateNonZero, filter, fields, true)
            .await
    }

    async fn update_non_zero_by_id(&self, id: &Id, entity: &E) -> RepositoryResult<()> {
        let operation = RepositoryOperation::UpdateNonZero;
        let fields = non_zero_fields::<Id, E>(entity)?;
        if fields.is_empty() {
            tracing::debug!(
                "update_non_zero on '{}' skipped: nothing to set",
                self.collection_name()
            );
            return Ok(());
        }
        let filter = self.id_filter(operation, id)?;
        self.set_fields(operation, filter, fields, false).await
    }

    async fn delete(&self, filter: Document) -> RepositoryResult<()> {
        if self.soft_deletes() {
            return self.soft_delete(filter, true).await;
        }
        self.remove(filter, true).await
    }

    async fn delete_by_id(&self, id: &Id) -> RepositoryResult<()> {
        let filter = self.id_filter(RepositoryOperation::Delete, id)?;
        if self.soft_deletes() {
            return self.soft_delete(filter, false).await;
        }
        self.remove(filter, false).await
    }

    async fn delete_by_ids(&self, ids: &[Id]) -> RepositoryResult<()> {
        if ids.is_empty() {
            tracing::debug!("delete_by_ids on '{}' with no ids", self.collection_name());
            return Ok(());
        }
        let filter = self.ids_filter(RepositoryOperation::Delete, ids)?;
        if self.soft_deletes() {
            return self.soft_delete(filter, true).await;
        }
        self.remove(filter, true).await
    }

    async fn delete_all(&self) -> RepositoryResult<()> {
        self.delete(Document::new()).await
    }

    async fn delete_all_by_filter(&self, filter: Document) -> RepositoryResult<()> {
        self.delete(filter).await
    }
}

fn page_options(limit: u64, offset: u64, orders: &[Order]) -> FindOptions {
    FindOptions::new()
        .with_sort(orders_to_sort(orders))
        .with_skip(offset)
        .with_limit(i64::try_from(limit).unwrap_or(i64::MAX))
}
