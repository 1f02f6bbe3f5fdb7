//! Entity metadata and storage field resolution
//!
//! An entity describes its persisted shape with a static table of
//! [`EntityField`]s. The repository reads that table once, at construction,
//! to find the storage names of the identifier and of the optional
//! soft-delete timestamp.
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::{Entity, EntityField};
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
//!             EntityField::new("DeletedAt"),
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
//! ```

use std::fmt;
use std::hash::Hash;

use serde::{de::DeserializeOwned, Serialize};

use super::error::RepositoryError;
use super::traits::RepositoryResult;

/// Storage name used for an identifier without annotations
pub const DEFAULT_ID_FIELD: &str = "_id";

/// Storage name used for a soft-delete attribute without annotations
pub const DEFAULT_SOFT_DELETE_FIELD: &str = "deleted_at";

/// Identifier attribute names, in order of preference
const ID_ATTRIBUTES: [&str; 2] = ["ID", "Id"];

/// The only attribute name that enables soft delete
const SOFT_DELETE_ATTRIBUTE: &str = "DeletedAt";

/// One declared attribute of an entity
///
/// `storage` is the primary storage-name annotation and `alias` the
/// secondary one. Both are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityField {
    /// Declared attribute name
    pub name: &'static str,
    /// Primary storage-name annotation
    pub storage: Option<&'static str>,
    /// Secondary storage-name annotation
    pub alias: Option<&'static str>,
}

impl EntityField {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            storage: None,
            alias: None,
        }
    }

    #[must_use]
    pub const fn with_storage(self, storage: &'static str) -> Self {
        Self {
            storage: Some(storage),
            ..self
        }
    }

    #[must_use]
    pub const fn with_alias(self, alias: &'static str) -> Self {
        Self {
            alias: Some(alias),
            ..self
        }
    }

    /// The primary annotation, else the secondary one
    pub fn annotated_name(&self) -> Option<&'static str> {
        self.storage.or(self.alias)
    }

    /// The name this attribute is stored under
    pub fn storage_name(&self) -> &'static str {
        self.annotated_name().unwrap_or(self.name)
    }
}

/// Bounds every identifier type must satisfy
pub trait EntityId:
    Serialize + DeserializeOwned + Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static
{
}

impl<T> EntityId for T where
    T: Serialize + DeserializeOwned + Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static
{
}

/// A record a repository can persist
///
/// The serde representation decides the document keys, so renames must agree
/// with the storage names declared in [`fields`](Entity::fields).
pub trait Entity<Id>: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Declared attributes, in declaration order
    fn fields() -> &'static [EntityField];

    fn id(&self) -> Id;

    fn set_id(&mut self, id: Id);
}

/// Short type name for messages, e.g. `User` rather than `my_app::model::User`
pub(crate) fn entity_name<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}

fn find_attribute<'a>(fields: &'a [EntityField], names: &[&str]) -> Option<&'a EntityField> {
    names
        .iter()
        .find_map(|name| fields.iter().find(|field| field.name == *name))
}

fn ensure_record(fields: &[EntityField]) -> RepositoryResult<()> {
    if fields.is_empty() {
        return Err(RepositoryError::configuration(
            "entity declares no fields; only structured records can be stored",
        ));
    }
    Ok(())
}

/// Storage name of the identifier attribute
///
/// The attribute is looked up as `ID`, then `Id`; any other spelling is not
/// an identifier. Its name is the primary annotation, else the alias, else
/// `_id`.
pub fn resolve_id_field(fields: &[EntityField]) -> RepositoryResult<String> {
    ensure_record(fields)?;
    let field = find_attribute(fields, &ID_ATTRIBUTES).ok_or_else(|| {
        RepositoryError::configuration("entity must declare an `ID` or `Id` field")
    })?;
    Ok(field
        .annotated_name()
        .unwrap_or(DEFAULT_ID_FIELD)
        .to_string())
}

/// Storage name of the `DeletedAt` attribute, `None` when there is none
///
/// A plain `deleted_at` attribute is ordinary data and leaves soft delete off.
pub fn resolve_soft_delete_field(fields: &[EntityField]) -> RepositoryResult<Option<String>> {
    ensure_record(fields)?;
    Ok(find_attribute(fields, &[SOFT_DELETE_ATTRIBUTE]).map(|field| {
        field
            .annotated_name()
            .unwrap_or(DEFAULT_SOFT_DELETE_FIELD)
            .to_string()
    }))
}
