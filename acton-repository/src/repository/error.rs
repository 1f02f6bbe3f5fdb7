//! Repository error types
//!
//! Every store failure surfaced by a repository is normalized into a
//! [`RepositoryError`]. The [`RepositoryErrorKind`] tells callers what
//! happened without parsing messages; the original [`StoreError`] stays
//! reachable through [`RepositoryError::store_error`] and
//! [`std::error::Error::source`].
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
//! use acton_repository::store::StoreError;
//!
//! let error = RepositoryError::from_store(
//!     RepositoryOperation::FindById,
//!     "find_by_id on 'users'",
//!     StoreError::no_documents(),
//! );
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.is_not_found());
//! ```

use std::fmt;

use crate::store::{StoreError, StoreErrorKind};

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Resolving entity metadata while constructing a repository
    Configure,
    /// Inserting a new entity
    Create,
    /// Finding the first entity matching a filter
    FindOne,
    /// Finding a single entity by ID
    FindById,
    /// Finding entities by a list of IDs
    FindByIds,
    /// Finding a page of entities
    FindByPage,
    /// Finding entities matching a filter
    FindByFilter,
    /// Finding a page of entities matching a filter
    FindByFilterWithPage,
    /// Finding every visible entity
    FindAll,
    /// Counting entities
    Count,
    /// Checking whether a matching entity exists
    Exists,
    /// Checking which of a list of IDs exist
    ExistsByIds,
    /// Updating entities
    Update,
    /// Updating entities with the non-zero fields of an entity
    UpdateNonZero,
    /// Removing entities (hard delete)
    Delete,
    /// Stamping entities as deleted
    SoftDelete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure => write!(f, "configure"),
            Self::Create => write!(f, "create"),
            Self::FindOne => write!(f, "find_one"),
            Self::FindById => write!(f, "find_by_id"),
            Self::FindByIds => write!(f, "find_by_ids"),
            Self::FindByPage => write!(f, "find_by_page"),
            Self::FindByFilter => write!(f, "find_by_filter"),
            Self::FindByFilterWithPage => write!(f, "find_by_filter_with_page"),
            Self::FindAll => write!(f, "find_all"),
            Self::Count => write!(f, "count"),
            Self::Exists => write!(f, "exists"),
            Self::ExistsByIds => write!(f, "exists_by_ids"),
            Self::Update => write!(f, "update"),
            Self::UpdateNonZero => write!(f, "update_non_zero"),
            Self::Delete => write!(f, "delete"),
            Self::SoftDelete => write!(f, "soft_delete"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// No document satisfied a point lookup
    NotFound,
    /// An insert violated a uniqueness constraint
    DuplicatedKey,
    /// The entity type does not declare the metadata a repository needs
    Configuration,
    /// An entity or identifier could not be converted to or from a document
    Serialization,
    /// Any other store failure
    Io,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::DuplicatedKey => write!(f, "duplicated_key"),
            Self::Configuration => write!(f, "configuration"),
            Self::Serialization => write!(f, "serialization"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// Structured repository error with operation context
///
/// Equality compares the operation, kind, message and entity context; the
/// underlying store error is deliberately left out so errors built in tests
/// compare equal to errors produced by a live store.
///
/// # Example
///
/// ```rust
/// use acton_repository::repository::{RepositoryError, RepositoryOperation};
/// use acton_repository::store::StoreError;
///
/// let error = RepositoryError::from_store(
///     RepositoryOperation::Create,
///     "create into 'users'",
///     StoreError::duplicate_key("E11000 duplicate key error"),
/// )
/// .with_entity("User", "42");
/// assert!(error.is_duplicated_key());
/// assert_eq!(error.operation, RepositoryOperation::Create);
/// ```
#[derive(Debug, Clone)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message, including the call parameters
    pub message: String,
    /// The type of entity involved (e.g., "User", "Order")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
    source: Option<StoreError>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            source: None,
        }
    }

    /// Create a configuration error, raised while constructing a repository
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_repository::repository::{RepositoryError, RepositoryErrorKind};
    ///
    /// let error = RepositoryError::configuration("entity must declare an `ID` or `Id` field");
    /// assert_eq!(error.kind, RepositoryErrorKind::Configuration);
    /// ```
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Configure,
            RepositoryErrorKind::Configuration,
            message,
        )
    }

    /// Create a serialization error
    pub fn serialization(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Serialization, message)
    }

    /// Normalize a store error into a repository error
    ///
    /// Store-level "no documents" and "duplicate key" signals keep their
    /// meaning; everything else becomes a generic [`RepositoryErrorKind::Io`]
    /// failure. The store error is kept as the source either way.
    pub fn from_store(
        operation: RepositoryOperation,
        context: impl fmt::Display,
        error: StoreError,
    ) -> Self {
        let kind = match error.kind {
            StoreErrorKind::NoDocuments => RepositoryErrorKind::NotFound,
            StoreErrorKind::DuplicateKey => RepositoryErrorKind::DuplicatedKey,
            StoreErrorKind::Serialization => RepositoryErrorKind::Serialization,
            _ => RepositoryErrorKind::Io,
        };
        Self {
            operation,
            kind,
            message: format!("{}: {}", context, error),
            entity_type: None,
            entity_id: None,
            source: Some(error),
        }
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// The store error this error was normalized from, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        self.source.as_ref()
    }

    /// True for [`RepositoryErrorKind::NotFound`]
    pub fn is_not_found(&self) -> bool {
        self.kind == RepositoryErrorKind::NotFound
    }

    /// True for [`RepositoryErrorKind::DuplicatedKey`]
    pub fn is_duplicated_key(&self) -> bool {
        self.kind == RepositoryErrorKind::DuplicatedKey
    }

    /// Check if this error is retriable (transient store failures)
    ///
    /// Repositories never retry on their own; this only classifies.
    pub fn is_retriable(&self) -> bool {
        self.source.as_ref().is_some_and(|e| {
            matches!(
                e.kind,
                StoreErrorKind::Connection | StoreErrorKind::Timeout
            )
        })
    }
}

impl PartialEq for RepositoryError {
    fn eq(&self, other: &Self) -> bool {
        self.operation == other.operation
            && self.kind == other.kind
            && self.message == other.message
            && self.entity_type == other.entity_type
            && self.entity_id == other.entity_id
    }
}

impl Eq for RepositoryError {}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::Configure), "configure");
        assert_eq!(format!("{}", RepositoryOperation::FindById), "find_by_id");
        assert_eq!(
            format!("{}", RepositoryOperation::FindByFilterWithPage),
            "find_by_filter_with_page"
        );
        assert_eq!(format!("{}", RepositoryOperation::ExistsByIds), "exists_by_ids");
        assert_eq!(
            format!("{}", RepositoryOperation::UpdateNonZero),
            "update_non_zero"
        );
        assert_eq!(format!("{}", RepositoryOperation::SoftDelete), "soft_delete");
    }

    #[test]
    fn test_repository_error_kind_display() {
        assert_eq!(format!("{}", RepositoryErrorKind::NotFound), "not_found");
        assert_eq!(
            format!("{}", RepositoryErrorKind::DuplicatedKey),
            "duplicated_key"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::Configuration),
            "configuration"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::Serialization),
            "serialization"
        );
        assert_eq!(format!("{}", RepositoryErrorKind::Io), "io");
    }

    fn user_not_found() -> RepositoryError {
        RepositoryError::from_store(
            RepositoryOperation::FindById,
            "find_by_id on 'users'",
            StoreError::no_documents(),
        )
        .with_entity("User", "usr_123")
    }

    #[test]
    fn test_not_found_with_entity() {
        let error = user_not_found();
        assert_eq!(error.operation, RepositoryOperation::FindById);
        assert!(error.is_not_found());
        assert!(!error.is_duplicated_key());
        assert_eq!(error.entity_type, Some("User".to_string()));
        assert_eq!(error.entity_id, Some("usr_123".to_string()));
    }

    #[test]
    fn test_from_store_maps_no_documents() {
        let error = RepositoryError::from_store(
            RepositoryOperation::FindOne,
            "param: {}",
            StoreError::no_documents(),
        );
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(
            error.store_error().map(|e| e.kind),
            Some(StoreErrorKind::NoDocuments)
        );
    }

    #[test]
    fn test_from_store_maps_duplicate_key() {
        let error = RepositoryError::from_store(
            RepositoryOperation::Create,
            "param: 1",
            StoreError::duplicate_key("E11000 duplicate key error"),
        );
        assert!(error.is_duplicated_key());
        assert!(error.message.contains("param: 1"));
        assert!(error.message.contains("E11000"));
    }

    #[test]
    fn test_from_store_wraps_other_failures() {
        let error = RepositoryError::from_store(
            RepositoryOperation::Count,
            "param: {}",
            StoreError::other("disk on fire"),
        );
        assert_eq!(error.kind, RepositoryErrorKind::Io);
        assert!(!error.is_retriable());

        let source = error.source().map(|e| e.to_string());
        assert!(source.is_some_and(|s| s.contains("disk on fire")));
    }

    #[test]
    fn test_is_retriable_transient_errors() {
        let refused = RepositoryError::from_store(
            RepositoryOperation::FindAll,
            "param: {}",
            StoreError::connection("connection refused"),
        );
        assert!(refused.is_retriable());

        let timed_out = RepositoryError::from_store(
            RepositoryOperation::FindAll,
            "param: {}",
            StoreError::timeout("server selection timed out"),
        );
        assert!(timed_out.is_retriable());
        assert!(!user_not_found().is_retriable());
    }

    #[test]
    fn test_display_with_entity() {
        let display = format!("{}", user_not_found());
        assert!(display.contains("not_found"));
        assert!(display.contains("find_by_id"));
        assert!(display.contains("[User: usr_123]"));
    }

    #[test]
    fn test_display_without_entity() {
        let display = format!("{}", RepositoryError::configuration("no id"));
        assert!(display.contains("configuration"));
        assert!(!display.contains('['));
    }

    #[test]
    fn test_error_equality_ignores_source() {
        let from_store = RepositoryError::from_store(
            RepositoryOperation::Update,
            "param",
            StoreError::other("boom"),
        );
        let built = RepositoryError::new(
            RepositoryOperation::Update,
            RepositoryErrorKind::Io,
            from_store.message.clone(),
        );
        assert_eq!(from_store, built);
    }
}
