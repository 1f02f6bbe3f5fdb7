//! In-memory document collection
//!
//! Keeps documents in insertion order behind a `tokio` read/write lock and
//! evaluates MongoDB-style filters, sorts, projections and `$set`/`$unset`
//! updates. Only the subset of the query language that repositories and
//! typical callers use is supported; anything else is rejected with a
//! [`StoreErrorKind::Other`](super::StoreErrorKind::Other) error rather than
//! silently matching.

use std::cmp::Ordering;

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use tokio::sync::RwLock;

use super::{DocumentCollection, FindOptions, StoreError, StoreResult, UpdateOutcome};

/// A named collection held entirely in memory
///
/// `_id` is always unique; additional unique fields can be declared with
/// [`with_unique_index`](Self::with_unique_index). Documents inserted without
/// an `_id` receive a fresh [`ObjectId`].
///
/// # Example
///
/// ```rust,ignore
/// use acton_repository::store::{DocumentCollection, MemoryCollection};
/// use bson::doc;
///
/// let users = MemoryCollection::new("users").with_unique_index("email");
/// users.insert_one(doc! { "_id": 1_i64, "email": "a@example.com" }).await?;
/// assert!(users.insert_one(doc! { "_id": 2_i64, "email": "a@example.com" }).await.is_err());
/// ```
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
    unique_fields: Vec<String>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
            unique_fields: Vec::new(),
        }
    }

    /// Enforce uniqueness on `field` in addition to `_id`
    #[must_use]
    pub fn with_unique_index(mut self, field: impl Into<String>) -> Self {
        self.unique_fields.push(field.into());
        self
    }

    /// Number of stored documents, ignoring any soft-delete marker
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Copy of every stored document in insertion order
    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    fn check_unique(
        &self,
        documents: &[Document],
        candidate: &Document,
        skip: Option<usize>,
    ) -> StoreResult<()> {
        let fields = std::iter::once("_id").chain(self.unique_fields.iter().map(String::as_str));
        for field in fields {
            let Some(value) = candidate.get(field) else {
                continue;
            };
            let conflict = documents
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != skip)
                .any(|(_, existing)| existing.get(field).is_some_and(|v| bson_eq(v, value)));
            if conflict {
                return Err(StoreError::duplicate_key(format!(
                    "E11000 duplicate key error collection: {} index: {}_1 dup key: {{ {}: {} }}",
                    self.name, field, field, value
                )));
            }
        }
        Ok(())
    }

    async fn update(
        &self,
        filter: &Document,
        update: &Document,
        multi: bool,
    ) -> StoreResult<UpdateOutcome> {
        let mut documents = self.documents.write().await;
        let mut outcome = UpdateOutcome::default();

        for index in 0..documents.len() {
            if !matches(&documents[index], filter)? {
                continue;
            }
            outcome.matched += 1;

            let mut updated = documents[index].clone();
            if apply_update(&mut updated, update)? {
                self.check_unique(&documents, &updated, Some(index))?;
                documents[index] = updated;
                outcome.modified += 1;
            }

            if !multi {
                break;
            }
        }

        Ok(outcome)
    }

    async fn delete(&self, filter: &Document, multi: bool) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        let mut doomed = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if matches(document, filter)? {
                doomed.push(index);
                if !multi {
                    break;
                }
            }
        }
        for index in doomed.iter().rev() {
            documents.remove(*index);
        }
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        let document = if document.contains_key("_id") {
            document
        } else {
            let mut with_id = Document::new();
            with_id.insert("_id", ObjectId::new());
            with_id.extend(document);
            with_id
        };
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);

        let mut documents = self.documents.write().await;
        self.check_unique(&documents, &document, None)?;
        documents.push(document);
        Ok(id)
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<Option<Document>> {
        let options = FindOptions {
            limit: Some(1),
            ..options
        };
        Ok(self.find(filter, options).await?.into_iter().next())
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut found = Vec::new();
        for document in documents.iter() {
            if matches(document, &filter)? {
                found.push(document);
            }
        }

        if let Some(sort) = &options.sort {
            found.sort_by(|a, b| compare_by_sort(a, b, sort));
        }

        let skip = usize::try_from(options.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = match options.limit {
            Some(limit) if limit != 0 => {
                usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX)
            }
            _ => usize::MAX,
        };

        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| match &options.projection {
                Some(projection) => project(document, projection),
                None => document.clone(),
            })
            .collect())
    }

    async fn count_documents(&self, filter: Document) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        let mut count = 0;
        for document in documents.iter() {
            if matches(document, &filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn update_one(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        self.update(&filter, &update, false).await
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        self.update(&filter, &update, true).await
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<u64> {
        self.delete(&filter, false).await
    }

    async fn delete_many(&self, filter: Document) -> StoreResult<u64> {
        self.delete(&filter, true).await
    }
}

// =============================================================================
// Filter evaluation
// =============================================================================

fn matches(document: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(StoreError::other(format!(
                    "unsupported top-level operator: {}",
                    op
                )));
            }
            path => matches_field(lookup(document, path), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(operator: &str, value: &'a Bson) -> StoreResult<Vec<&'a Document>> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| StoreError::other(format!("{} must be a nonempty array", operator)))?;
    items
        .iter()
        .map(|item| {
            item.as_document().ok_or_else(|| {
                StoreError::other(format!("{} entries must be documents", operator))
            })
        })
        .collect()
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }
    Some(current)
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    condition
        .as_document()
        .filter(|d| d.keys().next().is_some_and(|k| k.starts_with('$')))
}

fn matches_field(value: Option<&Bson>, condition: &Bson) -> StoreResult<bool> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(equals(value, condition));
    };

    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compares(value, operand, |o| o == Ordering::Greater),
            "$gte" => compares(value, operand, |o| o != Ordering::Less),
            "$lt" => compares(value, operand, |o| o == Ordering::Less),
            "$lte" => compares(value, operand, |o| o != Ordering::Greater),
            "$in" => candidates(operator, operand)?
                .iter()
                .any(|candidate| equals(value, candidate)),
            "$nin" => !candidates(operator, operand)?
                .iter()
                .any(|candidate| equals(value, candidate)),
            "$exists" => truthy(operand) == value.is_some(),
            "$not" => match operand.as_document() {
                Some(_) => !matches_field(value, operand)?,
                None => return Err(StoreError::other("$not needs a document")),
            },
            other => {
                return Err(StoreError::other(format!(
                    "unsupported query operator: {}",
                    other
                )));
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn candidates<'a>(operator: &str, operand: &'a Bson) -> StoreResult<&'a Vec<Bson>> {
    operand
        .as_array()
        .ok_or_else(|| StoreError::other(format!("{} needs an array", operator)))
}

/// Equality with MongoDB's conveniences: a missing field equals `null`, and
/// an array field matches when any element matches.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_eq(item, expected))
        }
        Some(value) => bson_eq(value, expected),
    }
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare(item, operand).is_some_and(&accept)),
        Some(value) => compare(value, operand).is_some_and(accept),
        None => false,
    }
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(n) => Some(*n),
        other => as_integer(other).map(|n| n as f64),
    }
}

/// Ordering between two values of comparable types, `None` otherwise
fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_integer(a), as_integer(b)) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => as_number(other).map_or(true, |n| n != 0.0),
    }
}

// =============================================================================
// Sorting and projection
// =============================================================================

/// BSON cross-type sort order
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 2,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Binary(_)) => 6,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(Bson::Timestamp(_)) => 10,
        Some(_) => 11,
    }
}

fn compare_by_sort(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let left = lookup(a, field);
        let right = lookup(b, field);
        let ordering = type_rank(left).cmp(&type_rank(right)).then_with(|| {
            match (left, right) {
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        });
        let ordering = if as_number(direction).is_some_and(|d| d < 0.0) {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(document: &Document, projection: &Document) -> Document {
    let inclusive = projection.values().any(truthy);
    if !inclusive {
        let mut projected = document.clone();
        for field in projection.keys() {
            projected.remove(field);
        }
        return projected;
    }

    let mut projected = Document::new();
    let include_id = projection.get("_id").map_or(true, truthy);
    if include_id {
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
    }
    for (field, flag) in projection {
        if field == "_id" || !truthy(flag) {
            continue;
        }
        if let Some(value) = document.get(field) {
            projected.insert(field.clone(), value.clone());
        }
    }
    projected
}

// =============================================================================
// Updates
// =============================================================================

/// Apply `$set` / `$unset` to `document`, returning whether anything changed
fn apply_update(document: &mut Document, update: &Document) -> StoreResult<bool> {
    if update.is_empty() {
        return Err(StoreError::other("update document must not be empty"));
    }

    let mut modified = false;
    for (operator, fields) in update {
        if !operator.starts_with('$') {
            return Err(StoreError::other(
                "update document requires atomic operators",
            ));
        }
        let fields = fields
            .as_document()
            .ok_or_else(|| StoreError::other(format!("{} needs a document", operator)))?;
        if fields.is_empty() {
            return Err(StoreError::other(format!(
                "'{}' is empty. You must specify a field like so: {{{}: {{<field>: ...}}}}",
                operator, operator
            )));
        }

        match operator.as_str() {
            "$set" => {
                for (field, value) in fields {
                    if document.get(field) == Some(value) {
                        continue;
                    }
                    if field == "_id" {
                        return Err(StoreError::other(
                            "Performing an update on the path '_id' would modify the immutable field '_id'",
                        ));
                    }
                    document.insert(field.clone(), value.clone());
                    modified = true;
                }
            }
            "$unset" => {
                for field in fields.keys() {
                    if field == "_id" {
                        return Err(StoreError::other(
                            "Performing an update on the path '_id' would modify the immutable field '_id'",
                        ));
                    }
                    modified |= document.remove(field).is_some();
                }
            }
            other => {
                return Err(StoreError::other(format!(
                    "unsupported update operator: {}",
                    other
                )));
            }
        }
    }
    Ok(modified)
}
