//! Soft-delete aware filter construction

use bson::{doc, Bson, Document};

/// Value of the soft-delete field on records that are not deleted
pub const NOT_DELETED: Bson = Bson::Int64(0);

/// Build the native filter for a caller predicate
///
/// The predicate is copied as-is. When `soft_delete_field` is set and the
/// repository is scoped, records must also have the field equal to zero,
/// null or missing. A caller-supplied top-level `$or` is kept by nesting both sides
/// under `$and`.
pub fn build_filter(predicate: Document, soft_delete_field: Option<&str>, unscoped: bool) -> Document {
    let Some(field) = soft_delete_field.filter(|_| !unscoped) else {
        return predicate;
    };

    let visibility = visibility_clause(field);
    if predicate.contains_key("$or") {
        return doc! { "$and": [predicate, visibility] };
    }

    let mut filter = predicate;
    filter.extend(visibility);
    filter
}

/// `{"$or": [{field: 0}, {field: null}, {field: {"$exists": false}}]}`
///
/// `null` is what an unset `Option` timestamp encodes to.
fn visibility_clause(field: &str) -> Document {
    let mut zero = Document::new();
    zero.insert(field, NOT_DELETED);

    let mut null = Document::new();
    null.insert(field, Bson::Null);

    let mut missing = Document::new();
    missing.insert(field, doc! { "$exists": false });

    doc! { "$or": [zero, null, missing] }
}
