//! Non-zero field projection for partial updates

use bson::{Bson, Document};

use super::entity::{entity_name, Entity};
use super::error::{RepositoryError, RepositoryOperation};
use super::traits::RepositoryResult;

/// Declared fields of `entity` whose values are not zero
///
/// Keys are storage names, in declaration order. An entity whose fields are
/// all zero yields an empty document.
pub fn non_zero_fields<Id, E>(entity: &E) -> RepositoryResult<Document>
where
    E: Entity<Id>,
{
    let encoded = bson::to_document(entity).map_err(|e| {
        RepositoryError::serialization(
            RepositoryOperation::UpdateNonZero,
            format!("failed to encode {}: {}", entity_name::<E>(), e),
        )
    })?;

    let mut fields = Document::new();
    for field in E::fields() {
        let name = field.storage_name();
        match encoded.get(name) {
            Some(value) if !is_zero(value) => {
                fields.insert(name, value.clone());
            }
            _ => {}
        }
    }
    Ok(fields)
}

/// Whether `value` is the encoding of a type's default value
pub fn is_zero(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => true,
        Bson::Boolean(b) => !b,
        Bson::Int32(n) => *n == 0,
        Bson::Int64(n) => *n == 0,
        Bson::Double(n) => *n == 0.0,
        Bson::String(s) => s.is_empty(),
        Bson::Array(items) => items.is_empty(),
        Bson::Binary(binary) => binary.bytes.is_empty(),
        Bson::ObjectId(oid) => oid.bytes() == [0; 12],
        Bson::DateTime(dt) => dt.timestamp_millis() == 0,
        Bson::Timestamp(ts) => ts.time == 0 && ts.increment == 0,
        Bson::Document(document) => document.values().all(is_zero),
        _ => false,
    }
}
