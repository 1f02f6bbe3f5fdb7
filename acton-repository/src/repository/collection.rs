//! Query result wrappers
//!
//! [`Collection`] holds the entities returned by a multi-document query and
//! builds an identifier index the first time a keyed lookup needs it.
//! [`Dict`] is a plain map, used for existence checks where a missing key
//! means `false`.

use std::collections::{hash_map, HashMap};
use std::hash::Hash;
use std::marker::PhantomData;

use once_cell::sync::OnceCell;
use serde::{Serialize, Serializer};

use super::entity::{Entity, EntityId};

/// Ordered, read-only query result with lazy lookup by identifier
///
/// When several entities share an identifier, lookups return the first one.
#[derive(Debug, Clone)]
pub struct Collection<Id, E> {
    items: Vec<E>,
    index: OnceCell<HashMap<Id, usize>>,
    _id: PhantomData<fn() -> Id>,
}

impl<Id, E> Collection<Id, E> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entities in query order
    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&E> {
        self.items.first()
    }

    pub fn into_items(self) -> Vec<E> {
        self.items
    }
}

impl<Id, E> Collection<Id, E>
where
    Id: EntityId,
    E: Entity<Id>,
{
    pub fn new(items: Vec<E>) -> Self {
        Self {
            items,
            index: OnceCell::new(),
            _id: PhantomData,
        }
    }

    fn index(&self) -> &HashMap<Id, usize> {
        self.index.get_or_init(|| {
            let mut index = HashMap::with_capacity(self.items.len());
            for (position, item) in self.items.iter().enumerate() {
                index.entry(item.id()).or_insert(position);
            }
            index
        })
    }

    /// Identifiers in query order
    pub fn ids(&self) -> Vec<Id> {
        self.items.iter().map(|item| item.id()).collect()
    }

    pub fn get(&self, id: &Id) -> Option<&E> {
        self.index().get(id).map(|&position| &self.items[position])
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.index().contains_key(id)
    }

    /// Entities for `ids`, in the order asked, skipping unknown identifiers
    pub fn pick(&self, ids: &[Id]) -> Vec<&E> {
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Presence of each of `ids` in this result
    pub fn exists(&self, ids: &[Id]) -> Dict<Id, bool> {
        ids.iter()
            .map(|id| (id.clone(), self.contains(id)))
            .collect()
    }
}

impl<Id, E> Default for Collection<Id, E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: OnceCell::new(),
            _id: PhantomData,
        }
    }
}

impl<Id, E> IntoIterator for Collection<Id, E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, Id, E> IntoIterator for &'a Collection<Id, E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<Id, E: Serialize> Serialize for Collection<Id, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

/// Map from key to value; for `bool` values a missing key reads as `false`
#[derive(Debug, Clone)]
pub struct Dict<K, V> {
    inner: HashMap<K, V>,
}

impl<K, V> Dict<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: HashMap::with_capacity(capacity),
        }
    }

    pub fn set(&mut self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn keys(&self) -> hash_map::Keys<'_, K, V> {
        self.inner.keys()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, K, V> {
        self.inner.iter()
    }

    pub fn into_inner(self) -> HashMap<K, V> {
        self.inner
    }
}

impl<K> Dict<K, bool>
where
    K: Eq + Hash,
{
    /// Stored flag for `key`, `false` when absent
    pub fn exists(&self, key: &K) -> bool {
        self.inner.get(key).copied().unwrap_or(false)
    }
}

impl<K: Eq + Hash, V> Default for Dict<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V: PartialEq> PartialEq for Dict<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<K: Eq + Hash, V: Eq> Eq for Dict<K, V> {}

impl<K, V> From<HashMap<K, V>> for Dict<K, V> {
    fn from(inner: HashMap<K, V>) -> Self {
        Self { inner }
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for Dict<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl<K, V> IntoIterator for Dict<K, V> {
    type Item = (K, V);
    type IntoIter = hash_map::IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}
