//! Keyed view stores.
//!
//! A [`Store`] holds the last observed version of every live object of
//! one kind, keyed by `namespace/name`. It is the shadow state the
//! delta engine diffs against: single-owner, no internal locking.

use std::collections::HashMap;

use crate::object::Object;

/// A keyed collection of objects of one kind.
#[derive(Debug, Default)]
pub struct Store {
    objects: HashMap<String, Object>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object, replacing any existing entry under the same
    /// identity key.
    pub fn add(&mut self, object: Object) {
        self.objects.insert(object.key(), object);
    }

    /// Removes the entry with the object's identity key. A no-op when
    /// the key is absent.
    pub fn delete(&mut self, object: &Object) {
        self.objects.remove(&object.key());
    }

    /// Looks up the stored version of the given object.
    pub fn get(&self, object: &Object) -> Option<&Object> {
        self.get_by_key(&object.key())
    }

    /// Looks up an object by identity key.
    pub fn get_by_key(&self, key: &str) -> Option<&Object> {
        self.objects.get(key)
    }

    /// Whether the store holds an entry for the object's key.
    pub fn contains(&self, object: &Object) -> bool {
        self.objects.contains_key(&object.key())
    }

    /// An unordered snapshot of all stored objects.
    pub fn list(&self) -> Vec<&Object> {
        self.objects.values().collect()
    }

    /// The number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
