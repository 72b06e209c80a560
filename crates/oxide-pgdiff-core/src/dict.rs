//! Per-kind object dictionaries.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{CatalogError, Result};
use crate::key::{ObjectKey, ObjectKind};
use crate::object::DbObject;

/// Objects of one kind, keyed by identity tuple.
///
/// Iteration follows key order, which makes every traversal of a catalog
/// tree deterministic. Catalog-sourced objects are additionally indexed by
/// oid so that dependency records can be resolved.
#[derive(Debug, Clone)]
pub struct ObjectDict<T> {
    items: BTreeMap<ObjectKey, T>,
    oids: HashMap<u32, ObjectKey>,
}

impl<T> Default for ObjectDict<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            oids: HashMap::new(),
        }
    }
}

impl<T: DbObject> ObjectDict<T> {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object under its own key, replacing any previous object
    /// with the same key.
    pub fn insert(&mut self, obj: T) -> Option<T> {
        let key = obj.key();
        if let Some(oid) = obj.meta().oid {
            self.oids.insert(oid, key.clone());
        }
        self.items.insert(key, obj)
    }

    /// Looks up an object by key.
    #[must_use]
    pub fn get(&self, key: &ObjectKey) -> Option<&T> {
        self.items.get(key)
    }

    /// Mutable lookup by key.
    pub fn get_mut(&mut self, key: &ObjectKey) -> Option<&mut T> {
        self.items.get_mut(key)
    }

    /// Whether an object with this key exists.
    #[must_use]
    pub fn contains_key(&self, key: &ObjectKey) -> bool {
        self.items.contains_key(key)
    }

    /// Removes an object.
    pub fn remove(&mut self, key: &ObjectKey) -> Option<T> {
        let obj = self.items.remove(key)?;
        if let Some(oid) = obj.meta().oid {
            self.oids.remove(&oid);
        }
        Some(obj)
    }

    /// Key of the object with the given catalog oid.
    #[must_use]
    pub fn by_oid(&self, oid: u32) -> Option<&ObjectKey> {
        self.oids.get(&oid)
    }

    /// Keeps only the objects for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&ObjectKey, &T) -> bool) {
        self.items.retain(|k, v| keep(k, v));
        let items = &self.items;
        self.oids.retain(|_, k| items.contains_key(k));
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.items.keys()
    }

    /// Objects in key order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    /// Mutable objects in key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    /// Key/object pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectKey, &T)> {
        self.items.iter()
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: DbObject + DeserializeOwned> ObjectDict<T> {
    /// Decodes catalog rows (one JSON object per row) into a dictionary,
    /// converting raw access control lists into privilege entries.
    pub fn from_rows(kind: ObjectKind, rows: &[String]) -> Result<Self> {
        let mut dict = Self::new();
        for row in rows {
            let mut obj: T = serde_json::from_str(row).map_err(|source| CatalogError::Row {
                kind: kind.to_string(),
                source,
            })?;
            obj.meta_mut().absorb_acl(kind);
            trace!(key = %obj.key(), "decoded catalog row");
            dict.insert(obj);
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Schema;

    #[test]
    fn test_insert_indexes_oid() {
        let mut dict = ObjectDict::new();
        let mut schema = Schema::new("s1");
        schema.meta.oid = Some(2200);
        dict.insert(schema);
        let key = ObjectKey::new(ObjectKind::Schema, "s1");
        assert_eq!(dict.by_oid(2200), Some(&key));
        dict.remove(&key);
        assert!(dict.by_oid(2200).is_none());
        assert!(dict.is_empty());
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![
            r#"{"name": "s2", "oid": 16400, "owner": "alice", "acl": ["alice=UC/alice", "=U/alice"]}"#
                .to_string(),
            r#"{"name": "s1", "oid": 16401}"#.to_string(),
        ];
        let dict: ObjectDict<Schema> = ObjectDict::from_rows(ObjectKind::Schema, &rows).unwrap();
        let names: Vec<&str> = dict.values().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["s1", "s2"]);
        let s2 = dict.get(&ObjectKey::new(ObjectKind::Schema, "s2")).unwrap();
        assert_eq!(s2.meta.privileges.len(), 2);
        assert!(s2.meta.acl.is_none());
    }

    #[test]
    fn test_bad_row() {
        let rows = vec![r#"{"oid": 1}"#.to_string()];
        let err = ObjectDict::<Schema>::from_rows(ObjectKind::Schema, &rows).unwrap_err();
        assert!(matches!(err, CatalogError::Row { .. }));
    }
}
