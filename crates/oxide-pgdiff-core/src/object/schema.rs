//! Schemas.

use serde::{Deserialize, Serialize};

use super::{DbObject, Meta};
use crate::database::Database;
use crate::ident::quote_id;
use crate::key::{ObjectKey, ObjectKind};

/// A schema (namespace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name.
    pub name: String,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl Schema {
    /// Creates a schema with no attributes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta: Meta::default(),
        }
    }
}

impl DbObject for Schema {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Schema
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(ObjectKind::Schema, self.name.clone())
    }

    fn set_key(&mut self, key: &ObjectKey) {
        self.name.clone_from(&key.name);
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn qualname(&self) -> String {
        quote_id(&self.name)
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![format!("CREATE SCHEMA {}", quote_id(&self.name))]
    }

    fn implied_deps(&self, _db: &Database) -> Vec<ObjectKey> {
        Vec::new()
    }
}
