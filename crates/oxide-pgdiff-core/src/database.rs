//! The catalog tree: one dictionary per object kind.
//!
//! [`Database`] is produced either from a live catalog
//! ([`Database::from_catalog`](crate::catalog)) or from the YAML wire
//! format ([`crate::wire::from_map`]), and the two are compared by
//! [`crate::diff::diff`].

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::dict::ObjectDict;
use crate::error::{CatalogError, Result};
use crate::ident::{split_schema_obj, DEFAULT_SCHEMA};
use crate::key::{ObjectKey, ObjectKind};
use crate::object::*;

/// Decodes a wire-format attribute map into an object, attributing
/// decode failures to `object`.
pub(crate) fn decode_value<T: DeserializeOwned>(object: &str, value: Value) -> Result<T> {
    serde_yaml::from_value(value).map_err(|e| {
        let message = e.to_string();
        match message
            .split_once("missing field `")
            .and_then(|(_, rest)| rest.split_once('`'))
        {
            Some((attribute, _)) => CatalogError::missing(object, attribute),
            None => CatalogError::invalid(object, message),
        }
    })
}

macro_rules! catalog {
    ($($kind:ident => $field:ident),* $(,)?) => {
        /// A complete catalog tree.
        #[derive(Debug, Clone, Default)]
        pub struct Database {
            $(
                #[doc = concat!("Objects of kind `", stringify!($kind), "`.")]
                pub $field: ObjectDict<$kind>,
            )*
            /// Dependencies recorded by the catalog itself (`pg_depend`,
            /// view rewrite rules, column defaults), keyed by dependent.
            pub catalog_deps: BTreeMap<ObjectKey, BTreeSet<ObjectKey>>,
        }

        /// A borrowed object of any kind.
        #[derive(Debug, Clone, Copy)]
        pub enum ObjectRef<'a> {
            $(
                #[doc = concat!("A `", stringify!($kind), "`.")]
                $kind(&'a $kind),
            )*
        }

        impl<'a> ObjectRef<'a> {
            /// The object behind its capability trait.
            #[must_use]
            pub fn as_object(self) -> &'a dyn DbObject {
                match self {
                    $( Self::$kind(obj) => obj, )*
                }
            }

            /// Wire-format attribute map of the object.
            pub fn to_value(self) -> Result<Value> {
                Ok(match self {
                    $( Self::$kind(obj) => serde_yaml::to_value(obj)?, )*
                })
            }

            /// A copy of the object re-pointed at `key`.
            pub(crate) fn rebased(self, key: &ObjectKey) -> Box<dyn DbObject> {
                match self {
                    $(
                        Self::$kind(obj) => {
                            let mut obj = obj.clone();
                            obj.set_key(key);
                            Box::new(obj)
                        }
                    )*
                }
            }

            /// Compares this (current) object with `desired`, after
            /// re-pointing it at the desired identity so that renames of the
            /// object or its schema do not show up as differences.
            pub(crate) fn alter(self, desired: ObjectRef<'_>, db: &Database) -> Result<Alteration> {
                match (self, desired) {
                    $(
                        (Self::$kind(old), ObjectRef::$kind(new)) => {
                            let mut old = old.clone();
                            old.set_key(&new.key());
                            old.alter_sql(new, db)
                        }
                    )*
                    _ => Ok(Alteration::Recreate),
                }
            }
        }

        impl Database {
            /// Looks up an object by key.
            #[must_use]
            pub fn get(&self, key: &ObjectKey) -> Option<ObjectRef<'_>> {
                match key.kind {
                    $( ObjectKind::$kind => self.$field.get(key).map(ObjectRef::$kind), )*
                    ObjectKind::Column => None,
                }
            }

            /// All objects, grouped by kind and in key order within a kind.
            pub fn objects(&self) -> impl Iterator<Item = ObjectRef<'_>> {
                std::iter::empty()
                    $( .chain(self.$field.values().map(ObjectRef::$kind)) )*
            }

            /// Total number of objects.
            #[must_use]
            pub fn object_count(&self) -> usize {
                0 $( + self.$field.len() )*
            }

            /// Resolves a catalog `(table, oid)` pair to an object key.
            #[must_use]
            pub fn lookup_oid(&self, catalog: &str, oid: u32) -> Option<ObjectKey> {
                $(
                    if ObjectKind::$kind.catalog_table() == Some(catalog) {
                        if let Some(key) = self.$field.by_oid(oid) {
                            return Some(key.clone());
                        }
                    }
                )*
                None
            }

            /// Keeps only the objects whose key satisfies `keep`.
            pub fn retain(&mut self, keep: impl Fn(&ObjectKey) -> bool) {
                $( self.$field.retain(|key, _| keep(key)); )*
                self.catalog_deps.retain(|key, _| keep(key));
                for deps in self.catalog_deps.values_mut() {
                    deps.retain(|dep| keep(dep));
                }
            }

            /// Decodes a wire attribute map as an object of `kind` and
            /// inserts it.
            pub(crate) fn insert_value(
                &mut self,
                kind: ObjectKind,
                object: &str,
                value: Value,
            ) -> Result<ObjectKey> {
                match kind {
                    $(
                        ObjectKind::$kind => {
                            let obj: $kind = decode_value(object, value)?;
                            let key = obj.key();
                            self.$field.insert(obj);
                            Ok(key)
                        }
                    )*
                    ObjectKind::Column => Err(CatalogError::invalid(
                        object,
                        "columns are only valid inside tables",
                    )),
                }
            }
        }
    };
}

catalog! {
    Schema => schemas,
    Extension => extensions,
    Language => languages,
    ForeignDataWrapper => wrappers,
    ForeignServer => servers,
    UserMapping => user_mappings,
    Collation => collations,
    Conversion => conversions,
    BaseType => base_types,
    CompositeType => composite_types,
    EnumType => enum_types,
    RangeType => range_types,
    Domain => domains,
    Function => functions,
    Aggregate => aggregates,
    Operator => operators,
    OperatorFamily => operator_families,
    OperatorClass => operator_classes,
    Cast => casts,
    TsParser => ts_parsers,
    TsTemplate => ts_templates,
    TsDictionary => ts_dictionaries,
    TsConfiguration => ts_configurations,
    Sequence => sequences,
    Table => tables,
    ForeignTable => foreign_tables,
    CheckConstraint => check_constraints,
    PrimaryKey => primary_keys,
    UniqueConstraint => unique_constraints,
    Index => indexes,
    ForeignKey => foreign_keys,
    View => views,
    MaterializedView => materialized_views,
    Trigger => triggers,
    Rule => rules,
    EventTrigger => event_triggers,
}

const RELATION_KINDS: [ObjectKind; 5] = [
    ObjectKind::Table,
    ObjectKind::View,
    ObjectKind::MaterializedView,
    ObjectKind::ForeignTable,
    ObjectKind::Sequence,
];

const TYPE_KINDS: [ObjectKind; 5] = [
    ObjectKind::BaseType,
    ObjectKind::CompositeType,
    ObjectKind::EnumType,
    ObjectKind::RangeType,
    ObjectKind::Domain,
];

impl Database {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys, grouped by kind and in key order within a kind.
    #[must_use]
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.objects().map(|obj| obj.as_object().key()).collect()
    }

    /// Key of the relation (table, view, materialized view, foreign table
    /// or sequence) with this schema and name.
    #[must_use]
    pub fn relation_key(&self, schema: &str, name: &str) -> Option<ObjectKey> {
        RELATION_KINDS
            .iter()
            .map(|kind| ObjectKey::scoped(*kind, schema, name))
            .find(|key| self.get(key).is_some())
    }

    /// Key of the user-defined type or domain with this schema and name.
    #[must_use]
    pub fn type_key(&self, schema: &str, name: &str) -> Option<ObjectKey> {
        TYPE_KINDS
            .iter()
            .map(|kind| ObjectKey::scoped(*kind, schema, name))
            .find(|key| self.get(key).is_some())
    }

    /// Resolves a function reference of the form `[schema.]name[(args)]`.
    ///
    /// With an argument list the exact overload is looked up; otherwise
    /// (or when that fails) the first function of that name is taken.
    /// Aggregates are resolved the same way.
    #[must_use]
    pub fn function_ref(&self, spec: &str, default_schema: &str) -> Option<ObjectKey> {
        let spec = spec.trim();
        let (name_part, args) = match spec.split_once('(') {
            Some((name, rest)) => (name.trim(), Some(rest.trim_end().trim_end_matches(')').trim())),
            None => (spec, None),
        };
        if name_part.is_empty() {
            return None;
        }
        let (schema, name) = split_schema_obj(name_part, default_schema);
        for kind in [ObjectKind::Function, ObjectKind::Aggregate] {
            if let Some(args) = args {
                let key = ObjectKey::scoped(kind, schema.as_str(), name.as_str()).with_signature(args);
                if self.get(&key).is_some() {
                    return Some(key);
                }
            }
        }
        let same_name =
            |key: &&ObjectKey| key.schema.as_deref() == Some(schema.as_str()) && key.name == name;
        self.functions
            .keys()
            .find(same_name)
            .or_else(|| self.aggregates.keys().find(same_name))
            .cloned()
    }

    /// The table, view or domain owning a table-owned object.
    #[must_use]
    pub fn owner_key(&self, key: &ObjectKey) -> Option<ObjectKey> {
        if !key.kind.is_table_owned() {
            return None;
        }
        let schema = key.schema.as_deref().unwrap_or(DEFAULT_SCHEMA);
        let parent = key.parent.as_deref()?;
        if key.kind == ObjectKind::CheckConstraint {
            if let Some(check) = self.check_constraints.get(key) {
                if check.on_domain {
                    let domain = ObjectKey::scoped(ObjectKind::Domain, schema, parent);
                    return self.domains.contains_key(&domain).then_some(domain);
                }
            }
        }
        self.relation_key(schema, parent)
    }

    /// Verifies cross-references: every object's schema, the owner of
    /// every table-owned object, foreign key targets and their columns,
    /// and the wrappers and servers of foreign objects.
    pub fn link(&self) -> Result<()> {
        for obj in self.objects() {
            let obj = obj.as_object();
            let key = obj.key();
            if let Some(schema_key) = key.schema_key() {
                if !self.schemas.contains_key(&schema_key) {
                    return Err(CatalogError::unknown(
                        obj.extern_key(),
                        "schema",
                        schema_key.name,
                    ));
                }
            }
            if key.kind.is_table_owned() && self.owner_key(&key).is_none() {
                return Err(CatalogError::unknown(
                    obj.extern_key(),
                    "table",
                    key.parent.unwrap_or_default(),
                ));
            }
        }
        for fk in self.foreign_keys.values() {
            self.check_columns(fk, &fk.schema, &fk.table, &fk.columns)?;
            let (schema, table) = fk.referenced_table();
            if self.relation_key(&schema, &table).is_none() {
                return Err(CatalogError::unknown(fk.extern_key(), "table", table));
            }
            self.check_columns(fk, &schema, &table, &fk.references.columns)?;
        }
        for server in self.servers.values() {
            let wrapper = ObjectKey::new(ObjectKind::ForeignDataWrapper, server.wrapper.as_str());
            if !self.wrappers.contains_key(&wrapper) {
                return Err(CatalogError::unknown(
                    server.extern_key(),
                    "foreign data wrapper",
                    server.wrapper.as_str(),
                ));
            }
        }
        let server_names: Vec<&str> = self.servers.values().map(|s| s.name.as_str()).collect();
        for mapping in self.user_mappings.values() {
            if !server_names.contains(&mapping.server.as_str()) {
                return Err(CatalogError::unknown(
                    mapping.extern_key(),
                    "server",
                    mapping.server.as_str(),
                ));
            }
        }
        for table in self.foreign_tables.values() {
            if !server_names.contains(&table.server.as_str()) {
                return Err(CatalogError::unknown(
                    table.extern_key(),
                    "server",
                    table.server.as_str(),
                ));
            }
        }
        Ok(())
    }

    fn check_columns(
        &self,
        fk: &ForeignKey,
        schema: &str,
        table: &str,
        columns: &[String],
    ) -> Result<()> {
        let key = ObjectKey::scoped(ObjectKind::Table, schema, table);
        let Some(table) = self.tables.get(&key) else {
            return Ok(());
        };
        for column in columns {
            if table.get_column(column).is_none() {
                return Err(CatalogError::unknown(
                    fk.extern_key(),
                    "column",
                    format!("{}.{column}", table.name),
                ));
            }
        }
        Ok(())
    }

    /// Restricts the tree to the `include` schemas (all when empty) minus
    /// the `exclude` ones. Objects outside any schema are kept.
    pub fn filter_schemas(&mut self, include: &[String], exclude: &[String]) {
        let wanted = |schema: &String| {
            (include.is_empty() || include.contains(schema)) && !exclude.contains(schema)
        };
        self.retain(|key| match (&key.schema, key.kind) {
            (Some(schema), _) => wanted(schema),
            (None, ObjectKind::Schema) => wanted(&key.name),
            (None, _) => true,
        });
    }

    /// Restricts the tree to the named relations (`t1` or `s1.t1`), the
    /// objects they own, the sequences owned by them, and their schemas.
    pub fn filter_tables(&mut self, names: &[String]) {
        let mut kept: BTreeSet<ObjectKey> = BTreeSet::new();
        for name in names {
            let (schema, name) = split_schema_obj(name, DEFAULT_SCHEMA);
            if let Some(key) = self.relation_key(&schema, &name) {
                kept.insert(key);
            }
        }
        let tables: Vec<(String, String)> = kept
            .iter()
            .map(|k| (k.schema.clone().unwrap_or_default(), k.name.clone()))
            .collect();
        for seq in self.sequences.values() {
            if let Some(owner) = &seq.owner_table {
                if tables.contains(&(seq.schema.clone(), owner.clone())) {
                    kept.insert(seq.key());
                }
            }
        }
        let owned: Vec<ObjectKey> = self
            .keys()
            .into_iter()
            .filter(|key| {
                self.owner_key(key)
                    .is_some_and(|owner| kept.contains(&owner))
            })
            .collect();
        kept.extend(owned);
        let schemas: Vec<ObjectKey> = kept.iter().filter_map(ObjectKey::schema_key).collect();
        kept.extend(schemas);
        self.retain(|key| kept.contains(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Database {
        let mut db = Database::new();
        db.schemas.insert(Schema::new("public"));
        db.tables.insert(
            Table::new("public", "t1")
                .column(Column::new("id", "integer").not_null())
                .column(Column::new("c2", "text")),
        );
        db.tables.insert(
            Table::new("public", "t2")
                .column(Column::new("id", "integer"))
                .column(Column::new("t1_id", "integer")),
        );
        db.primary_keys
            .insert(PrimaryKey::new("public", "t1", "t1_pkey", vec!["id".to_string()]));
        db
    }

    #[test]
    fn test_get_and_count() {
        let db = sample();
        assert_eq!(db.object_count(), 4);
        let key = ObjectKey::scoped(ObjectKind::Table, "public", "t1");
        let obj = db.get(&key).unwrap();
        assert_eq!(obj.as_object().extern_key(), "table t1");
        assert!(db
            .get(&ObjectKey::scoped(ObjectKind::Column, "public", "id"))
            .is_none());
    }

    #[test]
    fn test_link_reports_missing_fk_target() {
        let mut db = sample();
        db.foreign_keys.insert(ForeignKey::new(
            "public",
            "t2",
            "t2_t1_fk",
            vec!["t1_id".to_string()],
            "t3",
            vec!["id".to_string()],
        ));
        let err = db.link().unwrap_err();
        assert!(matches!(
            err,
            CatalogError::UnknownReference { ref kind, ref name, .. } if kind == "table" && name == "t3"
        ));
    }

    #[test]
    fn test_link_reports_missing_column() {
        let mut db = sample();
        db.foreign_keys.insert(ForeignKey::new(
            "public",
            "t2",
            "t2_t1_fk",
            vec!["t1_id".to_string()],
            "t1",
            vec!["nope".to_string()],
        ));
        let err = db.link().unwrap_err();
        assert!(matches!(err, CatalogError::UnknownReference { ref kind, .. } if kind == "column"));
    }

    #[test]
    fn test_link_reports_missing_schema() {
        let mut db = sample();
        db.tables.insert(Table::new("s9", "t9"));
        let err = db.link().unwrap_err();
        assert!(matches!(err, CatalogError::UnknownReference { ref name, .. } if name == "s9"));
    }

    #[test]
    fn test_function_ref() {
        let mut db = Database::new();
        db.functions.insert(Function::new(
            "public",
            "f1",
            "integer",
            "integer",
            "sql",
            "SELECT $1",
        ));
        db.functions.insert(Function::new(
            "public", "f1", "text", "text", "sql", "SELECT $1",
        ));
        let exact = db.function_ref("f1(text)", "public").unwrap();
        assert_eq!(exact.signature.as_deref(), Some("text"));
        let first = db.function_ref("f1", "public").unwrap();
        assert_eq!(first.signature.as_deref(), Some("integer"));
        assert!(db.function_ref("lower(x)", "public").is_none());
    }

    #[test]
    fn test_filter_tables_keeps_owned_objects() {
        let mut db = sample();
        db.schemas.insert(Schema::new("s1"));
        db.tables.insert(Table::new("s1", "t3"));
        db.filter_tables(&["t1".to_string()]);
        let keys: Vec<String> = db.keys().iter().map(ToString::to_string).collect();
        assert_eq!(
            keys,
            vec!["schema public", "table public.t1", "primary key public.t1.t1_pkey"]
        );
    }

    #[test]
    fn test_filter_schemas() {
        let mut db = sample();
        db.schemas.insert(Schema::new("s1"));
        db.tables.insert(Table::new("s1", "t3"));
        db.filter_schemas(&[], &["public".to_string()]);
        let keys: Vec<String> = db.keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["schema s1", "table s1.t3"]);
    }
}
