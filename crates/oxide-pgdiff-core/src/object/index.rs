//! Indexes.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

use super::constraint::{set_table_owned_key, table_owned_deps, table_owned_key};
use super::{is_false, Alteration, DbObject, Meta};
use crate::database::Database;
use crate::error::Result;
use crate::ident::{qualname, quote_id};
use crate::key::{ObjectKey, ObjectKind};

/// One key of an index: a column or an expression, with optional
/// collation, operator class and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexKey {
    /// Column name or expression text.
    pub name: String,
    /// Whether `name` is an expression rather than a column.
    pub expression: bool,
    /// Collation.
    pub collation: Option<String>,
    /// Operator class.
    pub opclass: Option<String>,
    /// `desc` when sorted descending.
    pub order: Option<String>,
    /// `first` or `last`.
    pub nulls: Option<String>,
}

#[derive(Default, Serialize, Deserialize)]
struct KeyAttrs {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    key_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    opclass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nulls: Option<String>,
}

impl IndexKey {
    /// A plain column key.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn is_plain(&self) -> bool {
        !self.expression
            && self.collation.is_none()
            && self.opclass.is_none()
            && self.order.is_none()
            && self.nulls.is_none()
    }

    fn sql(&self) -> String {
        let mut sql = if self.expression {
            self.name.clone()
        } else {
            quote_id(&self.name)
        };
        if let Some(collation) = &self.collation {
            sql.push_str(&format!(" COLLATE {collation}"));
        }
        if let Some(opclass) = &self.opclass {
            sql.push_str(&format!(" {opclass}"));
        }
        if let Some(order) = &self.order {
            sql.push_str(&format!(" {}", order.to_uppercase()));
        }
        if let Some(nulls) = &self.nulls {
            sql.push_str(&format!(" NULLS {}", nulls.to_uppercase()));
        }
        sql
    }
}

impl Serialize for IndexKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.is_plain() {
            return serializer.serialize_str(&self.name);
        }
        let attrs = KeyAttrs {
            key_type: self.expression.then(|| "expression".to_string()),
            collation: self.collation.clone(),
            opclass: self.opclass.clone(),
            order: self.order.clone(),
            nulls: self.nulls.clone(),
        };
        let mut map = Mapping::new();
        map.insert(
            Value::from(self.name.clone()),
            serde_yaml::to_value(attrs).map_err(serde::ser::Error::custom)?,
        );
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IndexKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(name) => Ok(Self::column(name)),
            Value::Mapping(map) => {
                let mut entries = map.into_iter();
                let (Some((name, attrs)), None) = (entries.next(), entries.next()) else {
                    return Err(D::Error::custom("index key maps must have a single entry"));
                };
                let name = name
                    .as_str()
                    .ok_or_else(|| D::Error::custom("index key must be a string"))?
                    .to_string();
                let attrs: KeyAttrs = if attrs.is_null() {
                    KeyAttrs::default()
                } else {
                    serde_yaml::from_value(attrs).map_err(D::Error::custom)?
                };
                Ok(Self {
                    name,
                    expression: attrs.key_type.as_deref() == Some("expression"),
                    collation: attrs.collation,
                    opclass: attrs.opclass,
                    order: attrs.order,
                    nulls: attrs.nulls,
                })
            }
            _ => Err(D::Error::custom("index key must be a string or a map")),
        }
    }
}

fn default_method() -> String {
    "btree".to_string()
}

fn is_btree(method: &str) -> bool {
    method == "btree"
}

/// An index on a table or materialized view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Schema of the indexed relation.
    pub schema: String,
    /// Indexed relation.
    pub table: String,
    /// Index name.
    pub name: String,
    /// Index keys.
    pub keys: Vec<IndexKey>,
    /// Access method.
    #[serde(default = "default_method", skip_serializing_if = "is_btree")]
    pub access_method: String,
    /// Whether the index is `UNIQUE`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    /// Partial index predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    /// Tablespace, when not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tablespace: Option<String>,
    /// Whether the table is clustered on this index.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cluster: bool,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl Index {
    /// Creates a btree index on plain columns.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            keys: columns.into_iter().map(IndexKey::column).collect(),
            access_method: default_method(),
            unique: false,
            predicate: None,
            tablespace: None,
            cluster: false,
            meta: Meta::default(),
        }
    }

    /// Column names of the index, or `None` when any key is an
    /// expression.
    #[must_use]
    pub fn column_names(&self) -> Option<Vec<String>> {
        self.keys
            .iter()
            .map(|k| (!k.expression).then(|| k.name.clone()))
            .collect()
    }

    fn table_name(&self) -> String {
        qualname(&self.schema, &self.table)
    }

    fn clustering(&self, old: bool, new: bool) -> Vec<String> {
        match (old, new) {
            (false, true) => vec![format!(
                "CLUSTER {} USING {}",
                self.table_name(),
                quote_id(&self.name)
            )],
            (true, false) => vec![format!(
                "ALTER TABLE {} SET WITHOUT CLUSTER",
                self.table_name()
            )],
            _ => Vec::new(),
        }
    }
}

impl DbObject for Index {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Index
    }

    fn key(&self) -> ObjectKey {
        table_owned_key(ObjectKind::Index, &self.schema, &self.table, &self.name)
    }

    fn set_key(&mut self, key: &ObjectKey) {
        set_table_owned_key(key, &mut self.schema, &mut self.table, &mut self.name);
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn has_owner(&self) -> bool {
        false
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let keys: Vec<String> = self.keys.iter().map(IndexKey::sql).collect();
        let mut sql = format!(
            "CREATE {}INDEX {} ON {}",
            if self.unique { "UNIQUE " } else { "" },
            quote_id(&self.name),
            self.table_name()
        );
        if !is_btree(&self.access_method) {
            sql.push_str(&format!(" USING {}", self.access_method));
        }
        sql.push_str(&format!(" ({})", keys.join(", ")));
        if let Some(tablespace) = &self.tablespace {
            sql.push_str(&format!(" TABLESPACE {}", quote_id(tablespace)));
        }
        if let Some(predicate) = &self.predicate {
            sql.push_str(&format!(" WHERE {predicate}"));
        }
        let mut stmts = vec![sql];
        stmts.extend(self.clustering(false, self.cluster));
        stmts
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        table_owned_deps(db, &self.schema, &self.table)
    }

    // Changes to the key list itself are not detected.
    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.access_method != new.access_method || self.unique != new.unique {
            return Ok(Alteration::Recreate);
        }
        let mut stmts = Vec::new();
        if self.tablespace != new.tablespace {
            stmts.push(format!(
                "ALTER INDEX {} SET TABLESPACE {}",
                self.qualname(),
                quote_id(new.tablespace.as_deref().unwrap_or("pg_default"))
            ));
        }
        stmts.extend(self.clustering(self.cluster, new.cluster));
        Ok(Alteration::Statements(stmts))
    }
}
