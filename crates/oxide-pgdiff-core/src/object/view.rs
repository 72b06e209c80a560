//! Views and materialized views.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::schema_scoped;
use super::{named_list, Alteration, DbObject, Meta, NamedEntry};
use crate::database::Database;
use crate::error::{CatalogError, Result};
use crate::ident::{quote_id, split_schema_obj};
use crate::key::{ObjectKey, ObjectKind};

/// An output column of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewColumn {
    /// Column name.
    pub name: String,
    /// Data type.
    #[serde(rename = "type")]
    pub type_name: String,
}

impl NamedEntry for ViewColumn {}

fn relation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+((?:"[^"]+"|\w+)(?:\.(?:"[^"]+"|\w+))?)"#)
            .expect("valid regex")
    })
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b((?:\w+\.)?\w+)\s*\(").expect("valid regex"))
}

/// Relations and functions referenced by a query text. The text is
/// scanned, not parsed: relations named after `FROM`/`JOIN` and function
/// calls that resolve in `db` are returned.
fn query_deps(db: &Database, definition: &str, schema: &str, own: &ObjectKey) -> Vec<ObjectKey> {
    let mut deps = Vec::new();
    for cap in relation_re().captures_iter(definition) {
        let (rel_schema, rel_name) = split_schema_obj(&cap[1], schema);
        if let Some(key) = db.relation_key(&rel_schema, &rel_name) {
            if &key != own && !deps.contains(&key) {
                deps.push(key);
            }
        }
    }
    for cap in call_re().captures_iter(definition) {
        if let Some(key) = db.function_ref(&cap[1], schema) {
            if !deps.contains(&key) {
                deps.push(key);
            }
        }
    }
    deps
}

/// Checks that `new` keeps every existing output column in place with the
/// same name and type; `CREATE OR REPLACE VIEW` can only append columns.
fn check_columns(object: &str, old: &[ViewColumn], new: &[ViewColumn]) -> Result<()> {
    if new.is_empty() {
        return Ok(());
    }
    for (ocol, ncol) in old.iter().zip(new) {
        if ocol.name != ncol.name {
            return Err(CatalogError::InvalidChange {
                object: object.to_string(),
                message: format!(
                    "cannot rename view column '{}' to '{}'",
                    ocol.name, ncol.name
                ),
            });
        }
        if ocol.type_name != ncol.type_name {
            return Err(CatalogError::InvalidChange {
                object: object.to_string(),
                message: format!(
                    "cannot change type of view column '{}' from {} to {}",
                    ocol.name, ocol.type_name, ncol.type_name
                ),
            });
        }
    }
    if new.len() < old.len() {
        return Err(CatalogError::InvalidChange {
            object: object.to_string(),
            message: "cannot drop columns from view".to_string(),
        });
    }
    Ok(())
}

/// A view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// Owning schema.
    pub schema: String,
    /// View name.
    pub name: String,
    /// Query text, compared verbatim.
    pub definition: String,
    /// Output columns, when known.
    #[serde(default, with = "named_list", skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ViewColumn>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl View {
    /// Creates a view from its query text.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            definition: definition.into(),
            columns: Vec::new(),
            meta: Meta::default(),
        }
    }

    fn create(&self, or_replace: bool) -> String {
        format!(
            "CREATE {}VIEW {} AS\n   {}",
            if or_replace { "OR REPLACE " } else { "" },
            self.qualname(),
            self.definition.trim_end_matches(';')
        )
    }
}

impl DbObject for View {
    schema_scoped!(ObjectKind::View);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![self.create(false)]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        deps.extend(query_deps(db, &self.definition, &self.schema, &self.key()));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.definition == new.definition {
            return Ok(Alteration::default());
        }
        if !self.columns.is_empty() {
            check_columns(&self.extern_key(), &self.columns, &new.columns)?;
        }
        Ok(Alteration::Statements(vec![new.create(true)]))
    }
}

/// A materialized view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedView {
    /// Owning schema.
    pub schema: String,
    /// View name.
    pub name: String,
    /// Query text, compared verbatim.
    pub definition: String,
    /// Output columns, when known.
    #[serde(default, with = "named_list", skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ViewColumn>,
    /// Whether the view is created without being populated.
    #[serde(default, skip_serializing_if = "super::is_false")]
    pub with_no_data: bool,
    /// Tablespace, when not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tablespace: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for MaterializedView {
    schema_scoped!(ObjectKind::MaterializedView);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!("CREATE MATERIALIZED VIEW {}", self.qualname());
        if let Some(tablespace) = &self.tablespace {
            sql.push_str(&format!(" TABLESPACE {}", quote_id(tablespace)));
        }
        sql.push_str(&format!(
            " AS\n   {}",
            self.definition.trim_end().trim_end_matches(';')
        ));
        if self.with_no_data {
            sql.push_str("\n    WITH NO DATA");
        }
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        deps.extend(query_deps(db, &self.definition, &self.schema, &self.key()));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.definition != new.definition || self.with_no_data != new.with_no_data {
            return Ok(Alteration::Recreate);
        }
        let mut stmts = Vec::new();
        if self.tablespace != new.tablespace {
            stmts.push(format!(
                "ALTER MATERIALIZED VIEW {} SET TABLESPACE {}",
                self.qualname(),
                quote_id(new.tablespace.as_deref().unwrap_or("pg_default"))
            ));
        }
        Ok(Alteration::Statements(stmts))
    }
}
