//! Tables.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{is_false, named_list, type_dep, Alteration, Column, DbObject, Meta};
use crate::database::Database;
use crate::error::{CatalogError, Result};
use crate::ident::{qualname, quote_id, split_schema_obj};
use crate::key::{ObjectKey, ObjectKind};

/// A regular table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Owning schema.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    #[serde(default, with = "named_list")]
    pub columns: Vec<Column>,
    /// Parent tables, possibly schema-qualified.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,
    /// Whether the table is `UNLOGGED`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unlogged: bool,
    /// Storage parameters (`fillfactor=70`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Tablespace, when not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tablespace: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

fn nextval_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"nextval\('([^']+)'").expect("valid regex"))
}

impl Table {
    /// Creates an empty table in `schema`.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            inherits: Vec::new(),
            unlogged: false,
            options: Vec::new(),
            tablespace: None,
            meta: Meta::default(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn target(&self) -> String {
        format!("TABLE {}", self.qualname())
    }

    /// `DROP COLUMN` statements for columns of this (current) table that
    /// no longer exist in `new`, skipping inherited and renamed columns.
    #[must_use]
    pub fn drop_columns_sql(&self, new: &Self) -> Vec<String> {
        let target = self.target();
        self.columns
            .iter()
            .filter(|c| !c.inherited)
            .filter(|c| new.get_column(&c.name).is_none())
            .filter(|c| {
                !new.columns
                    .iter()
                    .any(|n| n.oldname.as_deref() == Some(c.name.as_str()))
            })
            .map(|c| c.drop_sql(&target))
            .collect()
    }

    /// Schema-qualified keys of the parent tables.
    #[must_use]
    pub fn parent_keys(&self, db: &Database) -> Vec<ObjectKey> {
        self.inherits
            .iter()
            .filter_map(|p| {
                let (schema, name) = split_schema_obj(p, &self.schema);
                db.relation_key(&schema, &name)
            })
            .collect()
    }
}

/// Column-by-column comparison shared by tables and foreign tables.
/// `target` is the `ALTER` object (`TABLE t1`), `table` the plain
/// qualified name used by `COMMENT ON COLUMN`.
pub(crate) fn alter_columns(
    object: &str,
    target: &str,
    table: &str,
    old: &[Column],
    new: &[Column],
) -> Result<Vec<String>> {
    let mut stmts = Vec::new();
    for (num, ncol) in new.iter().enumerate() {
        if ncol.inherited {
            continue;
        }
        let positional = old.get(num);
        let matched = if let Some(oldname) = &ncol.oldname {
            let source = positional
                .filter(|c| &c.name == oldname)
                .or_else(|| old.iter().find(|c| &c.name == oldname));
            match source {
                Some(ocol) => {
                    stmts.push(ocol.rename_sql(target, &ncol.name));
                    Some(ocol)
                }
                None => match old.iter().find(|c| c.name == ncol.name) {
                    Some(ocol) => Some(ocol),
                    None => {
                        return Err(CatalogError::RenameSourceNotFound {
                            object: format!("{object} column {}", ncol.name),
                            oldname: oldname.clone(),
                        })
                    }
                },
            }
        } else {
            positional
                .filter(|c| c.name == ncol.name)
                .or_else(|| old.iter().find(|c| c.name == ncol.name))
        };

        match matched {
            Some(ocol) => {
                let clauses = ocol.alter_clauses(ncol);
                if !clauses.is_empty() {
                    stmts.push(format!("ALTER {target} {}", clauses.join(", ")));
                }
                if ocol.description != ncol.description {
                    stmts.push(ncol.comment_sql(table));
                }
            }
            None => {
                stmts.extend(ncol.add_sql(target));
                if ncol.description.is_some() {
                    stmts.push(ncol.comment_sql(table));
                }
            }
        }
    }
    Ok(stmts)
}

fn split_option(opt: &str) -> (&str, &str) {
    opt.split_once('=').unwrap_or((opt, ""))
}

impl DbObject for Table {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Table
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::scoped(ObjectKind::Table, self.schema.clone(), self.name.clone())
    }

    fn set_key(&mut self, key: &ObjectKey) {
        if let Some(schema) = &key.schema {
            self.schema.clone_from(schema);
        }
        self.name.clone_from(&key.name);
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn create_sql(&self, db: &Database) -> Vec<String> {
        let ident = self.qualname();
        let cols: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !c.inherited)
            .map(|c| format!("    {}", c.definition()))
            .collect();
        let mut sql = format!(
            "CREATE {}TABLE {} (\n{})",
            if self.unlogged { "UNLOGGED " } else { "" },
            ident,
            cols.join(",\n")
        );
        if !self.inherits.is_empty() {
            let parents: Vec<String> = self
                .inherits
                .iter()
                .map(|p| {
                    let (schema, name) = split_schema_obj(p, &self.schema);
                    qualname(&schema, &name)
                })
                .collect();
            sql.push_str(&format!("\n    INHERITS ({})", parents.join(", ")));
        }
        if !self.options.is_empty() {
            sql.push_str(&format!("\n    WITH ({})", self.options.join(", ")));
        }
        if let Some(tablespace) = &self.tablespace {
            sql.push_str(&format!("\n    TABLESPACE {}", quote_id(tablespace)));
        }

        let mut stmts = vec![sql];
        for col in self.columns.iter().filter(|c| !c.inherited) {
            if let Some(stats) = col.statistics {
                stmts.push(format!(
                    "ALTER TABLE {ident} ALTER COLUMN {} SET STATISTICS {stats}",
                    quote_id(&col.name)
                ));
            }
            if col.description.is_some() {
                stmts.push(col.comment_sql(&ident));
            }
        }
        for seq in db.sequences.values() {
            if seq.schema == self.schema && seq.owner_table.as_deref() == Some(self.name.as_str()) {
                stmts.extend(seq.owned_by_sql());
            }
        }
        stmts
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps: Vec<ObjectKey> = self.key().schema_key().into_iter().collect();
        deps.extend(self.parent_keys(db));
        for col in &self.columns {
            deps.extend(type_dep(db, &col.type_name, &self.schema));
            if let Some(default) = &col.default {
                for cap in nextval_re().captures_iter(default) {
                    let (schema, name) = split_schema_obj(&cap[1], &self.schema);
                    let key = ObjectKey::scoped(ObjectKind::Sequence, schema, name);
                    if db.sequences.contains_key(&key) {
                        deps.push(key);
                    }
                }
            }
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        let target = self.target();
        let qualname = self.qualname();
        let mut stmts = alter_columns(
            &self.extern_key(),
            &target,
            &qualname,
            &self.columns,
            &new.columns,
        )?;

        for parent in &new.inherits {
            if !self.inherits.contains(parent) {
                stmts.push(format!("ALTER {target} INHERIT {parent}"));
            }
        }
        for parent in &self.inherits {
            if !new.inherits.contains(parent) {
                stmts.push(format!("ALTER {target} NO INHERIT {parent}"));
            }
        }

        if self.unlogged != new.unlogged {
            stmts.push(format!(
                "ALTER {target} SET {}",
                if new.unlogged { "UNLOGGED" } else { "LOGGED" }
            ));
        }

        let set: Vec<&String> = new
            .options
            .iter()
            .filter(|o| !self.options.contains(o))
            .collect();
        if !set.is_empty() {
            let set: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
            stmts.push(format!("ALTER {target} SET ({})", set.join(", ")));
        }
        let reset: Vec<&str> = self
            .options
            .iter()
            .map(|o| split_option(o).0)
            .filter(|k| !new.options.iter().any(|o| split_option(o).0 == *k))
            .collect();
        if !reset.is_empty() {
            stmts.push(format!("ALTER {target} RESET ({})", reset.join(", ")));
        }

        if self.tablespace != new.tablespace {
            stmts.push(format!(
                "ALTER {target} SET TABLESPACE {}",
                quote_id(new.tablespace.as_deref().unwrap_or("pg_default"))
            ));
        }
        Ok(Alteration::Statements(stmts))
    }
}
