//! Table and domain constraints.
//!
//! Constraints are keyed by `(schema, table, name)`. Any structural change
//! is applied by dropping and adding the constraint again; only clustering
//! of primary keys and unique constraints is altered in place.

use serde::{Deserialize, Serialize};

use super::{is_false, Alteration, DbObject, Meta};
use crate::database::Database;
use crate::error::Result;
use crate::ident::{column_list, qualname, quote_id, split_schema_obj};
use crate::key::{ObjectKey, ObjectKind};

/// Key shared by all table-owned objects.
pub(crate) fn table_owned_key(kind: ObjectKind, schema: &str, table: &str, name: &str) -> ObjectKey {
    ObjectKey::scoped(kind, schema, name).with_parent(table)
}

pub(crate) fn set_table_owned_key(
    key: &ObjectKey,
    schema: &mut String,
    table: &mut String,
    name: &mut String,
) {
    if let Some(s) = &key.schema {
        schema.clone_from(s);
    }
    if let Some(t) = &key.parent {
        table.clone_from(t);
    }
    name.clone_from(&key.name);
}

/// Implied dependencies of an object living in a table: its schema and
/// the owning relation.
pub(crate) fn table_owned_deps(db: &Database, schema: &str, table: &str) -> Vec<ObjectKey> {
    let mut deps = vec![ObjectKey::new(ObjectKind::Schema, schema)];
    deps.extend(db.relation_key(schema, table));
    deps
}

fn clustering(table: &str, name: &str, old: bool, new: bool) -> Vec<String> {
    match (old, new) {
        (false, true) => vec![format!("CLUSTER {table} USING {}", quote_id(name))],
        (true, false) => vec![format!("ALTER TABLE {table} SET WITHOUT CLUSTER")],
        _ => Vec::new(),
    }
}

/// Strips whitespace and parentheses so that the catalog's rendering of a
/// check expression compares equal to a hand-written one.
fn normalize_expression(expr: &str) -> String {
    expr.chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .collect()
}

macro_rules! table_constraint_common {
    ($kind:expr) => {
        fn kind(&self) -> ObjectKind {
            $kind
        }

        fn key(&self) -> ObjectKey {
            table_owned_key($kind, &self.schema, &self.table, &self.name)
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

        fn identifier(&self) -> String {
            format!("{} ON {}", quote_id(&self.name), self.table_name())
        }

        fn drop_sql(&self) -> Vec<String> {
            vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.table_name(),
                quote_id(&self.name)
            )]
        }

        fn rename_sql(&self, new_name: &str) -> String {
            format!(
                "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
                self.table_name(),
                quote_id(&self.name),
                quote_id(new_name)
            )
        }

        fn has_owner(&self) -> bool {
            false
        }
    };
}

/// A `CHECK` constraint on a table or a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Schema of the owning table or domain.
    pub schema: String,
    /// Owning table or domain.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Boolean expression.
    pub expression: String,
    /// Columns referenced by the expression.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// Whether the constraint is inherited from a parent table.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inherited: bool,
    /// Whether the constraint belongs to a domain rather than a table.
    #[serde(default, skip_serializing)]
    pub on_domain: bool,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl CheckConstraint {
    /// Creates a table check constraint.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            expression: expression.into(),
            columns: Vec::new(),
            inherited: false,
            on_domain: false,
            meta: Meta::default(),
        }
    }

    fn table_name(&self) -> String {
        qualname(&self.schema, &self.table)
    }

    fn target(&self) -> String {
        let kind = if self.on_domain { "DOMAIN" } else { "TABLE" };
        format!("{kind} {}", self.table_name())
    }
}

impl DbObject for CheckConstraint {
    fn kind(&self) -> ObjectKind {
        ObjectKind::CheckConstraint
    }

    fn key(&self) -> ObjectKey {
        table_owned_key(ObjectKind::CheckConstraint, &self.schema, &self.table, &self.name)
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

    fn identifier(&self) -> String {
        if self.on_domain {
            format!("{} ON DOMAIN {}", quote_id(&self.name), self.table_name())
        } else {
            format!("{} ON {}", quote_id(&self.name), self.table_name())
        }
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        if self.inherited {
            return Vec::new();
        }
        vec![format!(
            "ALTER {} ADD CONSTRAINT {} CHECK ({})",
            self.target(),
            quote_id(&self.name),
            self.expression
        )]
    }

    fn drop_sql(&self) -> Vec<String> {
        if self.inherited {
            return Vec::new();
        }
        vec![format!(
            "ALTER {} DROP CONSTRAINT {}",
            self.target(),
            quote_id(&self.name)
        )]
    }

    fn rename_sql(&self, new_name: &str) -> String {
        format!(
            "ALTER {} RENAME CONSTRAINT {} TO {}",
            self.target(),
            quote_id(&self.name),
            quote_id(new_name)
        )
    }

    fn has_owner(&self) -> bool {
        false
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        if self.on_domain {
            vec![
                ObjectKey::new(ObjectKind::Schema, self.schema.as_str()),
                ObjectKey::scoped(ObjectKind::Domain, self.schema.as_str(), self.table.as_str()),
            ]
        } else {
            table_owned_deps(db, &self.schema, &self.table)
        }
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.inherited || new.inherited {
            return Ok(Alteration::default());
        }
        if normalize_expression(&self.expression) != normalize_expression(&new.expression) {
            return Ok(Alteration::Recreate);
        }
        Ok(Alteration::default())
    }
}

/// A `PRIMARY KEY` constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Schema of the owning table.
    pub schema: String,
    /// Owning table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Key columns.
    pub columns: Vec<String>,
    /// Whether the table is clustered on this key.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cluster: bool,
    /// Whether the constraint is inherited.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inherited: bool,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl PrimaryKey {
    /// Creates a primary key on `columns`.
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
            columns,
            cluster: false,
            inherited: false,
            meta: Meta::default(),
        }
    }

    fn table_name(&self) -> String {
        qualname(&self.schema, &self.table)
    }
}

impl DbObject for PrimaryKey {
    table_constraint_common!(ObjectKind::PrimaryKey);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let table = self.table_name();
        let mut stmts = vec![format!(
            "ALTER TABLE {table} ADD CONSTRAINT {} PRIMARY KEY ({})",
            quote_id(&self.name),
            column_list(&self.columns)
        )];
        stmts.extend(clustering(&table, &self.name, false, self.cluster));
        stmts
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        table_owned_deps(db, &self.schema, &self.table)
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.columns != new.columns {
            return Ok(Alteration::Recreate);
        }
        Ok(Alteration::Statements(clustering(
            &self.table_name(),
            &self.name,
            self.cluster,
            new.cluster,
        )))
    }
}

/// A `UNIQUE` constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Schema of the owning table.
    pub schema: String,
    /// Owning table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Constrained columns.
    pub columns: Vec<String>,
    /// Whether the table is clustered on this constraint.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cluster: bool,
    /// Whether the constraint is inherited.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inherited: bool,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl UniqueConstraint {
    /// Creates a unique constraint on `columns`.
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
            columns,
            cluster: false,
            inherited: false,
            meta: Meta::default(),
        }
    }

    fn table_name(&self) -> String {
        qualname(&self.schema, &self.table)
    }
}

impl DbObject for UniqueConstraint {
    table_constraint_common!(ObjectKind::UniqueConstraint);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let table = self.table_name();
        let mut stmts = vec![format!(
            "ALTER TABLE {table} ADD CONSTRAINT {} UNIQUE ({})",
            quote_id(&self.name),
            column_list(&self.columns)
        )];
        stmts.extend(clustering(&table, &self.name, false, self.cluster));
        stmts
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        table_owned_deps(db, &self.schema, &self.table)
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.columns != new.columns {
            return Ok(Alteration::Recreate);
        }
        Ok(Alteration::Statements(clustering(
            &self.table_name(),
            &self.name,
            self.cluster,
            new.cluster,
        )))
    }
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct References {
    /// Schema of the referenced table; defaults to the referencing
    /// table's schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Referenced table.
    pub table: String,
    /// Referenced columns.
    pub columns: Vec<String>,
}

/// A `FOREIGN KEY` constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Schema of the owning table.
    pub schema: String,
    /// Owning table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table and columns.
    pub references: References,
    /// `ON UPDATE` action (`cascade`, `restrict`, `set null`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    /// `ON DELETE` action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    /// Match type (`full`, `partial`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    /// Whether the constraint is `DEFERRABLE`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deferrable: bool,
    /// Whether the constraint is `INITIALLY DEFERRED`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deferred: bool,
    /// Whether the constraint is inherited.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inherited: bool,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl ForeignKey {
    /// Creates a foreign key referencing `ref_table(ref_columns)` in the
    /// same schema.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<String>,
        ref_table: impl Into<String>,
        ref_columns: Vec<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            columns,
            references: References {
                schema: None,
                table: ref_table.into(),
                columns: ref_columns,
            },
            on_update: None,
            on_delete: None,
            match_type: None,
            deferrable: false,
            deferred: false,
            inherited: false,
            meta: Meta::default(),
        }
    }

    fn table_name(&self) -> String {
        qualname(&self.schema, &self.table)
    }

    /// Schema and name of the referenced table.
    #[must_use]
    pub fn referenced_table(&self) -> (String, String) {
        let schema = self
            .references
            .schema
            .clone()
            .unwrap_or_else(|| self.schema.clone());
        let (schema, table) = split_schema_obj(&self.references.table, &schema);
        (schema, table)
    }

    /// The unique structure backing the referenced columns: the primary
    /// key when its columns match exactly, otherwise a unique constraint
    /// with identical columns, otherwise a unique non-partial index on
    /// exactly those columns.
    #[must_use]
    pub fn unique_match(&self, db: &Database) -> Option<ObjectKey> {
        let (schema, table) = self.referenced_table();
        let cols = &self.references.columns;
        let same_table =
            |s: &str, t: &str| s == schema.as_str() && t == table.as_str();

        db.primary_keys
            .values()
            .find(|pk| same_table(&pk.schema, &pk.table) && &pk.columns == cols)
            .map(DbObject::key)
            .or_else(|| {
                db.unique_constraints
                    .values()
                    .find(|uc| same_table(&uc.schema, &uc.table) && &uc.columns == cols)
                    .map(DbObject::key)
            })
            .or_else(|| {
                db.indexes
                    .values()
                    .find(|idx| {
                        same_table(&idx.schema, &idx.table)
                            && idx.unique
                            && idx.predicate.is_none()
                            && idx.column_names().as_ref() == Some(cols)
                    })
                    .map(DbObject::key)
            })
    }
}

impl DbObject for ForeignKey {
    table_constraint_common!(ObjectKind::ForeignKey);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let (ref_schema, ref_table) = self.referenced_table();
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.table_name(),
            quote_id(&self.name),
            column_list(&self.columns),
            qualname(&ref_schema, &ref_table),
            column_list(&self.references.columns)
        );
        if let Some(match_type) = &self.match_type {
            sql.push_str(&format!(" MATCH {}", match_type.to_uppercase()));
        }
        if let Some(action) = &self.on_update {
            sql.push_str(&format!(" ON UPDATE {}", action.to_uppercase()));
        }
        if let Some(action) = &self.on_delete {
            sql.push_str(&format!(" ON DELETE {}", action.to_uppercase()));
        }
        if self.deferrable {
            sql.push_str(" DEFERRABLE");
            if self.deferred {
                sql.push_str(" INITIALLY DEFERRED");
            }
        }
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = table_owned_deps(db, &self.schema, &self.table);
        let (schema, table) = self.referenced_table();
        deps.extend(db.relation_key(&schema, &table));
        deps.extend(self.unique_match(db));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        let changed = self.columns != new.columns
            || self.referenced_table() != new.referenced_table()
            || self.references.columns != new.references.columns
            || self.on_update != new.on_update
            || self.on_delete != new.on_delete
            || self.match_type != new.match_type
            || self.deferrable != new.deferrable
            || self.deferred != new.deferred;
        Ok(if changed {
            Alteration::Recreate
        } else {
            Alteration::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Column, Index, Table};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_check_constraint_sql() {
        let chk = CheckConstraint::new("public", "t1", "t1_c1_check", "c1 > 0");
        let db = Database::default();
        assert_eq!(
            chk.create_sql(&db),
            vec!["ALTER TABLE t1 ADD CONSTRAINT t1_c1_check CHECK (c1 > 0)"]
        );
        assert_eq!(
            chk.drop_sql(),
            vec!["ALTER TABLE t1 DROP CONSTRAINT t1_c1_check"]
        );
        assert_eq!(
            chk.comment_sql(),
            "COMMENT ON CONSTRAINT t1_c1_check ON t1 IS NULL"
        );
    }

    #[test]
    fn test_check_expression_ignores_parens_and_spaces() {
        let db = Database::default();
        let old = CheckConstraint::new("public", "t1", "chk", "((c1 > 0))");
        let new = CheckConstraint::new("public", "t1", "chk", "c1>0");
        assert_eq!(old.alter_sql(&new, &db).unwrap(), Alteration::default());

        let changed = CheckConstraint::new("public", "t1", "chk", "c1 > 1");
        assert_eq!(old.alter_sql(&changed, &db).unwrap(), Alteration::Recreate);
    }

    #[test]
    fn test_domain_check() {
        let mut chk = CheckConstraint::new("public", "d1", "d1_check", "VALUE > 0");
        chk.on_domain = true;
        assert_eq!(
            chk.create_sql(&Database::default()),
            vec!["ALTER DOMAIN d1 ADD CONSTRAINT d1_check CHECK (VALUE > 0)"]
        );
    }

    #[test]
    fn test_primary_key_cluster() {
        let db = Database::default();
        let old = PrimaryKey::new("public", "t1", "t1_pkey", cols(&["c1"]));
        let mut new = old.clone();
        new.cluster = true;
        assert_eq!(
            old.alter_sql(&new, &db).unwrap(),
            Alteration::Statements(vec!["CLUSTER t1 USING t1_pkey".to_string()])
        );
        assert_eq!(
            new.alter_sql(&old, &db).unwrap(),
            Alteration::Statements(vec!["ALTER TABLE t1 SET WITHOUT CLUSTER".to_string()])
        );
    }

    #[test]
    fn test_foreign_key_sql() {
        let mut fk = ForeignKey::new(
            "public",
            "t2",
            "t2_c1_fkey",
            cols(&["c1"]),
            "t1",
            cols(&["id"]),
        );
        fk.on_delete = Some("cascade".to_string());
        assert_eq!(
            fk.create_sql(&Database::default()),
            vec![
                "ALTER TABLE t2 ADD CONSTRAINT t2_c1_fkey FOREIGN KEY (c1) REFERENCES t1 (id) ON DELETE CASCADE"
            ]
        );
    }

    #[test]
    fn test_foreign_key_prefers_primary_key() {
        let mut db = Database::default();
        db.tables.insert(
            Table::new("public", "t1")
                .column(Column::new("id", "integer"))
                .column(Column::new("code", "text")),
        );
        let pk = PrimaryKey::new("public", "t1", "t1_pkey", cols(&["id"]));
        db.primary_keys.insert(pk.clone());
        let mut idx = Index::new("public", "t1", "t1_id_idx", cols(&["id"]));
        idx.unique = true;
        db.indexes.insert(idx.clone());

        let fk = ForeignKey::new("public", "t2", "fk", cols(&["c1"]), "t1", cols(&["id"]));
        assert_eq!(fk.unique_match(&db), Some(pk.key()));

        let fk = ForeignKey::new("public", "t2", "fk", cols(&["c1"]), "t1", cols(&["code"]));
        assert_eq!(fk.unique_match(&db), None);

        db.primary_keys = Default::default();
        let fk = ForeignKey::new("public", "t2", "fk", cols(&["c1"]), "t1", cols(&["id"]));
        assert_eq!(fk.unique_match(&db), Some(idx.key()));
    }
}
