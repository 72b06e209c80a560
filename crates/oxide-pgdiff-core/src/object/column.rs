//! Table columns.
//!
//! Columns are owned by their table (or foreign table) and stored inline
//! in declaration order; they are not dependency-graph nodes of their own.

use serde::{Deserialize, Serialize};

use super::{is_false, NamedEntry};
use crate::ident::{quote_id, quote_literal};

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Formatted data type (`character varying(20)`).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the column is `NOT NULL`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub not_null: bool,
    /// Default expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Explicit collation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Statistics target; absent means the system default (`-1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<i32>,
    /// Whether the column comes from an inherited parent.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inherited: bool,
    /// Comment text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rename sentinel.
    #[serde(default, skip_serializing)]
    pub oldname: Option<String>,
    /// Catalog attribute number; only used for ordering catalog rows.
    #[serde(default, skip_serializing)]
    pub number: Option<i32>,
}

impl Column {
    /// Creates a nullable column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            not_null: false,
            default: None,
            collation: None,
            statistics: None,
            inherited: false,
            description: None,
            oldname: None,
            number: None,
        }
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Column definition as used in `CREATE TABLE` and `ADD COLUMN`.
    #[must_use]
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", quote_id(&self.name), self.type_name);
        if let Some(collation) = &self.collation {
            sql.push_str(&format!(" COLLATE {collation}"));
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {default}"));
        }
        sql
    }

    /// Statements adding this column to `table` (an `ALTER TABLE` or
    /// `ALTER FOREIGN TABLE` target such as `TABLE s1.t1`).
    #[must_use]
    pub fn add_sql(&self, target: &str) -> Vec<String> {
        let mut stmts = vec![format!("ALTER {target} ADD COLUMN {}", self.definition())];
        if let Some(stats) = self.statistics {
            stmts.push(format!(
                "ALTER {target} ALTER COLUMN {} SET STATISTICS {stats}",
                quote_id(&self.name)
            ));
        }
        stmts
    }

    /// Statement dropping this column.
    #[must_use]
    pub fn drop_sql(&self, target: &str) -> String {
        format!("ALTER {target} DROP COLUMN {}", quote_id(&self.name))
    }

    /// Statement renaming this column.
    #[must_use]
    pub fn rename_sql(&self, target: &str, new_name: &str) -> String {
        format!(
            "ALTER {target} RENAME COLUMN {} TO {}",
            quote_id(&self.name),
            quote_id(new_name)
        )
    }

    /// `COMMENT ON COLUMN` for the column of the table named `table`.
    #[must_use]
    pub fn comment_sql(&self, table: &str) -> String {
        format!(
            "COMMENT ON COLUMN {table}.{} IS {}",
            quote_id(&self.name),
            self.description
                .as_deref()
                .map_or_else(|| "NULL".to_string(), quote_literal)
        )
    }

    /// `ALTER COLUMN` clauses turning this column into `new`. Each
    /// property is compared independently; the caller joins the clauses
    /// into a single `ALTER TABLE` statement.
    #[must_use]
    pub fn alter_clauses(&self, new: &Self) -> Vec<String> {
        let base = format!("ALTER COLUMN {}", quote_id(&new.name));
        let mut clauses = Vec::new();

        if !self.not_null && new.not_null {
            clauses.push(format!("{base} SET NOT NULL"));
        } else if self.not_null && !new.not_null {
            clauses.push(format!("{base} DROP NOT NULL"));
        }

        let retyped = self.type_name != new.type_name || self.collation != new.collation;
        let default_changed = self.default != new.default;
        if retyped {
            if default_changed && self.default.is_some() {
                clauses.push(format!("{base} DROP DEFAULT"));
            }
            let mut clause = format!("{base} TYPE {}", new.type_name);
            if let Some(collation) = &new.collation {
                clause.push_str(&format!(" COLLATE {collation}"));
            }
            if self.type_name != new.type_name {
                clause.push_str(&format!(
                    " USING {}::{}",
                    quote_id(&new.name),
                    new.type_name
                ));
            }
            clauses.push(clause);
        }
        if default_changed {
            match &new.default {
                Some(default) => clauses.push(format!("{base} SET DEFAULT {default}")),
                None if !retyped => clauses.push(format!("{base} DROP DEFAULT")),
                None => {}
            }
        }

        if self.statistics != new.statistics {
            clauses.push(format!(
                "{base} SET STATISTICS {}",
                new.statistics.unwrap_or(-1)
            ));
        }
        clauses
    }
}

impl NamedEntry for Column {
    fn set_position(&mut self, position: i32) {
        self.number = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition() {
        let col = Column::new("c1", "integer").not_null().default_expr("0");
        assert_eq!(col.definition(), "c1 integer NOT NULL DEFAULT 0");
    }

    #[test]
    fn test_alter_type_and_default() {
        let old = Column::new("month", "integer").not_null().default_expr("0");
        let new = Column::new("month", "varchar").not_null().default_expr("''");
        assert_eq!(
            old.alter_clauses(&new),
            vec![
                "ALTER COLUMN month DROP DEFAULT",
                "ALTER COLUMN month TYPE varchar USING month::varchar",
                "ALTER COLUMN month SET DEFAULT ''",
            ]
        );
    }

    #[test]
    fn test_alter_not_null_independent_of_type() {
        let old = Column::new("c1", "integer");
        let new = Column::new("c1", "integer").not_null();
        assert_eq!(old.alter_clauses(&new), vec!["ALTER COLUMN c1 SET NOT NULL"]);
        assert_eq!(new.alter_clauses(&old), vec!["ALTER COLUMN c1 DROP NOT NULL"]);
    }

    #[test]
    fn test_alter_statistics() {
        let old = Column::new("c1", "integer");
        let mut new = old.clone();
        new.statistics = Some(100);
        assert_eq!(
            old.alter_clauses(&new),
            vec!["ALTER COLUMN c1 SET STATISTICS 100"]
        );
        assert_eq!(
            new.alter_clauses(&old),
            vec!["ALTER COLUMN c1 SET STATISTICS -1"]
        );
    }

    #[test]
    fn test_alter_drop_default() {
        let old = Column::new("c1", "text").default_expr("'x'");
        let new = Column::new("c1", "text");
        assert_eq!(old.alter_clauses(&new), vec!["ALTER COLUMN c1 DROP DEFAULT"]);
    }
}
