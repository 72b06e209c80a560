//! Sequences.

use serde::{Deserialize, Serialize};

use super::{is_false, Alteration, DbObject, Meta};
use crate::database::Database;
use crate::error::Result;
use crate::ident::{qualname, quote_id};
use crate::key::{ObjectKey, ObjectKind};

/// A sequence generator.
///
/// `max_value`/`min_value` are absent when they equal the type's implicit
/// bound (`NO MAXVALUE`/`NO MINVALUE`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Owning schema.
    pub schema: String,
    /// Sequence name.
    pub name: String,
    /// Integer type, when not `bigint`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// `START WITH` value.
    #[serde(default = "one")]
    pub start_value: i64,
    /// `INCREMENT BY` value.
    #[serde(default = "one")]
    pub increment_by: i64,
    /// Upper bound, `None` for the implicit one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    /// Lower bound, `None` for the implicit one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    /// `CACHE` value.
    #[serde(default = "one")]
    pub cache_value: i64,
    /// Whether the sequence wraps around.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cycle: bool,
    /// Table owning the sequence (`OWNED BY`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_table: Option<String>,
    /// Column owning the sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_column: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

const fn one() -> i64 {
    1
}

impl Sequence {
    /// Creates a sequence with default parameters.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            data_type: None,
            start_value: 1,
            increment_by: 1,
            max_value: None,
            min_value: None,
            cache_value: 1,
            cycle: false,
            owner_table: None,
            owner_column: None,
            meta: Meta::default(),
        }
    }

    /// Replaces the catalog's explicit bounds by `None` when they equal
    /// the implicit ones.
    pub fn normalize(&mut self) {
        if self.data_type.as_deref() == Some("bigint") {
            self.data_type = None;
        }
        let type_max = match self.data_type.as_deref() {
            Some("smallint") => i64::from(i16::MAX),
            Some("integer") => i64::from(i32::MAX),
            _ => i64::MAX,
        };
        let (implicit_max, implicit_min) = if self.increment_by > 0 {
            (type_max, 1)
        } else {
            (-1, -type_max - 1)
        };
        if self.max_value == Some(implicit_max) {
            self.max_value = None;
        }
        if self.min_value == Some(implicit_min) {
            self.min_value = None;
        }
    }

    /// `ALTER SEQUENCE ... OWNED BY` linking the sequence to its column.
    #[must_use]
    pub fn owned_by_sql(&self) -> Vec<String> {
        match (&self.owner_table, &self.owner_column) {
            (Some(table), Some(column)) => vec![format!(
                "ALTER SEQUENCE {} OWNED BY {}.{}",
                self.qualname(),
                qualname(&self.schema, table),
                quote_id(column)
            )],
            _ => Vec::new(),
        }
    }

    fn min_clause(&self) -> String {
        self.min_value
            .map_or_else(|| "NO MINVALUE".to_string(), |v| format!("MINVALUE {v}"))
    }

    fn max_clause(&self) -> String {
        self.max_value
            .map_or_else(|| "NO MAXVALUE".to_string(), |v| format!("MAXVALUE {v}"))
    }
}

impl DbObject for Sequence {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Sequence
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::scoped(ObjectKind::Sequence, self.schema.clone(), self.name.clone())
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

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!("CREATE SEQUENCE {}", self.qualname());
        if let Some(data_type) = &self.data_type {
            sql.push_str(&format!("\n    AS {data_type}"));
        }
        sql.push_str(&format!(
            "\n    START WITH {}\n    INCREMENT BY {}\n    {}\n    {}\n    CACHE {}",
            self.start_value,
            self.increment_by,
            self.min_clause(),
            self.max_clause(),
            self.cache_value
        ));
        if self.cycle {
            sql.push_str("\n    CYCLE");
        }
        vec![sql]
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        let mut clauses = Vec::new();
        if self.data_type != new.data_type {
            clauses.push(format!(
                "AS {}",
                new.data_type.as_deref().unwrap_or("bigint")
            ));
        }
        if self.start_value != new.start_value {
            clauses.push(format!("START WITH {}", new.start_value));
        }
        if self.increment_by != new.increment_by {
            clauses.push(format!("INCREMENT BY {}", new.increment_by));
        }
        if self.min_value != new.min_value {
            clauses.push(new.min_clause());
        }
        if self.max_value != new.max_value {
            clauses.push(new.max_clause());
        }
        if self.cache_value != new.cache_value {
            clauses.push(format!("CACHE {}", new.cache_value));
        }
        if self.cycle != new.cycle {
            clauses.push(if new.cycle { "CYCLE" } else { "NO CYCLE" }.to_string());
        }

        let mut stmts = Vec::new();
        if !clauses.is_empty() {
            stmts.push(format!(
                "ALTER SEQUENCE {} {}",
                self.qualname(),
                clauses.join(" ")
            ));
        }
        if (&self.owner_table, &self.owner_column) != (&new.owner_table, &new.owner_column) {
            if new.owner_table.is_some() {
                stmts.extend(new.owned_by_sql());
            } else {
                stmts.push(format!("ALTER SEQUENCE {} OWNED BY NONE", self.qualname()));
            }
        }
        Ok(Alteration::Statements(stmts))
    }
}
