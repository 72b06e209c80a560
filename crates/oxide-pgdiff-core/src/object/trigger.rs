//! Triggers, rewrite rules and event triggers.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::constraint::{set_table_owned_key, table_owned_deps, table_owned_key};
use super::{is_false, recreate_if_changed, Alteration, DbObject, Meta};
use crate::database::Database;
use crate::error::{CatalogError, Result};
use crate::ident::{column_list, qualname, quote_id, quote_literal, DEFAULT_SCHEMA};
use crate::key::{ObjectKey, ObjectKind};

fn default_level() -> String {
    "statement".to_string()
}

/// A table trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Schema of the owning table.
    pub schema: String,
    /// Owning table or view.
    pub table: String,
    /// Trigger name.
    pub name: String,
    /// `before`, `after` or `instead of`.
    pub timing: String,
    /// Firing events (`insert`, `update`, `delete`, `truncate`).
    pub events: Vec<String>,
    /// Columns for `UPDATE OF`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// `row` or `statement`.
    #[serde(default = "default_level")]
    pub level: String,
    /// `WHEN` condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Trigger function, possibly schema-qualified.
    pub procedure: String,
    /// Literal arguments passed to the function.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    /// Whether this is a constraint trigger.
    #[serde(default, skip_serializing_if = "is_false")]
    pub constraint: bool,
    /// Whether the constraint trigger is `DEFERRABLE`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deferrable: bool,
    /// Whether the constraint trigger is `INITIALLY DEFERRED`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub initially_deferred: bool,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl Trigger {
    fn table_name(&self) -> String {
        qualname(&self.schema, &self.table)
    }

    fn procedure_name(&self) -> String {
        let name = self.procedure.trim_end_matches("()");
        match name.split_once('(') {
            Some((base, _)) => base.to_string(),
            None => name.to_string(),
        }
    }
}

impl DbObject for Trigger {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Trigger
    }

    fn key(&self) -> ObjectKey {
        table_owned_key(ObjectKind::Trigger, &self.schema, &self.table, &self.name)
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

    fn has_owner(&self) -> bool {
        false
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let events: Vec<String> = self
            .events
            .iter()
            .map(|event| {
                if event == "update" && !self.columns.is_empty() {
                    format!("UPDATE OF {}", column_list(&self.columns))
                } else {
                    event.to_uppercase()
                }
            })
            .collect();
        let mut sql = format!(
            "CREATE {}TRIGGER {} {} {} ON {}",
            if self.constraint { "CONSTRAINT " } else { "" },
            quote_id(&self.name),
            self.timing.to_uppercase(),
            events.join(" OR "),
            self.table_name()
        );
        if self.deferrable {
            sql.push_str(" DEFERRABLE");
            if self.initially_deferred {
                sql.push_str(" INITIALLY DEFERRED");
            }
        }
        sql.push_str(&format!("\n    FOR EACH {}", self.level.to_uppercase()));
        if let Some(condition) = &self.condition {
            sql.push_str(&format!(" WHEN ({condition})"));
        }
        let args: Vec<String> = self.arguments.iter().map(|a| quote_literal(a)).collect();
        sql.push_str(&format!(
            "\n    EXECUTE PROCEDURE {}({})",
            self.procedure_name(),
            args.join(", ")
        ));
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = table_owned_deps(db, &self.schema, &self.table);
        deps.extend(db.function_ref(&self.procedure_name(), &self.schema));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

fn rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)\bON\s+(\w+)\s+TO\s+\S+\s+(?:WHERE\s+(.*?)\s+)?DO\s+(?:(INSTEAD|ALSO)\s+)?(.*?);?\s*$",
        )
        .expect("valid regex")
    })
}

/// A query rewrite rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Schema of the owning relation.
    pub schema: String,
    /// Owning table or view.
    pub table: String,
    /// Rule name.
    pub name: String,
    /// `select`, `insert`, `update` or `delete`.
    #[serde(default)]
    pub event: String,
    /// `WHERE` condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Whether the rule replaces the original query.
    #[serde(default, skip_serializing_if = "is_false")]
    pub instead: bool,
    /// Rule actions (`NOTHING`, a statement, or a parenthesized list).
    #[serde(default)]
    pub actions: String,
    /// Full rule definition as reported by the catalog.
    #[serde(default, skip_serializing)]
    pub definition: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl Rule {
    /// Splits a catalog rule definition (`CREATE RULE ... AS ON ... DO
    /// ...`) into event, condition, `INSTEAD` flag and actions.
    pub fn absorb_definition(&mut self) -> Result<()> {
        let Some(definition) = self.definition.take() else {
            return Ok(());
        };
        let caps = rule_re().captures(&definition).ok_or_else(|| {
            CatalogError::invalid(self.extern_key(), format!("unparseable rule: {definition}"))
        })?;
        self.event = caps[1].to_lowercase();
        self.condition = caps.get(2).map(|m| m.as_str().to_string());
        self.instead = caps
            .get(3)
            .is_some_and(|m| m.as_str().eq_ignore_ascii_case("instead"));
        self.actions = caps[4].to_string();
        Ok(())
    }

    fn table_name(&self) -> String {
        qualname(&self.schema, &self.table)
    }
}

impl DbObject for Rule {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Rule
    }

    fn key(&self) -> ObjectKey {
        table_owned_key(ObjectKind::Rule, &self.schema, &self.table, &self.name)
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

    fn has_owner(&self) -> bool {
        false
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!(
            "CREATE RULE {} AS ON {} TO {}",
            quote_id(&self.name),
            self.event.to_uppercase(),
            self.table_name()
        );
        if let Some(condition) = &self.condition {
            sql.push_str(&format!("\n    WHERE {condition}"));
        }
        sql.push_str(&format!(
            "\n    DO {}{}",
            if self.instead { "INSTEAD " } else { "" },
            self.actions
        ));
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        table_owned_deps(db, &self.schema, &self.table)
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        let changed = self.event != new.event
            || self.condition != new.condition
            || self.instead != new.instead
            || self.actions != new.actions;
        Ok(if changed {
            Alteration::Recreate
        } else {
            Alteration::default()
        })
    }
}

/// A database-wide event trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrigger {
    /// Trigger name.
    pub name: String,
    /// Event (`ddl_command_start`, `sql_drop`, ...).
    pub event: String,
    /// Command tags filtering the event.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Trigger function, possibly schema-qualified.
    pub procedure: String,
    /// `disabled`, `replica` or `always`; absent for the default
    /// (origin) firing mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl EventTrigger {
    fn enable_clause(mode: Option<&str>) -> &'static str {
        match mode {
            Some("disabled") => "DISABLE",
            Some("replica") => "ENABLE REPLICA",
            Some("always") => "ENABLE ALWAYS",
            _ => "ENABLE",
        }
    }
}

impl DbObject for EventTrigger {
    fn kind(&self) -> ObjectKind {
        ObjectKind::EventTrigger
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(ObjectKind::EventTrigger, self.name.clone())
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

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!(
            "CREATE EVENT TRIGGER {} ON {}",
            quote_id(&self.name),
            self.event
        );
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|t| quote_literal(t)).collect();
            sql.push_str(&format!("\n    WHEN tag IN ({})", tags.join(", ")));
        }
        sql.push_str(&format!(
            "\n    EXECUTE PROCEDURE {}()",
            self.procedure.trim_end_matches("()")
        ));
        let mut stmts = vec![sql];
        if self.enabled.is_some() {
            stmts.push(format!(
                "ALTER EVENT TRIGGER {} {}",
                quote_id(&self.name),
                Self::enable_clause(self.enabled.as_deref())
            ));
        }
        stmts
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        db.function_ref(self.procedure.trim_end_matches("()"), DEFAULT_SCHEMA)
            .into_iter()
            .collect()
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.event != new.event || self.tags != new.tags || self.procedure != new.procedure {
            return Ok(Alteration::Recreate);
        }
        let mut stmts = Vec::new();
        if self.enabled != new.enabled {
            stmts.push(format!(
                "ALTER EVENT TRIGGER {} {}",
                quote_id(&self.name),
                Self::enable_clause(new.enabled.as_deref())
            ));
        }
        Ok(Alteration::Statements(stmts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> Trigger {
        Trigger {
            schema: "public".to_string(),
            table: "t1".to_string(),
            name: "tr1".to_string(),
            timing: "before".to_string(),
            events: vec!["insert".to_string(), "update".to_string()],
            columns: Vec::new(),
            level: "row".to_string(),
            condition: None,
            procedure: "f1()".to_string(),
            arguments: Vec::new(),
            constraint: false,
            deferrable: false,
            initially_deferred: false,
            meta: Meta::default(),
        }
    }

    #[test]
    fn test_trigger_sql() {
        let tr = trigger();
        assert_eq!(
            tr.create_sql(&Database::default()),
            vec!["CREATE TRIGGER tr1 BEFORE INSERT OR UPDATE ON t1\n    FOR EACH ROW\n    EXECUTE PROCEDURE f1()"]
        );
        assert_eq!(tr.drop_sql(), vec!["DROP TRIGGER tr1 ON t1"]);
        assert_eq!(tr.rename_sql("tr2"), "ALTER TRIGGER tr1 ON t1 RENAME TO tr2");
    }

    #[test]
    fn test_trigger_change_recreates() {
        let old = trigger();
        let mut new = old.clone();
        new.timing = "after".to_string();
        assert_eq!(
            old.alter_sql(&new, &Database::default()).unwrap(),
            Alteration::Recreate
        );
        let mut described = old.clone();
        described.meta.description = Some("x".to_string());
        assert_eq!(
            old.alter_sql(&described, &Database::default()).unwrap(),
            Alteration::default()
        );
    }

    #[test]
    fn test_rule_definition_parsing() {
        let mut rule = Rule {
            schema: "public".to_string(),
            table: "t1".to_string(),
            name: "r1".to_string(),
            event: String::new(),
            condition: None,
            instead: false,
            actions: String::new(),
            definition: Some(
                "CREATE RULE r1 AS\n    ON INSERT TO public.t1\n   WHERE (new.c1 > 10) DO INSTEAD NOTHING;"
                    .to_string(),
            ),
            meta: Meta::default(),
        };
        rule.absorb_definition().unwrap();
        assert_eq!(rule.event, "insert");
        assert_eq!(rule.condition.as_deref(), Some("(new.c1 > 10)"));
        assert!(rule.instead);
        assert_eq!(rule.actions, "NOTHING");
        assert_eq!(
            rule.create_sql(&Database::default()),
            vec!["CREATE RULE r1 AS ON INSERT TO t1\n    WHERE (new.c1 > 10)\n    DO INSTEAD NOTHING"]
        );
    }

    #[test]
    fn test_event_trigger_enable() {
        let old = EventTrigger {
            name: "et1".to_string(),
            event: "ddl_command_end".to_string(),
            tags: vec!["CREATE TABLE".to_string()],
            procedure: "f_ddl".to_string(),
            enabled: None,
            meta: Meta::default(),
        };
        assert_eq!(
            old.create_sql(&Database::default()),
            vec!["CREATE EVENT TRIGGER et1 ON ddl_command_end\n    WHEN tag IN ('CREATE TABLE')\n    EXECUTE PROCEDURE f_ddl()"]
        );
        let mut new = old.clone();
        new.enabled = Some("disabled".to_string());
        assert_eq!(
            old.alter_sql(&new, &Database::default()).unwrap(),
            Alteration::Statements(vec!["ALTER EVENT TRIGGER et1 DISABLE".to_string()])
        );
    }
}
