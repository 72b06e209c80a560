//! Foreign data wrappers, servers, user mappings and foreign tables.

use serde::{Deserialize, Serialize};

use super::table::alter_columns;
use super::{diff_options, named_list, options_clause, type_dep, Alteration, Column, DbObject, Meta};
use crate::database::Database;
use crate::error::Result;
use crate::ident::{quote_id, quote_literal};
use crate::key::{ObjectKey, ObjectKind};

/// A foreign data wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignDataWrapper {
    /// Wrapper name.
    pub name: String,
    /// Handler function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    /// Validator function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    /// Wrapper options (`key=value`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for ForeignDataWrapper {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ForeignDataWrapper
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(ObjectKind::ForeignDataWrapper, self.name.clone())
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
        let mut sql = format!("CREATE FOREIGN DATA WRAPPER {}", quote_id(&self.name));
        if let Some(handler) = &self.handler {
            sql.push_str(&format!("\n    HANDLER {handler}"));
        }
        if let Some(validator) = &self.validator {
            sql.push_str(&format!("\n    VALIDATOR {validator}"));
        }
        if !self.options.is_empty() {
            sql.push_str(&format!("\n    {}", options_clause(&self.options)));
        }
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        [&self.handler, &self.validator]
            .into_iter()
            .flatten()
            .filter_map(|f| db.function_ref(f, crate::ident::DEFAULT_SCHEMA))
            .collect()
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        let target = format!("ALTER FOREIGN DATA WRAPPER {}", quote_id(&self.name));
        let mut stmts = Vec::new();
        if self.handler != new.handler {
            stmts.push(match &new.handler {
                Some(handler) => format!("{target} HANDLER {handler}"),
                None => format!("{target} NO HANDLER"),
            });
        }
        if self.validator != new.validator {
            stmts.push(match &new.validator {
                Some(validator) => format!("{target} VALIDATOR {validator}"),
                None => format!("{target} NO VALIDATOR"),
            });
        }
        if let Some(clause) = diff_options(&self.options, &new.options) {
            stmts.push(format!("{target} {clause}"));
        }
        Ok(Alteration::Statements(stmts))
    }
}

/// A foreign server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignServer {
    /// Server name.
    pub name: String,
    /// Foreign data wrapper.
    pub wrapper: String,
    /// Server type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    /// Server version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Server options (`key=value`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for ForeignServer {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ForeignServer
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(ObjectKind::ForeignServer, self.name.clone())
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
        let mut sql = format!("CREATE SERVER {}", quote_id(&self.name));
        if let Some(server_type) = &self.server_type {
            sql.push_str(&format!(" TYPE {}", quote_literal(server_type)));
        }
        if let Some(version) = &self.version {
            sql.push_str(&format!(" VERSION {}", quote_literal(version)));
        }
        sql.push_str(&format!(
            "\n    FOREIGN DATA WRAPPER {}",
            quote_id(&self.wrapper)
        ));
        if !self.options.is_empty() {
            sql.push_str(&format!("\n    {}", options_clause(&self.options)));
        }
        vec![sql]
    }

    fn implied_deps(&self, _db: &Database) -> Vec<ObjectKey> {
        vec![ObjectKey::new(
            ObjectKind::ForeignDataWrapper,
            self.wrapper.as_str(),
        )]
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.wrapper != new.wrapper || self.server_type != new.server_type {
            return Ok(Alteration::Recreate);
        }
        let target = format!("ALTER SERVER {}", quote_id(&self.name));
        let mut stmts = Vec::new();
        if self.version != new.version {
            if let Some(version) = &new.version {
                stmts.push(format!("{target} VERSION {}", quote_literal(version)));
            }
        }
        if let Some(clause) = diff_options(&self.options, &new.options) {
            stmts.push(format!("{target} {clause}"));
        }
        Ok(Alteration::Statements(stmts))
    }
}

/// A user mapping for a foreign server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMapping {
    /// Mapped role, or `PUBLIC`.
    pub username: String,
    /// Foreign server.
    pub server: String,
    /// Mapping options (`key=value`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl UserMapping {
    fn user(&self) -> String {
        if self.username == crate::privileges::PUBLIC {
            self.username.clone()
        } else {
            quote_id(&self.username)
        }
    }
}

impl DbObject for UserMapping {
    fn kind(&self) -> ObjectKind {
        ObjectKind::UserMapping
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(ObjectKind::UserMapping, self.username.clone())
            .with_parent(self.server.clone())
    }

    fn set_key(&mut self, key: &ObjectKey) {
        self.username.clone_from(&key.name);
        if let Some(server) = &key.parent {
            self.server.clone_from(server);
        }
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn extern_key(&self) -> String {
        format!("user mapping for {} server {}", self.username, self.server)
    }

    fn identifier(&self) -> String {
        format!("FOR {} SERVER {}", self.user(), quote_id(&self.server))
    }

    fn has_owner(&self) -> bool {
        false
    }

    fn has_comment(&self) -> bool {
        false
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!("CREATE USER MAPPING {}", self.identifier());
        if !self.options.is_empty() {
            sql.push_str(&format!("\n    {}", options_clause(&self.options)));
        }
        vec![sql]
    }

    fn implied_deps(&self, _db: &Database) -> Vec<ObjectKey> {
        vec![ObjectKey::new(ObjectKind::ForeignServer, self.server.as_str())]
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(Alteration::Statements(
            diff_options(&self.options, &new.options)
                .map(|clause| format!("ALTER USER MAPPING {} {clause}", self.identifier()))
                .into_iter()
                .collect(),
        ))
    }
}

/// A foreign table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignTable {
    /// Owning schema.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    #[serde(default, with = "named_list")]
    pub columns: Vec<Column>,
    /// Foreign server.
    pub server: String,
    /// Table options (`key=value`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl ForeignTable {
    fn target(&self) -> String {
        format!("FOREIGN TABLE {}", self.qualname())
    }
}

impl DbObject for ForeignTable {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ForeignTable
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::scoped(
            ObjectKind::ForeignTable,
            self.schema.clone(),
            self.name.clone(),
        )
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
        let ident = self.qualname();
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {}", c.definition()))
            .collect();
        let mut sql = format!(
            "CREATE FOREIGN TABLE {ident} (\n{})\n    SERVER {}",
            cols.join(",\n"),
            quote_id(&self.server)
        );
        if !self.options.is_empty() {
            sql.push_str(&format!("\n    {}", options_clause(&self.options)));
        }
        let mut stmts = vec![sql];
        stmts.extend(
            self.columns
                .iter()
                .filter(|c| c.description.is_some())
                .map(|c| c.comment_sql(&ident)),
        );
        stmts
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![
            ObjectKey::new(ObjectKind::Schema, self.schema.as_str()),
            ObjectKey::new(ObjectKind::ForeignServer, self.server.as_str()),
        ];
        for col in &self.columns {
            deps.extend(type_dep(db, &col.type_name, &self.schema));
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.server != new.server {
            return Ok(Alteration::Recreate);
        }
        let target = self.target();
        let mut stmts = alter_columns(
            &self.extern_key(),
            &target,
            &self.qualname(),
            &self.columns,
            &new.columns,
        )?;
        for col in &self.columns {
            let kept = new
                .columns
                .iter()
                .any(|n| n.name == col.name || n.oldname.as_deref() == Some(col.name.as_str()));
            if !kept {
                stmts.push(col.drop_sql(&target));
            }
        }
        if let Some(clause) = diff_options(&self.options, &new.options) {
            stmts.push(format!("ALTER {target} {clause}"));
        }
        Ok(Alteration::Statements(stmts))
    }
}
