//! Functions and aggregates.

use serde::{Deserialize, Serialize};

use super::{is_builtin_type, is_false, type_dep, Alteration, DbObject, Meta};
use crate::database::Database;
use crate::error::Result;
use crate::ident::quote_literal;
use crate::key::{ObjectKey, ObjectKind};

/// Languages that ship with every server and never need a dependency.
const BUILTIN_LANGUAGES: &[&str] = &["sql", "c", "internal", "plpgsql"];

/// Splits a comma-separated argument list, ignoring commas inside
/// parentheses (`numeric(10,2)`).
fn split_args(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in args.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Type of an argument declaration (`a integer DEFAULT 1` -> `integer`).
fn arg_type(arg: &str) -> &str {
    let arg = arg.split(" DEFAULT ").next().unwrap_or(arg).trim();
    let arg = ["IN ", "OUT ", "INOUT ", "VARIADIC "]
        .iter()
        .find_map(|mode| arg.strip_prefix(mode))
        .unwrap_or(arg);
    if is_builtin_type(arg) {
        return arg;
    }
    arg.split_once(' ').map_or(arg, |(_, rest)| rest)
}

/// A function or procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Owning schema.
    pub schema: String,
    /// Function name.
    pub name: String,
    /// Identity arguments (`integer, text`); part of the key.
    #[serde(default)]
    pub arguments: String,
    /// Full argument list with names and defaults, when it differs from
    /// the identity arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allargs: Option<String>,
    /// Return type.
    pub returns: String,
    /// Implementation language.
    pub language: String,
    /// Function body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Object file for C functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_file: Option<String>,
    /// Link symbol for C functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_symbol: Option<String>,
    /// `immutable` or `stable`; absent for volatile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<String>,
    /// Whether the function is `STRICT`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub strict: bool,
    /// Whether the function is `SECURITY DEFINER`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub security_definer: bool,
    /// Whether the function is `LEAKPROOF`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub leakproof: bool,
    /// Estimated execution cost, when not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Estimated result rows, when not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<f64>,
    /// `SET` configuration parameters (`search_path=public`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl Function {
    /// Creates a function with the given identity arguments.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
        returns: impl Into<String>,
        language: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            arguments: arguments.into(),
            allargs: None,
            returns: returns.into(),
            language: language.into(),
            source: Some(source.into()),
            obj_file: None,
            link_symbol: None,
            volatility: None,
            strict: false,
            security_definer: false,
            leakproof: false,
            cost: None,
            rows: None,
            configuration: Vec::new(),
            meta: Meta::default(),
        }
    }

    fn definition(&self, or_replace: bool) -> String {
        let mut sql = format!(
            "CREATE {}FUNCTION {}({}) RETURNS {}\n    LANGUAGE {}",
            if or_replace { "OR REPLACE " } else { "" },
            self.qualname(),
            self.allargs.as_deref().unwrap_or(&self.arguments),
            self.returns,
            self.language
        );
        if let Some(volatility) = &self.volatility {
            sql.push_str(&format!(" {}", volatility.to_uppercase()));
        }
        if self.strict {
            sql.push_str(" STRICT");
        }
        if self.security_definer {
            sql.push_str(" SECURITY DEFINER");
        }
        if self.leakproof {
            sql.push_str(" LEAKPROOF");
        }
        if let Some(cost) = self.cost {
            sql.push_str(&format!(" COST {cost}"));
        }
        if let Some(rows) = self.rows {
            sql.push_str(&format!(" ROWS {rows}"));
        }
        for setting in &self.configuration {
            if let Some((param, value)) = setting.split_once('=') {
                sql.push_str(&format!("\n    SET {param} = {value}"));
            }
        }
        match (&self.obj_file, &self.link_symbol) {
            (Some(obj_file), link_symbol) => {
                sql.push_str(&format!("\n    AS {}", quote_literal(obj_file)));
                if let Some(symbol) = link_symbol {
                    sql.push_str(&format!(", {}", quote_literal(symbol)));
                }
            }
            _ => {
                sql.push_str(&format!(
                    "\n    AS $_${}$_$",
                    self.source.as_deref().unwrap_or_default()
                ));
            }
        }
        sql
    }

    /// Non-builtin types used by the arguments and return type.
    fn type_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = Vec::new();
        for arg in split_args(&self.arguments) {
            deps.extend(type_dep(db, arg_type(&arg), &self.schema));
        }
        deps.extend(type_dep(db, &self.returns, &self.schema));
        deps.retain(|k| k.kind != ObjectKind::BaseType);
        deps
    }

    /// Whether an argument or the return type is the type `key`. Base
    /// types are left out of the dependency graph, so this is how their
    /// functions are found.
    pub(crate) fn mentions_type(&self, db: &Database, key: &ObjectKey) -> bool {
        split_args(&self.arguments)
            .iter()
            .map(|arg| arg_type(arg))
            .chain(std::iter::once(self.returns.as_str()))
            .any(|type_name| type_dep(db, type_name, &self.schema).as_ref() == Some(key))
    }
}

impl DbObject for Function {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Function
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::scoped(ObjectKind::Function, self.schema.clone(), self.name.clone())
            .with_signature(self.arguments.clone())
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

    fn extern_key(&self) -> String {
        format!("function {}({})", self.name, self.arguments)
    }

    fn identifier(&self) -> String {
        format!("{}({})", self.qualname(), self.arguments)
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![self.definition(false)]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        if !BUILTIN_LANGUAGES.contains(&self.language.as_str()) {
            let lang = ObjectKey::new(ObjectKind::Language, self.language.as_str());
            if db.languages.contains_key(&lang) {
                deps.push(lang);
            }
        }
        deps.extend(self.type_deps(db));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.returns != new.returns {
            return Ok(Alteration::Recreate);
        }
        let mut old = self.clone();
        old.meta = new.meta.clone();
        if &old == new {
            return Ok(Alteration::default());
        }
        Ok(Alteration::Statements(vec![new.definition(true)]))
    }
}

/// An aggregate function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Owning schema.
    pub schema: String,
    /// Aggregate name.
    pub name: String,
    /// Identity arguments; part of the key.
    #[serde(default)]
    pub arguments: String,
    /// State transition function.
    pub sfunc: String,
    /// State data type.
    pub stype: String,
    /// Final function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalfunc: Option<String>,
    /// Initial state value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initcond: Option<String>,
    /// Sort operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortop: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for Aggregate {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Aggregate
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::scoped(ObjectKind::Aggregate, self.schema.clone(), self.name.clone())
            .with_signature(self.arguments.clone())
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

    fn extern_key(&self) -> String {
        format!("aggregate {}({})", self.name, self.arguments)
    }

    fn identifier(&self) -> String {
        format!("{}({})", self.qualname(), self.arguments)
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut clauses = vec![
            format!("SFUNC = {}", self.sfunc),
            format!("STYPE = {}", self.stype),
        ];
        if let Some(finalfunc) = &self.finalfunc {
            clauses.push(format!("FINALFUNC = {finalfunc}"));
        }
        if let Some(initcond) = &self.initcond {
            clauses.push(format!("INITCOND = {}", quote_literal(initcond)));
        }
        if let Some(sortop) = &self.sortop {
            clauses.push(format!("SORTOP = {sortop}"));
        }
        vec![format!(
            "CREATE AGGREGATE {}({}) (\n    {})",
            self.qualname(),
            if self.arguments.is_empty() { "*" } else { &self.arguments },
            clauses.join(",\n    ")
        )]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        deps.extend(db.function_ref(&self.sfunc, &self.schema));
        if let Some(finalfunc) = &self.finalfunc {
            deps.extend(db.function_ref(finalfunc, &self.schema));
        }
        deps.extend(type_dep(db, &self.stype, &self.schema));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        let changed = self.sfunc != new.sfunc
            || self.stype != new.stype
            || self.finalfunc != new.finalfunc
            || self.initcond != new.initcond
            || self.sortop != new.sortop;
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

    fn f1() -> Function {
        Function::new("public", "f1", "integer", "integer", "sql", "SELECT $1 + 1")
    }

    #[test]
    fn test_create_function() {
        let mut f = f1();
        f.volatility = Some("immutable".to_string());
        assert_eq!(
            f.create_sql(&Database::default()),
            vec!["CREATE FUNCTION f1(integer) RETURNS integer\n    LANGUAGE sql IMMUTABLE\n    AS $_$SELECT $1 + 1$_$"]
        );
        assert_eq!(f.drop_sql(), vec!["DROP FUNCTION f1(integer)"]);
        assert_eq!(f.extern_key(), "function f1(integer)");
    }

    #[test]
    fn test_body_change_replaces() {
        let old = f1();
        let mut new = f1();
        new.source = Some("SELECT $1 + 2".to_string());
        let Alteration::Statements(stmts) = old.alter_sql(&new, &Database::default()).unwrap()
        else {
            panic!("expected statements");
        };
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].starts_with("CREATE OR REPLACE FUNCTION f1(integer)"));
    }

    #[test]
    fn test_return_type_change_recreates() {
        let old = f1();
        let mut new = f1();
        new.returns = "bigint".to_string();
        assert_eq!(
            old.alter_sql(&new, &Database::default()).unwrap(),
            Alteration::Recreate
        );
    }

    #[test]
    fn test_unchanged_function() {
        let old = f1();
        let mut new = f1();
        new.meta.description = Some("adds one".to_string());
        assert_eq!(
            old.alter_sql(&new, &Database::default()).unwrap(),
            Alteration::default()
        );
    }

    #[test]
    fn test_split_args() {
        assert_eq!(
            split_args("a numeric(10,2), b text"),
            vec!["a numeric(10,2)", "b text"]
        );
        assert_eq!(arg_type("a numeric(10,2)"), "numeric(10,2)");
        assert_eq!(arg_type("integer"), "integer");
        assert_eq!(arg_type("double precision"), "double precision");
    }

    #[test]
    fn test_aggregate_sql() {
        let agg = Aggregate {
            schema: "public".to_string(),
            name: "a1".to_string(),
            arguments: "integer".to_string(),
            sfunc: "f1".to_string(),
            stype: "integer".to_string(),
            finalfunc: None,
            initcond: Some("0".to_string()),
            sortop: None,
            meta: Meta::default(),
        };
        assert_eq!(
            agg.create_sql(&Database::default()),
            vec!["CREATE AGGREGATE a1(integer) (\n    SFUNC = f1,\n    STYPE = integer,\n    INITCOND = '0')"]
        );
        assert_eq!(agg.drop_sql(), vec!["DROP AGGREGATE a1(integer)"]);
    }
}
