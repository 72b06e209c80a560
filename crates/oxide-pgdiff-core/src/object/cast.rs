//! Casts, procedural languages and extensions.

use serde::{Deserialize, Serialize};

use super::{is_false, recreate_if_changed, type_dep, Alteration, DbObject, Meta};
use crate::database::Database;
use crate::error::Result;
use crate::ident::{quote_id, quote_literal, DEFAULT_SCHEMA};
use crate::key::{ObjectKey, ObjectKind};

/// When a cast is applied implicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastContext {
    /// Only on explicit request.
    #[default]
    Explicit,
    /// In assignments.
    Assignment,
    /// Anywhere.
    Implicit,
}

/// How a cast is performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastMethod {
    /// Through a function.
    #[default]
    Function,
    /// Through the types' text I/O functions.
    Inout,
    /// Binary coercible, no conversion.
    Binary,
}

/// A type cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    /// Source type.
    pub source: String,
    /// Target type.
    pub target: String,
    /// Conversion function with its argument types (`int2_bool(smallint)`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Cast context.
    #[serde(default)]
    pub context: CastContext,
    /// Cast method.
    #[serde(default)]
    pub method: CastMethod,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for Cast {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Cast
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(ObjectKind::Cast, self.source.clone()).with_signature(self.target.clone())
    }

    fn set_key(&mut self, key: &ObjectKey) {
        self.source.clone_from(&key.name);
        if let Some(target) = &key.signature {
            self.target.clone_from(target);
        }
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn extern_key(&self) -> String {
        format!("cast ({} AS {})", self.source, self.target)
    }

    fn identifier(&self) -> String {
        format!("({} AS {})", self.source, self.target)
    }

    fn has_owner(&self) -> bool {
        false
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!("CREATE CAST {}", self.identifier());
        match (self.method, &self.function) {
            (CastMethod::Function, Some(function)) => {
                sql.push_str(&format!(" WITH FUNCTION {function}"));
            }
            (CastMethod::Inout, _) => sql.push_str(" WITH INOUT"),
            _ => sql.push_str(" WITHOUT FUNCTION"),
        }
        match self.context {
            CastContext::Explicit => {}
            CastContext::Assignment => sql.push_str(" AS ASSIGNMENT"),
            CastContext::Implicit => sql.push_str(" AS IMPLICIT"),
        }
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = Vec::new();
        deps.extend(type_dep(db, &self.source, DEFAULT_SCHEMA));
        deps.extend(type_dep(db, &self.target, DEFAULT_SCHEMA));
        if let Some(function) = &self.function {
            deps.extend(db.function_ref(function, DEFAULT_SCHEMA));
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// A procedural language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    /// Language name.
    pub name: String,
    /// Whether the language is `TRUSTED`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub trusted: bool,
    /// Call handler function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    /// Inline handler function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<String>,
    /// Validator function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for Language {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Language
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(ObjectKind::Language, self.name.clone())
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
            "CREATE {}LANGUAGE {}",
            if self.trusted { "TRUSTED " } else { "" },
            quote_id(&self.name)
        );
        if let Some(handler) = &self.handler {
            sql.push_str(&format!(" HANDLER {handler}"));
            if let Some(inline) = &self.inline {
                sql.push_str(&format!(" INLINE {inline}"));
            }
            if let Some(validator) = &self.validator {
                sql.push_str(&format!(" VALIDATOR {validator}"));
            }
        }
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        [&self.handler, &self.inline, &self.validator]
            .into_iter()
            .flatten()
            .filter_map(|f| db.function_ref(f, DEFAULT_SCHEMA))
            .collect()
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// An installed extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    /// Extension name.
    pub name: String,
    /// Schema holding the extension's objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Installed version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for Extension {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Extension
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(ObjectKind::Extension, self.name.clone())
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

    fn has_owner(&self) -> bool {
        false
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!("CREATE EXTENSION {}", quote_id(&self.name));
        if let Some(schema) = &self.schema {
            sql.push_str(&format!(" SCHEMA {}", quote_id(schema)));
        }
        if let Some(version) = &self.version {
            sql.push_str(&format!(" VERSION {}", quote_literal(version)));
        }
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        self.schema
            .as_ref()
            .map(|s| ObjectKey::new(ObjectKind::Schema, s.clone()))
            .filter(|key| db.schemas.contains_key(key))
            .into_iter()
            .collect()
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        let mut stmts = Vec::new();
        let ident = quote_id(&self.name);
        if let Some(version) = &new.version {
            if self.version.as_ref() != Some(version) {
                stmts.push(format!(
                    "ALTER EXTENSION {ident} UPDATE TO {}",
                    quote_literal(version)
                ));
            }
        }
        if let Some(schema) = &new.schema {
            if self.schema.as_ref() != Some(schema) {
                stmts.push(format!("ALTER EXTENSION {ident} SET SCHEMA {}", quote_id(schema)));
            }
        }
        Ok(Alteration::Statements(stmts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_sql() {
        let cast = Cast {
            source: "smallint".to_string(),
            target: "boolean".to_string(),
            function: Some("int2_bool(smallint)".to_string()),
            context: CastContext::Assignment,
            method: CastMethod::Function,
            meta: Meta::default(),
        };
        assert_eq!(cast.extern_key(), "cast (smallint AS boolean)");
        assert_eq!(
            cast.create_sql(&Database::default()),
            vec!["CREATE CAST (smallint AS boolean) WITH FUNCTION int2_bool(smallint) AS ASSIGNMENT"]
        );
        assert_eq!(cast.drop_sql(), vec!["DROP CAST (smallint AS boolean)"]);
    }

    #[test]
    fn test_cast_wire_enums() {
        let cast: Cast =
            serde_yaml::from_str("source: text\ntarget: mytype\ncontext: implicit\nmethod: inout\n")
                .unwrap();
        assert_eq!(cast.context, CastContext::Implicit);
        assert_eq!(cast.method, CastMethod::Inout);
    }

    #[test]
    fn test_extension_alter() {
        let old = Extension {
            name: "hstore".to_string(),
            schema: Some("public".to_string()),
            version: Some("1.7".to_string()),
            meta: Meta::default(),
        };
        let mut new = old.clone();
        new.version = Some("1.8".to_string());
        new.schema = Some("ext".to_string());
        assert_eq!(
            old.alter_sql(&new, &Database::default()).unwrap(),
            Alteration::Statements(vec![
                "ALTER EXTENSION hstore UPDATE TO '1.8'".to_string(),
                "ALTER EXTENSION hstore SET SCHEMA ext".to_string(),
            ])
        );
    }

    #[test]
    fn test_language_sql() {
        let lang = Language {
            name: "plperl".to_string(),
            trusted: true,
            handler: None,
            inline: None,
            validator: None,
            meta: Meta::default(),
        };
        assert_eq!(
            lang.create_sql(&Database::default()),
            vec!["CREATE TRUSTED LANGUAGE plperl"]
        );
    }
}
