//! User-defined types and domains.

use serde::{Deserialize, Serialize};

use super::{
    is_false, named_list, recreate_if_changed, type_dep, Alteration, DbObject, Meta, NamedEntry,
};
use crate::database::Database;
use crate::error::{CatalogError, Result};
use crate::ident::{quote_id, quote_literal};
use crate::key::{ObjectKey, ObjectKind};

macro_rules! schema_scoped {
    ($kind:expr) => {
        fn kind(&self) -> ObjectKind {
            $kind
        }

        fn key(&self) -> ObjectKey {
            ObjectKey::scoped($kind, self.schema.clone(), self.name.clone())
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
    };
}
pub(crate) use schema_scoped;

/// A base type defined by input/output functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseType {
    /// Owning schema.
    pub schema: String,
    /// Type name.
    pub name: String,
    /// Input function.
    pub input: String,
    /// Output function.
    pub output: String,
    /// Binary input function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive: Option<String>,
    /// Binary output function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send: Option<String>,
    /// Type modifier input function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typmod_in: Option<String>,
    /// Type modifier output function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typmod_out: Option<String>,
    /// Analyze function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyze: Option<String>,
    /// Fixed internal length; absent for variable length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internallength: Option<i32>,
    /// Alignment (`char`, `int2`, `int4`, `double`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    /// Storage strategy (`plain`, `external`, `extended`, `main`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Whether values are passed by value.
    #[serde(default, skip_serializing_if = "is_false")]
    pub passedbyvalue: bool,
    /// Type category code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl BaseType {
    fn functions(&self) -> Vec<&str> {
        let mut funcs = vec![self.input.as_str(), self.output.as_str()];
        for func in [
            &self.receive,
            &self.send,
            &self.typmod_in,
            &self.typmod_out,
            &self.analyze,
        ]
        .into_iter()
        .flatten()
        {
            funcs.push(func);
        }
        funcs
    }
}

impl DbObject for BaseType {
    schema_scoped!(ObjectKind::BaseType);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut opts = vec![
            format!("INPUT = {}", self.input),
            format!("OUTPUT = {}", self.output),
        ];
        let optional = [
            ("RECEIVE", &self.receive),
            ("SEND", &self.send),
            ("TYPMOD_IN", &self.typmod_in),
            ("TYPMOD_OUT", &self.typmod_out),
            ("ANALYZE", &self.analyze),
            ("ALIGNMENT", &self.alignment),
            ("STORAGE", &self.storage),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                opts.push(format!("{name} = {value}"));
            }
        }
        opts.push(format!(
            "INTERNALLENGTH = {}",
            self.internallength
                .map_or_else(|| "variable".to_string(), |l| l.to_string())
        ));
        if self.passedbyvalue {
            opts.push("PASSEDBYVALUE".to_string());
        }
        if let Some(category) = &self.category {
            opts.push(format!("CATEGORY = {}", quote_literal(category)));
        }
        vec![format!(
            "CREATE TYPE {} (\n    {})",
            self.qualname(),
            opts.join(",\n    ")
        )]
    }

    fn drop_sql(&self) -> Vec<String> {
        vec![format!("DROP TYPE {} CASCADE", self.qualname())]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        for func in self.functions() {
            deps.extend(db.function_ref(func, &self.schema));
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// An attribute of a composite type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAttribute {
    /// Attribute name.
    pub name: String,
    /// Data type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Explicit collation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Rename sentinel.
    #[serde(default, skip_serializing)]
    pub oldname: Option<String>,
}

impl NamedEntry for TypeAttribute {}

impl TypeAttribute {
    fn definition(&self) -> String {
        let mut sql = format!("{} {}", quote_id(&self.name), self.type_name);
        if let Some(collation) = &self.collation {
            sql.push_str(&format!(" COLLATE {collation}"));
        }
        sql
    }
}

/// A composite (row) type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeType {
    /// Owning schema.
    pub schema: String,
    /// Type name.
    pub name: String,
    /// Attributes in declaration order.
    #[serde(default, with = "named_list")]
    pub attributes: Vec<TypeAttribute>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for CompositeType {
    schema_scoped!(ObjectKind::CompositeType);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let attrs: Vec<String> = self
            .attributes
            .iter()
            .map(|a| format!("    {}", a.definition()))
            .collect();
        vec![format!(
            "CREATE TYPE {} AS (\n{})",
            self.qualname(),
            attrs.join(",\n")
        )]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        for attr in &self.attributes {
            deps.extend(type_dep(db, &attr.type_name, &self.schema));
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        let target = format!("ALTER TYPE {}", self.qualname());
        let mut stmts = Vec::new();
        for nattr in &new.attributes {
            let source = nattr.oldname.as_deref().unwrap_or(&nattr.name);
            match self.attributes.iter().find(|a| a.name == source) {
                Some(oattr) => {
                    if nattr.oldname.is_some() {
                        stmts.push(format!(
                            "{target} RENAME ATTRIBUTE {} TO {}",
                            quote_id(&oattr.name),
                            quote_id(&nattr.name)
                        ));
                    }
                    if oattr.type_name != nattr.type_name || oattr.collation != nattr.collation {
                        let mut clause = format!(
                            "{target} ALTER ATTRIBUTE {} TYPE {}",
                            quote_id(&nattr.name),
                            nattr.type_name
                        );
                        if let Some(collation) = &nattr.collation {
                            clause.push_str(&format!(" COLLATE {collation}"));
                        }
                        stmts.push(clause);
                    }
                }
                None if nattr.oldname.is_some() => {
                    return Err(CatalogError::RenameSourceNotFound {
                        object: format!("{} attribute {}", self.extern_key(), nattr.name),
                        oldname: source.to_string(),
                    });
                }
                None => stmts.push(format!("{target} ADD ATTRIBUTE {}", nattr.definition())),
            }
        }
        for oattr in &self.attributes {
            let kept = new
                .attributes
                .iter()
                .any(|n| n.name == oattr.name || n.oldname.as_deref() == Some(&oattr.name));
            if !kept {
                stmts.push(format!(
                    "{target} DROP ATTRIBUTE {}",
                    quote_id(&oattr.name)
                ));
            }
        }
        Ok(Alteration::Statements(stmts))
    }
}

/// An enumerated type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    /// Owning schema.
    pub schema: String,
    /// Type name.
    pub name: String,
    /// Labels in sort order.
    pub labels: Vec<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for EnumType {
    schema_scoped!(ObjectKind::EnumType);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let labels: Vec<String> = self.labels.iter().map(|l| quote_literal(l)).collect();
        vec![format!(
            "CREATE TYPE {} AS ENUM ({})",
            self.qualname(),
            labels.join(", ")
        )]
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if !new.labels.starts_with(&self.labels) {
            return Ok(Alteration::Recreate);
        }
        Ok(Alteration::Statements(
            new.labels[self.labels.len()..]
                .iter()
                .map(|label| {
                    format!(
                        "ALTER TYPE {} ADD VALUE {}",
                        self.qualname(),
                        quote_literal(label)
                    )
                })
                .collect(),
        ))
    }
}

/// A range type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeType {
    /// Owning schema.
    pub schema: String,
    /// Type name.
    pub name: String,
    /// Element type.
    pub subtype: String,
    /// Subtype operator class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype_opclass: Option<String>,
    /// Collation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Canonicalization function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    /// Difference function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype_diff: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for RangeType {
    schema_scoped!(ObjectKind::RangeType);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut opts = vec![format!("SUBTYPE = {}", self.subtype)];
        let optional = [
            ("SUBTYPE_OPCLASS", &self.subtype_opclass),
            ("COLLATION", &self.collation),
            ("CANONICAL", &self.canonical),
            ("SUBTYPE_DIFF", &self.subtype_diff),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                opts.push(format!("{name} = {value}"));
            }
        }
        vec![format!(
            "CREATE TYPE {} AS RANGE (\n    {})",
            self.qualname(),
            opts.join(",\n    ")
        )]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        deps.extend(type_dep(db, &self.subtype, &self.schema));
        for func in [&self.canonical, &self.subtype_diff].into_iter().flatten() {
            deps.extend(db.function_ref(func, &self.schema));
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// A domain over another type. Its check constraints live in the
/// check-constraint dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Owning schema.
    pub schema: String,
    /// Domain name.
    pub name: String,
    /// Underlying type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the domain is `NOT NULL`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub not_null: bool,
    /// Default expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Collation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for Domain {
    schema_scoped!(ObjectKind::Domain);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!("CREATE DOMAIN {} AS {}", self.qualname(), self.type_name);
        if let Some(collation) = &self.collation {
            sql.push_str(&format!(" COLLATE {collation}"));
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {default}"));
        }
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        deps.extend(type_dep(db, &self.type_name, &self.schema));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.type_name != new.type_name || self.collation != new.collation {
            return Ok(Alteration::Recreate);
        }
        let target = format!("ALTER DOMAIN {}", self.qualname());
        let mut stmts = Vec::new();
        if self.default != new.default {
            stmts.push(match &new.default {
                Some(default) => format!("{target} SET DEFAULT {default}"),
                None => format!("{target} DROP DEFAULT"),
            });
        }
        if self.not_null != new.not_null {
            stmts.push(format!(
                "{target} {} NOT NULL",
                if new.not_null { "SET" } else { "DROP" }
            ));
        }
        Ok(Alteration::Statements(stmts))
    }
}
