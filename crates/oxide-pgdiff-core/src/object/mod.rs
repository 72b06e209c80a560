//! Catalog object model.
//!
//! Every SQL object category has its own struct holding only the
//! attributes legal for it. The structs share the [`DbObject`] capability
//! trait; [`crate::database::ObjectRef`] is the tagged union used to
//! dispatch over the closed set of kinds.

mod cast;
mod column;
mod constraint;
mod foreign;
mod function;
mod index;
mod operator;
mod schema;
mod sequence;
mod table;
mod textsearch;
mod trigger;
mod types;
mod view;

pub use cast::{Cast, CastContext, CastMethod, Extension, Language};
pub use column::Column;
pub use constraint::{CheckConstraint, ForeignKey, PrimaryKey, References, UniqueConstraint};
pub use foreign::{ForeignDataWrapper, ForeignServer, ForeignTable, UserMapping};
pub use function::{Aggregate, Function};
pub use index::{Index, IndexKey};
pub use operator::{Operator, OperatorClass, OperatorFamily};
pub use schema::Schema;
pub use sequence::Sequence;
pub use table::Table;
pub use textsearch::{Collation, Conversion, TsConfiguration, TsDictionary, TsParser, TsTemplate};
pub use trigger::{EventTrigger, Rule, Trigger};
pub use types::{BaseType, CompositeType, Domain, EnumType, RangeType, TypeAttribute};
pub use view::{MaterializedView, View, ViewColumn};

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Result;
use crate::ident::{qualname, quote_id, quote_literal};
use crate::key::{ObjectKey, ObjectKind};
use crate::privileges::{diff_privileges, parse_acl, Privilege};

/// Attributes shared by every object kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Owning role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Access privileges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub privileges: Vec<Privilege>,
    /// Comment text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rename sentinel: the name this object had in the current tree.
    #[serde(default, skip_serializing)]
    pub oldname: Option<String>,
    /// Manual dependency hints, as external keys (`"table t1"`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Catalog identifier; catalog-sourced objects only.
    #[serde(default, skip_serializing)]
    pub oid: Option<u32>,
    /// Raw `aclitem[]` as returned by the catalog.
    #[serde(default, skip_serializing)]
    pub acl: Option<Vec<String>>,
}

impl Meta {
    /// Converts a catalog `acl` array into the wire privilege list.
    pub fn absorb_acl(&mut self, kind: ObjectKind) {
        if let Some(acl) = self.acl.take() {
            self.privileges = parse_acl(&acl, kind);
        }
    }
}

/// Outcome of comparing a current object against its desired version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alteration {
    /// The object can be altered in place with these statements (possibly
    /// none).
    Statements(Vec<String>),
    /// The object must be dropped and created again.
    Recreate,
}

impl Default for Alteration {
    fn default() -> Self {
        Self::Statements(Vec::new())
    }
}

/// Capabilities shared by every catalog object kind.
pub trait DbObject: Debug {
    /// Object category.
    fn kind(&self) -> ObjectKind;

    /// Identity tuple within the object's dictionary.
    fn key(&self) -> ObjectKey;

    /// Re-points the object at a different identity (used when comparing a
    /// renamed object, or one whose schema or table was renamed).
    fn set_key(&mut self, key: &ObjectKey);

    /// Attributes shared by all kinds.
    fn meta(&self) -> &Meta;

    /// Mutable access to the shared attributes.
    fn meta_mut(&mut self) -> &mut Meta;

    /// Human-readable, type-tagged wire-format key (`"table t1"`).
    fn extern_key(&self) -> String {
        format!("{} {}", self.kind().extern_tag(), self.key().name)
    }

    /// Schema-qualified name, omitting the default schema.
    fn qualname(&self) -> String {
        let key = self.key();
        key.schema
            .as_deref()
            .map_or_else(|| quote_id(&key.name), |s| qualname(s, &key.name))
    }

    /// The form of the name used after the kind keyword in `DROP`,
    /// `ALTER` and `COMMENT ON`.
    fn identifier(&self) -> String {
        self.qualname()
    }

    /// Statements creating the object, without owner, privileges or
    /// comment.
    fn create_sql(&self, db: &Database) -> Vec<String>;

    /// Statements dropping the object.
    fn drop_sql(&self) -> Vec<String> {
        vec![format!(
            "DROP {} {}",
            self.kind().sql_name(),
            self.identifier()
        )]
    }

    /// Statement renaming the object.
    fn rename_sql(&self, new_name: &str) -> String {
        format!(
            "ALTER {} {} RENAME TO {}",
            self.kind().sql_name(),
            self.identifier(),
            quote_id(new_name)
        )
    }

    /// `COMMENT ON` statement for the current description (`NULL` when
    /// there is none).
    fn comment_sql(&self) -> String {
        comment_statement(
            self.kind(),
            &self.identifier(),
            self.meta().description.as_deref(),
        )
    }

    /// Whether the object kind has an owner that can be altered.
    fn has_owner(&self) -> bool {
        true
    }

    /// Whether the object kind accepts `COMMENT ON`.
    fn has_comment(&self) -> bool {
        true
    }

    /// Dependencies that follow from the object's own structure.
    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let _ = db;
        self.key().schema_key().into_iter().collect()
    }

    /// Compares against the desired version of the same object. Owner,
    /// privilege and comment changes are handled by the caller.
    fn alter_sql(&self, new: &Self, db: &Database) -> Result<Alteration>
    where
        Self: Sized,
    {
        let _ = (new, db);
        Ok(Alteration::default())
    }
}

/// Builds a `COMMENT ON` statement.
#[must_use]
pub fn comment_statement(kind: ObjectKind, ident: &str, description: Option<&str>) -> String {
    format!(
        "COMMENT ON {} {} IS {}",
        kind.sql_name(),
        ident,
        description.map_or_else(|| "NULL".to_string(), quote_literal)
    )
}

/// Owner, privilege and comment statements emitted after `CREATE`.
#[must_use]
pub fn create_extras(obj: &dyn DbObject, no_owner: bool, no_privs: bool) -> Vec<String> {
    let mut stmts = Vec::new();
    let meta = obj.meta();
    if obj.has_owner() && !no_owner {
        if let Some(owner) = &meta.owner {
            stmts.push(owner_statement(obj, owner));
        }
    }
    if !no_privs && !meta.privileges.is_empty() {
        stmts.extend(diff_privileges(
            obj.kind(),
            &obj.identifier(),
            &[],
            &meta.privileges,
        ));
    }
    if obj.has_comment() && meta.description.is_some() {
        stmts.push(obj.comment_sql());
    }
    stmts
}

/// Owner, privilege and comment statements turning `old` into `new`.
#[must_use]
pub fn diff_extras(
    old: &dyn DbObject,
    new: &dyn DbObject,
    no_owner: bool,
    no_privs: bool,
) -> Vec<String> {
    let mut stmts = Vec::new();
    let (before, after) = (old.meta(), new.meta());
    if new.has_owner() && !no_owner {
        if let Some(owner) = &after.owner {
            if before.owner.as_ref() != Some(owner) {
                stmts.push(owner_statement(new, owner));
            }
        }
    }
    if !no_privs {
        stmts.extend(diff_privileges(
            new.kind(),
            &new.identifier(),
            &before.privileges,
            &after.privileges,
        ));
    }
    if new.has_comment() && before.description != after.description {
        stmts.push(new.comment_sql());
    }
    stmts
}

fn owner_statement(obj: &dyn DbObject, owner: &str) -> String {
    format!(
        "ALTER {} {} OWNER TO {}",
        obj.kind().sql_name(),
        obj.identifier(),
        quote_id(owner)
    )
}

/// Renders an option list (`key=value` strings) as `OPTIONS (key 'value')`.
#[must_use]
pub fn options_clause(options: &[String]) -> String {
    let rendered: Vec<String> = options
        .iter()
        .map(|opt| match opt.split_once('=') {
            Some((k, v)) => format!("{} {}", quote_id(k), quote_literal(v)),
            None => quote_id(opt),
        })
        .collect();
    format!("OPTIONS ({})", rendered.join(", "))
}

/// Computes an `OPTIONS (ADD|SET|DROP ...)` clause, or `None` when equal.
#[must_use]
pub fn diff_options(old: &[String], new: &[String]) -> Option<String> {
    fn split(opts: &[String]) -> Vec<(&str, &str)> {
        opts.iter()
            .map(|o| o.split_once('=').unwrap_or((o.as_str(), "")))
            .collect()
    }
    let (before, after) = (split(old), split(new));
    let mut clauses = Vec::new();
    for (k, v) in &after {
        match before.iter().find(|(bk, _)| bk == k) {
            Some((_, bv)) if bv == v => {}
            Some(_) => clauses.push(format!("SET {} {}", quote_id(k), quote_literal(v))),
            None => clauses.push(format!("ADD {} {}", quote_id(k), quote_literal(v))),
        }
    }
    for (k, _) in &before {
        if !after.iter().any(|(ak, _)| ak == k) {
            clauses.push(format!("DROP {}", quote_id(k)));
        }
    }
    if clauses.is_empty() {
        None
    } else {
        Some(format!("OPTIONS ({})", clauses.join(", ")))
    }
}

/// Builtin types that never appear in a dependency graph.
pub(crate) fn is_builtin_type(name: &str) -> bool {
    let base = name.trim_end_matches("[]");
    let base = base.split('(').next().unwrap_or(base).trim();
    matches!(
        base,
        "smallint"
            | "integer"
            | "bigint"
            | "int"
            | "int2"
            | "int4"
            | "int8"
            | "real"
            | "double precision"
            | "float4"
            | "float8"
            | "numeric"
            | "decimal"
            | "money"
            | "text"
            | "character varying"
            | "varchar"
            | "character"
            | "char"
            | "\"char\""
            | "name"
            | "bytea"
            | "boolean"
            | "bool"
            | "date"
            | "time without time zone"
            | "time with time zone"
            | "timestamp without time zone"
            | "timestamp with time zone"
            | "timestamp"
            | "timestamptz"
            | "interval"
            | "uuid"
            | "json"
            | "jsonb"
            | "xml"
            | "inet"
            | "cidr"
            | "macaddr"
            | "oid"
            | "regclass"
            | "regproc"
            | "regtype"
            | "tsvector"
            | "tsquery"
            | "cstring"
            | "internal"
            | "void"
            | "trigger"
            | "event_trigger"
            | "record"
            | "anyelement"
            | "anyarray"
            | "point"
            | "bit"
            | "bit varying"
    )
}

/// Resolves a possibly qualified type name against types and domains in
/// `db`.
pub(crate) fn type_dep(db: &Database, type_name: &str, default_schema: &str) -> Option<ObjectKey> {
    if is_builtin_type(type_name) {
        return None;
    }
    let base = type_name
        .trim_start_matches("SETOF ")
        .trim_end_matches("[]")
        .trim();
    let (schema, name) = crate::ident::split_schema_obj(base, default_schema);
    db.type_key(&schema, &name).or_else(|| {
        (schema != crate::ident::DEFAULT_SCHEMA)
            .then(|| db.type_key(crate::ident::DEFAULT_SCHEMA, &name))
            .flatten()
    })
}

/// Comparison for kinds that cannot be altered in place: any difference
/// outside the shared attributes requires a drop and create.
pub(crate) fn recreate_if_changed<T: PartialEq + Clone + DbObject>(old: &T, new: &T) -> Alteration {
    let mut old = old.clone();
    *old.meta_mut() = new.meta().clone();
    if &old == new {
        Alteration::default()
    } else {
        Alteration::Recreate
    }
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

/// Entries stored on the wire as a list of single-key maps
/// (`- c1: {type: integer}`); the map key fills the `name` field.
pub(crate) trait NamedEntry: Serialize + DeserializeOwned {
    /// Called with the 1-based list position after decoding.
    fn set_position(&mut self, position: i32) {
        let _ = position;
    }
}

/// Serde adapter for [`NamedEntry`] lists.
pub(crate) mod named_list {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_yaml::{Mapping, Value};

    use super::NamedEntry;

    pub fn serialize<S: Serializer, T: NamedEntry>(
        entries: &[T],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut attrs = serde_yaml::to_value(entry).map_err(serde::ser::Error::custom)?;
            let name = match &mut attrs {
                Value::Mapping(map) => map.remove("name"),
                _ => None,
            };
            let Some(name) = name else {
                return Err(serde::ser::Error::custom("list entry without a name"));
            };
            let mut item = Mapping::new();
            item.insert(name, attrs);
            items.push(Value::Mapping(item));
        }
        items.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, T: NamedEntry>(
        deserializer: D,
    ) -> std::result::Result<Vec<T>, D::Error> {
        let items = Vec::<Value>::deserialize(deserializer)?;
        let mut entries = Vec::with_capacity(items.len());
        for (num, item) in items.into_iter().enumerate() {
            let Value::Mapping(map) = item else {
                return Err(D::Error::custom("list entries must be single-key maps"));
            };
            let mut pairs = map.into_iter();
            let (Some((name, attrs)), None) = (pairs.next(), pairs.next()) else {
                return Err(D::Error::custom("list entries must be single-key maps"));
            };
            let name = name
                .as_str()
                .ok_or_else(|| D::Error::custom("entry name must be a string"))?
                .to_string();
            let mut attrs = match attrs {
                Value::Mapping(m) => m,
                Value::Null => Mapping::new(),
                _ => return Err(D::Error::custom(format!("{name}: expected a map"))),
            };
            attrs.insert(Value::from("name"), Value::from(name.clone()));
            let mut entry: T = serde_yaml::from_value(Value::Mapping(attrs))
                .map_err(|e| D::Error::custom(format!("{name}: {e}")))?;
            entry.set_position(i32::try_from(num + 1).unwrap_or(i32::MAX));
            entries.push(entry);
        }
        Ok(entries)
    }
}
