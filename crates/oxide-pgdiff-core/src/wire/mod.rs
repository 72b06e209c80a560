//! YAML wire format.
//!
//! A catalog tree is written as a nested map. Unscoped objects sit at the
//! top level under their external key (`"extension hstore"`,
//! `"cast (smallint AS boolean)"`); schema members are nested in their
//! schema (`"schema public"` → `"table t1"`); table-owned objects are
//! nested in their table by section (`indexes`, `foreign_keys`, ...);
//! servers are nested in their wrapper and user mappings in their server.
//! Identity fields implied by the nesting are left out of the attribute
//! maps and restored on input.

pub mod files;

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::database::{Database, ObjectRef};
use crate::error::{CatalogError, Result};
use crate::key::{ObjectKey, ObjectKind};
use crate::object::DbObject;

pub use files::{read_files, write_files};

/// Per-object keys that describe the object itself rather than a member.
pub const RESERVED_KEYS: [&str; 5] = ["description", "owner", "privileges", "oldname", "depends_on"];

const TOP_LEVEL_KINDS: [ObjectKind; 5] = [
    ObjectKind::Extension,
    ObjectKind::Language,
    ObjectKind::ForeignDataWrapper,
    ObjectKind::EventTrigger,
    ObjectKind::Cast,
];

const SCHEMA_MEMBER_KINDS: [ObjectKind; 18] = [
    ObjectKind::Table,
    ObjectKind::Sequence,
    ObjectKind::View,
    ObjectKind::MaterializedView,
    ObjectKind::ForeignTable,
    ObjectKind::Function,
    ObjectKind::Aggregate,
    ObjectKind::BaseType,
    ObjectKind::Domain,
    ObjectKind::Operator,
    ObjectKind::OperatorClass,
    ObjectKind::OperatorFamily,
    ObjectKind::Conversion,
    ObjectKind::Collation,
    ObjectKind::TsParser,
    ObjectKind::TsTemplate,
    ObjectKind::TsDictionary,
    ObjectKind::TsConfiguration,
];

const SERVER_MAPPINGS: &str = "user mappings";

/// Section of a table (or domain) holding objects of a table-owned kind.
#[must_use]
pub const fn section(kind: ObjectKind) -> Option<&'static str> {
    Some(match kind {
        ObjectKind::CheckConstraint => "check_constraints",
        ObjectKind::PrimaryKey => "primary_key",
        ObjectKind::ForeignKey => "foreign_keys",
        ObjectKind::UniqueConstraint => "unique_constraints",
        ObjectKind::Index => "indexes",
        ObjectKind::Trigger => "triggers",
        ObjectKind::Rule => "rules",
        _ => return None,
    })
}

const SECTIONS: [(&str, ObjectKind); 7] = [
    ("check_constraints", ObjectKind::CheckConstraint),
    ("primary_key", ObjectKind::PrimaryKey),
    ("foreign_keys", ObjectKind::ForeignKey),
    ("unique_constraints", ObjectKind::UniqueConstraint),
    ("indexes", ObjectKind::Index),
    ("triggers", ObjectKind::Trigger),
    ("rules", ObjectKind::Rule),
];

/// Keys a table map may hold besides its sections and [`RESERVED_KEYS`].
const TABLE_ATTRIBUTES: [&str; 9] = [
    "schema",
    "name",
    "columns",
    "inherits",
    "unlogged",
    "options",
    "tablespace",
    "oid",
    "acl",
];

/// Attribute names carried by the nesting rather than by the object's
/// own map.
fn implied_fields(obj: &dyn DbObject) -> Vec<&'static str> {
    let key = obj.key();
    let mut fields = Vec::new();
    match key.kind {
        ObjectKind::Cast => return vec!["source", "target"],
        ObjectKind::UserMapping => return vec!["username", "server"],
        ObjectKind::ForeignServer => fields.push("wrapper"),
        ObjectKind::Function | ObjectKind::Aggregate => fields.push("arguments"),
        ObjectKind::Operator => fields.extend(["leftarg", "rightarg"]),
        ObjectKind::OperatorClass | ObjectKind::OperatorFamily => fields.push("index_method"),
        _ => {}
    }
    fields.push("name");
    if key.schema.is_some() {
        fields.push("schema");
    }
    if key.kind.is_table_owned() {
        fields.push("table");
    }
    fields
}

fn attribute_map(obj: ObjectRef<'_>) -> Result<Mapping> {
    let object = obj.as_object();
    let mut map = match obj.to_value()? {
        Value::Mapping(map) => map,
        _ => return Err(CatalogError::invalid(object.extern_key(), "not a map")),
    };
    for field in implied_fields(object) {
        map.remove(field);
    }
    Ok(map)
}

fn sorted(entries: BTreeMap<String, Value>) -> Value {
    Value::Mapping(
        entries
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect(),
    )
}

/// Serializes a tree to the nested wire map, keys sorted at every level.
pub fn to_map(db: &Database) -> Result<Mapping> {
    // table-owned objects by (schema, owner name), then section, then name
    let mut owned: BTreeMap<(String, String), BTreeMap<&str, BTreeMap<String, Value>>> =
        BTreeMap::new();
    let mut members: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
    let mut top: BTreeMap<String, Value> = BTreeMap::new();

    for obj in db.objects() {
        let object = obj.as_object();
        let key = object.key();
        if let Some(section) = section(key.kind) {
            let (Some(schema), Some(parent)) = (key.schema.clone(), key.parent.clone()) else {
                continue;
            };
            owned
                .entry((schema, parent))
                .or_default()
                .entry(section)
                .or_default()
                .insert(key.name.clone(), Value::Mapping(attribute_map(obj)?));
        }
    }

    for obj in db.objects() {
        let object = obj.as_object();
        let key = object.key();
        if key.kind.is_table_owned() {
            continue;
        }
        let mut map = attribute_map(obj)?;
        if matches!(
            key.kind,
            ObjectKind::Table
                | ObjectKind::View
                | ObjectKind::MaterializedView
                | ObjectKind::ForeignTable
                | ObjectKind::Domain
        ) {
            let owner = (key.schema.clone().unwrap_or_default(), key.name.clone());
            if let Some(sections) = owned.remove(&owner) {
                for (section, entries) in sections {
                    map.insert(Value::from(section), sorted(entries));
                }
            }
        }
        match key.kind {
            ObjectKind::Schema => {
                members.entry(key.name.clone()).or_default();
                top.insert(object.extern_key(), Value::Mapping(map));
            }
            ObjectKind::ForeignServer | ObjectKind::UserMapping => {}
            _ => match &key.schema {
                Some(schema) => {
                    members
                        .entry(schema.clone())
                        .or_default()
                        .insert(object.extern_key(), Value::Mapping(map));
                }
                None => {
                    top.insert(object.extern_key(), Value::Mapping(map));
                }
            },
        }
    }

    for wrapper in db.wrappers.values() {
        let Some(Value::Mapping(wrapper_map)) = top.get_mut(&wrapper.extern_key()) else {
            continue;
        };
        for server in db.servers.values().filter(|s| s.wrapper == wrapper.name) {
            let mut server_map = attribute_map(ObjectRef::ForeignServer(server))?;
            let mappings: BTreeMap<String, Value> = db
                .user_mappings
                .values()
                .filter(|um| um.server == server.name)
                .map(|um| {
                    Ok((
                        um.username.clone(),
                        Value::Mapping(attribute_map(ObjectRef::UserMapping(um))?),
                    ))
                })
                .collect::<Result<_>>()?;
            if !mappings.is_empty() {
                server_map.insert(Value::from(SERVER_MAPPINGS), sorted(mappings));
            }
            wrapper_map.insert(
                Value::from(server.extern_key()),
                Value::Mapping(server_map),
            );
        }
    }

    for (schema, entries) in members {
        let schema_key = format!("schema {schema}");
        if let Some(Value::Mapping(map)) = top.get_mut(&schema_key) {
            for (k, v) in entries {
                map.insert(Value::String(k), v);
            }
        }
    }
    let out = match sorted(top) {
        Value::Mapping(map) => map,
        _ => Mapping::new(),
    };
    debug!(entries = out.len(), "serialized tree");
    Ok(out)
}

/// Splits `"<tag> <rest>"` for the longest tag among `kinds`.
fn split_tag(key: &str, kinds: &[ObjectKind]) -> Option<(ObjectKind, String)> {
    kinds
        .iter()
        .filter(|kind| {
            let tag = kind.extern_tag();
            key.len() > tag.len() && key.starts_with(tag) && key.as_bytes()[tag.len()] == b' '
        })
        .max_by_key(|kind| kind.extern_tag().len())
        .map(|kind| (*kind, key[kind.extern_tag().len() + 1..].trim().to_string()))
}

fn key_str<'a>(key: &'a Value, scope: &str) -> Result<&'a str> {
    key.as_str().ok_or_else(|| CatalogError::UnrecognizedKey {
        scope: scope.to_string(),
        key: format!("{key:?}"),
    })
}

fn into_map(object: &str, value: Value) -> Result<Mapping> {
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(CatalogError::invalid(object, "expected a map of attributes")),
    }
}

fn set(map: &mut Mapping, field: &str, value: impl Into<String>) {
    map.insert(Value::from(field), Value::String(value.into()));
}

/// Splits `name(args)` into the name and the argument list.
fn split_signature(object: &str, rest: &str) -> Result<(String, String)> {
    match (rest.find('('), rest.rfind(')')) {
        (Some(open), Some(close)) if close > open => Ok((
            rest[..open].trim().to_string(),
            rest[open + 1..close].trim().to_string(),
        )),
        _ => Err(CatalogError::invalid(object, "expected an argument list")),
    }
}

/// Splits a cast key body `(source AS target)`.
fn split_cast(object: &str, rest: &str) -> Result<(String, String)> {
    let inner = rest
        .trim()
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| CatalogError::invalid(object, "expected (source AS target)"))?;
    let lower = inner.to_lowercase();
    let pos = lower
        .find(" as ")
        .ok_or_else(|| CatalogError::invalid(object, "expected (source AS target)"))?;
    Ok((
        inner[..pos].trim().to_string(),
        inner[pos + 4..].trim().to_string(),
    ))
}

/// Builds a tree from a wire map, validating every key's type tag and
/// the cross-references between objects.
pub fn from_map(input: &Mapping) -> Result<Database> {
    let mut db = Database::new();
    for (key, value) in input {
        let key = key_str(key, "top level")?;
        if let Some(name) = key.strip_prefix("schema ") {
            load_schema(&mut db, name.trim(), key, value.clone())?;
            continue;
        }
        match split_tag(key, &TOP_LEVEL_KINDS) {
            Some((ObjectKind::Cast, rest)) => {
                let (source, target) = split_cast(key, &rest)?;
                let mut map = into_map(key, value.clone())?;
                set(&mut map, "source", source);
                set(&mut map, "target", target);
                insert(&mut db, ObjectKind::Cast, key, map)?;
            }
            Some((ObjectKind::ForeignDataWrapper, name)) => {
                load_wrapper(&mut db, &name, key, value.clone())?;
            }
            Some((kind, name)) => {
                let mut map = into_map(key, value.clone())?;
                set(&mut map, "name", name);
                insert(&mut db, kind, key, map)?;
            }
            None => {
                return Err(CatalogError::UnrecognizedKey {
                    scope: "top level".to_string(),
                    key: key.to_string(),
                })
            }
        }
    }
    for seq in db.sequences.values_mut() {
        seq.normalize();
    }
    db.link()?;
    debug!(objects = db.object_count(), "loaded tree from map");
    Ok(db)
}

fn insert(db: &mut Database, kind: ObjectKind, object: &str, mut map: Mapping) -> Result<ObjectKey> {
    // catalog identifiers never come from the wire
    map.remove("oid");
    map.remove("acl");
    db.insert_value(kind, object, Value::Mapping(map))
}

fn load_schema(db: &mut Database, schema: &str, object: &str, value: Value) -> Result<()> {
    let scope = format!("schema {schema}");
    let mut attrs = Mapping::new();
    let mut entries = Vec::new();
    for (key, value) in into_map(object, value)? {
        let name = key_str(&key, &scope)?;
        if RESERVED_KEYS.contains(&name) {
            attrs.insert(key.clone(), value);
        } else {
            entries.push((name.to_string(), value));
        }
    }
    set(&mut attrs, "name", schema);
    insert(db, ObjectKind::Schema, object, attrs)?;

    for (key, value) in entries {
        let Some((kind, rest)) = split_tag(&key, &SCHEMA_MEMBER_KINDS) else {
            return Err(CatalogError::UnrecognizedKey { scope, key });
        };
        let mut map = into_map(&key, value)?;
        set(&mut map, "schema", schema);
        let kind = match kind {
            ObjectKind::BaseType => type_kind(&key, &map)?,
            ObjectKind::Function | ObjectKind::Aggregate => {
                let (name, args) = split_signature(&key, &rest)?;
                set(&mut map, "name", name);
                set(&mut map, "arguments", args);
                kind
            }
            ObjectKind::Operator => {
                let (name, args) = split_signature(&key, &rest)?;
                let (left, right) = args
                    .split_once(',')
                    .ok_or_else(|| CatalogError::invalid(key.as_str(), "expected (left, right)"))?;
                set(&mut map, "name", name);
                for (field, arg) in [("leftarg", left.trim()), ("rightarg", right.trim())] {
                    if !arg.eq_ignore_ascii_case("none") {
                        set(&mut map, field, arg);
                    }
                }
                kind
            }
            ObjectKind::OperatorClass | ObjectKind::OperatorFamily => {
                let (name, method) = rest.rsplit_once(" using ").ok_or_else(|| {
                    CatalogError::invalid(key.as_str(), "expected <name> using <method>")
                })?;
                set(&mut map, "name", name.trim());
                set(&mut map, "index_method", method.trim());
                kind
            }
            _ => kind,
        };
        if !matches!(
            kind,
            ObjectKind::Function | ObjectKind::Aggregate | ObjectKind::Operator
                | ObjectKind::OperatorClass | ObjectKind::OperatorFamily
        ) {
            set(&mut map, "name", rest.as_str());
        }
        if matches!(kind, ObjectKind::Table | ObjectKind::ForeignTable)
            && !map.contains_key("columns")
        {
            return Err(CatalogError::missing(key, "columns"));
        }
        let sections = take_sections(&mut map);
        if kind == ObjectKind::Table {
            check_table_keys(&key, &map)?;
        }
        let owner = map
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        insert(db, kind, &key, map)?;
        load_sections(db, schema, &owner, kind == ObjectKind::Domain, sections)?;
    }
    Ok(())
}

/// Tells the four `type` kinds apart by their defining attribute.
fn type_kind(object: &str, map: &Mapping) -> Result<ObjectKind> {
    for (field, kind) in [
        ("input", ObjectKind::BaseType),
        ("attributes", ObjectKind::CompositeType),
        ("labels", ObjectKind::EnumType),
        ("subtype", ObjectKind::RangeType),
    ] {
        if map.contains_key(field) {
            return Ok(kind);
        }
    }
    Err(CatalogError::missing(object, "input, attributes, labels or subtype"))
}

fn take_sections(map: &mut Mapping) -> Vec<(ObjectKind, Value)> {
    SECTIONS
        .iter()
        .filter_map(|(section, kind)| map.remove(*section).map(|value| (*kind, value)))
        .collect()
}

/// Rejects table entries that are neither attributes nor sections, such
/// as a misspelled `indexs:`.
fn check_table_keys(object: &str, map: &Mapping) -> Result<()> {
    for key in map.keys() {
        let key = key_str(key, object)?;
        if !TABLE_ATTRIBUTES.contains(&key) && !RESERVED_KEYS.contains(&key) {
            return Err(CatalogError::UnrecognizedKey {
                scope: object.to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

fn load_sections(
    db: &mut Database,
    schema: &str,
    owner: &str,
    on_domain: bool,
    sections: Vec<(ObjectKind, Value)>,
) -> Result<()> {
    for (kind, value) in sections {
        let object = format!("{} {owner}", ObjectKind::Table.extern_tag());
        for (name, attrs) in into_map(&object, value)? {
            let name = key_str(&name, &object)?.to_string();
            let extern_key = format!("{} {name}", kind.extern_tag());
            let mut map = into_map(&extern_key, attrs)?;
            set(&mut map, "schema", schema);
            set(&mut map, "table", owner);
            set(&mut map, "name", name);
            if on_domain && kind == ObjectKind::CheckConstraint {
                map.insert(Value::from("on_domain"), Value::Bool(true));
            }
            insert(db, kind, &extern_key, map)?;
        }
    }
    Ok(())
}

fn load_wrapper(db: &mut Database, name: &str, object: &str, value: Value) -> Result<()> {
    let mut attrs = Mapping::new();
    let mut servers = Vec::new();
    for (key, value) in into_map(object, value)? {
        match key.as_str().and_then(|k| k.strip_prefix("server ")) {
            Some(server) => servers.push((server.trim().to_string(), value)),
            None => {
                attrs.insert(key, value);
            }
        }
    }
    set(&mut attrs, "name", name);
    insert(db, ObjectKind::ForeignDataWrapper, object, attrs)?;

    for (server, value) in servers {
        let extern_key = format!("server {server}");
        let mut map = into_map(&extern_key, value)?;
        let mappings = map.remove(SERVER_MAPPINGS);
        set(&mut map, "name", server.as_str());
        set(&mut map, "wrapper", name);
        insert(db, ObjectKind::ForeignServer, &extern_key, map)?;
        let Some(mappings) = mappings else {
            continue;
        };
        for (user, attrs) in into_map(&extern_key, mappings)? {
            let user = key_str(&user, &extern_key)?.to_string();
            let mapping_key = format!("user mapping for {user} server {server}");
            let mut map = into_map(&mapping_key, attrs)?;
            set(&mut map, "username", user);
            set(&mut map, "server", server.as_str());
            insert(db, ObjectKind::UserMapping, &mapping_key, map)?;
        }
    }
    Ok(())
}

/// Parses a YAML document into a tree.
pub fn from_yaml(text: &str) -> Result<Database> {
    let map: Mapping = serde_yaml::from_str(text)?;
    from_map(&map)
}

/// Serializes a tree as a YAML document.
pub fn to_yaml(db: &Database) -> Result<String> {
    Ok(serde_yaml::to_string(&to_map(db)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
schema public:
  description: standard public schema
  owner: postgres
  table t1:
    columns:
    - c1:
        type: integer
        not_null: true
    - c2:
        type: text
    primary_key:
      t1_pkey:
        columns:
        - c1
    indexes:
      t1_c2_idx:
        keys:
        - c2
  function f1(integer):
    language: sql
    returns: integer
    source: SELECT $1
  operator +(integer, NONE):
    procedure: int4up
  operator class c1 using btree:
    type: integer
    operators:
    - 1 <
  domain d1:
    type: integer
    check_constraints:
      d1_check:
        expression: VALUE > 0
  type mood:
    labels:
    - sad
    - happy
extension hstore:
  schema: public
cast (smallint AS boolean):
  function: int2_bool(smallint)
  context: explicit
  method: function
foreign data wrapper fdw1:
  server srv1:
    options:
    - host=localhost
    user mappings:
      PUBLIC:
        options:
        - user=guest
";

    fn sample_map() -> Mapping {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_from_map_restores_keys() {
        let db = from_map(&sample_map()).unwrap();
        assert!(db
            .functions
            .contains_key(&ObjectKey::scoped(ObjectKind::Function, "public", "f1").with_signature("integer")));
        let op = db.operators.values().next().unwrap();
        assert_eq!(op.leftarg.as_deref(), Some("integer"));
        assert_eq!(op.rightarg, None);
        assert_eq!(db.operator_classes.values().next().unwrap().index_method, "btree");
        assert_eq!(db.enum_types.len(), 1);
        let check = db.check_constraints.values().next().unwrap();
        assert!(check.on_domain);
        assert_eq!(check.table, "d1");
        let cast = db.casts.values().next().unwrap();
        assert_eq!((cast.source.as_str(), cast.target.as_str()), ("smallint", "boolean"));
        let mapping = db.user_mappings.values().next().unwrap();
        assert_eq!((mapping.username.as_str(), mapping.server.as_str()), ("PUBLIC", "srv1"));
    }

    #[test]
    fn test_round_trip() {
        let map = sample_map();
        let db = from_map(&map).unwrap();
        assert_eq!(to_map(&db).unwrap(), map);
    }

    #[test]
    fn test_unrecognized_key() {
        let map: Mapping = serde_yaml::from_str("schema public:\n  tabel t1:\n    columns: []\n").unwrap();
        match from_map(&map) {
            Err(CatalogError::UnrecognizedKey { scope, key }) => {
                assert_eq!(scope, "schema public");
                assert_eq!(key, "tabel t1");
            }
            other => panic!("expected unrecognized key, got {other:?}"),
        }
        let map: Mapping = serde_yaml::from_str("sequence s1: {}\n").unwrap();
        assert!(matches!(
            from_map(&map),
            Err(CatalogError::UnrecognizedKey { ref scope, .. }) if scope == "top level"
        ));
    }

    #[test]
    fn test_table_without_columns() {
        let map: Mapping = serde_yaml::from_str("schema public:\n  table t1:\n    owner: a\n").unwrap();
        assert!(matches!(
            from_map(&map),
            Err(CatalogError::MissingAttribute { ref attribute, .. }) if attribute == "columns"
        ));
    }

    #[test]
    fn test_column_without_type() {
        let map: Mapping =
            serde_yaml::from_str("schema public:\n  table t1:\n    columns:\n    - c1: {}\n").unwrap();
        assert!(from_map(&map).is_err());
    }

    #[test]
    fn test_misspelled_table_section() {
        let yaml = "schema public:\n  table t1:\n    columns:\n    - c1:\n        type: integer\n    indexs:\n      t1_idx:\n        keys:\n        - c1\n";
        let map: Mapping = serde_yaml::from_str(yaml).unwrap();
        match from_map(&map) {
            Err(CatalogError::UnrecognizedKey { scope, key }) => {
                assert_eq!(scope, "table t1");
                assert_eq!(key, "indexs");
            }
            other => panic!("expected unrecognized key, got {other:?}"),
        }
    }

    #[test]
    fn test_implicit_sequence_bounds_dropped() {
        let yaml = "schema public:\n  sequence s1:\n    start_value: 1\n    max_value: 9223372036854775807\n    min_value: 1\n";
        let db = from_map(&serde_yaml::from_str(yaml).unwrap()).unwrap();
        let seq = db.sequences.values().next().unwrap();
        assert_eq!((seq.max_value, seq.min_value), (None, None));
        let out = to_map(&db).unwrap();
        let attrs = &out["schema public"]["sequence s1"];
        assert!(attrs.get("max_value").is_none());
        assert!(attrs.get("min_value").is_none());
    }

    #[test]
    fn test_oid_ignored_on_input() {
        let map: Mapping = serde_yaml::from_str("extension e1:\n  oid: 16384\n").unwrap();
        let db = from_map(&map).unwrap();
        assert_eq!(db.extensions.values().next().unwrap().meta.oid, None);
    }
}
