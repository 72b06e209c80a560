//! Loading a catalog tree from a live database.
//!
//! The core crate does not talk to PostgreSQL itself. A driver implements
//! [`CatalogSource`] by running the queries from [`queries`] and handing
//! back the rows, each a JSON object encoded as text.

pub mod queries;

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::database::Database;
use crate::dict::ObjectDict;
use crate::error::{CatalogError, Result};
use crate::key::{ObjectKey, ObjectKind};
use crate::object::Column;

pub use queries::MIN_SERVER_VERSION;

/// A database that can answer catalog queries.
///
/// Implementations live in driver crates; tests use canned rows.
pub trait CatalogSource {
    /// `server_version_num` of the connected server.
    fn server_version(&self) -> u32;

    /// Runs `query` and returns its single text column, one entry per
    /// row.
    fn fetch(&self, query: &str) -> Result<Vec<String>>;
}

/// The queries [`Database::from_catalog`] will issue against a server of
/// `version`, for drivers that prefetch them.
#[must_use]
pub fn required_queries(version: u32) -> Vec<String> {
    queries::all(version)
}

#[derive(Deserialize)]
struct ColumnRow {
    schema: String,
    table: String,
    #[serde(flatten)]
    column: Column,
}

#[derive(Deserialize)]
struct DependencyRow {
    catalog: String,
    oid: u32,
    ref_catalog: String,
    ref_oid: u32,
}

#[derive(Deserialize)]
struct ViewRow {
    oid: u32,
    action: String,
}

#[derive(Deserialize)]
struct DefaultRow {
    oid: u32,
    ref_catalog: String,
    ref_oid: u32,
}

fn relid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":relid (\d+)").expect("valid regex"))
}

fn funcid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":funcid (\d+)").expect("valid regex"))
}

fn decode_rows<T: for<'de> Deserialize<'de>>(what: &str, rows: &[String]) -> Result<Vec<T>> {
    rows.iter()
        .map(|row| {
            serde_json::from_str(row).map_err(|source| CatalogError::Row {
                kind: what.to_string(),
                source,
            })
        })
        .collect()
}

fn fetch_kind(
    source: &dyn CatalogSource,
    kind: ObjectKind,
    version: u32,
) -> Result<Vec<String>> {
    match queries::object_query(kind, version) {
        Some(query) => {
            let rows = source.fetch(&query)?;
            debug!(kind = %kind, rows = rows.len(), "fetched catalog rows");
            Ok(rows)
        }
        None => Ok(Vec::new()),
    }
}

macro_rules! load_dicts {
    ($db:ident, $source:ident, $version:ident, { $($kind:ident => $field:ident),* $(,)? }) => {
        $(
            $db.$field = ObjectDict::from_rows(
                ObjectKind::$kind,
                &fetch_kind($source, ObjectKind::$kind, $version)?,
            )?;
        )*
    };
}

impl Database {
    /// Reads every user-defined object from `source`.
    ///
    /// Objects in system schemas and objects belonging to extensions are
    /// skipped. Dependencies recorded by the server are attached as
    /// [`Database::catalog_deps`].
    pub fn from_catalog(source: &dyn CatalogSource) -> Result<Self> {
        let version = source.server_version();
        if version < MIN_SERVER_VERSION {
            return Err(CatalogError::Source(format!(
                "server version {version} is not supported (minimum {MIN_SERVER_VERSION})"
            )));
        }
        info!(server_version = version, "Loading catalog");

        let mut db = Self::new();
        load_dicts!(db, source, version, {
            Schema => schemas,
            Extension => extensions,
            Language => languages,
            ForeignDataWrapper => wrappers,
            ForeignServer => servers,
            UserMapping => user_mappings,
            Collation => collations,
            Conversion => conversions,
            BaseType => base_types,
            CompositeType => composite_types,
            EnumType => enum_types,
            RangeType => range_types,
            Domain => domains,
            Function => functions,
            Aggregate => aggregates,
            Operator => operators,
            OperatorFamily => operator_families,
            OperatorClass => operator_classes,
            Cast => casts,
            TsParser => ts_parsers,
            TsTemplate => ts_templates,
            TsDictionary => ts_dictionaries,
            TsConfiguration => ts_configurations,
            Sequence => sequences,
            Table => tables,
            ForeignTable => foreign_tables,
            CheckConstraint => check_constraints,
            PrimaryKey => primary_keys,
            UniqueConstraint => unique_constraints,
            Index => indexes,
            ForeignKey => foreign_keys,
            View => views,
            MaterializedView => materialized_views,
            Trigger => triggers,
            Rule => rules,
            EventTrigger => event_triggers,
        });

        for seq in db.sequences.values_mut() {
            seq.normalize();
        }
        for rule in db.rules.values_mut() {
            rule.absorb_definition()?;
        }
        db.attach_columns(&source.fetch(&queries::columns())?)?;
        db.attach_dependencies(&source.fetch(&queries::dependencies())?)?;
        db.attach_view_dependencies(&source.fetch(&queries::view_dependencies())?)?;
        db.attach_default_dependencies(&source.fetch(&queries::default_dependencies())?)?;
        db.link()?;

        info!(
            objects = db.object_count(),
            schemas = db.schemas.len(),
            tables = db.tables.len(),
            functions = db.functions.len(),
            "Catalog loaded"
        );
        Ok(db)
    }

    fn attach_columns(&mut self, rows: &[String]) -> Result<()> {
        let mut rows: Vec<ColumnRow> = decode_rows("column", rows)?;
        rows.sort_by_key(|row| row.column.number);
        for row in rows {
            let key = ObjectKey::scoped(ObjectKind::Table, row.schema.as_str(), row.table.as_str());
            if let Some(table) = self.tables.get_mut(&key) {
                table.columns.push(row.column);
                continue;
            }
            let key = ObjectKey::scoped(ObjectKind::ForeignTable, row.schema, row.table);
            match self.foreign_tables.get_mut(&key) {
                Some(table) => table.columns.push(row.column),
                None => trace!(relation = %key, "column of a skipped relation"),
            }
        }
        Ok(())
    }

    fn add_catalog_dep(&mut self, dependent: ObjectKey, dependency: ObjectKey) {
        if dependent != dependency {
            self.catalog_deps
                .entry(dependent)
                .or_default()
                .insert(dependency);
        }
    }

    fn attach_dependencies(&mut self, rows: &[String]) -> Result<()> {
        let rows: Vec<DependencyRow> = decode_rows("dependency", rows)?;
        for row in rows {
            let resolved = (
                self.lookup_oid(&row.catalog, row.oid),
                self.lookup_oid(&row.ref_catalog, row.ref_oid),
            );
            match resolved {
                (Some(dependent), Some(dependency)) => self.add_catalog_dep(dependent, dependency),
                _ => trace!(
                    catalog = %row.catalog,
                    oid = row.oid,
                    ref_catalog = %row.ref_catalog,
                    ref_oid = row.ref_oid,
                    "unresolved dependency"
                ),
            }
        }
        Ok(())
    }

    /// Views record their dependencies on their rewrite rule; the
    /// referenced relations and functions are read from the rule's node
    /// tree.
    fn attach_view_dependencies(&mut self, rows: &[String]) -> Result<()> {
        let rows: Vec<ViewRow> = decode_rows("view dependency", rows)?;
        for row in rows {
            let Some(view) = self.lookup_oid("pg_class", row.oid) else {
                continue;
            };
            let mut found: BTreeSet<ObjectKey> = BTreeSet::new();
            for (re, catalog) in [(relid_re(), "pg_class"), (funcid_re(), "pg_proc")] {
                for caps in re.captures_iter(&row.action) {
                    let Ok(oid) = caps[1].parse::<u32>() else {
                        continue;
                    };
                    if let Some(dep) = self.lookup_oid(catalog, oid) {
                        found.insert(dep);
                    }
                }
            }
            for dep in found {
                trace!(view = %view, dependency = %dep, "view dependency");
                self.add_catalog_dep(view.clone(), dep);
            }
        }
        Ok(())
    }

    fn attach_default_dependencies(&mut self, rows: &[String]) -> Result<()> {
        let rows: Vec<DefaultRow> = decode_rows("default dependency", rows)?;
        for row in rows {
            let resolved = (
                self.lookup_oid("pg_class", row.oid),
                self.lookup_oid(&row.ref_catalog, row.ref_oid),
            );
            if let (Some(table), Some(dependency)) = resolved {
                // a serial column's own sequence is owned by the table
                if dependency.kind == ObjectKind::Sequence
                    && self
                        .sequences
                        .get(&dependency)
                        .and_then(|seq| seq.owner_table.as_deref())
                        == Some(table.name.as_str())
                {
                    continue;
                }
                self.add_catalog_dep(table, dependency);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Answers queries by matching a distinctive fragment of their text.
    struct FakeSource {
        version: u32,
        rows: HashMap<&'static str, Vec<String>>,
    }

    impl FakeSource {
        fn new(version: u32) -> Self {
            Self {
                version,
                rows: HashMap::new(),
            }
        }

        fn rows(mut self, kind: &'static str, rows: &[&str]) -> Self {
            self.rows
                .insert(kind, rows.iter().map(ToString::to_string).collect());
            self
        }
    }

    impl CatalogSource for FakeSource {
        fn server_version(&self) -> u32 {
            self.version
        }

        fn fetch(&self, query: &str) -> Result<Vec<String>> {
            let table = if query.contains("FROM pg_namespace n\n") {
                "schema"
            } else if query.contains("c.relkind IN ('r', 'p') AND") {
                "table"
            } else if query.contains("FROM pg_attribute a JOIN pg_class c") {
                "column"
            } else if query.contains("co.contype = 'p'") {
                "primary key"
            } else if query.contains("c.relkind = 'v'") {
                "view"
            } else if query.contains("r.ev_action::text AS action") {
                "view dependency"
            } else if query.contains("FROM pg_depend d\n") {
                "dependency"
            } else {
                ""
            };
            Ok(self.rows.get(table).cloned().unwrap_or_default())
        }
    }

    fn sample_source() -> FakeSource {
        FakeSource::new(160_000)
            .rows(
                "schema",
                &[r#"{"oid": 2200, "name": "public", "owner": "postgres"}"#],
            )
            .rows(
                "table",
                &[
                    r#"{"oid": 16390, "schema": "public", "name": "t1", "owner": "alice"}"#,
                    r#"{"oid": 16400, "schema": "public", "name": "t2"}"#,
                ],
            )
            .rows(
                "column",
                &[
                    r#"{"schema": "public", "table": "t1", "number": 2, "name": "c2", "type": "text"}"#,
                    r#"{"schema": "public", "table": "t1", "number": 1, "name": "c1", "type": "integer", "not_null": true}"#,
                    r#"{"schema": "public", "table": "t2", "number": 1, "name": "c1", "type": "integer"}"#,
                ],
            )
            .rows(
                "primary key",
                &[r#"{"oid": 16395, "schema": "public", "table": "t1", "name": "t1_pkey", "columns": ["c1"]}"#],
            )
            .rows(
                "view",
                &[r#"{"oid": 16410, "schema": "public", "name": "v1", "definition": " SELECT c1 FROM t1;"}"#],
            )
            .rows(
                "view dependency",
                &[r#"{"oid": 16410, "action": "({QUERY :commandType 1 :rtable ({RTE :relid 16390 :relkind r})})"}"#],
            )
            .rows(
                "dependency",
                &[r#"{"catalog": "pg_class", "oid": 16400, "ref_catalog": "pg_class", "ref_oid": 16390}"#],
            )
    }

    #[test]
    fn test_from_catalog_loads_objects() {
        let db = Database::from_catalog(&sample_source()).unwrap();
        assert_eq!(db.schemas.len(), 1);
        assert_eq!(db.tables.len(), 2);
        let t1 = db
            .tables
            .get(&ObjectKey::scoped(ObjectKind::Table, "public", "t1"))
            .unwrap();
        let names: Vec<&str> = t1.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c1", "c2"]);
        assert!(t1.columns[0].not_null);
        assert_eq!(t1.meta.owner.as_deref(), Some("alice"));
        assert_eq!(db.primary_keys.len(), 1);
    }

    #[test]
    fn test_from_catalog_records_dependencies() {
        let db = Database::from_catalog(&sample_source()).unwrap();
        let t1 = ObjectKey::scoped(ObjectKind::Table, "public", "t1");
        let t2 = ObjectKey::scoped(ObjectKind::Table, "public", "t2");
        let v1 = ObjectKey::scoped(ObjectKind::View, "public", "v1");
        assert!(db.catalog_deps[&t2].contains(&t1));
        assert!(db.catalog_deps[&v1].contains(&t1));
    }

    #[test]
    fn test_old_server_rejected() {
        let err = Database::from_catalog(&FakeSource::new(90_600)).unwrap_err();
        assert!(matches!(err, CatalogError::Source(ref msg) if msg.contains("not supported")));
    }

    #[test]
    fn test_bad_row_reported() {
        let source = FakeSource::new(160_000).rows("schema", &[r#"{"oid": "x"}"#]);
        let err = Database::from_catalog(&source).unwrap_err();
        assert!(matches!(err, CatalogError::Row { .. }));
    }

    #[test]
    fn test_required_queries_cover_every_kind() {
        let queries = required_queries(160_000);
        assert_eq!(queries.len(), ObjectKind::ALL.len() - 1 + 4);
    }
}
