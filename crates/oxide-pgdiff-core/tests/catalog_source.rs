//! Loading trees through a canned `CatalogSource` and diffing them
//! against YAML.

mod common;

use std::collections::HashMap;

use common::{map, tree};
use oxide_pgdiff_core::catalog::queries;
use oxide_pgdiff_core::wire::{from_map, to_map};
use oxide_pgdiff_core::{diff, CatalogSource, Database, DiffOptions, ObjectKind, Result};

const VERSION: u32 = 150_000;

/// Answers each query with the rows registered for its exact text.
struct CannedSource {
    rows: HashMap<String, Vec<String>>,
}

impl CannedSource {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    fn kind(self, kind: ObjectKind, rows: &[&str]) -> Self {
        let query = queries::object_query(kind, VERSION).expect("kind has a query");
        self.query(query, rows)
    }

    fn query(mut self, query: String, rows: &[&str]) -> Self {
        self.rows
            .insert(query, rows.iter().map(ToString::to_string).collect());
        self
    }
}

impl CatalogSource for CannedSource {
    fn server_version(&self) -> u32 {
        VERSION
    }

    fn fetch(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.rows.get(query).cloned().unwrap_or_default())
    }
}

fn source() -> CannedSource {
    CannedSource::new()
        .kind(
            ObjectKind::Schema,
            &[r#"{"oid": 2200, "name": "public", "owner": "postgres", "description": "standard public schema"}"#],
        )
        .kind(
            ObjectKind::Table,
            &[
                r#"{"oid": 16390, "schema": "public", "name": "t1", "owner": "alice"}"#,
                r#"{"oid": 16400, "schema": "public", "name": "t2", "owner": "alice"}"#,
            ],
        )
        .kind(
            ObjectKind::PrimaryKey,
            &[r#"{"oid": 16395, "schema": "public", "table": "t1", "name": "t1_pkey", "columns": ["c1"]}"#],
        )
        .kind(
            ObjectKind::ForeignKey,
            &[r#"{"oid": 16405, "schema": "public", "table": "t2", "name": "t2_t1_fk", "columns": ["t1_id"], "references": {"table": "t1", "columns": ["c1"]}}"#],
        )
        .query(
            queries::columns(),
            &[
                r#"{"schema": "public", "table": "t1", "number": 2, "name": "c2", "type": "text"}"#,
                r#"{"schema": "public", "table": "t1", "number": 1, "name": "c1", "type": "integer", "not_null": true}"#,
                r#"{"schema": "public", "table": "t2", "number": 1, "name": "id", "type": "integer", "not_null": true}"#,
                r#"{"schema": "public", "table": "t2", "number": 2, "name": "t1_id", "type": "integer"}"#,
            ],
        )
        .query(
            queries::dependencies(),
            &[
                r#"{"catalog": "pg_constraint", "oid": 16405, "ref_catalog": "pg_class", "ref_oid": 16390}"#,
                r#"{"catalog": "pg_constraint", "oid": 16405, "ref_catalog": "pg_constraint", "ref_oid": 16395}"#,
            ],
        )
}

const DESIRED: &str = r"
schema public:
  description: standard public schema
  owner: postgres
  table t1:
    columns:
    - c1:
        not_null: true
        type: integer
    - c2:
        type: text
    owner: alice
    primary_key:
      t1_pkey:
        columns:
        - c1
  table t2:
    columns:
    - id:
        not_null: true
        type: integer
    - t1_id:
        type: integer
    foreign_keys:
      t2_t1_fk:
        columns:
        - t1_id
        references:
          columns:
          - c1
          table: t1
    owner: alice
";

#[test]
fn catalog_tree_dumps_like_yaml() {
    let db = Database::from_catalog(&source()).unwrap();
    assert_eq!(to_map(&db).unwrap(), map(DESIRED));
}

#[test]
fn catalog_tree_matches_yaml_tree() {
    let current = Database::from_catalog(&source()).unwrap();
    let stmts = diff(&current, &tree(DESIRED), DiffOptions::new()).unwrap();
    assert!(stmts.is_empty(), "unexpected statements: {stmts:#?}");
}

#[test]
fn catalog_tree_diffs_against_changed_yaml() {
    let current = Database::from_catalog(&source()).unwrap();
    let desired = DESIRED
        .replace("    owner: alice\n    primary_key:", "    owner: bob\n    primary_key:")
        .replace(
            "    - c2:\n        type: text\n",
            "    - c2:\n        type: text\n    - c3:\n        type: date\n",
        );
    let stmts = diff(&current, &tree(&desired), DiffOptions::new()).unwrap();
    assert_eq!(
        stmts,
        vec![
            "ALTER TABLE t1 ADD COLUMN c3 date",
            "ALTER TABLE t1 OWNER TO bob",
        ]
    );
    let stmts = diff(
        &current,
        &tree(&desired),
        DiffOptions::new().without_owner(),
    )
    .unwrap();
    assert_eq!(stmts, vec!["ALTER TABLE t1 ADD COLUMN c3 date"]);
}

#[test]
fn foreign_key_dropped_before_its_target() {
    let current = Database::from_catalog(&source()).unwrap();
    let desired = DESIRED.replace(
        "    primary_key:\n      t1_pkey:\n        columns:\n        - c1\n",
        "",
    );
    let desired = desired[..desired.find("  table t2:").unwrap()].to_string();
    let stmts = diff(&current, &from_map(&map(&desired)).unwrap(), DiffOptions::new()).unwrap();
    let fk = stmts
        .iter()
        .position(|s| s == "ALTER TABLE t2 DROP CONSTRAINT t2_t1_fk")
        .unwrap();
    let pk = stmts
        .iter()
        .position(|s| s == "ALTER TABLE t1 DROP CONSTRAINT t1_pkey")
        .unwrap();
    let table = stmts.iter().position(|s| s == "DROP TABLE t2").unwrap();
    assert!(fk < pk, "{stmts:#?}");
    assert!(fk < table, "{stmts:#?}");
}
