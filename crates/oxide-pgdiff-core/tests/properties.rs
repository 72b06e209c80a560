//! Behavioral properties of the diff engine, exercised on YAML-sourced
//! trees.

mod common;

use common::{diff_yaml, map, tree, with_description, FIXTURE};
use oxide_pgdiff_core::wire::{from_map, to_map};
use oxide_pgdiff_core::{diff, CatalogError, Database, DependencyGraph, DiffOptions, ObjectKey};

// =============================================================================
// Idempotence and round-trip
// =============================================================================

#[test]
fn diff_against_itself_is_empty() {
    let db = tree(FIXTURE);
    assert!(db.object_count() > 25);
    let stmts = diff(&db, &db, DiffOptions::new()).unwrap();
    assert!(stmts.is_empty(), "unexpected statements: {stmts:#?}");
}

#[test]
fn diff_against_reloaded_copy_is_empty() {
    let db = tree(FIXTURE);
    let reloaded = from_map(&to_map(&db).unwrap()).unwrap();
    assert!(diff(&db, &reloaded, DiffOptions::new()).unwrap().is_empty());
}

#[test]
fn wire_map_round_trips() {
    let original = map(FIXTURE);
    let db = from_map(&original).unwrap();
    assert_eq!(to_map(&db).unwrap(), original);
}

#[test]
fn create_from_empty_then_drop_back() {
    let created = diff_yaml("{}", FIXTURE);
    assert!(created.iter().any(|s| s == "CREATE SCHEMA s1"));
    assert!(created.iter().all(|s| !s.starts_with("DROP")));

    let dropped = diff_yaml(FIXTURE, "{}");
    assert!(dropped.iter().all(|s| !s.starts_with("CREATE")));
    assert!(dropped.iter().any(|s| s == "DROP SCHEMA s1"));
}

// =============================================================================
// Topological validity
// =============================================================================

#[test]
fn sorted_order_puts_dependencies_first() {
    let db = tree(FIXTURE);
    let graph = DependencyGraph::build(&db).unwrap();
    let order = graph.sorted().unwrap();
    assert_eq!(order.len(), db.object_count());
    let position = |key: &ObjectKey| order.iter().position(|k| k == key).unwrap();
    for key in &order {
        for dep in graph.dependencies(key) {
            assert!(
                position(dep) < position(key),
                "{dep} must precede {key}"
            );
        }
    }

    // reversed, every dependent comes before what it depends on
    let reversed: Vec<&ObjectKey> = order.iter().rev().collect();
    let reverse_position = |key: &ObjectKey| reversed.iter().position(|k| *k == key).unwrap();
    for key in &order {
        for dep in graph.dependencies(key) {
            assert!(reverse_position(key) < reverse_position(dep));
        }
    }
}

#[test]
fn create_statements_follow_dependency_order() {
    let stmts = diff_yaml("{}", FIXTURE);
    let position = |prefix: &str| {
        stmts
            .iter()
            .position(|s| s.starts_with(prefix))
            .unwrap_or_else(|| panic!("no statement starting with {prefix}: {stmts:#?}"))
    };
    assert!(position("CREATE TABLE t1") < position("CREATE TABLE t2"));
    assert!(position("CREATE TABLE t1") < position("CREATE VIEW v1"));
    assert!(position("ALTER TABLE t1 ADD CONSTRAINT t1_pkey") < position("ALTER TABLE t2 ADD CONSTRAINT t2_t1_fk"));
    assert!(position("CREATE FUNCTION audit()") < position("CREATE TRIGGER t1_audit"));
    assert!(position("CREATE SCHEMA s1") < position("CREATE TABLE s1.t3"));
}

#[test]
fn dependency_cycle_is_an_error() {
    let yaml = r"
schema public:
  view v1:
    definition: SELECT 1
    depends_on:
    - view v2
  view v2:
    definition: SELECT 2
    depends_on:
    - view v1
";
    let db = tree(yaml);
    match DependencyGraph::build(&db).unwrap().sorted() {
        Err(CatalogError::DependencyCycle(members)) => {
            assert_eq!(members, vec!["view public.v1", "view public.v2"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
    let err = diff(&Database::new(), &db, DiffOptions::new()).unwrap_err();
    assert!(matches!(err, CatalogError::DependencyCycle(_)));
}

// =============================================================================
// Rename vs. recreate
// =============================================================================

const T1: &str = r"
schema public:
  table t1:
    columns:
    - c1:
        type: integer
    - c2:
        type: text
";

#[test]
fn oldname_renames_instead_of_recreating() {
    let desired = r"
schema public:
  table t2:
    oldname: t1
    columns:
    - c1:
        type: integer
    - c2:
        type: text
";
    assert_eq!(diff_yaml(T1, desired), vec!["ALTER TABLE t1 RENAME TO t2"]);
}

#[test]
fn new_name_without_oldname_recreates() {
    let desired = T1.replace("table t1", "table t2");
    let stmts = diff_yaml(T1, &desired);
    assert_eq!(
        stmts,
        vec![
            "CREATE TABLE t2 (\n    c1 integer,\n    c2 text)".to_string(),
            "DROP TABLE t1".to_string(),
        ]
    );
}

#[test]
fn oldname_without_source_is_an_error() {
    let desired = r"
schema public:
  table t2:
    oldname: t9
    columns:
    - c1:
        type: integer
";
    let err = diff(&tree(T1), &tree(desired), DiffOptions::new()).unwrap_err();
    assert!(matches!(err, CatalogError::RenameSourceNotFound { ref oldname, .. } if oldname == "t9"));
}

// =============================================================================
// Column changes
// =============================================================================

#[test]
fn column_reorder_with_type_change_alters_one_column() {
    let current = r"
schema public:
  table t1:
    columns:
    - year:
        type: character varying
        not_null: true
        default: ''''''
    - month:
        type: integer
        default: '0'
";
    let desired = r"
schema public:
  table t1:
    columns:
    - month:
        type: character varying
        not_null: true
        default: ''''''
    - year:
        type: character varying
        not_null: true
        default: ''''''
";
    let stmts = diff_yaml(current, desired);
    assert_eq!(
        stmts,
        vec![
            "ALTER TABLE t1 ALTER COLUMN month SET NOT NULL, \
             ALTER COLUMN month DROP DEFAULT, \
             ALTER COLUMN month TYPE character varying USING month::character varying, \
             ALTER COLUMN month SET DEFAULT ''"
        ]
    );
    assert!(!stmts[0].contains("year"));
}

#[test]
fn retyped_column_rebuilds_its_index() {
    let current = r"
schema public:
  table t1:
    columns:
    - month:
        type: integer
    - year:
        type: integer
    indexes:
      t1_month_idx:
        access_method: gin
        keys:
        - month:
            opclass: int4_ops
";
    let desired = r"
schema public:
  table t1:
    columns:
    - month:
        type: character varying
    - year:
        type: integer
    indexes:
      t1_month_btree:
        keys:
        - month
";
    assert_eq!(
        diff_yaml(current, desired),
        vec![
            "DROP INDEX t1_month_idx",
            "ALTER TABLE t1 ALTER COLUMN month TYPE character varying USING month::character varying",
            "CREATE INDEX t1_month_btree ON t1 (month)",
        ]
    );
}

#[test]
fn revert_swaps_the_trees() {
    let desired = T1.replace("    - c2:\n        type: text\n", "");
    let forward = diff_yaml(T1, &desired);
    assert_eq!(forward, vec!["ALTER TABLE t1 DROP COLUMN c2"]);
    let reverted = diff(&tree(T1), &tree(&desired), DiffOptions::new().reverted()).unwrap();
    assert_eq!(reverted, vec!["ALTER TABLE t1 ADD COLUMN c2 text"]);
}

#[test]
fn explicit_default_sequence_bounds_match_implicit_ones() {
    let implicit = "schema public:\n  sequence s1:\n    start_value: 1\n";
    let explicit = "schema public:\n  sequence s1:\n    start_value: 1\n    \
                    max_value: 9223372036854775807\n    min_value: 1\n";
    assert!(diff_yaml(implicit, explicit).is_empty());
    assert!(diff_yaml(explicit, implicit).is_empty());
}

// =============================================================================
// Recreating with dependents
// =============================================================================

fn position(stmts: &[String], wanted: &str) -> usize {
    stmts
        .iter()
        .position(|s| s.starts_with(wanted))
        .unwrap_or_else(|| panic!("no statement starting with {wanted:?} in {stmts:#?}"))
}

const MATVIEW: &str = r"
schema public:
  table t1:
    columns:
    - c1:
        type: integer
  materialized view mv1:
    definition: SELECT c1 FROM t1
    indexes:
      mv1_idx:
        keys:
        - c1
  view v1:
    definition: SELECT c1 FROM mv1
";

#[test]
fn changed_matview_rebuilds_dependent_view_and_index() {
    let desired = MATVIEW.replace(
        "definition: SELECT c1 FROM t1",
        "definition: SELECT c1 FROM t1 WHERE c1 > 0",
    );
    let stmts = diff_yaml(MATVIEW, &desired);
    assert_eq!(stmts.len(), 5, "{stmts:#?}");
    assert_eq!(stmts[0], "DROP VIEW v1");
    assert_eq!(stmts[1], "DROP MATERIALIZED VIEW mv1");
    assert_eq!(
        stmts[2],
        "CREATE MATERIALIZED VIEW mv1 AS\n   SELECT c1 FROM t1 WHERE c1 > 0"
    );
    assert!(position(&stmts, "CREATE INDEX mv1_idx ON mv1 (c1)") > 2);
    assert!(position(&stmts, "CREATE VIEW v1 AS\n   SELECT c1 FROM mv1") > 2);
    assert!(stmts.iter().all(|s| !s.starts_with("DROP INDEX")));
}

#[test]
fn unchanged_matview_leaves_dependents_alone() {
    assert!(diff_yaml(MATVIEW, MATVIEW).is_empty());
}

#[test]
fn function_return_change_rebuilds_calling_view() {
    let current = r"
schema public:
  function add1(integer):
    language: sql
    returns: integer
    source: SELECT $1 + 1
  table t1:
    columns:
    - c1:
        type: integer
  view v1:
    definition: SELECT add1(c1) AS c2 FROM t1
";
    let desired = current.replace("returns: integer", "returns: bigint");
    let stmts = diff_yaml(current, &desired);
    let drop_view = position(&stmts, "DROP VIEW v1");
    let drop_func = position(&stmts, "DROP FUNCTION add1(integer)");
    let create_func = position(&stmts, "CREATE FUNCTION add1(integer) RETURNS bigint");
    let create_view = position(&stmts, "CREATE VIEW v1 AS");
    assert!(drop_view < drop_func);
    assert!(drop_func < create_func);
    assert!(create_func < create_view);
}

#[test]
fn removed_enum_label_with_column_user_is_an_error() {
    let current = r"
schema public:
  type mood:
    labels:
    - sad
    - ok
    - happy
  table t1:
    columns:
    - c1:
        type: mood
";
    let desired = current.replace("    - ok\n", "");
    let err = diff(&tree(current), &tree(&desired), DiffOptions::new()).unwrap_err();
    assert!(
        matches!(err, CatalogError::InvalidChange { ref object, ref message }
            if object == "type mood" && message.contains("table")),
        "{err}"
    );
}

const BASE_TYPE: &str = r"
schema public:
  function myin(cstring):
    language: c
    returns: mytype
    obj_file: $libdir/mytype
    link_symbol: myin
  function myout(mytype):
    language: c
    returns: cstring
    obj_file: $libdir/mytype
    link_symbol: myout
  type mytype:
    input: myin
    output: myout
    internallength: 16
    category: U
";

#[test]
fn changed_base_type_with_column_user_is_an_error() {
    let current = format!(
        "{BASE_TYPE}  table t1:\n    columns:\n    - c1:\n        type: mytype\n"
    );
    let desired = current.replace("category: U", "category: N");
    let err = diff(&tree(&current), &tree(&desired), DiffOptions::new()).unwrap_err();
    assert!(
        matches!(err, CatalogError::InvalidChange { ref object, .. } if object == "type mytype"),
        "{err}"
    );
}

#[test]
fn changed_base_type_recreates_its_functions() {
    let desired = BASE_TYPE.replace("category: U", "category: N");
    let stmts = diff_yaml(BASE_TYPE, &desired);
    assert_eq!(stmts[0], "DROP TYPE mytype CASCADE");
    assert!(stmts.iter().all(|s| !s.starts_with("DROP FUNCTION")), "{stmts:#?}");
    let create_in = position(&stmts, "CREATE FUNCTION myin(cstring)");
    let create_out = position(&stmts, "CREATE FUNCTION myout(mytype)");
    let create_type = position(&stmts, "CREATE TYPE mytype");
    assert!(create_in < create_type);
    assert!(create_out < create_type);
    assert!(stmts[create_type].contains("CATEGORY = 'N'"));
}

#[test]
fn dropped_base_type_takes_its_functions_along() {
    let stmts = diff_yaml(BASE_TYPE, "schema public: {}\n");
    assert_eq!(stmts, vec!["DROP TYPE mytype CASCADE"]);
}

// =============================================================================
// Comment symmetry
// =============================================================================

const COMMENTABLE: [(&str, &str); 10] = [
    ("SCHEMA s1", "schema s1:\n  DESC\n"),
    (
        "TABLE t1",
        "schema public:\n  table t1:\n    columns:\n    - c1:\n        type: integer\n    DESC\n",
    ),
    (
        "COLUMN t1.c1",
        "schema public:\n  table t1:\n    columns:\n    - c1:\n        type: integer\n        DESC\n",
    ),
    (
        "INDEX t1_idx",
        "schema public:\n  table t1:\n    columns:\n    - c1:\n        type: integer\n    indexes:\n      t1_idx:\n        keys:\n        - c1\n        DESC\n",
    ),
    (
        "CONSTRAINT t1_pkey ON t1",
        "schema public:\n  table t1:\n    columns:\n    - c1:\n        type: integer\n    primary_key:\n      t1_pkey:\n        columns:\n        - c1\n        DESC\n",
    ),
    (
        "VIEW v1",
        "schema public:\n  view v1:\n    definition: SELECT 1\n    DESC\n",
    ),
    (
        "FUNCTION f1(integer)",
        "schema public:\n  function f1(integer):\n    language: sql\n    returns: integer\n    source: SELECT $1\n    DESC\n",
    ),
    (
        "SEQUENCE seq1",
        "schema public:\n  sequence seq1:\n    start_value: 1\n    DESC\n",
    ),
    (
        "TYPE mood",
        "schema public:\n  type mood:\n    labels:\n    - sad\n    DESC\n",
    ),
    ("EXTENSION hstore", "extension hstore:\n  DESC\n"),
];

fn with_public(yaml: &str) -> String {
    if yaml.starts_with("schema public:") {
        yaml.to_string()
    } else {
        format!("schema public: {{}}\n{yaml}")
    }
}

#[test]
fn comment_changes_emit_one_statement_each() {
    for (target, template) in COMMENTABLE {
        let bare = with_public(&with_description(template, None));
        let first = with_public(&with_description(template, Some("first")));
        let second = with_public(&with_description(template, Some("second")));

        let added = diff_yaml(&bare, &first);
        assert_eq!(added, vec![format!("COMMENT ON {target} IS 'first'")], "{target}");
        let changed = diff_yaml(&first, &second);
        assert_eq!(changed, vec![format!("COMMENT ON {target} IS 'second'")], "{target}");
        let removed = diff_yaml(&second, &bare);
        assert_eq!(removed, vec![format!("COMMENT ON {target} IS NULL")], "{target}");
    }
}

#[test]
fn unknown_type_tag_is_rejected() {
    let yaml = "schema public:\n  tabel t1:\n    columns: []\n";
    let err = from_map(&map(yaml)).unwrap_err();
    assert!(matches!(err, CatalogError::UnrecognizedKey { .. }));
}
