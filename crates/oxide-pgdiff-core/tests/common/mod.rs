#![allow(dead_code)]

use oxide_pgdiff_core::wire;
use oxide_pgdiff_core::{diff, Database, DiffOptions};
use serde_yaml::Mapping;

/// A tree touching most object kinds, in canonical wire form.
pub const FIXTURE: &str = r"
cast (smallint AS boolean):
  context: explicit
  function: int2_bool(smallint)
  method: function
event trigger et1:
  event: ddl_command_end
  procedure: log_ddl()
extension pgcrypto:
  description: cryptographic functions
  schema: public
foreign data wrapper fdw1:
  server srv1:
    options:
    - host=localhost
    user mappings:
      PUBLIC:
        options:
        - user=guest
language plperl:
  trusted: true
schema public:
  description: standard public schema
  owner: postgres
  domain posint:
    check_constraints:
      posint_check:
        expression: VALUE > 0
    type: integer
  function add1(integer):
    language: sql
    returns: integer
    source: SELECT $1 + 1
  function audit():
    language: plpgsql
    returns: trigger
    source: BEGIN RETURN NEW; END
  function log_ddl():
    language: plpgsql
    returns: event_trigger
    source: BEGIN END
  sequence seq1:
    cache_value: 1
    increment_by: 1
    max_value: 1000
    start_value: 1
  table t1:
    check_constraints:
      t1_c3_check:
        columns:
        - c3
        expression: c3 > '2000-01-01'::date
    columns:
    - c1:
        not_null: true
        type: integer
    - c2:
        type: text
    - c3:
        type: date
    indexes:
      t1_c2_idx:
        keys:
        - c2
    owner: alice
    primary_key:
      t1_pkey:
        columns:
        - c1
    triggers:
      t1_audit:
        events:
        - insert
        - update
        level: row
        procedure: audit()
        timing: after
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
    primary_key:
      t2_pkey:
        columns:
        - id
    unique_constraints:
      t2_t1_key:
        columns:
        - t1_id
  type mood:
    labels:
    - sad
    - happy
  type pair:
    attributes:
    - a:
        type: integer
    - b:
        type: text
  view v1:
    definition: SELECT c1, c2 FROM t1
schema s1:
  description: second schema
  table t3:
    columns:
    - id:
        type: integer
";

/// Parses a YAML document into a wire map.
pub fn map(yaml: &str) -> Mapping {
    serde_yaml::from_str(yaml).unwrap_or_else(|e| panic!("Invalid YAML: {e}\n{yaml}"))
}

/// Parses a YAML document into a tree.
pub fn tree(yaml: &str) -> Database {
    wire::from_yaml(yaml).unwrap_or_else(|e| panic!("Failed to load tree: {e}\n{yaml}"))
}

/// Diffs two YAML documents with default options.
pub fn diff_yaml(current: &str, desired: &str) -> Vec<String> {
    diff(&tree(current), &tree(desired), DiffOptions::new())
        .unwrap_or_else(|e| panic!("Diff failed: {e}"))
}

/// Replaces the line holding `DESC` with a `description` entry at the
/// same indentation, or removes it.
pub fn with_description(template: &str, description: Option<&str>) -> String {
    template
        .lines()
        .filter_map(|line| match (line.find("DESC"), description) {
            (Some(indent), Some(text)) => Some(format!("{}description: {text}", " ".repeat(indent))),
            (Some(_), None) => None,
            (None, _) => Some(line.to_string()),
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}
