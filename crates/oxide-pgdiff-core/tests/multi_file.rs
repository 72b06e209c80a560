//! The one-file-per-object layout.

mod common;

use std::fs;

use common::{map, tree, FIXTURE};
use oxide_pgdiff_core::wire::{from_map, read_files, to_map, write_files};
use oxide_pgdiff_core::{diff, DiffOptions};

#[test]
fn fixture_survives_the_directory_layout() {
    let dir = tempfile::tempdir().unwrap();
    let db = tree(FIXTURE);
    write_files(&to_map(&db).unwrap(), dir.path()).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path().join("schema.public"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    for expected in [
        "table.t1.yaml",
        "table.t2.yaml",
        "function.audit.yaml",
        "sequence.seq1.yaml",
        "type.mood.yaml",
        "view.v1.yaml",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected} in {names:?}");
    }
    assert!(dir.path().join("database.yaml").is_file());
    assert!(dir.path().join("schema.s1.yaml").is_file());

    let merged = read_files(dir.path()).unwrap();
    assert_eq!(merged, map(FIXTURE));
    let reloaded = from_map(&merged).unwrap();
    assert!(diff(&db, &reloaded, DiffOptions::new()).unwrap().is_empty());
}

#[test]
fn awkward_names_are_sanitized() {
    let yaml = r"
schema My Schema:
  table Order Lines:
    columns:
    - id:
        type: integer
";
    let dir = tempfile::tempdir().unwrap();
    write_files(&map(yaml), dir.path()).unwrap();
    assert!(dir
        .path()
        .join("schema.my_schema/table.order_lines.yaml")
        .is_file());
    assert_eq!(read_files(dir.path()).unwrap(), map(yaml));
}

#[test]
fn rewriting_removes_dropped_objects() {
    let dir = tempfile::tempdir().unwrap();
    write_files(&map(FIXTURE), dir.path()).unwrap();
    let smaller = tree("schema public: {}\n");
    write_files(&to_map(&smaller).unwrap(), dir.path()).unwrap();
    assert!(!dir.path().join("schema.public").exists());
    assert!(!dir.path().join("schema.s1.yaml").exists());
    assert!(!dir.path().join("database.yaml").exists());
    assert_eq!(read_files(dir.path()).unwrap(), map("schema public: {}\n"));
}
