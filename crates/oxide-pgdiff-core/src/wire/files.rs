//! Multi-file layout of the wire map.
//!
//! ```text
//! database.yaml                 objects outside any schema
//! schema.public.yaml            schema attributes
//! schema.public/table.t1.yaml   one file per object (overloads share one)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use super::RESERVED_KEYS;
use crate::error::{CatalogError, Result};

/// File holding the objects outside any schema.
pub const DATABASE_FILE: &str = "database.yaml";

const MAX_STEM: usize = 32;

/// Lower-cases `name`, replaces characters outside `[a-z0-9_-]` and caps
/// the result at 32 characters.
#[must_use]
pub fn file_stem(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM)
        .collect()
}

/// Assigns file stems, suffixing `_<n>` when two names collapse to the
/// same stem.
#[derive(Debug, Default)]
struct StemTable {
    assigned: BTreeMap<String, String>,
}

impl StemTable {
    fn stem(&mut self, scope: &str, name: &str) -> String {
        let base = file_stem(name);
        let mut candidate = base.clone();
        let mut n = 0;
        loop {
            let slot = format!("{scope}.{candidate}");
            match self.assigned.get(&slot) {
                Some(owner) if owner == name => return candidate,
                Some(_) => {
                    n += 1;
                    candidate = format!("{base}_{n}");
                }
                None => {
                    self.assigned.insert(slot, name.to_string());
                    return candidate;
                }
            }
        }
    }
}

/// Splits a member key into its type tag and the name its file is named
/// after (`"function f1(integer)"` → `("function", "f1")`).
fn member_file_parts(key: &str) -> (String, String) {
    const TAGS: [&str; 18] = [
        "text search configuration",
        "text search dictionary",
        "text search template",
        "text search parser",
        "materialized view",
        "operator family",
        "operator class",
        "foreign table",
        "conversion",
        "collation",
        "aggregate",
        "function",
        "sequence",
        "operator",
        "domain",
        "table",
        "view",
        "type",
    ];
    let tag = TAGS
        .iter()
        .find(|tag| key.starts_with(*tag) && key.as_bytes().get(tag.len()) == Some(&b' '))
        .copied()
        .unwrap_or("object");
    let rest = key.get(tag.len()..).unwrap_or(key).trim();
    let name = match tag {
        "function" | "aggregate" | "operator" => rest.split('(').next().unwrap_or(rest),
        "operator class" | "operator family" => {
            rest.rsplit_once(" using ").map_or(rest, |(name, _)| name)
        }
        _ => rest,
    };
    (tag.replace(' ', "_"), name.trim().to_string())
}

fn write_yaml(path: &Path, map: &Mapping) -> Result<()> {
    let text = serde_yaml::to_string(map)?;
    fs::write(path, text)?;
    debug!(path = %path.display(), entries = map.len(), "wrote file");
    Ok(())
}

fn read_yaml(path: &Path) -> Result<Mapping> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&text).map_err(|source| CatalogError::YamlFile {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(CatalogError::invalid(
            path.display().to_string(),
            "expected a map at the top of the file",
        )),
    }
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Writes `map` under `dir`, one file per object, and removes `.yaml`
/// files left over from a previous layout. Returns the files written.
pub fn write_files(map: &Mapping, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut database = Mapping::new();
    let mut written: BTreeSet<PathBuf> = BTreeSet::new();
    let mut schema_stems = StemTable::default();

    for (key, value) in map {
        let Some(schema) = key.as_str().and_then(|k| k.strip_prefix("schema ")) else {
            database.insert(key.clone(), value.clone());
            continue;
        };
        let stem = schema_stems.stem("schema", schema);
        let mut attrs = Mapping::new();
        let mut members: BTreeMap<PathBuf, Mapping> = BTreeMap::new();
        let schema_dir = dir.join(format!("schema.{stem}"));
        let mut member_stems = StemTable::default();
        if let Value::Mapping(entries) = value {
            for (member, member_value) in entries {
                let Some(member_key) = member.as_str() else {
                    continue;
                };
                if RESERVED_KEYS.contains(&member_key) {
                    attrs.insert(member.clone(), member_value.clone());
                    continue;
                }
                let (tag, name) = member_file_parts(member_key);
                let file = format!("{tag}.{}.yaml", member_stems.stem(&tag, &name));
                members
                    .entry(schema_dir.join(file))
                    .or_default()
                    .insert(member.clone(), member_value.clone());
            }
        }

        let mut schema_file = Mapping::new();
        schema_file.insert(key.clone(), Value::Mapping(attrs));
        let path = dir.join(format!("schema.{stem}.yaml"));
        write_yaml(&path, &schema_file)?;
        written.insert(path);
        if !members.is_empty() {
            fs::create_dir_all(&schema_dir)?;
        }
        for (path, content) in members {
            write_yaml(&path, &content)?;
            written.insert(path);
        }
    }

    if !database.is_empty() {
        let path = dir.join(DATABASE_FILE);
        write_yaml(&path, &database)?;
        written.insert(path);
    }
    remove_stale(dir, &written)?;
    info!(dir = %dir.display(), files = written.len(), "wrote multi-file layout");
    Ok(written.into_iter().collect())
}

fn remove_stale(dir: &Path, written: &BTreeSet<PathBuf>) -> Result<()> {
    for path in yaml_files(dir)? {
        if !written.contains(&path) {
            debug!(path = %path.display(), "removing stale file");
            fs::remove_file(&path)?;
        }
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_schema_dir = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("schema."));
        if !path.is_dir() || !is_schema_dir {
            continue;
        }
        for file in yaml_files(&path)? {
            if !written.contains(&file) {
                debug!(path = %file.display(), "removing stale file");
                fs::remove_file(&file)?;
            }
        }
        if fs::read_dir(&path)?.next().is_none() {
            fs::remove_dir(&path)?;
        }
    }
    Ok(())
}

/// Reads a layout written by [`write_files`] back into a single map.
pub fn read_files(dir: &Path) -> Result<Mapping> {
    let mut map = Mapping::new();
    let database = dir.join(DATABASE_FILE);
    if database.is_file() {
        map.extend(read_yaml(&database)?);
    }
    let mut count = 0;
    for path in yaml_files(dir)? {
        let Some(stem) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| s.starts_with("schema."))
        else {
            continue;
        };
        let schema_dir = dir.join(stem);
        for (key, value) in read_yaml(&path)? {
            let mut attrs = match value {
                Value::Mapping(attrs) => attrs,
                _ => Mapping::new(),
            };
            if schema_dir.is_dir() {
                for member_file in yaml_files(&schema_dir)? {
                    count += 1;
                    attrs.extend(read_yaml(&member_file)?);
                }
            }
            map.insert(key, Value::Mapping(attrs));
        }
    }
    debug!(dir = %dir.display(), files = count, "read multi-file layout");
    Ok(map)
}
