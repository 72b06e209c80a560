//! Dependency graph construction.
//!
//! Edges point from an object to the objects it depends on. They come
//! from three places: dependencies recorded by the catalog (catalog trees
//! only), dependencies implied by each object's structure, and manual
//! `depends_on` hints.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::database::Database;
use crate::error::{CatalogError, Result};
use crate::ident::DEFAULT_SCHEMA;
use crate::key::{ObjectKey, ObjectKind};
use crate::object::DbObject;
use crate::toposort::toposort;

/// Dependencies between the objects of one catalog tree.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    deps: BTreeMap<ObjectKey, BTreeSet<ObjectKey>>,
}

impl DependencyGraph {
    /// Builds the graph of every object in `db`.
    ///
    /// Catalog-observed edges from foreign keys to indexes or constraints
    /// are discarded: the foreign key's implied dependency on its unique
    /// match is recomputed from the tree, which stays correct when the
    /// index is replaced.
    pub fn build(db: &Database) -> Result<Self> {
        let mut deps = BTreeMap::new();
        let mut edge_count = 0;
        for obj in db.objects() {
            let obj = obj.as_object();
            let key = obj.key();
            let mut edges: BTreeSet<ObjectKey> = obj
                .implied_deps(db)
                .into_iter()
                .filter(|dep| dep != &key)
                .collect();
            for hint in &obj.meta().depends_on {
                let dep = resolve_hint(db, &key, hint)
                    .ok_or_else(|| CatalogError::unknown(obj.extern_key(), "dependency", hint))?;
                edges.insert(dep);
            }
            if let Some(observed) = db.catalog_deps.get(&key) {
                for dep in observed {
                    if key.kind == ObjectKind::ForeignKey
                        && matches!(
                            dep.kind,
                            ObjectKind::Index | ObjectKind::PrimaryKey | ObjectKind::UniqueConstraint
                        )
                    {
                        trace!(object = %key, dependency = %dep, "ignoring catalog edge");
                        continue;
                    }
                    if dep != &key {
                        edges.insert(dep.clone());
                    }
                }
            }
            edge_count += edges.len();
            deps.insert(key, edges);
        }
        debug!(nodes = deps.len(), edges = edge_count, "built dependency graph");
        Ok(Self { deps })
    }

    /// Adds an edge: `from` depends on `to`.
    pub fn add_edge(&mut self, from: ObjectKey, to: ObjectKey) {
        self.deps.entry(from).or_default().insert(to);
    }

    /// Direct dependencies of `key`.
    pub fn dependencies(&self, key: &ObjectKey) -> impl Iterator<Item = &ObjectKey> {
        self.deps.get(key).into_iter().flatten()
    }

    /// Everything that depends on one of `roots`, directly or through
    /// other objects. The roots themselves are not included.
    #[must_use]
    pub fn dependents(&self, roots: &BTreeSet<ObjectKey>) -> BTreeSet<ObjectKey> {
        let mut reverse: BTreeMap<&ObjectKey, Vec<&ObjectKey>> = BTreeMap::new();
        for (key, deps) in &self.deps {
            for dep in deps {
                reverse.entry(dep).or_default().push(key);
            }
        }
        let mut found = BTreeSet::new();
        let mut stack: Vec<&ObjectKey> = roots.iter().collect();
        while let Some(key) = stack.pop() {
            for dependent in reverse.get(key).into_iter().flatten() {
                if !roots.contains(*dependent) && found.insert((*dependent).clone()) {
                    stack.push(dependent);
                }
            }
        }
        found
    }

    /// Every node, dependencies first.
    pub fn sorted(&self) -> Result<Vec<ObjectKey>> {
        let nodes: BTreeSet<ObjectKey> = self.deps.keys().cloned().collect();
        toposort(&nodes, &self.deps)
    }

    /// The given nodes, dependencies first.
    pub fn sort(&self, nodes: &BTreeSet<ObjectKey>) -> Result<Vec<ObjectKey>> {
        toposort(nodes, &self.deps)
    }
}

/// Resolves a `depends_on` hint (`"table t1"`, `"function s1.f1(integer)"`)
/// to the key of an object in `db`. Unqualified names are looked up in
/// the schema of the object carrying the hint.
fn resolve_hint(db: &Database, from: &ObjectKey, hint: &str) -> Option<ObjectKey> {
    let hint = hint.trim();
    let tag = ObjectKind::ALL
        .iter()
        .map(|kind| kind.extern_tag())
        .filter(|tag| {
            hint.len() > tag.len() && hint.starts_with(tag) && hint.as_bytes()[tag.len()] == b' '
        })
        .max_by_key(|tag| tag.len())?;
    let rest = hint[tag.len()..].trim_start();

    let own_schema = from.schema.as_deref().unwrap_or(DEFAULT_SCHEMA);
    let (schema, rest) = match rest.split_once('.') {
        Some((schema, name))
            if !schema.contains(['(', ' '])
                && db
                    .schemas
                    .contains_key(&ObjectKey::new(ObjectKind::Schema, schema)) =>
        {
            (schema, name)
        }
        _ => (own_schema, rest),
    };
    let wanted = format!("{tag} {rest}");

    db.objects()
        .map(|obj| obj.as_object())
        .find(|obj| {
            let key = obj.key();
            obj.extern_key() == wanted
                && key.schema.as_deref().map_or(true, |s| s == schema)
        })
        .map(DbObject::key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Column, ForeignKey, Function, Index, PrimaryKey, Schema, Table, View};

    fn sample() -> Database {
        let mut db = Database::new();
        db.schemas.insert(Schema::new("public"));
        db.schemas.insert(Schema::new("s1"));
        db.tables
            .insert(Table::new("public", "t1").column(Column::new("id", "integer")));
        db.tables.insert(
            Table::new("s1", "t2")
                .column(Column::new("id", "integer"))
                .column(Column::new("t1_id", "integer")),
        );
        db
    }

    #[test]
    fn test_schema_precedes_table() {
        let db = sample();
        let graph = DependencyGraph::build(&db).unwrap();
        let order = graph.sorted().unwrap();
        let pos = |k: &ObjectKey| order.iter().position(|o| o == k).unwrap();
        let s1 = ObjectKey::new(ObjectKind::Schema, "s1");
        let t2 = ObjectKey::scoped(ObjectKind::Table, "s1", "t2");
        assert!(pos(&s1) < pos(&t2));
    }

    #[test]
    fn test_transitive_dependents() {
        let mut db = sample();
        db.views.insert(View::new("public", "v1", "SELECT id FROM t1"));
        db.views.insert(View::new("public", "v2", "SELECT id FROM v1"));
        let graph = DependencyGraph::build(&db).unwrap();
        let t1 = ObjectKey::scoped(ObjectKind::Table, "public", "t1");
        let found = graph.dependents(&BTreeSet::from([t1.clone()]));
        assert_eq!(
            found,
            BTreeSet::from([
                ObjectKey::scoped(ObjectKind::View, "public", "v1"),
                ObjectKey::scoped(ObjectKind::View, "public", "v2"),
            ])
        );
        assert!(!found.contains(&t1));
    }

    #[test]
    fn test_added_edge_orders_subset() {
        let db = sample();
        let mut graph = DependencyGraph::build(&db).unwrap();
        let t1 = ObjectKey::scoped(ObjectKind::Table, "public", "t1");
        let t2 = ObjectKey::scoped(ObjectKind::Table, "s1", "t2");
        graph.add_edge(t1.clone(), t2.clone());
        let order = graph.sort(&BTreeSet::from([t1.clone(), t2.clone()])).unwrap();
        assert_eq!(order, vec![t2, t1]);
    }

    #[test]
    fn test_depends_on_hint() {
        let mut db = sample();
        let mut view = View::new("public", "v1", "SELECT 1");
        view.meta.depends_on = vec!["table s1.t2".to_string(), "table t1".to_string()];
        db.views.insert(view);
        let graph = DependencyGraph::build(&db).unwrap();
        let v1 = ObjectKey::scoped(ObjectKind::View, "public", "v1");
        let deps: Vec<&ObjectKey> = graph.dependencies(&v1).collect();
        assert!(deps.contains(&&ObjectKey::scoped(ObjectKind::Table, "s1", "t2")));
        assert!(deps.contains(&&ObjectKey::scoped(ObjectKind::Table, "public", "t1")));
    }

    #[test]
    fn test_unresolved_hint_is_error() {
        let mut db = sample();
        let mut view = View::new("public", "v1", "SELECT 1");
        view.meta.depends_on = vec!["table nope".to_string()];
        db.views.insert(view);
        let err = DependencyGraph::build(&db).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownReference { .. }));
    }

    #[test]
    fn test_function_hint_with_signature() {
        let mut db = sample();
        db.functions.insert(Function::new(
            "public", "f1", "integer", "integer", "sql", "SELECT $1",
        ));
        let found = resolve_hint(
            &db,
            &ObjectKey::scoped(ObjectKind::View, "public", "v1"),
            "function f1(integer)",
        );
        assert_eq!(
            found,
            Some(ObjectKey::scoped(ObjectKind::Function, "public", "f1").with_signature("integer"))
        );
    }

    #[test]
    fn test_fk_catalog_edge_to_index_dropped() {
        let mut db = sample();
        db.primary_keys
            .insert(PrimaryKey::new("public", "t1", "t1_pkey", vec!["id".to_string()]));
        db.indexes
            .insert(Index::new("public", "t1", "t1_idx", vec!["id".to_string()]));
        let mut fk = ForeignKey::new(
            "s1",
            "t2",
            "t2_fk",
            vec!["t1_id".to_string()],
            "t1",
            vec!["id".to_string()],
        );
        fk.references.schema = Some("public".to_string());
        let fk_key = fk.key();
        db.foreign_keys.insert(fk);
        let idx_key = ObjectKey::scoped(ObjectKind::Index, "public", "t1_idx").with_parent("t1");
        db.catalog_deps
            .entry(fk_key.clone())
            .or_default()
            .insert(idx_key.clone());
        let graph = DependencyGraph::build(&db).unwrap();
        let deps: Vec<&ObjectKey> = graph.dependencies(&fk_key).collect();
        assert!(!deps.contains(&&idx_key));
        let pk = ObjectKey::scoped(ObjectKind::PrimaryKey, "public", "t1_pkey").with_parent("t1");
        assert!(deps.contains(&&pk));
    }
}
