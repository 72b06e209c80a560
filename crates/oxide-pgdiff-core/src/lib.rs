//! # oxide-pgdiff-core
//!
//! PostgreSQL catalog object model and DDL diff engine.
//!
//! This crate provides:
//! - A typed model of the catalog objects of one database
//! - A YAML wire format for that model, as one document or one file per object
//! - A dependency graph with a deterministic topological order
//! - A diff engine emitting the ordered DDL that turns one tree into another
//! - The metadata queries and row decoding needed to load a live catalog
//!
//! ## Diffing two trees
//!
//! ```rust
//! use oxide_pgdiff_core::{diff, wire, DiffOptions};
//!
//! let current = wire::from_yaml("schema public: {}\n").unwrap();
//! let desired = wire::from_yaml(
//!     "schema public:\n  table t1:\n    columns:\n    - c1:\n        type: integer\n",
//! )
//! .unwrap();
//!
//! let stmts = diff(&current, &desired, DiffOptions::new()).unwrap();
//! assert_eq!(stmts, vec!["CREATE TABLE t1 (\n    c1 integer)"]);
//! ```
//!
//! Loading from a server goes through [`catalog::CatalogSource`], which
//! runs the queries of [`catalog::required_queries`] and hands back their
//! JSON rows; this crate performs no database I/O itself.

pub mod catalog;
pub mod database;
pub mod depgraph;
pub mod dict;
pub mod diff;
pub mod error;
pub mod ident;
pub mod key;
pub mod object;
pub mod privileges;
pub mod toposort;
pub mod wire;

pub use catalog::CatalogSource;
pub use database::{Database, ObjectRef};
pub use depgraph::DependencyGraph;
pub use diff::{diff, DiffOptions, DiffState, Differ};
pub use error::{CatalogError, Result};
pub use key::{ObjectKey, ObjectKind};
pub use object::DbObject;

/// Commonly used items.
pub mod prelude {
    pub use crate::catalog::CatalogSource;
    pub use crate::database::Database;
    pub use crate::diff::{diff, DiffOptions, Differ};
    pub use crate::error::{CatalogError, Result};
    pub use crate::key::{ObjectKey, ObjectKind};
    pub use crate::object::DbObject;
    pub use crate::wire::{from_yaml, read_files, to_yaml, write_files};
}
