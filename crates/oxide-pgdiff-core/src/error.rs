//! Error types for catalog loading, dependency ordering and diffing.

use std::path::PathBuf;

/// Errors that can occur while building or comparing catalog trees.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A wire-format key does not start with a recognized type tag.
    #[error("Unrecognized object type: '{key}' (in {scope})")]
    UnrecognizedKey {
        /// Where the key was found (e.g. "schema public", "top level").
        scope: String,
        /// The offending key.
        key: String,
    },

    /// A required attribute is missing from an object definition.
    #[error("{object}: missing required attribute '{attribute}'")]
    MissingAttribute {
        /// External key of the object.
        object: String,
        /// Attribute that was expected.
        attribute: String,
    },

    /// An attribute has a value of the wrong shape.
    #[error("{object}: invalid value: {message}")]
    InvalidValue {
        /// External key of the object.
        object: String,
        /// Description of the problem.
        message: String,
    },

    /// A cross-reference could not be resolved.
    #[error("{object}: {kind} '{name}' not found")]
    UnknownReference {
        /// Object holding the reference.
        object: String,
        /// Kind of the referenced object.
        kind: String,
        /// Name of the referenced object.
        name: String,
    },

    /// A desired object carries an `oldname` that matches nothing in the
    /// current tree.
    #[error("Previous name '{oldname}' for {object} not found")]
    RenameSourceNotFound {
        /// Object being renamed.
        object: String,
        /// The name it was supposed to have.
        oldname: String,
    },

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle detected among: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// The requested change cannot be expressed as DDL.
    #[error("{object}: {message}")]
    InvalidChange {
        /// Object being altered.
        object: String,
        /// Why the change is impossible.
        message: String,
    },

    /// A catalog metadata row could not be decoded.
    #[error("Failed to decode {kind} catalog row: {source}")]
    Row {
        /// Kind of the row being decoded.
        kind: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// The catalog source failed to run a query.
    #[error("Catalog query failed: {0}")]
    Source(String),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML error attributed to a specific file of a multi-file layout.
    #[error("Failed to parse '{path}': {source}")]
    YamlFile {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        source: serde_yaml::Error,
    },

    /// IO error (multi-file layout).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Creates a [`CatalogError::MissingAttribute`].
    pub fn missing(object: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            object: object.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates a [`CatalogError::InvalidValue`].
    pub fn invalid(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Creates a [`CatalogError::UnknownReference`].
    pub fn unknown(
        object: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::UnknownReference {
            object: object.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
