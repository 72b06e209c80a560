//! Object kinds and identity tuples.

use std::fmt;

/// The SQL object category of a catalog object.
///
/// The declaration order doubles as the tie-breaking order used when
/// sorting objects that have the same dependency rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Schema,
    Extension,
    Language,
    ForeignDataWrapper,
    ForeignServer,
    UserMapping,
    Collation,
    Conversion,
    BaseType,
    CompositeType,
    EnumType,
    RangeType,
    Domain,
    Function,
    Aggregate,
    Operator,
    OperatorFamily,
    OperatorClass,
    Cast,
    TsParser,
    TsTemplate,
    TsDictionary,
    TsConfiguration,
    Sequence,
    Table,
    ForeignTable,
    Column,
    CheckConstraint,
    PrimaryKey,
    UniqueConstraint,
    Index,
    ForeignKey,
    View,
    MaterializedView,
    Trigger,
    Rule,
    EventTrigger,
}

impl ObjectKind {
    /// Every kind, in declaration order.
    pub const ALL: &'static [Self] = &[
        Self::Schema,
        Self::Extension,
        Self::Language,
        Self::ForeignDataWrapper,
        Self::ForeignServer,
        Self::UserMapping,
        Self::Collation,
        Self::Conversion,
        Self::BaseType,
        Self::CompositeType,
        Self::EnumType,
        Self::RangeType,
        Self::Domain,
        Self::Function,
        Self::Aggregate,
        Self::Operator,
        Self::OperatorFamily,
        Self::OperatorClass,
        Self::Cast,
        Self::TsParser,
        Self::TsTemplate,
        Self::TsDictionary,
        Self::TsConfiguration,
        Self::Sequence,
        Self::Table,
        Self::ForeignTable,
        Self::Column,
        Self::CheckConstraint,
        Self::PrimaryKey,
        Self::UniqueConstraint,
        Self::Index,
        Self::ForeignKey,
        Self::View,
        Self::MaterializedView,
        Self::Trigger,
        Self::Rule,
        Self::EventTrigger,
    ];

    /// Keyword used in `CREATE`, `DROP`, `COMMENT ON` and `ALTER`.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Schema => "SCHEMA",
            Self::Extension => "EXTENSION",
            Self::Language => "LANGUAGE",
            Self::ForeignDataWrapper => "FOREIGN DATA WRAPPER",
            Self::ForeignServer => "SERVER",
            Self::UserMapping => "USER MAPPING",
            Self::Collation => "COLLATION",
            Self::Conversion => "CONVERSION",
            Self::BaseType | Self::CompositeType | Self::EnumType | Self::RangeType => "TYPE",
            Self::Domain => "DOMAIN",
            Self::Function => "FUNCTION",
            Self::Aggregate => "AGGREGATE",
            Self::Operator => "OPERATOR",
            Self::OperatorFamily => "OPERATOR FAMILY",
            Self::OperatorClass => "OPERATOR CLASS",
            Self::Cast => "CAST",
            Self::TsParser => "TEXT SEARCH PARSER",
            Self::TsTemplate => "TEXT SEARCH TEMPLATE",
            Self::TsDictionary => "TEXT SEARCH DICTIONARY",
            Self::TsConfiguration => "TEXT SEARCH CONFIGURATION",
            Self::Sequence => "SEQUENCE",
            Self::Table => "TABLE",
            Self::ForeignTable => "FOREIGN TABLE",
            Self::Column => "COLUMN",
            Self::CheckConstraint
            | Self::PrimaryKey
            | Self::UniqueConstraint
            | Self::ForeignKey => "CONSTRAINT",
            Self::Index => "INDEX",
            Self::View => "VIEW",
            Self::MaterializedView => "MATERIALIZED VIEW",
            Self::Trigger => "TRIGGER",
            Self::Rule => "RULE",
            Self::EventTrigger => "EVENT TRIGGER",
        }
    }

    /// Type tag used as the prefix of wire-format keys.
    #[must_use]
    pub const fn extern_tag(self) -> &'static str {
        match self {
            Self::ForeignServer => "server",
            Self::BaseType | Self::CompositeType | Self::EnumType | Self::RangeType => "type",
            Self::CheckConstraint => "check constraint",
            Self::PrimaryKey => "primary key",
            Self::UniqueConstraint => "unique constraint",
            Self::ForeignKey => "foreign key",
            Self::Schema => "schema",
            Self::Extension => "extension",
            Self::Language => "language",
            Self::ForeignDataWrapper => "foreign data wrapper",
            Self::UserMapping => "user mapping",
            Self::Collation => "collation",
            Self::Conversion => "conversion",
            Self::Domain => "domain",
            Self::Function => "function",
            Self::Aggregate => "aggregate",
            Self::Operator => "operator",
            Self::OperatorFamily => "operator family",
            Self::OperatorClass => "operator class",
            Self::Cast => "cast",
            Self::TsParser => "text search parser",
            Self::TsTemplate => "text search template",
            Self::TsDictionary => "text search dictionary",
            Self::TsConfiguration => "text search configuration",
            Self::Sequence => "sequence",
            Self::Table => "table",
            Self::ForeignTable => "foreign table",
            Self::Column => "column",
            Self::Index => "index",
            Self::View => "view",
            Self::MaterializedView => "materialized view",
            Self::Trigger => "trigger",
            Self::Rule => "rule",
            Self::EventTrigger => "event trigger",
        }
    }

    /// Object type keyword used by `GRANT`/`REVOKE`.
    #[must_use]
    pub const fn grant_name(self) -> &'static str {
        match self {
            Self::Table | Self::View | Self::MaterializedView | Self::ForeignTable => "TABLE",
            Self::ForeignServer => "FOREIGN SERVER",
            other => other.sql_name(),
        }
    }

    /// System catalog holding objects of this kind, used to resolve
    /// dependency records by `(catalog, oid)`.
    #[must_use]
    pub const fn catalog_table(self) -> Option<&'static str> {
        Some(match self {
            Self::Schema => "pg_namespace",
            Self::Extension => "pg_extension",
            Self::Language => "pg_language",
            Self::ForeignDataWrapper => "pg_foreign_data_wrapper",
            Self::ForeignServer => "pg_foreign_server",
            Self::Collation => "pg_collation",
            Self::Conversion => "pg_conversion",
            Self::BaseType
            | Self::CompositeType
            | Self::EnumType
            | Self::RangeType
            | Self::Domain => "pg_type",
            Self::Function | Self::Aggregate => "pg_proc",
            Self::Operator => "pg_operator",
            Self::OperatorFamily => "pg_opfamily",
            Self::OperatorClass => "pg_opclass",
            Self::Cast => "pg_cast",
            Self::TsParser => "pg_ts_parser",
            Self::TsTemplate => "pg_ts_template",
            Self::TsDictionary => "pg_ts_dict",
            Self::TsConfiguration => "pg_ts_config",
            Self::Sequence
            | Self::Table
            | Self::ForeignTable
            | Self::Index
            | Self::View
            | Self::MaterializedView => "pg_class",
            Self::CheckConstraint
            | Self::PrimaryKey
            | Self::UniqueConstraint
            | Self::ForeignKey => "pg_constraint",
            Self::Trigger => "pg_trigger",
            Self::Rule => "pg_rewrite",
            Self::EventTrigger => "pg_event_trigger",
            Self::UserMapping | Self::Column => return None,
        })
    }

    /// Whether objects of this kind live inside a table (or domain, for
    /// check constraints) and are dropped implicitly with it.
    #[must_use]
    pub const fn is_table_owned(self) -> bool {
        matches!(
            self,
            Self::CheckConstraint
                | Self::PrimaryKey
                | Self::UniqueConstraint
                | Self::ForeignKey
                | Self::Index
                | Self::Trigger
                | Self::Rule
        )
    }

    /// Whether this kind is a relation stored in `pg_class`.
    #[must_use]
    pub const fn is_relation(self) -> bool {
        matches!(
            self,
            Self::Table | Self::Sequence | Self::View | Self::MaterializedView | Self::ForeignTable
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extern_tag())
    }
}

/// Identity tuple of a catalog object.
///
/// Only the components in the kind's keylist are set: `schema` for
/// schema-scoped objects, `parent` for objects owned by a table, domain or
/// server, and `signature` for objects whose name is overloaded (function
/// arguments, operator argument types, index method of operator classes,
/// target type of casts).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    /// Object category.
    pub kind: ObjectKind,
    /// Owning schema.
    pub schema: Option<String>,
    /// Owning table, domain or server.
    pub parent: Option<String>,
    /// Object name.
    pub name: String,
    /// Overload discriminator.
    pub signature: Option<String>,
}

impl ObjectKey {
    /// Creates a key for an unscoped object.
    #[must_use]
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            schema: None,
            parent: None,
            name: name.into(),
            signature: None,
        }
    }

    /// Creates a key for a schema-scoped object.
    #[must_use]
    pub fn scoped(kind: ObjectKind, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(kind, name).in_schema(schema)
    }

    /// Sets the owning schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the owning table, domain or server.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets the overload discriminator.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Returns a copy of this key with a different name.
    #[must_use]
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Key of the schema this object lives in.
    #[must_use]
    pub fn schema_key(&self) -> Option<Self> {
        self.schema
            .as_ref()
            .map(|s| Self::new(ObjectKind::Schema, s.clone()))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.kind)?;
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        if let Some(parent) = &self.parent {
            write!(f, "{parent}.")?;
        }
        write!(f, "{}", self.name)?;
        if let Some(sig) = &self.signature {
            write!(f, "({sig})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = ObjectKey::scoped(ObjectKind::Function, "public", "f1").with_signature("integer");
        assert_eq!(key.to_string(), "function public.f1(integer)");

        let key = ObjectKey::scoped(ObjectKind::Index, "s1", "t1_idx").with_parent("t1");
        assert_eq!(key.to_string(), "index s1.t1.t1_idx");
    }

    #[test]
    fn test_key_ordering_puts_schemas_first() {
        let schema = ObjectKey::new(ObjectKind::Schema, "zzz");
        let table = ObjectKey::scoped(ObjectKind::Table, "aaa", "aaa");
        assert!(schema < table);
    }

    #[test]
    fn test_renamed_keeps_scope() {
        let key = ObjectKey::scoped(ObjectKind::Table, "s1", "t1");
        let renamed = key.renamed("t2");
        assert_eq!(renamed.schema.as_deref(), Some("s1"));
        assert_eq!(renamed.name, "t2");
    }
}
