//! Collations, conversions and text search objects.

use serde::{Deserialize, Serialize};

use super::types::schema_scoped;
use super::{is_false, recreate_if_changed, Alteration, DbObject, Meta};
use crate::database::Database;
use crate::error::Result;
use crate::ident::{quote_literal, split_schema_obj};
use crate::key::{ObjectKey, ObjectKind};

/// Builds `CREATE <kind> name (\n    OPT = v, ...)`.
fn create_with_options(kind: ObjectKind, ident: &str, opts: &[(&str, Option<&String>)]) -> String {
    let rendered: Vec<String> = opts
        .iter()
        .filter_map(|(name, value)| value.map(|v| format!("{name} = {v}")))
        .collect();
    format!(
        "CREATE {} {ident} (\n    {})",
        kind.sql_name(),
        rendered.join(",\n    ")
    )
}

/// A collation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collation {
    /// Owning schema.
    pub schema: String,
    /// Collation name.
    pub name: String,
    /// `LC_COLLATE` locale.
    pub lc_collate: String,
    /// `LC_CTYPE` locale.
    pub lc_ctype: String,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for Collation {
    schema_scoped!(ObjectKind::Collation);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![format!(
            "CREATE COLLATION {} (\n    LC_COLLATE = {},\n    LC_CTYPE = {})",
            self.qualname(),
            quote_literal(&self.lc_collate),
            quote_literal(&self.lc_ctype)
        )]
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// An encoding conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// Owning schema.
    pub schema: String,
    /// Conversion name.
    pub name: String,
    /// Source encoding.
    pub source_encoding: String,
    /// Destination encoding.
    pub dest_encoding: String,
    /// Conversion function.
    pub function: String,
    /// Whether this is the default conversion between the encodings.
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for Conversion {
    schema_scoped!(ObjectKind::Conversion);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![format!(
            "CREATE {}CONVERSION {} FOR {} TO {} FROM {}",
            if self.default { "DEFAULT " } else { "" },
            self.qualname(),
            quote_literal(&self.source_encoding),
            quote_literal(&self.dest_encoding),
            self.function
        )]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        deps.extend(db.function_ref(&self.function, &self.schema));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// A text search parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsParser {
    /// Owning schema.
    pub schema: String,
    /// Parser name.
    pub name: String,
    /// Start function.
    pub start: String,
    /// Next-token function.
    pub gettoken: String,
    /// End function.
    pub end: String,
    /// Token types function.
    pub lextypes: String,
    /// Headline function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for TsParser {
    schema_scoped!(ObjectKind::TsParser);

    fn has_owner(&self) -> bool {
        false
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![create_with_options(
            self.kind(),
            &self.qualname(),
            &[
                ("START", Some(&self.start)),
                ("GETTOKEN", Some(&self.gettoken)),
                ("END", Some(&self.end)),
                ("LEXTYPES", Some(&self.lextypes)),
                ("HEADLINE", self.headline.as_ref()),
            ],
        )]
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// A text search template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsTemplate {
    /// Owning schema.
    pub schema: String,
    /// Template name.
    pub name: String,
    /// Initialization function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
    /// Lexize function.
    pub lexize: String,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for TsTemplate {
    schema_scoped!(ObjectKind::TsTemplate);

    fn has_owner(&self) -> bool {
        false
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![create_with_options(
            self.kind(),
            &self.qualname(),
            &[("INIT", self.init.as_ref()), ("LEXIZE", Some(&self.lexize))],
        )]
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// A text search dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsDictionary {
    /// Owning schema.
    pub schema: String,
    /// Dictionary name.
    pub name: String,
    /// Template, possibly schema-qualified.
    pub template: String,
    /// Template-specific options (`language = 'english'`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for TsDictionary {
    schema_scoped!(ObjectKind::TsDictionary);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!(
            "CREATE TEXT SEARCH DICTIONARY {} (\n    TEMPLATE = {}",
            self.qualname(),
            self.template
        );
        if let Some(options) = &self.options {
            sql.push_str(&format!(", {options}"));
        }
        sql.push(')');
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        let (schema, name) = split_schema_obj(&self.template, &self.schema);
        let key = ObjectKey::scoped(ObjectKind::TsTemplate, schema, name);
        if db.ts_templates.contains_key(&key) {
            deps.push(key);
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        if self.template != new.template {
            return Ok(Alteration::Recreate);
        }
        let mut stmts = Vec::new();
        if self.options != new.options {
            if let Some(options) = &new.options {
                stmts.push(format!(
                    "ALTER TEXT SEARCH DICTIONARY {} ({options})",
                    self.qualname()
                ));
            }
        }
        Ok(Alteration::Statements(stmts))
    }
}

/// A text search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsConfiguration {
    /// Owning schema.
    pub schema: String,
    /// Configuration name.
    pub name: String,
    /// Parser, possibly schema-qualified.
    pub parser: String,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for TsConfiguration {
    schema_scoped!(ObjectKind::TsConfiguration);

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![format!(
            "CREATE TEXT SEARCH CONFIGURATION {} (\n    PARSER = {})",
            self.qualname(),
            self.parser
        )]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        let (schema, name) = split_schema_obj(&self.parser, &self.schema);
        let key = ObjectKey::scoped(ObjectKind::TsParser, schema, name);
        if db.ts_parsers.contains_key(&key) {
            deps.push(key);
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_config_depends_on_parser() {
        let mut db = Database::default();
        db.ts_parsers.insert(TsParser {
            schema: "public".to_string(),
            name: "tsp1".to_string(),
            start: "prsd_start".to_string(),
            gettoken: "prsd_nexttoken".to_string(),
            end: "prsd_end".to_string(),
            lextypes: "prsd_lextype".to_string(),
            headline: None,
            meta: Meta::default(),
        });
        let cfg = TsConfiguration {
            schema: "public".to_string(),
            name: "tsc1".to_string(),
            parser: "tsp1".to_string(),
            meta: Meta::default(),
        };
        let deps = cfg.implied_deps(&db);
        assert!(deps.contains(&ObjectKey::scoped(ObjectKind::TsParser, "public", "tsp1")));
        assert_eq!(
            cfg.create_sql(&db),
            vec!["CREATE TEXT SEARCH CONFIGURATION tsc1 (\n    PARSER = tsp1)"]
        );
    }

    #[test]
    fn test_parser_sql() {
        let parser = TsParser {
            schema: "public".to_string(),
            name: "tsp1".to_string(),
            start: "prsd_start".to_string(),
            gettoken: "prsd_nexttoken".to_string(),
            end: "prsd_end".to_string(),
            lextypes: "prsd_lextype".to_string(),
            headline: Some("prsd_headline".to_string()),
            meta: Meta::default(),
        };
        assert_eq!(
            parser.create_sql(&Database::default()),
            vec!["CREATE TEXT SEARCH PARSER tsp1 (\n    START = prsd_start,\n    GETTOKEN = prsd_nexttoken,\n    END = prsd_end,\n    LEXTYPES = prsd_lextype,\n    HEADLINE = prsd_headline)"]
        );
    }

    #[test]
    fn test_conversion_sql() {
        let conv = Conversion {
            schema: "public".to_string(),
            name: "conv1".to_string(),
            source_encoding: "LATIN1".to_string(),
            dest_encoding: "UTF8".to_string(),
            function: "iso8859_1_to_utf8".to_string(),
            default: true,
            meta: Meta::default(),
        };
        assert_eq!(
            conv.create_sql(&Database::default()),
            vec!["CREATE DEFAULT CONVERSION conv1 FOR 'LATIN1' TO 'UTF8' FROM iso8859_1_to_utf8"]
        );
    }
}
