//! SQL identifier and literal helpers.

/// Schema whose name is omitted from qualified identifiers.
pub const DEFAULT_SCHEMA: &str = "public";

/// Reserved keywords that must always be quoted when used as identifiers.
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant",
    "group", "having", "ilike", "in", "initially", "inner", "intersect", "into", "is",
    "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or",
    "order", "outer", "overlaps", "placing", "primary", "references", "returning", "right",
    "select", "session_user", "similar", "some", "symmetric", "table", "tablesample",
    "then", "to", "trailing", "true", "union", "unique", "user", "using", "variadic",
    "verbose", "when", "where", "window", "with",
];

/// Quotes an identifier if it is not a plain lower-case name or is reserved.
#[must_use]
pub fn quote_id(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$');
    if plain && !RESERVED_WORDS.contains(&name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Returns `schema.name`, omitting the schema when it is the default one.
#[must_use]
pub fn qualname(schema: &str, name: &str) -> String {
    if schema == DEFAULT_SCHEMA || schema.is_empty() {
        quote_id(name)
    } else {
        format!("{}.{}", quote_id(schema), quote_id(name))
    }
}

/// Renders a string as a SQL literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Splits a possibly qualified, possibly quoted `schema.name` into its
/// parts, falling back to `default_schema` when unqualified.
#[must_use]
pub fn split_schema_obj(qualified: &str, default_schema: &str) -> (String, String) {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = qualified.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    if parts.len() >= 2 {
        let name = parts.pop().unwrap_or_default();
        (parts.join("."), name)
    } else {
        (default_schema.to_string(), parts.pop().unwrap_or_default())
    }
}

/// Renders a list of column names as a quoted, comma-separated list.
#[must_use]
pub fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_id(c))
        .collect::<Vec<_>>()
        .join(", ")
}
