//! Access privileges: decoding of catalog `aclitem` strings, the wire
//! representation, and GRANT/REVOKE generation.
//!
//! On the wire a privilege list looks like:
//!
//! ```yaml
//! privileges:
//!   - alice: [all]
//!   - PUBLIC: [select]
//!   - bob: [select, {insert: {grantable: true}}]
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

use crate::ident::quote_id;
use crate::key::ObjectKind;

/// Pseudo-role granting to everybody.
pub const PUBLIC: &str = "PUBLIC";

const ACL_CODES: &[(char, &str)] = &[
    ('r', "select"),
    ('a', "insert"),
    ('w', "update"),
    ('d', "delete"),
    ('D', "truncate"),
    ('x', "references"),
    ('t', "trigger"),
    ('X', "execute"),
    ('U', "usage"),
    ('C', "create"),
    ('c', "connect"),
    ('T', "temporary"),
];

/// Privileges that make up `ALL` for an object kind, in display order.
#[must_use]
pub fn all_privileges(kind: ObjectKind) -> &'static [&'static str] {
    match kind {
        ObjectKind::Table
        | ObjectKind::View
        | ObjectKind::MaterializedView
        | ObjectKind::ForeignTable => &[
            "select",
            "insert",
            "update",
            "delete",
            "truncate",
            "references",
            "trigger",
        ],
        ObjectKind::Sequence => &["select", "update", "usage"],
        ObjectKind::Function | ObjectKind::Aggregate => &["execute"],
        ObjectKind::Schema => &["usage", "create"],
        _ => &["usage"],
    }
}

/// One privilege held by a grantee.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Grant {
    /// Lower-case privilege name, or `all`.
    pub name: String,
    /// Whether the grantee may grant it onwards.
    pub grantable: bool,
}

/// The privileges held by one grantee on one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Privilege {
    /// Role name, or `PUBLIC`.
    pub grantee: String,
    /// Granted privileges.
    pub grants: Vec<Grant>,
}

impl Privilege {
    /// Creates a privilege entry with plain (non-grantable) privileges.
    #[must_use]
    pub fn new(grantee: impl Into<String>, names: &[&str]) -> Self {
        Self {
            grantee: grantee.into(),
            grants: names
                .iter()
                .map(|n| Grant {
                    name: (*n).to_string(),
                    grantable: false,
                })
                .collect(),
        }
    }

    /// Expands `all` and returns the `(privilege, grantable)` set.
    fn expanded(&self, kind: ObjectKind) -> BTreeMap<String, bool> {
        let mut out = BTreeMap::new();
        for grant in &self.grants {
            if grant.name == "all" {
                for name in all_privileges(kind) {
                    out.insert((*name).to_string(), grant.grantable);
                }
            } else {
                out.insert(grant.name.clone(), grant.grantable);
            }
        }
        out
    }
}

impl Serialize for Privilege {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let items: Vec<Value> = self
            .grants
            .iter()
            .map(|g| {
                if g.grantable {
                    let mut opts = Mapping::new();
                    opts.insert(Value::from("grantable"), Value::Bool(true));
                    let mut item = Mapping::new();
                    item.insert(Value::from(g.name.clone()), Value::Mapping(opts));
                    Value::Mapping(item)
                } else {
                    Value::from(g.name.clone())
                }
            })
            .collect();
        let mut map = Mapping::new();
        map.insert(Value::from(self.grantee.clone()), Value::Sequence(items));
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Privilege {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Mapping::deserialize(deserializer)?;
        let mut entries = map.into_iter();
        let (grantee, list) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(D::Error::custom("privilege entry must have exactly one grantee")),
        };
        let grantee = grantee
            .as_str()
            .ok_or_else(|| D::Error::custom("grantee must be a string"))?
            .to_string();
        let Value::Sequence(items) = list else {
            return Err(D::Error::custom("privileges must be a list"));
        };
        let mut grants = Vec::new();
        for item in items {
            match item {
                Value::String(name) => grants.push(Grant {
                    name: name.to_lowercase(),
                    grantable: false,
                }),
                Value::Mapping(m) => {
                    for (name, opts) in m {
                        let name = name
                            .as_str()
                            .ok_or_else(|| D::Error::custom("privilege must be a string"))?;
                        let grantable = opts
                            .get("grantable")
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        grants.push(Grant {
                            name: name.to_lowercase(),
                            grantable,
                        });
                    }
                }
                _ => return Err(D::Error::custom("invalid privilege item")),
            }
        }
        Ok(Self { grantee, grants })
    }
}

/// Decodes catalog `aclitem` strings (`alice=arw*/owner`) into privilege
/// entries, collapsing complete sets into `all`.
#[must_use]
pub fn parse_acl(items: &[String], kind: ObjectKind) -> Vec<Privilege> {
    let full = all_privileges(kind);
    let mut result = Vec::new();
    for item in items {
        let Some((grantee, rest)) = item.split_once('=') else {
            continue;
        };
        let codes = rest.split('/').next().unwrap_or_default();
        let grantee = match grantee.trim_matches('"') {
            "" => PUBLIC.to_string(),
            other => other.to_string(),
        };
        let mut grants: Vec<Grant> = Vec::new();
        let mut chars = codes.chars().peekable();
        while let Some(c) = chars.next() {
            let grantable = chars.peek() == Some(&'*');
            if grantable {
                chars.next();
            }
            if let Some((_, name)) = ACL_CODES.iter().find(|(code, _)| *code == c) {
                grants.push(Grant {
                    name: (*name).to_string(),
                    grantable,
                });
            }
        }
        let has_all = full.iter().all(|p| grants.iter().any(|g| g.name == *p));
        let uniform = grants.windows(2).all(|w| w[0].grantable == w[1].grantable);
        if has_all && uniform && grants.len() == full.len() {
            let grantable = grants.first().is_some_and(|g| g.grantable);
            grants = vec![Grant {
                name: "all".to_string(),
                grantable,
            }];
        } else {
            grants.sort_by_key(|g| full.iter().position(|p| *p == g.name).unwrap_or(usize::MAX));
        }
        result.push(Privilege { grantee, grants });
    }
    result
}

fn render_list(kind: ObjectKind, names: &BTreeSet<String>) -> String {
    let full = all_privileges(kind);
    if full.len() == names.len() && full.iter().all(|p| names.contains(*p)) {
        return "ALL".to_string();
    }
    let mut ordered: Vec<&String> = names.iter().collect();
    ordered.sort_by_key(|n| full.iter().position(|p| p == n).unwrap_or(usize::MAX));
    ordered
        .iter()
        .map(|n| n.to_uppercase())
        .collect::<Vec<_>>()
        .join(", ")
}

fn role(grantee: &str) -> String {
    if grantee == PUBLIC {
        PUBLIC.to_string()
    } else {
        quote_id(grantee)
    }
}

/// Generates the GRANT/REVOKE statements turning `old` into `new` on the
/// object `ident` of the given kind.
#[must_use]
pub fn diff_privileges(
    kind: ObjectKind,
    ident: &str,
    old: &[Privilege],
    new: &[Privilege],
) -> Vec<String> {
    let target = format!("{} {}", kind.grant_name(), ident);
    let old_map: BTreeMap<&str, BTreeMap<String, bool>> = old
        .iter()
        .map(|p| (p.grantee.as_str(), p.expanded(kind)))
        .collect();
    let new_map: BTreeMap<&str, BTreeMap<String, bool>> = new
        .iter()
        .map(|p| (p.grantee.as_str(), p.expanded(kind)))
        .collect();
    let empty = BTreeMap::new();
    let grantees: BTreeSet<&str> = old_map.keys().chain(new_map.keys()).copied().collect();

    let mut stmts = Vec::new();
    for grantee in grantees {
        let before = old_map.get(grantee).unwrap_or(&empty);
        let after = new_map.get(grantee).unwrap_or(&empty);

        let revoked: BTreeSet<String> = before
            .keys()
            .filter(|p| !after.contains_key(*p))
            .cloned()
            .collect();
        let revoked_option: BTreeSet<String> = before
            .iter()
            .filter(|(p, g)| **g && after.get(*p) == Some(&false))
            .map(|(p, _)| p.clone())
            .collect();
        let granted: BTreeSet<String> = after
            .iter()
            .filter(|(p, g)| !**g && !before.contains_key(*p))
            .map(|(p, _)| p.clone())
            .collect();
        let granted_option: BTreeSet<String> = after
            .iter()
            .filter(|(p, g)| **g && before.get(*p) != Some(&true))
            .map(|(p, _)| p.clone())
            .collect();

        if !revoked.is_empty() {
            stmts.push(format!(
                "REVOKE {} ON {} FROM {}",
                render_list(kind, &revoked),
                target,
                role(grantee)
            ));
        }
        if !revoked_option.is_empty() {
            stmts.push(format!(
                "REVOKE GRANT OPTION FOR {} ON {} FROM {}",
                render_list(kind, &revoked_option),
                target,
                role(grantee)
            ));
        }
        if !granted.is_empty() {
            stmts.push(format!(
                "GRANT {} ON {} TO {}",
                render_list(kind, &granted),
                target,
                role(grantee)
            ));
        }
        if !granted_option.is_empty() {
            stmts.push(format!(
                "GRANT {} ON {} TO {} WITH GRANT OPTION",
                render_list(kind, &granted_option),
                target,
                role(grantee)
            ));
        }
    }
    stmts
}
