//! Operators, operator families and operator classes.

use serde::{Deserialize, Serialize};

use super::{is_false, recreate_if_changed, type_dep, Alteration, DbObject, Meta};
use crate::database::Database;
use crate::error::Result;
use crate::ident::{quote_id, DEFAULT_SCHEMA};
use crate::key::{ObjectKey, ObjectKind};

/// Operator names are symbols and are never quoted.
fn operator_qualname(schema: &str, name: &str) -> String {
    if schema == DEFAULT_SCHEMA {
        name.to_string()
    } else {
        format!("{}.{name}", quote_id(schema))
    }
}

/// A user-defined operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    /// Owning schema.
    pub schema: String,
    /// Operator symbol.
    pub name: String,
    /// Left operand type; absent for prefix operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leftarg: Option<String>,
    /// Right operand type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rightarg: Option<String>,
    /// Implementing function.
    pub procedure: String,
    /// Commutator operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commutator: Option<String>,
    /// Negator operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negator: Option<String>,
    /// Restriction selectivity estimator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict: Option<String>,
    /// Join selectivity estimator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    /// Whether the operator supports hash joins.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hashes: bool,
    /// Whether the operator supports merge joins.
    #[serde(default, skip_serializing_if = "is_false")]
    pub merges: bool,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl Operator {
    /// Operand types as used in the key and in `DROP OPERATOR`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!(
            "{}, {}",
            self.leftarg.as_deref().unwrap_or("NONE"),
            self.rightarg.as_deref().unwrap_or("NONE")
        )
    }
}

impl DbObject for Operator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Operator
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::scoped(ObjectKind::Operator, self.schema.clone(), self.name.clone())
            .with_signature(self.signature())
    }

    fn set_key(&mut self, key: &ObjectKey) {
        if let Some(schema) = &key.schema {
            self.schema.clone_from(schema);
        }
        self.name.clone_from(&key.name);
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn extern_key(&self) -> String {
        format!("operator {}({})", self.name, self.signature())
    }

    fn qualname(&self) -> String {
        operator_qualname(&self.schema, &self.name)
    }

    fn identifier(&self) -> String {
        format!("{}({})", self.qualname(), self.signature())
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut opts = vec![format!("PROCEDURE = {}", self.procedure)];
        if let Some(left) = &self.leftarg {
            opts.push(format!("LEFTARG = {left}"));
        }
        if let Some(right) = &self.rightarg {
            opts.push(format!("RIGHTARG = {right}"));
        }
        if let Some(op) = &self.commutator {
            opts.push(format!("COMMUTATOR = OPERATOR({op})"));
        }
        if let Some(op) = &self.negator {
            opts.push(format!("NEGATOR = OPERATOR({op})"));
        }
        if let Some(func) = &self.restrict {
            opts.push(format!("RESTRICT = {func}"));
        }
        if let Some(func) = &self.join {
            opts.push(format!("JOIN = {func}"));
        }
        if self.hashes {
            opts.push("HASHES".to_string());
        }
        if self.merges {
            opts.push("MERGES".to_string());
        }
        vec![format!(
            "CREATE OPERATOR {} (\n    {})",
            self.qualname(),
            opts.join(",\n    ")
        )]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        deps.extend(db.function_ref(&self.procedure, &self.schema));
        for arg in [&self.leftarg, &self.rightarg].into_iter().flatten() {
            deps.extend(type_dep(db, arg, &self.schema));
        }
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// An operator family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorFamily {
    /// Owning schema.
    pub schema: String,
    /// Family name.
    pub name: String,
    /// Index access method; part of the key.
    pub index_method: String,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for OperatorFamily {
    fn kind(&self) -> ObjectKind {
        ObjectKind::OperatorFamily
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::scoped(
            ObjectKind::OperatorFamily,
            self.schema.clone(),
            self.name.clone(),
        )
        .with_signature(self.index_method.clone())
    }

    fn set_key(&mut self, key: &ObjectKey) {
        if let Some(schema) = &key.schema {
            self.schema.clone_from(schema);
        }
        self.name.clone_from(&key.name);
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn extern_key(&self) -> String {
        format!("operator family {} using {}", self.name, self.index_method)
    }

    fn identifier(&self) -> String {
        format!("{} USING {}", self.qualname(), self.index_method)
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        vec![format!("CREATE OPERATOR FAMILY {}", self.identifier())]
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

/// An operator class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorClass {
    /// Owning schema.
    pub schema: String,
    /// Class name.
    pub name: String,
    /// Index access method; part of the key.
    pub index_method: String,
    /// Indexed data type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether this is the default class for the type.
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,
    /// Operator family, when not the class's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Storage type, when different from the indexed type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Operators by strategy number (`1 <`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operators: Vec<String>,
    /// Support functions by number (`1 btint4cmp(integer,integer)`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<String>,
    /// Shared attributes.
    #[serde(flatten)]
    pub meta: Meta,
}

impl DbObject for OperatorClass {
    fn kind(&self) -> ObjectKind {
        ObjectKind::OperatorClass
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::scoped(
            ObjectKind::OperatorClass,
            self.schema.clone(),
            self.name.clone(),
        )
        .with_signature(self.index_method.clone())
    }

    fn set_key(&mut self, key: &ObjectKey) {
        if let Some(schema) = &key.schema {
            self.schema.clone_from(schema);
        }
        self.name.clone_from(&key.name);
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn extern_key(&self) -> String {
        format!("operator class {} using {}", self.name, self.index_method)
    }

    fn identifier(&self) -> String {
        format!("{} USING {}", self.qualname(), self.index_method)
    }

    fn create_sql(&self, _db: &Database) -> Vec<String> {
        let mut sql = format!(
            "CREATE OPERATOR CLASS {} {}FOR TYPE {} USING {}",
            self.qualname(),
            if self.default { "DEFAULT " } else { "" },
            self.type_name,
            self.index_method
        );
        if let Some(family) = &self.family {
            sql.push_str(&format!(" FAMILY {family}"));
        }
        let mut items: Vec<String> = self
            .operators
            .iter()
            .map(|op| format!("OPERATOR {op}"))
            .collect();
        items.extend(self.functions.iter().map(|f| format!("FUNCTION {f}")));
        if let Some(storage) = &self.storage {
            items.push(format!("STORAGE {storage}"));
        }
        sql.push_str(&format!(" AS\n    {}", items.join(",\n    ")));
        vec![sql]
    }

    fn implied_deps(&self, db: &Database) -> Vec<ObjectKey> {
        let mut deps = vec![ObjectKey::new(ObjectKind::Schema, self.schema.as_str())];
        if let Some(family) = &self.family {
            let (schema, name) = crate::ident::split_schema_obj(family, &self.schema);
            let key = ObjectKey::scoped(ObjectKind::OperatorFamily, schema, name)
                .with_signature(self.index_method.clone());
            if db.operator_families.contains_key(&key) {
                deps.push(key);
            }
        }
        deps.extend(type_dep(db, &self.type_name, &self.schema));
        deps
    }

    fn alter_sql(&self, new: &Self, _db: &Database) -> Result<Alteration> {
        Ok(recreate_if_changed(self, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus() -> Operator {
        Operator {
            schema: "public".to_string(),
            name: "+".to_string(),
            leftarg: Some("integer".to_string()),
            rightarg: Some("integer".to_string()),
            procedure: "int4pl".to_string(),
            commutator: Some("+".to_string()),
            negator: None,
            restrict: None,
            join: None,
            hashes: false,
            merges: false,
            meta: Meta::default(),
        }
    }

    #[test]
    fn test_operator_sql() {
        let op = plus();
        assert_eq!(op.extern_key(), "operator +(integer, integer)");
        assert_eq!(
            op.create_sql(&Database::default()),
            vec!["CREATE OPERATOR + (\n    PROCEDURE = int4pl,\n    LEFTARG = integer,\n    RIGHTARG = integer,\n    COMMUTATOR = OPERATOR(+))"]
        );
        assert_eq!(op.drop_sql(), vec!["DROP OPERATOR +(integer, integer)"]);
    }

    #[test]
    fn test_operator_change_recreates() {
        let old = plus();
        let mut new = plus();
        new.hashes = true;
        assert_eq!(
            old.alter_sql(&new, &Database::default()).unwrap(),
            Alteration::Recreate
        );
    }

    #[test]
    fn test_operator_class_sql() {
        let oc = OperatorClass {
            schema: "public".to_string(),
            name: "oc1".to_string(),
            index_method: "btree".to_string(),
            type_name: "integer".to_string(),
            default: false,
            family: None,
            storage: None,
            operators: vec!["1 <".to_string(), "3 =".to_string()],
            functions: vec!["1 btint4cmp(integer,integer)".to_string()],
            meta: Meta::default(),
        };
        assert_eq!(oc.extern_key(), "operator class oc1 using btree");
        assert_eq!(
            oc.create_sql(&Database::default()),
            vec!["CREATE OPERATOR CLASS oc1 FOR TYPE integer USING btree AS\n    OPERATOR 1 <,\n    OPERATOR 3 =,\n    FUNCTION 1 btint4cmp(integer,integer)"]
        );
        assert_eq!(oc.drop_sql(), vec!["DROP OPERATOR CLASS oc1 USING btree"]);
    }
}
