//! Structured patch operations against the IR.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{Column, Constraint, DefaultValue, Enum, Index, Table};
use crate::{ColumnField, EnumField, PathError, SchemaPath, TableField, ValueError};

/// What an operation does at its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Create a whole entity
    Add,
    /// Delete a whole entity
    Remove,
    /// Overwrite one field of an existing entity
    Replace,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Remove => "remove",
            OpKind::Replace => "replace",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `add`/`remove`/`replace` patch.
///
/// `path` is kept as the string the operation was built or received with, so
/// malformed operations from outside still deserialize and fail later with a
/// [`PathError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op: OpKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Operation {
    pub fn add(path: &SchemaPath, value: Value) -> Self {
        Self {
            op: OpKind::Add,
            path: path.to_string(),
            value: Some(value),
        }
    }

    pub fn remove(path: &SchemaPath) -> Self {
        Self {
            op: OpKind::Remove,
            path: path.to_string(),
            value: None,
        }
    }

    pub fn replace(path: &SchemaPath, value: Value) -> Self {
        Self {
            op: OpKind::Replace,
            path: path.to_string(),
            value: Some(value),
        }
    }

    pub fn add_table(table: &Table) -> Self {
        Self::add(&SchemaPath::table(&table.name), to_value(table))
    }

    pub fn remove_table(table: &str) -> Self {
        Self::remove(&SchemaPath::table(table))
    }

    pub fn rename_table(from: &str, to: &str) -> Self {
        Self::replace(&SchemaPath::table_field(from, TableField::Name), to.into())
    }

    pub fn replace_table_comment(table: &str, comment: Option<&str>) -> Self {
        Self::replace(
            &SchemaPath::table_field(table, TableField::Comment),
            to_value(&comment),
        )
    }

    pub fn add_column(table: &str, column: &Column) -> Self {
        Self::add(&SchemaPath::column(table, &column.name), to_value(column))
    }

    pub fn remove_column(table: &str, column: &str) -> Self {
        Self::remove(&SchemaPath::column(table, column))
    }

    pub fn rename_column(table: &str, from: &str, to: &str) -> Self {
        Self::replace_column(table, from, ColumnField::Name, to.into())
    }

    pub fn replace_column(table: &str, column: &str, field: ColumnField, value: Value) -> Self {
        Self::replace(&SchemaPath::column_field(table, column, field), value)
    }

    pub fn set_column_default(table: &str, column: &str, default: Option<&DefaultValue>) -> Self {
        Self::replace_column(table, column, ColumnField::Default, to_value(&default))
    }

    pub fn add_index(table: &str, index: &Index) -> Self {
        Self::add(&SchemaPath::index(table, &index.name), to_value(index))
    }

    pub fn remove_index(table: &str, index: &str) -> Self {
        Self::remove(&SchemaPath::index(table, index))
    }

    pub fn rename_index(table: &str, from: &str, to: &str) -> Self {
        Self::replace(
            &SchemaPath::index_field(table, from, crate::IndexField::Name),
            to.into(),
        )
    }

    pub fn add_constraint(table: &str, constraint: &Constraint) -> Self {
        Self::add(
            &SchemaPath::constraint(table, constraint.name()),
            to_value(constraint),
        )
    }

    pub fn remove_constraint(table: &str, constraint: &str) -> Self {
        Self::remove(&SchemaPath::constraint(table, constraint))
    }

    pub fn rename_constraint(table: &str, from: &str, to: &str) -> Self {
        Self::replace(
            &SchemaPath::constraint_field(table, from, crate::ConstraintField::Name),
            to.into(),
        )
    }

    pub fn add_enum(e: &Enum) -> Self {
        Self::add(&SchemaPath::enum_type(&e.name), to_value(e))
    }

    pub fn remove_enum(name: &str) -> Self {
        Self::remove(&SchemaPath::enum_type(name))
    }

    pub fn rename_enum(from: &str, to: &str) -> Self {
        Self::replace(&SchemaPath::enum_field(from, EnumField::Name), to.into())
    }

    pub fn replace_enum_comment(name: &str, comment: Option<&str>) -> Self {
        Self::replace(
            &SchemaPath::enum_field(name, EnumField::Comment),
            to_value(&comment),
        )
    }

    pub fn replace_enum_values(name: &str, values: &[String]) -> Self {
        Self::replace(
            &SchemaPath::enum_field(name, EnumField::Values),
            to_value(&values),
        )
    }

    pub fn add_enum_value(name: &str, value: &str) -> Self {
        Self::add(&SchemaPath::enum_value(name, value), value.into())
    }

    pub fn remove_enum_value(name: &str, value: &str) -> Self {
        Self::remove(&SchemaPath::enum_value(name, value))
    }

    /// Parse [`Operation::path`].
    pub fn target(&self) -> Result<SchemaPath, PathError> {
        self.path.parse()
    }

    /// Decode the payload, which must be present.
    pub(crate) fn value<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        let value = self.value.as_ref().ok_or_else(|| ValueError::Missing {
            op: self.op,
            path: self.path.clone(),
        })?;
        self.decode(value)
    }

    /// Decode a payload where a missing value or `null` means "unset".
    pub(crate) fn nullable<T: DeserializeOwned>(&self) -> Result<Option<T>, ValueError> {
        match &self.value {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.decode(value).map(Some),
        }
    }

    fn decode<T: DeserializeOwned>(&self, value: &Value) -> Result<T, ValueError> {
        T::deserialize(value).map_err(|e| ValueError::Invalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.path)
    }
}

// IR types always serialize
fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ForeignKeyAction;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let op = Operation::add_column("users", &Column::new("email", "text").not_null());
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({
                "op": "add",
                "path": "/tables/users/columns/email",
                "value": {
                    "name": "email",
                    "type": "text",
                    "default": null,
                    "notNull": true,
                    "unique": false,
                    "check": null,
                    "comment": null,
                }
            })
        );

        let op = Operation::remove_table("users");
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "remove", "path": "/tables/users"})
        );
    }

    #[test]
    fn test_deserialize_external_operation() {
        let op: Operation = serde_json::from_value(json!({
            "op": "replace",
            "path": "/tables/posts/constraints/posts_user_fk/deleteConstraint",
            "value": "CASCADE",
        }))
        .unwrap();
        assert_eq!(op.op, OpKind::Replace);
        assert_eq!(op.value::<ForeignKeyAction>(), Ok(ForeignKeyAction::Cascade));
        assert_eq!(
            op.to_string(),
            "replace /tables/posts/constraints/posts_user_fk/deleteConstraint"
        );
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let op = Operation {
            op: OpKind::Add,
            path: "/tables/users".into(),
            value: None,
        };
        assert_eq!(
            op.value::<Table>(),
            Err(ValueError::Missing {
                op: OpKind::Add,
                path: "/tables/users".into(),
            })
        );

        let op = Operation::replace(
            &SchemaPath::column_field("users", "id", ColumnField::NotNull),
            json!("yes"),
        );
        assert!(matches!(op.value::<bool>(), Err(ValueError::Invalid { .. })));
    }

    #[test]
    fn test_nullable_values() {
        let op = Operation::replace_table_comment("users", None);
        assert_eq!(op.value, Some(Value::Null));
        assert_eq!(op.nullable::<String>(), Ok(None));

        let op = Operation::replace_table_comment("users", Some("people"));
        assert_eq!(op.nullable::<String>(), Ok(Some("people".to_string())));
    }
}
