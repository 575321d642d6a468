//! Executing operations against a schema.

use indexmap::IndexMap;
use tracing::{debug_span, trace};

use crate::schema::{
    Column, Constraint, DefaultValue, Enum, ForeignKeyAction, Index, Table,
};
use crate::{
    ApplyError, ColumnField, ConstraintField, EnumField, IndexField, OpKind, Operation, Schema,
    SchemaPath, TableField, ValueError,
};

/// Apply `ops` in order to a copy of `schema`.
///
/// Relationships are re-derived from the resulting foreign keys. The first
/// failing operation aborts the whole batch.
pub fn apply(schema: &Schema, ops: &[Operation]) -> Result<Schema, ApplyError> {
    let _span = debug_span!("apply", count = ops.len()).entered();

    let mut schema = schema.clone();
    for op in ops {
        apply_operation(&mut schema, op)?;
    }
    schema.refresh_relationships();
    Ok(schema)
}

/// Apply a single operation in place.
///
/// The path is authoritative for names: an `add` stores the entity under the
/// name in its path, whatever the payload says.
pub fn apply_operation(schema: &mut Schema, op: &Operation) -> Result<(), ApplyError> {
    let path = op.target()?;
    trace!(%op, "applying");

    match (op.op, path) {
        (OpKind::Add, SchemaPath::Table { table }) => {
            let mut value: Table = op.value()?;
            value.name = table.clone();
            insert_new(&mut schema.tables, "table", table, value)
        }
        (OpKind::Remove, SchemaPath::Table { table }) => {
            remove(&mut schema.tables, "table", &table)
        }
        (OpKind::Replace, SchemaPath::TableField { table, field }) => {
            match field {
                TableField::Name => {
                    let to: String = op.value()?;
                    rename(&mut schema.tables, "table", &table, to, |t, name| t.name = name)
                }
                TableField::Comment => {
                    get_mut(&mut schema.tables, "table", &table)?.comment = op.nullable()?;
                    Ok(())
                }
            }
        }

        (OpKind::Add, SchemaPath::Column { table, column }) => {
            let mut value: Column = op.value()?;
            value.name = column.clone();
            let table = get_mut(&mut schema.tables, "table", &table)?;
            insert_new(&mut table.columns, "column", column, value)
        }
        (OpKind::Remove, SchemaPath::Column { table, column }) => {
            let table = get_mut(&mut schema.tables, "table", &table)?;
            remove(&mut table.columns, "column", &column)
        }
        (OpKind::Replace, SchemaPath::ColumnField { table, column, field }) => {
            let table = get_mut(&mut schema.tables, "table", &table)?;
            replace_column_field(table, &column, field, op)
        }

        (OpKind::Add, SchemaPath::Index { table, index }) => {
            let mut value: Index = op.value()?;
            value.name = index.clone();
            let table = get_mut(&mut schema.tables, "table", &table)?;
            insert_new(&mut table.indexes, "index", index, value)
        }
        (OpKind::Remove, SchemaPath::Index { table, index }) => {
            let table = get_mut(&mut schema.tables, "table", &table)?;
            remove(&mut table.indexes, "index", &index)
        }
        (OpKind::Replace, SchemaPath::IndexField { table, index, field }) => {
            let table = get_mut(&mut schema.tables, "table", &table)?;
            if field == IndexField::Name {
                let to: String = op.value()?;
                return rename(&mut table.indexes, "index", &index, to, |i, name| i.name = name);
            }
            let index = get_mut(&mut table.indexes, "index", &index)?;
            match field {
                IndexField::Name => {}
                IndexField::Unique => index.unique = op.value()?,
                IndexField::Type => index.ty = op.nullable()?.unwrap_or_default(),
                IndexField::Columns => index.columns = op.value()?,
            }
            Ok(())
        }

        (OpKind::Add, SchemaPath::Constraint { table, constraint }) => {
            let mut value: Constraint = op.value()?;
            value.set_name(&constraint);
            let table = get_mut(&mut schema.tables, "table", &table)?;
            insert_new(&mut table.constraints, "constraint", constraint, value)
        }
        (OpKind::Remove, SchemaPath::Constraint { table, constraint }) => {
            let table = get_mut(&mut schema.tables, "table", &table)?;
            remove(&mut table.constraints, "constraint", &constraint)
        }
        (OpKind::Replace, SchemaPath::ConstraintField { table, constraint, field }) => {
            let table = get_mut(&mut schema.tables, "table", &table)?;
            if field == ConstraintField::Name {
                let to: String = op.value()?;
                return rename(&mut table.constraints, "constraint", &constraint, to, |c, name| {
                    c.set_name(name)
                });
            }
            let constraint = get_mut(&mut table.constraints, "constraint", &constraint)?;
            replace_constraint_field(constraint, field, op)
        }

        (OpKind::Add, SchemaPath::Enum { name }) => {
            let mut value: Enum = op.value()?;
            value.name = name.clone();
            insert_new(&mut schema.enums, "enum", name, value)
        }
        (OpKind::Remove, SchemaPath::Enum { name }) => remove(&mut schema.enums, "enum", &name),
        (OpKind::Replace, SchemaPath::EnumField { name, field }) => match field {
            EnumField::Name => {
                let to: String = op.value()?;
                rename(&mut schema.enums, "enum", &name, to, |e, name| e.name = name)
            }
            EnumField::Comment => {
                get_mut(&mut schema.enums, "enum", &name)?.comment = op.nullable()?;
                Ok(())
            }
            EnumField::Values => {
                get_mut(&mut schema.enums, "enum", &name)?.values = op.value()?;
                Ok(())
            }
        },
        (OpKind::Add, SchemaPath::EnumValue { name, value }) => {
            let e = get_mut(&mut schema.enums, "enum", &name)?;
            if e.values.contains(&value) {
                return Err(ApplyError::AlreadyExists {
                    entity: "enum value",
                    name: format!("{name}.{value}"),
                });
            }
            e.values.push(value);
            Ok(())
        }
        (OpKind::Remove, SchemaPath::EnumValue { name, value }) => {
            let e = get_mut(&mut schema.enums, "enum", &name)?;
            let Some(at) = e.values.iter().position(|v| *v == value) else {
                return Err(ApplyError::NotFound {
                    entity: "enum value",
                    name: format!("{name}.{value}"),
                });
            };
            e.values.remove(at);
            Ok(())
        }

        (OpKind::Replace, _) => Err(ApplyError::Unsupported {
            operation: op.to_string(),
            reason: "replace needs a field path; use remove and add for whole entities".into(),
        }),
        (OpKind::Add | OpKind::Remove, _) => Err(ApplyError::Unsupported {
            operation: op.to_string(),
            reason: format!("{} works on whole entities, not fields", op.op),
        }),
    }
}

fn replace_column_field(
    table: &mut Table,
    column: &str,
    field: ColumnField,
    op: &Operation,
) -> Result<(), ApplyError> {
    if field == ColumnField::Name {
        let to: String = op.value()?;
        return rename(&mut table.columns, "column", column, to, |c, name| c.name = name);
    }

    let col = get_mut(&mut table.columns, "column", column)?;
    match field {
        ColumnField::Name => {}
        ColumnField::Type => col.ty = op.value()?,
        ColumnField::NotNull => col.not_null = op.value()?,
        ColumnField::Default => col.default = op.nullable::<DefaultValue>()?,
        ColumnField::Check => {
            col.check = op.nullable::<String>()?.filter(|c| !c.trim().is_empty());
        }
        ColumnField::Comment => col.comment = op.nullable()?,
        ColumnField::Unique => col.unique = op.value()?,
    }
    Ok(())
}

fn replace_constraint_field(
    constraint: &mut Constraint,
    field: ConstraintField,
    op: &Operation,
) -> Result<(), ApplyError> {
    let kind = constraint.kind();
    let mismatch = || ValueError::Invalid {
        path: op.path.clone(),
        reason: format!("a {kind} constraint has no `{field}`"),
    };

    match (constraint, field) {
        (_, ConstraintField::Name) => {}
        (Constraint::Check(check), ConstraintField::Detail) => check.detail = op.value()?,
        (
            Constraint::PrimaryKey(key) | Constraint::Unique(key),
            ConstraintField::ColumnNames,
        ) => key.column_names = op.value()?,
        (Constraint::ForeignKey(fk), field) => match field {
            ConstraintField::ColumnNames => fk.column_names = op.value()?,
            ConstraintField::TargetTableName => fk.target_table_name = op.value()?,
            ConstraintField::TargetColumnNames => fk.target_column_names = op.value()?,
            ConstraintField::DeleteConstraint => {
                fk.delete_constraint = op.value::<ForeignKeyAction>()?
            }
            ConstraintField::UpdateConstraint => {
                fk.update_constraint = op.value::<ForeignKeyAction>()?
            }
            ConstraintField::Name | ConstraintField::Detail => return Err(mismatch().into()),
        },
        _ => return Err(mismatch().into()),
    }
    Ok(())
}

fn get_mut<'m, T>(
    map: &'m mut IndexMap<String, T>,
    entity: &'static str,
    name: &str,
) -> Result<&'m mut T, ApplyError> {
    map.get_mut(name).ok_or_else(|| ApplyError::NotFound {
        entity,
        name: name.to_string(),
    })
}

fn insert_new<T>(
    map: &mut IndexMap<String, T>,
    entity: &'static str,
    name: String,
    value: T,
) -> Result<(), ApplyError> {
    if map.contains_key(&name) {
        return Err(ApplyError::AlreadyExists { entity, name });
    }
    map.insert(name, value);
    Ok(())
}

fn remove<T>(
    map: &mut IndexMap<String, T>,
    entity: &'static str,
    name: &str,
) -> Result<(), ApplyError> {
    match map.shift_remove(name) {
        Some(_) => Ok(()),
        None => Err(ApplyError::NotFound {
            entity,
            name: name.to_string(),
        }),
    }
}

/// Rekey an entry in place, keeping its position.
fn rename<T>(
    map: &mut IndexMap<String, T>,
    entity: &'static str,
    from: &str,
    to: String,
    set_name: impl FnOnce(&mut T, String),
) -> Result<(), ApplyError> {
    if from != to && map.contains_key(&to) {
        return Err(ApplyError::AlreadyExists { entity, name: to });
    }
    let Some((at, _, mut value)) = map.shift_remove_full(from) else {
        return Err(ApplyError::NotFound {
            entity,
            name: from.to_string(),
        });
    };
    set_name(&mut value, to.clone());
    map.shift_insert(at, to, value);
    Ok(())
}
