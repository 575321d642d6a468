//! Render operations and schemas as PostgreSQL DDL.
//!
//! Each entity-level operation becomes one statement, or a few statements
//! separated by blank lines (`add table` carries its comments, constraints
//! and indexes along). Scalar `replace` operations map to the narrow
//! `ALTER ... SET/DROP` forms.
//!
//! Deparsing never emits SQL PostgreSQL can't run: operations with no DDL
//! equivalent, like changing a foreign key's `ON DELETE` action in place,
//! are reported as [`DeparseError::Unsupported`].

use tracing::{debug, debug_span};

use schemir_sql::{
    AlterTableAction, AlterTableStmt, AlterTypeAction, AlterTypeStmt, ColumnChange, ColumnDef,
    CommentStmt, ConstraintDef, CreateEnumStmt, CreateIndexStmt, CreateTableStmt, DropIndexStmt,
    DropTableStmt, DropTypeStmt, ForeignKeyDef, Literal, RenameIndexStmt, Stmt,
    inline_check_name, is_sql_expression, render_blocks, render_lines,
};

use crate::schema::{Column, Constraint, DefaultValue, Enum, Index, Table};
use crate::{
    ColumnField, ConstraintField, DeparseError, EnumField, IndexField, OpKind, Operation,
    Schema, SchemaPath, TableField,
};

/// DDL text plus the errors of the operations that couldn't be rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeparseOutput {
    pub ddl: String,
    pub errors: Vec<DeparseError>,
}

impl DeparseOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn push_block(&mut self, block: String) {
        if block.is_empty() {
            return;
        }
        if !self.ddl.is_empty() {
            self.ddl.push_str("\n\n");
        }
        self.ddl.push_str(&block);
    }
}

/// Something that can be rendered as DDL.
pub trait Deparse {
    fn deparse(&self) -> DeparseOutput;
}

/// Render an operation, a list of operations or a whole schema.
pub fn deparse<D: Deparse + ?Sized>(input: &D) -> DeparseOutput {
    input.deparse()
}

impl Deparse for Operation {
    fn deparse(&self) -> DeparseOutput {
        std::slice::from_ref(self).deparse()
    }
}

/// A failing operation contributes its error and no DDL; the rest of the
/// batch is still rendered.
impl Deparse for [Operation] {
    fn deparse(&self) -> DeparseOutput {
        let _span = debug_span!("deparse", count = self.len()).entered();

        let mut out = DeparseOutput::default();
        for op in self {
            match deparse_operation(op) {
                Ok(ddl) => out.push_block(ddl),
                Err(err) => {
                    debug!(%op, %err, "operation not deparsed");
                    out.errors.push(err);
                }
            }
        }
        out
    }
}

impl Deparse for Vec<Operation> {
    fn deparse(&self) -> DeparseOutput {
        self.as_slice().deparse()
    }
}

/// The whole schema, ordered so every reference resolves top to bottom:
/// enum types, tables with their comments, key and check constraints,
/// foreign keys, then indexes.
impl Deparse for Schema {
    fn deparse(&self) -> DeparseOutput {
        let _span = debug_span!("deparse_schema", tables = self.tables.len()).entered();

        let mut out = DeparseOutput::default();
        for e in self.enums.values() {
            for block in create_enum(e) {
                out.push_block(block);
            }
        }
        for table in self.iter_tables() {
            out.push_block(create_table(table).to_string());
            out.push_block(render_lines(&table_comments(table)));
        }

        let constraints = |foreign: bool| {
            self.iter_tables().flat_map(move |table| {
                table
                    .constraints
                    .values()
                    .filter(move |c| matches!(c, Constraint::ForeignKey(_)) == foreign)
                    .map(move |c| add_constraint(&table.name, c))
            })
        };
        for stmt in constraints(false).chain(constraints(true)) {
            out.push_block(stmt.to_string());
        }

        for table in self.iter_tables() {
            for index in table.indexes.values() {
                out.push_block(create_index(&table.name, index).to_string());
            }
        }
        out
    }
}

/// Render one operation.
pub fn deparse_operation(op: &Operation) -> Result<String, DeparseError> {
    let path = op.target()?;

    let stmts: Vec<Stmt> = match (op.op, path) {
        (OpKind::Add, SchemaPath::Table { table }) => {
            let mut value: Table = op.value()?;
            value.name = table;
            return Ok(table_blocks(&value).join("\n\n"));
        }
        (OpKind::Remove, SchemaPath::Table { table }) => {
            vec![DropTableStmt { name: table }.into()]
        }
        (OpKind::Replace, SchemaPath::TableField { table, field }) => match field {
            TableField::Name => vec![alter(&table, AlterTableAction::RenameTo(op.value()?))],
            TableField::Comment => vec![CommentStmt::table(table, op.nullable()?).into()],
        },

        (OpKind::Add, SchemaPath::Column { table, column }) => {
            let mut value: Column = op.value()?;
            value.name = column;
            let mut stmts = vec![alter(&table, AlterTableAction::AddColumn(column_def(&value)))];
            if let Some(comment) = value.comment {
                stmts.push(CommentStmt::column(&table, &value.name, Some(comment)).into());
            }
            stmts
        }
        (OpKind::Remove, SchemaPath::Column { table, column }) => {
            vec![alter(&table, AlterTableAction::DropColumn(column))]
        }
        (
            OpKind::Replace,
            SchemaPath::ColumnField {
                table,
                column,
                field,
            },
        ) => replace_column(op, &table, column, field)?,

        (OpKind::Add, SchemaPath::Index { table, index }) => {
            let mut value: Index = op.value()?;
            value.name = index;
            vec![create_index(&table, &value).into()]
        }
        (OpKind::Remove, SchemaPath::Index { index, .. }) => {
            vec![DropIndexStmt { name: index }.into()]
        }
        (OpKind::Replace, SchemaPath::IndexField { index, field, .. }) => match field {
            IndexField::Name => vec![
                RenameIndexStmt {
                    from: index,
                    to: op.value()?,
                }
                .into(),
            ],
            IndexField::Unique | IndexField::Type | IndexField::Columns => {
                return Err(unsupported(
                    op,
                    "indexes can't be altered in place; remove and re-add the index",
                ));
            }
        },

        (OpKind::Add, SchemaPath::Constraint { table, constraint }) => {
            let mut value: Constraint = op.value()?;
            value.set_name(constraint);
            vec![add_constraint(&table, &value).into()]
        }
        (OpKind::Remove, SchemaPath::Constraint { table, constraint }) => vec![alter(
            &table,
            AlterTableAction::DropConstraint {
                name: constraint,
                if_exists: false,
            },
        )],
        (
            OpKind::Replace,
            SchemaPath::ConstraintField {
                table,
                constraint,
                field,
            },
        ) => match field {
            ConstraintField::Name => vec![alter(
                &table,
                AlterTableAction::RenameConstraint {
                    from: constraint,
                    to: op.value()?,
                },
            )],
            ConstraintField::DeleteConstraint | ConstraintField::UpdateConstraint => {
                return Err(unsupported(
                    op,
                    "PostgreSQL can't change a foreign key's referential actions in place; \
                     remove and re-add the constraint",
                ));
            }
            ConstraintField::Detail
            | ConstraintField::ColumnNames
            | ConstraintField::TargetTableName
            | ConstraintField::TargetColumnNames => {
                return Err(unsupported(
                    op,
                    "constraints can't be altered in place; remove and re-add the constraint",
                ));
            }
        },

        (OpKind::Add, SchemaPath::Enum { name }) => {
            let mut value: Enum = op.value()?;
            value.name = name;
            return Ok(create_enum(&value).join("\n\n"));
        }
        (OpKind::Remove, SchemaPath::Enum { name }) => vec![DropTypeStmt { name }.into()],
        (OpKind::Replace, SchemaPath::EnumField { name, field }) => match field {
            EnumField::Name => vec![alter_type(name, AlterTypeAction::RenameTo(op.value()?))],
            EnumField::Comment => vec![CommentStmt::on_type(name, op.nullable()?).into()],
            EnumField::Values => {
                return Err(unsupported(
                    op,
                    "enum values can only be appended; use add on /enums/<name>/values/<value>",
                ));
            }
        },
        (OpKind::Add, SchemaPath::EnumValue { name, value }) => {
            vec![alter_type(name, AlterTypeAction::AddValue(value))]
        }
        (OpKind::Remove, SchemaPath::EnumValue { .. }) => {
            return Err(unsupported(op, "PostgreSQL can't drop a value from an enum type"));
        }

        (OpKind::Replace, _) => {
            return Err(unsupported(op, "replace needs a field path"));
        }
        (OpKind::Add | OpKind::Remove, _) => {
            return Err(unsupported(op, "add and remove work on whole entities"));
        }
    };

    Ok(render_blocks(&stmts))
}

fn replace_column(
    op: &Operation,
    table: &str,
    column: String,
    field: ColumnField,
) -> Result<Vec<Stmt>, DeparseError> {
    let change = |change: ColumnChange, column: String| {
        alter(table, AlterTableAction::AlterColumn { column, change })
    };

    let stmts = match field {
        ColumnField::Name => vec![alter(
            table,
            AlterTableAction::RenameColumn {
                from: column,
                to: op.value()?,
            },
        )],
        ColumnField::Type => vec![change(ColumnChange::Type(op.value()?), column)],
        ColumnField::NotNull => {
            let not_null: bool = op.value()?;
            let action = if not_null {
                ColumnChange::SetNotNull
            } else {
                ColumnChange::DropNotNull
            };
            vec![change(action, column)]
        }
        ColumnField::Default => match op.nullable::<DefaultValue>()? {
            Some(default) => vec![change(ColumnChange::SetDefault(literal(&default)), column)],
            None => vec![change(ColumnChange::DropDefault, column)],
        },
        ColumnField::Check => {
            let name = inline_check_name(&column);
            let drop = alter(
                table,
                AlterTableAction::DropConstraint {
                    name: name.clone(),
                    if_exists: true,
                },
            );
            match op.nullable::<String>()?.filter(|c| !c.trim().is_empty()) {
                Some(expr) => vec![
                    drop,
                    alter(
                        table,
                        AlterTableAction::AddConstraint {
                            name,
                            def: ConstraintDef::Check(expr),
                        },
                    ),
                ],
                None => vec![drop],
            }
        }
        ColumnField::Comment => vec![CommentStmt::column(table, column, op.nullable()?).into()],
        ColumnField::Unique => {
            // the UNIQUE constraint itself travels as a constraint operation
            debug!(%table, %column, "column unique flag has no DDL of its own");
            Vec::new()
        }
    };
    Ok(stmts)
}

/// The blocks an `add table` renders to.
fn table_blocks(table: &Table) -> Vec<String> {
    let mut blocks = vec![create_table(table).to_string()];

    let comments = table_comments(table);
    if !comments.is_empty() {
        blocks.push(render_lines(&comments));
    }
    for constraint in table.constraints.values() {
        blocks.push(add_constraint(&table.name, constraint).to_string());
    }
    for index in table.indexes.values() {
        blocks.push(create_index(&table.name, index).to_string());
    }
    blocks
}

fn create_table(table: &Table) -> Stmt {
    table
        .columns
        .values()
        .fold(CreateTableStmt::new(&table.name), |stmt, column| {
            stmt.column(column_def(column))
        })
        .into()
}

fn table_comments(table: &Table) -> Vec<Stmt> {
    let mut stmts = Vec::new();
    if let Some(comment) = &table.comment {
        stmts.push(CommentStmt::table(&table.name, Some(comment.clone())).into());
    }
    for column in table.columns.values() {
        if let Some(comment) = &column.comment {
            stmts.push(CommentStmt::column(&table.name, &column.name, Some(comment.clone())).into());
        }
    }
    stmts
}

fn column_def(column: &Column) -> ColumnDef {
    let def = ColumnDef::new(&column.name, &column.ty)
        .not_null(column.not_null)
        .default_value(column.default.as_ref().map(literal));
    match column.check.as_deref().map(str::trim) {
        Some(expr) if !expr.is_empty() => def.check(inline_check_name(&column.name), expr),
        _ => def,
    }
}

/// String defaults that look like SQL expressions (`now()`,
/// `CURRENT_TIMESTAMP`) are emitted raw.
fn literal(value: &DefaultValue) -> Literal {
    match value {
        DefaultValue::Boolean(b) => Literal::Bool(*b),
        DefaultValue::Number(n) => Literal::Number(n.to_string()),
        DefaultValue::String(s) if is_sql_expression(s) => Literal::Expr(s.clone()),
        DefaultValue::String(s) => Literal::String(s.clone()),
    }
}

fn add_constraint(table: &str, constraint: &Constraint) -> AlterTableStmt {
    let def = match constraint {
        Constraint::PrimaryKey(key) => ConstraintDef::PrimaryKey(key.column_names.clone()),
        Constraint::Unique(key) => ConstraintDef::Unique(key.column_names.clone()),
        Constraint::ForeignKey(fk) => ConstraintDef::ForeignKey(ForeignKeyDef {
            columns: fk.column_names.clone(),
            target_table: fk.target_table_name.clone(),
            target_columns: fk.target_column_names.clone(),
            on_update: Some(fk.update_constraint.to_sql()),
            on_delete: Some(fk.delete_constraint.to_sql()),
        }),
        Constraint::Check(check) => ConstraintDef::Check(check.detail.clone()),
    };
    AlterTableStmt::new(
        table,
        AlterTableAction::AddConstraint {
            name: constraint.name().to_string(),
            def,
        },
    )
}

fn create_index(table: &str, index: &Index) -> CreateIndexStmt {
    CreateIndexStmt {
        name: index.name.clone(),
        table: table.to_string(),
        unique: index.unique,
        using: index.ty.clone(),
        columns: index.columns.clone(),
    }
}

fn create_enum(e: &Enum) -> Vec<String> {
    let mut blocks = vec![
        Stmt::from(CreateEnumStmt {
            name: e.name.clone(),
            values: e.values.clone(),
        })
        .to_string(),
    ];
    if let Some(comment) = &e.comment {
        blocks.push(Stmt::from(CommentStmt::on_type(&e.name, Some(comment.clone()))).to_string());
    }
    blocks
}

fn alter(table: &str, action: AlterTableAction) -> Stmt {
    AlterTableStmt::new(table, action).into()
}

fn alter_type(name: String, action: AlterTypeAction) -> Stmt {
    AlterTypeStmt { name, action }.into()
}

fn unsupported(op: &Operation, reason: &str) -> DeparseError {
    DeparseError::Unsupported {
        operation: op.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests;
