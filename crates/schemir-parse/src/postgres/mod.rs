//! PostgreSQL DDL parser.
//!
//! Source is tokenized, split into statements, parsed into a small DDL AST
//! and then replayed against a schema, statement by statement, the way the
//! database itself would build its catalog.
//!
//! [`parse_with_known`] supports incremental builds across files: `ALTER
//! TABLE` and friends may target tables that were defined by an earlier
//! batch. Such tables are copied into this batch's result before being
//! changed.

use indexmap::{IndexMap, IndexSet};
use schemir_schema::{
    CheckConstraint, Column, Constraint, Enum, ForeignKeyConstraint, Index, Schema, Table,
};
use tracing::{debug, trace};

use crate::{ParseError, ParseOptions, ParseOutput, ProcessError, SchemaParser};

mod ast;
mod lexer;
mod parser;

use ast::*;

/// Parses PostgreSQL DDL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresParser;

impl SchemaParser for PostgresParser {
    fn dialect(&self) -> &'static str {
        "postgres"
    }

    fn parse_with(&self, source: &str, options: &ParseOptions) -> Result<ParseOutput, ParseError> {
        parse_with_known(source, &Schema::new(), options)
    }
}

/// Parse `source`, resolving statements that alter existing objects against
/// `known` when this batch doesn't define them.
///
/// The returned schema holds what this batch created or changed, not the
/// whole of `known`.
pub fn parse_with_known(
    source: &str,
    known: &Schema,
    options: &ParseOptions,
) -> Result<ParseOutput, ParseError> {
    let _span = tracing::debug_span!("parse_postgres", len = source.len()).entered();

    let tokens = lexer::tokenize(source)?;
    let (statements, mut errors) =
        parser::parse_statements(source, &tokens, options.max_nesting_depth);

    let mut builder = Builder {
        schema: Schema::new(),
        known,
        errors: Vec::new(),
    };
    for statement in statements {
        builder.apply(statement);
    }
    errors.append(&mut builder.errors);

    Ok(ParseOutput::finish(builder.schema, errors, options))
}

struct Builder<'k> {
    schema: Schema,
    known: &'k Schema,
    errors: Vec<ProcessError>,
}

impl Builder<'_> {
    fn apply(&mut self, statement: Statement) {
        match statement {
            Statement::CreateTable(create) => self.create_table(create),
            Statement::CreateIndex(index) => self.create_index(index),
            Statement::CreateEnum { name, values } => {
                self.schema.insert_enum(Enum::new(name, values));
            }
            Statement::AlterTable { table, actions } => self.alter_table(&table, actions),
            Statement::DropTables(names) => {
                for name in names {
                    if self.schema.tables.shift_remove(&name).is_none() {
                        debug!(table = %name, "DROP TABLE of a table outside this batch");
                    }
                }
            }
            Statement::DropIndexes(names) => {
                for name in names {
                    self.drop_index(&name);
                }
            }
            Statement::DropTypes(names) => {
                for name in names {
                    self.schema.enums.shift_remove(&name);
                }
            }
            Statement::RenameIndex { from, to } => self.rename_index(&from, &to),
            Statement::AlterType { name, action } => self.alter_type(&name, action),
            Statement::Comment { target, comment } => self.comment(target, comment),
        }
    }

    fn create_table(&mut self, create: CreateTable) {
        let mut table = Table::new(&create.name);

        // CREATE INDEX may come first and leave a placeholder behind
        if let Some(placeholder) = self
            .schema
            .get_table(&create.name)
            .filter(|t| t.columns.is_empty())
        {
            table.indexes = placeholder.indexes.clone();
        }

        let mut constraints = Vec::new();
        for column in create.columns {
            let (column, column_constraints) = into_column(column);
            table.insert_column(column);
            constraints.extend(column_constraints);
        }
        constraints.extend(create.constraints);

        if self.schema.insert_table(table).is_some() {
            trace!(table = %create.name, "table redefined, last definition wins");
        }
        for constraint in constraints {
            self.add_constraint(&create.name, constraint);
        }
    }

    fn create_index(&mut self, index: CreateIndex) {
        let name = index
            .name
            .unwrap_or_else(|| schemir_sql::index_name(&index.table, &index_name_parts(&index.columns)));

        if self.schema.get_table(&index.table).is_none() {
            match self.known.get_table(&index.table) {
                Some(known) => {
                    self.schema.insert_table(known.clone());
                }
                None => {
                    // attach to a placeholder until CREATE TABLE shows up
                    self.schema.insert_table(Table::new(&index.table));
                }
            }
        }

        let mut ir = Index::new(name, index.columns);
        ir.unique = index.unique;
        ir.ty = index.method.to_ascii_lowercase();
        if let Some(table) = self.schema.get_table_mut(&index.table) {
            table.insert_index(ir);
        }
    }

    /// Bring `name` into this batch, copying it from the known schema if
    /// needed. Records a warning and returns false when it exists nowhere.
    fn resolve_table(&mut self, name: &str, context: &str) -> bool {
        if self.schema.get_table(name).is_some() {
            return true;
        }
        if let Some(known) = self.known.get_table(name) {
            self.schema.insert_table(known.clone());
            return true;
        }
        self.errors.push(ProcessError::UnknownTable {
            table: name.to_string(),
            context: context.to_string(),
        });
        false
    }

    fn alter_table(&mut self, name: &str, actions: Vec<AlterAction>) {
        if !self.resolve_table(name, "ALTER TABLE") {
            return;
        }

        let mut name = name.to_string();
        for action in actions {
            match action {
                AlterAction::AddColumn(column) => {
                    let (column, constraints) = into_column(column);
                    if let Some(table) = self.schema.get_table_mut(&name) {
                        table.insert_column(column);
                    }
                    for constraint in constraints {
                        self.add_constraint(&name, constraint);
                    }
                }
                AlterAction::AddConstraint(constraint) => self.add_constraint(&name, constraint),
                AlterAction::DropColumn(column) => {
                    let Some(table) = self.schema.get_table_mut(&name) else {
                        continue;
                    };
                    if table.columns.shift_remove(&column).is_none() {
                        self.errors.push(ProcessError::UnresolvedReference {
                            reference: format!("{name}.{column}"),
                            context: "DROP COLUMN".into(),
                        });
                        continue;
                    }
                    // dependent indexes and constraints go with the column
                    table.indexes.retain(|_, index| !index.columns.contains(&column));
                    table
                        .constraints
                        .retain(|_, constraint| !constraint.column_names().contains(&column));
                }
                AlterAction::DropConstraint(constraint) => {
                    let removed = self
                        .schema
                        .get_table_mut(&name)
                        .and_then(|table| table.constraints.shift_remove(&constraint));
                    if removed.is_none() {
                        debug!(table = %name, %constraint, "DROP CONSTRAINT of unknown constraint");
                    }
                }
                AlterAction::RenameTable(to) => {
                    self.rename_table(&name, &to);
                    name = to;
                }
                AlterAction::RenameColumn { from, to } => self.rename_column(&name, &from, &to),
                AlterAction::RenameConstraint { from, to } => {
                    let Some(table) = self.schema.get_table_mut(&name) else {
                        continue;
                    };
                    if let Some(constraint) = rename_key(&mut table.constraints, &from, &to) {
                        constraint.set_name(to);
                    }
                }
                AlterAction::AlterColumn { column, change } => {
                    let Some(col) = self
                        .schema
                        .get_table_mut(&name)
                        .and_then(|table| table.columns.get_mut(&column))
                    else {
                        self.errors.push(ProcessError::UnresolvedReference {
                            reference: format!("{name}.{column}"),
                            context: "ALTER COLUMN".into(),
                        });
                        continue;
                    };
                    match change {
                        ColumnChange::Type(ty) => col.ty = ty,
                        ColumnChange::SetNotNull => col.not_null = true,
                        ColumnChange::DropNotNull => col.not_null = false,
                        ColumnChange::SetDefault(default) => col.default = default,
                        ColumnChange::DropDefault => col.default = None,
                    }
                }
            }
        }
    }

    /// Name and attach a constraint to a table already in this batch.
    fn add_constraint(&mut self, table_name: &str, constraint: TableConstraint) {
        let Some(table) = self.schema.get_table(table_name) else {
            return;
        };
        match build_constraint(table, constraint, &self.schema, self.known) {
            Ok(constraint) => {
                if let Some(table) = self.schema.get_table_mut(table_name) {
                    insert_constraint(table, constraint);
                }
            }
            Err(err) => self.errors.push(err),
        }
    }

    fn rename_table(&mut self, from: &str, to: &str) {
        let Some(mut table) = self.schema.tables.shift_remove(from) else {
            return;
        };
        table.name = to.to_string();
        self.schema.insert_table(table);

        for table in self.schema.tables.values_mut() {
            for constraint in table.constraints.values_mut() {
                if let Constraint::ForeignKey(fk) = constraint {
                    if fk.target_table_name == from {
                        fk.target_table_name = to.to_string();
                    }
                }
            }
        }
    }

    fn rename_column(&mut self, table_name: &str, from: &str, to: &str) {
        let Some(table) = self.schema.get_table_mut(table_name) else {
            return;
        };
        let Some(column) = rename_key(&mut table.columns, from, to) else {
            self.errors.push(ProcessError::UnresolvedReference {
                reference: format!("{table_name}.{from}"),
                context: "RENAME COLUMN".into(),
            });
            return;
        };
        column.name = to.to_string();

        let rename = |names: &mut Vec<String>| {
            for name in names.iter_mut().filter(|n| n.as_str() == from) {
                *name = to.to_string();
            }
        };
        for index in table.indexes.values_mut() {
            rename(&mut index.columns);
        }
        for constraint in table.constraints.values_mut() {
            match constraint {
                Constraint::PrimaryKey(k) | Constraint::Unique(k) => rename(&mut k.column_names),
                Constraint::ForeignKey(fk) => rename(&mut fk.column_names),
                Constraint::Check(_) => {}
            }
        }

        // foreign keys pointing at the renamed column
        for table in self.schema.tables.values_mut() {
            for constraint in table.constraints.values_mut() {
                if let Constraint::ForeignKey(fk) = constraint {
                    if fk.target_table_name == table_name {
                        rename(&mut fk.target_column_names);
                    }
                }
            }
        }
    }

    fn find_index_table(&mut self, index: &str) -> Option<String> {
        if let Some(table) = self
            .schema
            .tables
            .values()
            .find(|t| t.indexes.contains_key(index))
        {
            return Some(table.name.clone());
        }
        let known = self
            .known
            .tables
            .values()
            .find(|t| t.indexes.contains_key(index))?;
        self.schema.insert_table(known.clone());
        Some(known.name.clone())
    }

    fn drop_index(&mut self, index: &str) {
        let Some(table_name) = self.find_index_table(index) else {
            debug!(%index, "DROP INDEX of unknown index");
            return;
        };
        if let Some(table) = self.schema.get_table_mut(&table_name) {
            table.indexes.shift_remove(index);
        }
    }

    fn rename_index(&mut self, from: &str, to: &str) {
        let Some(table_name) = self.find_index_table(from) else {
            self.errors.push(ProcessError::UnresolvedReference {
                reference: from.to_string(),
                context: "ALTER INDEX".into(),
            });
            return;
        };
        if let Some(index) = self
            .schema
            .get_table_mut(&table_name)
            .and_then(|table| rename_key(&mut table.indexes, from, to))
        {
            index.name = to.to_string();
        }
    }

    fn alter_type(&mut self, name: &str, action: AlterTypeAction) {
        if !self.schema.enums.contains_key(name) {
            let Some(known) = self.known.enums.get(name) else {
                self.errors.push(ProcessError::UnresolvedReference {
                    reference: name.to_string(),
                    context: "ALTER TYPE".into(),
                });
                return;
            };
            self.schema.insert_enum(known.clone());
        }

        match action {
            AlterTypeAction::RenameTo(to) => {
                if let Some(e) = rename_key(&mut self.schema.enums, name, &to) {
                    e.name = to.clone();
                }
                for column in self
                    .schema
                    .tables
                    .values_mut()
                    .flat_map(|t| t.columns.values_mut())
                {
                    if column.ty == name {
                        column.ty = to.clone();
                    }
                }
            }
            AlterTypeAction::AddValue { value, anchor } => {
                let Some(e) = self.schema.enums.get_mut(name) else {
                    return;
                };
                if e.values.contains(&value) {
                    return;
                }
                let position = anchor.and_then(|(before, anchor)| {
                    let at = e.values.iter().position(|v| *v == anchor)?;
                    Some(if before { at } else { at + 1 })
                });
                match position {
                    Some(at) => e.values.insert(at, value),
                    None => e.values.push(value),
                }
            }
            AlterTypeAction::RenameValue { from, to } => {
                if let Some(e) = self.schema.enums.get_mut(name) {
                    for value in e.values.iter_mut().filter(|v| **v == from) {
                        *value = to.clone();
                    }
                }
            }
        }
    }

    fn comment(&mut self, target: CommentTarget, comment: Option<String>) {
        match target {
            CommentTarget::Table(table) => {
                if self.resolve_table(&table, "COMMENT ON TABLE") {
                    if let Some(table) = self.schema.get_table_mut(&table) {
                        table.comment = comment;
                    }
                }
            }
            CommentTarget::Column { table, column } => {
                if !self.resolve_table(&table, "COMMENT ON COLUMN") {
                    return;
                }
                match self
                    .schema
                    .get_table_mut(&table)
                    .and_then(|t| t.columns.get_mut(&column))
                {
                    Some(col) => col.comment = comment,
                    None => self.errors.push(ProcessError::UnresolvedReference {
                        reference: format!("{table}.{column}"),
                        context: "COMMENT ON COLUMN".into(),
                    }),
                }
            }
            CommentTarget::Type(name) => {
                if !self.schema.enums.contains_key(&name) {
                    if let Some(known) = self.known.enums.get(&name) {
                        self.schema.insert_enum(known.clone());
                    }
                }
                match self.schema.enums.get_mut(&name) {
                    Some(e) => e.comment = comment,
                    None => self.errors.push(ProcessError::UnresolvedReference {
                        reference: name,
                        context: "COMMENT ON TYPE".into(),
                    }),
                }
            }
        }
    }
}

fn into_column(def: ColumnDef) -> (Column, Vec<TableConstraint>) {
    let column = Column {
        name: def.name,
        ty: def.ty,
        default: def.default,
        not_null: def.not_null,
        unique: false,
        check: def.check,
        comment: None,
    };
    (column, def.constraints)
}

/// Give a parsed constraint its PostgreSQL default name and IR shape.
fn build_constraint(
    table: &Table,
    constraint: TableConstraint,
    schema: &Schema,
    known: &Schema,
) -> Result<Constraint, ProcessError> {
    let TableConstraint { name, kind } = constraint;
    let table_name = table.name.as_str();

    Ok(match kind {
        ConstraintKind::PrimaryKey(columns) => Constraint::primary_key(
            name.unwrap_or_else(|| schemir_sql::primary_key_name(table_name)),
            columns,
        ),
        ConstraintKind::Unique(columns) => Constraint::unique(
            name.unwrap_or_else(|| schemir_sql::unique_key_name(table_name, &columns)),
            columns,
        ),
        ConstraintKind::ForeignKey {
            columns,
            target_table,
            target_columns,
            on_update,
            on_delete,
        } => {
            let target_columns = if target_columns.is_empty() {
                // REFERENCES t means t's primary key
                let target = if target_table == table_name {
                    Some(table)
                } else {
                    schema
                        .get_table(&target_table)
                        .or_else(|| known.get_table(&target_table))
                };
                match target.and_then(Table::primary_key) {
                    Some(pk) => pk.column_names.clone(),
                    None => {
                        return Err(ProcessError::UnresolvedReference {
                            reference: target_table,
                            context: format!(
                                "primary key referenced by a foreign key on {table_name}"
                            ),
                        });
                    }
                }
            } else {
                target_columns
            };
            let name = name.unwrap_or_else(|| schemir_sql::foreign_key_name(table_name, &columns));
            ForeignKeyConstraint::new(name, columns, target_table, target_columns)
                .on_update(on_update)
                .on_delete(on_delete)
                .into()
        }
        ConstraintKind::Check { expr, idents } => {
            let name = name.unwrap_or_else(|| {
                let referenced: IndexSet<&String> = idents
                    .iter()
                    .filter(|ident| table.columns.contains_key(*ident))
                    .collect();
                let column = match referenced.len() {
                    1 => referenced.first().map(|c| c.as_str()),
                    _ => None,
                };
                schemir_sql::check_name(table_name, column)
            });
            Constraint::Check(CheckConstraint { name, detail: expr })
        }
    })
}

/// Insert a constraint, marking single-column keys on their column.
fn insert_constraint(table: &mut Table, constraint: Constraint) {
    if let Constraint::PrimaryKey(k) | Constraint::Unique(k) = &constraint {
        if let [column] = k.column_names.as_slice() {
            if let Some(column) = table.columns.get_mut(column) {
                column.unique = true;
            }
        }
    }
    table.insert_constraint(constraint);
}

/// Re-key an entry in place, keeping its position.
fn rename_key<'m, V>(map: &'m mut IndexMap<String, V>, from: &str, to: &str) -> Option<&'m mut V> {
    let index = map.get_index_of(from)?;
    let entries = std::mem::take(map);
    *map = entries
        .into_iter()
        .enumerate()
        .map(|(i, (key, value))| if i == index { (to.to_string(), value) } else { (key, value) })
        .collect();
    map.get_mut(to)
}

/// Column part of PostgreSQL's generated index name; expressions count as `expr`.
fn index_name_parts(columns: &[String]) -> Vec<&str> {
    columns
        .iter()
        .map(|c| if c.contains('(') { "expr" } else { c.as_str() })
        .collect()
}

#[cfg(test)]
mod tests;
