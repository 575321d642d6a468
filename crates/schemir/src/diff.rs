//! Schema diffing.
//!
//! [`diff`] compares two [`Schema`] snapshots and produces the operations
//! that turn the first into the second.
//!
//! ## Ordering
//!
//! Operations come out in the order their DDL has to run:
//!
//! 1. enum renames, additions and value/comment changes (columns may use them)
//! 2. table removals, renames and additions; added tables are ordered so a
//!    table comes after the tables its foreign keys point at, removed tables
//!    in the reverse of that order
//! 3. per table: column changes, then index changes, then constraint changes
//! 4. enum removals
//!
//! ## Rename Detection
//!
//! An entity that disappears from `before` is treated as renamed when the
//! entity at the same position in `after` is new and identical apart from its
//! name. That emits a single `replace .../name` instead of remove + add.
//! Tables, columns, indexes, constraints and enums all get this treatment.
//!
//! Indexes and constraints that changed in any other way are emitted as
//! remove + add, since PostgreSQL can't alter them in place.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, debug_span, trace};

use crate::schema::{Column, Constraint, Enum, Index, Table};
use crate::{ColumnField, Operation, Schema};

/// Compute the operations that transform `before` into `after`.
///
/// Structurally equal schemas yield no operations. No cross-table validation
/// is done: a foreign key pointing at a missing table is emitted as is.
pub fn diff(before: &Schema, after: &Schema) -> Vec<Operation> {
    let _span = debug_span!(
        "diff",
        before_tables = before.tables.len(),
        after_tables = after.tables.len()
    )
    .entered();

    let mut ops = Vec::new();

    let enums = match_entities(&before.enums, &after.enums);
    for (from, to) in &enums.renamed {
        ops.push(Operation::rename_enum(&from.name, &to.name));
    }
    for e in &enums.added {
        ops.push(Operation::add_enum(e));
    }
    for (from, to) in &enums.common {
        diff_enum(from, to, &mut ops);
    }

    let tables = match_entities(&before.tables, &after.tables);
    for table in dependency_order(&tables.removed).into_iter().rev() {
        ops.push(Operation::remove_table(&table.name));
    }
    for (from, to) in &tables.renamed {
        ops.push(Operation::rename_table(&from.name, &to.name));
    }
    for table in dependency_order(&tables.added) {
        ops.push(Operation::add_table(table));
    }
    for (from, to) in &tables.common {
        diff_table(from, to, &mut ops);
    }

    for e in &enums.removed {
        ops.push(Operation::remove_enum(&e.name));
    }

    debug!(count = ops.len(), "diff complete");
    ops
}

/// An IR entity keyed by name.
trait Entity: Clone + PartialEq {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: &str);
}

macro_rules! impl_entity {
    ($($ty:ty),*) => {
        $(
            impl Entity for $ty {
                fn name(&self) -> &str {
                    &self.name
                }

                fn set_name(&mut self, name: &str) {
                    self.name = name.to_string();
                }
            }
        )*
    };
}

impl_entity!(Table, Column, Index, Enum);

impl Entity for Constraint {
    fn name(&self) -> &str {
        Constraint::name(self)
    }

    fn set_name(&mut self, name: &str) {
        Constraint::set_name(self, name);
    }
}

/// How the entities of one collection line up between two snapshots.
struct Matching<'a, T> {
    removed: Vec<&'a T>,
    added: Vec<&'a T>,
    renamed: Vec<(&'a T, &'a T)>,
    common: Vec<(&'a T, &'a T)>,
}

fn match_entities<'a, T: Entity>(
    before: &'a IndexMap<String, T>,
    after: &'a IndexMap<String, T>,
) -> Matching<'a, T> {
    let mut renamed = Vec::new();
    let mut renamed_to = HashSet::new();
    for (i, (name, old)) in before.iter().enumerate() {
        if after.contains_key(name) {
            continue;
        }
        let Some((new_name, new)) = after.get_index(i) else {
            continue;
        };
        if before.contains_key(new_name) {
            continue;
        }
        let mut candidate = old.clone();
        candidate.set_name(new_name);
        if candidate == *new {
            debug!(from = %name, to = %new_name, "detected rename");
            renamed.push((old, new));
            renamed_to.insert(new_name.as_str());
        }
    }
    let renamed_from: HashSet<&str> = renamed.iter().map(|(old, _)| old.name()).collect();

    Matching {
        removed: before
            .iter()
            .filter(|(name, _)| !after.contains_key(*name) && !renamed_from.contains(name.as_str()))
            .map(|(_, e)| e)
            .collect(),
        added: after
            .iter()
            .filter(|(name, _)| !before.contains_key(*name) && !renamed_to.contains(name.as_str()))
            .map(|(_, e)| e)
            .collect(),
        common: before
            .iter()
            .filter_map(|(name, old)| after.get(name).map(|new| (old, new)))
            .collect(),
        renamed,
    }
}

/// Order tables so foreign key targets come first.
///
/// Cycles can't be satisfied; their members keep their original order at
/// the end.
fn dependency_order<'a>(tables: &[&'a Table]) -> Vec<&'a Table> {
    let names: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();

    let mut pending: IndexMap<&str, HashSet<&str>> = tables
        .iter()
        .map(|t| {
            let deps = t
                .constraints
                .values()
                .filter_map(|c| match c {
                    Constraint::ForeignKey(fk) => Some(fk.target_table_name.as_str()),
                    _ => None,
                })
                .filter(|target| *target != t.name && names.contains(target))
                .collect();
            (t.name.as_str(), deps)
        })
        .collect();

    let mut ready: VecDeque<&str> = pending
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(tables.len());

    while let Some(name) = ready.pop_front() {
        pending.shift_remove(name);
        order.push(name);
        for (other, deps) in pending.iter_mut() {
            if deps.remove(name) && deps.is_empty() {
                ready.push_back(*other);
            }
        }
    }

    if !pending.is_empty() {
        debug!(tables = ?pending.keys().collect::<Vec<_>>(), "foreign key cycle between tables");
        order.extend(pending.keys());
    }

    order
        .into_iter()
        .filter_map(|name| tables.iter().find(|t| t.name == name).copied())
        .collect()
}

fn diff_enum(before: &Enum, after: &Enum, ops: &mut Vec<Operation>) {
    if before.values != after.values {
        let kept: Vec<&String> = before
            .values
            .iter()
            .filter(|v| after.values.contains(v))
            .collect();
        let added: Vec<&String> = after
            .values
            .iter()
            .filter(|v| !before.values.contains(v))
            .collect();

        // appending is all ADD VALUE can express
        let appends = kept.iter().chain(added.iter()).copied().eq(after.values.iter());
        if appends {
            for value in before.values.iter().filter(|v| !after.values.contains(v)) {
                ops.push(Operation::remove_enum_value(&after.name, value));
            }
            for value in added {
                ops.push(Operation::add_enum_value(&after.name, value));
            }
        } else {
            ops.push(Operation::replace_enum_values(&after.name, &after.values));
        }
    }

    if before.comment != after.comment {
        ops.push(Operation::replace_enum_comment(
            &after.name,
            after.comment.as_deref(),
        ));
    }
}

fn diff_table(before: &Table, after: &Table, ops: &mut Vec<Operation>) {
    if before == after {
        return;
    }
    let _span = debug_span!("diff_table", table = %after.name).entered();
    let table = after.name.as_str();

    if before.comment != after.comment {
        ops.push(Operation::replace_table_comment(
            table,
            after.comment.as_deref(),
        ));
    }

    let columns = match_entities(&before.columns, &after.columns);
    for column in &columns.removed {
        ops.push(Operation::remove_column(table, &column.name));
    }
    for (from, to) in &columns.renamed {
        ops.push(Operation::rename_column(table, &from.name, &to.name));
    }
    for column in &columns.added {
        ops.push(Operation::add_column(table, column));
    }
    for (from, to) in &columns.common {
        diff_column(table, from, to, ops);
    }

    let indexes = match_entities(&before.indexes, &after.indexes);
    let changed: Vec<&Index> = indexes
        .common
        .iter()
        .filter(|(from, to)| from != to)
        .map(|(_, to)| *to)
        .collect();
    for index in indexes.removed.iter().chain(&changed) {
        ops.push(Operation::remove_index(table, &index.name));
    }
    for (from, to) in &indexes.renamed {
        ops.push(Operation::rename_index(table, &from.name, &to.name));
    }
    for index in indexes.added.iter().chain(&changed) {
        ops.push(Operation::add_index(table, index));
    }

    let constraints = match_entities(&before.constraints, &after.constraints);
    let changed: Vec<&Constraint> = constraints
        .common
        .iter()
        .filter(|(from, to)| from != to)
        .map(|(_, to)| *to)
        .collect();
    for constraint in constraints.removed.iter().chain(&changed) {
        ops.push(Operation::remove_constraint(table, constraint.name()));
    }
    for (from, to) in &constraints.renamed {
        ops.push(Operation::rename_constraint(table, from.name(), to.name()));
    }
    for constraint in constraints.added.iter().chain(&changed) {
        ops.push(Operation::add_constraint(table, constraint));
    }
}

/// One `replace` per changed scalar field.
fn diff_column(table: &str, before: &Column, after: &Column, ops: &mut Vec<Operation>) {
    let column = after.name.as_str();
    let mut push = |field: ColumnField, op: Operation| {
        trace!(%column, %field, "column field changed");
        ops.push(op);
    };
    let replace = |field: ColumnField, value: Value| {
        Operation::replace_column(table, column, field, value)
    };

    if before.ty != after.ty {
        push(ColumnField::Type, replace(ColumnField::Type, after.ty.clone().into()));
    }
    if before.not_null != after.not_null {
        push(ColumnField::NotNull, replace(ColumnField::NotNull, after.not_null.into()));
    }
    if before.default != after.default {
        push(
            ColumnField::Default,
            Operation::set_column_default(table, column, after.default.as_ref()),
        );
    }
    if before.check != after.check {
        push(ColumnField::Check, replace(ColumnField::Check, nullable_string(&after.check)));
    }
    if before.comment != after.comment {
        push(ColumnField::Comment, replace(ColumnField::Comment, nullable_string(&after.comment)));
    }
    if before.unique != after.unique {
        push(ColumnField::Unique, replace(ColumnField::Unique, after.unique.into()));
    }
}

fn nullable_string(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::String)
}
