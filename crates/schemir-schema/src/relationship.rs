//! Relationships derived from foreign keys.

use crate::{Constraint, ForeignKeyAction, Table};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Summary of a foreign key, used by renderers that draw edges between
/// tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub name: String,
    /// The referenced (parent) table
    pub primary_table_name: String,
    pub primary_column_name: String,
    /// The referencing (child) table, which owns the FOREIGN KEY constraint
    pub foreign_table_name: String,
    pub foreign_column_name: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub update_constraint: ForeignKeyAction,
    #[serde(default)]
    pub delete_constraint: ForeignKeyAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
}

/// Derive one [`Relationship`] per FOREIGN KEY constraint.
///
/// The relationship is keyed by the constraint name and summarizes the first
/// column pair of the key. Cardinality is [`Cardinality::OneToOne`] when the
/// referencing columns are themselves covered by a UNIQUE or PRIMARY KEY
/// constraint.
pub fn derive_relationships(tables: &IndexMap<String, Table>) -> IndexMap<String, Relationship> {
    let mut relationships = IndexMap::new();

    for table in tables.values() {
        for constraint in table.constraints.values() {
            let Constraint::ForeignKey(fk) = constraint else {
                continue;
            };
            let (Some(foreign_column), Some(primary_column)) =
                (fk.column_names.first(), fk.target_column_names.first())
            else {
                continue;
            };

            let cardinality = if table.has_unique_key_on(&fk.column_names) {
                Cardinality::OneToOne
            } else {
                Cardinality::OneToMany
            };

            relationships.insert(
                fk.name.clone(),
                Relationship {
                    name: fk.name.clone(),
                    primary_table_name: fk.target_table_name.clone(),
                    primary_column_name: primary_column.clone(),
                    foreign_table_name: table.name.clone(),
                    foreign_column_name: foreign_column.clone(),
                    cardinality,
                    update_constraint: fk.update_constraint,
                    delete_constraint: fk.delete_constraint,
                },
            );
        }
    }

    relationships
}
