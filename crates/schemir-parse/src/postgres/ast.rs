//! The subset of PostgreSQL DDL the schema builder understands.

use schemir_schema::{DefaultValue, ForeignKeyAction};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    CreateEnum { name: String, values: Vec<String> },
    AlterTable { table: String, actions: Vec<AlterAction> },
    DropTables(Vec<String>),
    DropIndexes(Vec<String>),
    DropTypes(Vec<String>),
    RenameIndex { from: String, to: String },
    AlterType { name: String, action: AlterTypeAction },
    Comment { target: CommentTarget, comment: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnDef {
    pub name: String,
    pub ty: String,
    pub not_null: bool,
    /// Only literal defaults; expressions parse to `None`
    pub default: Option<DefaultValue>,
    pub check: Option<String>,
    /// PRIMARY KEY / UNIQUE / REFERENCES written on the column, already
    /// expanded to cover it
    pub constraints: Vec<TableConstraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableConstraint {
    /// `CONSTRAINT name`, if given
    pub name: Option<String>,
    pub kind: ConstraintKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConstraintKind {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey {
        columns: Vec<String>,
        target_table: String,
        /// Empty when the referenced table's primary key is implied
        target_columns: Vec<String>,
        on_update: ForeignKeyAction,
        on_delete: ForeignKeyAction,
    },
    Check {
        expr: String,
        /// Identifiers appearing in `expr`, used for PostgreSQL's default name
        idents: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CreateIndex {
    pub name: Option<String>,
    pub table: String,
    pub unique: bool,
    pub method: String,
    /// Column names, or expression text for expression keys
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AlterAction {
    AddColumn(ColumnDef),
    AddConstraint(TableConstraint),
    DropColumn(String),
    DropConstraint(String),
    RenameTable(String),
    RenameColumn { from: String, to: String },
    RenameConstraint { from: String, to: String },
    AlterColumn { column: String, change: ColumnChange },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ColumnChange {
    Type(String),
    SetNotNull,
    DropNotNull,
    /// `None` when the new default is an expression
    SetDefault(Option<DefaultValue>),
    DropDefault,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AlterTypeAction {
    RenameTo(String),
    AddValue {
        value: String,
        /// `BEFORE 'x'` (true) / `AFTER 'x'` (false)
        anchor: Option<(bool, String)>,
    },
    RenameValue { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CommentTarget {
    Table(String),
    Column { table: String, column: String },
    Type(String),
}
