//! Database schema types for schemir.
//!
//! This crate contains the canonical schema IR that every dialect parser
//! produces, that the diff engine compares, and that the deparser renders
//! back to PostgreSQL DDL.
//!
//! All maps are [`IndexMap`]s keyed by entity name. Equality ignores
//! insertion order, so two schemas built in a different order compare equal.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

mod relationship;
pub use relationship::*;

/// A complete database schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Tables in the schema, indexed by name
    #[serde(default)]
    pub tables: IndexMap<String, Table>,
    /// Enum types, indexed by name
    #[serde(default)]
    pub enums: IndexMap<String, Enum>,
    /// Relationships derived from foreign keys, indexed by constraint name
    #[serde(default)]
    pub relationships: IndexMap<String, Relationship>,
    /// UI grouping annotations, carried through untouched
    #[serde(default)]
    pub table_groups: IndexMap<String, TableGroup>,
}

impl Schema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Get a mutable table by name.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Iterate over all tables.
    pub fn iter_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Insert a table, replacing any table with the same name.
    ///
    /// Returns the table that was replaced, if any.
    pub fn insert_table(&mut self, table: Table) -> Option<Table> {
        self.tables.insert(table.name.clone(), table)
    }

    /// Insert an enum, replacing any enum with the same name.
    pub fn insert_enum(&mut self, e: Enum) -> Option<Enum> {
        self.enums.insert(e.name.clone(), e)
    }

    /// Builder form of [`Schema::insert_table`].
    pub fn with_table(mut self, table: Table) -> Self {
        self.insert_table(table);
        self
    }

    /// Builder form of [`Schema::insert_enum`].
    pub fn with_enum(mut self, e: Enum) -> Self {
        self.insert_enum(e);
        self
    }

    /// Recompute [`Schema::relationships`] from the foreign keys currently
    /// present in [`Schema::tables`].
    pub fn refresh_relationships(&mut self) {
        self.relationships = derive_relationships(&self.tables);
    }
}

/// A database table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table name
    pub name: String,
    /// Columns, in declaration order
    #[serde(default)]
    pub columns: IndexMap<String, Column>,
    /// Indexes, indexed by index name
    #[serde(default)]
    pub indexes: IndexMap<String, Index>,
    /// Constraints, indexed by constraint name
    #[serde(default)]
    pub constraints: IndexMap<String, Constraint>,
    /// Table comment
    #[serde(default)]
    pub comment: Option<String>,
    /// Postgres schema the source declared the table in. The table is still
    /// keyed by its bare name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
            constraints: IndexMap::new(),
            comment: None,
            schema_name: None,
        }
    }

    /// Insert a column, replacing any column with the same name.
    pub fn insert_column(&mut self, column: Column) -> Option<Column> {
        self.columns.insert(column.name.clone(), column)
    }

    /// Insert an index, replacing any index with the same name.
    pub fn insert_index(&mut self, index: Index) -> Option<Index> {
        self.indexes.insert(index.name.clone(), index)
    }

    /// Insert a constraint, replacing any constraint with the same name.
    pub fn insert_constraint(&mut self, constraint: Constraint) -> Option<Constraint> {
        self.constraints
            .insert(constraint.name().to_string(), constraint)
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.insert_column(column);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.insert_index(index);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.insert_constraint(constraint);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The primary key constraint, if the table has one.
    pub fn primary_key(&self) -> Option<&KeyConstraint> {
        self.constraints.values().find_map(|c| match c {
            Constraint::PrimaryKey(pk) => Some(pk),
            _ => None,
        })
    }

    /// Whether a UNIQUE or PRIMARY KEY constraint covers exactly `columns`
    /// (in any order).
    pub fn has_unique_key_on(&self, columns: &[String]) -> bool {
        self.constraints.values().any(|c| match c {
            Constraint::PrimaryKey(k) | Constraint::Unique(k) => {
                same_column_set(&k.column_names, columns)
            }
            _ => false,
        })
    }
}

fn same_column_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|c| b.contains(c))
}

/// A database column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name
    pub name: String,
    /// Raw PostgreSQL type, e.g. `varchar(255)`
    #[serde(rename = "type")]
    pub ty: String,
    /// Default value (if any)
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// Whether the column rejects NULL
    #[serde(default)]
    pub not_null: bool,
    /// Uniqueness hint. The constraint that enforces it lives in
    /// [`Table::constraints`].
    #[serde(default)]
    pub unique: bool,
    /// Inline CHECK expression
    #[serde(default)]
    pub check: Option<String>,
    /// Column comment
    #[serde(default)]
    pub comment: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            default: None,
            not_null: false,
            unique: false,
            check: None,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.check = Some(expr.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A column default.
///
/// Strings hold either a literal or a SQL expression such as `now()`; the
/// deparser decides which when rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Boolean(bool),
    Number(serde_json::Number),
    String(String),
}

impl DefaultValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DefaultValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a numeric string into a number default, keeping integers exact.
    pub fn parse_number(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Some(DefaultValue::Number(n.into()));
        }
        let f = s.parse::<f64>().ok()?;
        if !s.chars().any(|c| c.is_ascii_digit()) {
            // rejects "inf", "NaN" and friends
            return None;
        }
        serde_json::Number::from_f64(f).map(DefaultValue::Number)
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Boolean(b) => write!(f, "{b}"),
            DefaultValue::Number(n) => write!(f, "{n}"),
            DefaultValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for DefaultValue {
    fn from(s: &str) -> Self {
        DefaultValue::String(s.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(s: String) -> Self {
        DefaultValue::String(s)
    }
}

impl From<bool> for DefaultValue {
    fn from(b: bool) -> Self {
        DefaultValue::Boolean(b)
    }
}

impl From<i64> for DefaultValue {
    fn from(n: i64) -> Self {
        DefaultValue::Number(n.into())
    }
}

impl From<i32> for DefaultValue {
    fn from(n: i32) -> Self {
        DefaultValue::Number(i64::from(n).into())
    }
}

/// An index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Index name
    pub name: String,
    /// Indexed columns (or expressions), order is significant
    pub columns: Vec<String>,
    /// Whether this is a UNIQUE index
    #[serde(default)]
    pub unique: bool,
    /// Access method (`btree`, `gin`, ...). Empty means the server default.
    #[serde(rename = "type", default)]
    pub ty: String,
}

impl Index {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            ty: String::new(),
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.ty = method.into();
        self
    }
}

/// A table constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Constraint {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey(KeyConstraint),
    #[serde(rename = "UNIQUE")]
    Unique(KeyConstraint),
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey(ForeignKeyConstraint),
    #[serde(rename = "CHECK")]
    Check(CheckConstraint),
}

impl Constraint {
    pub fn primary_key<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Constraint::PrimaryKey(KeyConstraint::new(name, columns))
    }

    pub fn unique<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Constraint::Unique(KeyConstraint::new(name, columns))
    }

    pub fn check(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Constraint::Check(CheckConstraint {
            name: name.into(),
            detail: detail.into(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Constraint::PrimaryKey(k) | Constraint::Unique(k) => &k.name,
            Constraint::ForeignKey(fk) => &fk.name,
            Constraint::Check(c) => &c.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Constraint::PrimaryKey(k) | Constraint::Unique(k) => k.name = name,
            Constraint::ForeignKey(fk) => fk.name = name,
            Constraint::Check(c) => c.name = name,
        }
    }

    /// Local columns the constraint covers. Empty for CHECK.
    pub fn column_names(&self) -> &[String] {
        match self {
            Constraint::PrimaryKey(k) | Constraint::Unique(k) => &k.column_names,
            Constraint::ForeignKey(fk) => &fk.column_names,
            Constraint::Check(_) => &[],
        }
    }

    /// The SQL keyword for this constraint kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::PrimaryKey(_) => "PRIMARY KEY",
            Constraint::Unique(_) => "UNIQUE",
            Constraint::ForeignKey(_) => "FOREIGN KEY",
            Constraint::Check(_) => "CHECK",
        }
    }
}

impl From<ForeignKeyConstraint> for Constraint {
    fn from(fk: ForeignKeyConstraint) -> Self {
        Constraint::ForeignKey(fk)
    }
}

/// Payload of PRIMARY KEY and UNIQUE constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConstraint {
    pub name: String,
    #[serde(alias = "columnName", deserialize_with = "one_or_many")]
    pub column_names: Vec<String>,
}

impl KeyConstraint {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            column_names: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyConstraint {
    pub name: String,
    /// Column(s) in this table
    #[serde(alias = "columnName", deserialize_with = "one_or_many")]
    pub column_names: Vec<String>,
    /// Referenced table
    pub target_table_name: String,
    /// Referenced column(s)
    #[serde(alias = "targetColumnName", deserialize_with = "one_or_many")]
    pub target_column_names: Vec<String>,
    #[serde(default)]
    pub update_constraint: ForeignKeyAction,
    #[serde(default)]
    pub delete_constraint: ForeignKeyAction,
}

impl ForeignKeyConstraint {
    pub fn new<S: Into<String>, T: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
        target_table: impl Into<String>,
        target_columns: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            name: name.into(),
            column_names: columns.into_iter().map(Into::into).collect(),
            target_table_name: target_table.into(),
            target_column_names: target_columns.into_iter().map(Into::into).collect(),
            update_constraint: ForeignKeyAction::NoAction,
            delete_constraint: ForeignKeyAction::NoAction,
        }
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.update_constraint = action;
        self
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.delete_constraint = action;
        self
    }
}

/// A CHECK constraint. `detail` is the bare boolean expression, without the
/// `CHECK` keyword or the surrounding parentheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    pub detail: String,
}

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    #[default]
    NoAction,
}

impl ForeignKeyAction {
    /// The action as it appears in DDL.
    pub fn to_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }

    /// Parse a DDL or IR spelling (`SET NULL`, `set_null`, `setNull`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "cascade" => Some(ForeignKeyAction::Cascade),
            "restrict" => Some(ForeignKeyAction::Restrict),
            "setnull" => Some(ForeignKeyAction::SetNull),
            "setdefault" => Some(ForeignKeyAction::SetDefault),
            "noaction" => Some(ForeignKeyAction::NoAction),
            _ => None,
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql())
    }
}

/// An enum type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enum {
    pub name: String,
    /// Labels, in declaration order
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Enum {
    pub fn new<S: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            comment: None,
        }
    }
}

/// A UI grouping of tables. Not interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableGroup {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Accepts either a single string (legacy `columnName` shape) or a list.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

#[cfg(test)]
mod tests;
