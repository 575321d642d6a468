//! DDL statements.

/// A DDL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    CreateTable(CreateTableStmt),
    DropTable(DropTableStmt),
    AlterTable(AlterTableStmt),
    CreateIndex(CreateIndexStmt),
    DropIndex(DropIndexStmt),
    RenameIndex(RenameIndexStmt),
    CommentOn(CommentStmt),
    CreateEnum(CreateEnumStmt),
    DropType(DropTypeStmt),
    AlterType(AlterTypeStmt),
}

// ============================================================================
// Tables
// ============================================================================

/// A CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// A column definition inside CREATE TABLE or ALTER TABLE ADD COLUMN.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: String,
    pub not_null: bool,
    pub default: Option<Literal>,
    /// Inline `CONSTRAINT name CHECK (expr)`
    pub check: Option<InlineCheck>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineCheck {
    pub name: String,
    pub expr: String,
}

/// A value in a DEFAULT clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Rendered single-quoted
    String(String),
    /// Rendered as-is
    Number(String),
    /// Rendered as TRUE/FALSE
    Bool(bool),
    /// A SQL expression, rendered verbatim
    Expr(String),
}

/// A DROP TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStmt {
    pub name: String,
}

/// An ALTER TABLE statement with a single action.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableStmt {
    pub table: String,
    pub action: AlterTableAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableAction {
    RenameTo(String),
    AddColumn(ColumnDef),
    DropColumn(String),
    RenameColumn { from: String, to: String },
    AlterColumn { column: String, change: ColumnChange },
    AddConstraint { name: String, def: ConstraintDef },
    DropConstraint { name: String, if_exists: bool },
    RenameConstraint { from: String, to: String },
}

/// ALTER COLUMN sub-actions.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    Type(String),
    SetNotNull,
    DropNotNull,
    SetDefault(Literal),
    DropDefault,
}

/// The body of a table constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintDef {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey(ForeignKeyDef),
    Check(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    /// Omitted when `None` (PostgreSQL defaults to NO ACTION)
    pub on_update: Option<&'static str>,
    pub on_delete: Option<&'static str>,
}

// ============================================================================
// Indexes
// ============================================================================

/// A CREATE INDEX statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStmt {
    pub name: String,
    pub table: String,
    pub unique: bool,
    /// Access method. Empty means no USING clause.
    pub using: String,
    /// Column names, or parenthesized expressions which are emitted verbatim
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStmt {
    pub name: String,
}

/// ALTER INDEX ... RENAME TO ...
#[derive(Debug, Clone, PartialEq)]
pub struct RenameIndexStmt {
    pub from: String,
    pub to: String,
}

// ============================================================================
// Comments
// ============================================================================

/// A COMMENT ON statement. A `None` comment renders `IS NULL`, which removes it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentStmt {
    pub target: CommentTarget,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommentTarget {
    Table(String),
    Column { table: String, column: String },
    Type(String),
}

// ============================================================================
// Enum types
// ============================================================================

/// CREATE TYPE ... AS ENUM (...)
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEnumStmt {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTypeStmt {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTypeStmt {
    pub name: String,
    pub action: AlterTypeAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTypeAction {
    RenameTo(String),
    AddValue(String),
}

// ============================================================================
// Builder-style constructors
// ============================================================================

impl CreateTableStmt {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            not_null: false,
            default: None,
            check: None,
        }
    }

    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    pub fn default_value(mut self, default: Option<Literal>) -> Self {
        self.default = default;
        self
    }

    pub fn check(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.check = Some(InlineCheck {
            name: name.into(),
            expr: expr.into(),
        });
        self
    }
}

impl AlterTableStmt {
    pub fn new(table: impl Into<String>, action: AlterTableAction) -> Self {
        Self {
            table: table.into(),
            action,
        }
    }
}

impl CommentStmt {
    pub fn table(table: impl Into<String>, comment: Option<String>) -> Self {
        Self {
            target: CommentTarget::Table(table.into()),
            comment,
        }
    }

    pub fn column(
        table: impl Into<String>,
        column: impl Into<String>,
        comment: Option<String>,
    ) -> Self {
        Self {
            target: CommentTarget::Column {
                table: table.into(),
                column: column.into(),
            },
            comment,
        }
    }

    pub fn on_type(name: impl Into<String>, comment: Option<String>) -> Self {
        Self {
            target: CommentTarget::Type(name.into()),
            comment,
        }
    }
}

macro_rules! impl_into_stmt {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Stmt {
                fn from(s: $ty) -> Self {
                    Stmt::$variant(s)
                }
            }
        )*
    };
}

impl_into_stmt! {
    CreateTable(CreateTableStmt),
    DropTable(DropTableStmt),
    AlterTable(AlterTableStmt),
    CreateIndex(CreateIndexStmt),
    DropIndex(DropIndexStmt),
    RenameIndex(RenameIndexStmt),
    CommentOn(CommentStmt),
    CreateEnum(CreateEnumStmt),
    DropType(DropTypeStmt),
    AlterType(AlterTypeStmt),
}
