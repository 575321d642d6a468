//! Render DDL AST to string.

use std::fmt;

use crate::stmt::*;
use crate::{Ident, Lit};

/// Writes `items` separated by `", "`, each wrapped in [`Ident`].
struct IdentList<'a>(&'a [String]);

impl fmt::Display for IdentList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", Ident(item))?;
        }
        Ok(())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{}", Lit(s)),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Expr(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Ident(&self.name), self.ty)?;
        if self.not_null {
            write!(f, " NOT NULL")?;
        }
        if let Some(default) = &self.default {
            write!(f, " DEFAULT {default}")?;
        }
        if let Some(check) = &self.check {
            write!(f, " CONSTRAINT {} CHECK ({})", Ident(&check.name), check.expr)?;
        }
        Ok(())
    }
}

impl fmt::Display for ConstraintDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintDef::PrimaryKey(cols) => write!(f, "PRIMARY KEY ({})", IdentList(cols)),
            ConstraintDef::Unique(cols) => write!(f, "UNIQUE ({})", IdentList(cols)),
            ConstraintDef::ForeignKey(fk) => {
                write!(
                    f,
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    IdentList(&fk.columns),
                    Ident(&fk.target_table),
                    IdentList(&fk.target_columns)
                )?;
                if let Some(action) = fk.on_update {
                    write!(f, " ON UPDATE {action}")?;
                }
                if let Some(action) = fk.on_delete {
                    write!(f, " ON DELETE {action}")?;
                }
                Ok(())
            }
            ConstraintDef::Check(expr) => write!(f, "CHECK ({expr})"),
        }
    }
}

impl fmt::Display for CreateTableStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Ident(&self.name);
        if self.columns.is_empty() {
            return write!(f, "CREATE TABLE {name} ();");
        }
        write!(f, "CREATE TABLE {name} (")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "\n  {column}")?;
        }
        write!(f, "\n);")
    }
}

impl fmt::Display for AlterTableStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ALTER TABLE {} ", Ident(&self.table))?;
        match &self.action {
            AlterTableAction::RenameTo(to) => write!(f, "RENAME TO {}", Ident(to))?,
            AlterTableAction::AddColumn(column) => write!(f, "ADD COLUMN {column}")?,
            AlterTableAction::DropColumn(column) => write!(f, "DROP COLUMN {}", Ident(column))?,
            AlterTableAction::RenameColumn { from, to } => {
                write!(f, "RENAME COLUMN {} TO {}", Ident(from), Ident(to))?
            }
            AlterTableAction::AlterColumn { column, change } => {
                write!(f, "ALTER COLUMN {} ", Ident(column))?;
                match change {
                    ColumnChange::Type(ty) => write!(f, "TYPE {ty}")?,
                    ColumnChange::SetNotNull => write!(f, "SET NOT NULL")?,
                    ColumnChange::DropNotNull => write!(f, "DROP NOT NULL")?,
                    ColumnChange::SetDefault(lit) => write!(f, "SET DEFAULT {lit}")?,
                    ColumnChange::DropDefault => write!(f, "DROP DEFAULT")?,
                }
            }
            AlterTableAction::AddConstraint { name, def } => {
                write!(f, "ADD CONSTRAINT {} {def}", Ident(name))?
            }
            AlterTableAction::DropConstraint { name, if_exists } => {
                let if_exists = if *if_exists { "IF EXISTS " } else { "" };
                write!(f, "DROP CONSTRAINT {if_exists}{}", Ident(name))?
            }
            AlterTableAction::RenameConstraint { from, to } => {
                write!(f, "RENAME CONSTRAINT {} TO {}", Ident(from), Ident(to))?
            }
        }
        write!(f, ";")
    }
}

impl fmt::Display for CreateIndexStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unique = if self.unique { "UNIQUE " } else { "" };
        write!(
            f,
            "CREATE {unique}INDEX {} ON {}",
            Ident(&self.name),
            Ident(&self.table)
        )?;
        if !self.using.is_empty() {
            write!(f, " USING {}", self.using)?;
        }
        write!(f, " (")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if is_index_expression(column) {
                write!(f, "{column}")?;
            } else {
                write!(f, "{}", Ident(column))?;
            }
        }
        write!(f, ");")
    }
}

/// Index keys that are expressions (`lower(email)`, `(a + b)`) can't be quoted.
fn is_index_expression(column: &str) -> bool {
    column.contains('(')
}

impl fmt::Display for CommentStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            CommentTarget::Table(table) => write!(f, "COMMENT ON TABLE {}", Ident(table))?,
            CommentTarget::Column { table, column } => {
                write!(f, "COMMENT ON COLUMN {}.{}", Ident(table), Ident(column))?
            }
            CommentTarget::Type(name) => write!(f, "COMMENT ON TYPE {}", Ident(name))?,
        }
        match &self.comment {
            Some(comment) => write!(f, " IS {};", Lit(comment)),
            None => write!(f, " IS NULL;"),
        }
    }
}

impl fmt::Display for CreateEnumStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE TYPE {} AS ENUM (", Ident(&self.name))?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", Lit(value))?;
        }
        write!(f, ");")
    }
}

impl fmt::Display for AlterTypeStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ALTER TYPE {} ", Ident(&self.name))?;
        match &self.action {
            AlterTypeAction::RenameTo(to) => write!(f, "RENAME TO {};", Ident(to)),
            AlterTypeAction::AddValue(value) => write!(f, "ADD VALUE {};", Lit(value)),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::CreateTable(s) => write!(f, "{s}"),
            Stmt::DropTable(s) => write!(f, "DROP TABLE {};", Ident(&s.name)),
            Stmt::AlterTable(s) => write!(f, "{s}"),
            Stmt::CreateIndex(s) => write!(f, "{s}"),
            Stmt::DropIndex(s) => write!(f, "DROP INDEX {};", Ident(&s.name)),
            Stmt::RenameIndex(s) => {
                write!(f, "ALTER INDEX {} RENAME TO {};", Ident(&s.from), Ident(&s.to))
            }
            Stmt::CommentOn(s) => write!(f, "{s}"),
            Stmt::CreateEnum(s) => write!(f, "{s}"),
            Stmt::DropType(s) => write!(f, "DROP TYPE {};", Ident(&s.name)),
            Stmt::AlterType(s) => write!(f, "{s}"),
        }
    }
}

// ============================================================================
// Convenience methods
// ============================================================================

/// Render a statement to SQL.
pub fn render(stmt: &Stmt) -> String {
    stmt.to_string()
}

/// Render statements one per line.
pub fn render_lines(stmts: &[Stmt]) -> String {
    join_rendered(stmts, "\n")
}

/// Render statements separated by blank lines.
pub fn render_blocks(stmts: &[Stmt]) -> String {
    join_rendered(stmts, "\n\n")
}

fn join_rendered(stmts: &[Stmt], separator: &str) -> String {
    let mut out = String::new();
    for (i, stmt) in stmts.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        out.push_str(&stmt.to_string());
    }
    out
}
