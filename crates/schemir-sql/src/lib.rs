//! PostgreSQL DDL AST and rendering.
//!
//! Build DDL as a typed AST, then render it to a string. Every identifier is
//! double-quoted when rendered, and string literals are single-quoted with
//! embedded quotes doubled.

mod render;
pub use render::*;

mod stmt;
pub use stmt::*;

/// A PostgreSQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use schemir_sql::Lit;
/// assert_eq!(format!("{}", Lit("foo")), "'foo'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "'")
    }
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use schemir_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// Escape a string literal for SQL.
pub fn escape_string(s: &str) -> String {
    format!("{}", Lit(s))
}

/// Name PostgreSQL gives a primary key declared without `CONSTRAINT name`.
///
/// ```
/// assert_eq!(schemir_sql::primary_key_name("users"), "users_pkey");
/// ```
pub fn primary_key_name(table: &str) -> String {
    format!("{table}_pkey")
}

/// Name PostgreSQL gives an unnamed UNIQUE constraint.
///
/// ```
/// assert_eq!(schemir_sql::unique_key_name("users", &["email"]), "users_email_key");
/// ```
pub fn unique_key_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    format!("{table}_{}_key", join_columns(columns))
}

/// Name PostgreSQL gives an unnamed FOREIGN KEY constraint.
///
/// ```
/// assert_eq!(schemir_sql::foreign_key_name("posts", &["user_id"]), "posts_user_id_fkey");
/// ```
pub fn foreign_key_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    format!("{table}_{}_fkey", join_columns(columns))
}

/// Name PostgreSQL gives an unnamed index.
///
/// ```
/// assert_eq!(schemir_sql::index_name("posts", &["author_id", "created_at"]), "posts_author_id_created_at_idx");
/// ```
pub fn index_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    format!("{table}_{}_idx", join_columns(columns))
}

/// Name PostgreSQL gives an unnamed CHECK constraint.
///
/// Column-level checks are named after their column, table-level checks
/// after the table alone.
pub fn check_name(table: &str, column: Option<&str>) -> String {
    match column {
        Some(column) => format!("{table}_{column}_check"),
        None => format!("{table}_check"),
    }
}

/// Name of the constraint that carries a column's inline `check` expression.
///
/// ```
/// assert_eq!(schemir_sql::inline_check_name("age"), "CHECK_age");
/// ```
pub fn inline_check_name(column: &str) -> String {
    format!("CHECK_{column}")
}

fn join_columns(columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    cols.join("_")
}

/// Generate a deterministic CHECK constraint name for a table and expression.
///
/// Constraint names must be unique within a schema, so we include the table name
/// and a stable hash of the expression (after whitespace normalization).
pub fn check_constraint_name(table: &str, expr: &str) -> String {
    let normalized = normalize_sql_expr_for_hash(expr);
    let hex = blake3::hash(normalized.as_bytes()).to_hex().to_string();
    let suffix = &hex[..16];

    const PG_IDENT_MAX: usize = 63;
    let prefix_overhead = "ck__".len(); // "ck_" + "_" between table and suffix
    let max_table_len = PG_IDENT_MAX.saturating_sub(prefix_overhead + suffix.len());

    let table_part = if table.len() <= max_table_len {
        table
    } else {
        let mut len = max_table_len.min(table.len());
        while len > 0 && !table.is_char_boundary(len) {
            len -= 1;
        }
        &table[..len]
    };

    format!("ck_{}_{}", table_part, suffix)
}

/// Whether a default written as a string is really a SQL expression that
/// must be emitted verbatim (`now()`, `CURRENT_TIMESTAMP`, `nextval('seq')`).
pub fn is_sql_expression(value: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "CURRENT_TIMESTAMP",
        "CURRENT_DATE",
        "CURRENT_TIME",
        "LOCALTIMESTAMP",
        "LOCALTIME",
        "CURRENT_USER",
        "SESSION_USER",
    ];

    let trimmed = value.trim();
    if KEYWORDS.iter().any(|k| trimmed.eq_ignore_ascii_case(k)) {
        return true;
    }

    // function call: identifier (possibly schema-qualified) followed by a
    // parenthesized argument list that closes at the very end
    let Some(open) = trimmed.find('(') else {
        return false;
    };
    let (head, args) = trimmed.split_at(open);
    !head.is_empty()
        && head
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !head.starts_with(|c: char| c.is_ascii_digit())
        && closes_at_end(args)
}

fn closes_at_end(args: &str) -> bool {
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, c) in args.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == args.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn normalize_sql_expr_for_hash(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut pending_space = false;

    let mut in_single_quote = false;
    let mut in_double_quote = false;

    let mut chars = expr.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_single_quote {
            out.push(ch);
            if ch == '\'' {
                // SQL escapes single quotes by doubling them: ''
                if let Some(next) = chars.next_if_eq(&'\'') {
                    out.push(next);
                } else {
                    in_single_quote = false;
                }
            }
            continue;
        }

        if in_double_quote {
            out.push(ch);
            if ch == '"' {
                if let Some(next) = chars.next_if_eq(&'"') {
                    out.push(next);
                } else {
                    in_double_quote = false;
                }
            }
            continue;
        }

        match ch {
            '\'' | '"' => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(ch);
                if ch == '\'' {
                    in_single_quote = true;
                } else {
                    in_double_quote = true;
                }
            }
            c if c.is_whitespace() => {
                pending_space = true;
            }
            c => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}
