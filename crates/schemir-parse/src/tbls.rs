//! tbls `schema.json` parser.
//!
//! tbls already speaks PostgreSQL, so this is mostly a field-by-field copy.
//! The index and constraint `def` strings (`pg_get_indexdef` /
//! `pg_get_constraintdef` output) are scanned for the few details the JSON
//! doesn't carry separately.

use serde::Deserialize;
use schemir_schema::{
    CheckConstraint, Column, Constraint, DefaultValue, Enum, ForeignKeyAction,
    ForeignKeyConstraint, Index, Schema, Table,
};
use tracing::debug;

use crate::{ParseError, ParseOptions, ParseOutput, ProcessError, SchemaParser};

/// Parses tbls JSON exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct TblsParser;

impl SchemaParser for TblsParser {
    fn dialect(&self) -> &'static str {
        "tbls"
    }

    fn parse_with(&self, source: &str, options: &ParseOptions) -> Result<ParseOutput, ParseError> {
        let _span = tracing::debug_span!("parse_tbls", len = source.len()).entered();

        let doc: TblsSchema = serde_json::from_str(source).map_err(|source| ParseError::Json {
            dialect: "tbls",
            source,
        })?;

        let mut schema = Schema::new();
        let mut errors = Vec::new();

        for e in doc.enums {
            schema.insert_enum(Enum::new(e.name, e.values));
        }

        for table in doc.tables {
            if table.ty.as_deref().is_some_and(|t| t.contains("VIEW")) {
                debug!(table = %table.name, "skipping view");
                errors.push(ProcessError::unsupported("view", table.name));
                continue;
            }
            schema.insert_table(convert_table(table, &mut errors));
        }

        Ok(ParseOutput::finish(schema, errors, options))
    }
}

#[derive(Debug, Deserialize)]
struct TblsSchema {
    #[serde(default)]
    tables: Vec<TblsTable>,
    #[serde(default)]
    enums: Vec<TblsEnum>,
}

#[derive(Debug, Deserialize)]
struct TblsTable {
    name: String,
    #[serde(default, rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    columns: Vec<TblsColumn>,
    #[serde(default)]
    indexes: Vec<TblsIndex>,
    #[serde(default)]
    constraints: Vec<TblsConstraint>,
}

#[derive(Debug, Deserialize)]
struct TblsColumn {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TblsIndex {
    name: String,
    #[serde(default)]
    def: String,
    #[serde(default)]
    columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TblsConstraint {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    def: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    referenced_table: Option<String>,
    #[serde(default)]
    referenced_columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TblsEnum {
    name: String,
    #[serde(default)]
    values: Vec<String>,
}

fn convert_table(table: TblsTable, errors: &mut Vec<ProcessError>) -> Table {
    let mut ir = Table::new(table.name);
    ir.comment = table.comment.filter(|c| !c.is_empty());

    for column in table.columns {
        ir.insert_column(Column {
            name: column.name,
            ty: column.ty,
            default: column.default.map(|d| coerce_default(&d)),
            not_null: !column.nullable,
            unique: false,
            check: None,
            comment: column.comment.filter(|c| !c.is_empty()),
        });
    }

    for index in table.indexes {
        let mut converted = Index::new(index.name, index.columns);
        converted.unique = index.def.to_ascii_uppercase().contains("UNIQUE INDEX");
        converted.ty = index_method(&index.def).unwrap_or_default();
        ir.insert_index(converted);
    }

    for constraint in table.constraints {
        let converted = match constraint.ty.as_str() {
            "PRIMARY KEY" => Constraint::primary_key(constraint.name, constraint.columns),
            "UNIQUE" => Constraint::unique(constraint.name, constraint.columns),
            "FOREIGN KEY" => {
                let Some(target) = constraint.referenced_table else {
                    errors.push(ProcessError::UnresolvedReference {
                        reference: constraint.name,
                        context: "foreign key without referenced_table".into(),
                    });
                    continue;
                };
                let (on_update, on_delete) = referential_actions(&constraint.def);
                ForeignKeyConstraint::new(
                    constraint.name,
                    constraint.columns,
                    target,
                    constraint.referenced_columns,
                )
                .on_update(on_update)
                .on_delete(on_delete)
                .into()
            }
            "CHECK" => Constraint::Check(CheckConstraint {
                name: constraint.name,
                detail: check_expression(&constraint.def),
            }),
            other => {
                errors.push(ProcessError::unsupported(
                    format!("{other} constraint"),
                    constraint.name,
                ));
                continue;
            }
        };
        ir.insert_constraint(converted);
    }

    // single-column keys mark their column unique
    let unique_columns: Vec<String> = ir
        .constraints
        .values()
        .filter(|c| matches!(c, Constraint::PrimaryKey(_) | Constraint::Unique(_)))
        .filter_map(|c| match c.column_names() {
            [column] => Some(column.clone()),
            _ => None,
        })
        .collect();
    for name in unique_columns {
        if let Some(column) = ir.columns.get_mut(&name) {
            column.unique = true;
        }
    }

    ir
}

/// tbls exports every default as `pg_get_expr` text. Numbers and booleans are
/// typed, `'text'::type` loses its cast, anything else stays verbatim.
fn coerce_default(raw: &str) -> DefaultValue {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        return DefaultValue::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return DefaultValue::Boolean(false);
    }
    if let Some(n) = DefaultValue::parse_number(raw) {
        return n;
    }
    match quoted_literal(raw) {
        Some((text, rest)) if rest.is_empty() || is_type_cast(rest) => DefaultValue::String(text),
        _ => DefaultValue::from(raw),
    }
}

/// `::character varying(255)`, `::text[]`, `::public.mood`
fn is_type_cast(rest: &str) -> bool {
    rest.strip_prefix("::").is_some_and(|ty| {
        !ty.is_empty()
            && ty
                .chars()
                .all(|c| c.is_alphanumeric() || " _.,()[]\"".contains(c))
    })
}

/// Split `'it''s'::text` into `it's` and `::text`.
fn quoted_literal(s: &str) -> Option<(String, &str)> {
    let body = s.strip_prefix('\'')?;
    let mut text = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            text.push(c);
            continue;
        }
        if chars.next_if(|&(_, next)| next == '\'').is_some() {
            text.push('\'');
            continue;
        }
        return Some((text, &body[i + 1..]));
    }
    None
}

/// `CREATE INDEX ... USING btree (col)` -> `btree`
fn index_method(def: &str) -> Option<String> {
    let mut words = def.split_whitespace();
    words.find(|w| w.eq_ignore_ascii_case("USING"))?;
    let method = words.next()?;
    let method = method.split('(').next().unwrap_or(method);
    Some(method.to_ascii_lowercase())
}

/// Actions from `... REFERENCES t(id) ON UPDATE CASCADE ON DELETE SET NULL`.
fn referential_actions(def: &str) -> (ForeignKeyAction, ForeignKeyAction) {
    let upper = def.to_ascii_uppercase();
    let action_after = |keyword: &str| {
        let start = upper.find(keyword)? + keyword.len();
        let rest = upper[start..].trim_start();
        [
            ("SET NULL", ForeignKeyAction::SetNull),
            ("SET DEFAULT", ForeignKeyAction::SetDefault),
            ("CASCADE", ForeignKeyAction::Cascade),
            ("RESTRICT", ForeignKeyAction::Restrict),
            ("NO ACTION", ForeignKeyAction::NoAction),
        ]
        .into_iter()
        .find(|(spelling, _)| rest.starts_with(spelling))
        .map(|(_, action)| action)
    };
    (
        action_after("ON UPDATE").unwrap_or_default(),
        action_after("ON DELETE").unwrap_or_default(),
    )
}

/// `CHECK ((age > 0))` -> `age > 0`
fn check_expression(def: &str) -> String {
    let mut expr = def.trim();
    if expr.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("CHECK")) {
        expr = expr[5..].trim_start();
    }
    // NOT VALID / NO INHERIT trail the expression
    if let Some(end) = closing_paren(expr) {
        expr = &expr[..=end];
    }
    strip_enclosing_parens(expr).to_string()
}

fn strip_enclosing_parens(mut expr: &str) -> &str {
    loop {
        let trimmed = expr.trim();
        if trimmed.starts_with('(') && closing_paren(trimmed) == Some(trimmed.len() - 1) {
            expr = &trimmed[1..trimmed.len() - 1];
        } else {
            return trimmed;
        }
    }
}

/// Byte offset of the parenthesis closing the one `s` starts with.
fn closing_paren(s: &str) -> Option<usize> {
    if !s.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, c) in s.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
