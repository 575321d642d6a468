//! ActiveRecord `db/schema.rb` parser.
//!
//! The file is read as Ruby (no evaluation) and interpreted in two passes:
//! `create_table` and `create_enum` calls first, then the top-level
//! `add_foreign_key`, `add_check_constraint` and `add_index` calls, which may
//! refer to any table in the file regardless of where they appear.

use schemir_schema::{
    Column, Constraint, DefaultValue, Enum, ForeignKeyAction,
    ForeignKeyConstraint, Index, Schema, Table,
};
use tracing::{debug, trace};

use crate::{ParseError, ParseOptions, ParseOutput, Position, ProcessError, SchemaParser};

mod ast;
mod inflect;
mod lexer;
mod parser;

use ast::{Call, Expr};

/// Parses ActiveRecord `schema.rb` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaRbParser;

impl SchemaParser for SchemaRbParser {
    fn dialect(&self) -> &'static str {
        "schemarb"
    }

    fn parse_with(&self, source: &str, options: &ParseOptions) -> Result<ParseOutput, ParseError> {
        let _span = tracing::debug_span!("parse_schemarb", len = source.len()).entered();

        let tokens = lexer::tokenize(source)?;
        let (program, mut errors) =
            parser::parse_program(source, &tokens, options.max_nesting_depth);

        let mut calls = Vec::new();
        collect_calls(&program, &mut calls);

        let mut builder = Builder {
            source,
            schema: Schema::new(),
            errors: Vec::new(),
        };
        for call in &calls {
            builder.define(call);
        }
        for call in &calls {
            builder.attach(call);
        }
        errors.append(&mut builder.errors);

        Ok(ParseOutput::finish(builder.schema, errors, options))
    }
}

/// Top-level calls, looking through wrapper blocks like
/// `ActiveRecord::Schema[7.1].define(...) do ... end`.
fn collect_calls<'p>(program: &'p [Expr], out: &mut Vec<&'p Call>) {
    for expr in program {
        let Some(call) = expr.as_call() else {
            continue;
        };
        match call.method.as_str() {
            "create_table" | "create_enum" | "add_foreign_key" | "add_check_constraint"
            | "add_index" => out.push(call),
            _ => {
                if let Some(block) = &call.block {
                    collect_calls(&block.body, out);
                } else {
                    debug!(method = %call.method, "ignoring top-level call");
                }
            }
        }
    }
}

struct Builder<'s> {
    source: &'s str,
    schema: Schema,
    errors: Vec<ProcessError>,
}

impl Builder<'_> {
    fn unsupported(&mut self, call: &Call, detail: &str) {
        self.errors.push(ProcessError::unsupported(
            call.method.clone(),
            format!("{detail} at {}", Position::locate(self.source, call.offset)),
        ));
    }

    /// First pass: tables and enums.
    fn define(&mut self, call: &Call) {
        match call.method.as_str() {
            "create_table" => self.create_table(call),
            "create_enum" => {
                let name = call.args.first().and_then(Expr::as_name);
                let values = call.args.get(1).and_then(Expr::as_names);
                match (name, values) {
                    (Some(name), Some(values)) => {
                        self.schema.insert_enum(Enum::new(name, values));
                    }
                    _ => self.unsupported(call, "expected a name and a list of values"),
                }
            }
            _ => {}
        }
    }

    /// Second pass: statements that attach to tables by name.
    fn attach(&mut self, call: &Call) {
        match call.method.as_str() {
            "add_foreign_key" => self.add_foreign_key(call),
            "add_check_constraint" => {
                let (Some(table), Some(expr)) = (
                    call.args.first().and_then(Expr::as_name),
                    call.args.get(1).and_then(Expr::as_str),
                ) else {
                    return self.unsupported(call, "expected a table name and an expression");
                };
                let constraint = check_constraint(table, expr, call);
                self.with_table(table, "add_check_constraint", |table| {
                    table.insert_constraint(constraint);
                });
            }
            "add_index" => {
                let (Some(table), Some(columns)) = (
                    call.args.first().and_then(Expr::as_name),
                    call.args.get(1).and_then(Expr::as_names),
                ) else {
                    return self.unsupported(call, "expected a table name and columns");
                };
                let index = build_index(table, columns, &call.kwargs);
                self.with_table(table, "add_index", |table| {
                    table.insert_index(index);
                });
            }
            _ => {}
        }
    }

    fn with_table(&mut self, name: &str, context: &str, f: impl FnOnce(&mut Table)) {
        match self.schema.get_table_mut(name) {
            Some(table) => f(table),
            None => self.errors.push(ProcessError::UnknownTable {
                table: name.to_string(),
                context: context.to_string(),
            }),
        }
    }

    fn create_table(&mut self, call: &Call) {
        let Some(name) = call.args.first().and_then(Expr::as_name) else {
            return self.unsupported(call, "expected a table name");
        };
        let mut table = Table::new(name);
        table.comment = call.kwarg("comment").and_then(Expr::as_str).map(str::to_string);

        let id = call.kwarg("id");
        let primary_key = call.kwarg("primary_key").and_then(Expr::as_names);
        let mut composite_key = None;
        match primary_key {
            Some(columns) if columns.len() > 1 => composite_key = Some(columns),
            _ if matches!(id, Some(Expr::Bool(false))) => {
                composite_key = primary_key;
            }
            _ => {
                let column_name = primary_key
                    .and_then(|columns| columns.into_iter().next())
                    .unwrap_or_else(|| "id".to_string());
                let mut column = Column::new(&column_name, id_type(id)).not_null().unique();
                column.default = call.kwarg("default").and_then(default_value);
                table.insert_column(column);
                table.insert_constraint(Constraint::primary_key(
                    format!("PRIMARY_{column_name}"),
                    [column_name],
                ));
            }
        }

        if let Some(block) = &call.block {
            let var = block.params.first().map(String::as_str).unwrap_or("t");
            for expr in &block.body {
                match expr.as_call() {
                    Some(column_call) if column_call.has_receiver(var) => {
                        self.table_statement(&mut table, column_call);
                    }
                    _ => debug!(table = %table.name, "ignoring statement in create_table block"),
                }
            }
        }

        if let Some(columns) = composite_key {
            let name = schemir_sql::primary_key_name(&table.name);
            table.insert_constraint(Constraint::primary_key(name, columns));
        }

        trace!(table = %table.name, columns = table.columns.len(), "parsed table");
        if self.schema.insert_table(table).is_some() {
            debug!(table = %name, "table redefined, last definition wins");
        }
    }

    /// One `t.something ...` line inside `create_table`.
    fn table_statement(&mut self, table: &mut Table, call: &Call) {
        match call.method.as_str() {
            "index" => match call.args.first().and_then(Expr::as_names) {
                Some(columns) => {
                    table.insert_index(build_index(&table.name, columns, &call.kwargs));
                }
                None => self.unsupported(call, "expected index columns"),
            },
            "check_constraint" => match call.args.first().and_then(Expr::as_str) {
                Some(expr) => {
                    table.insert_constraint(check_constraint(&table.name, expr, call));
                }
                None => self.unsupported(call, "expected a check expression"),
            },
            "timestamps" => {
                let nullable = call.kwarg("null").and_then(Expr::as_bool) == Some(true);
                let ty = rails_type("datetime", &call.kwargs);
                for name in ["created_at", "updated_at"] {
                    let mut column = Column::new(name, &ty);
                    column.not_null = !nullable;
                    table.insert_column(column);
                }
            }
            "references" | "belongs_to" => {
                let names: Vec<&str> = call.args.iter().filter_map(Expr::as_name).collect();
                if names.is_empty() {
                    return self.unsupported(call, "expected a reference name");
                }
                for name in names {
                    add_reference(table, name, call);
                }
            }
            "column" => {
                let (Some(name), Some(ty)) = (
                    call.args.first().and_then(Expr::as_name),
                    call.args.get(1).and_then(Expr::as_name),
                ) else {
                    return self.unsupported(call, "expected a column name and type");
                };
                add_column(table, name, ty, call);
            }
            method => {
                let names: Vec<&str> = call.args.iter().filter_map(Expr::as_name).collect();
                if names.is_empty() {
                    return self.unsupported(call, "expected a column name");
                }
                for name in names {
                    add_column(table, name, method, call);
                }
            }
        }
    }

    fn add_foreign_key(&mut self, call: &Call) {
        let (Some(from), Some(to)) = (
            call.args.first().and_then(Expr::as_name),
            call.args.get(1).and_then(Expr::as_name),
        ) else {
            return self.unsupported(call, "expected two table names");
        };

        let columns = call
            .kwarg("column")
            .and_then(Expr::as_names)
            .unwrap_or_else(|| vec![format!("{}_id", inflect::singularize(to))]);
        let target_columns = call
            .kwarg("primary_key")
            .and_then(Expr::as_names)
            .unwrap_or_else(|| vec!["id".to_string()]);
        let name = call
            .kwarg("name")
            .and_then(Expr::as_name)
            .map(str::to_string)
            .unwrap_or_else(|| format!("fk_{from}_{}", columns.join("_")));

        let fk = ForeignKeyConstraint::new(name, columns, to, target_columns)
            .on_update(referential_action(call.kwarg("on_update")))
            .on_delete(referential_action(call.kwarg("on_delete")));
        self.with_table(from, "add_foreign_key", |table| {
            table.insert_constraint(fk.into());
        });
    }
}

fn add_column(table: &mut Table, name: &str, rails: &str, call: &Call) {
    let mut column = Column::new(name, rails_type(rails, &call.kwargs));
    column.not_null = call.kwarg("null").and_then(Expr::as_bool) == Some(false);
    column.default = call.kwarg("default").and_then(default_value);
    column.comment = call.kwarg("comment").and_then(Expr::as_str).map(str::to_string);

    // `index: true` / `index: { unique: true, name: ..., using: ... }`
    let index_options = match call.kwarg("index") {
        Some(Expr::Bool(true)) => Some(Vec::new()),
        Some(Expr::Hash(pairs)) => Some(pairs.clone()),
        _ => None,
    };
    if let Some(options) = index_options {
        let unique = hash_get(&options, "unique").and_then(Expr::as_bool) == Some(true);
        let index_name = hash_get(&options, "name")
            .and_then(Expr::as_name)
            .map(str::to_string)
            .unwrap_or_else(|| {
                if unique {
                    format!("unique_{name}")
                } else {
                    format!("index_{name}")
                }
            });
        let mut index = Index::new(index_name, [name]);
        index.unique = unique;
        index.ty = hash_get(&options, "using")
            .and_then(Expr::as_name)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        table.insert_index(index);

        if unique {
            column.unique = true;
            table.insert_constraint(Constraint::unique(format!("UNIQUE_{name}"), [name]));
        }
    }

    table.insert_column(column);
}

/// `t.references :user` adds `user_id` (and `user_type` when polymorphic),
/// an index unless `index: false`, and a foreign key when asked for one.
fn add_reference(table: &mut Table, name: &str, call: &Call) {
    let id_column = format!("{name}_id");
    let ty = call
        .kwarg("type")
        .and_then(Expr::as_name)
        .map(|ty| rails_type(ty, &[]))
        .unwrap_or_else(|| "bigint".to_string());
    let not_null = call.kwarg("null").and_then(Expr::as_bool) == Some(false);
    let polymorphic = call.kwarg("polymorphic").and_then(Expr::as_bool) == Some(true);

    let mut column = Column::new(&id_column, ty);
    column.not_null = not_null;
    table.insert_column(column);

    let mut index_columns = vec![id_column.clone()];
    if polymorphic {
        let type_column = format!("{name}_type");
        let mut column = Column::new(&type_column, "varchar");
        column.not_null = not_null;
        table.insert_column(column);
        index_columns.insert(0, type_column);
    }

    let index_options = match call.kwarg("index") {
        Some(Expr::Bool(false)) => None,
        Some(Expr::Hash(pairs)) => Some(pairs.as_slice()),
        _ => Some(&[][..]),
    };
    if let Some(options) = index_options {
        table.insert_index(build_index(&table.name, index_columns, options));
    }

    let fk_options = match call.kwarg("foreign_key") {
        Some(Expr::Bool(true)) => Some(&[][..]),
        Some(Expr::Hash(pairs)) => Some(pairs.as_slice()),
        _ => None,
    };
    if let Some(options) = fk_options {
        let target = hash_get(options, "to_table")
            .and_then(Expr::as_name)
            .map(str::to_string)
            .unwrap_or_else(|| inflect::pluralize(name));
        let target_column = hash_get(options, "primary_key")
            .and_then(Expr::as_name)
            .unwrap_or("id");
        let fk_name = hash_get(options, "name")
            .and_then(Expr::as_name)
            .map(str::to_string)
            .unwrap_or_else(|| format!("fk_{}_{id_column}", table.name));
        let fk = ForeignKeyConstraint::new(fk_name, [id_column], target, [target_column])
            .on_update(referential_action(hash_get(options, "on_update")))
            .on_delete(referential_action(hash_get(options, "on_delete")));
        table.insert_constraint(fk.into());
    }
}

fn hash_get<'e>(pairs: &'e [(String, Expr)], key: &str) -> Option<&'e Expr> {
    pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn build_index(table: &str, columns: Vec<String>, options: &[(String, Expr)]) -> Index {
    let name = hash_get(options, "name")
        .and_then(Expr::as_name)
        .map(str::to_string)
        .unwrap_or_else(|| rails_index_name(table, &columns));
    let mut index = Index::new(name, columns);
    index.unique = hash_get(options, "unique").and_then(Expr::as_bool) == Some(true);
    index.ty = hash_get(options, "using")
        .and_then(Expr::as_name)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    index
}

/// `index_users_on_email_and_tenant_id`
fn rails_index_name(table: &str, columns: &[String]) -> String {
    let columns: Vec<String> = columns
        .iter()
        .map(|c| {
            c.chars()
                .map(|ch| if ch.is_alphanumeric() { ch } else { '_' })
                .collect::<String>()
        })
        .collect();
    format!("index_{table}_on_{}", columns.join("_and_"))
}

fn check_constraint(table: &str, expr: &str, call: &Call) -> Constraint {
    let name = call
        .kwarg("name")
        .and_then(Expr::as_name)
        .map(str::to_string)
        .unwrap_or_else(|| schemir_sql::check_constraint_name(table, expr));
    Constraint::check(name, expr)
}

fn referential_action(option: Option<&Expr>) -> ForeignKeyAction {
    match option.and_then(Expr::as_name) {
        Some("cascade") => ForeignKeyAction::Cascade,
        Some("restrict") => ForeignKeyAction::Restrict,
        Some("nullify") => ForeignKeyAction::SetNull,
        _ => ForeignKeyAction::NoAction,
    }
}

fn default_value(expr: &Expr) -> Option<DefaultValue> {
    match expr {
        Expr::Str(s) => Some(DefaultValue::String(s.clone())),
        Expr::Number(n) => DefaultValue::parse_number(n),
        Expr::Bool(b) => Some(DefaultValue::Boolean(*b)),
        // `-> { "now()" }` is a SQL expression, kept as text
        Expr::Lambda(body) => body.iter().find_map(Expr::as_str).map(DefaultValue::from),
        _ => None,
    }
}

/// Type of the implicit primary key column for an `id:` option.
fn id_type(id: Option<&Expr>) -> String {
    match id.and_then(Expr::as_name) {
        None | Some("bigint" | "primary_key") => "bigserial".to_string(),
        Some("integer") => "serial".to_string(),
        Some(other) => rails_type(other, &[]),
    }
}

/// PostgreSQL type for an ActiveRecord column type and its options.
fn rails_type(rails: &str, options: &[(String, Expr)]) -> String {
    let option = |key: &str| hash_get(options, key).and_then(Expr::as_usize);
    let limit = option("limit");
    let precision = option("precision");
    let scale = option("scale");

    let with_precision = |base: &str| match precision {
        Some(p) => format!("{base}({p})"),
        None => base.to_string(),
    };

    let ty = match rails {
        "string" => match limit {
            Some(n) => format!("varchar({n})"),
            None => "varchar".to_string(),
        },
        "integer" => match limit {
            Some(1 | 2) => "smallint".to_string(),
            Some(n) if n > 4 => "bigint".to_string(),
            _ => "integer".to_string(),
        },
        "float" => "double precision".to_string(),
        "decimal" | "numeric" => match (precision, scale) {
            (Some(p), Some(s)) => format!("numeric({p},{s})"),
            (Some(p), None) => format!("numeric({p})"),
            _ => "numeric".to_string(),
        },
        "datetime" | "timestamp" => with_precision("timestamp"),
        "timestamptz" => with_precision("timestamptz"),
        "time" => with_precision("time"),
        "binary" => "bytea".to_string(),
        "primary_key" => "bigserial".to_string(),
        "bit" | "bit_varying" => {
            let base = if rails == "bit" { "bit" } else { "bit varying" };
            match limit {
                Some(n) => format!("{base}({n})"),
                None => base.to_string(),
            }
        }
        "enum" => hash_get(options, "enum_type")
            .and_then(Expr::as_name)
            .unwrap_or("enum")
            .to_string(),
        "virtual" => match hash_get(options, "type").and_then(Expr::as_name) {
            Some(inner) if inner != "virtual" => return rails_type(inner, options),
            _ => "text".to_string(),
        },
        other => other.to_string(),
    };

    if hash_get(options, "array").and_then(Expr::as_bool) == Some(true) {
        format!("{ty}[]")
    } else {
        ty
    }
}
