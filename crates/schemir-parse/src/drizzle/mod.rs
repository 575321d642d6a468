//! Drizzle ORM parser.
//!
//! Reads the TypeScript source of a Drizzle schema module without running
//! it. Builder chains such as `varchar("email", { length: 255 }).notNull()`
//! are walked as syntax.
//!
//! The module is interpreted in passes: `pgSchema` and `pgEnum` declarations
//! first, then the columns of every `pgTable`, then the table extenders and
//! `.references(...)` targets (which may name tables declared later), and
//! last the `relations(...)` helpers, which only refine relationship
//! cardinality.

use indexmap::IndexMap;
use schemir_schema::{
    Cardinality, Column, Constraint, DefaultValue, Enum, ForeignKeyAction, ForeignKeyConstraint,
    Index, Schema, Table,
};
use tracing::{debug, trace};

use crate::{ParseError, ParseOptions, ParseOutput, Position, ProcessError, SchemaParser};

mod ast;
mod lexer;
mod parser;

use ast::{Arrow, Expr, Link, Property, Stmt};

/// Parses Drizzle ORM (PostgreSQL) schema modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrizzleParser;

impl SchemaParser for DrizzleParser {
    fn dialect(&self) -> &'static str {
        "drizzle"
    }

    fn parse_with(&self, source: &str, options: &ParseOptions) -> Result<ParseOutput, ParseError> {
        let _span = tracing::debug_span!("parse_drizzle", len = source.len()).entered();

        let tokens = lexer::tokenize(source)?;
        let (program, mut errors) =
            parser::parse_program(source, &tokens, options.max_nesting_depth);

        let mut builder = Builder::new(source, &program);
        builder.define_types();
        builder.define_tables();
        builder.attach();
        builder.collect_relations();
        errors.append(&mut builder.errors);

        let Builder {
            schema, relations, ..
        } = builder;
        let mut output = ParseOutput::finish(schema, errors, options);
        if options.derive_relationships {
            refine_cardinality(&mut output.schema, &relations);
        }
        Ok(output)
    }
}

/// What a table variable resolves to.
struct TableInfo {
    name: String,
    /// JS property name -> database column name
    columns: IndexMap<String, String>,
}

struct TableDecl<'p> {
    info: TableInfo,
    extender: Option<&'p Expr>,
}

/// A `.references(() => target.column, options)` waiting for pass two.
struct PendingReference<'p> {
    decl: usize,
    column: String,
    target: &'p Expr,
    options: Option<&'p Expr>,
    offset: usize,
}

/// `one(...)` / `many(...)` seen from a table towards a target.
#[derive(Debug, Default, Clone, Copy)]
struct RelationKinds {
    one: bool,
    many: bool,
}

struct Builder<'p> {
    source: &'p str,
    program: &'p [Stmt],
    schema: Schema,
    errors: Vec<ProcessError>,
    /// `const` initializers, for resolving spreads
    vars: IndexMap<&'p str, &'p Expr>,
    /// `pgSchema(...)` variable -> schema name
    schemas: IndexMap<&'p str, String>,
    /// `pgEnum(...)` variable -> enum name
    enums: IndexMap<&'p str, String>,
    decls: Vec<TableDecl<'p>>,
    /// Table variable -> index into `decls`
    table_vars: IndexMap<&'p str, usize>,
    /// Table name -> the declaration that defines it (last one wins)
    winners: IndexMap<String, usize>,
    references: Vec<PendingReference<'p>>,
    /// (table, target table) -> relation helpers declared on `table`
    relations: IndexMap<(String, String), RelationKinds>,
}

impl<'p> Builder<'p> {
    fn new(source: &'p str, program: &'p [Stmt]) -> Self {
        let vars = program
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Decl { name, init } => Some((name.as_str(), init)),
                Stmt::Expr(_) => None,
            })
            .collect();
        Self {
            source,
            program,
            schema: Schema::new(),
            errors: Vec::new(),
            vars,
            schemas: IndexMap::new(),
            enums: IndexMap::new(),
            decls: Vec::new(),
            table_vars: IndexMap::new(),
            winners: IndexMap::new(),
            references: Vec::new(),
            relations: IndexMap::new(),
        }
    }

    /// Top-level statements as `(variable, initializer)`.
    fn statements(&self) -> impl Iterator<Item = (Option<&'p str>, &'p Expr)> + use<'p> {
        let program = self.program;
        program.iter().map(|stmt| match stmt {
            Stmt::Decl { name, init } => (Some(name.as_str()), init),
            Stmt::Expr(expr) => (None, expr),
        })
    }

    fn unsupported(&mut self, construct: &str, detail: String, offset: usize) {
        self.errors.push(ProcessError::unsupported(
            construct,
            format!("{detail} at {}", Position::locate(self.source, offset)),
        ));
    }

    /// The base call of a builder chain when it is `function(...)` or
    /// `<schema variable>.function(...)`.
    fn builder_call(&self, expr: &'p Expr, function: &str, schema_method: &str) -> Option<Link<'p>> {
        let (receiver, links) = expr.chain()?;
        let base = *links.first()?;
        match receiver {
            None if base.method == function => Some(base),
            Some(Expr::Ident(var)) if base.method == schema_method && self.schemas.contains_key(var.as_str()) => {
                Some(base)
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Pass 1: schemas and enums
    // ------------------------------------------------------------------

    fn define_types(&mut self) {
        for (var, init) in self.statements() {
            if let Some(base) = self.builder_call(init, "pgSchema", "") {
                if let (Some(var), Some(name)) = (var, base.args.first().and_then(Expr::as_str)) {
                    self.schemas.insert(var, name.to_string());
                }
                continue;
            }
            let Some(base) = self.builder_call(init, "pgEnum", "enum") else {
                continue;
            };
            let name = base.args.first().and_then(Expr::as_str);
            let values = base.args.get(1).and_then(string_list);
            match (name, values) {
                (Some(name), Some(values)) => {
                    if let Some(var) = var {
                        self.enums.insert(var, name.to_string());
                    }
                    self.schema.insert_enum(Enum::new(name, values));
                }
                _ => self.unsupported(
                    "pgEnum",
                    "expected a name and an array of string values".to_string(),
                    base.offset,
                ),
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 2: tables and columns
    // ------------------------------------------------------------------

    fn define_tables(&mut self) {
        for (var, init) in self.statements() {
            let Some(base) = self.builder_call(init, "pgTable", "table") else {
                continue;
            };
            let Some(name) = base.args.first().and_then(Expr::as_str) else {
                self.unsupported("pgTable", "expected a table name".to_string(), base.offset);
                continue;
            };
            let schema_name = match (init.chain(), base.method == "table") {
                (Some((Some(Expr::Ident(schema_var)), _)), true) => {
                    self.schemas.get(schema_var.as_str()).cloned()
                }
                _ => None,
            };

            // `{ ... }` or `(t) => ({ ... })`
            let columns = match base.args.get(1) {
                Some(Expr::Arrow(Arrow { body, .. })) => body.as_ref(),
                Some(columns) => columns,
                None => {
                    self.unsupported("pgTable", format!("`{name}` has no columns"), base.offset);
                    continue;
                }
            };

            let decl = self.decls.len();
            let mut table = Table::new(name);
            table.schema_name = schema_name;
            let mut info = TableInfo {
                name: name.to_string(),
                columns: IndexMap::new(),
            };
            for (key, expr) in self.properties(columns, base.offset) {
                self.add_column(decl, &mut table, &mut info, &key, expr);
            }

            trace!(table = %table.name, columns = table.columns.len(), "parsed table");
            if self.schema.insert_table(table).is_some() {
                debug!(table = name, "table redefined, last definition wins");
            }
            self.winners.insert(name.to_string(), decl);
            if let Some(var) = var {
                self.table_vars.insert(var, decl);
            }
            self.decls.push(TableDecl {
                info,
                extender: base.args.get(2),
            });
        }
    }

    /// Entries of an object literal, with `...spread` of other `const`
    /// objects expanded in place.
    fn properties(&mut self, object: &'p Expr, offset: usize) -> Vec<(String, &'p Expr)> {
        let Expr::Object(props) = object else {
            self.unsupported("object", "expected an object literal".to_string(), offset);
            return Vec::new();
        };
        let mut entries = Vec::new();
        for prop in props {
            match prop {
                Property::Pair(key, value) => entries.push((key.clone(), value)),
                Property::Spread(Expr::Ident(var)) => match self.vars.get(var.as_str()).copied() {
                    Some(spread @ Expr::Object(_)) => entries.extend(self.properties(spread, offset)),
                    _ => self.errors.push(ProcessError::UnresolvedReference {
                        reference: var.clone(),
                        context: "object spread".to_string(),
                    }),
                },
                Property::Spread(_) => {
                    self.unsupported("spread", "expected a variable".to_string(), offset)
                }
            }
        }
        entries
    }

    fn add_column(
        &mut self,
        decl: usize,
        table: &mut Table,
        info: &mut TableInfo,
        key: &str,
        expr: &'p Expr,
    ) {
        let Some((_, links)) = expr.chain() else {
            self.unsupported(
                "column",
                format!("`{}.{key}` is not a column builder", table.name),
                0,
            );
            return;
        };
        let Some((base, modifiers)) = links.split_first() else {
            return;
        };

        let name = base.args.first().and_then(Expr::as_str).unwrap_or(key).to_string();
        let config = base.args.iter().find(|arg| matches!(arg, Expr::Object(_)));
        let ty = match self.enums.get(base.method) {
            Some(enum_name) => enum_name.clone(),
            None => match column_type(base.method, config) {
                Some(ty) => ty,
                None => {
                    self.unsupported(
                        "column type",
                        format!("`{}` for `{}.{name}`", base.method, table.name),
                        base.offset,
                    );
                    return;
                }
            },
        };

        let mut column = Column::new(&name, ty);
        for link in modifiers {
            match link.method {
                "notNull" => column.not_null = true,
                "primaryKey" => {
                    column.not_null = true;
                    column.unique = true;
                    table.insert_constraint(Constraint::primary_key(
                        format!("PRIMARY_{name}"),
                        [&name],
                    ));
                }
                "unique" => {
                    column.unique = true;
                    let constraint_name = link
                        .args
                        .first()
                        .and_then(Expr::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("UNIQUE_{name}"));
                    table.insert_constraint(Constraint::unique(constraint_name, [&name]));
                }
                "default" => {
                    column.default = link.args.first().and_then(|value| self.default_value(value))
                }
                "defaultNow" => column.default = Some(DefaultValue::from("now()")),
                "defaultRandom" => column.default = Some(DefaultValue::from("gen_random_uuid()")),
                "array" => column.ty.push_str("[]"),
                "generatedAlwaysAsIdentity" | "generatedByDefaultAsIdentity" => {
                    column.not_null = true
                }
                "$comment" | "comment" => {
                    column.comment = link.args.first().and_then(Expr::as_str).map(str::to_string)
                }
                "references" => match link.args.first() {
                    Some(target) => self.references.push(PendingReference {
                        decl,
                        column: name.clone(),
                        target,
                        options: link.args.get(1),
                        offset: link.offset,
                    }),
                    None => self.unsupported(
                        "references",
                        "expected a target column".to_string(),
                        link.offset,
                    ),
                },
                // client-side or type-level only
                other => trace!(method = other, column = %name, "ignoring column modifier"),
            }
        }

        info.columns.insert(key.to_string(), name);
        table.insert_column(column);
    }

    fn default_value(&self, value: &Expr) -> Option<DefaultValue> {
        match value {
            Expr::Str(s) => Some(DefaultValue::String(s.clone())),
            Expr::Number(n) => DefaultValue::parse_number(n),
            Expr::Bool(b) => Some(DefaultValue::Boolean(*b)),
            Expr::Template { tag, text } if tag.as_deref().is_none_or(is_sql_tag) => {
                Some(DefaultValue::String(self.render_sql(text, None)))
            }
            _ => {
                debug!("default has no literal form, dropped");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Column resolution
    // ------------------------------------------------------------------

    /// Resolve `object.property` to `(table name, database column name)`.
    ///
    /// `local` is the extender parameter and the table it stands for. A
    /// property missing from the column map is taken as the column name.
    fn resolve(
        &self,
        object: &str,
        property: &str,
        local: Option<(&str, &TableInfo)>,
    ) -> Option<(String, String)> {
        let info = match local {
            Some((param, info)) if param == object => info,
            _ => &self.decls[*self.table_vars.get(object)?].info,
        };
        let column = match info.columns.get(property) {
            Some(column) => column.clone(),
            None => {
                debug!(table = %info.name, property, "unknown column property, using it as the column name");
                property.to_string()
            }
        };
        Some((info.name.clone(), column))
    }

    /// A column reference such as `table.email` or `table.email.desc()`.
    fn column_ref(&self, expr: &Expr, local: Option<(&str, &TableInfo)>) -> Option<(String, String)> {
        match expr {
            Expr::Member(object, property) => self.resolve(object.as_ident()?, property, local),
            Expr::Call(call) => match call.callee.as_ref() {
                Expr::Member(inner, modifier)
                    if matches!(
                        modifier.as_str(),
                        "asc" | "desc" | "nullsFirst" | "nullsLast" | "op"
                    ) =>
                {
                    self.column_ref(inner, local)
                }
                _ => None,
            },
            // `() => users.id`
            Expr::Arrow(arrow) => self.column_ref(&arrow.body, local),
            _ => None,
        }
    }

    /// Template text with `${table.column}` interpolations replaced by
    /// column names. Anything else is kept as written, minus the `${}`.
    fn render_sql(&self, text: &str, local: Option<(&str, &TableInfo)>) -> String {
        let mut out = String::new();
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = interpolation_end(after) else {
                out.push_str(&rest[start..]);
                return out;
            };
            let inner = after[..end].trim();
            let resolved = inner
                .split_once('.')
                .filter(|(object, property)| is_identifier(object) && is_identifier(property))
                .and_then(|(object, property)| self.resolve(object, property, local));
            match resolved {
                Some((_, column)) => out.push_str(&column),
                None => out.push_str(inner),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    // ------------------------------------------------------------------
    // Pass 3: extenders and references
    // ------------------------------------------------------------------

    fn attach(&mut self) {
        for decl in 0..self.decls.len() {
            if self.winners.get(&self.decls[decl].info.name) != Some(&decl) {
                continue;
            }
            if let Some(extender) = self.decls[decl].extender {
                self.extend(decl, extender);
            }
        }

        let references = std::mem::take(&mut self.references);
        for reference in references {
            if self.winners.get(&self.decls[reference.decl].info.name) != Some(&reference.decl) {
                continue;
            }
            self.add_reference(&reference);
        }
    }

    /// The third `pgTable` argument: `(table) => ({ ... })` or
    /// `(table) => [ ... ]`.
    fn extend(&mut self, decl: usize, extender: &'p Expr) {
        let Expr::Arrow(arrow) = extender else {
            return self.unsupported(
                "pgTable",
                format!("extender of `{}` is not an arrow function", self.decls[decl].info.name),
                0,
            );
        };
        let param = arrow.params.first().map(String::as_str).unwrap_or("table");
        let entries: Vec<&'p Expr> = match arrow.body.as_ref() {
            Expr::Array(items) => items.iter().collect(),
            Expr::Object(props) => props
                .iter()
                .filter_map(|prop| match prop {
                    Property::Pair(_, value) => Some(value),
                    Property::Spread(_) => None,
                })
                .collect(),
            _ => {
                return self.unsupported(
                    "pgTable",
                    format!(
                        "extender of `{}` must return an object or an array",
                        self.decls[decl].info.name
                    ),
                    0,
                );
            }
        };

        for entry in entries {
            match self.extender_entry(decl, param, entry) {
                Ok(Some(item)) => {
                    let name = &self.decls[decl].info.name;
                    if let Some(table) = self.schema.get_table_mut(name) {
                        match item {
                            Extension::Index(index) => {
                                table.insert_index(index);
                            }
                            Extension::Constraint(constraint) => {
                                table.insert_constraint(constraint);
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => self.errors.push(err),
            }
        }
    }

    fn extender_entry(
        &self,
        decl: usize,
        param: &str,
        entry: &Expr,
    ) -> Result<Option<Extension>, ProcessError> {
        let info = &self.decls[decl].info;
        let local = Some((param, info));
        let table = info.name.as_str();
        let Some((_, links)) = entry.chain() else {
            return Err(ProcessError::unsupported(
                "table extender entry",
                format!("expected a builder call in `{table}`"),
            ));
        };
        let Some((base, modifiers)) = links.split_first() else {
            return Ok(None);
        };
        let at = Position::locate(self.source, base.offset);

        let columns_of = |args: &[Expr]| -> Result<Vec<String>, ProcessError> {
            args.iter()
                .map(|arg| match arg {
                    Expr::Template { tag, text } if tag.as_deref().is_none_or(is_sql_tag) => {
                        Ok(self.render_sql(text, local))
                    }
                    _ => self
                        .column_ref(arg, local)
                        .map(|(_, column)| column)
                        .ok_or_else(|| ProcessError::UnresolvedReference {
                            reference: describe(arg),
                            context: format!("{} in `{table}` at {at}", base.method),
                        }),
                })
                .collect()
        };

        match base.method {
            "index" | "uniqueIndex" => {
                let mut columns = Vec::new();
                let mut ty = String::new();
                for link in modifiers {
                    match link.method {
                        "on" | "onOnly" => columns = columns_of(link.args)?,
                        "using" => {
                            ty = link
                                .args
                                .first()
                                .and_then(Expr::as_str)
                                .unwrap_or_default()
                                .to_ascii_lowercase();
                            if columns.is_empty() && link.args.len() > 1 {
                                columns = columns_of(&link.args[1..])?;
                            }
                        }
                        other => trace!(method = other, "ignoring index modifier"),
                    }
                }
                if columns.is_empty() {
                    return Err(ProcessError::unsupported(
                        base.method,
                        format!("index without columns in `{table}` at {at}"),
                    ));
                }
                let name = base
                    .args
                    .first()
                    .and_then(Expr::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{table}_{}_index", columns.join("_")));
                let mut index = Index::new(name, columns).using(ty);
                index.unique = base.method == "uniqueIndex";
                Ok(Some(Extension::Index(index)))
            }
            "primaryKey" => {
                let (columns, name) = match base.args.first() {
                    Some(config @ Expr::Object(_)) => {
                        let columns = match config.get("columns") {
                            Some(Expr::Array(items)) => columns_of(items)?,
                            _ => Vec::new(),
                        };
                        (columns, config.get("name").and_then(Expr::as_str))
                    }
                    _ => (columns_of(base.args)?, None),
                };
                if columns.is_empty() {
                    return Err(ProcessError::unsupported(
                        "primaryKey",
                        format!("primary key without columns in `{table}` at {at}"),
                    ));
                }
                let name = name
                    .map(str::to_string)
                    .unwrap_or_else(|| schemir_sql::primary_key_name(table));
                Ok(Some(Extension::Constraint(Constraint::primary_key(name, columns))))
            }
            "unique" => {
                let mut columns = Vec::new();
                for link in modifiers {
                    if link.method == "on" {
                        columns = columns_of(link.args)?;
                    }
                }
                if columns.is_empty() {
                    return Err(ProcessError::unsupported(
                        "unique",
                        format!("unique constraint without columns in `{table}` at {at}"),
                    ));
                }
                let name = base
                    .args
                    .first()
                    .and_then(Expr::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{table}_{}_unique", columns.join("_")));
                Ok(Some(Extension::Constraint(Constraint::unique(name, columns))))
            }
            "check" => {
                let name = base.args.first().and_then(Expr::as_str);
                let expr = match base.args.get(1) {
                    Some(Expr::Template { tag, text }) if tag.as_deref().is_none_or(is_sql_tag) => {
                        Some(self.render_sql(text, local))
                    }
                    _ => None,
                };
                match (name, expr) {
                    (Some(name), Some(expr)) => {
                        Ok(Some(Extension::Constraint(Constraint::check(name, expr.trim()))))
                    }
                    _ => Err(ProcessError::unsupported(
                        "check",
                        format!("expected a name and an sql`...` expression in `{table}` at {at}"),
                    )),
                }
            }
            "foreignKey" => {
                let config = base.args.first().filter(|arg| matches!(arg, Expr::Object(_)));
                let list = |key: &str| match config.and_then(|c| c.get(key)) {
                    Some(Expr::Array(items)) => items.as_slice(),
                    _ => &[][..],
                };
                let columns = columns_of(list("columns"))?;
                let foreign = list("foreignColumns");
                let targets = foreign
                    .iter()
                    .map(|arg| {
                        self.column_ref(arg, local).ok_or_else(|| {
                            ProcessError::UnresolvedReference {
                                reference: describe(arg),
                                context: format!("foreignKey in `{table}` at {at}"),
                            }
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let Some((target_table, _)) = targets.first().cloned() else {
                    return Err(ProcessError::unsupported(
                        "foreignKey",
                        format!("expected columns and foreignColumns in `{table}` at {at}"),
                    ));
                };
                let target_columns: Vec<String> =
                    targets.into_iter().map(|(_, column)| column).collect();

                let name = config
                    .and_then(|c| c.get("name"))
                    .and_then(Expr::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        foreign_key_name(table, &columns, &target_table, &target_columns)
                    });
                let mut fk = ForeignKeyConstraint::new(name, columns, target_table, target_columns);
                for link in modifiers {
                    let value = link.args.first().and_then(Expr::as_str).map(action);
                    match (link.method, value) {
                        ("onDelete", Some(action)) => fk.delete_constraint = action,
                        ("onUpdate", Some(action)) => fk.update_constraint = action,
                        _ => {}
                    }
                }
                Ok(Some(Extension::Constraint(fk.into())))
            }
            other => Err(ProcessError::unsupported(
                "table extender entry",
                format!("`{other}(...)` in `{table}` at {at}"),
            )),
        }
    }

    fn add_reference(&mut self, reference: &PendingReference<'p>) {
        let table = self.decls[reference.decl].info.name.clone();
        let Some((target_table, target_column)) = self.column_ref(reference.target, None) else {
            self.errors.push(ProcessError::UnresolvedReference {
                reference: describe(reference.target),
                context: format!(
                    "{table}.{} references at {}",
                    reference.column,
                    Position::locate(self.source, reference.offset)
                ),
            });
            return;
        };

        let option = |key: &str| {
            reference
                .options
                .and_then(|options| options.get(key))
                .and_then(Expr::as_str)
                .map(action)
                .unwrap_or_default()
        };
        let name = foreign_key_name(
            &table,
            std::slice::from_ref(&reference.column),
            &target_table,
            std::slice::from_ref(&target_column),
        );
        let fk = ForeignKeyConstraint::new(name, [&reference.column], target_table, [target_column])
            .on_update(option("onUpdate"))
            .on_delete(option("onDelete"));
        if let Some(table) = self.schema.get_table_mut(&table) {
            table.insert_constraint(fk.into());
        }
    }

    // ------------------------------------------------------------------
    // Pass 4: relations
    // ------------------------------------------------------------------

    /// `relations(users, ({ one, many }) => ({ profile: one(profiles), ... }))`
    fn collect_relations(&mut self) {
        for (_, init) in self.statements() {
            let Some(base) = self.builder_call(init, "relations", "") else {
                continue;
            };
            let source = base
                .args
                .first()
                .and_then(Expr::as_ident)
                .and_then(|var| self.table_vars.get(var))
                .map(|&decl| self.decls[decl].info.name.clone());
            let (Some(source), Some(Expr::Arrow(arrow))) = (source, base.args.get(1)) else {
                self.unsupported(
                    "relations",
                    "expected a table and a callback".to_string(),
                    base.offset,
                );
                continue;
            };
            let Expr::Object(props) = arrow.body.as_ref() else {
                continue;
            };
            for prop in props {
                let Property::Pair(_, value) = prop else {
                    continue;
                };
                let Some((None, links)) = value.chain() else {
                    continue;
                };
                let Some(target) = links[0]
                    .args
                    .first()
                    .and_then(Expr::as_ident)
                    .and_then(|var| self.table_vars.get(var))
                    .map(|&decl| self.decls[decl].info.name.clone())
                else {
                    continue;
                };
                let kinds = self.relations.entry((source.clone(), target)).or_default();
                match links[0].method {
                    "one" => kinds.one = true,
                    "many" => kinds.many = true,
                    _ => {}
                }
            }
        }
    }
}

enum Extension {
    Index(Index),
    Constraint(Constraint),
}

/// Upgrade relationships to one-to-one when both tables declare `one(...)`
/// towards each other and neither declares `many(...)`.
fn refine_cardinality(schema: &mut Schema, relations: &IndexMap<(String, String), RelationKinds>) {
    let one_only = |from: &str, to: &str| {
        relations
            .get(&(from.to_string(), to.to_string()))
            .is_some_and(|kinds| kinds.one && !kinds.many)
    };
    for relationship in schema.relationships.values_mut() {
        if one_only(&relationship.foreign_table_name, &relationship.primary_table_name)
            && one_only(&relationship.primary_table_name, &relationship.foreign_table_name)
        {
            relationship.cardinality = Cardinality::OneToOne;
        }
    }
}

/// `<table>_<columns>_<target>_<target columns>_fk`
fn foreign_key_name(table: &str, columns: &[String], target: &str, target_columns: &[String]) -> String {
    format!(
        "{table}_{}_{target}_{}_fk",
        columns.join("_"),
        target_columns.join("_")
    )
}

fn action(value: &str) -> ForeignKeyAction {
    ForeignKeyAction::parse(value).unwrap_or_default()
}

fn is_sql_tag(tag: &Expr) -> bool {
    tag.as_ident() == Some("sql")
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

/// Index of the `}` closing an interpolation body.
fn interpolation_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member(object, property) => format!("{}.{property}", describe(object)),
        Expr::Arrow(arrow) => format!("() => {}", describe(&arrow.body)),
        Expr::Call(call) => format!("{}(...)", describe(&call.callee)),
        _ => "<expression>".to_string(),
    }
}

fn string_list(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// PostgreSQL type for a `pg-core` column builder and its config object.
fn column_type(builder: &str, config: Option<&Expr>) -> Option<String> {
    let number = |key: &str| match config.and_then(|c| c.get(key)) {
        Some(Expr::Number(n)) => n.parse::<u32>().ok(),
        _ => None,
    };
    let with_time_zone = config.and_then(|c| c.get("withTimezone")) == Some(&Expr::Bool(true));
    let sized = |base: &str, size: Option<u32>| match size {
        Some(n) => format!("{base}({n})"),
        None => base.to_string(),
    };

    let ty = match builder {
        "serial" | "smallserial" | "bigserial" | "integer" | "smallint" | "bigint" | "text"
        | "boolean" | "date" | "json" | "jsonb" | "uuid" | "real" | "inet" | "cidr" | "macaddr"
        | "macaddr8" | "point" | "line" | "interval" | "geometry" => builder.to_string(),
        "doublePrecision" => "double precision".to_string(),
        "varchar" | "char" => sized(builder, number("length")),
        "numeric" | "decimal" => match (number("precision"), number("scale")) {
            (Some(p), Some(s)) => format!("numeric({p},{s})"),
            (Some(p), None) => format!("numeric({p})"),
            _ => "numeric".to_string(),
        },
        "timestamp" | "time" => {
            let base = sized(builder, number("precision"));
            if with_time_zone {
                format!("{base} with time zone")
            } else {
                base
            }
        }
        "vector" | "halfvec" | "sparsevec" | "bit" => sized(builder, number("dimensions")),
        _ => return None,
    };
    Some(ty)
}
