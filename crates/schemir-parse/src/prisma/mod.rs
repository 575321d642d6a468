//! Prisma parser.
//!
//! Reads Prisma's DMMF rather than `.prisma` text: the Prisma toolchain has
//! already resolved attributes, relations and native types by the time the
//! DMMF is produced.
//!
//! Tables are built in two passes. Pass one turns every model into a table
//! with its columns, keys and indexes. Pass two walks relation fields, which
//! may point at models declared later, to add foreign keys and synthesize the
//! join tables of implicit many-to-many relations.

use indexmap::{IndexMap, IndexSet};
use schemir_schema::{
    Column, Constraint, DefaultValue, Enum, ForeignKeyAction, ForeignKeyConstraint, Index,
    Schema, Table,
};
use tracing::{debug, trace};

use crate::{ParseError, ParseOptions, ParseOutput, ProcessError, SchemaParser};

pub mod dmmf;
use dmmf::{Datamodel, Field, FieldKind, IndexKind, Model};

/// Parses DMMF JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrismaParser;

impl SchemaParser for PrismaParser {
    fn dialect(&self) -> &'static str {
        "prisma"
    }

    fn parse_with(&self, source: &str, options: &ParseOptions) -> Result<ParseOutput, ParseError> {
        parse(source, options)
    }
}

/// Parse a DMMF JSON document (or its bare `datamodel` member).
pub fn parse(source: &str, options: &ParseOptions) -> Result<ParseOutput, ParseError> {
    let input: dmmf::Input = serde_json::from_str(source).map_err(|source| ParseError::Json {
        dialect: "prisma",
        source,
    })?;
    Ok(parse_datamodel(&input.into_datamodel(), options))
}

/// Convert an already-deserialized DMMF data model.
pub fn parse_datamodel(datamodel: &Datamodel, options: &ParseOptions) -> ParseOutput {
    let _span = tracing::debug_span!("parse_prisma", models = datamodel.models.len()).entered();

    let mut builder = Builder::new(datamodel);
    builder.build_enums();
    builder.build_tables();
    builder.build_indexes();
    builder.build_relations();

    let Builder {
        mut schema,
        errors,
        join_tables,
        ..
    } = builder;
    for table in join_tables {
        schema.insert_table(table);
    }

    ParseOutput::finish(schema, errors, options)
}

struct Builder<'a> {
    datamodel: &'a Datamodel,
    schema: Schema,
    errors: Vec<ProcessError>,
    /// Model name -> table name
    table_names: IndexMap<&'a str, &'a str>,
    /// Enum name -> database enum name
    enum_names: IndexMap<&'a str, &'a str>,
    join_tables: Vec<Table>,
}

impl<'a> Builder<'a> {
    fn new(datamodel: &'a Datamodel) -> Self {
        let table_names = datamodel
            .models
            .iter()
            .map(|m| (m.name.as_str(), m.table_name()))
            .collect();
        let enum_names = datamodel
            .enums
            .iter()
            .map(|e| (e.name.as_str(), e.db_name.as_deref().unwrap_or(&e.name)))
            .collect();

        Self {
            datamodel,
            schema: Schema::new(),
            errors: Vec::new(),
            table_names,
            enum_names,
            join_tables: Vec::new(),
        }
    }

    fn model(&self, name: &str) -> Option<&'a Model> {
        let datamodel = self.datamodel;
        datamodel.models.iter().find(|m| m.name == name)
    }

    fn build_enums(&mut self) {
        let datamodel = self.datamodel;
        for e in &datamodel.enums {
            let values = e
                .values
                .iter()
                .map(|v| v.db_name.clone().unwrap_or_else(|| v.name.clone()));
            let mut ir = Enum::new(e.db_name.as_deref().unwrap_or(&e.name), values);
            ir.comment = e.documentation.clone();
            self.schema.insert_enum(ir);
        }
    }

    // ------------------------------------------------------------------
    // Pass 1: tables, columns, keys
    // ------------------------------------------------------------------

    fn build_tables(&mut self) {
        let datamodel = self.datamodel;
        for model in &datamodel.models {
            let table = self.build_table(model);
            trace!(model = %model.name, table = %table.name, "built table");
            self.schema.insert_table(table);
        }
    }

    fn build_table(&self, model: &Model) -> Table {
        let table_name = model.table_name();
        let mut table = Table::new(table_name);
        table.comment = model.documentation.clone();

        for field in &model.fields {
            if field.kind == FieldKind::Object {
                continue;
            }
            let column = self.build_column(field);

            if field.is_id {
                table.insert_constraint(Constraint::primary_key(
                    format!("PRIMARY_{}", column.name),
                    [column.name.clone()],
                ));
            } else if field.is_unique {
                table.insert_constraint(Constraint::unique(
                    format!("UNIQUE_{}", column.name),
                    [column.name.clone()],
                ));
            }

            table.insert_column(column);
        }

        if let Some(pk) = &model.primary_key {
            let columns = map_fields(model, &pk.fields);
            let name = pk
                .name
                .clone()
                .unwrap_or_else(|| schemir_sql::primary_key_name(table_name));
            table.insert_constraint(Constraint::primary_key(name, columns));
        }

        for unique in &model.unique_indexes {
            let columns = map_fields(model, &unique.fields);
            let name = unique
                .name
                .clone()
                .unwrap_or_else(|| schemir_sql::unique_key_name(table_name, &columns));
            table.insert_constraint(Constraint::unique(name, columns));
        }

        table
    }

    fn build_column(&self, field: &Field) -> Column {
        let mut ty = self.column_type(field);
        let mut default = None;

        match &field.default {
            Some(serde_json::Value::Object(call)) => {
                let name = call.get("name").and_then(|n| n.as_str()).unwrap_or_default();
                let args = call
                    .get("args")
                    .and_then(|a| a.as_array())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                match name {
                    "autoincrement" => ty = serial_type(&ty),
                    "now" => default = Some(DefaultValue::from("CURRENT_TIMESTAMP")),
                    "cuid" | "uuid" | "ulid" | "nanoid" => {
                        // generated by the client, nothing for the database to do
                        if field.native_type.is_none() {
                            ty = "text".to_string();
                        }
                    }
                    "dbgenerated" => {
                        default = args
                            .first()
                            .and_then(|a| a.as_str())
                            .map(DefaultValue::from);
                    }
                    other => default = render_function_default(other, args),
                }
            }
            Some(value) => default = primitive_default(value),
            None => {}
        }

        let mut column = Column::new(field.column_name(), ty);
        column.default = default;
        column.not_null = field.is_required;
        column.unique = field.is_unique || field.is_id;
        column.comment = field.documentation.clone();
        column
    }

    fn column_type(&self, field: &Field) -> String {
        let base = if let Some((name, args)) = &field.native_type {
            native_type(name, args)
        } else {
            match field.kind {
                FieldKind::Enum => self
                    .enum_names
                    .get(field.ty.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| field.ty.clone()),
                _ => scalar_type(&field.ty),
            }
        };
        if field.is_list {
            format!("{base}[]")
        } else {
            base
        }
    }

    fn build_indexes(&mut self) {
        let datamodel = self.datamodel;
        for index in &datamodel.indexes {
            let Some(model) = self.model(&index.model) else {
                self.errors.push(ProcessError::UnresolvedReference {
                    reference: index.model.clone(),
                    context: "index model".into(),
                });
                continue;
            };
            let table_name = model.table_name();
            let fields: Vec<String> = index.fields.iter().map(|f| f.name.clone()).collect();
            let columns = map_fields(model, &fields);

            let (name, unique) = match index.kind {
                IndexKind::Id => (schemir_sql::primary_key_name(table_name), true),
                IndexKind::Unique => (schemir_sql::unique_key_name(table_name, &columns), true),
                IndexKind::Normal => (schemir_sql::index_name(table_name, &columns), false),
                IndexKind::Fulltext => {
                    self.errors.push(ProcessError::unsupported(
                        "fulltext index",
                        format!("on model {}", model.name),
                    ));
                    continue;
                }
            };

            let mut ir = Index::new(index.db_name.clone().unwrap_or(name), columns);
            ir.unique = unique;
            ir.ty = index
                .algorithm
                .as_deref()
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();

            if let Some(table) = self.schema.get_table_mut(table_name) {
                table.insert_index(ir);
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 2: relations
    // ------------------------------------------------------------------

    fn build_relations(&mut self) {
        let mut seen_pairs: IndexSet<(String, String)> = IndexSet::new();

        let datamodel = self.datamodel;
        for model in &datamodel.models {
            for field in &model.fields {
                if field.kind != FieldKind::Object {
                    continue;
                }
                if !field.from_fields().is_empty() && !field.to_fields().is_empty() {
                    self.add_foreign_key(model, field);
                } else if field.is_list && field.from_fields().is_empty() {
                    self.add_many_to_many(model, field, &mut seen_pairs);
                }
            }
        }
    }

    fn add_foreign_key(&mut self, model: &Model, field: &Field) {
        let Some(target) = self.model(&field.ty) else {
            self.errors.push(ProcessError::UnresolvedReference {
                reference: field.ty.clone(),
                context: format!("relation field {}.{}", model.name, field.name),
            });
            return;
        };

        let columns = map_fields(model, field.from_fields());
        let target_columns = map_fields(target, field.to_fields());
        let name = field
            .relation_name
            .clone()
            .unwrap_or_else(|| schemir_sql::foreign_key_name(model.table_name(), &columns));

        // Prisma's own defaults when the schema doesn't say
        let required = field.from_fields().iter().all(|f| {
            model
                .fields
                .iter()
                .find(|mf| &mf.name == f)
                .is_some_and(|mf| mf.is_required)
        });
        let on_delete = field
            .relation_on_delete
            .as_deref()
            .and_then(ForeignKeyAction::parse)
            .unwrap_or(if required {
                ForeignKeyAction::Restrict
            } else {
                ForeignKeyAction::SetNull
            });
        let on_update = field
            .relation_on_update
            .as_deref()
            .and_then(ForeignKeyAction::parse)
            .unwrap_or(ForeignKeyAction::Cascade);

        let fk = ForeignKeyConstraint::new(name, columns, target.table_name(), target_columns)
            .on_update(on_update)
            .on_delete(on_delete);

        if let Some(table) = self.schema.get_table_mut(model.table_name()) {
            table.insert_constraint(fk.into());
        }
    }

    fn add_many_to_many(
        &mut self,
        model: &'a Model,
        field: &'a Field,
        seen_pairs: &mut IndexSet<(String, String)>,
    ) {
        let Some(other) = self.model(&field.ty) else {
            return;
        };
        let reverse = other.fields.iter().find(|f| {
            f.kind == FieldKind::Object
                && f.is_list
                && f.ty == model.name
                && f.from_fields().is_empty()
                && !(other.name == model.name && f.name == field.name)
                && (f.relation_name.is_none()
                    || field.relation_name.is_none()
                    || f.relation_name == field.relation_name)
        });
        if reverse.is_none() {
            return;
        }

        let (a, b) = if model.name <= other.name {
            (model, other)
        } else {
            (other, model)
        };
        if !seen_pairs.insert((a.name.clone(), b.name.clone())) {
            return;
        }

        let (Some(a_pk), Some(b_pk)) = (self.single_primary_key(a), self.single_primary_key(b))
        else {
            self.errors.push(ProcessError::unsupported(
                "many-to-many relation",
                format!(
                    "{} and {} need single-column primary keys",
                    a.name, b.name
                ),
            ));
            return;
        };

        let join_name = format!("_{}To{}", a.name, b.name);
        debug!(table = %join_name, "synthesizing many-to-many join table");

        let mut join = Table::new(&join_name)
            .with_column(Column::new("A", key_type(&a_pk.1)).not_null())
            .with_column(Column::new("B", key_type(&b_pk.1)).not_null())
            .with_index(Index::new(format!("{join_name}_AB_pkey"), ["A", "B"]).unique())
            .with_index(Index::new(format!("{join_name}_B_index"), ["B"]));

        for (column, target, target_column) in [("A", a, a_pk.0), ("B", b, b_pk.0)] {
            join.insert_constraint(
                ForeignKeyConstraint::new(
                    format!("{join_name}_{column}_fkey"),
                    [column],
                    target.table_name(),
                    [target_column],
                )
                .on_update(ForeignKeyAction::Cascade)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
            );
        }

        self.join_tables.push(join);
    }

    /// The (column name, column type) of a model's single-column primary key.
    fn single_primary_key(&self, model: &Model) -> Option<(String, String)> {
        let table = self.schema.get_table(model.table_name())?;
        let pk = table.primary_key()?;
        let [column] = pk.column_names.as_slice() else {
            return None;
        };
        let ty = table.columns.get(column)?.ty.clone();
        Some((column.clone(), ty))
    }
}

/// Map Prisma field names to their `@map`ped column names.
fn map_fields(model: &Model, fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|name| {
            model
                .fields
                .iter()
                .find(|f| &f.name == name)
                .map(|f| f.column_name().to_string())
                .unwrap_or_else(|| name.clone())
        })
        .collect()
}

fn scalar_type(ty: &str) -> String {
    match ty {
        "String" => "text",
        "Boolean" => "boolean",
        "Int" => "integer",
        "BigInt" => "bigint",
        "Float" => "double precision",
        "Decimal" => "decimal(65,30)",
        "DateTime" => "timestamp(3)",
        "Json" => "jsonb",
        "Bytes" => "bytea",
        other => return other.to_string(),
    }
    .to_string()
}

fn native_type(name: &str, args: &[String]) -> String {
    let base = match name {
        "VarChar" => "varchar".to_string(),
        "Char" => "char".to_string(),
        "DoublePrecision" => "double precision".to_string(),
        "JsonB" => "jsonb".to_string(),
        "ByteA" => "bytea".to_string(),
        "VarBit" => "varbit".to_string(),
        other => other.to_ascii_lowercase(),
    };
    if args.is_empty() {
        base
    } else {
        format!("{base}({})", args.join(","))
    }
}

/// `autoincrement()` turns the column into its serial counterpart.
fn serial_type(ty: &str) -> String {
    match ty {
        "smallint" | "int2" => "smallserial",
        "integer" | "int" | "int4" => "serial",
        "bigint" | "int8" => "bigserial",
        other => return other.to_string(),
    }
    .to_string()
}

/// Column type for a foreign key pointing at a column of type `ty`.
fn key_type(ty: &str) -> String {
    match ty {
        "smallserial" => "smallint",
        "serial" => "integer",
        "bigserial" => "bigint",
        other => return other.to_string(),
    }
    .to_string()
}

fn primitive_default(value: &serde_json::Value) -> Option<DefaultValue> {
    match value {
        serde_json::Value::String(s) => Some(DefaultValue::from(s.as_str())),
        serde_json::Value::Number(n) => Some(DefaultValue::Number(n.clone())),
        serde_json::Value::Bool(b) => Some(DefaultValue::Boolean(*b)),
        _ => None,
    }
}

/// `name(args)` when every argument is a primitive, otherwise nothing.
fn render_function_default(name: &str, args: &[serde_json::Value]) -> Option<DefaultValue> {
    let mut rendered = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            serde_json::Value::String(s) => rendered.push(schemir_sql::escape_string(s)),
            serde_json::Value::Number(n) => rendered.push(n.to_string()),
            serde_json::Value::Bool(b) => rendered.push(b.to_string()),
            _ => return None,
        }
    }
    Some(DefaultValue::String(format!("{name}({})", rendered.join(", "))))
}

#[cfg(test)]
mod tests;
