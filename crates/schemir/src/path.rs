//! Operation paths.
//!
//! A path points into the schema tree the way a JSON Pointer points into a
//! document:
//!
//! ```text
//! /tables/<table>[/<field>]
//! /tables/<table>/columns/<column>[/<field>]
//! /tables/<table>/indexes/<index>[/<field>]
//! /tables/<table>/constraints/<constraint>[/<field>]
//! /enums/<enum>[/<field>]
//! /enums/<enum>/values/<value>
//! ```
//!
//! Inside a segment `~` is written `~0` and `/` is written `~1`.

use std::fmt;
use std::str::FromStr;

use crate::PathError;

macro_rules! fields {
    ($(#[$meta:meta])* $name:ident for $entity:literal { $($variant:ident => $s:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            /// The segment as it appears in a path.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $s),*
                }
            }

            fn parse(path: &str, field: &str) -> Result<Self, PathError> {
                match field {
                    $($s => Ok($name::$variant),)*
                    _ => Err(PathError::UnknownField {
                        path: path.to_string(),
                        entity: $entity,
                        field: field.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

fields! {
    /// Scalar fields of a table.
    TableField for "table" {
        Name => "name",
        Comment => "comment",
    }
}

fields! {
    /// Scalar fields of a column.
    ColumnField for "column" {
        Name => "name",
        Type => "type",
        NotNull => "notNull",
        Default => "default",
        Check => "check",
        Comment => "comment",
        Unique => "unique",
    }
}

fields! {
    /// Fields of an index.
    IndexField for "index" {
        Name => "name",
        Unique => "unique",
        Type => "type",
        Columns => "columns",
    }
}

fields! {
    /// Fields of a constraint. Which ones apply depends on its kind.
    ConstraintField for "constraint" {
        Name => "name",
        Detail => "detail",
        DeleteConstraint => "deleteConstraint",
        UpdateConstraint => "updateConstraint",
        ColumnNames => "columnNames",
        TargetTableName => "targetTableName",
        TargetColumnNames => "targetColumnNames",
    }
}

fields! {
    /// Fields of an enum type.
    EnumField for "enum" {
        Name => "name",
        Comment => "comment",
        Values => "values",
    }
}

/// A parsed operation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaPath {
    Table {
        table: String,
    },
    TableField {
        table: String,
        field: TableField,
    },
    Column {
        table: String,
        column: String,
    },
    ColumnField {
        table: String,
        column: String,
        field: ColumnField,
    },
    Index {
        table: String,
        index: String,
    },
    IndexField {
        table: String,
        index: String,
        field: IndexField,
    },
    Constraint {
        table: String,
        constraint: String,
    },
    ConstraintField {
        table: String,
        constraint: String,
        field: ConstraintField,
    },
    Enum {
        name: String,
    },
    EnumField {
        name: String,
        field: EnumField,
    },
    EnumValue {
        name: String,
        value: String,
    },
}

impl SchemaPath {
    pub fn table(table: impl Into<String>) -> Self {
        SchemaPath::Table {
            table: table.into(),
        }
    }

    pub fn table_field(table: impl Into<String>, field: TableField) -> Self {
        SchemaPath::TableField {
            table: table.into(),
            field,
        }
    }

    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        SchemaPath::Column {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn column_field(
        table: impl Into<String>,
        column: impl Into<String>,
        field: ColumnField,
    ) -> Self {
        SchemaPath::ColumnField {
            table: table.into(),
            column: column.into(),
            field,
        }
    }

    pub fn index(table: impl Into<String>, index: impl Into<String>) -> Self {
        SchemaPath::Index {
            table: table.into(),
            index: index.into(),
        }
    }

    pub fn index_field(table: impl Into<String>, index: impl Into<String>, field: IndexField) -> Self {
        SchemaPath::IndexField {
            table: table.into(),
            index: index.into(),
            field,
        }
    }

    pub fn constraint(table: impl Into<String>, constraint: impl Into<String>) -> Self {
        SchemaPath::Constraint {
            table: table.into(),
            constraint: constraint.into(),
        }
    }

    pub fn constraint_field(
        table: impl Into<String>,
        constraint: impl Into<String>,
        field: ConstraintField,
    ) -> Self {
        SchemaPath::ConstraintField {
            table: table.into(),
            constraint: constraint.into(),
            field,
        }
    }

    pub fn enum_type(name: impl Into<String>) -> Self {
        SchemaPath::Enum { name: name.into() }
    }

    pub fn enum_field(name: impl Into<String>, field: EnumField) -> Self {
        SchemaPath::EnumField {
            name: name.into(),
            field,
        }
    }

    pub fn enum_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        SchemaPath::EnumValue {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The table this path lives under, if any.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            SchemaPath::Table { table }
            | SchemaPath::TableField { table, .. }
            | SchemaPath::Column { table, .. }
            | SchemaPath::ColumnField { table, .. }
            | SchemaPath::Index { table, .. }
            | SchemaPath::IndexField { table, .. }
            | SchemaPath::Constraint { table, .. }
            | SchemaPath::ConstraintField { table, .. } => Some(table),
            SchemaPath::Enum { .. } | SchemaPath::EnumField { .. } | SchemaPath::EnumValue { .. } => {
                None
            }
        }
    }

    /// Whether the path names a whole entity rather than one of its fields.
    pub fn is_entity(&self) -> bool {
        matches!(
            self,
            SchemaPath::Table { .. }
                | SchemaPath::Column { .. }
                | SchemaPath::Index { .. }
                | SchemaPath::Constraint { .. }
                | SchemaPath::Enum { .. }
                | SchemaPath::EnumValue { .. }
        )
    }
}

impl FromStr for SchemaPath {
    type Err = PathError;

    fn from_str(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let Some(rest) = path.strip_prefix('/') else {
            return Err(PathError::Relative(path.to_string()));
        };
        let segments: Vec<String> = rest.split('/').map(unescape).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment(path.to_string()));
        }
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        let parsed = match segments.as_slice() {
            ["tables" | "enums"]
            | ["tables", _, "columns" | "indexes" | "constraints"]
            | ["enums", _, "values"] => return Err(PathError::Incomplete(path.to_string())),

            ["tables", table] => SchemaPath::table(*table),
            ["tables", table, field] => SchemaPath::table_field(*table, TableField::parse(path, field)?),
            ["tables", table, "columns", column] => SchemaPath::column(*table, *column),
            ["tables", table, "columns", column, field] => {
                SchemaPath::column_field(*table, *column, ColumnField::parse(path, field)?)
            }
            ["tables", table, "indexes", index] => SchemaPath::index(*table, *index),
            ["tables", table, "indexes", index, field] => {
                SchemaPath::index_field(*table, *index, IndexField::parse(path, field)?)
            }
            ["tables", table, "constraints", constraint] => SchemaPath::constraint(*table, *constraint),
            ["tables", table, "constraints", constraint, field] => SchemaPath::constraint_field(
                *table,
                *constraint,
                ConstraintField::parse(path, field)?,
            ),

            ["enums", name] => SchemaPath::enum_type(*name),
            ["enums", name, "values", value] => SchemaPath::enum_value(*name, *value),
            ["enums", name, field] => SchemaPath::enum_field(*name, EnumField::parse(path, field)?),

            ["tables" | "enums", ..] => return Err(PathError::TrailingSegments(path.to_string())),
            [segment, ..] => {
                return Err(PathError::UnknownCollection {
                    path: path.to_string(),
                    segment: segment.to_string(),
                });
            }
            [] => return Err(PathError::Empty),
        };
        Ok(parsed)
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaPath::Table { table } => write!(f, "/tables/{}", Segment(table)),
            SchemaPath::TableField { table, field } => {
                write!(f, "/tables/{}/{field}", Segment(table))
            }
            SchemaPath::Column { table, column } => {
                write!(f, "/tables/{}/columns/{}", Segment(table), Segment(column))
            }
            SchemaPath::ColumnField {
                table,
                column,
                field,
            } => write!(
                f,
                "/tables/{}/columns/{}/{field}",
                Segment(table),
                Segment(column)
            ),
            SchemaPath::Index { table, index } => {
                write!(f, "/tables/{}/indexes/{}", Segment(table), Segment(index))
            }
            SchemaPath::IndexField {
                table,
                index,
                field,
            } => write!(
                f,
                "/tables/{}/indexes/{}/{field}",
                Segment(table),
                Segment(index)
            ),
            SchemaPath::Constraint { table, constraint } => write!(
                f,
                "/tables/{}/constraints/{}",
                Segment(table),
                Segment(constraint)
            ),
            SchemaPath::ConstraintField {
                table,
                constraint,
                field,
            } => write!(
                f,
                "/tables/{}/constraints/{}/{field}",
                Segment(table),
                Segment(constraint)
            ),
            SchemaPath::Enum { name } => write!(f, "/enums/{}", Segment(name)),
            SchemaPath::EnumField { name, field } => write!(f, "/enums/{}/{field}", Segment(name)),
            SchemaPath::EnumValue { name, value } => {
                write!(f, "/enums/{}/values/{}", Segment(name), Segment(value))
            }
        }
    }
}

/// Writes a path segment with `~` and `/` escaped.
struct Segment<'a>(&'a str);

impl fmt::Display for Segment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '~' => f.write_str("~0")?,
                '/' => f.write_str("~1")?,
                c => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(path: &str) -> Result<SchemaPath, PathError> {
        path.parse()
    }

    #[test]
    fn test_parse_entities() {
        assert_eq!(parse("/tables/users").unwrap(), SchemaPath::table("users"));
        assert_eq!(
            parse("/tables/users/columns/email").unwrap(),
            SchemaPath::column("users", "email")
        );
        assert_eq!(
            parse("/tables/users/indexes/users_email_idx").unwrap(),
            SchemaPath::index("users", "users_email_idx")
        );
        assert_eq!(
            parse("/tables/users/constraints/users_pkey").unwrap(),
            SchemaPath::constraint("users", "users_pkey")
        );
        assert_eq!(parse("/enums/role").unwrap(), SchemaPath::enum_type("role"));
        assert_eq!(
            parse("/enums/role/values/admin").unwrap(),
            SchemaPath::enum_value("role", "admin")
        );
    }

    #[test]
    fn test_parse_fields() {
        assert_eq!(
            parse("/tables/users/comment").unwrap(),
            SchemaPath::table_field("users", TableField::Comment)
        );
        assert_eq!(
            parse("/tables/users/columns/email/notNull").unwrap(),
            SchemaPath::column_field("users", "email", ColumnField::NotNull)
        );
        assert_eq!(
            parse("/tables/posts/constraints/posts_user_fk/deleteConstraint").unwrap(),
            SchemaPath::constraint_field("posts", "posts_user_fk", ConstraintField::DeleteConstraint)
        );
        assert_eq!(
            parse("/enums/role/name").unwrap(),
            SchemaPath::enum_field("role", EnumField::Name)
        );
    }

    #[test]
    fn test_escaped_segments() {
        let path = parse("/tables/a~1b/columns/x~0y").unwrap();
        assert_eq!(path, SchemaPath::column("a/b", "x~y"));
        assert_eq!(path.to_string(), "/tables/a~1b/columns/x~0y");
        assert_eq!(parse("/tables/a~01").unwrap(), SchemaPath::table("a~1"));
    }

    #[test]
    fn test_malformed_paths() {
        assert_eq!(parse(""), Err(PathError::Empty));
        assert!(matches!(parse("tables/users"), Err(PathError::Relative(_))));
        assert!(matches!(parse("/"), Err(PathError::EmptySegment(_))));
        assert!(matches!(parse("/tables//columns"), Err(PathError::EmptySegment(_))));
        assert!(matches!(parse("/tables"), Err(PathError::Incomplete(_))));
        assert!(matches!(parse("/tables/users/columns"), Err(PathError::Incomplete(_))));
        assert!(matches!(
            parse("/views/v"),
            Err(PathError::UnknownCollection { segment, .. }) if segment == "views"
        ));
        assert!(matches!(
            parse("/tables/users/columns/email/nullable"),
            Err(PathError::UnknownField { entity: "column", field, .. }) if field == "nullable"
        ));
        assert!(matches!(
            parse("/tables/users/owner"),
            Err(PathError::UnknownField { entity: "table", .. })
        ));
        assert!(matches!(
            parse("/tables/users/columns/email/type/extra"),
            Err(PathError::TrailingSegments(_))
        ));
    }

    #[test]
    fn test_table_name() {
        assert_eq!(SchemaPath::column("users", "id").table_name(), Some("users"));
        assert_eq!(SchemaPath::enum_type("role").table_name(), None);
        assert!(SchemaPath::column("users", "id").is_entity());
        assert!(!SchemaPath::column_field("users", "id", ColumnField::Type).is_entity());
    }

    fn any_path() -> impl Strategy<Value = SchemaPath> {
        let name = "[a-z~/_]{1,8}";
        prop_oneof![
            name.prop_map(SchemaPath::table),
            (name, name).prop_map(|(t, c)| SchemaPath::column(t, c)),
            (name, name, prop::sample::select(ColumnField::ALL))
                .prop_map(|(t, c, f)| SchemaPath::column_field(t, c, f)),
            (name, name, prop::sample::select(ConstraintField::ALL))
                .prop_map(|(t, c, f)| SchemaPath::constraint_field(t, c, f)),
            (name, name, prop::sample::select(IndexField::ALL))
                .prop_map(|(t, i, f)| SchemaPath::index_field(t, i, f)),
            (name, name).prop_map(|(e, v)| SchemaPath::enum_value(e, v)),
        ]
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(path in any_path()) {
            prop_assert_eq!(path.to_string().parse::<SchemaPath>(), Ok(path));
        }
    }
}
