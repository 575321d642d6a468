//! The same two-table schema, `posts.user_id -> users.id`, written in every
//! supported dialect.

use proptest::prelude::*;
use schemir_parse::{Format, ParseOptions, ProcessError, parse, parse_with};
use schemir_schema::{Cardinality, Constraint};

const PRISMA: &str = r#"{
  "models": [
    {
      "name": "Post",
      "dbName": "posts",
      "fields": [
        { "name": "id", "kind": "scalar", "type": "Int", "isId": true, "isRequired": true,
          "default": { "name": "autoincrement", "args": [] } },
        { "name": "user_id", "kind": "scalar", "type": "Int", "isRequired": true },
        { "name": "author", "kind": "object", "type": "User", "isRequired": true,
          "relationName": "PostToUser", "relationFromFields": ["user_id"], "relationToFields": ["id"] }
      ]
    },
    {
      "name": "User",
      "dbName": "users",
      "fields": [
        { "name": "id", "kind": "scalar", "type": "Int", "isId": true, "isRequired": true,
          "default": { "name": "autoincrement", "args": [] } },
        { "name": "posts", "kind": "object", "type": "Post", "isList": true,
          "relationName": "PostToUser", "relationFromFields": [], "relationToFields": [] }
      ]
    }
  ]
}"#;

const DRIZZLE: &str = r#"
export const posts = pgTable("posts", {
  id: serial("id").primaryKey(),
  userId: integer("user_id").notNull().references(() => users.id),
});

export const users = pgTable("users", { id: serial("id").primaryKey() });
"#;

const SCHEMARB: &str = r#"
ActiveRecord::Schema[7.1].define(version: 2024_03_01_120000) do
  create_table "users", force: :cascade do |t|
  end

  create_table "posts", force: :cascade do |t|
    t.bigint "user_id", null: false
  end

  add_foreign_key "posts", "users"
end
"#;

const POSTGRES: &str = r#"
CREATE TABLE users (id bigint PRIMARY KEY);
CREATE TABLE posts (
    id bigint PRIMARY KEY,
    user_id bigint NOT NULL REFERENCES users (id)
);
"#;

const TBLS: &str = r#"{
  "name": "app",
  "tables": [
    {
      "name": "users",
      "type": "BASE TABLE",
      "columns": [ { "name": "id", "type": "bigint", "nullable": false } ],
      "constraints": [
        { "name": "users_pkey", "type": "PRIMARY KEY", "def": "PRIMARY KEY (id)", "table": "users", "columns": ["id"] }
      ]
    },
    {
      "name": "posts",
      "type": "BASE TABLE",
      "columns": [
        { "name": "id", "type": "bigint", "nullable": false },
        { "name": "user_id", "type": "bigint", "nullable": false }
      ],
      "constraints": [
        {
          "name": "posts_user_id_fkey",
          "type": "FOREIGN KEY",
          "def": "FOREIGN KEY (user_id) REFERENCES users(id)",
          "table": "posts",
          "referenced_table": "users",
          "columns": ["user_id"],
          "referenced_columns": ["id"]
        }
      ]
    }
  ]
}"#;

fn fixtures() -> [(Format, &'static str); 5] {
    [
        (Format::Prisma, PRISMA),
        (Format::Drizzle, DRIZZLE),
        (Format::SchemaRb, SCHEMARB),
        (Format::Postgres, POSTGRES),
        (Format::Tbls, TBLS),
    ]
}

#[test]
fn test_every_format_yields_the_same_shape() {
    for (format, source) in fixtures() {
        let out = parse(format, source).unwrap();
        assert!(out.errors.is_empty(), "{format}: {:?}", out.errors);

        let mut tables: Vec<&str> = out.schema.tables.keys().map(String::as_str).collect();
        tables.sort();
        assert_eq!(tables, ["posts", "users"], "{format}");

        let posts = &out.schema.tables["posts"];
        assert!(posts.columns["user_id"].not_null, "{format}");
        let fks: Vec<_> = posts
            .constraints
            .values()
            .filter_map(|c| match c {
                Constraint::ForeignKey(fk) => Some(fk),
                _ => None,
            })
            .collect();
        assert_eq!(fks.len(), 1, "{format}");
        assert_eq!(fks[0].column_names, ["user_id"], "{format}");
        assert_eq!(fks[0].target_table_name, "users", "{format}");
        assert_eq!(fks[0].target_column_names, ["id"], "{format}");

        assert_eq!(out.schema.relationships.len(), 1, "{format}");
        let rel = out.schema.relationships.values().next().unwrap();
        assert_eq!(rel.primary_table_name, "users", "{format}");
        assert_eq!(rel.foreign_table_name, "posts", "{format}");
        assert_eq!(rel.foreign_column_name, "user_id", "{format}");
        assert_eq!(rel.cardinality, Cardinality::OneToMany, "{format}");

        assert!(out.schema.tables["users"].primary_key().is_some(), "{format}");
    }
}

#[test]
fn test_parsing_is_idempotent_in_every_format() {
    for (format, source) in fixtures() {
        let first = parse(format, source).unwrap();
        let second = parse(format, source).unwrap();
        assert_eq!(first, second, "{format}");
    }
}

#[test]
fn test_relationships_can_be_left_underived() {
    let options = ParseOptions {
        derive_relationships: false,
        ..ParseOptions::default()
    };
    for (format, source) in fixtures() {
        let out = parse_with(format, source, &options).unwrap();
        assert!(out.schema.relationships.is_empty(), "{format}");
        assert_eq!(out.schema.tables.len(), 2, "{format}");
    }
}

#[test]
fn test_options_from_host_config() {
    let options = ParseOptions::from_json(r#"{ "derive_relationships": false }"#).unwrap();
    assert!(!options.derive_relationships);
    assert_eq!(options.max_nesting_depth, ParseOptions::default().max_nesting_depth);

    let format: Format = serde_json::from_str(r#""schemarb""#).unwrap();
    assert_eq!(format, Format::SchemaRb);
}

#[test]
fn test_later_definitions_win_in_every_text_format() {
    let cases = [
        (
            Format::Postgres,
            "CREATE TABLE t (a int);\nCREATE TABLE t (b int);",
        ),
        (
            Format::SchemaRb,
            "create_table \"t\", id: false do |x|\n  x.integer \"a\"\nend\ncreate_table \"t\", id: false do |x|\n  x.integer \"b\"\nend\n",
        ),
        (
            Format::Tbls,
            r#"{ "tables": [
                { "name": "t", "columns": [ { "name": "a", "type": "int" } ] },
                { "name": "t", "columns": [ { "name": "b", "type": "int" } ] }
            ] }"#,
        ),
    ];
    for (format, source) in cases {
        let out = parse(format, source).unwrap();
        let t = out.schema.get_table("t").unwrap();
        assert_eq!(t.columns.keys().collect::<Vec<_>>(), ["b"], "{format}");
    }
}

proptest! {
    #[test]
    fn nesting_limit_skips_only_the_deep_statement(limit in 1usize..8, depth in 0usize..12) {
        let options = ParseOptions {
            max_nesting_depth: limit,
            ..ParseOptions::default()
        };
        let source = format!(
            "CREATE TABLE t (a int CHECK ({}a > 0{}));\nCREATE TABLE u (b int);",
            "(".repeat(depth),
            ")".repeat(depth),
        );
        let out = parse_with(Format::Postgres, &source, &options).unwrap();

        prop_assert!(out.schema.tables.contains_key("u"));
        if depth < limit {
            prop_assert!(out.errors.is_empty(), "{:?}", out.errors);
            prop_assert!(out.schema.tables.contains_key("t"));
        } else {
            prop_assert!(!out.schema.tables.contains_key("t"));
            prop_assert!(
                matches!(&out.errors[..], [ProcessError::NestingTooDeep { limit: l, .. }] if *l == limit),
                "{:?}",
                out.errors
            );
        }
    }
}
