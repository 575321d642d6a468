use super::*;
use schemir_schema::{Cardinality, DefaultValue, ForeignKeyAction};

fn parse_ok(source: &str) -> ParseOutput {
    let out = PostgresParser.parse(source).unwrap();
    assert!(out.errors.is_empty(), "unexpected warnings: {:?}", out.errors);
    out
}

#[test]
fn test_create_table_with_inline_constraints() {
    let out = parse_ok(
        r#"
        CREATE TABLE public.users (
            id bigserial PRIMARY KEY,
            email varchar(255) NOT NULL UNIQUE,
            "displayName" TEXT,
            age integer CHECK (age >= 0),
            created_at timestamp with time zone NOT NULL DEFAULT now()
        );
        "#,
    );
    let users = out.schema.get_table("users").unwrap();
    assert_eq!(
        users.columns.keys().collect::<Vec<_>>(),
        ["id", "email", "displayName", "age", "created_at"]
    );

    assert_eq!(users.columns["id"].ty, "bigserial");
    assert_eq!(users.columns["email"].ty, "varchar(255)");
    assert!(users.columns["email"].not_null);
    assert!(users.columns["email"].unique);
    assert_eq!(users.columns["displayName"].ty, "text");
    assert_eq!(users.columns["age"].check.as_deref(), Some("age >= 0"));
    assert_eq!(users.columns["created_at"].ty, "timestamp with time zone");
    // expression defaults are not kept
    assert_eq!(users.columns["created_at"].default, None);

    assert!(matches!(
        &users.constraints["users_pkey"],
        Constraint::PrimaryKey(k) if k.column_names == ["id"]
    ));
    assert!(matches!(
        &users.constraints["users_email_key"],
        Constraint::Unique(k) if k.column_names == ["email"]
    ));
}

#[test]
fn test_literal_defaults() {
    let out = parse_ok(
        r#"
        CREATE TABLE t (
            a text DEFAULT 'it''s',
            b varchar DEFAULT 'x'::character varying,
            c integer DEFAULT -5,
            d numeric DEFAULT 1.25,
            e boolean DEFAULT TRUE NOT NULL,
            f text DEFAULT NULL,
            g integer DEFAULT (1 + 2)
        );
        "#,
    );
    let columns = &out.schema.get_table("t").unwrap().columns;
    assert_eq!(columns["a"].default, Some(DefaultValue::from("it's")));
    assert_eq!(columns["b"].default, Some(DefaultValue::from("x")));
    assert_eq!(columns["c"].default, Some(DefaultValue::from(-5)));
    assert_eq!(columns["d"].default, DefaultValue::parse_number("1.25"));
    assert_eq!(columns["e"].default, Some(DefaultValue::from(true)));
    assert!(columns["e"].not_null);
    assert_eq!(columns["f"].default, None);
    assert_eq!(columns["g"].default, None);
}

#[test]
fn test_table_constraints() {
    let out = parse_ok(
        r#"
        CREATE TABLE users (id bigint PRIMARY KEY);
        CREATE TABLE posts (
            id bigint,
            author_id bigint NOT NULL REFERENCES users ON DELETE CASCADE,
            editor_id bigint,
            slug text,
            score int,
            CONSTRAINT posts_pk PRIMARY KEY (id),
            UNIQUE (author_id, slug),
            FOREIGN KEY (editor_id) REFERENCES users (id) ON UPDATE SET NULL ON DELETE SET DEFAULT DEFERRABLE,
            CHECK (score > 0 AND (score < 100)),
            CONSTRAINT named_check CHECK (slug <> '')
        );
        "#,
    );
    let posts = out.schema.get_table("posts").unwrap();

    assert!(matches!(&posts.constraints["posts_pk"], Constraint::PrimaryKey(_)));
    assert!(matches!(
        &posts.constraints["posts_author_id_slug_key"],
        Constraint::Unique(k) if k.column_names == ["author_id", "slug"]
    ));
    // composite keys don't mark columns unique
    assert!(!posts.columns["slug"].unique);

    let Constraint::ForeignKey(author) = &posts.constraints["posts_author_id_fkey"] else {
        panic!("expected a foreign key");
    };
    assert_eq!(author.target_table_name, "users");
    assert_eq!(author.target_column_names, ["id"]);
    assert_eq!(author.delete_constraint, ForeignKeyAction::Cascade);
    assert_eq!(author.update_constraint, ForeignKeyAction::NoAction);

    let Constraint::ForeignKey(editor) = &posts.constraints["posts_editor_id_fkey"] else {
        panic!("expected a foreign key");
    };
    assert_eq!(editor.update_constraint, ForeignKeyAction::SetNull);
    assert_eq!(editor.delete_constraint, ForeignKeyAction::SetDefault);

    assert!(matches!(
        &posts.constraints["posts_score_check"],
        Constraint::Check(c) if c.detail == "score > 0 AND (score < 100)"
    ));
    assert!(matches!(
        &posts.constraints["named_check"],
        Constraint::Check(c) if c.detail == "slug <> ''"
    ));

    assert_eq!(out.schema.relationships.len(), 2);
    assert_eq!(
        out.schema.relationships["posts_author_id_fkey"].cardinality,
        Cardinality::OneToMany
    );
}

#[test]
fn test_index_before_table() {
    let out = parse_ok(
        r#"
        CREATE UNIQUE INDEX users_email_idx ON users USING BTREE (lower(email), "Tenant" DESC);
        CREATE INDEX ON users (name);
        CREATE TABLE users (email text, "Tenant" int, name text);
        "#,
    );
    let users = out.schema.get_table("users").unwrap();
    assert_eq!(users.columns.len(), 3);

    let index = &users.indexes["users_email_idx"];
    assert!(index.unique);
    assert_eq!(index.ty, "btree");
    assert_eq!(index.columns, ["lower(email)", "Tenant"]);

    let unnamed = &users.indexes["users_name_idx"];
    assert!(!unnamed.unique);
    assert_eq!(unnamed.ty, "");
}

#[test]
fn test_alter_table_against_known_schema() {
    let first = parse_ok("CREATE TABLE users (id bigint, email text); CREATE TABLE posts (id bigint, user_id bigint);");

    let second = parse_with_known(
        r#"
        ALTER TABLE ONLY public.users ADD CONSTRAINT users_pkey PRIMARY KEY (id);
        ALTER TABLE posts ADD CONSTRAINT posts_user_fk FOREIGN KEY (user_id) REFERENCES users (id);
        "#,
        &first.schema,
        &ParseOptions::default(),
    )
    .unwrap();
    assert!(second.errors.is_empty());

    let users = second.schema.get_table("users").unwrap();
    assert!(users.constraints.contains_key("users_pkey"));
    assert!(users.columns["id"].unique);
    assert!(second.schema.get_table("posts").unwrap().constraints.contains_key("posts_user_fk"));
}

#[test]
fn test_alter_unknown_table_warns() {
    let out = PostgresParser
        .parse("ALTER TABLE ghosts ADD CONSTRAINT g_pkey PRIMARY KEY (id);")
        .unwrap();
    assert!(out.schema.tables.is_empty());
    assert!(matches!(
        &out.errors[..],
        [ProcessError::UnknownTable { table, .. }] if table == "ghosts"
    ));
}

#[test]
fn test_comments() {
    let out = parse_ok(
        r#"
        CREATE TABLE users (id bigint);
        COMMENT ON TABLE users IS 'People';
        COMMENT ON COLUMN public.users.id IS 'Surrogate key';
        CREATE TYPE mood AS ENUM ('sad', 'ok');
        COMMENT ON TYPE mood IS 'feelings';
        COMMENT ON TABLE users IS NULL;
        "#,
    );
    let users = out.schema.get_table("users").unwrap();
    assert_eq!(users.comment, None);
    assert_eq!(users.columns["id"].comment.as_deref(), Some("Surrogate key"));
    assert_eq!(out.schema.enums["mood"].comment.as_deref(), Some("feelings"));
}

#[test]
fn test_enum_statements() {
    let out = parse_ok(
        r#"
        CREATE TYPE status AS ENUM ('draft', 'published');
        ALTER TYPE status ADD VALUE 'archived';
        ALTER TYPE status ADD VALUE IF NOT EXISTS 'review' BEFORE 'published';
        ALTER TYPE status RENAME VALUE 'draft' TO 'new';
        CREATE TABLE posts (state status);
        ALTER TYPE status RENAME TO post_status;
        CREATE TYPE gone AS ENUM ();
        DROP TYPE gone;
        CREATE TYPE point3 AS (x int, y int, z int);
        "#,
    );
    let e = &out.schema.enums["post_status"];
    assert_eq!(e.values, ["new", "review", "published", "archived"]);
    assert!(!out.schema.enums.contains_key("gone"));
    assert_eq!(out.schema.get_table("posts").unwrap().columns["state"].ty, "post_status");
}

#[test]
fn test_deparser_statement_forms() {
    let out = parse_ok(
        r#"
        CREATE TABLE "users" (
          "id" bigint NOT NULL,
          "email" text,
          "age" integer CONSTRAINT "CHECK_age" CHECK (age > 0)
        );
        ALTER TABLE "users" ADD CONSTRAINT "users_pkey" PRIMARY KEY ("id");
        CREATE INDEX "users_email_idx" ON "users" ("email");
        ALTER TABLE "users" RENAME COLUMN "email" TO "mail";
        ALTER TABLE "users" ALTER COLUMN "mail" TYPE varchar(320);
        ALTER TABLE "users" ALTER COLUMN "mail" SET NOT NULL;
        ALTER TABLE "users" ALTER COLUMN "mail" SET DEFAULT 'nobody';
        ALTER TABLE "users" ADD COLUMN "nick" text DEFAULT 'x';
        ALTER TABLE "users" ALTER COLUMN "nick" DROP DEFAULT;
        ALTER TABLE "users" DROP COLUMN "age";
        ALTER INDEX "users_email_idx" RENAME TO "users_mail_idx";
        ALTER TABLE "users" RENAME CONSTRAINT "users_pkey" TO "users_pk";
        ALTER TABLE "users" RENAME TO "accounts";
        "#,
    );
    assert!(out.schema.get_table("users").is_none());
    let accounts = out.schema.get_table("accounts").unwrap();
    assert_eq!(accounts.name, "accounts");
    assert_eq!(accounts.columns.keys().collect::<Vec<_>>(), ["id", "mail", "nick"]);

    let mail = &accounts.columns["mail"];
    assert_eq!(mail.ty, "varchar(320)");
    assert!(mail.not_null);
    assert_eq!(mail.default, Some(DefaultValue::from("nobody")));
    assert_eq!(accounts.columns["nick"].default, None);

    assert_eq!(accounts.indexes["users_mail_idx"].columns, ["mail"]);
    assert!(matches!(
        &accounts.constraints["users_pk"],
        Constraint::PrimaryKey(k) if k.name == "users_pk"
    ));

    let dropped = parse_with_known(
        r#"
        ALTER TABLE "accounts" DROP CONSTRAINT "users_pk";
        DROP INDEX "users_mail_idx";
        DROP TABLE "accounts";
        "#,
        &out.schema,
        &ParseOptions::default(),
    )
    .unwrap();
    assert!(dropped.errors.is_empty());
    assert!(dropped.schema.tables.is_empty());
}

#[test]
fn test_rename_table_updates_references() {
    let out = parse_ok(
        r#"
        CREATE TABLE users (id bigint PRIMARY KEY);
        CREATE TABLE posts (user_id bigint REFERENCES users (id));
        ALTER TABLE users RENAME TO people;
        ALTER TABLE people RENAME id TO person_id;
        "#,
    );
    let Constraint::ForeignKey(fk) = &out.schema.get_table("posts").unwrap().constraints["posts_user_id_fkey"]
    else {
        panic!("expected a foreign key");
    };
    assert_eq!(fk.target_table_name, "people");
    assert_eq!(fk.target_column_names, ["person_id"]);
}

#[test]
fn test_unsupported_statements_are_skipped() {
    let out = parse_ok(
        r#"
        SET statement_timeout = 0;
        CREATE EXTENSION IF NOT EXISTS "uuid-ossp";
        CREATE FUNCTION f() RETURNS trigger AS $$ BEGIN RETURN NEW; END; $$ LANGUAGE plpgsql;
        GRANT ALL ON TABLE users TO admin;
        CREATE TABLE users (id uuid DEFAULT uuid_generate_v4());
        ALTER TABLE users OWNER TO admin;
        CREATE TABLE copy AS SELECT * FROM users;
        "#,
    );
    assert_eq!(out.schema.tables.len(), 1);
    assert!(out.schema.get_table("users").is_some());
}

#[test]
fn test_bad_statement_does_not_abort_parse() {
    let out = PostgresParser
        .parse(
            r#"
            CREATE TABLE a (id int);
            CREATE TABLE b (id int REFERENCES);
            CREATE TABLE c (id int);
            "#,
        )
        .unwrap();
    assert!(out.schema.get_table("a").is_some());
    assert!(out.schema.get_table("b").is_none());
    assert!(out.schema.get_table("c").is_some());
    assert!(matches!(
        &out.errors[..],
        [ProcessError::UnexpectedToken { position, .. }] if position.line == 3
    ));
}

#[test]
fn test_unterminated_string_is_hard_error() {
    let err = PostgresParser.parse("CREATE TABLE a (b text DEFAULT 'oops);").unwrap_err();
    assert!(matches!(err, ParseError::Lex { dialect: "postgres", .. }));
}

#[test]
fn test_duplicate_names_last_write_wins() {
    let out = parse_ok(
        r#"
        CREATE TABLE t (a int);
        CREATE TABLE t (b int);
        ALTER TABLE t ADD CONSTRAINT k UNIQUE (b);
        ALTER TABLE t ADD CONSTRAINT k CHECK (b > 1);
        "#,
    );
    let t = out.schema.get_table("t").unwrap();
    assert_eq!(t.columns.keys().collect::<Vec<_>>(), ["b"]);
    assert!(matches!(&t.constraints["k"], Constraint::Check(_)));
}

#[test]
fn test_nesting_limit() {
    let options = ParseOptions {
        max_nesting_depth: 3,
        ..ParseOptions::default()
    };
    let out = PostgresParser
        .parse_with(
            "CREATE TABLE t (a int CHECK ((((a > 0))))); CREATE TABLE u (a int);",
            &options,
        )
        .unwrap();
    assert!(out.schema.get_table("t").is_none());
    assert!(out.schema.get_table("u").is_some());
    assert!(matches!(
        &out.errors[..],
        [ProcessError::NestingTooDeep { limit: 3, .. }]
    ));
}

#[test]
fn test_parse_is_idempotent() {
    let source = r#"
        CREATE TABLE users (id bigint PRIMARY KEY, email text UNIQUE);
        CREATE TABLE posts (id bigint PRIMARY KEY, user_id bigint REFERENCES users);
        CREATE INDEX posts_user_idx ON posts (user_id);
    "#;
    assert_eq!(parse_ok(source), parse_ok(source));
}
