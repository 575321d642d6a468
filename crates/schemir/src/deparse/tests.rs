use super::*;
use crate::schema::{ForeignKeyAction, ForeignKeyConstraint};
use crate::{PathError, ValueError};
use serde_json::json;

fn posts() -> Table {
    Table::new("posts")
        .with_comment("Blog posts")
        .with_column(Column::new("id", "bigint").not_null())
        .with_column(
            Column::new("title", "varchar(255)")
                .not_null()
                .default_value("untitled")
                .comment("Headline"),
        )
        .with_column(Column::new("published_at", "timestamp").default_value("now()"))
        .with_column(
            Column::new("score", "integer")
                .default_value(0i64)
                .check("score >= 0"),
        )
        .with_column(Column::new("user_id", "bigint"))
        .with_constraint(Constraint::primary_key("posts_pkey", ["id"]))
        .with_constraint(Constraint::from(
            ForeignKeyConstraint::new("posts_user_id_fkey", ["user_id"], "users", ["id"])
                .on_delete(ForeignKeyAction::Cascade),
        ))
        .with_index(Index::new("posts_title_idx", ["title"]).using("btree"))
}

fn ddl(ops: &[Operation]) -> String {
    let out = deparse(ops);
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    out.ddl
}

#[test]
fn test_add_table() {
    insta::assert_snapshot!(ddl(&[Operation::add_table(&posts())]), @r#"
CREATE TABLE "posts" (
  "id" bigint NOT NULL,
  "title" varchar(255) NOT NULL DEFAULT 'untitled',
  "published_at" timestamp DEFAULT now(),
  "score" integer DEFAULT 0 CONSTRAINT "CHECK_score" CHECK (score >= 0),
  "user_id" bigint
);

COMMENT ON TABLE "posts" IS 'Blog posts';
COMMENT ON COLUMN "posts"."title" IS 'Headline';

ALTER TABLE "posts" ADD CONSTRAINT "posts_pkey" PRIMARY KEY ("id");

ALTER TABLE "posts" ADD CONSTRAINT "posts_user_id_fkey" FOREIGN KEY ("user_id") REFERENCES "users" ("id") ON UPDATE NO ACTION ON DELETE CASCADE;

CREATE INDEX "posts_title_idx" ON "posts" USING btree ("title");
"#);
}

#[test]
fn test_table_operations() {
    let ops = [
        Operation::remove_table("legacy"),
        Operation::rename_table("user", "users"),
        Operation::replace_table_comment("users", Some("People who can log in")),
        Operation::replace_table_comment("users", None),
    ];
    insta::assert_snapshot!(ddl(&ops), @r#"
DROP TABLE "legacy";

ALTER TABLE "user" RENAME TO "users";

COMMENT ON TABLE "users" IS 'People who can log in';

COMMENT ON TABLE "users" IS NULL;
"#);
}

#[test]
fn test_column_operations() {
    let ops = [
        Operation::add_column(
            "users",
            &Column::new("email", "text")
                .not_null()
                .default_value("it's")
                .comment("Login"),
        ),
        Operation::remove_column("users", "legacy"),
        Operation::rename_column("users", "mail", "email"),
        Operation::replace_column("users", "email", ColumnField::Type, json!("varchar(320)")),
        Operation::replace_column("users", "email", ColumnField::NotNull, json!(false)),
        Operation::replace_column("users", "active", ColumnField::Default, json!(true)),
        Operation::replace_column("users", "active", ColumnField::Default, json!(null)),
        Operation::replace_column("users", "created_at", ColumnField::Default, json!("CURRENT_TIMESTAMP")),
        Operation::replace_column("users", "ratio", ColumnField::Default, json!(0.5)),
        Operation::replace_column("users", "email", ColumnField::Comment, json!(null)),
    ];
    insta::assert_snapshot!(ddl(&ops), @r#"
ALTER TABLE "users" ADD COLUMN "email" text NOT NULL DEFAULT 'it''s';

COMMENT ON COLUMN "users"."email" IS 'Login';

ALTER TABLE "users" DROP COLUMN "legacy";

ALTER TABLE "users" RENAME COLUMN "mail" TO "email";

ALTER TABLE "users" ALTER COLUMN "email" TYPE varchar(320);

ALTER TABLE "users" ALTER COLUMN "email" DROP NOT NULL;

ALTER TABLE "users" ALTER COLUMN "active" SET DEFAULT TRUE;

ALTER TABLE "users" ALTER COLUMN "active" DROP DEFAULT;

ALTER TABLE "users" ALTER COLUMN "created_at" SET DEFAULT CURRENT_TIMESTAMP;

ALTER TABLE "users" ALTER COLUMN "ratio" SET DEFAULT 0.5;

COMMENT ON COLUMN "users"."email" IS NULL;
"#);
}

#[test]
fn test_column_check() {
    let set = Operation::replace_column("users", "age", ColumnField::Check, json!("age >= 0"));
    insta::assert_snapshot!(ddl(&[set]), @r#"
ALTER TABLE "users" DROP CONSTRAINT IF EXISTS "CHECK_age";

ALTER TABLE "users" ADD CONSTRAINT "CHECK_age" CHECK (age >= 0);
"#);

    for cleared in [json!(null), json!(""), json!("  ")] {
        let op = Operation::replace_column("users", "age", ColumnField::Check, cleared);
        assert_eq!(
            ddl(&[op]),
            r#"ALTER TABLE "users" DROP CONSTRAINT IF EXISTS "CHECK_age";"#
        );
    }
}

#[test]
fn test_column_unique_flag_has_no_ddl() {
    let op = Operation::replace_column("users", "email", ColumnField::Unique, json!(true));
    assert_eq!(deparse(&op), DeparseOutput::default());
}

#[test]
fn test_index_and_constraint_operations() {
    let ops = [
        Operation::add_index(
            "users",
            &Index::new("users_lower_email_idx", ["lower(email)"]).unique(),
        ),
        Operation::add_index("docs", &Index::new("docs_body_idx", ["body"]).using("gin")),
        Operation::remove_index("users", "users_old_idx"),
        Operation::rename_index("users", "users_email", "users_email_idx"),
        Operation::add_constraint("users", &Constraint::unique("users_email_key", ["email"])),
        Operation::add_constraint("users", &Constraint::check("users_age_check", "age < 200")),
        Operation::remove_constraint("users", "users_email_key"),
        Operation::rename_constraint("users", "users_email_key", "users_email_unique"),
    ];
    insta::assert_snapshot!(ddl(&ops), @r#"
CREATE UNIQUE INDEX "users_lower_email_idx" ON "users" (lower(email));

CREATE INDEX "docs_body_idx" ON "docs" USING gin ("body");

DROP INDEX "users_old_idx";

ALTER INDEX "users_email" RENAME TO "users_email_idx";

ALTER TABLE "users" ADD CONSTRAINT "users_email_key" UNIQUE ("email");

ALTER TABLE "users" ADD CONSTRAINT "users_age_check" CHECK (age < 200);

ALTER TABLE "users" DROP CONSTRAINT "users_email_key";

ALTER TABLE "users" RENAME CONSTRAINT "users_email_key" TO "users_email_unique";
"#);
}

#[test]
fn test_enum_operations() {
    let mut role = Enum::new("role", ["user", "admin"]);
    role.comment = Some("Access level".into());
    let ops = [
        Operation::add_enum(&role),
        Operation::add_enum_value("role", "owner"),
        Operation::rename_enum("role", "user_role"),
        Operation::replace_enum_comment("user_role", None),
        Operation::remove_enum("mood"),
    ];
    insta::assert_snapshot!(ddl(&ops), @r#"
CREATE TYPE "role" AS ENUM ('user', 'admin');

COMMENT ON TYPE "role" IS 'Access level';

ALTER TYPE "role" ADD VALUE 'owner';

ALTER TYPE "role" RENAME TO "user_role";

COMMENT ON TYPE "user_role" IS NULL;

DROP TYPE "mood";
"#);
}

#[test]
fn test_foreign_key_action_change_is_unsupported() {
    let op = Operation::replace(
        &SchemaPath::constraint_field(
            "posts",
            "posts_user_id_fkey",
            ConstraintField::DeleteConstraint,
        ),
        json!("CASCADE"),
    );
    let out = deparse(&op);
    assert_eq!(out.ddl, "");
    assert_eq!(out.errors.len(), 1);
    assert!(matches!(out.errors[0], DeparseError::Unsupported { .. }));
    assert!(out.errors[0].to_string().contains("not directly supported"));
}

#[test]
fn test_other_unsupported_operations() {
    let ops = [
        Operation::remove_enum_value("role", "admin"),
        Operation::replace_enum_values("role", &["a".to_string()]),
        Operation::replace(
            &SchemaPath::index_field("users", "users_email_idx", IndexField::Unique),
            json!(true),
        ),
        Operation::replace(
            &SchemaPath::constraint_field("users", "users_age_check", ConstraintField::Detail),
            json!("age > 0"),
        ),
        Operation::replace(&SchemaPath::table("users"), json!({})),
        Operation::remove(&SchemaPath::table_field("users", TableField::Comment)),
    ];
    let out = deparse(ops.as_slice());
    assert_eq!(out.ddl, "");
    assert_eq!(out.errors.len(), ops.len());
    assert!(
        out.errors
            .iter()
            .all(|e| matches!(e, DeparseError::Unsupported { .. }))
    );
}

#[test]
fn test_invalid_operations() {
    let malformed = Operation {
        op: OpKind::Add,
        path: "/tables/users/colums/email".into(),
        value: Some(json!({"name": "email", "type": "text"})),
    };
    assert_eq!(
        deparse_operation(&malformed),
        Err(DeparseError::InvalidPath(PathError::TrailingSegments(
            "/tables/users/colums/email".into()
        )))
    );
    let out = deparse(&malformed);
    assert_eq!(out.ddl, "");
    assert_eq!(out.errors.len(), 1);

    let missing = Operation {
        op: OpKind::Add,
        path: "/tables/users/columns/email".into(),
        value: None,
    };
    assert_eq!(
        deparse_operation(&missing),
        Err(DeparseError::Value(ValueError::Missing {
            op: OpKind::Add,
            path: "/tables/users/columns/email".into(),
        }))
    );

    let wrong_shape = Operation::replace_column("users", "email", ColumnField::NotNull, json!("no"));
    assert!(matches!(
        deparse_operation(&wrong_shape),
        Err(DeparseError::Value(ValueError::Invalid { .. }))
    ));
}

#[test]
fn test_batch_continues_after_error() {
    let ops = vec![
        Operation {
            op: OpKind::Remove,
            path: "users".into(),
            value: None,
        },
        Operation::remove_table("users"),
    ];
    let out = deparse(&ops);
    assert_eq!(out.ddl, r#"DROP TABLE "users";"#);
    assert_eq!(
        out.errors,
        [DeparseError::InvalidPath(PathError::Relative("users".into()))]
    );
}

#[test]
fn test_full_schema() {
    let users = Table::new("users")
        .with_column(Column::new("id", "bigint").not_null())
        .with_column(Column::new("role", "role").not_null().default_value("user"))
        .with_constraint(Constraint::primary_key("users_pkey", ["id"]))
        .with_index(Index::new("users_role_idx", ["role"]));
    let schema = Schema::new()
        .with_enum(Enum::new("role", ["user", "admin"]))
        .with_table(posts())
        .with_table(users);

    let out = deparse(&schema);
    assert!(out.is_ok());
    insta::assert_snapshot!(out.ddl, @r#"
CREATE TYPE "role" AS ENUM ('user', 'admin');

CREATE TABLE "posts" (
  "id" bigint NOT NULL,
  "title" varchar(255) NOT NULL DEFAULT 'untitled',
  "published_at" timestamp DEFAULT now(),
  "score" integer DEFAULT 0 CONSTRAINT "CHECK_score" CHECK (score >= 0),
  "user_id" bigint
);

COMMENT ON TABLE "posts" IS 'Blog posts';
COMMENT ON COLUMN "posts"."title" IS 'Headline';

CREATE TABLE "users" (
  "id" bigint NOT NULL,
  "role" role NOT NULL DEFAULT 'user'
);

ALTER TABLE "posts" ADD CONSTRAINT "posts_pkey" PRIMARY KEY ("id");

ALTER TABLE "users" ADD CONSTRAINT "users_pkey" PRIMARY KEY ("id");

ALTER TABLE "posts" ADD CONSTRAINT "posts_user_id_fkey" FOREIGN KEY ("user_id") REFERENCES "users" ("id") ON UPDATE NO ACTION ON DELETE CASCADE;

CREATE INDEX "posts_title_idx" ON "posts" USING btree ("title");

CREATE INDEX "users_role_idx" ON "users" ("role");
"#);
}
