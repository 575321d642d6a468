use schemir::schema::{Column, Constraint, ForeignKeyAction, ForeignKeyConstraint, Table};
use schemir::{
    ConstraintField, DeparseError, OpKind, Operation, Schema, SchemaPath, deparse, diff,
};
use serde_json::json;

mod common;

#[test]
fn test_new_table_with_primary_key() {
    common::init_tracing();

    let before = Schema::new();
    let after = Schema::new().with_table(
        Table::new("users")
            .with_column(Column::new("id", "bigint").not_null())
            .with_constraint(Constraint::primary_key("users_pkey", ["id"])),
    );

    let out = deparse(&diff(&before, &after));
    assert!(out.errors.is_empty());
    assert_eq!(
        out.ddl,
        "CREATE TABLE \"users\" (\n  \"id\" bigint NOT NULL\n);\n\n\
         ALTER TABLE \"users\" ADD CONSTRAINT \"users_pkey\" PRIMARY KEY (\"id\");"
    );
}

#[test]
fn test_malformed_path_contributes_no_ddl() {
    common::init_tracing();

    let ops: Vec<Operation> = serde_json::from_value(json!([
        {
            "op": "add",
            "path": "/tables/users/cols/email",
            "value": {"name": "email", "type": "text", "notNull": true},
        },
        {
            "op": "add",
            "path": "/tables/users/columns/email",
            "value": {"name": "email", "type": "text", "notNull": true},
        },
    ]))
    .unwrap();

    let out = deparse(&ops);
    assert_eq!(out.errors.len(), 1);
    assert!(matches!(out.errors[0], DeparseError::InvalidPath(_)));
    assert_eq!(
        out.ddl,
        r#"ALTER TABLE "users" ADD COLUMN "email" text NOT NULL;"#
    );
}

#[test]
fn test_foreign_key_delete_action_is_not_directly_supported() {
    common::init_tracing();

    let op = Operation::replace(
        &SchemaPath::constraint_field("posts", "posts_user_id_fkey", ConstraintField::DeleteConstraint),
        json!("CASCADE"),
    );
    let out = deparse(&op);
    assert!(out.ddl.is_empty());
    let [DeparseError::Unsupported { operation, reason }] = out.errors.as_slice() else {
        panic!("expected one unsupported error, got {:?}", out.errors);
    };
    assert_eq!(
        operation,
        "replace /tables/posts/constraints/posts_user_id_fkey/deleteConstraint"
    );
    assert!(reason.contains("referential actions"));
    assert!(out.errors[0].to_string().contains("not directly supported"));
}

#[test]
fn test_changed_foreign_key_action_diffs_to_drop_and_add() {
    common::init_tracing();

    let users = Table::new("users")
        .with_column(Column::new("id", "bigint").not_null())
        .with_constraint(Constraint::primary_key("users_pkey", ["id"]));
    let posts = |action| {
        Table::new("posts")
            .with_column(Column::new("user_id", "bigint"))
            .with_constraint(Constraint::from(
                ForeignKeyConstraint::new("posts_user_id_fkey", ["user_id"], "users", ["id"])
                    .on_delete(action),
            ))
    };
    let before = Schema::new()
        .with_table(users.clone())
        .with_table(posts(ForeignKeyAction::NoAction));
    let after = Schema::new()
        .with_table(users)
        .with_table(posts(ForeignKeyAction::Cascade));

    let ops = diff(&before, &after);
    assert_eq!(
        ops.iter().map(|op| op.op).collect::<Vec<_>>(),
        [OpKind::Remove, OpKind::Add]
    );

    let out = deparse(&ops);
    assert!(out.errors.is_empty());
    insta::assert_snapshot!(out.ddl, @r#"
ALTER TABLE "posts" DROP CONSTRAINT "posts_user_id_fkey";

ALTER TABLE "posts" ADD CONSTRAINT "posts_user_id_fkey" FOREIGN KEY ("user_id") REFERENCES "users" ("id") ON UPDATE NO ACTION ON DELETE CASCADE;
"#);
}

#[test]
fn test_identical_schemas_diff_to_nothing() {
    let schema: Schema = serde_json::from_value(json!({
        "tables": {
            "users": {
                "name": "users",
                "columns": {
                    "id": {"name": "id", "type": "bigint", "notNull": true},
                },
                "constraints": {
                    "users_pkey": {"type": "PRIMARY KEY", "name": "users_pkey", "columnName": "id"},
                },
            },
        },
    }))
    .unwrap();

    assert!(diff(&schema, &schema.clone()).is_empty());
    assert_eq!(deparse(&diff(&schema, &schema)).ddl, "");
}
