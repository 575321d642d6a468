use super::*;
use serde_json::json;

fn users_and_posts() -> Schema {
    Schema::new()
        .with_table(
            Table::new("users")
                .with_column(Column::new("id", "bigint").not_null())
                .with_constraint(Constraint::primary_key("users_pkey", ["id"])),
        )
        .with_table(
            Table::new("posts")
                .with_column(Column::new("id", "bigint").not_null())
                .with_column(Column::new("user_id", "bigint").not_null())
                .with_constraint(Constraint::primary_key("posts_pkey", ["id"]))
                .with_constraint(
                    ForeignKeyConstraint::new("posts_user_id_fkey", ["user_id"], "users", ["id"])
                        .on_delete(ForeignKeyAction::Cascade)
                        .into(),
                ),
        )
}

#[test]
fn test_constraint_tagged_serialization() {
    let pk = Constraint::primary_key("users_pkey", ["id"]);
    insta::assert_snapshot!(
        serde_json::to_string(&pk).unwrap(),
        @r#"{"type":"PRIMARY KEY","name":"users_pkey","columnNames":["id"]}"#
    );

    let fk: Constraint =
        ForeignKeyConstraint::new("posts_user_id_fkey", ["user_id"], "users", ["id"])
            .on_update(ForeignKeyAction::SetNull)
            .into();
    let value = serde_json::to_value(&fk).unwrap();
    assert_eq!(value["type"], "FOREIGN KEY");
    assert_eq!(value["targetTableName"], "users");
    assert_eq!(value["updateConstraint"], "SET_NULL");
    assert_eq!(value["deleteConstraint"], "NO_ACTION");
}

#[test]
fn test_legacy_single_column_constraint_shape() {
    let legacy = json!({
        "type": "FOREIGN KEY",
        "name": "fk_posts_user_id",
        "columnName": "user_id",
        "targetTableName": "users",
        "targetColumnName": "id",
        "updateConstraint": "CASCADE",
        "deleteConstraint": "RESTRICT"
    });
    let parsed: Constraint = serde_json::from_value(legacy).unwrap();
    let Constraint::ForeignKey(fk) = &parsed else {
        panic!("expected a foreign key, got {parsed:?}");
    };
    assert_eq!(fk.column_names, vec!["user_id"]);
    assert_eq!(fk.target_column_names, vec!["id"]);
    assert_eq!(fk.update_constraint, ForeignKeyAction::Cascade);
    assert_eq!(fk.delete_constraint, ForeignKeyAction::Restrict);

    // Re-serializing always produces the array form.
    let value = serde_json::to_value(&parsed).unwrap();
    assert_eq!(value["columnNames"], json!(["user_id"]));
    assert!(value.get("columnName").is_none());
}

#[test]
fn test_unique_legacy_shape() {
    let parsed: Constraint = serde_json::from_value(json!({
        "type": "UNIQUE",
        "name": "users_email_key",
        "columnName": "email"
    }))
    .unwrap();
    assert_eq!(parsed, Constraint::unique("users_email_key", ["email"]));
}

#[test]
fn test_schema_equality_ignores_insertion_order() {
    let a = Schema::new()
        .with_table(Table::new("a"))
        .with_table(Table::new("b"));
    let b = Schema::new()
        .with_table(Table::new("b"))
        .with_table(Table::new("a"));
    assert_eq!(a, b);
}

#[test]
fn test_insert_is_last_write_wins() {
    let mut schema = Schema::new();
    schema.insert_table(Table::new("users").with_column(Column::new("id", "int")));
    let replaced = schema.insert_table(Table::new("users").with_column(Column::new("uuid", "uuid")));

    assert!(replaced.is_some());
    assert_eq!(schema.tables.len(), 1);
    let users = schema.get_table("users").unwrap();
    assert!(users.columns.contains_key("uuid"));
    assert!(!users.columns.contains_key("id"));
}

#[test]
fn test_column_deserializes_with_defaults() {
    let column: Column = serde_json::from_value(json!({
        "name": "email",
        "type": "varchar(255)"
    }))
    .unwrap();
    assert_eq!(column, Column::new("email", "varchar(255)"));
}

#[test]
fn test_table_schema_name_is_optional_on_the_wire() {
    let table = Table::new("accounts");
    let value = serde_json::to_value(&table).unwrap();
    assert!(value.get("schemaName").is_none());

    let mut qualified = table.clone();
    qualified.schema_name = Some("auth".into());
    let value = serde_json::to_value(&qualified).unwrap();
    assert_eq!(value["schemaName"], json!("auth"));
    assert_eq!(value["name"], json!("accounts"));

    let back: Table = serde_json::from_value(value).unwrap();
    assert_eq!(back, qualified);
    let bare: Table = serde_json::from_value(json!({ "name": "accounts" })).unwrap();
    assert_eq!(bare, table);
}

#[test]
fn test_default_value_untagged() {
    let values: Vec<DefaultValue> =
        serde_json::from_value(json!([true, 42, 1.5, "now()"])).unwrap();
    assert_eq!(values[0], DefaultValue::Boolean(true));
    assert_eq!(values[1], DefaultValue::from(42i64));
    assert_eq!(values[2].to_string(), "1.5");
    assert_eq!(values[3], DefaultValue::from("now()"));
}

#[test]
fn test_default_value_parse_number() {
    assert_eq!(DefaultValue::parse_number("0"), Some(DefaultValue::from(0i64)));
    assert_eq!(DefaultValue::parse_number("-12"), Some(DefaultValue::from(-12i64)));
    assert_eq!(
        DefaultValue::parse_number("3.25").map(|v| v.to_string()),
        Some("3.25".to_string())
    );
    assert_eq!(DefaultValue::parse_number("abc"), None);
    assert_eq!(DefaultValue::parse_number("NaN"), None);
    assert_eq!(DefaultValue::parse_number("inf"), None);
}

#[test]
fn test_foreign_key_action_parse() {
    assert_eq!(ForeignKeyAction::parse("SET NULL"), Some(ForeignKeyAction::SetNull));
    assert_eq!(ForeignKeyAction::parse("set_default"), Some(ForeignKeyAction::SetDefault));
    assert_eq!(ForeignKeyAction::parse("NoAction"), Some(ForeignKeyAction::NoAction));
    assert_eq!(ForeignKeyAction::parse("cascade"), Some(ForeignKeyAction::Cascade));
    assert_eq!(ForeignKeyAction::parse("nullify"), None);
    assert_eq!(ForeignKeyAction::SetDefault.to_sql(), "SET DEFAULT");
}

#[test]
fn test_derive_relationships_one_to_many() {
    let schema = users_and_posts();
    let relationships = derive_relationships(&schema.tables);

    let rel = &relationships["posts_user_id_fkey"];
    assert_eq!(rel.primary_table_name, "users");
    assert_eq!(rel.primary_column_name, "id");
    assert_eq!(rel.foreign_table_name, "posts");
    assert_eq!(rel.foreign_column_name, "user_id");
    assert_eq!(rel.cardinality, Cardinality::OneToMany);
    assert_eq!(rel.delete_constraint, ForeignKeyAction::Cascade);
}

#[test]
fn test_derive_relationships_one_to_one() {
    let mut schema = users_and_posts();
    schema
        .get_table_mut("posts")
        .unwrap()
        .insert_constraint(Constraint::unique("posts_user_id_key", ["user_id"]));
    schema.refresh_relationships();

    assert_eq!(
        schema.relationships["posts_user_id_fkey"].cardinality,
        Cardinality::OneToOne
    );
}

#[test]
fn test_composite_key_covers_columns_in_any_order() {
    let table = Table::new("memberships")
        .with_constraint(Constraint::primary_key("memberships_pkey", ["org_id", "user_id"]));
    assert!(table.has_unique_key_on(&["user_id".to_string(), "org_id".to_string()]));
    assert!(!table.has_unique_key_on(&["user_id".to_string()]));
}
