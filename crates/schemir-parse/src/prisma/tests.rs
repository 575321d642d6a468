use super::*;
use schemir_schema::Cardinality;

fn parse_ok(json: &str) -> ParseOutput {
    PrismaParser.parse(json).unwrap()
}

fn scalar(name: &str, ty: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "kind": "scalar",
        "type": ty,
        "isRequired": true,
    })
}

fn id_field() -> serde_json::Value {
    serde_json::json!({
        "name": "id",
        "kind": "scalar",
        "type": "Int",
        "isId": true,
        "isRequired": true,
        "default": { "name": "autoincrement", "args": [] },
    })
}

#[test]
fn test_autoincrement_id() {
    let json = serde_json::json!({
        "datamodel": {
            "models": [{ "name": "User", "fields": [id_field()] }]
        }
    });
    let out = parse_ok(&json.to_string());
    assert!(out.errors.is_empty());

    let users = out.schema.get_table("User").unwrap();
    let id = &users.columns["id"];
    assert_eq!(id.ty, "serial");
    assert_eq!(id.default, None);
    assert!(id.not_null);
    assert!(id.unique);

    let pk = &users.constraints["PRIMARY_id"];
    assert_eq!(pk.kind(), "PRIMARY KEY");
    assert_eq!(pk.column_names(), ["id".to_string()]);
    // @id doesn't also get a UNIQUE constraint
    assert_eq!(users.constraints.len(), 1);
}

#[test]
fn test_bare_datamodel_input() {
    let json = serde_json::json!({
        "models": [{ "name": "User", "dbName": "users", "fields": [id_field()] }]
    });
    let out = parse_ok(&json.to_string());
    assert!(out.schema.get_table("users").is_some());
}

#[test]
fn test_map_and_unique() {
    let json = serde_json::json!({
        "models": [{
            "name": "User",
            "dbName": "users",
            "documentation": "People",
            "fields": [
                id_field(),
                {
                    "name": "email",
                    "dbName": "email_address",
                    "kind": "scalar",
                    "type": "String",
                    "isUnique": true,
                    "isRequired": true,
                    "nativeType": ["VarChar", ["255"]],
                },
                {
                    "name": "bio",
                    "kind": "scalar",
                    "type": "String",
                    "documentation": "Free text",
                },
            ]
        }]
    });
    let out = parse_ok(&json.to_string());
    let users = out.schema.get_table("users").unwrap();
    assert_eq!(users.comment.as_deref(), Some("People"));

    let email = &users.columns["email_address"];
    assert_eq!(email.ty, "varchar(255)");
    assert!(email.unique);
    assert!(matches!(
        &users.constraints["UNIQUE_email_address"],
        Constraint::Unique(k) if k.column_names == ["email_address"]
    ));

    let bio = &users.columns["bio"];
    assert_eq!(bio.ty, "text");
    assert!(!bio.not_null);
    assert_eq!(bio.comment.as_deref(), Some("Free text"));
}

#[test]
fn test_defaults() {
    let json = serde_json::json!({
        "models": [{
            "name": "Event",
            "fields": [
                {
                    "name": "id", "kind": "scalar", "type": "String", "isId": true,
                    "isRequired": true, "default": { "name": "cuid", "args": [] },
                },
                {
                    "name": "token", "kind": "scalar", "type": "String",
                    "nativeType": ["Uuid", []], "default": { "name": "uuid", "args": [] },
                },
                {
                    "name": "at", "kind": "scalar", "type": "DateTime",
                    "default": { "name": "now", "args": [] },
                },
                {
                    "name": "seq", "kind": "scalar", "type": "BigInt",
                    "default": { "name": "autoincrement", "args": [] },
                },
                {
                    "name": "ext", "kind": "scalar", "type": "String",
                    "default": { "name": "dbgenerated", "args": ["gen_random_uuid()"] },
                },
                {
                    "name": "seeded", "kind": "scalar", "type": "String",
                    "default": { "name": "custom", "args": ["a'b", 3] },
                },
                {
                    "name": "nested", "kind": "scalar", "type": "String",
                    "default": { "name": "custom", "args": [{ "x": 1 }] },
                },
                { "name": "active", "kind": "scalar", "type": "Boolean", "default": true },
                { "name": "score", "kind": "scalar", "type": "Float", "default": 1.5 },
                { "name": "tags", "kind": "scalar", "type": "String", "isList": true },
            ]
        }]
    });
    let out = parse_ok(&json.to_string());
    let columns = &out.schema.get_table("Event").unwrap().columns;

    assert_eq!(columns["id"].ty, "text");
    assert_eq!(columns["id"].default, None);
    assert_eq!(columns["token"].ty, "uuid");
    assert_eq!(columns["token"].default, None);
    assert_eq!(columns["at"].ty, "timestamp(3)");
    assert_eq!(
        columns["at"].default,
        Some(DefaultValue::from("CURRENT_TIMESTAMP"))
    );
    assert_eq!(columns["seq"].ty, "bigserial");
    assert_eq!(
        columns["ext"].default,
        Some(DefaultValue::from("gen_random_uuid()"))
    );
    assert_eq!(
        columns["seeded"].default,
        Some(DefaultValue::from("custom('a''b', 3)"))
    );
    assert_eq!(columns["nested"].default, None);
    assert_eq!(columns["active"].default, Some(DefaultValue::from(true)));
    assert_eq!(columns["score"].default, DefaultValue::parse_number("1.5"));
    assert_eq!(columns["tags"].ty, "text[]");
}

#[test]
fn test_enum_column() {
    let json = serde_json::json!({
        "enums": [{
            "name": "Role",
            "dbName": "role",
            "values": [{ "name": "USER" }, { "name": "ADMIN", "dbName": "admin" }],
        }],
        "models": [{
            "name": "User",
            "fields": [
                id_field(),
                { "name": "role", "kind": "enum", "type": "Role", "isRequired": true, "default": "USER" },
            ]
        }]
    });
    let out = parse_ok(&json.to_string());
    assert_eq!(out.schema.enums["role"].values, ["USER", "admin"]);
    let role = &out.schema.get_table("User").unwrap().columns["role"];
    assert_eq!(role.ty, "role");
    assert_eq!(role.default, Some(DefaultValue::from("USER")));
}

#[test]
fn test_composite_keys_and_indexes() {
    let json = serde_json::json!({
        "models": [{
            "name": "Membership",
            "fields": [
                scalar("userId", "Int"),
                scalar("orgId", "Int"),
                scalar("slug", "String"),
            ],
            "primaryKey": { "name": null, "fields": ["userId", "orgId"] },
            "uniqueIndexes": [{ "name": null, "fields": ["orgId", "slug"] }],
        }],
        "indexes": [
            { "model": "Membership", "type": "normal", "fields": [{ "name": "slug" }], "algorithm": "Hash" },
            { "model": "Membership", "type": "fulltext", "fields": [{ "name": "slug" }] },
        ]
    });
    let out = parse_ok(&json.to_string());
    let table = out.schema.get_table("Membership").unwrap();

    assert!(matches!(
        &table.constraints["Membership_pkey"],
        Constraint::PrimaryKey(k) if k.column_names == ["userId", "orgId"]
    ));
    assert!(matches!(
        &table.constraints["Membership_orgId_slug_key"],
        Constraint::Unique(k) if k.column_names == ["orgId", "slug"]
    ));

    let index = &table.indexes["Membership_slug_idx"];
    assert!(!index.unique);
    assert_eq!(index.ty, "hash");

    assert_eq!(out.errors.len(), 1);
    assert!(matches!(&out.errors[0], ProcessError::Unsupported { construct, .. } if construct == "fulltext index"));
}

#[test]
fn test_foreign_key() {
    let json = serde_json::json!({
        "models": [
            {
                "name": "Post",
                "fields": [
                    id_field(),
                    scalar("authorId", "Int"),
                    {
                        "name": "author", "kind": "object", "type": "User", "isRequired": true,
                        "relationName": "PostToUser",
                        "relationFromFields": ["authorId"],
                        "relationToFields": ["id"],
                    },
                ]
            },
            {
                "name": "User",
                "dbName": "users",
                "fields": [
                    id_field(),
                    {
                        "name": "posts", "kind": "object", "type": "Post", "isList": true,
                        "relationName": "PostToUser",
                        "relationFromFields": [],
                        "relationToFields": [],
                    },
                ]
            }
        ]
    });
    let out = parse_ok(&json.to_string());
    assert!(out.errors.is_empty());

    let post = out.schema.get_table("Post").unwrap();
    let Constraint::ForeignKey(fk) = &post.constraints["PostToUser"] else {
        panic!("expected a foreign key");
    };
    assert_eq!(fk.column_names, ["authorId"]);
    assert_eq!(fk.target_table_name, "users");
    assert_eq!(fk.target_column_names, ["id"]);
    assert_eq!(fk.delete_constraint, ForeignKeyAction::Restrict);
    assert_eq!(fk.update_constraint, ForeignKeyAction::Cascade);

    // one-sided list relation is not a many-to-many
    assert_eq!(out.schema.tables.len(), 2);

    let rel = &out.schema.relationships["PostToUser"];
    assert_eq!(rel.primary_table_name, "users");
    assert_eq!(rel.foreign_table_name, "Post");
    assert_eq!(rel.cardinality, Cardinality::OneToMany);
}

#[test]
fn test_optional_relation_defaults_to_set_null() {
    let json = serde_json::json!({
        "models": [
            {
                "name": "Post",
                "fields": [
                    id_field(),
                    { "name": "authorId", "kind": "scalar", "type": "Int" },
                    {
                        "name": "author", "kind": "object", "type": "User",
                        "relationName": "PostToUser",
                        "relationFromFields": ["authorId"],
                        "relationToFields": ["id"],
                        "relationOnUpdate": "NoAction",
                    },
                ]
            },
            { "name": "User", "fields": [id_field()] }
        ]
    });
    let out = parse_ok(&json.to_string());
    let Constraint::ForeignKey(fk) = &out.schema.get_table("Post").unwrap().constraints["PostToUser"]
    else {
        panic!("expected a foreign key");
    };
    assert_eq!(fk.delete_constraint, ForeignKeyAction::SetNull);
    assert_eq!(fk.update_constraint, ForeignKeyAction::NoAction);
}

fn many_to_many(tag_first: bool) -> String {
    let post = serde_json::json!({
        "name": "Post",
        "fields": [
            id_field(),
            { "name": "tags", "kind": "object", "type": "Tag", "isList": true, "relationName": "PostToTag" },
        ]
    });
    let tag = serde_json::json!({
        "name": "Tag",
        "fields": [
            {
                "name": "id", "kind": "scalar", "type": "BigInt", "isId": true, "isRequired": true,
                "default": { "name": "autoincrement", "args": [] },
            },
            { "name": "posts", "kind": "object", "type": "Post", "isList": true, "relationName": "PostToTag" },
        ]
    });
    let models = if tag_first { vec![tag, post] } else { vec![post, tag] };
    serde_json::json!({ "models": models }).to_string()
}

#[test]
fn test_many_to_many_join_table() {
    let out = parse_ok(&many_to_many(false));
    assert!(out.errors.is_empty());

    let join = out.schema.get_table("_PostToTag").unwrap();
    assert_eq!(join.columns["A"].ty, "integer");
    assert_eq!(join.columns["B"].ty, "bigint");
    assert!(join.columns["A"].not_null);

    let ab = &join.indexes["_PostToTag_AB_pkey"];
    assert!(ab.unique);
    assert_eq!(ab.columns, ["A", "B"]);
    assert_eq!(join.indexes["_PostToTag_B_index"].columns, ["B"]);

    let Constraint::ForeignKey(a) = &join.constraints["_PostToTag_A_fkey"] else {
        panic!("expected a foreign key");
    };
    assert_eq!(a.target_table_name, "Post");
    assert_eq!(a.target_column_names, ["id"]);
    assert_eq!(a.delete_constraint, ForeignKeyAction::Cascade);
    assert_eq!(a.update_constraint, ForeignKeyAction::Cascade);

    let Constraint::ForeignKey(b) = &join.constraints["_PostToTag_B_fkey"] else {
        panic!("expected a foreign key");
    };
    assert_eq!(b.target_table_name, "Tag");
}

#[test]
fn test_many_to_many_is_order_independent() {
    let a = parse_ok(&many_to_many(false));
    let b = parse_ok(&many_to_many(true));

    let join_tables = |out: &ParseOutput| {
        out.schema
            .tables
            .keys()
            .filter(|name| name.starts_with('_'))
            .cloned()
            .collect::<Vec<_>>()
    };
    assert_eq!(join_tables(&a), ["_PostToTag"]);
    assert_eq!(join_tables(&b), ["_PostToTag"]);
    assert_eq!(a.schema, b.schema);
}

#[test]
fn test_invalid_json_is_hard_error() {
    let err = PrismaParser.parse("{ not json").unwrap_err();
    assert!(matches!(err, ParseError::Json { dialect: "prisma", .. }));
}

#[test]
fn test_parse_is_idempotent() {
    let source = many_to_many(false);
    assert_eq!(parse_ok(&source), parse_ok(&source));
}
