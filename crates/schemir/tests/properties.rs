use proptest::prelude::*;
use schemir::schema::{
    Column, Constraint, DefaultValue, Enum, ForeignKeyAction, ForeignKeyConstraint, Index, Table,
};
use schemir::{Schema, apply, deparse, diff};

const TABLES: &[&str] = &["users", "posts", "tags", "orders"];
const COLUMNS: &[&str] = &["id", "name", "email", "created_at", "score"];
const ENUMS: &[&str] = &["role", "status"];
const LABELS: &[&str] = &["a", "b", "c", "d"];

fn default_value() -> impl Strategy<Value = Option<DefaultValue>> {
    prop_oneof![
        Just(None),
        any::<i32>().prop_map(|n| Some(DefaultValue::from(n))),
        any::<bool>().prop_map(|b| Some(DefaultValue::from(b))),
        "[a-z]{0,6}".prop_map(|s| Some(DefaultValue::from(s))),
        Just(Some(DefaultValue::from("now()"))),
    ]
}

fn column() -> impl Strategy<Value = Column> {
    (
        prop::sample::select(&["bigint", "text", "integer", "boolean"][..]),
        any::<bool>(),
        default_value(),
        prop::option::of("[a-z ]{1,12}"),
        prop::option::of(Just("value > 0".to_string())),
    )
        .prop_map(|(ty, not_null, default, comment, check)| Column {
            name: String::new(),
            ty: ty.to_string(),
            default,
            not_null,
            unique: false,
            check,
            comment,
        })
}

fn table(name: &'static str) -> impl Strategy<Value = Table> {
    (
        prop::sample::subsequence(COLUMNS, 1..=COLUMNS.len()),
        prop::collection::vec(column(), COLUMNS.len()),
        prop::option::of("[a-z ]{1,12}"),
        any::<bool>(),
    )
        .prop_map(move |(names, columns, comment, indexed)| {
            let mut table = Table::new(name);
            table.comment = comment;
            for (column_name, mut column) in names.into_iter().zip(columns) {
                column.name = column_name.to_string();
                table.insert_column(column);
            }
            if table.columns.contains_key("id") {
                table.insert_constraint(Constraint::primary_key(format!("{name}_pkey"), ["id"]));
            }
            if indexed {
                if let Some(last) = table.columns.keys().last().cloned() {
                    table.insert_index(Index::new(format!("{name}_{last}_idx"), [last]));
                }
            }
            table
        })
}

fn enum_type(name: &'static str) -> impl Strategy<Value = Enum> {
    (
        prop::sample::subsequence(LABELS, 1..=LABELS.len()),
        prop::option::of("[a-z]{1,8}"),
    )
        .prop_map(move |(values, comment)| {
            let mut e = Enum::new(name, values);
            e.comment = comment;
            e
        })
}

fn schema() -> impl Strategy<Value = Schema> {
    let tables = prop::sample::subsequence(TABLES, 0..=TABLES.len())
        .prop_flat_map(|names| names.into_iter().map(table).collect::<Vec<_>>());
    let enums = prop::sample::subsequence(ENUMS, 0..=ENUMS.len())
        .prop_flat_map(|names| names.into_iter().map(enum_type).collect::<Vec<_>>());
    let action = prop::sample::select(
        &[
            ForeignKeyAction::NoAction,
            ForeignKeyAction::Cascade,
            ForeignKeyAction::SetNull,
        ][..],
    );

    (tables, enums, prop::option::of(action)).prop_map(|(tables, enums, link)| {
        let mut schema = Schema::new();
        for t in tables {
            schema.insert_table(t);
        }
        for e in enums {
            schema.insert_enum(e);
        }

        let linkable = ["users", "posts"]
            .iter()
            .all(|t| schema.get_table(t).is_some_and(|t| t.columns.contains_key("id")));
        if let (Some(action), true) = (link, linkable) {
            if let Some(posts) = schema.get_table_mut("posts") {
                posts.insert_constraint(Constraint::from(
                    ForeignKeyConstraint::new("posts_id_fkey", ["id"], "users", ["id"])
                        .on_delete(action),
                ));
            }
        }

        schema.refresh_relationships();
        schema
    })
}

proptest! {
    #[test]
    fn diff_with_itself_is_empty(a in schema()) {
        prop_assert!(diff(&a, &a).is_empty());
    }

    #[test]
    fn applying_the_diff_reaches_the_target(a in schema(), b in schema()) {
        let ops = diff(&a, &b);
        prop_assert_eq!(apply(&a, &ops), Ok(b));
    }

    #[test]
    fn diffs_between_generated_schemas_always_deparse(a in schema(), b in schema()) {
        let ops = diff(&a, &b);
        let out = deparse(&ops);
        // only enum value removals and reorders have no DDL
        for err in &out.errors {
            let message = err.to_string();
            prop_assert!(message.contains("/enums/"), "{}", message);
        }
    }
}
