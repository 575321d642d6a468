//! Schema operations, diffing and PostgreSQL DDL generation.
//!
//! This crate works on the canonical [`Schema`] IR produced by the
//! `schemir-parse` dialect parsers:
//!
//! - [`Operation`]: one structured `add`/`remove`/`replace` patch, addressed
//!   by a [`SchemaPath`] such as `/tables/users/columns/email/notNull`
//! - [`diff`]: the operations that turn one schema into another
//! - [`apply`]: run operations against a schema
//! - [`deparse`]: render operations (or a whole schema) as PostgreSQL DDL
//!
//! # Example
//!
//! ```
//! use schemir::{deparse, diff};
//! use schemir::schema::{Column, Constraint, Schema, Table};
//!
//! let before = Schema::new();
//! let after = Schema::new().with_table(
//!     Table::new("users")
//!         .with_column(Column::new("id", "bigint").not_null())
//!         .with_constraint(Constraint::primary_key("users_pkey", ["id"])),
//! );
//!
//! let ops = diff(&before, &after);
//! let out = deparse(ops.as_slice());
//! assert!(out.errors.is_empty());
//! assert!(out.ddl.starts_with("CREATE TABLE \"users\""));
//! ```
//!
//! Everything here is a pure function over plain values: no I/O, no shared
//! state.

pub use schemir_schema as schema;
pub use schemir_schema::Schema;

mod apply;
pub use apply::*;

mod deparse;
pub use deparse::*;

mod diff;
pub use diff::*;

mod error;
pub use error::*;

mod operation;
pub use operation::*;

mod path;
pub use path::*;
