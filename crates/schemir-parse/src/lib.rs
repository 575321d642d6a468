//! Dialect parsers for schemir.
//!
//! Each parser turns one schema dialect into the canonical
//! [`schemir_schema::Schema`] plus a list of non-fatal [`ProcessError`]s:
//!
//! - [`prisma`]: Prisma DMMF JSON
//! - [`drizzle`]: Drizzle ORM TypeScript table definitions
//! - [`schemarb`]: ActiveRecord `db/schema.rb`
//! - [`postgres`]: PostgreSQL DDL
//! - [`tbls`]: tbls `schema.json`
//!
//! A parser only fails outright ([`ParseError`]) when the input can't be
//! read at all. Anything smaller, an unknown statement or a dangling
//! reference, becomes a warning and the parser moves on.
//!
//! Duplicate names are last-write-wins: a second table, column or constraint
//! with the same name replaces the first.

use schemir_schema::Schema;
use std::fmt;
use std::str::FromStr;

mod error;
pub use error::*;

mod options;
pub use options::*;

pub mod drizzle;
pub mod postgres;
pub mod prisma;
pub mod schemarb;
pub mod tbls;

/// The result of parsing one source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub schema: Schema,
    pub errors: Vec<ProcessError>,
}

impl ParseOutput {
    pub(crate) fn finish(
        mut schema: Schema,
        errors: Vec<ProcessError>,
        options: &ParseOptions,
    ) -> Self {
        if options.derive_relationships {
            schema.refresh_relationships();
        }
        Self { schema, errors }
    }
}

/// A schema dialect parser.
pub trait SchemaParser {
    /// Human-readable dialect name.
    fn dialect(&self) -> &'static str;

    fn parse_with(&self, source: &str, options: &ParseOptions) -> Result<ParseOutput, ParseError>;

    fn parse(&self, source: &str) -> Result<ParseOutput, ParseError> {
        self.parse_with(source, &ParseOptions::default())
    }
}

/// Supported input dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Prisma,
    Drizzle,
    #[serde(rename = "schemarb")]
    SchemaRb,
    Postgres,
    Tbls,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Prisma,
        Format::Drizzle,
        Format::SchemaRb,
        Format::Postgres,
        Format::Tbls,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Prisma => "prisma",
            Format::Drizzle => "drizzle",
            Format::SchemaRb => "schemarb",
            Format::Postgres => "postgres",
            Format::Tbls => "tbls",
        }
    }

    pub fn parser(&self) -> &'static dyn SchemaParser {
        match self {
            Format::Prisma => &prisma::PrismaParser,
            Format::Drizzle => &drizzle::DrizzleParser,
            Format::SchemaRb => &schemarb::SchemaRbParser,
            Format::Postgres => &postgres::PostgresParser,
            Format::Tbls => &tbls::TblsParser,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown schema format `{0}` (expected prisma, drizzle, schemarb, postgres or tbls)")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prisma" => Ok(Format::Prisma),
            "drizzle" => Ok(Format::Drizzle),
            "schemarb" | "schema.rb" => Ok(Format::SchemaRb),
            "postgres" | "postgresql" | "sql" => Ok(Format::Postgres),
            "tbls" => Ok(Format::Tbls),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Parse `source` as `format` with default options.
pub fn parse(format: Format, source: &str) -> Result<ParseOutput, ParseError> {
    format.parser().parse(source)
}

/// Parse `source` as `format`.
pub fn parse_with(
    format: Format,
    source: &str,
    options: &ParseOptions,
) -> Result<ParseOutput, ParseError> {
    format.parser().parse_with(source, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("PostgreSQL".parse::<Format>(), Ok(Format::Postgres));
        assert_eq!("schema.rb".parse::<Format>(), Ok(Format::SchemaRb));
        assert!("mysql".parse::<Format>().is_err());
        for format in Format::ALL {
            assert_eq!(format.as_str().parse::<Format>(), Ok(format));
            assert_eq!(format.parser().dialect(), format.as_str());
        }
    }
}
