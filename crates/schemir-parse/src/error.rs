use std::fmt;
use thiserror::Error;

/// A 1-based line/column location in parser input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Locate a byte offset in `source`.
    pub fn locate(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while offset > 0 && !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A recoverable problem with one construct of the input.
///
/// Parsers collect these and keep going; the schema they return is still
/// usable, minus whatever the warning describes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// A construct did not have the expected shape.
    #[error("unexpected token at {position}: {message}")]
    UnexpectedToken { position: Position, message: String },

    /// A construct was recognized but has no IR equivalent.
    #[error("unsupported {construct}: {detail}")]
    Unsupported { construct: String, detail: String },

    /// A statement targets a table that was never defined.
    #[error("table `{table}` not found ({context})")]
    UnknownTable { table: String, context: String },

    /// A reference (model, variable, column) could not be resolved.
    #[error("could not resolve `{reference}` ({context})")]
    UnresolvedReference { reference: String, context: String },

    /// An expression nested deeper than [`crate::ParseOptions::max_nesting_depth`].
    #[error("expression nested deeper than {limit} levels at {position}")]
    NestingTooDeep { limit: usize, position: Position },
}

impl ProcessError {
    pub fn unexpected(source: &str, offset: usize, message: impl Into<String>) -> Self {
        ProcessError::UnexpectedToken {
            position: Position::locate(source, offset),
            message: message.into(),
        }
    }

    pub fn unsupported(construct: impl Into<String>, detail: impl Into<String>) -> Self {
        ProcessError::Unsupported {
            construct: construct.into(),
            detail: detail.into(),
        }
    }
}

/// Input that can't be turned into a schema at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid {dialect} JSON: {source}")]
    Json {
        dialect: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{dialect} source could not be tokenized at {position}: {message}")]
    Lex {
        dialect: &'static str,
        position: Position,
        message: String,
    },
}

impl ParseError {
    pub(crate) fn lex(
        dialect: &'static str,
        source: &str,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        ParseError::Lex {
            dialect,
            position: Position::locate(source, offset),
            message: message.into(),
        }
    }
}
