use thiserror::Error;

use crate::OpKind;

/// A path string that doesn't match the operation path grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path `{0}` must start with `/`")]
    Relative(String),

    #[error("path `{0}` has an empty segment")]
    EmptySegment(String),

    #[error("unknown collection `{segment}` in path `{path}`")]
    UnknownCollection { path: String, segment: String },

    #[error("unknown {entity} field `{field}` in path `{path}`")]
    UnknownField {
        path: String,
        entity: &'static str,
        field: String,
    },

    #[error("path `{0}` is incomplete")]
    Incomplete(String),

    #[error("path `{0}` has unexpected trailing segments")]
    TrailingSegments(String),
}

/// An operation value that is missing or has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("`{op}` operation on `{path}` requires a value")]
    Missing { op: OpKind, path: String },

    #[error("invalid value for `{path}`: {reason}")]
    Invalid { path: String, reason: String },
}

/// An operation that can't be rendered as DDL.
///
/// Deparsing a batch collects these per operation and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeparseError {
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("`{operation}` is not directly supported: {reason}")]
    Unsupported { operation: String, reason: String },
}

/// An operation that can't be applied to a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("{entity} `{name}` not found")]
    NotFound { entity: &'static str, name: String },

    #[error("{entity} `{name}` already exists")]
    AlreadyExists { entity: &'static str, name: String },

    #[error("`{operation}` is not supported: {reason}")]
    Unsupported { operation: String, reason: String },
}
