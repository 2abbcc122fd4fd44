use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("env file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read env file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse env file '{path}' at line {line}: expected KEY=VALUE, got {content:?}")]
    ParseError {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("env is empty: neither the env file nor the process environment supplied a declared key")]
    EmptySources,

    #[error("missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error(transparent)]
    Immutable(#[from] ImmutableViolation),

    #[error("failed to coerce field '{field}': {source}")]
    Coerce {
        field: String,
        source: CoerceError,
    },

    #[error("field '{0}' has an unresolved element inside a sequence and cannot be deserialized")]
    NullElement(String),

    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] toml::de::Error),
}

/// A mutation rejected by a frozen config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImmutableViolation {
    #[error("this object is frozen, you can't set unknown field '{0}'")]
    UnknownField(String),

    #[error("this object is frozen, you can't change field '{0}'")]
    AlreadySet(String),

    #[error("this object is frozen, you can't delete field '{0}'")]
    DeleteForbidden(String),
}

/// Failure to turn a raw string into a value of the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CoerceError {
    #[error("invalid {type_name} value {value:?}: {reason}")]
    InvalidValue {
        type_name: &'static str,
        value: String,
        reason: String,
    },

    #[error("tuple expects {expected} elements, got {found}")]
    TupleArity { expected: usize, found: usize },

    #[error("{type_name} cannot be constructed from a sequence")]
    UnexpectedSequence { type_name: &'static str },

    #[error("{type_name}: {message}")]
    Custom { type_name: String, message: String },
}

impl CoerceError {
    pub(crate) fn in_field(self, field: impl Into<String>) -> ConfigError {
        ConfigError::Coerce {
            field: field.into(),
            source: self,
        }
    }
}
