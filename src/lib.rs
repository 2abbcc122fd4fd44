//! Binds `KEY=VALUE` strings from an env file and the process environment
//! onto a declared schema of typed fields.

pub mod config;
mod error;

pub use config::{
    coerce, CoerceError, ConfigError, ConfigLoader, CustomType, FieldStore, ImmutableViolation,
    LoaderOptions, MaterializedConfig, Origin, ParseCache, Schema, TypeDescriptor, TypedValue,
};
pub use error::Error;
