//! Typed configuration loading from an env file and the process environment.

mod builder;
mod cache;
mod coerce;
mod env;
mod error;
mod file;
mod materialize;
mod schema;
mod source;

pub use builder::{ConfigLoader, LoaderOptions};
pub use cache::{ParseCache, DEFAULT_CAPACITY};
pub use coerce::{
    coerce, coerce_mapping, OpaqueValue, RawInput, TypedMapping, TypedValue, VALUE_DELIMITER,
};
pub use env::{env_pairs, read_process_env};
pub use error::{CoerceError, ConfigError, ImmutableViolation};
pub use file::{load_raw_pairs, parse_raw_pairs};
pub use materialize::{materialize, FieldStore, MaterializedConfig};
pub use schema::{CustomType, Origin, Schema, TypeDescriptor};
pub use source::{merge, restrict_to_schema, Precedence, RawMapping};
