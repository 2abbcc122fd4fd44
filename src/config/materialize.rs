//! Applying coerced values onto a target, and the frozen guard.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use super::coerce::{TypedMapping, TypedValue};
use super::error::ImmutableViolation;
use super::schema::Schema;
use super::ConfigError;

/// Something coerced fields can be written onto.
pub trait FieldStore {
    fn assign(&mut self, name: &str, value: TypedValue) -> Result<(), ConfigError>;

    /// Enters the frozen state. Targets that cannot freeze ignore this.
    fn freeze(&mut self) {}
}

/// Writes `typed` onto `target` in schema order, then freezes it if asked.
///
/// Freezing happens only after every field is set, so it never blocks the
/// initial writes.
pub fn materialize<T>(
    schema: &Schema,
    mut typed: TypedMapping,
    target: &mut T,
    frozen: bool,
) -> Result<(), ConfigError>
where
    T: FieldStore + ?Sized,
{
    for name in schema.names() {
        if let Some(value) = typed.shift_remove(name) {
            target.assign(name, value)?;
        }
    }
    if frozen {
        target.freeze();
    }
    Ok(())
}

/// A populated configuration object.
///
/// Every mutation goes through [`set`](Self::set) or [`remove`](Self::remove),
/// which consult the frozen guard. While mutable, any field may be written or
/// removed. Once [`freeze`](Self::freeze) is called the object stays frozen:
/// writing a field outside the schema, rewriting a field that already holds
/// a value, and removing any field all fail with [`ImmutableViolation`].
#[derive(Debug, Clone)]
pub struct MaterializedConfig {
    schema: Arc<Schema>,
    fields: IndexMap<String, TypedValue>,
    frozen: bool,
}

impl MaterializedConfig {
    /// Creates an empty, mutable config for `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            fields: IndexMap::new(),
            frozen: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: TypedValue) -> Result<(), ConfigError> {
        let name = name.into();
        if self.frozen {
            if !self.schema.contains(&name) {
                return Err(ImmutableViolation::UnknownField(name).into());
            }
            if self.fields.contains_key(&name) {
                return Err(ImmutableViolation::AlreadySet(name).into());
            }
        }
        self.fields.insert(name, value);
        Ok(())
    }

    /// Removes a field, returning its value if it was set.
    pub fn remove(&mut self, name: &str) -> Result<Option<TypedValue>, ConfigError> {
        if self.frozen {
            return Err(ImmutableViolation::DeleteForbidden(name.to_string()).into());
        }
        Ok(self.fields.shift_remove(name))
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an owned copy of the fields in assignment order.
    pub fn to_map(&self) -> IndexMap<String, TypedValue> {
        self.fields.clone()
    }

    /// Deserializes the fields into `T`.
    ///
    /// Sets and tuples become sequences, custom values become the text they
    /// were built from, and `Null` fields are left out. A `Null` element
    /// inside a sequence fails with [`ConfigError::NullElement`].
    ///
    /// ## Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use envmap::{MaterializedConfig, Schema, TypeDescriptor, TypedValue};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Settings {
    ///     #[serde(rename = "PORT")]
    ///     port: u16,
    /// }
    ///
    /// let schema = Arc::new(Schema::new("Settings").field("PORT", TypeDescriptor::int()));
    /// let mut config = MaterializedConfig::new(schema);
    /// config.set("PORT", TypedValue::Int(8080))?;
    ///
    /// let settings: Settings = config.deserialize()?;
    /// assert_eq!(settings.port, 8080);
    /// # Ok::<(), envmap::ConfigError>(())
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let mut table = toml::Table::new();
        for (name, value) in &self.fields {
            if let Some(value) = value.to_toml(name)? {
                table.insert(name.clone(), value);
            }
        }
        let value = toml::Value::Table(table);
        value.try_into().map_err(ConfigError::Deserialize)
    }
}

impl FieldStore for MaterializedConfig {
    fn assign(&mut self, name: &str, value: TypedValue) -> Result<(), ConfigError> {
        self.set(name, value)
    }

    fn freeze(&mut self) {
        MaterializedConfig::freeze(self);
    }
}

impl fmt::Display for MaterializedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.schema.name())?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}
