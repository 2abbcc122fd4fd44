//! Recursive coercion of raw strings into typed values.
//!
//! A single raw string is split on `,` whenever its descriptor carries type
//! arguments. Fixed-arity tuples coerce each element against the argument at
//! the same position; every other parametrized origin coerces all elements
//! against its first argument. The origin is then constructed from the
//! (possibly still scalar) result.

use std::any::Any;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use super::error::{CoerceError, ConfigError};
use super::schema::{Origin, Schema, TypeDescriptor};
use super::source::RawMapping;

/// Separator for multiple values packed into one string.
pub const VALUE_DELIMITER: char = ',';

/// Coerced fields in schema order.
pub type TypedMapping = IndexMap<String, TypedValue>;

/// Input to [`coerce`]: one raw string, or strings already split apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    Scalar(String),
    Sequence(Vec<String>),
}

impl From<&str> for RawInput {
    fn from(value: &str) -> Self {
        RawInput::Scalar(value.to_owned())
    }
}

impl From<String> for RawInput {
    fn from(value: String) -> Self {
        RawInput::Scalar(value)
    }
}

impl From<Vec<String>> for RawInput {
    fn from(values: Vec<String>) -> Self {
        RawInput::Sequence(values)
    }
}

/// An instance of a [`CustomType`](super::schema::CustomType).
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: String,
    source: String,
    debug: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub(crate) fn new<T>(type_name: String, source: String, value: T) -> Self
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        Self {
            type_name,
            debug: format!("{value:?}"),
            source,
            value: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The text the value was constructed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug)
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.source == other.source
    }
}

impl Eq for OpaqueValue {}

impl Hash for OpaqueValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
        self.source.hash(state);
    }
}

/// The coerced value of one field.
///
/// Floats compare and hash by bit pattern so they can live in sets.
#[derive(Debug, Clone)]
pub enum TypedValue {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<TypedValue>),
    Set(IndexSet<TypedValue>),
    FrozenSet(IndexSet<TypedValue>),
    Tuple(Vec<TypedValue>),
    Opaque(OpaqueValue),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TypedValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            TypedValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TypedValue]> {
        match self {
            TypedValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Elements of a `Set` or `FrozenSet`.
    pub fn as_set(&self) -> Option<&IndexSet<TypedValue>> {
        match self {
            TypedValue::Set(items) | TypedValue::FrozenSet(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[TypedValue]> {
        match self {
            TypedValue::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueValue> {
        match self {
            TypedValue::Opaque(value) => Some(value),
            _ => None,
        }
    }

    /// Downcasts an opaque value to the custom type it was built as.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_opaque().and_then(OpaqueValue::downcast_ref)
    }

    /// Converts the value of `field` into TOML for serde extraction.
    ///
    /// A `Null` value has no TOML form and yields `Ok(None)`. A `Null` inside a
    /// sequence is an error, since dropping it would shift later positions.
    pub(crate) fn to_toml(&self, field: &str) -> Result<Option<toml::Value>, ConfigError> {
        fn array<'a>(
            items: impl Iterator<Item = &'a TypedValue>,
            field: &str,
        ) -> Result<toml::Value, ConfigError> {
            items
                .map(|item| -> Result<toml::Value, ConfigError> {
                    item.to_toml(field)?
                        .ok_or_else(|| ConfigError::NullElement(field.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(toml::Value::Array)
        }

        Ok(Some(match self {
            TypedValue::Null => return Ok(None),
            TypedValue::Str(s) => toml::Value::String(s.clone()),
            TypedValue::Int(i) => toml::Value::Integer(*i),
            TypedValue::Float(f) => toml::Value::Float(*f),
            TypedValue::Bool(b) => toml::Value::Boolean(*b),
            TypedValue::List(items) | TypedValue::Tuple(items) => array(items.iter(), field)?,
            TypedValue::Set(items) | TypedValue::FrozenSet(items) => array(items.iter(), field)?,
            TypedValue::Opaque(value) => toml::Value::String(value.source.clone()),
        }))
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        use TypedValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Str(a), Str(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (List(a), List(b)) | (Tuple(a), Tuple(b)) => a == b,
            (Set(a), Set(b)) | (FrozenSet(a), FrozenSet(b)) => a == b,
            (Opaque(a), Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TypedValue {}

impl Hash for TypedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TypedValue::Null => {}
            TypedValue::Str(s) => s.hash(state),
            TypedValue::Int(i) => i.hash(state),
            TypedValue::Float(f) => f.to_bits().hash(state),
            TypedValue::Bool(b) => b.hash(state),
            TypedValue::List(items) | TypedValue::Tuple(items) => items.hash(state),
            TypedValue::Set(items) | TypedValue::FrozenSet(items) => {
                // Order-independent, to agree with set equality.
                let combined = items.iter().fold(0u64, |acc, item| {
                    let mut hasher = DefaultHasher::new();
                    item.hash(&mut hasher);
                    acc ^ hasher.finish()
                });
                items.len().hash(state);
                combined.hash(state);
            }
            TypedValue::Opaque(value) => value.hash(state),
        }
    }
}

impl fmt::Display for TypedValue {
    /// Renders the value in its raw env encoding.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<'a>(
            f: &mut fmt::Formatter<'_>,
            items: impl Iterator<Item = &'a TypedValue>,
        ) -> fmt::Result {
            for (i, item) in items.enumerate() {
                if i > 0 {
                    write!(f, "{VALUE_DELIMITER}")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            TypedValue::Null => Ok(()),
            TypedValue::Str(s) => f.write_str(s),
            TypedValue::Int(i) => write!(f, "{i}"),
            TypedValue::Float(x) => write!(f, "{x}"),
            TypedValue::Bool(b) => write!(f, "{b}"),
            TypedValue::List(items) | TypedValue::Tuple(items) => join(f, items.iter()),
            TypedValue::Set(items) | TypedValue::FrozenSet(items) => join(f, items.iter()),
            TypedValue::Opaque(value) => f.write_str(&value.source),
        }
    }
}

/// Coerces a raw value against a type descriptor.
///
/// Returns [`TypedValue::Null`] for [`Origin::Unresolved`].
///
/// ## Example
///
/// ```
/// use envmap::{coerce, TypeDescriptor, TypedValue};
///
/// let tuple = TypeDescriptor::tuple([
///     TypeDescriptor::str(),
///     TypeDescriptor::int(),
///     TypeDescriptor::str(),
/// ]);
/// let value = coerce("a,5,b", &tuple)?;
/// assert_eq!(
///     value,
///     TypedValue::Tuple(vec![
///         TypedValue::Str("a".into()),
///         TypedValue::Int(5),
///         TypedValue::Str("b".into()),
///     ])
/// );
/// # Ok::<(), envmap::CoerceError>(())
/// ```
pub fn coerce(
    input: impl Into<RawInput>,
    descriptor: &TypeDescriptor,
) -> Result<TypedValue, CoerceError> {
    coerce_raw(input.into(), descriptor)
}

/// A value between splitting/recursion and origin construction.
enum Staged {
    Scalar(String),
    Elements(Vec<TypedValue>),
}

fn coerce_raw(input: RawInput, descriptor: &TypeDescriptor) -> Result<TypedValue, CoerceError> {
    if matches!(descriptor.origin, Origin::Unresolved) {
        return Ok(TypedValue::Null);
    }

    let input = match input {
        RawInput::Scalar(s) if !descriptor.args.is_empty() => RawInput::Sequence(split_values(&s)),
        other => other,
    };

    let staged = match input {
        RawInput::Scalar(s) => Staged::Scalar(s),
        RawInput::Sequence(items) if descriptor.is_fixed_tuple() => {
            if items.len() != descriptor.args.len() {
                return Err(CoerceError::TupleArity {
                    expected: descriptor.args.len(),
                    found: items.len(),
                });
            }
            let elements = items
                .into_iter()
                .zip(&descriptor.args)
                .map(|(item, arg)| coerce_raw(RawInput::Scalar(item), arg))
                .collect::<Result<Vec<_>, _>>()?;
            Staged::Elements(elements)
        }
        RawInput::Sequence(items) => match descriptor.args.first() {
            Some(element) => Staged::Elements(
                items
                    .into_iter()
                    .map(|item| coerce_raw(RawInput::Scalar(item), element))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => Staged::Elements(items.into_iter().map(TypedValue::Str).collect()),
        },
    };

    construct(&descriptor.origin, staged)
}

/// Invokes the origin as a one-argument constructor.
fn construct(origin: &Origin, staged: Staged) -> Result<TypedValue, CoerceError> {
    let scalar = |staged: Staged, type_name: &'static str| match staged {
        Staged::Scalar(s) => Ok(s),
        Staged::Elements(_) => Err(CoerceError::UnexpectedSequence { type_name }),
    };
    // Containers without type arguments still take the delimited encoding.
    let elements = |staged: Staged| -> Vec<TypedValue> {
        match staged {
            Staged::Scalar(s) => split_values(&s).into_iter().map(TypedValue::Str).collect(),
            Staged::Elements(items) => items,
        }
    };

    match origin {
        Origin::Str => scalar(staged, "str").map(TypedValue::Str),
        Origin::Int => {
            let s = scalar(staged, "int")?;
            s.trim()
                .parse::<i64>()
                .map(TypedValue::Int)
                .map_err(|e| invalid("int", s, e))
        }
        Origin::Float => {
            let s = scalar(staged, "float")?;
            s.trim()
                .parse::<f64>()
                .map(TypedValue::Float)
                .map_err(|e| invalid("float", s, e))
        }
        Origin::Bool => {
            let s = scalar(staged, "bool")?;
            parse_bool(s.trim())
                .map(TypedValue::Bool)
                .ok_or_else(|| invalid("bool", s, "expected true/false, 1/0, yes/no or on/off"))
        }
        Origin::Truthy => Ok(TypedValue::Bool(match staged {
            Staged::Scalar(s) => !s.is_empty(),
            Staged::Elements(items) => !items.is_empty(),
        })),
        Origin::List => Ok(TypedValue::List(elements(staged))),
        Origin::Tuple => Ok(TypedValue::Tuple(elements(staged))),
        Origin::Set => Ok(TypedValue::Set(elements(staged).into_iter().collect())),
        Origin::FrozenSet => Ok(TypedValue::FrozenSet(elements(staged).into_iter().collect())),
        Origin::Custom(custom) => {
            let input = match staged {
                Staged::Scalar(s) => TypedValue::Str(s),
                Staged::Elements(items) => TypedValue::List(items),
            };
            custom.construct(input).map(TypedValue::Opaque)
        }
        Origin::Unresolved => Ok(TypedValue::Null),
    }
}

fn invalid(type_name: &'static str, value: String, reason: impl fmt::Display) -> CoerceError {
    CoerceError::InvalidValue {
        type_name,
        value,
        reason: reason.to_string(),
    }
}

/// An empty string yields one empty element, never an empty sequence.
fn split_values(s: &str) -> Vec<String> {
    s.split(VALUE_DELIMITER).map(str::to_owned).collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Coerces every schema field from the merged raw mapping, in schema order.
///
/// Fails with [`ConfigError::MissingKeys`] naming every declared key the
/// mapping lacks.
pub fn coerce_mapping(schema: &Schema, raw: &RawMapping) -> Result<TypedMapping, ConfigError> {
    let missing: Vec<String> = schema
        .names()
        .filter(|name| !raw.contains_key(*name))
        .map(str::to_owned)
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingKeys(missing));
    }

    let mut typed = TypedMapping::with_capacity(schema.len());
    for (name, descriptor) in schema.fields() {
        let value = coerce(raw[name].as_str(), descriptor).map_err(|e| e.in_field(name))?;
        trace!(field = name, origin = descriptor.origin.name(), "coerced field");
        typed.insert(name.to_owned(), value);
    }
    Ok(typed)
}
