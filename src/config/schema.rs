//! Declared field layout of a configuration entity.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::coerce::{OpaqueValue, TypedValue};
use super::error::CoerceError;

type Constructor = dyn Fn(TypedValue) -> Result<OpaqueValue, CoerceError> + Send + Sync;

/// A user type built by calling a one-argument constructor.
///
/// Without type arguments the constructor receives the raw string as
/// [`TypedValue::Str`]; with type arguments it receives the coerced elements
/// as [`TypedValue::List`].
#[derive(Clone)]
pub struct CustomType {
    name: String,
    ctor: Arc<Constructor>,
}

impl CustomType {
    /// Creates a custom type from a constructor closure.
    pub fn new<T, E, F>(name: impl Into<String>, ctor: F) -> Self
    where
        T: Any + fmt::Debug + Send + Sync,
        E: fmt::Display,
        F: Fn(TypedValue) -> Result<T, E> + Send + Sync + 'static,
    {
        let name = name.into();
        let type_name = name.clone();
        Self {
            name,
            ctor: Arc::new(move |input: TypedValue| {
                let source = input.to_string();
                ctor(input)
                    .map(|value| OpaqueValue::new(type_name.clone(), source, value))
                    .map_err(|e| CoerceError::Custom {
                        type_name: type_name.clone(),
                        message: e.to_string(),
                    })
            }),
        }
    }

    /// Creates a custom type that parses its raw string with [`FromStr`].
    pub fn parsed<T>() -> Self
    where
        T: FromStr + Any + fmt::Debug + Send + Sync,
        T::Err: fmt::Display,
    {
        let type_name = std::any::type_name::<T>();
        Self::new(type_name, move |input: TypedValue| match input {
            TypedValue::Str(s) => s.parse::<T>().map_err(|e| e.to_string()),
            other => Err(format!("expected a single value, got {other}")),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn construct(&self, input: TypedValue) -> Result<OpaqueValue, CoerceError> {
        (self.ctor)(input)
    }
}

impl fmt::Debug for CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomType").field(&self.name).finish()
    }
}

/// The outermost constructible type of a [`TypeDescriptor`].
#[derive(Debug, Clone)]
pub enum Origin {
    Str,
    Int,
    Float,
    /// Parses `true/false`, `1/0`, `yes/no`, `on/off`, ignoring case.
    Bool,
    /// Any non-empty string is `true`.
    Truthy,
    List,
    Set,
    FrozenSet,
    Tuple,
    Custom(CustomType),
    /// A bare annotation with nothing to construct; coerces to [`TypedValue::Null`].
    Unresolved,
}

impl Origin {
    pub fn name(&self) -> &str {
        match self {
            Origin::Str => "str",
            Origin::Int => "int",
            Origin::Float => "float",
            Origin::Bool => "bool",
            Origin::Truthy => "truthy",
            Origin::List => "list",
            Origin::Set => "set",
            Origin::FrozenSet => "frozenset",
            Origin::Tuple => "tuple",
            Origin::Custom(custom) => custom.name(),
            Origin::Unresolved => "unresolved",
        }
    }
}

/// A target type plus its type arguments.
///
/// `tuple` with more than one argument is a fixed-arity heterogeneous tuple;
/// any other origin with arguments is a homogeneous container of `args[0]`.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub origin: Origin,
    pub args: Vec<TypeDescriptor>,
}

impl TypeDescriptor {
    pub fn new(origin: Origin, args: Vec<TypeDescriptor>) -> Self {
        Self { origin, args }
    }

    fn scalar(origin: Origin) -> Self {
        Self::new(origin, Vec::new())
    }

    pub fn str() -> Self {
        Self::scalar(Origin::Str)
    }

    pub fn int() -> Self {
        Self::scalar(Origin::Int)
    }

    pub fn float() -> Self {
        Self::scalar(Origin::Float)
    }

    pub fn bool() -> Self {
        Self::scalar(Origin::Bool)
    }

    pub fn truthy() -> Self {
        Self::scalar(Origin::Truthy)
    }

    pub fn unresolved() -> Self {
        Self::scalar(Origin::Unresolved)
    }

    pub fn list(element: TypeDescriptor) -> Self {
        Self::new(Origin::List, vec![element])
    }

    pub fn set(element: TypeDescriptor) -> Self {
        Self::new(Origin::Set, vec![element])
    }

    pub fn frozenset(element: TypeDescriptor) -> Self {
        Self::new(Origin::FrozenSet, vec![element])
    }

    pub fn tuple(elements: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self::new(Origin::Tuple, elements.into_iter().collect())
    }

    pub fn custom(custom: CustomType) -> Self {
        Self::scalar(Origin::Custom(custom))
    }

    /// Shorthand for a custom type parsed with [`FromStr`].
    pub fn parsed<T>() -> Self
    where
        T: FromStr + Any + fmt::Debug + Send + Sync,
        T::Err: fmt::Display,
    {
        Self::custom(CustomType::parsed::<T>())
    }

    /// Adds type arguments, e.g. to parametrize a custom wrapper type.
    pub fn with_args(mut self, args: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        self.args.extend(args);
        self
    }

    pub(crate) fn is_fixed_tuple(&self) -> bool {
        matches!(self.origin, Origin::Tuple) && self.args.len() > 1
    }
}

/// The ordered set of named, typed fields a configuration entity expects.
///
/// ## Example
///
/// ```
/// use envmap::{Schema, TypeDescriptor};
///
/// let schema = Schema::new("Telegram")
///     .field("TOKEN", TypeDescriptor::str())
///     .field("IDS", TypeDescriptor::set(TypeDescriptor::int()));
///
/// assert!(schema.contains("IDS"));
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Vec<(String, TypeDescriptor)>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declares a field. Redeclaring a name replaces its type but keeps its position.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = descriptor,
            None => self.fields.push((name, descriptor)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn get(&self, field: &str) -> Option<&TypeDescriptor> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, descriptor)| descriptor)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.fields.iter().map(|(name, d)| (name.as_str(), d))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_keep_declaration_order() {
        let schema = Schema::new("App")
            .field("B", TypeDescriptor::str())
            .field("A", TypeDescriptor::int())
            .field("C", TypeDescriptor::list(TypeDescriptor::int()));

        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, ["B", "A", "C"]);
    }

    #[test]
    fn test_redeclared_field_keeps_position() {
        let schema = Schema::new("App")
            .field("A", TypeDescriptor::str())
            .field("B", TypeDescriptor::str())
            .field("A", TypeDescriptor::int());

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.names().next(), Some("A"));
        assert!(matches!(schema.get("A").unwrap().origin, Origin::Int));
    }

    #[test]
    fn test_fixed_tuple_needs_more_than_one_arg() {
        let fixed = TypeDescriptor::tuple([TypeDescriptor::str(), TypeDescriptor::int()]);
        let homogeneous = TypeDescriptor::tuple([TypeDescriptor::int()]);

        assert!(fixed.is_fixed_tuple());
        assert!(!homogeneous.is_fixed_tuple());
        assert!(!TypeDescriptor::list(TypeDescriptor::int()).is_fixed_tuple());
    }

    #[test]
    fn test_parsed_custom_type_name() {
        let descriptor = TypeDescriptor::parsed::<std::net::Ipv4Addr>();
        assert!(descriptor.origin.name().ends_with("Ipv4Addr"));
    }
}
