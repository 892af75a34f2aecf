//! Payload shapes for argument-style handlers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a JSON payload is presented to a handler.
///
/// The shape is resolved once when the payload is converted, never per
/// attempt: arrays become positional arguments, objects become named
/// arguments, anything else is a single argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum PayloadShape {
    /// Positional arguments.
    Positional(Vec<Value>),
    /// Named arguments.
    Keyed(Map<String, Value>),
    /// A single argument.
    Single(Value),
}

impl PayloadShape {
    /// Returns the positional arguments, if this is a positional payload.
    #[must_use]
    pub fn positional(&self) -> Option<&[Value]> {
        match self {
            Self::Positional(args) => Some(args),
            _ => None,
        }
    }

    /// Returns the named arguments, if this is a keyed payload.
    #[must_use]
    pub fn keyed(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Keyed(kwargs) => Some(kwargs),
            _ => None,
        }
    }

    /// Returns the value, if this is a single-argument payload.
    #[must_use]
    pub fn single(&self) -> Option<&Value> {
        match self {
            Self::Single(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the positional argument at `position`.
    #[must_use]
    pub fn arg(&self, position: usize) -> Option<&Value> {
        self.positional().and_then(|args| args.get(position))
    }

    /// Returns the named argument `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keyed().and_then(|kwargs| kwargs.get(key))
    }

    /// Number of arguments the handler receives.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Positional(args) => args.len(),
            Self::Keyed(kwargs) => kwargs.len(),
            Self::Single(_) => 1,
        }
    }

    /// Converts back into a plain JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Positional(args) => Value::Array(args),
            Self::Keyed(kwargs) => Value::Object(kwargs),
            Self::Single(value) => value,
        }
    }
}

impl From<Value> for PayloadShape {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(args) => Self::Positional(args),
            Value::Object(kwargs) => Self::Keyed(kwargs),
            other => Self::Single(other),
        }
    }
}

impl From<PayloadShape> for Value {
    fn from(shape: PayloadShape) -> Self {
        shape.into_value()
    }
}
