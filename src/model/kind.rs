//! Declared value kinds.
//!
//! The descriptor of every property names the kind of value it holds, so the
//! engine branches on what was declared instead of probing values at runtime.

use std::fmt;

/// The declared kind of a property value (or of a parse target).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValueKind {
    /// Undeclared: values pass through as plain data.
    #[default]
    Any,
    Bool,
    Int,
    Float,
    String,
    Date,
    /// Ordered list with a declared element kind.
    List(Box<ValueKind>),
    /// String-keyed ordered map with a declared value kind.
    Map(Box<ValueKind>),
    /// Nested object of a registered class.
    Object(String),
}

impl ValueKind {
    pub fn list_of(element: ValueKind) -> Self {
        ValueKind::List(Box::new(element))
    }

    pub fn map_of(value: ValueKind) -> Self {
        ValueKind::Map(Box::new(value))
    }

    pub fn object(class: impl Into<String>) -> Self {
        ValueKind::Object(class.into())
    }

    /// Scalars a null may be replaced with a default value for.
    pub fn is_primitive(&self) -> bool {
        matches!(self, ValueKind::Bool | ValueKind::Int | ValueKind::Float | ValueKind::String)
    }

    /// The class this kind points at, looking through one container level.
    pub fn target_class(&self) -> Option<&str> {
        match self {
            ValueKind::Object(class) => Some(class),
            ValueKind::List(inner) | ValueKind::Map(inner) => match inner.as_ref() {
                ValueKind::Object(class) => Some(class),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Any => write!(f, "any"),
            ValueKind::Bool => write!(f, "boolean"),
            ValueKind::Int => write!(f, "integer"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Date => write!(f, "date"),
            ValueKind::List(inner) => write!(f, "list<{inner}>"),
            ValueKind::Map(inner) => write!(f, "map<string, {inner}>"),
            ValueKind::Object(class) => write!(f, "{class}"),
        }
    }
}
