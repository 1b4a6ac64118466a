//! Object identity declarations.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::model::{Object, Value};
use crate::Result;

/// User-supplied identity generator.
pub type IdFn = Arc<dyn Fn(&Object) -> Result<Value> + Send + Sync>;

pub const DEFAULT_IDENTITY_PROPERTY: &str = "@id";

/// UUID variants an identity can be generated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UuidVersion {
    /// Time-based with the given node id.
    V1 { node_id: [u8; 6] },
    /// MD5 name-based.
    V3 { namespace: Uuid, name: String },
    /// Random.
    V4,
    /// SHA-1 name-based.
    V5 { namespace: Uuid, name: String },
}

/// Where an object's identity value comes from.
#[derive(Clone)]
pub enum IdGenerator {
    /// Next value of the process-wide sequence.
    IntSequence,
    /// The object's own identity property, left untouched.
    Property,
    Uuid(UuidVersion),
    /// Identity property set to null.
    None,
    Custom(IdFn),
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdGenerator::IntSequence => write!(f, "IntSequence"),
            IdGenerator::Property => write!(f, "Property"),
            IdGenerator::Uuid(version) => write!(f, "Uuid({version:?})"),
            IdGenerator::None => write!(f, "None"),
            IdGenerator::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Identity policy of a class: generator plus the property holding the id.
#[derive(Debug, Clone)]
pub struct IdentityInfo {
    pub generator: IdGenerator,
    pub property: String,
}

impl IdentityInfo {
    pub fn new(generator: IdGenerator, property: impl Into<String>) -> Self {
        Self {
            generator,
            property: property.into(),
        }
    }

    pub fn int_sequence() -> Self {
        Self::new(IdGenerator::IntSequence, DEFAULT_IDENTITY_PROPERTY)
    }

    /// Use an existing property of the object as its identity.
    pub fn property(name: impl Into<String>) -> Self {
        Self::new(IdGenerator::Property, name)
    }

    pub fn uuid(version: UuidVersion) -> Self {
        Self::new(IdGenerator::Uuid(version), DEFAULT_IDENTITY_PROPERTY)
    }

    pub fn custom<F>(property: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Object) -> Result<Value> + Send + Sync + 'static,
    {
        let generator: IdFn = Arc::new(f);
        Self::new(IdGenerator::Custom(generator), property)
    }

    /// Store the id under a different property name.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = property.into();
        self
    }
}
