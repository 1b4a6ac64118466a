//! Polymorphic type info declarations.

/// How the discriminator value is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeIdStrategy {
    /// The runtime class name.
    Class,
    /// A registered logical name (subtype table, then explicit type name).
    #[default]
    Name,
}

/// Where the discriminator goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypePlacement {
    /// Inline property of the object itself.
    Property(String),
    /// `{"<name>": {...}}`
    WrapperObject,
    /// `["<name>", {...}]`
    WrapperArray,
}

impl Default for TypePlacement {
    fn default() -> Self {
        TypePlacement::Property(DEFAULT_TYPE_PROPERTY.into())
    }
}

pub const DEFAULT_TYPE_PROPERTY: &str = "@type";

/// One entry of a subtype table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubType {
    pub name: String,
    pub class: String,
}

/// Type info policy declared on a (base) class.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeInfoSpec {
    pub strategy: TypeIdStrategy,
    pub placement: TypePlacement,
    pub subtypes: Vec<SubType>,
    /// Concrete class used when the discriminator is missing or unknown.
    pub default_impl: Option<String>,
}

impl TypeInfoSpec {
    pub fn new(strategy: TypeIdStrategy, placement: TypePlacement) -> Self {
        Self {
            strategy,
            placement,
            ..Default::default()
        }
    }

    pub fn subtype(mut self, name: impl Into<String>, class: impl Into<String>) -> Self {
        self.subtypes.push(SubType {
            name: name.into(),
            class: class.into(),
        });
        self
    }

    pub fn default_impl(mut self, class: impl Into<String>) -> Self {
        self.default_impl = Some(class.into());
        self
    }
}
