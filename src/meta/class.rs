//! Class-level descriptors.

use std::fmt;
use std::sync::Arc;

use super::{Getter, Include, IdentityInfo, PropertyDescriptor, TypeInfoSpec};
use crate::model::{Object, Value, ValueKind};
use crate::Result;

/// Builds an instance from creator arguments.
pub type CreatorFn = Arc<dyn Fn(Vec<Value>) -> Result<Object> + Send + Sync>;

/// Property ordering policy for serialized objects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropertyOrder {
    /// Object field order.
    #[default]
    Declared,
    Alphabetic,
    /// Listed names first, remaining keys after in their original order.
    Explicit(Vec<String>),
}

/// Class-level ignore list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IgnoreProperties {
    /// Field or wire names to ignore.
    pub names: Vec<String>,
    /// Still serialize the listed names.
    pub allow_getters: bool,
    /// Still accept the listed names on input.
    pub allow_setters: bool,
    /// Drop unknown keys on input instead of failing.
    pub ignore_unknown: bool,
}

/// Accessor whose map is flattened into the owning object.
#[derive(Clone)]
pub struct AnyGetter {
    /// The property the flattened entries replace.
    pub property: String,
    /// Computes the entries; the property value itself is used when absent.
    pub accessor: Option<Getter>,
}

/// How a creator receives its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatorMode {
    /// Named properties, in argument order.
    Properties(Vec<String>),
    /// The whole decoded value as the single argument.
    Delegating(ValueKind),
}

/// Factory used instead of field-by-field construction.
#[derive(Clone)]
pub struct Creator {
    pub mode: CreatorMode,
    pub factory: CreatorFn,
}

/// Everything the engine knows about one class.
#[derive(Clone, Default)]
pub struct ClassDescriptor {
    pub name: String,
    pub parent: Option<String>,
    pub properties: Vec<PropertyDescriptor>,
    pub root_name: Option<String>,
    pub order: PropertyOrder,
    pub identity: Option<IdentityInfo>,
    pub type_info: Option<TypeInfoSpec>,
    pub type_name: Option<String>,
    pub ignore_type: bool,
    pub ignore_properties: Option<IgnoreProperties>,
    pub include: Option<Include>,
    pub value_accessor: Option<Getter>,
    pub any_getter: Option<AnyGetter>,
    /// Map-valued field collecting unknown keys on input.
    pub any_setter: Option<String>,
    pub creator: Option<Creator>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn property_named(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Property answering to a wire key (wire name first, then aliases).
    pub fn property_for_wire(&self, key: &str) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|p| p.wire_name() == key)
            .or_else(|| self.properties.iter().find(|p| p.answers_to(key)))
    }

    /// Whether the class ignore list suppresses `prop` in one direction.
    pub fn ignore_list_hides(&self, prop: &PropertyDescriptor, serializing: bool) -> bool {
        let Some(ignore) = &self.ignore_properties else {
            return false;
        };
        if (serializing && ignore.allow_getters) || (!serializing && ignore.allow_setters) {
            return false;
        }
        ignore
            .names
            .iter()
            .any(|n| *n == prop.name || n == prop.wire_name())
    }

    /// Same check for a bare key with no descriptor.
    pub fn ignore_list_hides_key(&self, key: &str, serializing: bool) -> bool {
        match &self.ignore_properties {
            Some(ignore) if !(serializing && ignore.allow_getters) && !(!serializing && ignore.allow_setters) => {
                ignore.names.iter().any(|n| n == key)
            }
            _ => false,
        }
    }

    pub fn ignores_unknown(&self) -> bool {
        self.ignore_properties.as_ref().is_some_and(|i| i.ignore_unknown)
    }

    // ------------------------------------------------------------------
    // Builder
    // ------------------------------------------------------------------

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = Some(name.into());
        self
    }

    pub fn order(mut self, order: PropertyOrder) -> Self {
        self.order = order;
        self
    }

    pub fn identity(mut self, identity: IdentityInfo) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn type_info(mut self, spec: TypeInfoSpec) -> Self {
        self.type_info = Some(spec);
        self
    }

    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    pub fn ignore_type(mut self) -> Self {
        self.ignore_type = true;
        self
    }

    pub fn ignore_properties(mut self, ignore: IgnoreProperties) -> Self {
        self.ignore_properties = Some(ignore);
        self
    }

    /// Class-wide inclusion rule; a property's own rule wins.
    pub fn include(mut self, include: Include) -> Self {
        self.include = Some(include);
        self
    }

    pub fn value_accessor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Object) -> Result<Value> + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(f);
        self.value_accessor = Some(getter);
        self
    }

    /// Flatten the named property's entries into the object.
    pub fn any_getter(mut self, property: impl Into<String>) -> Self {
        self.any_getter = Some(AnyGetter {
            property: property.into(),
            accessor: None,
        });
        self
    }

    /// Flatten the entries computed by `f` in place of the named property.
    pub fn any_getter_with<F>(mut self, property: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Object) -> Result<Value> + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(f);
        self.any_getter = Some(AnyGetter {
            property: property.into(),
            accessor: Some(getter),
        });
        self
    }

    pub fn any_setter(mut self, property: impl Into<String>) -> Self {
        self.any_setter = Some(property.into());
        self
    }

    pub fn creator<F>(mut self, mode: CreatorMode, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Object> + Send + Sync + 'static,
    {
        let factory: CreatorFn = Arc::new(f);
        self.creator = Some(Creator { mode, factory });
        self
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("properties", &self.properties)
            .field("root_name", &self.root_name)
            .field("order", &self.order)
            .field("identity", &self.identity)
            .field("type_info", &self.type_info)
            .field("type_name", &self.type_name)
            .field("ignore_type", &self.ignore_type)
            .field("ignore_properties", &self.ignore_properties)
            .field("include", &self.include)
            .field("any_setter", &self.any_setter)
            .finish_non_exhaustive()
    }
}
