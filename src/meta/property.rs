//! Per-property descriptors.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::FormatSpec;
use crate::model::{Object, Value, ValueKind};
use crate::Result;

/// Property-level value rewrite (custom serializer or deserializer).
pub type ValueHook = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// No-argument accessor computing a value from the instance.
pub type Getter = Arc<dyn Fn(&Object) -> Result<Value> + Send + Sync>;

/// Mutator receiving the decoded value for a property.
pub type Setter = Arc<dyn Fn(&mut Object, Value) -> Result<()> + Send + Sync>;

/// Which directions a property participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Serialized, ignored on input.
    ReadOnly,
    /// Accepted on input, never serialized.
    WriteOnly,
    ReadWrite,
    #[default]
    Auto,
}

impl Access {
    pub fn readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    pub fn writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

/// Inclusion rule applied before a property is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Include {
    #[default]
    Always,
    NonNull,
    NonEmpty,
}

impl Include {
    /// Whether `value` is suppressed by this rule.
    pub fn excludes(self, value: &Value) -> bool {
        match self {
            Include::Always => false,
            Include::NonNull => value.is_null(),
            Include::NonEmpty => value.is_empty(),
        }
    }
}

/// Role of a property in a managed/back reference pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReferenceRole {
    #[default]
    None,
    /// Forward link, serialized normally.
    Managed(String),
    /// Back link, never written through its managed side.
    Back(String),
}

/// Default reference name when none is given.
pub const DEFAULT_REFERENCE: &str = "defaultReference";

/// Flatten a nested object into its container with a key prefix/suffix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unwrap {
    pub prefix: String,
    pub suffix: String,
}

impl Unwrap {
    pub fn wrap_key(&self, key: &str) -> String {
        format!("{}{}{}", self.prefix, key, self.suffix)
    }

    /// Recover the nested key from a flattened one.
    pub fn strip_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())
    }
}

/// Everything the engine knows about one property.
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    pub name: String,
    pub wire_name: Option<String>,
    pub aliases: Vec<String>,
    pub kind: ValueKind,
    pub access: Access,
    pub ignore: bool,
    pub include: Option<Include>,
    pub format: Option<FormatSpec>,
    pub raw_value: bool,
    pub serializer: Option<ValueHook>,
    pub deserializer: Option<ValueHook>,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
    pub views: SmallVec<[String; 2]>,
    pub unwrapped: Option<Unwrap>,
    pub reference: ReferenceRole,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Name used on the wire.
    pub fn wire_name(&self) -> &str {
        self.wire_name.as_deref().unwrap_or(&self.name)
    }

    /// True when `key` is this property's wire name or one of its aliases.
    pub fn answers_to(&self, key: &str) -> bool {
        self.wire_name() == key || self.aliases.iter().any(|a| a == key)
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn rename(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = Some(wire_name.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include = Some(include);
        self
    }

    pub fn format(mut self, format: FormatSpec) -> Self {
        self.format = Some(format);
        self
    }

    pub fn raw_value(mut self) -> Self {
        self.raw_value = true;
        self
    }

    pub fn serialize_with<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        let hook: ValueHook = Arc::new(f);
        self.serializer = Some(hook);
        self
    }

    pub fn deserialize_with<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        let hook: ValueHook = Arc::new(f);
        self.deserializer = Some(hook);
        self
    }

    /// Computed property: the getter supplies the serialized value.
    pub fn getter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Object) -> Result<Value> + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(f);
        self.getter = Some(getter);
        self
    }

    pub fn setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Object, Value) -> Result<()> + Send + Sync + 'static,
    {
        let setter: Setter = Arc::new(f);
        self.setter = Some(setter);
        self
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.views.push(view.into());
        self
    }

    pub fn unwrapped(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.unwrapped = Some(Unwrap {
            prefix: prefix.into(),
            suffix: suffix.into(),
        });
        self
    }

    pub fn managed_reference(mut self, name: impl Into<String>) -> Self {
        self.reference = ReferenceRole::Managed(name.into());
        self
    }

    pub fn back_reference(mut self, name: impl Into<String>) -> Self {
        self.reference = ReferenceRole::Back(name.into());
        self
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("wire_name", &self.wire_name)
            .field("kind", &self.kind)
            .field("access", &self.access)
            .field("ignore", &self.ignore)
            .field("include", &self.include)
            .field("format", &self.format)
            .field("raw_value", &self.raw_value)
            .field("views", &self.views)
            .field("unwrapped", &self.unwrapped)
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}
