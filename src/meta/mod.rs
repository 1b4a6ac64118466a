//! # Metadata Store
//!
//! The read-only descriptor table the engine consults. Descriptors are
//! registered once through [`MetadataStoreBuilder`], validated, flattened
//! along the inheritance chain, and then shared immutably (typically as
//! `Arc<MetadataStore>`). Nothing here changes during a traversal.
//!
//! ```rust
//! use jackson_rs::meta::{ClassDescriptor, MetadataStore, PropertyDescriptor};
//! use jackson_rs::ValueKind;
//!
//! let store = MetadataStore::builder()
//!     .register(
//!         ClassDescriptor::new("Book")
//!             .property(PropertyDescriptor::new("id").kind(ValueKind::Int))
//!             .property(PropertyDescriptor::new("title").kind(ValueKind::String)),
//!     )
//!     .build()
//!     .unwrap();
//! assert!(store.class("Book").is_some());
//! ```

pub mod class;
pub mod format;
pub mod identity;
pub mod property;
pub mod type_info;

use hashbrown::{HashMap, HashSet};

pub use class::{AnyGetter, ClassDescriptor, Creator, CreatorFn, CreatorMode, IgnoreProperties, PropertyOrder};
pub use format::{FormatSpec, Shape};
pub use identity::{IdFn, IdGenerator, IdentityInfo, UuidVersion, DEFAULT_IDENTITY_PROPERTY};
pub use property::{
    Access, Getter, Include, PropertyDescriptor, ReferenceRole, Setter, Unwrap, ValueHook,
    DEFAULT_REFERENCE,
};
pub use type_info::{SubType, TypeIdStrategy, TypeInfoSpec, TypePlacement, DEFAULT_TYPE_PROPERTY};

use crate::model::ValueKind;
use crate::{Error, Result};

// ============================================================================
// MetadataStore
// ============================================================================

/// Immutable, type-indexed descriptor table.
#[derive(Debug, Default)]
pub struct MetadataStore {
    classes: HashMap<String, ClassDescriptor>,
    /// view → the view it extends
    views: HashMap<String, Option<String>>,
}

impl MetadataStore {
    pub fn builder() -> MetadataStoreBuilder {
        MetadataStoreBuilder::default()
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    /// Like [`class`](Self::class) but an unknown class is an error.
    pub fn require(&self, name: &str) -> Result<&ClassDescriptor> {
        self.classes
            .get(name)
            .ok_or_else(|| Error::TypeResolution(format!("class \"{name}\" is not registered")))
    }

    /// The class itself followed by its ancestors, nearest first.
    pub fn ancestors<'a>(&'a self, name: &str) -> Vec<&'a ClassDescriptor> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(name);
        while let Some(desc) = current {
            chain.push(desc);
            current = desc.parent.as_deref().and_then(|p| self.classes.get(p));
        }
        chain
    }

    /// `class` is `target` or extends it.
    pub fn is_assignable(&self, class: &str, target: &str) -> bool {
        class == target || self.ancestors(class).iter().any(|d| d.name == target)
    }

    /// Nearest class in the chain that declares type info.
    pub fn type_info_owner(&self, class: &str) -> Option<&ClassDescriptor> {
        self.ancestors(class).into_iter().find(|d| d.type_info.is_some())
    }

    /// A property declared for `declared` is visible under the `active` view.
    pub fn view_matches(&self, declared: &str, active: &str) -> bool {
        let mut current = Some(declared);
        let mut hops = 0;
        while let Some(view) = current {
            if view == active {
                return true;
            }
            hops += 1;
            if hops > self.views.len() {
                break;
            }
            current = self.views.get(view).and_then(|p| p.as_deref());
        }
        false
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ============================================================================
// Builder / registration-time validation
// ============================================================================

#[derive(Debug, Default)]
pub struct MetadataStoreBuilder {
    classes: Vec<ClassDescriptor>,
    views: Vec<(String, Option<String>)>,
}

impl MetadataStoreBuilder {
    pub fn register(mut self, class: ClassDescriptor) -> Self {
        self.classes.push(class);
        self
    }

    /// Declare a root view marker.
    pub fn view(mut self, name: impl Into<String>) -> Self {
        self.views.push((name.into(), None));
        self
    }

    /// Declare a view marker extending `parent`.
    pub fn view_extends(mut self, name: impl Into<String>, parent: impl Into<String>) -> Self {
        self.views.push((name.into(), Some(parent.into())));
        self
    }

    /// Validate and freeze the table.
    pub fn build(self) -> Result<MetadataStore> {
        let mut raw: HashMap<String, ClassDescriptor> = HashMap::with_capacity(self.classes.len());
        for class in self.classes {
            check_own_properties(&class)?;
            if raw.contains_key(&class.name) {
                return Err(Error::Registration(format!("class \"{}\" registered twice", class.name)));
            }
            raw.insert(class.name.clone(), class);
        }

        let mut views = HashMap::new();
        for (name, parent) in self.views {
            if views.insert(name.clone(), parent).is_some() {
                return Err(Error::Registration(format!("view \"{name}\" registered twice")));
            }
        }
        for (name, parent) in &views {
            if let Some(parent) = parent {
                if !views.contains_key(parent) {
                    return Err(Error::Registration(format!(
                        "view \"{name}\" extends unknown view \"{parent}\""
                    )));
                }
            }
        }

        let mut classes = HashMap::with_capacity(raw.len());
        for name in raw.keys() {
            let chain = inheritance_chain(&raw, name)?;
            classes.insert(name.clone(), flatten(&chain));
        }

        let store = MetadataStore { classes, views };
        for class in store.classes.values() {
            check_back_references(class)?;
            check_unwrapped(class)?;
            if let Some(spec) = &class.type_info {
                check_subtypes(&store, class, spec)?;
            }
        }
        tracing::debug!(classes = store.classes.len(), views = store.views.len(), "metadata store built");
        Ok(store)
    }
}

fn check_own_properties(class: &ClassDescriptor) -> Result<()> {
    let mut seen = HashSet::new();
    for prop in &class.properties {
        if !seen.insert(prop.name.as_str()) {
            return Err(Error::Registration(format!(
                "property \"{}\" declared twice on \"{}\"",
                prop.name, class.name
            )));
        }
    }
    Ok(())
}

/// Self first, root last.
fn inheritance_chain<'a>(
    raw: &'a HashMap<String, ClassDescriptor>,
    name: &str,
) -> Result<Vec<&'a ClassDescriptor>> {
    let mut chain: Vec<&ClassDescriptor> = Vec::new();
    let mut current = raw.get(name);
    while let Some(desc) = current {
        if chain.iter().any(|d| d.name == desc.name) {
            return Err(Error::Registration(format!("inheritance cycle through \"{}\"", desc.name)));
        }
        chain.push(desc);
        current = match &desc.parent {
            Some(parent) => Some(raw.get(parent).ok_or_else(|| {
                Error::Registration(format!("\"{}\" extends unknown class \"{parent}\"", desc.name))
            })?),
            None => None,
        };
    }
    Ok(chain)
}

/// Merge inherited properties (ancestors first, redeclared names replaced in
/// place) and inherit the identity policy when the class declares none.
fn flatten(chain: &[&ClassDescriptor]) -> ClassDescriptor {
    let mut out = chain[0].clone();
    let mut properties: Vec<PropertyDescriptor> = Vec::new();
    for desc in chain.iter().rev() {
        for prop in &desc.properties {
            match properties.iter_mut().find(|p| p.name == prop.name) {
                Some(existing) => *existing = prop.clone(),
                None => properties.push(prop.clone()),
            }
        }
    }
    out.properties = properties;
    if out.identity.is_none() {
        out.identity = chain.iter().find_map(|d| d.identity.clone());
    }
    out
}

fn check_back_references(class: &ClassDescriptor) -> Result<()> {
    let mut names = HashSet::new();
    for prop in &class.properties {
        if let ReferenceRole::Back(name) = &prop.reference {
            if !names.insert(name.as_str()) {
                return Err(Error::Registration(format!(
                    "multiple back-reference properties with name \"{name}\" at {}[\"{}\"]",
                    class.name, prop.name
                )));
            }
        }
    }
    Ok(())
}

fn check_unwrapped(class: &ClassDescriptor) -> Result<()> {
    for prop in class.properties.iter().filter(|p| p.unwrapped.is_some()) {
        if !matches!(prop.kind, ValueKind::Object(_) | ValueKind::Any) {
            return Err(Error::Registration(format!(
                "unwrapped property {}[\"{}\"] must hold an object, not {}",
                class.name, prop.name, prop.kind
            )));
        }
    }
    Ok(())
}

fn check_subtypes(store: &MetadataStore, class: &ClassDescriptor, spec: &TypeInfoSpec) -> Result<()> {
    let mut names = HashSet::new();
    let mut targets = HashSet::new();
    for sub in &spec.subtypes {
        if store.class(&sub.class).is_none() {
            return Err(Error::Registration(format!(
                "subtype \"{}\" of \"{}\" names unknown class \"{}\"",
                sub.name, class.name, sub.class
            )));
        }
        if !names.insert(sub.name.as_str()) {
            return Err(Error::Registration(format!(
                "ambiguous subtype name \"{}\" on \"{}\"",
                sub.name, class.name
            )));
        }
        if !targets.insert(sub.class.as_str()) {
            return Err(Error::Registration(format!(
                "class \"{}\" appears twice in the subtype table of \"{}\"",
                sub.class, class.name
            )));
        }
    }
    if let Some(default) = &spec.default_impl {
        if store.class(default).is_none() {
            return Err(Error::Registration(format!(
                "default implementation \"{default}\" of \"{}\" is not registered",
                class.name
            )));
        }
    }
    Ok(())
}
