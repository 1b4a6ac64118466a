//! Object instances in the graph.
//!
//! An [`Object`] is a class name plus its own fields. Graph edges are
//! [`ObjectRef`] handles: cloning a handle shares the instance, and two
//! handles are "the same object" exactly when they point at the same
//! allocation.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{PropertyMap, Value};

/// A class instance: its logical type name and its own fields.
#[derive(Debug, Clone, Default)]
pub struct Object {
    pub class: String,
    pub properties: PropertyMap,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key, value.into());
    }

    pub fn is_instance_of(&self, class: &str) -> bool {
        self.class == class
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> ObjectRef {
        ObjectRef::new(self)
    }
}

/// Shared handle to an [`Object`] with pointer identity.
///
/// Locks are only ever held for a single read or write; the engine takes a
/// snapshot of the fields before recursing so that self references and
/// cycles never re-enter a held lock.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl ObjectRef {
    pub fn new(object: Object) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Object> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Object> {
        self.0.write()
    }

    /// Identity comparison, not structural.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address used as the identity key inside one traversal.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn class(&self) -> String {
        self.0.read().class.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().properties.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.write().properties.insert(key, value.into());
    }

    /// Clone of the fields as they are right now.
    pub fn snapshot(&self) -> Object {
        self.0.read().clone()
    }

    /// Replace the instance contents in place, keeping the identity.
    pub fn replace(&self, object: Object) {
        *self.0.write() = object;
    }
}

impl From<Object> for ObjectRef {
    fn from(object: Object) -> Self {
        ObjectRef::new(object)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(ObjectRef::new(object))
    }
}

/// Shallow: prints the class and address, never the fields, so cyclic
/// graphs can be debug-printed.
impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Some(obj) => write!(f, "{}@{:#x}", obj.class, self.addr()),
            None => write!(f, "<locked>@{:#x}", self.addr()),
        }
    }
}
