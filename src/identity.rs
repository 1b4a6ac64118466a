//! # Identity Tracker
//!
//! Three pieces of identity bookkeeping:
//!
//! - [`IdSequence`]: the one process-wide mutable counter. It lives from
//!   first use to process exit and hands out unique integers to any number
//!   of concurrent calls. Tests and embedders can inject their own.
//! - [`IdentityTracker`]: serialize side. Records every object met in one
//!   traversal together with its identity value, plus the objects on the
//!   active path.
//! - [`IdentityTable`]: deserialize side. Maps identity values to the
//!   instances built for them, with placeholders for forward references.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use hashbrown::HashMap;
use serde_json::Value as JsonValue;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::meta::{IdGenerator, IdentityInfo, UuidVersion};
use crate::model::{Object, ObjectRef, Value};
use crate::{Error, Result};

// ============================================================================
// IdSequence
// ============================================================================

static GLOBAL: LazyLock<Arc<IdSequence>> = LazyLock::new(|| Arc::new(IdSequence::new()));

/// Monotonic integer source for `IntSequence` identities.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU64,
}

impl IdSequence {
    /// A fresh sequence whose first id is 1.
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// The shared process-wide sequence.
    pub fn global() -> Arc<IdSequence> {
        Arc::clone(&GLOBAL)
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Identity value for `object` under `info`.
///
/// `Property` reads the object's own identity property; every other
/// generator produces a new value that the caller writes back onto the
/// object.
pub fn generate(info: &IdentityInfo, object: &Object, ids: &IdSequence) -> Result<Value> {
    match &info.generator {
        IdGenerator::IntSequence => {
            let id = ids.next();
            i64::try_from(id)
                .map(Value::Int)
                .map_err(|_| Error::Validation(format!("id sequence exhausted at {id}")))
        }
        IdGenerator::Property => Ok(object.get(&info.property).cloned().unwrap_or(Value::Null)),
        IdGenerator::Uuid(version) => Ok(Value::String(uuid_for(version).to_string())),
        IdGenerator::None => Ok(Value::Null),
        IdGenerator::Custom(f) => f(object),
    }
}

fn uuid_for(version: &UuidVersion) -> Uuid {
    match version {
        UuidVersion::V1 { node_id } => Uuid::now_v1(node_id),
        UuidVersion::V3 { namespace, name } => Uuid::new_v3(namespace, name.as_bytes()),
        UuidVersion::V4 => Uuid::new_v4(),
        UuidVersion::V5 { namespace, name } => Uuid::new_v5(namespace, name.as_bytes()),
    }
}

/// Identity values are written as bare JSON scalars.
pub fn id_to_json(id: &Value) -> Result<JsonValue> {
    match id {
        Value::Int(i) => Ok(JsonValue::from(*i)),
        Value::Float(f) if f.is_finite() => Ok(JsonValue::from(*f)),
        Value::String(s) => Ok(JsonValue::String(s.clone())),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Date(d) => Ok(JsonValue::from(d.timestamp_millis())),
        other => Err(Error::Validation(format!(
            "identity value must be a scalar, got {}",
            other.type_name()
        ))),
    }
}

// ============================================================================
// Serialize side
// ============================================================================

/// IdentityRecord and SeenSet of one stringify call.
#[derive(Debug, Default)]
pub struct IdentityTracker {
    /// addr → (handle kept alive so the address stays unique, identity)
    record: HashMap<usize, (ObjectRef, Option<JsonValue>)>,
    path: SmallVec<[usize; 16]>,
}

impl IdentityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded identity of an object seen earlier in this call.
    pub fn identity_of(&self, object: &ObjectRef) -> Option<&JsonValue> {
        self.record.get(&object.addr()).and_then(|(_, id)| id.as_ref())
    }

    pub fn seen(&self, object: &ObjectRef) -> bool {
        self.record.contains_key(&object.addr())
    }

    pub fn on_path(&self, object: &ObjectRef) -> bool {
        self.path.contains(&object.addr())
    }

    /// First sighting; the identity is fixed from here on.
    pub fn record(&mut self, object: &ObjectRef, identity: Option<JsonValue>) {
        self.record
            .entry(object.addr())
            .or_insert_with(|| (object.clone(), identity));
    }

    pub fn enter(&mut self, object: &ObjectRef) {
        self.path.push(object.addr());
    }

    pub fn leave(&mut self, object: &ObjectRef) {
        if let Some(pos) = self.path.iter().rposition(|a| *a == object.addr()) {
            self.path.remove(pos);
        }
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

// ============================================================================
// Deserialize side
// ============================================================================

#[derive(Debug)]
struct Slot {
    object: ObjectRef,
    /// The object itself has been read, not just referenced.
    defined: bool,
}

/// Identity value → instance, for one parse call.
#[derive(Debug, Default)]
pub struct IdentityTable {
    slots: HashMap<String, Slot>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compact JSON text of the id, so `1` and `"1"` stay distinct.
    fn key(id: &JsonValue) -> String {
        id.to_string()
    }

    /// Handle for a referenced id; a placeholder of `class` if the object
    /// has not been read yet.
    pub fn reference(&mut self, id: &JsonValue, class: &str) -> ObjectRef {
        let key = Self::key(id);
        self.slots
            .entry(key)
            .or_insert_with(|| {
                tracing::trace!(id = %id, class, "forward identity reference");
                Slot {
                    object: ObjectRef::new(Object::new(class)),
                    defined: false,
                }
            })
            .object
            .clone()
    }

    /// Handle the object with this id is built into. Registered before the
    /// object's fields are read so nested references resolve to it.
    pub fn define(&mut self, id: &JsonValue, class: &str) -> Result<ObjectRef> {
        let key = Self::key(id);
        match self.slots.get_mut(&key) {
            Some(slot) if slot.defined => Err(Error::Validation(format!(
                "already had an object for id {key}"
            ))),
            Some(slot) => {
                slot.defined = true;
                Ok(slot.object.clone())
            }
            None => {
                let object = ObjectRef::new(Object::new(class));
                self.slots.insert(
                    key,
                    Slot {
                        object: object.clone(),
                        defined: true,
                    },
                );
                Ok(object)
            }
        }
    }

    /// Ids referenced but never read, sorted.
    pub fn unresolved(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| !slot.defined)
            .map(|(key, _)| key.clone())
            .collect();
        ids.sort();
        ids
    }

    /// End of the call: fail on unresolved ids, or null every slot that
    /// still points at a placeholder.
    pub fn finish(&self, fail_on_unresolved: bool, built: &[ObjectRef], root: &mut Value) -> Result<()> {
        let unresolved = self.unresolved();
        if unresolved.is_empty() {
            return Ok(());
        }
        if fail_on_unresolved {
            return Err(Error::UnresolvedIdentity(unresolved.join(", ")));
        }
        let placeholders: Vec<&ObjectRef> = self
            .slots
            .values()
            .filter(|slot| !slot.defined)
            .map(|slot| &slot.object)
            .collect();
        tracing::debug!(ids = %unresolved.join(", "), "unresolved identities set to null");

        sweep(root, &placeholders);
        for object in built {
            let mut fields = object.snapshot().properties;
            let mut changed = false;
            for (_, value) in fields.iter_mut() {
                changed |= sweep(value, &placeholders);
            }
            if changed {
                object.write().properties = fields;
            }
        }
        Ok(())
    }
}

/// Replace placeholder handles inside `value` with null.
fn sweep(value: &mut Value, placeholders: &[&ObjectRef]) -> bool {
    match value {
        Value::Object(o) if placeholders.iter().any(|p| p.ptr_eq(o)) => {
            *value = Value::Null;
            true
        }
        Value::List(items) => items.iter_mut().fold(false, |acc, v| sweep(v, placeholders) | acc),
        Value::Map(map) => map
            .iter_mut()
            .fold(false, |acc, (_, v)| sweep(v, placeholders) | acc),
        _ => false,
    }
}
