//! # Stringifier
//!
//! Depth-first walk from an in-memory [`Value`] to a `serde_json::Value`.
//!
//! For every value reached: global custom serializers run first (chained
//! in order), then scalars are written directly and objects go through the
//! object path:
//!
//! ```text
//! ignore-type ─▶ identity / cycle check ─▶ value accessor?
//!                                              │ no
//!                                              ▼
//!            replacement map (pipeline per key) ─▶ type info ─▶ root name
//! ```
//!
//! Two distinct cycle checks exist. The direct self-reference check fires
//! when a property holds its own object (gated by
//! `fail_on_self_references`, skipped for identity classes). The active
//! path check fires for any object met again while it is still being
//! expanded and has no identity to stand in for it.

pub mod pipeline;

use serde_json::{Map, Value as JsonValue};

use crate::config::{
    NanPolicy, NegativeInfinityPolicy, PositiveInfinityPolicy, SerializationFeatures, StringifyOptions,
    MAX_SAFE_INTEGER, MIN_SAFE_INTEGER,
};
use crate::identity::{self, IdSequence, IdentityTracker};
use crate::mapper::CustomSerializer;
use crate::meta::{ClassDescriptor, IdGenerator, IdentityInfo, MetadataStore, PropertyDescriptor, Unwrap};
use crate::model::{Object, ObjectRef, PropertyMap, Value};
use crate::resolver;
use crate::{Error, Result};

/// One stringify call. Holds the per-call identity state.
pub struct Stringifier<'a> {
    store: &'a MetadataStore,
    features: &'a SerializationFeatures,
    serializers: &'a [CustomSerializer],
    options: &'a StringifyOptions,
    ids: &'a IdSequence,
    tracker: IdentityTracker,
}

impl<'a> Stringifier<'a> {
    pub fn new(
        store: &'a MetadataStore,
        features: &'a SerializationFeatures,
        serializers: &'a [CustomSerializer],
        options: &'a StringifyOptions,
        ids: &'a IdSequence,
    ) -> Self {
        Self {
            store,
            features,
            serializers,
            options,
            ids,
            tracker: IdentityTracker::new(),
        }
    }

    pub fn run(mut self, root: &Value) -> Result<JsonValue> {
        self.write("", root.clone())
    }

    // ========================================================================
    // Values
    // ========================================================================

    fn write(&mut self, key: &str, value: Value) -> Result<JsonValue> {
        let value = self.apply_serializers(key, value)?;
        match value {
            Value::Null => Ok(JsonValue::Null),
            Value::Bool(b) => Ok(JsonValue::Bool(b)),
            Value::Int(i) => Ok(JsonValue::from(i)),
            Value::Float(f) => self.write_float(f),
            Value::String(s) => Ok(JsonValue::String(s)),
            Value::Date(d) => Ok(if self.features.write_dates_as_timestamps {
                JsonValue::from(d.timestamp_millis())
            } else {
                JsonValue::String(d.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            }),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    out.push(self.write(&index.to_string(), item)?);
                }
                Ok(JsonValue::Array(out))
            }
            Value::Map(map) => self.write_map(map),
            Value::Object(object) => self.write_object(key, &object),
        }
    }

    /// Matching serializers chain: each sees the previous one's output.
    fn apply_serializers(&self, key: &str, mut value: Value) -> Result<Value> {
        for serializer in self.serializers {
            if serializer.target.matches_value(&value) {
                value = serializer.apply(key, value)?;
            }
        }
        Ok(value)
    }

    fn write_float(&self, f: f64) -> Result<JsonValue> {
        if f.is_finite() {
            return Ok(JsonValue::from(f));
        }
        let invalid = || Error::Validation(format!("{} is not a valid JSON number", Value::Float(f)));
        if f.is_nan() {
            return match self.features.nan {
                NanPolicy::Null => Ok(JsonValue::Null),
                NanPolicy::Zero => Ok(JsonValue::from(0)),
                NanPolicy::Error => Err(invalid()),
            };
        }
        if f > 0.0 {
            match self.features.positive_infinity {
                PositiveInfinityPolicy::Null => Ok(JsonValue::Null),
                PositiveInfinityPolicy::MaxSafeInteger => Ok(JsonValue::from(MAX_SAFE_INTEGER)),
                PositiveInfinityPolicy::MaxValue => Ok(JsonValue::from(f64::MAX)),
                PositiveInfinityPolicy::Error => Err(invalid()),
            }
        } else {
            match self.features.negative_infinity {
                NegativeInfinityPolicy::Null => Ok(JsonValue::Null),
                NegativeInfinityPolicy::MinSafeInteger => Ok(JsonValue::from(MIN_SAFE_INTEGER)),
                NegativeInfinityPolicy::MinValue => Ok(JsonValue::from(f64::MIN)),
                NegativeInfinityPolicy::Error => Err(invalid()),
            }
        }
    }

    fn write_map(&mut self, mut map: PropertyMap) -> Result<JsonValue> {
        if self.features.order_map_entries_by_keys {
            map.sort_keys();
        }
        let mut out = Map::with_capacity(map.len());
        for (key, value) in map {
            let json = self.write(&key, value)?;
            out.insert(key, json);
        }
        Ok(JsonValue::Object(out))
    }

    // ========================================================================
    // Objects
    // ========================================================================

    fn write_object(&mut self, key: &str, object: &ObjectRef) -> Result<JsonValue> {
        let store = self.store;
        let class = object.class();
        let fallback;
        let desc = match store.class(&class) {
            Some(desc) => desc,
            None => {
                fallback = ClassDescriptor::new(class.as_str());
                &fallback
            }
        };

        if desc.ignore_type {
            return Ok(JsonValue::Null);
        }
        if let Some(id) = self.tracker.identity_of(object) {
            return Ok(id.clone());
        }
        if self.tracker.on_path(object) {
            return Err(Error::InfiniteRecursion {
                key: key.to_string(),
                class,
            });
        }

        if !self.tracker.seen(object) {
            let id = match &desc.identity {
                Some(info) => self.assign_identity(object, info)?,
                None => None,
            };
            self.tracker.record(object, id);
        }

        self.tracker.enter(object);
        let out = self.expand(object, desc);
        self.tracker.leave(object);
        out
    }

    /// Compute the identity on first visit and store it on the object.
    fn assign_identity(&self, object: &ObjectRef, info: &IdentityInfo) -> Result<Option<JsonValue>> {
        let id = identity::generate(info, &object.read(), self.ids)?;
        if !matches!(info.generator, IdGenerator::Property) {
            object.set(info.property.clone(), id.clone());
        }
        if id.is_null() {
            return Ok(None);
        }
        let json = identity::id_to_json(&id)?;
        tracing::debug!(class = %object.class(), property = %info.property, id = %json, "identity assigned");
        Ok(Some(json))
    }

    fn expand(&mut self, object: &ObjectRef, desc: &ClassDescriptor) -> Result<JsonValue> {
        let snapshot = object.snapshot();
        if let Some(accessor) = &desc.value_accessor {
            let computed = accessor(&snapshot)?;
            return self.write("", computed);
        }

        let fields = self.replacement(object, &snapshot, desc)?;
        let node = resolver::wrap(self.store, &desc.name, JsonValue::Object(fields));
        Ok(match &desc.root_name {
            Some(root) => {
                let mut wrapped = Map::with_capacity(1);
                wrapped.insert(root.clone(), node);
                JsonValue::Object(wrapped)
            }
            None => node,
        })
    }

    /// The replacement map of one object.
    fn replacement(
        &mut self,
        object: &ObjectRef,
        snapshot: &Object,
        desc: &ClassDescriptor,
    ) -> Result<Map<String, JsonValue>> {
        let store = self.store;
        let view = self.options.with_view.as_deref();
        let mut out = Map::new();

        for key in pipeline::ordered_keys(desc, snapshot, self.features.sort_properties_alphabetically) {
            let prop = desc.property_named(&key);
            if !pipeline::is_visible(store, desc, prop, &key, view) {
                continue;
            }
            let value = match prop.and_then(|p| p.getter.as_ref()) {
                Some(getter) => getter(snapshot)?,
                None => snapshot.get(&key).cloned().unwrap_or(Value::Null),
            };
            if pipeline::is_excluded(desc, prop, &value) {
                continue;
            }
            if let Value::Object(child) = &value {
                if child.ptr_eq(object) && desc.identity.is_none() && self.features.fail_on_self_references {
                    return Err(Error::Cycle {
                        class: desc.name.clone(),
                        property: key,
                    });
                }
            }

            let value = match prop {
                Some(prop) => pipeline::transform(self.store, prop, value)?,
                None => value,
            };

            if let Some(any) = &desc.any_getter {
                if any.property == key {
                    let entries = match &any.accessor {
                        Some(accessor) => accessor(snapshot)?,
                        None => value,
                    };
                    self.flatten_any_getter(desc, entries, &mut out)?;
                    continue;
                }
            }

            match prop {
                Some(prop) => match &prop.unwrapped {
                    Some(unwrap) => self.flatten_unwrapped(desc, prop, unwrap, value, &mut out)?,
                    None => {
                        let wire = prop.wire_name().to_string();
                        let json = self.write(&wire, value)?;
                        out.insert(wire, json);
                    }
                },
                None => {
                    let json = self.write(&key, value)?;
                    out.insert(key, json);
                }
            }
        }
        Ok(out)
    }

    /// Merge map (or object) entries into the owner, minus ignored names.
    fn flatten_any_getter(
        &mut self,
        desc: &ClassDescriptor,
        entries: Value,
        out: &mut Map<String, JsonValue>,
    ) -> Result<()> {
        let entries: Vec<(String, Value)> = match entries {
            Value::Null => return Ok(()),
            Value::Map(map) => map.into_iter().collect(),
            Value::Object(o) => o.snapshot().properties.into_iter().collect(),
            other => {
                return Err(Error::Validation(format!(
                    "any-getter of \"{}\" must produce a map, got {}",
                    desc.name,
                    other.type_name()
                )));
            }
        };
        for (key, value) in entries {
            if pipeline::hides_any_entry(desc, &key) {
                continue;
            }
            let json = self.write(&key, value)?;
            out.insert(key, json);
        }
        Ok(())
    }

    /// Merge a nested object's replacement map into the owner with
    /// prefixed/suffixed keys.
    fn flatten_unwrapped(
        &mut self,
        desc: &ClassDescriptor,
        prop: &PropertyDescriptor,
        unwrap: &Unwrap,
        value: Value,
        out: &mut Map<String, JsonValue>,
    ) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Object(nested) => {
                let store = self.store;
                let class = nested.class();
                if self.features.fail_on_unwrapped_type_identifiers && store.type_info_owner(&class).is_some() {
                    return Err(Error::UnwrapTypeConflict {
                        class: desc.name.clone(),
                        property: prop.name.clone(),
                    });
                }
                if self.tracker.on_path(&nested) {
                    return Err(Error::InfiniteRecursion {
                        key: prop.name.clone(),
                        class,
                    });
                }
                let fallback;
                let nested_desc = match store.class(&class) {
                    Some(d) => d,
                    None => {
                        fallback = ClassDescriptor::new(class.as_str());
                        &fallback
                    }
                };
                let snapshot = nested.snapshot();
                self.tracker.enter(&nested);
                let fields = self.replacement(&nested, &snapshot, nested_desc);
                self.tracker.leave(&nested);
                for (key, json) in fields? {
                    out.insert(unwrap.wrap_key(&key), json);
                }
                Ok(())
            }
            Value::Map(map) => {
                for (key, value) in map {
                    let json = self.write(&key, value)?;
                    out.insert(unwrap.wrap_key(&key), json);
                }
                Ok(())
            }
            other => Err(Error::Validation(format!(
                "unwrapped property {}[\"{}\"] holds a {}, not an object",
                desc.name,
                prop.name,
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Include, PropertyDescriptor};
    use crate::model::ValueKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(store: &MetadataStore, features: &SerializationFeatures, value: &Value) -> Result<JsonValue> {
        let options = StringifyOptions::default();
        let ids = IdSequence::new();
        Stringifier::new(store, features, &[], &options, &ids).run(value)
    }

    #[test]
    fn test_self_reference_checks_are_distinct() {
        let store = MetadataStore::builder()
            .register(ClassDescriptor::new("User").property(PropertyDescriptor::new("userRef").kind(ValueKind::object("User"))))
            .build()
            .unwrap();
        let user = Object::new("User").with_property("name", "John").into_ref();
        user.set("userRef", Value::Object(user.clone()));
        let root = Value::Object(user.clone());

        let strict = SerializationFeatures::default();
        assert!(matches!(run(&store, &strict, &root), Err(Error::Cycle { .. })));

        let lenient = SerializationFeatures {
            fail_on_self_references: false,
            ..Default::default()
        };
        assert!(matches!(run(&store, &lenient, &root), Err(Error::InfiniteRecursion { .. })));
        user.set("userRef", Value::Null);
    }

    #[test]
    fn test_shared_objects_without_identity_are_expanded_twice() {
        let store = MetadataStore::default();
        let tag = Value::from(Object::new("Tag").with_property("name", "rust"));
        let root = Value::from(vec![tag.clone(), tag]);
        let out = run(&store, &SerializationFeatures::default(), &root).unwrap();
        assert_eq!(out, json!([{"name": "rust"}, {"name": "rust"}]));
    }

    #[test]
    fn test_non_finite_number_policies() {
        let store = MetadataStore::default();
        let features = SerializationFeatures {
            nan: NanPolicy::Zero,
            positive_infinity: PositiveInfinityPolicy::MaxSafeInteger,
            negative_infinity: NegativeInfinityPolicy::Error,
            ..Default::default()
        };
        assert_eq!(run(&store, &features, &Value::Float(f64::NAN)).unwrap(), json!(0));
        assert_eq!(run(&store, &features, &Value::Float(f64::INFINITY)).unwrap(), json!(MAX_SAFE_INTEGER));
        assert!(run(&store, &features, &Value::Float(f64::NEG_INFINITY)).is_err());
        assert_eq!(
            run(&store, &SerializationFeatures::default(), &Value::Float(f64::NAN)).unwrap(),
            JsonValue::Null
        );
    }

    #[test]
    fn test_include_non_null() {
        let store = MetadataStore::builder()
            .register(ClassDescriptor::new("User").property(PropertyDescriptor::new("email").include(Include::NonNull)))
            .build()
            .unwrap();
        let user = Value::from(Object::new("User").with_property("name", "John").with_property("email", Value::Null));
        assert_eq!(run(&store, &SerializationFeatures::default(), &user).unwrap(), json!({"name": "John"}));
    }
}
