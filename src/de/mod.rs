//! # Builder
//!
//! Rebuilds an in-memory graph from a `serde_json::Value`, guided by the
//! declared [`ValueKind`] of the target and of every property.
//!
//! Per object node, in order:
//!
//! 1. root-name unwrap
//! 2. identity reference: a bare scalar where an identity class is expected
//!    resolves through the [`IdentityTable`] (placeholder if not yet read)
//! 3. type info: strip the discriminator, resolve the concrete class
//! 4. delegating creator, or field-by-field construction: unwrapped keys
//!    regrouped, wire keys mapped back to properties, unknown keys routed to
//!    the any-setter / dropped / rejected, values built by declared kind
//! 5. the instance is stored into its (possibly pre-registered) handle
//!
//! Once the whole tree is read, every built object's managed children get
//! their back references. Then unresolved identities either fail the call
//! or are nulled out. A placeholder handed out for a forward reference has
//! its fields replaced when the real object is read, so attachment must
//! follow the whole read.

pub mod coerce;

use serde_json::{Map, Value as JsonValue};

use crate::config::{Features, ParseOptions};
use crate::identity::IdentityTable;
use crate::mapper::CustomDeserializer;
use crate::meta::{ClassDescriptor, CreatorMode, FormatSpec, MetadataStore, PropertyDescriptor, Shape};
use crate::model::{Object, ObjectRef, PropertyMap, Value, ValueKind};
use crate::ser::pipeline;
use crate::{reference, resolver};
use crate::{Error, Result};

use coerce::CoerceContext;

/// One parse call. Holds the per-call identity table.
pub struct Builder<'a> {
    store: &'a MetadataStore,
    features: &'a Features,
    deserializers: &'a [CustomDeserializer],
    options: &'a ParseOptions,
    identities: IdentityTable,
    /// Every object constructed so far, for back references and the
    /// unresolved-id sweep.
    built: Vec<ObjectRef>,
}

impl<'a> Builder<'a> {
    pub fn new(
        store: &'a MetadataStore,
        features: &'a Features,
        deserializers: &'a [CustomDeserializer],
        options: &'a ParseOptions,
    ) -> Self {
        Self {
            store,
            features,
            deserializers,
            options,
            identities: IdentityTable::new(),
            built: Vec::new(),
        }
    }

    pub fn run(mut self, tree: JsonValue, kind: &ValueKind) -> Result<Value> {
        let mut root = self.build("", tree, kind, None)?;
        for handle in &self.built {
            if let Some(desc) = self.store.class(&handle.class()) {
                reference::attach_back_references(self.store, desc, handle);
            }
        }
        self.identities.finish(
            self.features.deserialization.fail_on_unresolved_object_ids,
            &self.built,
            &mut root,
        )?;
        Ok(root)
    }

    // ========================================================================
    // Values
    // ========================================================================

    fn build(&mut self, key: &str, node: JsonValue, kind: &ValueKind, format: Option<&FormatSpec>) -> Result<Value> {
        let node = self.apply_deserializers(key, node, kind)?;
        self.build_node(key, node, kind, format)
    }

    /// Matching deserializers chain, in order.
    fn apply_deserializers(&self, key: &str, mut node: JsonValue, kind: &ValueKind) -> Result<JsonValue> {
        for deserializer in self.deserializers {
            if deserializer.target.matches_node(&node, kind) {
                node = deserializer.apply(key, node)?;
            }
        }
        Ok(node)
    }

    fn build_node(&mut self, key: &str, node: JsonValue, kind: &ValueKind, format: Option<&FormatSpec>) -> Result<Value> {
        match kind {
            ValueKind::Any => Ok(Value::from_json(&node)),
            ValueKind::List(element) => {
                if coerce::is_null_like(&node, kind, self.features) {
                    return Ok(Value::Null);
                }
                match node {
                    JsonValue::Array(items) => {
                        let mut out = Vec::with_capacity(items.len());
                        for (index, item) in items.into_iter().enumerate() {
                            out.push(self.build(&index.to_string(), item, element, format)?);
                        }
                        Ok(Value::List(out))
                    }
                    other => Err(Error::Validation(format!("expected a list for {kind} at \"{key}\", got {other}"))),
                }
            }
            ValueKind::Map(inner) => {
                if coerce::is_null_like(&node, kind, self.features) {
                    return Ok(Value::Null);
                }
                match node {
                    JsonValue::Object(entries) => {
                        let mut out = PropertyMap::with_capacity(entries.len());
                        for (entry_key, item) in entries {
                            let value = self.build(&entry_key, item, inner, format)?;
                            out.insert(entry_key, value);
                        }
                        Ok(Value::Map(out))
                    }
                    other => Err(Error::Validation(format!("expected a map for {kind} at \"{key}\", got {other}"))),
                }
            }
            ValueKind::Object(class) => self.build_object(key, node, kind, class),
            scalar => coerce::coerce(
                node,
                scalar,
                &CoerceContext {
                    features: self.features,
                    format,
                },
            ),
        }
    }

    fn build_property(&mut self, prop: &PropertyDescriptor, node: JsonValue) -> Result<Value> {
        let key = prop.wire_name();
        let node = self.apply_deserializers(key, node, &prop.kind)?;
        if let Some(hook) = &prop.deserializer {
            return hook(Value::from_json(&node));
        }
        if prop.raw_value && prop.kind == ValueKind::String && !node.is_string() && !node.is_null() {
            return Ok(Value::String(node.to_string()));
        }
        let node = match (&prop.format, &prop.kind, node) {
            (Some(spec), ValueKind::Object(class), JsonValue::Array(items)) if spec.shape == Shape::Array => {
                self.fields_from_array(class, items)
            }
            (_, _, node) => node,
        };
        self.build_node(key, node, &prop.kind, prop.format.as_ref())
    }

    /// Undo the ARRAY shape: positional values back onto the class's
    /// declared wire names.
    fn fields_from_array(&self, class: &str, items: Vec<JsonValue>) -> JsonValue {
        let Some(desc) = self.store.class(class) else {
            return JsonValue::Array(items);
        };
        let map: Map<String, JsonValue> = desc
            .properties
            .iter()
            .map(|p| p.wire_name().to_string())
            .zip(items)
            .collect();
        JsonValue::Object(map)
    }

    // ========================================================================
    // Objects
    // ========================================================================

    fn build_object(&mut self, key: &str, node: JsonValue, kind: &ValueKind, declared: &str) -> Result<Value> {
        let store = self.store;
        if coerce::is_null_like(&node, kind, self.features) {
            return Ok(Value::Null);
        }
        let declared_desc = store.require(declared)?;

        let node = match (&declared_desc.root_name, node) {
            (Some(root), JsonValue::Object(mut map)) if map.len() == 1 && map.contains_key(root.as_str()) => {
                map.remove(root.as_str()).unwrap_or(JsonValue::Null)
            }
            (_, node) => node,
        };

        if declared_desc.identity.is_some() && is_scalar(&node) {
            return Ok(Value::Object(self.identities.reference(&node, declared)));
        }

        let (class, node) = resolver::unwrap(store, declared, node)?;
        if !store.is_assignable(&class, declared) {
            return Err(Error::TypeResolution(format!("\"{class}\" is not a subtype of \"{declared}\"")));
        }
        let desc = store.require(&class)?;

        if let Some(creator) = &desc.creator {
            if let CreatorMode::Delegating(arg_kind) = &creator.mode {
                let arg = self.build(key, node, arg_kind, None)?;
                let handle = ObjectRef::new((creator.factory)(vec![arg])?);
                self.built.push(handle.clone());
                return Ok(Value::Object(handle));
            }
        }

        let mut map = match node {
            JsonValue::Object(map) => map,
            other => {
                return Err(Error::Validation(format!(
                    "expected an object for \"{class}\" at \"{key}\", got {other}"
                )));
            }
        };

        let id_wire = desc.identity.as_ref().map(|info| {
            desc.property_named(&info.property)
                .map(|p| p.wire_name().to_string())
                .unwrap_or_else(|| info.property.clone())
        });
        let handle = match id_wire.as_deref().and_then(|wire| map.get(wire)) {
            Some(id) if !id.is_null() => self.identities.define(id, &class)?,
            _ => ObjectRef::new(Object::new(class.as_str())),
        };

        regroup_unwrapped(store, desc, id_wire.as_deref(), &mut map);
        let mut object = self.construct(desc, &mut map)?;
        self.assign_fields(desc, id_wire.as_deref(), map, &mut object)?;

        handle.replace(object);
        self.built.push(handle.clone());
        Ok(Value::Object(handle))
    }

    /// A property-based creator consumes its arguments from `map`; without
    /// a creator the instance starts empty.
    fn construct(&mut self, desc: &ClassDescriptor, map: &mut Map<String, JsonValue>) -> Result<Object> {
        let Some(creator) = &desc.creator else {
            return Ok(Object::new(desc.name.as_str()));
        };
        let CreatorMode::Properties(names) = &creator.mode else {
            return Ok(Object::new(desc.name.as_str()));
        };
        let features = self.features;
        let de = &features.deserialization;
        let mut args = Vec::with_capacity(names.len());
        for name in names {
            let arg = match map.shift_remove(name.as_str()) {
                None if de.fail_on_missing_creator_properties => {
                    return Err(Error::CreatorArgument {
                        class: desc.name.clone(),
                        message: format!("missing creator property \"{name}\""),
                    });
                }
                None => Value::Null,
                Some(JsonValue::Null) if de.fail_on_null_creator_properties => {
                    return Err(Error::CreatorArgument {
                        class: desc.name.clone(),
                        message: format!("null value for creator property \"{name}\""),
                    });
                }
                Some(node) => match desc.property_for_wire(name) {
                    Some(prop) => self.build_property(prop, node)?,
                    None => Value::from_json(&node),
                },
            };
            args.push(arg);
        }
        (creator.factory)(args)
    }

    fn assign_fields(
        &mut self,
        desc: &ClassDescriptor,
        id_wire: Option<&str>,
        map: Map<String, JsonValue>,
        object: &mut Object,
    ) -> Result<()> {
        let mut slots: Vec<Option<Value>> = vec![None; desc.properties.len()];
        let mut unknown = PropertyMap::new();
        let mut id_value = None;

        for (key, node) in map {
            let position = desc
                .properties
                .iter()
                .position(|p| p.wire_name() == key)
                .or_else(|| desc.properties.iter().position(|p| p.answers_to(&key)));
            let Some(index) = position else {
                if id_wire == Some(key.as_str()) {
                    id_value = Some(Value::from_json(&node));
                } else if desc.ignore_list_hides_key(&key, false) {
                    continue;
                } else if desc.any_setter.is_some() {
                    unknown.insert(key, Value::from_json(&node));
                } else if desc.ignores_unknown() || !self.features.deserialization.fail_on_unknown_properties {
                    tracing::debug!(class = %desc.name, property = %key, "unknown property dropped");
                } else {
                    return Err(Error::UnknownProperty {
                        class: desc.name.clone(),
                        property: key,
                    });
                }
                continue;
            };
            let prop = &desc.properties[index];
            if !self.accepts(desc, prop) {
                continue;
            }
            slots[index] = Some(self.build_property(prop, node)?);
        }

        for (prop, slot) in desc.properties.iter().zip(slots) {
            let Some(value) = slot else {
                continue;
            };
            match &prop.setter {
                Some(setter) => setter(&mut *object, value)?,
                None => object.set(prop.name.clone(), value),
            }
        }
        if let (Some(info), Some(id)) = (&desc.identity, id_value) {
            object.set(info.property.clone(), id);
        }
        if let Some(field) = &desc.any_setter {
            if !unknown.is_empty() || object.get(field).is_none() {
                object.set(field.clone(), Value::Map(unknown));
            }
        }
        Ok(())
    }

    /// Whether an incoming key may be written into `prop`.
    fn accepts(&self, desc: &ClassDescriptor, prop: &PropertyDescriptor) -> bool {
        !pipeline::is_ignored(prop)
            && prop.access.writable()
            && !desc.ignore_list_hides(prop, false)
            && !pipeline::view_hides(self.store, prop, self.options.with_view.as_deref())
    }
}

fn is_scalar(node: &JsonValue) -> bool {
    matches!(node, JsonValue::Bool(_) | JsonValue::Number(_) | JsonValue::String(_))
}

/// Move prefixed/suffixed keys of each unwrapped property back into a
/// nested map under the property's wire name.
fn regroup_unwrapped(
    store: &MetadataStore,
    desc: &ClassDescriptor,
    id_wire: Option<&str>,
    map: &mut Map<String, JsonValue>,
) {
    for prop in &desc.properties {
        let Some(unwrap) = &prop.unwrapped else {
            continue;
        };
        let nested = prop.kind.target_class().and_then(|c| store.class(c));
        let bare = unwrap.prefix.is_empty() && unwrap.suffix.is_empty();
        let claimed: Vec<String> = map
            .keys()
            .filter(|key| {
                if id_wire == Some(key.as_str()) || desc.properties.iter().any(|p| p.answers_to(key)) {
                    return false;
                }
                let Some(inner) = unwrap.strip_key(key) else {
                    return false;
                };
                match nested {
                    Some(nested) if bare && !nested.properties.is_empty() => nested.property_for_wire(inner).is_some(),
                    _ => true,
                }
            })
            .cloned()
            .collect();
        if claimed.is_empty() {
            continue;
        }
        let mut inner_map = Map::with_capacity(claimed.len());
        for key in claimed {
            if let (Some(value), Some(inner)) = (map.shift_remove(key.as_str()), unwrap.strip_key(&key)) {
                inner_map.insert(inner.to_string(), value);
            }
        }
        map.insert(prop.wire_name().to_string(), JsonValue::Object(inner_map));
    }
}
