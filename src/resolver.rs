//! # Type Resolver
//!
//! Discriminator computation on the way out and subtype lookup on the way
//! in. The type info of a class is declared on the class itself or on its
//! nearest ancestor ([`MetadataStore::type_info_owner`]).

use serde_json::{Map, Value as JsonValue};

use crate::meta::{ClassDescriptor, MetadataStore, TypeIdStrategy, TypeInfoSpec, TypePlacement};
use crate::{Error, Result};

/// Discriminator written for an instance of `class` under `spec`.
pub fn type_id(store: &MetadataStore, spec: &TypeInfoSpec, class: &str) -> String {
    match spec.strategy {
        TypeIdStrategy::Class => class.to_string(),
        TypeIdStrategy::Name => spec
            .subtypes
            .iter()
            .find(|sub| sub.class == class)
            .map(|sub| sub.name.clone())
            .or_else(|| store.class(class).and_then(|d| d.type_name.clone()))
            .unwrap_or_else(|| class.to_string()),
    }
}

/// Place the discriminator of `class` around (or into) a serialized body.
/// Classes without type info are returned unchanged.
pub fn wrap(store: &MetadataStore, class: &str, body: JsonValue) -> JsonValue {
    let Some(spec) = store.type_info_owner(class).and_then(|owner| owner.type_info.as_ref()) else {
        return body;
    };
    let id = type_id(store, spec, class);
    match &spec.placement {
        TypePlacement::Property(key) => match body {
            JsonValue::Object(mut map) => {
                map.insert(key.clone(), JsonValue::String(id));
                JsonValue::Object(map)
            }
            other => other,
        },
        TypePlacement::WrapperObject => {
            let mut map = Map::with_capacity(1);
            map.insert(id, body);
            JsonValue::Object(map)
        }
        TypePlacement::WrapperArray => JsonValue::Array(vec![JsonValue::String(id), body]),
    }
}

/// Strip the discriminator from `node` and resolve the concrete class to
/// build, starting from the `declared` target class.
pub fn unwrap(store: &MetadataStore, declared: &str, node: JsonValue) -> Result<(String, JsonValue)> {
    let Some(owner) = store.type_info_owner(declared) else {
        return Ok((declared.to_string(), node));
    };
    let Some(spec) = owner.type_info.as_ref() else {
        return Ok((declared.to_string(), node));
    };

    let (id, body) = match (&spec.placement, node) {
        (TypePlacement::Property(key), JsonValue::Object(mut map)) => {
            let id = map.shift_remove(key.as_str());
            (id, JsonValue::Object(map))
        }
        (TypePlacement::WrapperObject, JsonValue::Object(map)) if map.len() == 1 => {
            match map.into_iter().next() {
                Some((id, body)) => (Some(JsonValue::String(id)), body),
                None => (None, JsonValue::Null),
            }
        }
        (TypePlacement::WrapperArray, JsonValue::Array(items)) if items.len() == 2 && items[0].is_string() => {
            let mut items = items.into_iter();
            (items.next(), items.next().unwrap_or(JsonValue::Null))
        }
        (_, other) => (None, other),
    };

    let class = match id {
        Some(JsonValue::String(id)) => resolve(store, owner, spec, declared, &id)?,
        Some(other) => {
            return Err(Error::TypeResolution(format!(
                "type id of \"{declared}\" must be a string, got {other}"
            )));
        }
        None => match &spec.default_impl {
            Some(default) => default.clone(),
            None => {
                return Err(Error::TypeResolution(format!(
                    "missing type id when trying to resolve subtype of \"{declared}\""
                )));
            }
        },
    };
    Ok((class, body))
}

/// Reverse lookup of a discriminator.
pub fn resolve(
    store: &MetadataStore,
    owner: &ClassDescriptor,
    spec: &TypeInfoSpec,
    declared: &str,
    id: &str,
) -> Result<String> {
    let by_subtype_name = spec.subtypes.iter().find(|sub| sub.name == id).map(|sub| sub.class.clone());
    let by_subtype_class = || {
        spec.subtypes
            .iter()
            .find(|sub| {
                sub.class == id
                    || store
                        .class(&sub.class)
                        .and_then(|d| d.type_name.as_deref())
                        .is_some_and(|name| name == id)
            })
            .map(|sub| sub.class.clone())
    };
    let by_class_name = || {
        store
            .class(id)
            .filter(|_| store.is_assignable(id, &owner.name))
            .map(|d| d.name.clone())
    };

    let resolved = by_subtype_name
        .or_else(by_subtype_class)
        .or_else(by_class_name)
        .or_else(|| spec.default_impl.clone());
    match resolved {
        Some(class) => {
            tracing::trace!(declared, id, class = %class, "resolved subtype");
            Ok(class)
        }
        None => Err(Error::TypeResolution(format!(
            "could not resolve type id \"{id}\" as a subtype of \"{declared}\""
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn zoo(placement: TypePlacement, strategy: TypeIdStrategy) -> MetadataStore {
        MetadataStore::builder()
            .register(
                ClassDescriptor::new("Animal").type_info(
                    TypeInfoSpec::new(strategy, placement)
                        .subtype("dog", "Dog")
                        .subtype("cat", "Cat"),
                ),
            )
            .register(ClassDescriptor::new("Dog").extends("Animal"))
            .register(ClassDescriptor::new("Cat").extends("Animal").type_name("kitty"))
            .register(ClassDescriptor::new("Plain"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_name_strategy_prefers_subtype_table() {
        let store = zoo(TypePlacement::default(), TypeIdStrategy::Name);
        let spec = store.class("Animal").unwrap().type_info.clone().unwrap();
        assert_eq!(type_id(&store, &spec, "Dog"), "dog");
        assert_eq!(type_id(&store, &spec, "Animal"), "Animal");
    }

    #[test]
    fn test_class_strategy_uses_class_name() {
        let store = zoo(TypePlacement::default(), TypeIdStrategy::Class);
        let spec = store.class("Animal").unwrap().type_info.clone().unwrap();
        assert_eq!(type_id(&store, &spec, "Cat"), "Cat");
    }

    #[test]
    fn test_placements() {
        let store = zoo(TypePlacement::WrapperObject, TypeIdStrategy::Name);
        assert_eq!(wrap(&store, "Dog", json!({"name": "Rex"})), json!({"dog": {"name": "Rex"}}));

        let store = zoo(TypePlacement::WrapperArray, TypeIdStrategy::Name);
        assert_eq!(wrap(&store, "Cat", json!({})), json!(["cat", {}]));

        let store = zoo(TypePlacement::Property("kind".into()), TypeIdStrategy::Name);
        assert_eq!(wrap(&store, "Dog", json!({"name": "Rex"})), json!({"name": "Rex", "kind": "dog"}));
        assert_eq!(wrap(&store, "Plain", json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn test_unwrap_resolves_subtypes() {
        let store = zoo(TypePlacement::WrapperObject, TypeIdStrategy::Name);
        let (class, body) = unwrap(&store, "Animal", json!({"cat": {"lives": 9}})).unwrap();
        assert_eq!(class, "Cat");
        assert_eq!(body, json!({"lives": 9}));

        let store = zoo(TypePlacement::default(), TypeIdStrategy::Name);
        let (class, body) = unwrap(&store, "Animal", json!({"@type": "kitty", "lives": 9})).unwrap();
        assert_eq!(class, "Cat");
        assert_eq!(body, json!({"lives": 9}));
    }

    #[test]
    fn test_unknown_discriminator_is_an_error() {
        let store = zoo(TypePlacement::default(), TypeIdStrategy::Name);
        let err = unwrap(&store, "Animal", json!({"@type": "bird"})).unwrap_err();
        assert!(matches!(err, Error::TypeResolution(_)));
        let err = unwrap(&store, "Animal", json!({})).unwrap_err();
        assert!(matches!(err, Error::TypeResolution(_)));
    }
}
