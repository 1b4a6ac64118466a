//! # Reference Linker
//!
//! A managed property (parent → children) is written normally; the paired
//! back property (child → parent) never is. After a parse, every object
//! reached through a managed property gets its back property pointed at
//! the very instance that owns it.
//!
//! A back property counts as paired only when the class it points at
//! declares a managed property with the same reference name whose target
//! class is the back property's owner (either side may be a subclass of
//! the other). Unpaired back properties are ordinary properties.

use crate::meta::{ClassDescriptor, MetadataStore, PropertyDescriptor, ReferenceRole};
use crate::model::{ObjectRef, Value};

/// Whether `prop` of `class` is the back half of a confirmed pair.
pub fn is_paired_back(store: &MetadataStore, class: &ClassDescriptor, prop: &PropertyDescriptor) -> bool {
    let ReferenceRole::Back(name) = &prop.reference else {
        return false;
    };
    let Some(parent_class) = prop.kind.target_class() else {
        return false;
    };
    let Some(parent) = store.class(parent_class) else {
        return false;
    };
    parent.properties.iter().any(|managed| {
        matches!(&managed.reference, ReferenceRole::Managed(n) if n == name)
            && managed
                .kind
                .target_class()
                .is_some_and(|child| related(store, &class.name, child))
    })
}

/// The back property on `child_class` paired with the managed property
/// `managed` of `parent_class`.
pub fn back_property_for<'s>(
    store: &'s MetadataStore,
    parent_class: &str,
    managed: &PropertyDescriptor,
    child_class: &str,
) -> Option<&'s PropertyDescriptor> {
    let ReferenceRole::Managed(name) = &managed.reference else {
        return None;
    };
    let child = store.class(child_class)?;
    child.properties.iter().find(|back| {
        matches!(&back.reference, ReferenceRole::Back(n) if n == name)
            && back
                .kind
                .target_class()
                .is_some_and(|target| related(store, parent_class, target))
    })
}

fn related(store: &MetadataStore, a: &str, b: &str) -> bool {
    store.is_assignable(a, b) || store.is_assignable(b, a)
}

/// Point the back property of every object reachable through the managed
/// properties of `owner` at `owner`.
pub fn attach_back_references(store: &MetadataStore, class: &ClassDescriptor, owner: &ObjectRef) {
    let managed: Vec<&PropertyDescriptor> = class
        .properties
        .iter()
        .filter(|p| matches!(p.reference, ReferenceRole::Managed(_)))
        .collect();
    if managed.is_empty() {
        return;
    }
    let fields = owner.snapshot().properties;
    for prop in managed {
        let Some(value) = fields.get(&prop.name) else {
            continue;
        };
        for child in children(value) {
            let child_class = child.class();
            if let Some(back) = back_property_for(store, &class.name, prop, &child_class) {
                tracing::trace!(parent = %class.name, child = %child_class, property = %back.name, "back reference attached");
                child.set(back.name.clone(), Value::Object(owner.clone()));
            }
        }
    }
}

/// Objects held directly, as list elements, or as map values.
fn children(value: &Value) -> Vec<ObjectRef> {
    match value {
        Value::Object(o) => vec![o.clone()],
        Value::List(items) => items.iter().filter_map(|v| v.as_object().cloned()).collect(),
        Value::Map(map) => map.values().filter_map(|v| v.as_object().cloned()).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::DEFAULT_REFERENCE;
    use crate::model::{Object, ValueKind};

    fn store() -> MetadataStore {
        MetadataStore::builder()
            .register(
                ClassDescriptor::new("User").property(
                    PropertyDescriptor::new("items")
                        .kind(ValueKind::list_of(ValueKind::object("Item")))
                        .managed_reference(DEFAULT_REFERENCE),
                ),
            )
            .register(
                ClassDescriptor::new("Item")
                    .property(
                        PropertyDescriptor::new("owner")
                            .kind(ValueKind::object("User"))
                            .back_reference(DEFAULT_REFERENCE),
                    )
                    .property(
                        PropertyDescriptor::new("reviewer")
                            .kind(ValueKind::object("User"))
                            .back_reference("review"),
                    ),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_only_confirmed_pairs_are_back_references() {
        let store = store();
        let item = store.class("Item").unwrap();
        assert!(is_paired_back(&store, item, item.property_named("owner").unwrap()));
        assert!(!is_paired_back(&store, item, item.property_named("reviewer").unwrap()));
    }

    #[test]
    fn test_attach_sets_the_identical_parent() {
        let store = store();
        let a = Object::new("Item").into_ref();
        let b = Object::new("Item").into_ref();
        let user = Object::new("User")
            .with_property("items", Value::List(vec![Value::Object(a.clone()), Value::Object(b.clone())]))
            .into_ref();

        attach_back_references(&store, store.class("User").unwrap(), &user);

        for item in [a, b] {
            let owner = item.get("owner").unwrap();
            assert!(owner.as_object().unwrap().ptr_eq(&user));
            assert_eq!(item.get("reviewer"), None);
        }
    }
}
