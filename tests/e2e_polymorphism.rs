//! End-to-end tests for polymorphic type info.

use std::sync::Arc;

use jackson_rs::meta::{
    ClassDescriptor, MetadataStore, PropertyDescriptor, TypeIdStrategy, TypeInfoSpec, TypePlacement,
};
use jackson_rs::{Error, Object, ObjectMapper, Value, ValueKind};
use pretty_assertions::assert_eq;

fn zoo_mapper(strategy: TypeIdStrategy, placement: TypePlacement) -> ObjectMapper {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("Animal")
                .type_info(
                    TypeInfoSpec::new(strategy, placement)
                        .subtype("dog", "Dog")
                        .subtype("cat", "Cat"),
                )
                .property(PropertyDescriptor::new("name").kind(ValueKind::String)),
        )
        .register(
            ClassDescriptor::new("Dog")
                .extends("Animal")
                .property(PropertyDescriptor::new("barks").kind(ValueKind::Bool)),
        )
        .register(
            ClassDescriptor::new("Cat")
                .extends("Animal")
                .property(PropertyDescriptor::new("lives").kind(ValueKind::Int)),
        )
        .register(
            ClassDescriptor::new("Zoo")
                .property(PropertyDescriptor::new("animals").kind(ValueKind::list_of(ValueKind::object("Animal")))),
        )
        .build()
        .unwrap();
    ObjectMapper::new(Arc::new(store))
}

fn zoo() -> Value {
    let rex = Object::new("Dog").with_property("name", "Rex").with_property("barks", true);
    let tom = Object::new("Cat").with_property("name", "Tom").with_property("lives", 9);
    Value::from(Object::new("Zoo").with_property("animals", vec![Value::from(rex), Value::from(tom)]))
}

fn classes(zoo: &Value) -> Vec<String> {
    let animals = zoo.as_object().unwrap().get("animals").unwrap();
    animals
        .as_list()
        .unwrap()
        .iter()
        .map(|a| a.as_object().unwrap().class())
        .collect()
}

#[test]
fn test_property_placement_round_trip() {
    let mapper = zoo_mapper(TypeIdStrategy::Name, TypePlacement::default());
    let text = mapper.stringify(&zoo()).unwrap();
    assert_eq!(
        text,
        r#"{"animals":[{"name":"Rex","barks":true,"@type":"dog"},{"name":"Tom","lives":9,"@type":"cat"}]}"#
    );

    let parsed = mapper.parse(&text, &ValueKind::object("Zoo")).unwrap();
    assert_eq!(classes(&parsed), vec!["Dog", "Cat"]);
    assert_eq!(parsed, zoo());
}

#[test]
fn test_wrapper_object_round_trip() {
    let mapper = zoo_mapper(TypeIdStrategy::Name, TypePlacement::WrapperObject);
    let text = mapper.stringify(&zoo()).unwrap();
    assert_eq!(
        text,
        r#"{"animals":[{"dog":{"name":"Rex","barks":true}},{"cat":{"name":"Tom","lives":9}}]}"#
    );
    assert_eq!(mapper.parse(&text, &ValueKind::object("Zoo")).unwrap(), zoo());
}

#[test]
fn test_wrapper_array_with_class_names() {
    let mapper = zoo_mapper(TypeIdStrategy::Class, TypePlacement::WrapperArray);
    let text = mapper.stringify(&zoo()).unwrap();
    assert_eq!(
        text,
        r#"{"animals":[["Dog",{"name":"Rex","barks":true}],["Cat",{"name":"Tom","lives":9}]]}"#
    );
    let parsed = mapper.parse(&text, &ValueKind::object("Zoo")).unwrap();
    assert_eq!(classes(&parsed), vec!["Dog", "Cat"]);
}

#[test]
fn test_custom_type_property() {
    let mapper = zoo_mapper(TypeIdStrategy::Name, TypePlacement::Property("kind".into()));
    let dog = mapper
        .parse(r#"{"kind": "dog", "name": "Rex", "barks": false}"#, &ValueKind::object("Animal"))
        .unwrap();
    assert_eq!(dog.as_object().unwrap().class(), "Dog");
    assert_eq!(dog.as_object().unwrap().get("barks"), Some(Value::Bool(false)));
}

#[test]
fn test_type_resolution_failures() {
    let mapper = zoo_mapper(TypeIdStrategy::Name, TypePlacement::default());
    let animal = ValueKind::object("Animal");

    let missing = mapper.parse(r#"{"name": "Rex"}"#, &animal).unwrap_err();
    assert!(matches!(missing, Error::TypeResolution(_)));

    let unknown = mapper.parse(r#"{"@type": "snake", "name": "Kaa"}"#, &animal).unwrap_err();
    assert!(matches!(unknown, Error::TypeResolution(_)));

    let wrong_branch = mapper
        .parse(r#"{"@type": "cat", "name": "Tom"}"#, &ValueKind::object("Dog"))
        .unwrap_err();
    assert!(matches!(wrong_branch, Error::TypeResolution(_)));
}

#[test]
fn test_default_implementation() {
    let store = MetadataStore::builder()
        .register(ClassDescriptor::new("Shape").type_info(
            TypeInfoSpec::new(TypeIdStrategy::Name, TypePlacement::default())
                .subtype("circle", "Circle")
                .default_impl("Circle"),
        ))
        .register(
            ClassDescriptor::new("Circle")
                .extends("Shape")
                .property(PropertyDescriptor::new("radius").kind(ValueKind::Float)),
        )
        .build()
        .unwrap();
    let mapper = ObjectMapper::new(Arc::new(store));
    let circle = mapper.parse(r#"{"radius": 2}"#, &ValueKind::object("Shape")).unwrap();
    assert_eq!(circle.as_object().unwrap().class(), "Circle");
    assert_eq!(circle.as_object().unwrap().get("radius"), Some(Value::Float(2.0)));
}
