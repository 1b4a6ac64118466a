//! End-to-end serialization tests.
//!
//! Each test registers a small class table, builds an in-memory graph and
//! checks the JSON text produced by `ObjectMapper::stringify`.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use jackson_rs::config::{NanPolicy, PositiveInfinityPolicy};
use jackson_rs::meta::{
    Access, ClassDescriptor, FormatSpec, IgnoreProperties, Include, MetadataStore, PropertyDescriptor,
    PropertyOrder, Shape, TypeIdStrategy, TypeInfoSpec, TypePlacement,
};
use jackson_rs::{
    CustomSerializer, Error, MapperTarget, Object, ObjectMapper, PropertyMap, StringifyOptions, Value, ValueKind,
};
use pretty_assertions::assert_eq;

fn mapper(store: MetadataStore) -> ObjectMapper {
    ObjectMapper::new(Arc::new(store))
}

// ============================================================================
// 1. Formats
// ============================================================================

#[test]
fn test_event_formats() {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("Event")
                .property(PropertyDescriptor::new("name").kind(ValueKind::String))
                .property(
                    PropertyDescriptor::new("startDate")
                        .kind(ValueKind::Date)
                        .format(FormatSpec::new(Shape::String).pattern("YYYY-MM-DD hh:mm:ss")),
                )
                .property(
                    PropertyDescriptor::new("price")
                        .kind(ValueKind::Float)
                        .format(FormatSpec::new(Shape::String).precision(2)),
                )
                .property(PropertyDescriptor::new("canceled").kind(ValueKind::Bool)),
        )
        .build()
        .unwrap();
    let mapper = mapper(store);

    let event = Object::new("Event")
        .with_property("name", "Event 1")
        .with_property("startDate", Utc.with_ymd_and_hms(2020, 3, 24, 10, 0, 0).unwrap())
        .with_property("price", 14.5)
        .with_property("canceled", false);

    assert_eq!(
        mapper.stringify(&Value::from(event)).unwrap(),
        r#"{"name":"Event 1","startDate":"2020-03-24 10:00:00","price":"14.50","canceled":false}"#
    );
}

#[test]
fn test_dates_without_format() {
    let date = Utc.with_ymd_and_hms(2020, 3, 24, 10, 0, 0).unwrap();
    let value = Value::from(Object::new("Stamp").with_property("at", date));

    let mut mapper = mapper(MetadataStore::default());
    assert_eq!(
        mapper.stringify(&value).unwrap(),
        format!(r#"{{"at":{}}}"#, date.timestamp_millis())
    );

    mapper.features.serialization.write_dates_as_timestamps = false;
    assert_eq!(mapper.stringify(&value).unwrap(), r#"{"at":"2020-03-24T10:00:00.000Z"}"#);
}

// ============================================================================
// 2. Ordering
// ============================================================================

#[test]
fn test_alphabetic_class_order() {
    let store = MetadataStore::builder()
        .register(ClassDescriptor::new("Item").order(PropertyOrder::Alphabetic))
        .build()
        .unwrap();
    let item = Object::new("Item")
        .with_property("id", 1)
        .with_property("name", "Book")
        .with_property("category", "Books");

    let tree = mapper(store).to_tree(&Value::from(item), &StringifyOptions::default()).unwrap();
    let keys: Vec<&str> = tree.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["category", "id", "name"]);
}

#[test]
fn test_alphabetic_sort_feature_applies_to_every_instance() {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("Item")
                .property(PropertyDescriptor::new("name"))
                .property(PropertyDescriptor::new("category"))
                .property(PropertyDescriptor::new("id")),
        )
        .build()
        .unwrap();
    let mut mapper = mapper(store);
    mapper.features.serialization.sort_properties_alphabetically = true;

    let item = |id: i64| {
        Value::from(
            Object::new("Item")
                .with_property("name", "Book")
                .with_property("category", "Books")
                .with_property("id", id),
        )
    };
    assert_eq!(
        mapper.stringify(&Value::List(vec![item(1), item(2)])).unwrap(),
        r#"[{"category":"Books","id":1,"name":"Book"},{"category":"Books","id":2,"name":"Book"}]"#
    );
}

#[test]
fn test_explicit_order_then_remaining_keys() {
    let store = MetadataStore::builder()
        .register(ClassDescriptor::new("Item").order(PropertyOrder::Explicit(vec!["name".into(), "id".into()])))
        .build()
        .unwrap();
    let item = Object::new("Item")
        .with_property("id", 1)
        .with_property("category", "Books")
        .with_property("name", "Book");

    assert_eq!(
        mapper(store).stringify(&Value::from(item)).unwrap(),
        r#"{"name":"Book","id":1,"category":"Books"}"#
    );
}

#[test]
fn test_map_entries_sorted_by_key() {
    let map: PropertyMap = vec![("b", Value::Int(2)), ("c", Value::Int(3)), ("a", Value::Int(1))]
        .into_iter()
        .collect();
    let mut mapper = mapper(MetadataStore::default());
    assert_eq!(mapper.stringify(&Value::Map(map.clone())).unwrap(), r#"{"b":2,"c":3,"a":1}"#);

    mapper.features.serialization.order_map_entries_by_keys = true;
    assert_eq!(mapper.stringify(&Value::Map(map)).unwrap(), r#"{"a":1,"b":2,"c":3}"#);
}

// ============================================================================
// 3. Cycles
// ============================================================================

fn user_store() -> MetadataStore {
    MetadataStore::builder()
        .register(
            ClassDescriptor::new("User")
                .property(PropertyDescriptor::new("name").kind(ValueKind::String))
                .property(PropertyDescriptor::new("userRef").kind(ValueKind::object("User"))),
        )
        .build()
        .unwrap()
}

#[test]
fn test_direct_self_reference() {
    let user = Object::new("User").with_property("name", "Ann").into_ref();
    user.set("userRef", Value::Object(user.clone()));

    let mut mapper = mapper(user_store());
    let err = mapper.stringify(&Value::Object(user.clone())).unwrap_err();
    assert!(matches!(&err, Error::Cycle { class, property } if class == "User" && property == "userRef"));

    mapper.features.serialization.fail_on_self_references = false;
    let err = mapper.stringify(&Value::Object(user.clone())).unwrap_err();
    assert!(matches!(err, Error::InfiniteRecursion { .. }));

    user.set("userRef", Value::Null);
}

#[test]
fn test_indirect_cycle_is_infinite_recursion() {
    let a = Object::new("User").with_property("name", "A").into_ref();
    let b = Object::new("User").with_property("name", "B").into_ref();
    a.set("userRef", Value::Object(b.clone()));
    b.set("userRef", Value::Object(a.clone()));

    let err = mapper(user_store()).stringify(&Value::Object(a.clone())).unwrap_err();
    assert!(matches!(&err, Error::InfiniteRecursion { key, class } if key == "userRef" && class == "User"));

    b.set("userRef", Value::Null);
}

#[test]
fn test_shared_object_without_identity_is_repeated() {
    let shared = Object::new("User").with_property("name", "Shared").into_ref();
    let list = Value::List(vec![Value::Object(shared.clone()), Value::Object(shared)]);
    assert_eq!(
        mapper(user_store()).stringify(&list).unwrap(),
        r#"[{"name":"Shared"},{"name":"Shared"}]"#
    );
}

// ============================================================================
// 4. Suppression
// ============================================================================

#[test]
fn test_ignore_wins_over_any_getter() {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("Product")
                .property(PropertyDescriptor::new("secret").ignored())
                .property(PropertyDescriptor::new("extras").kind(ValueKind::map_of(ValueKind::Any)))
                .any_getter("extras"),
        )
        .build()
        .unwrap();
    let extras: PropertyMap = vec![("color", Value::from("red")), ("secret", Value::from("leak"))]
        .into_iter()
        .collect();
    let product = Object::new("Product")
        .with_property("name", "Chair")
        .with_property("secret", "hidden")
        .with_property("extras", extras);

    assert_eq!(
        mapper(store).stringify(&Value::from(product)).unwrap(),
        r#"{"name":"Chair","color":"red"}"#
    );
}

#[test]
fn test_access_modes_and_ignore_list() {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("Account")
                .property(PropertyDescriptor::new("password").access(Access::WriteOnly))
                .property(PropertyDescriptor::new("token").ignored().access(Access::ReadOnly))
                .ignore_properties(IgnoreProperties {
                    names: vec!["internal".into()],
                    ..Default::default()
                }),
        )
        .build()
        .unwrap();
    let account = Object::new("Account")
        .with_property("login", "ann")
        .with_property("password", "pw")
        .with_property("token", "t0k")
        .with_property("internal", 1);

    assert_eq!(
        mapper(store).stringify(&Value::from(account)).unwrap(),
        r#"{"login":"ann","token":"t0k"}"#
    );
}

#[test]
fn test_inclusion_rules() {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("Profile")
                .include(Include::NonNull)
                .property(PropertyDescriptor::new("tags").include(Include::NonEmpty)),
        )
        .build()
        .unwrap();
    let profile = Object::new("Profile")
        .with_property("name", "Ann")
        .with_property("nickname", Value::Null)
        .with_property("tags", Value::List(Vec::new()));

    assert_eq!(mapper(store).stringify(&Value::from(profile)).unwrap(), r#"{"name":"Ann"}"#);
}

#[test]
fn test_views_filter_properties() {
    let store = MetadataStore::builder()
        .view("Public")
        .view_extends("Internal", "Public")
        .register(
            ClassDescriptor::new("Doc")
                .property(PropertyDescriptor::new("title"))
                .property(PropertyDescriptor::new("summary").view("Public"))
                .property(PropertyDescriptor::new("notes").view("Internal"))
                .property(PropertyDescriptor::new("audit").view("Audit")),
        )
        .view("Audit")
        .build()
        .unwrap();
    let doc = Value::from(
        Object::new("Doc")
            .with_property("title", "T")
            .with_property("summary", "S")
            .with_property("notes", "N")
            .with_property("audit", "A"),
    );
    let mapper = mapper(store);

    assert_eq!(
        mapper.stringify(&doc).unwrap(),
        r#"{"title":"T","summary":"S","notes":"N","audit":"A"}"#
    );
    assert_eq!(
        mapper.stringify_with(&doc, &StringifyOptions::view("Public")).unwrap(),
        r#"{"title":"T","summary":"S","notes":"N"}"#
    );
    assert_eq!(
        mapper.stringify_with(&doc, &StringifyOptions::view("Internal")).unwrap(),
        r#"{"title":"T","notes":"N"}"#
    );
}

// ============================================================================
// 5. Rewrites
// ============================================================================

#[test]
fn test_raw_value_and_rename() {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("Widget")
                .property(PropertyDescriptor::new("config").kind(ValueKind::String).raw_value())
                .property(PropertyDescriptor::new("label").rename("caption")),
        )
        .build()
        .unwrap();
    let widget = Object::new("Widget")
        .with_property("label", "ok")
        .with_property("config", r#"{"depth": 2}"#);

    assert_eq!(
        mapper(store).stringify(&Value::from(widget)).unwrap(),
        r#"{"caption":"ok","config":{"depth":2}}"#
    );
}

#[test]
fn test_property_serializer_runs_after_format() {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("Price").property(
                PropertyDescriptor::new("amount")
                    .format(FormatSpec::new(Shape::String).precision(2))
                    .serialize_with(|v| Ok(Value::String(format!("${v}")))),
            ),
        )
        .build()
        .unwrap();
    let price = Object::new("Price").with_property("amount", 3.0);
    assert_eq!(mapper(store).stringify(&Value::from(price)).unwrap(), r#"{"amount":"$3.00"}"#);
}

#[test]
fn test_global_serializers_chain_by_order() {
    let mut mapper = mapper(MetadataStore::default());
    mapper.add_serializer(
        CustomSerializer::new(MapperTarget::kind("string"), |_, v| {
            Ok(Value::String(format!("{}!", v.as_str().unwrap_or_default())))
        })
        .order(2),
    );
    mapper.add_serializer(
        CustomSerializer::new(MapperTarget::kind("string"), |_, v| {
            Ok(Value::String(v.as_str().unwrap_or_default().to_uppercase()))
        })
        .order(1),
    );
    mapper.add_serializer(CustomSerializer::new(MapperTarget::class("Secret"), |_, _| {
        Ok(Value::from("***"))
    }));

    let value = Value::from(
        Object::new("Box")
            .with_property("greeting", "hello")
            .with_property("secret", Object::new("Secret").with_property("pin", 1234).into_ref()),
    );
    assert_eq!(
        mapper.stringify(&value).unwrap(),
        r#"{"greeting":"HELLO!","secret":"***!"}"#
    );
}

#[test]
fn test_value_accessor_replaces_object() {
    let store = MetadataStore::builder()
        .register(ClassDescriptor::new("Money").value_accessor(|o| {
            let amount = o.get("cents").and_then(Value::as_int).unwrap_or_default();
            Ok(Value::String(format!("{}.{:02}", amount / 100, amount % 100)))
        }))
        .build()
        .unwrap();
    let money = Object::new("Money").with_property("cents", 1250);
    assert_eq!(mapper(store).stringify(&Value::from(money)).unwrap(), r#""12.50""#);
}

#[test]
fn test_root_name_wraps_every_instance() {
    let store = MetadataStore::builder()
        .register(
            ClassDescriptor::new("User")
                .root_name("user")
                .property(PropertyDescriptor::new("name")),
        )
        .build()
        .unwrap();
    let user = Value::from(Object::new("User").with_property("name", "Ann"));
    let mapper = mapper(store);
    assert_eq!(mapper.stringify(&user).unwrap(), r#"{"user":{"name":"Ann"}}"#);
    assert_eq!(
        mapper.stringify(&Value::List(vec![user])).unwrap(),
        r#"[{"user":{"name":"Ann"}}]"#
    );
}

// ============================================================================
// 6. Unwrapping
// ============================================================================

fn person_store(with_type_info: bool) -> MetadataStore {
    let mut name = ClassDescriptor::new("Name")
        .property(PropertyDescriptor::new("first"))
        .property(PropertyDescriptor::new("last"));
    if with_type_info {
        name = name.type_info(TypeInfoSpec::new(TypeIdStrategy::Class, TypePlacement::default()));
    }
    MetadataStore::builder()
        .register(name)
        .register(
            ClassDescriptor::new("Person")
                .property(PropertyDescriptor::new("age").kind(ValueKind::Int))
                .property(
                    PropertyDescriptor::new("name")
                        .kind(ValueKind::object("Name"))
                        .unwrapped("n_", ""),
                ),
        )
        .build()
        .unwrap()
}

fn person() -> Value {
    let name = Object::new("Name").with_property("first", "Ada").with_property("last", "Lovelace");
    Value::from(
        Object::new("Person")
            .with_property("age", 36)
            .with_property("name", name.into_ref()),
    )
}

#[test]
fn test_unwrapped_property_flattens_with_prefix() {
    assert_eq!(
        mapper(person_store(false)).stringify(&person()).unwrap(),
        r#"{"age":36,"n_first":"Ada","n_last":"Lovelace"}"#
    );
}

#[test]
fn test_unwrapped_type_info_conflict() {
    let mut mapper = mapper(person_store(true));
    let err = mapper.stringify(&person()).unwrap_err();
    assert!(matches!(&err, Error::UnwrapTypeConflict { class, property } if class == "Person" && property == "name"));

    mapper.features.serialization.fail_on_unwrapped_type_identifiers = false;
    assert_eq!(
        mapper.stringify(&person()).unwrap(),
        r#"{"age":36,"n_first":"Ada","n_last":"Lovelace"}"#
    );
}

// ============================================================================
// 7. Numbers
// ============================================================================

#[test]
fn test_non_finite_number_policies() {
    let reading = Value::from(
        Object::new("Reading")
            .with_property("nan", f64::NAN)
            .with_property("high", f64::INFINITY),
    );
    let mut mapper = mapper(MetadataStore::default());
    assert_eq!(mapper.stringify(&reading).unwrap(), r#"{"nan":null,"high":null}"#);

    mapper.features.serialization.nan = NanPolicy::Zero;
    mapper.features.serialization.positive_infinity = PositiveInfinityPolicy::MaxSafeInteger;
    assert_eq!(mapper.stringify(&reading).unwrap(), r#"{"nan":0,"high":9007199254740991}"#);

    mapper.features.serialization.nan = NanPolicy::Error;
    assert!(matches!(mapper.stringify(&reading).unwrap_err(), Error::Validation(_)));
}

#[test]
fn test_pretty_output() {
    let value = Value::from(Object::new("Point").with_property("x", 1));
    let text = mapper(MetadataStore::default())
        .stringify_with(&value, &StringifyOptions::pretty())
        .unwrap();
    assert_eq!(text, "{\n  \"x\": 1\n}");
}
