//! # ObjectMapper
//!
//! The facade every conversion goes through. It owns the shared metadata
//! store, the feature flags, the ordered global custom serializer and
//! deserializer lists, and the id sequence. Every call builds fresh
//! traversal state; a mapper can be shared across threads.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::config::{Features, ParseOptions, StringifyOptions};
use crate::de::Builder;
use crate::identity::IdSequence;
use crate::meta::MetadataStore;
use crate::model::{Value, ValueKind};
use crate::ser::Stringifier;
use crate::Result;

// ============================================================================
// Custom mappers
// ============================================================================

/// Which values a global custom mapper applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapperTarget {
    Any,
    /// A runtime kind name: `null`, `boolean`, `number`, `string`, `date`,
    /// `list`, `map` or `object`.
    Kind(String),
    /// Instances of exactly this class.
    Class(String),
}

impl MapperTarget {
    pub fn kind(name: impl Into<String>) -> Self {
        MapperTarget::Kind(name.into())
    }

    pub fn class(name: impl Into<String>) -> Self {
        MapperTarget::Class(name.into())
    }

    /// Serialize side: match the runtime value.
    pub fn matches_value(&self, value: &Value) -> bool {
        match self {
            MapperTarget::Any => true,
            MapperTarget::Kind(kind) => value.type_name() == kind.as_str(),
            MapperTarget::Class(class) => value.as_object().is_some_and(|o| o.read().class == *class),
        }
    }

    /// Deserialize side: match the JSON node against its declared kind.
    pub fn matches_node(&self, node: &JsonValue, declared: &ValueKind) -> bool {
        match self {
            MapperTarget::Any => true,
            MapperTarget::Kind(kind) => json_type_name(node) == kind.as_str(),
            MapperTarget::Class(class) => matches!(declared, ValueKind::Object(c) if c == class),
        }
    }
}

fn json_type_name(node: &JsonValue) -> &'static str {
    match node {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "map",
    }
}

/// A global rewrite of `T` values, called with the key the value sits
/// under (property wire name, map key, list index, or `""` at the root).
pub struct CustomMapper<T> {
    /// Lower orders run first; equal orders keep insertion order.
    pub order: i32,
    pub target: MapperTarget,
    mapper: Arc<dyn Fn(&str, T) -> Result<T> + Send + Sync>,
}

/// Rewrites in-memory values before they are serialized.
pub type CustomSerializer = CustomMapper<Value>;

/// Rewrites JSON nodes before they are built.
pub type CustomDeserializer = CustomMapper<JsonValue>;

impl<T> CustomMapper<T> {
    pub fn new<F>(target: MapperTarget, f: F) -> Self
    where
        F: Fn(&str, T) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            order: 0,
            target,
            mapper: Arc::new(f),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn apply(&self, key: &str, value: T) -> Result<T> {
        (self.mapper)(key, value)
    }
}

impl<T> Clone for CustomMapper<T> {
    fn clone(&self) -> Self {
        Self {
            order: self.order,
            target: self.target.clone(),
            mapper: Arc::clone(&self.mapper),
        }
    }
}

impl<T> fmt::Debug for CustomMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMapper")
            .field("order", &self.order)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Stable insert by `order`.
fn insert_ordered<T>(list: &mut Vec<CustomMapper<T>>, mapper: CustomMapper<T>) {
    let pos = list.partition_point(|m| m.order <= mapper.order);
    list.insert(pos, mapper);
}

// ============================================================================
// ObjectMapper
// ============================================================================

#[derive(Debug, Clone)]
pub struct ObjectMapper {
    store: Arc<MetadataStore>,
    pub features: Features,
    serializers: Vec<CustomSerializer>,
    deserializers: Vec<CustomDeserializer>,
    ids: Arc<IdSequence>,
}

impl ObjectMapper {
    /// A mapper with default features and the process-wide id sequence.
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self {
            store,
            features: Features::default(),
            serializers: Vec::new(),
            deserializers: Vec::new(),
            ids: IdSequence::global(),
        }
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Use a private id sequence instead of the process-wide one.
    pub fn with_id_sequence(mut self, ids: Arc<IdSequence>) -> Self {
        self.ids = ids;
        self
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn add_serializer(&mut self, serializer: CustomSerializer) {
        insert_ordered(&mut self.serializers, serializer);
    }

    pub fn add_deserializer(&mut self, deserializer: CustomDeserializer) {
        insert_ordered(&mut self.deserializers, deserializer);
    }

    pub fn serializers(&self) -> &[CustomSerializer] {
        &self.serializers
    }

    pub fn deserializers(&self) -> &[CustomDeserializer] {
        &self.deserializers
    }

    // ------------------------------------------------------------------
    // Serialize
    // ------------------------------------------------------------------

    pub fn stringify(&self, value: &Value) -> Result<String> {
        self.stringify_with(value, &StringifyOptions::default())
    }

    pub fn stringify_with(&self, value: &Value, options: &StringifyOptions) -> Result<String> {
        let tree = self.to_tree(value, options)?;
        let text = if options.pretty {
            serde_json::to_string_pretty(&tree)?
        } else {
            serde_json::to_string(&tree)?
        };
        Ok(text)
    }

    /// Serialize to the generic JSON tree.
    pub fn to_tree(&self, value: &Value, options: &StringifyOptions) -> Result<JsonValue> {
        Stringifier::new(
            &self.store,
            &self.features.serialization,
            &self.serializers,
            options,
            &self.ids,
        )
        .run(value)
    }

    // ------------------------------------------------------------------
    // Deserialize
    // ------------------------------------------------------------------

    pub fn parse(&self, text: &str, kind: &ValueKind) -> Result<Value> {
        self.parse_with(text, kind, &ParseOptions::default())
    }

    pub fn parse_with(&self, text: &str, kind: &ValueKind, options: &ParseOptions) -> Result<Value> {
        let tree: JsonValue = serde_json::from_str(text)?;
        self.from_tree(tree, kind, options)
    }

    /// Build from an already-decoded JSON tree.
    pub fn from_tree(&self, tree: JsonValue, kind: &ValueKind, options: &ParseOptions) -> Result<Value> {
        Builder::new(&self.store, &self.features, &self.deserializers, options).run(tree, kind)
    }
}
