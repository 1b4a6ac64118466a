//! Feature flags.
//!
//! Three groups, mirroring where each flag is consulted: mapper-wide
//! defaults, serialization, deserialization. All groups deserialize with
//! `#[serde(default)]`, so a config file only lists what it changes:
//!
//! ```rust
//! use jackson_rs::Features;
//!
//! let features = Features::from_json_str(
//!     r#"{"serialization": {"sort_properties_alphabetically": true}}"#,
//! ).unwrap();
//! assert!(features.serialization.sort_properties_alphabetically);
//! assert!(features.serialization.fail_on_self_references);
//! ```

use serde::{Deserialize, Serialize};

use crate::model::{Value, ValueKind};
use crate::Result;

// ============================================================================
// Mapper
// ============================================================================

/// Default-value substitution for nulls read into primitive kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperFeatures {
    /// Covers every primitive kind at once.
    pub default_value_for_primitives_on_null: bool,
    pub default_value_for_number_on_null: bool,
    pub default_value_for_string_on_null: bool,
    pub default_value_for_boolean_on_null: bool,
}

impl MapperFeatures {
    /// The value a null becomes for `kind`, if any flag asks for it.
    pub fn default_for(&self, kind: &ValueKind) -> Option<Value> {
        let all = self.default_value_for_primitives_on_null;
        match kind {
            ValueKind::Int if all || self.default_value_for_number_on_null => Some(Value::Int(0)),
            ValueKind::Float if all || self.default_value_for_number_on_null => Some(Value::Float(0.0)),
            ValueKind::String if all || self.default_value_for_string_on_null => {
                Some(Value::String(String::new()))
            }
            ValueKind::Bool if all || self.default_value_for_boolean_on_null => Some(Value::Bool(false)),
            _ => None,
        }
    }
}

// ============================================================================
// Serialization
// ============================================================================

/// What a NaN float is written as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NanPolicy {
    #[default]
    Null,
    Zero,
    Error,
}

/// What +Infinity is written as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositiveInfinityPolicy {
    #[default]
    Null,
    MaxSafeInteger,
    MaxValue,
    Error,
}

/// What -Infinity is written as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeInfinityPolicy {
    #[default]
    Null,
    MinSafeInteger,
    MinValue,
    Error,
}

/// 2^53 - 1
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;
pub const MIN_SAFE_INTEGER: i64 = -MAX_SAFE_INTEGER;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationFeatures {
    /// Fail on a property that points straight back at its owner.
    pub fail_on_self_references: bool,
    pub sort_properties_alphabetically: bool,
    /// Sort entries of map values by key.
    pub order_map_entries_by_keys: bool,
    pub fail_on_unwrapped_type_identifiers: bool,
    /// Dates as epoch milliseconds instead of RFC 3339 strings.
    pub write_dates_as_timestamps: bool,
    pub nan: NanPolicy,
    pub positive_infinity: PositiveInfinityPolicy,
    pub negative_infinity: NegativeInfinityPolicy,
}

impl Default for SerializationFeatures {
    fn default() -> Self {
        Self {
            fail_on_self_references: true,
            sort_properties_alphabetically: false,
            order_map_entries_by_keys: false,
            fail_on_unwrapped_type_identifiers: true,
            write_dates_as_timestamps: true,
            nan: NanPolicy::default(),
            positive_infinity: PositiveInfinityPolicy::default(),
            negative_infinity: NegativeInfinityPolicy::default(),
        }
    }
}

// ============================================================================
// Deserialization
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeserializationFeatures {
    pub fail_on_unknown_properties: bool,
    pub fail_on_null_for_primitives: bool,
    pub fail_on_missing_creator_properties: bool,
    pub fail_on_null_creator_properties: bool,
    pub fail_on_unresolved_object_ids: bool,
    pub accept_empty_array_as_null_object: bool,
    pub accept_empty_string_as_null_object: bool,
    /// Truncate fractional numbers read into integer kinds.
    pub accept_float_as_int: bool,
}

impl Default for DeserializationFeatures {
    fn default() -> Self {
        Self {
            fail_on_unknown_properties: true,
            fail_on_null_for_primitives: false,
            fail_on_missing_creator_properties: false,
            fail_on_null_creator_properties: false,
            fail_on_unresolved_object_ids: true,
            accept_empty_array_as_null_object: false,
            accept_empty_string_as_null_object: false,
            accept_float_as_int: false,
        }
    }
}

// ============================================================================
// Features
// ============================================================================

/// All feature groups of a mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub mapper: MapperFeatures,
    pub serialization: SerializationFeatures,
    pub deserialization: DeserializationFeatures,
}

impl Features {
    /// Load from a JSON document; absent keys keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// Per-call options
// ============================================================================

/// Options for one stringify call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringifyOptions {
    /// Only properties without views, or with a view equal to or extending
    /// this one, are written.
    pub with_view: Option<String>,
    pub pretty: bool,
}

impl StringifyOptions {
    pub fn view(view: impl Into<String>) -> Self {
        Self {
            with_view: Some(view.into()),
            ..Default::default()
        }
    }

    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Default::default()
        }
    }
}

/// Options for one parse call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub with_view: Option<String>,
}

impl ParseOptions {
    pub fn view(view: impl Into<String>) -> Self {
        Self {
            with_view: Some(view.into()),
        }
    }
}
