//! # Property Pipeline
//!
//! Per-property decisions and rewrites used while the replacement map of an
//! object is assembled:
//!
//! 1. key ordering ([`ordered_keys`])
//! 2. suppression: ignore flags, ignore lists, access mode, views, paired
//!    back references ([`is_visible`]) and inclusion rules ([`is_excluded`])
//! 3. value rewrites in fixed order: format → custom serializer → raw value
//!    ([`transform`])
//!
//! Renaming, any-getter flattening and unwrap flattening need the
//! stringifier's recursion and live in [`super::Stringifier`].

use crate::meta::{Access, ClassDescriptor, FormatSpec, MetadataStore, PropertyDescriptor, PropertyOrder, Shape};
use crate::de::coerce::truncate_to_int;
use crate::model::{Object, ObjectRef, PropertyMap, Value};
use crate::reference;
use crate::{Error, Result};

// ============================================================================
// Ordering
// ============================================================================

/// Keys of `object` in output order: its fields, then declared virtual
/// properties (getters, computed any-getter) it does not hold as fields.
pub fn ordered_keys(class: &ClassDescriptor, object: &Object, sort_alphabetically: bool) -> Vec<String> {
    let mut keys: Vec<String> = object.properties.keys().cloned().collect();
    for prop in &class.properties {
        if prop.getter.is_some() && !object.properties.contains_key(&prop.name) {
            keys.push(prop.name.clone());
        }
    }
    if let Some(any) = &class.any_getter {
        if any.accessor.is_some() && !keys.contains(&any.property) {
            keys.push(any.property.clone());
        }
    }

    if sort_alphabetically {
        keys.sort();
    }
    match &class.order {
        PropertyOrder::Declared => {}
        PropertyOrder::Alphabetic => keys.sort(),
        PropertyOrder::Explicit(listed) => {
            let mut ordered: Vec<String> = listed.iter().filter(|k| keys.contains(k)).cloned().collect();
            ordered.extend(keys.into_iter().filter(|k| !listed.contains(k)));
            keys = ordered;
        }
    }
    keys
}

// ============================================================================
// Suppression
// ============================================================================

/// Ignored with no explicit access mode overriding the ignore.
pub fn is_ignored(prop: &PropertyDescriptor) -> bool {
    prop.ignore && prop.access == Access::Auto
}

/// The property carries views and none of them matches the active one.
pub fn view_hides(store: &MetadataStore, prop: &PropertyDescriptor, active: Option<&str>) -> bool {
    match active {
        Some(active) if !prop.views.is_empty() => {
            !prop.views.iter().any(|declared| store.view_matches(declared, active))
        }
        _ => false,
    }
}

/// Whether `key` takes part in serialization at all.
pub fn is_visible(
    store: &MetadataStore,
    class: &ClassDescriptor,
    prop: Option<&PropertyDescriptor>,
    key: &str,
    active_view: Option<&str>,
) -> bool {
    match prop {
        None => !class.ignore_list_hides_key(key, true),
        Some(prop) => {
            !is_ignored(prop)
                && prop.access.readable()
                && !class.ignore_list_hides(prop, true)
                && !view_hides(store, prop, active_view)
                && !reference::is_paired_back(store, class, prop)
        }
    }
}

/// Inclusion rule check; the property's rule wins over the class rule.
pub fn is_excluded(class: &ClassDescriptor, prop: Option<&PropertyDescriptor>, value: &Value) -> bool {
    prop.and_then(|p| p.include)
        .or(class.include)
        .is_some_and(|rule| rule.excludes(value))
}

/// Any-getter entries never resurrect ignored properties.
pub fn hides_any_entry(class: &ClassDescriptor, key: &str) -> bool {
    class.ignore_list_hides_key(key, true)
        || class
            .properties
            .iter()
            .any(|p| is_ignored(p) && (p.name == key || p.wire_name() == key))
}

// ============================================================================
// Rewrites
// ============================================================================

/// format → custom serializer → raw value.
pub fn transform(store: &MetadataStore, prop: &PropertyDescriptor, value: Value) -> Result<Value> {
    let value = match &prop.format {
        Some(spec) => apply_format(store, spec, value)?,
        None => value,
    };
    let value = match &prop.serializer {
        Some(hook) => hook(value)?,
        None => value,
    };
    if prop.raw_value {
        raw_value(value)
    } else {
        Ok(value)
    }
}

/// Substitute an already-serialized JSON string with its parsed content.
pub fn raw_value(value: Value) -> Result<Value> {
    match value {
        Value::String(text) => {
            let json: serde_json::Value = serde_json::from_str(&text)?;
            Ok(Value::from_json(&json))
        }
        other => Ok(other),
    }
}

/// Reshape a value per its format spec.
pub fn apply_format(store: &MetadataStore, spec: &FormatSpec, value: Value) -> Result<Value> {
    Ok(match spec.shape {
        Shape::Any => match value {
            Value::Date(d) if spec.pattern.is_some() => Value::String(spec.format_date(&d)?),
            other => other,
        },
        Shape::Array => match value {
            Value::Null => Value::Null,
            Value::List(items) => Value::List(items),
            Value::Map(map) => Value::List(map.values().cloned().collect()),
            Value::Object(o) => Value::List(positional_fields(store, &o)),
            scalar => Value::List(vec![scalar]),
        },
        Shape::Boolean => Value::Bool(value.is_truthy()),
        Shape::NumberFloat => match value {
            Value::Date(d) => Value::Float(d.timestamp_millis() as f64),
            Value::Int(i) => Value::Float(i as f64),
            Value::Float(f) => Value::Float(f),
            Value::String(s) => Value::Float(parse_float_prefix(&s)),
            _ => Value::Float(f64::NAN),
        },
        Shape::NumberInt => match value {
            Value::Date(d) => Value::Int(d.timestamp_millis()),
            Value::Int(i) => Value::Int(i),
            Value::Float(f) if f.is_finite() => match truncate_to_int(f) {
                Some(i) => Value::Int(i),
                None => return Err(Error::Validation(format!("{f} is outside the integer range"))),
            },
            Value::String(s) => parse_int_prefix(&s).map(Value::Int).unwrap_or(Value::Float(f64::NAN)),
            _ => Value::Float(f64::NAN),
        },
        Shape::Object => match value {
            Value::List(items) => Value::Map(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect::<PropertyMap>(),
            ),
            other => other,
        },
        Shape::Scalar => match value {
            v if v.is_composite() => Value::Null,
            other => other,
        },
        Shape::String => match (value, spec.precision) {
            (Value::Null, _) => Value::Null,
            (Value::Date(d), _) => Value::String(spec.format_date(&d)?),
            (Value::Float(f), Some(digits)) if f.is_finite() => Value::String(format!("{f:.digits$}")),
            (Value::Int(i), Some(digits)) => Value::String(format!("{:.digits$}", i as f64)),
            (other, _) => Value::String(other.to_string()),
        },
    })
}

/// Fields of `object` for the ARRAY shape: declared properties in declared
/// order, then undeclared fields. Absent declared properties become null
/// unless nothing declared follows them, so positions line up with the
/// declared wire names on the way back in.
fn positional_fields(store: &MetadataStore, object: &ObjectRef) -> Vec<Value> {
    let mut fields = object.snapshot().properties;
    let Some(desc) = store.class(&object.class()) else {
        return fields.into_iter().map(|(_, v)| v).collect();
    };
    let declared_len = desc
        .properties
        .iter()
        .rposition(|p| fields.contains_key(&p.name))
        .map_or(0, |last| last + 1);
    let mut out: Vec<Value> = desc.properties[..declared_len]
        .iter()
        .map(|p| fields.remove(&p.name).unwrap_or(Value::Null))
        .collect();
    out.extend(fields.into_iter().map(|(_, v)| v));
    out
}

/// Longest leading decimal number of `text`, NaN when there is none.
fn parse_float_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    text[..end].parse().unwrap_or(f64::NAN)
}

/// Leading integer of `text`.
fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == start {
        return None;
    }
    text[..end].parse().ok()
}
