//! Primitive coercion.
//!
//! One coercer per scalar [`ValueKind`], looked up in [`COERCERS`]. The
//! null rules (empty string/array as null, default values, failing on null)
//! run before the table.

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value as JsonValue;

use crate::config::Features;
use crate::meta::format::parse_date_lenient;
use crate::meta::FormatSpec;
use crate::model::{Value, ValueKind};
use crate::{Error, Result};

/// Everything a coercer may consult.
pub struct CoerceContext<'a> {
    pub features: &'a Features,
    pub format: Option<&'a FormatSpec>,
}

type Coercer = fn(JsonValue, &CoerceContext<'_>) -> Result<Value>;

/// Scalar kind → coercer.
const COERCERS: &[(ScalarKind, Coercer)] = &[
    (ScalarKind::Bool, to_bool),
    (ScalarKind::Int, to_int),
    (ScalarKind::Float, to_float),
    (ScalarKind::String, to_string),
    (ScalarKind::Date, to_date),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
    Date,
}

impl ScalarKind {
    fn of(kind: &ValueKind) -> Option<Self> {
        match kind {
            ValueKind::Bool => Some(ScalarKind::Bool),
            ValueKind::Int => Some(ScalarKind::Int),
            ValueKind::Float => Some(ScalarKind::Float),
            ValueKind::String => Some(ScalarKind::String),
            ValueKind::Date => Some(ScalarKind::Date),
            _ => None,
        }
    }
}

/// Whether a node counts as null for `kind` under the accept-as-null flags.
pub fn is_null_like(node: &JsonValue, kind: &ValueKind, features: &Features) -> bool {
    let de = &features.deserialization;
    match node {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty() && de.accept_empty_string_as_null_object && *kind != ValueKind::String,
        JsonValue::Array(items) => {
            items.is_empty() && de.accept_empty_array_as_null_object && !matches!(kind, ValueKind::List(_))
        }
        _ => false,
    }
}

/// What a null becomes for `kind`.
pub fn null_for(kind: &ValueKind, features: &Features) -> Result<Value> {
    if !kind.is_primitive() {
        return Ok(Value::Null);
    }
    if features.deserialization.fail_on_null_for_primitives {
        return Err(Error::Validation(format!("cannot map null into primitive type {kind}")));
    }
    Ok(features.mapper.default_for(kind).unwrap_or(Value::Null))
}

/// Coerce a scalar node into `kind`.
pub fn coerce(node: JsonValue, kind: &ValueKind, ctx: &CoerceContext<'_>) -> Result<Value> {
    if is_null_like(&node, kind, ctx.features) {
        return null_for(kind, ctx.features);
    }
    let Some(scalar) = ScalarKind::of(kind) else {
        return Ok(Value::from_json(&node));
    };
    match COERCERS.iter().find(|(k, _)| *k == scalar) {
        Some((_, coercer)) => coercer(node, ctx),
        None => Ok(Value::from_json(&node)),
    }
}

fn mismatch(kind: &str, node: &JsonValue) -> Error {
    Error::Validation(format!("cannot coerce {node} into {kind}"))
}

fn to_bool(node: JsonValue, _: &CoerceContext<'_>) -> Result<Value> {
    match &node {
        JsonValue::Bool(b) => Ok(Value::Bool(*b)),
        JsonValue::String(s) => match s.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch("boolean", &node)),
        },
        JsonValue::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        _ => Err(mismatch("boolean", &node)),
    }
}

/// `f` truncated toward zero, `None` when the result does not fit an `i64`.
pub fn truncate_to_int(f: f64) -> Option<i64> {
    let t = f.trunc();
    // 2^63 is exactly representable; i64::MAX is not.
    (t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
}

fn float_to_int(f: f64, ctx: &CoerceContext<'_>, node: &JsonValue) -> Result<Value> {
    if !f.is_finite() {
        return Err(mismatch("integer", node));
    }
    if f.fract() == 0.0 || ctx.features.deserialization.accept_float_as_int {
        truncate_to_int(f)
            .map(Value::Int)
            .ok_or_else(|| Error::Validation(format!("{node} is outside the integer range")))
    } else {
        Err(Error::Validation(format!(
            "cannot coerce floating-point value {node} into integer (accept_float_as_int is off)"
        )))
    }
}

fn to_int(node: JsonValue, ctx: &CoerceContext<'_>) -> Result<Value> {
    match &node {
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => float_to_int(n.as_f64().unwrap_or(f64::NAN), ctx, &node),
        },
        JsonValue::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Ok(Value::Int(i)),
                Err(_) => match s.parse::<f64>() {
                    Ok(f) => float_to_int(f, ctx, &node),
                    Err(_) => Err(mismatch("integer", &node)),
                },
            }
        }
        _ => Err(mismatch("integer", &node)),
    }
}

fn to_float(node: JsonValue, _: &CoerceContext<'_>) -> Result<Value> {
    match &node {
        JsonValue::Number(n) => n.as_f64().map(Value::Float).ok_or_else(|| mismatch("float", &node)),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| mismatch("float", &node)),
        _ => Err(mismatch("float", &node)),
    }
}

fn to_string(node: JsonValue, _: &CoerceContext<'_>) -> Result<Value> {
    match node {
        JsonValue::String(s) => Ok(Value::String(s)),
        JsonValue::Number(n) => Ok(Value::String(n.to_string())),
        JsonValue::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(mismatch("string", &other)),
    }
}

fn to_date(node: JsonValue, ctx: &CoerceContext<'_>) -> Result<Value> {
    match &node {
        JsonValue::String(s) => {
            let date = match ctx.format {
                Some(spec) => spec.parse_date(s)?,
                None => parse_date_lenient(s, &utc()?)?,
            };
            Ok(Value::Date(date))
        }
        JsonValue::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().and_then(truncate_to_int))
                .ok_or_else(|| mismatch("date", &node))?;
            DateTime::<Utc>::from_timestamp_millis(millis)
                .map(Value::Date)
                .ok_or_else(|| mismatch("date", &node))
        }
        _ => Err(mismatch("date", &node)),
    }
}

fn utc() -> Result<FixedOffset> {
    FixedOffset::east_opt(0).ok_or_else(|| Error::Validation("UTC offset".into()))
}
