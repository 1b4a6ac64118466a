//! # Object Graph Model
//!
//! The in-memory side of every conversion: values, ordered property maps,
//! class instances with pointer identity, and declared value kinds.
//!
//! Design rule: NO metadata and NO JSON tree types here beyond the plain-data
//! lift in [`Value::from_json`]. This module is pure data. No traversal
//! state, no I/O.

pub mod kind;
pub mod object;
pub mod property_map;
pub mod value;

pub use kind::ValueKind;
pub use object::{Object, ObjectRef};
pub use property_map::PropertyMap;
pub use value::Value;
