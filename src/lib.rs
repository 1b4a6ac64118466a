//! # jackson-rs — Metadata-Driven JSON Object Mapping
//!
//! Converts in-memory object graphs to JSON text and back, steered by an
//! explicit descriptor table instead of hand-written conversion code.
//!
//! ## Design Principles
//!
//! 1. **Descriptors are data**: classes and properties are registered once
//!    into an immutable [`MetadataStore`]; traversals only read it
//! 2. **Declared kinds**: every property names its [`ValueKind`], so the
//!    engine never guesses a container type from a runtime value
//! 3. **Per-call state**: identity records, seen sets and placeholder
//!    tables live and die inside one `stringify`/`parse` call
//! 4. **One error type**: every failure is an [`Error`] variant, propagated
//!    with `?`; soft failures exist only behind feature flags
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use jackson_rs::meta::{ClassDescriptor, MetadataStore, PropertyDescriptor};
//! use jackson_rs::{Object, ObjectMapper, Value, ValueKind};
//!
//! # fn example() -> jackson_rs::Result<()> {
//! let store = MetadataStore::builder()
//!     .register(
//!         ClassDescriptor::new("Book")
//!             .property(PropertyDescriptor::new("title").kind(ValueKind::String))
//!             .property(PropertyDescriptor::new("pages").kind(ValueKind::Int).rename("pageCount")),
//!     )
//!     .build()?;
//! let mapper = ObjectMapper::new(Arc::new(store));
//!
//! let book = Value::from(Object::new("Book").with_property("title", "Dune").with_property("pages", 412));
//! let text = mapper.stringify(&book)?;
//! assert_eq!(text, r#"{"title":"Dune","pageCount":412}"#);
//!
//! let back = mapper.parse(&text, &ValueKind::object("Book"))?;
//! assert_eq!(back, book);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | Values, ordered maps, objects with pointer identity |
//! | [`meta`] | Class/property descriptors and the metadata store |
//! | [`resolver`] | Polymorphic discriminators, both directions |
//! | [`identity`] | Id sequence, UUIDs, per-call identity tables |
//! | [`reference`] | Managed/back reference pairing |
//! | [`ser`] | Stringifier and its property pipeline |
//! | [`de`] | Builder and primitive coercion |
//! | [`mapper`] | The [`ObjectMapper`] facade |
//! | [`config`] | Feature flags |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod meta;
pub mod config;
pub mod resolver;
pub mod identity;
pub mod reference;
pub mod ser;
pub mod de;
pub mod mapper;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{Object, ObjectRef, PropertyMap, Value, ValueKind};

// ============================================================================
// Re-exports: Metadata
// ============================================================================

pub use meta::{ClassDescriptor, MetadataStore, PropertyDescriptor};

// ============================================================================
// Re-exports: Mapper and configuration
// ============================================================================

pub use config::{Features, ParseOptions, StringifyOptions};
pub use identity::IdSequence;
pub use mapper::{CustomDeserializer, CustomMapper, CustomSerializer, MapperTarget, ObjectMapper};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A property refers directly to its own object.
    #[error("Direct self-reference leading to cycle (through reference chain: {class}[\"{property}\"])")]
    Cycle { class: String, property: String },

    /// An object reappeared on the active path with no identity to stand in for it.
    #[error("Infinite recursion on key \"{key}\" of type \"{class}\"")]
    InfiniteRecursion { key: String, class: String },

    #[error("Unrecognized field \"{property}\" of class \"{class}\", not marked as ignorable")]
    UnknownProperty { class: String, property: String },

    #[error("Type resolution error: {0}")]
    TypeResolution(String),

    #[error("Unresolved object id(s): {0}")]
    UnresolvedIdentity(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Unwrapped property requires use of type information: cannot serialize without disabling fail_on_unwrapped_type_identifiers (through reference chain: {class}[\"{property}\"])")]
    UnwrapTypeConflict { class: String, property: String },

    #[error("Creator argument error on \"{class}\": {message}")]
    CreatorArgument { class: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure raised by a user hook.
    #[error("{0}")]
    Custom(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
