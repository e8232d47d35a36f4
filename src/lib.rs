//! modelforge - a strict, deterministic schema-validation and
//! model-construction engine
//!
//! Schemas are declared with a compact type-string language (`"str"`,
//! `"?num[] | null"`, `"pk"`) or long-form entries carrying defaults,
//! refinements, transforms, ranges, nested props and string formats. A
//! schema compiles once into an immutable [`CompiledSchema`] exposing a
//! validator, a constructor and a field accessor.
//!
//! ```
//! use modelforge::{ModelEngine, Schema};
//! use serde_json::json;
//!
//! let engine = ModelEngine::new();
//! let user = engine
//!     .init(
//!         Schema::new()
//!             .field("id", "pk")
//!             .field("name", "str")
//!             .field("tags", "str[]"),
//!     )
//!     .unwrap();
//!
//! let record = user.construct(&json!({ "name": "alice" })).unwrap();
//! assert_eq!(record, json!({ "id": -1, "name": "alice", "tags": [] }));
//! assert!(user.is_valid(&record));
//! ```

pub mod engine;
pub mod schema;

pub use engine::{ModelEngine, ModelEngineOptions};
pub use schema::{
    CompiledSchema, ConfigError, FormatRegistry, PickedField, Schema, SchemaEntry, SchemaError,
    StringFormat,
};
