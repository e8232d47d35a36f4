//! Error taxonomy for schema compilation and validation.
//!
//! Two families, raised at different times:
//! - [`ConfigError`] — the schema itself is malformed. Raised while compiling,
//!   before any value is validated. A schema that fails to compile is never
//!   exposed, not even partially.
//! - [`SchemaError`] — a value does not conform to a compiled schema. Raised
//!   synchronously at the first failing field (fail-fast, no accumulation).
//!
//! Every validation error except [`SchemaError::ModelInvalid`] carries the
//! field path it failed at. Nested-object failures are reported with a
//! dotted path (e.g. `avatar.file_name`), array-element failures with an
//! index suffix (e.g. `tags[1]`).

use serde::Serialize;
use thiserror::Error;

/// Result type for validation and construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for schema compilation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Validation-time errors. Serializable so callers can translate failures
/// into structured responses without re-describing them.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum SchemaError {
    #[error("the supplied value was not an object")]
    ModelInvalid,

    #[error("property '{0}' was not present but is required")]
    PropMissing(String),

    #[error("value found for '{0}' was null, but the field is not nullable")]
    NotNullable(String),

    #[error("an array type was specified but '{0}' is not a valid array")]
    NotValidArray(String),

    #[error("property '{0}' is not a valid date")]
    NotValidDate(String),

    #[error("relational key '{0}' must be a number, or null if it's nullable")]
    RelationalKey(String),

    #[error("property '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("property '{0}' failed range validation")]
    RangeValidationFailed(String),

    #[error("property '{0}' does not satisfy its refinement")]
    RefineFailed(String),

    #[error("transform for '{field}' failed: {reason}")]
    TransformFailed { field: String, reason: String },
}

impl SchemaError {
    /// Returns the field path this error is anchored at, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            SchemaError::ModelInvalid => None,
            SchemaError::PropMissing(f)
            | SchemaError::NotNullable(f)
            | SchemaError::NotValidArray(f)
            | SchemaError::NotValidDate(f)
            | SchemaError::RelationalKey(f)
            | SchemaError::RangeValidationFailed(f)
            | SchemaError::RefineFailed(f) => Some(f),
            SchemaError::TypeMismatch { field, .. }
            | SchemaError::TransformFailed { field, .. } => Some(field),
        }
    }

    /// Rewrites the field path as `prefix.field`, so errors surfacing from a
    /// nested schema name the full path from the enclosing record.
    pub(crate) fn prefixed(self, prefix: &str) -> Self {
        self.map_field(|f| format!("{}.{}", prefix, f))
    }

    fn map_field(self, rewrite: impl FnOnce(&str) -> String) -> Self {
        match self {
            SchemaError::ModelInvalid => SchemaError::ModelInvalid,
            SchemaError::PropMissing(f) => SchemaError::PropMissing(rewrite(&f)),
            SchemaError::NotNullable(f) => SchemaError::NotNullable(rewrite(&f)),
            SchemaError::NotValidArray(f) => SchemaError::NotValidArray(rewrite(&f)),
            SchemaError::NotValidDate(f) => SchemaError::NotValidDate(rewrite(&f)),
            SchemaError::RelationalKey(f) => SchemaError::RelationalKey(rewrite(&f)),
            SchemaError::TypeMismatch { field, expected, actual } => SchemaError::TypeMismatch {
                field: rewrite(&field),
                expected,
                actual,
            },
            SchemaError::RangeValidationFailed(f) => {
                SchemaError::RangeValidationFailed(rewrite(&f))
            }
            SchemaError::RefineFailed(f) => SchemaError::RefineFailed(rewrite(&f)),
            SchemaError::TransformFailed { field, reason } => SchemaError::TransformFailed {
                field: rewrite(&field),
                reason,
            },
        }
    }
}

/// Compile-time errors. A schema raising any of these never becomes usable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("schema entry for '{0}' has an empty type")]
    EmptyType(String),

    #[error("unknown type token '{token}' for '{field}'")]
    UnknownType { field: String, token: String },

    #[error("duplicate field '{0}' in schema")]
    DuplicateField(String),

    #[error("relational key '{field}' cannot be {modifier}")]
    RelationalKeyModifier {
        field: String,
        modifier: &'static str,
    },

    #[error("'{0}' declares a range but is not a numeric kind")]
    RangeNotNumeric(String),

    #[error("string format '{format}' for '{field}' is not registered")]
    UnknownFormat { field: String, format: String },

    #[error("'{0}' declares a format but is not a plain string kind")]
    FormatNotString(String),

    #[error("'{0}' declares nested props but is not an object kind")]
    PropsNotObject(String),

    #[error("a refine is required for '{0}'")]
    RefineMissing(String),

    #[error("if '{0}' is required then a default value or nested props must be provided")]
    DefaultMissing(String),

    #[error("default value for '{field}' is invalid: {source}")]
    InvalidDefault {
        field: String,
        #[source]
        source: SchemaError,
    },

    #[error("defaults are not permitted in test schemas: '{0}'")]
    DefaultNotAllowed(String),

    #[error("malformed schema document: {0}")]
    MalformedDocument(String),
}

impl ConfigError {
    /// Prefixes the field path, used when a nested schema fails to compile so
    /// the error names the full path from the root schema.
    pub(crate) fn prefixed(self, prefix: &str) -> Self {
        let join = |f: &str| format!("{}.{}", prefix, f);
        match self {
            ConfigError::EmptyType(f) => ConfigError::EmptyType(join(&f)),
            ConfigError::UnknownType { field, token } => ConfigError::UnknownType {
                field: join(&field),
                token,
            },
            ConfigError::DuplicateField(f) => ConfigError::DuplicateField(join(&f)),
            ConfigError::RelationalKeyModifier { field, modifier } => {
                ConfigError::RelationalKeyModifier {
                    field: join(&field),
                    modifier,
                }
            }
            ConfigError::RangeNotNumeric(f) => ConfigError::RangeNotNumeric(join(&f)),
            ConfigError::UnknownFormat { field, format } => ConfigError::UnknownFormat {
                field: join(&field),
                format,
            },
            ConfigError::FormatNotString(f) => ConfigError::FormatNotString(join(&f)),
            ConfigError::PropsNotObject(f) => ConfigError::PropsNotObject(join(&f)),
            ConfigError::RefineMissing(f) => ConfigError::RefineMissing(join(&f)),
            ConfigError::DefaultMissing(f) => ConfigError::DefaultMissing(join(&f)),
            ConfigError::InvalidDefault { field, source } => ConfigError::InvalidDefault {
                field: join(&field),
                source,
            },
            ConfigError::DefaultNotAllowed(f) => ConfigError::DefaultNotAllowed(join(&f)),
            ConfigError::MalformedDocument(msg) => ConfigError::MalformedDocument(msg),
        }
    }
}
