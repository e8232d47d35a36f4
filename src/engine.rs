//! Engine entry points and injected collaborators.
//!
//! A [`ModelEngine`] compiles schemas against an explicit configuration
//! value ([`ModelEngineOptions`]): the deep-clone hook, the date-validity
//! predicate, and the string-format registry. Configuration is captured at
//! compile time — compiled schemas keep the options they were built with,
//! so reconfiguring an engine never changes schemas already compiled.
//!
//! Three ways to compile:
//! - [`ModelEngine::init`] — the full surface: validator, constructor and
//!   field accessor.
//! - [`ModelEngine::test`] — a pure validator; entries carrying defaults
//!   are rejected at compile time.
//! - [`ModelEngine::test_arr`] — as `test`, for validating arrays of
//!   records via [`CompiledSchema::validate_array`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::schema::compiler::{CompileMode, CompiledSchema};
use crate::schema::{ConfigResult, FormatRegistry, Schema};

/// Deep-clone hook: `(value, is_date)` → cloned value. The date flag asks
/// for reconstruction (a fresh, normalized date value) instead of aliasing.
pub type CloneFn = Arc<dyn Fn(&Value, bool) -> Value + Send + Sync>;

/// Date-validity predicate over raw values.
pub type DateCheckFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Injected collaborators, configured before any schema compiles.
#[derive(Clone)]
pub struct ModelEngineOptions {
    pub(crate) clone_fn: CloneFn,
    pub(crate) date_check: DateCheckFn,
    pub(crate) formats: FormatRegistry,
}

impl Default for ModelEngineOptions {
    fn default() -> Self {
        Self {
            clone_fn: Arc::new(default_clone),
            date_check: Arc::new(default_date_check),
            formats: FormatRegistry::builtin(),
        }
    }
}

impl ModelEngineOptions {
    /// Replaces the deep-clone hook.
    pub fn with_clone_fn(
        mut self,
        clone_fn: impl Fn(&Value, bool) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.clone_fn = Arc::new(clone_fn);
        self
    }

    /// Replaces the date-validity predicate.
    pub fn with_date_check(
        mut self,
        date_check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.date_check = Arc::new(date_check);
        self
    }

    /// Replaces the whole string-format registry.
    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    /// Registers (or replaces) a single named string format.
    pub fn with_format(
        mut self,
        name: impl Into<String>,
        format: crate::schema::StringFormat,
    ) -> Self {
        self.formats.register(name, format);
        self
    }
}

/// Compiles schemas. Cheap to clone; compiled schemas share the options by
/// reference and may outlive the engine.
#[derive(Clone, Default)]
pub struct ModelEngine {
    options: Arc<ModelEngineOptions>,
}

impl ModelEngine {
    /// An engine with the default hooks and the built-in format registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with custom collaborators.
    pub fn with_options(options: ModelEngineOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    /// Compiles the full schema surface: validator, constructor, accessor.
    /// All compile-time invariants are enforced here, synchronously.
    pub fn init(&self, schema: Schema) -> ConfigResult<CompiledSchema> {
        CompiledSchema::compile(schema, Arc::clone(&self.options), CompileMode::Model)
    }

    /// Compiles a validation-only schema. Defaults are not permitted.
    pub fn test(&self, schema: Schema) -> ConfigResult<CompiledSchema> {
        CompiledSchema::compile(schema, Arc::clone(&self.options), CompileMode::Test)
    }

    /// Compiles a validation-only schema intended for arrays of records;
    /// check values with [`CompiledSchema::validate_array`].
    pub fn test_arr(&self, schema: Schema) -> ConfigResult<CompiledSchema> {
        self.test(schema)
    }
}

/// Parses a raw value as a timestamp: RFC 3339, a couple of common naive
/// string forms, or a numeric epoch-milliseconds value.
pub(crate) fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
            }
            None
        }
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

/// Canonical rendering for date values: RFC 3339 UTC with milliseconds.
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A fresh "now" date value, evaluated at call time.
pub(crate) fn fresh_date() -> Value {
    Value::String(format_datetime(Utc::now()))
}

/// Default deep clone. `serde_json` values clone structurally; dates are
/// re-parsed and re-rendered canonically instead of copied verbatim.
fn default_clone(value: &Value, is_date: bool) -> Value {
    if is_date {
        if let Some(dt) = parse_datetime(value) {
            return Value::String(format_datetime(dt));
        }
    }
    value.clone()
}

fn default_date_check(value: &Value) -> bool {
    parse_datetime(value).is_some()
}
