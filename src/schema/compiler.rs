//! Schema compiler.
//!
//! Compilation is eager and fail-fast: every entry is parsed into its
//! descriptor, declared defaults are validated against their own fields,
//! and any nested schema is compiled recursively — all before the schema
//! becomes usable. A schema that compiles is immutable and safe to share
//! across threads; one that does not is never exposed at all.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::engine::ModelEngineOptions;

use super::constructor;
use super::descriptor::Descriptor;
use super::entry::{DefaultSpec, Schema};
use super::errors::{ConfigError, ConfigResult, SchemaError, SchemaResult};
use super::parser;
use super::validator;

/// Whether a schema compiles with construction machinery (`init`) or as a
/// pure validator (`test`, where defaults are not permitted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompileMode {
    Model,
    Test,
}

/// A compiled schema: the immutable descriptor table plus the engine
/// configuration it was compiled against.
pub struct CompiledSchema {
    fields: Vec<Descriptor>,
    options: Arc<ModelEngineOptions>,
}

impl CompiledSchema {
    pub(crate) fn compile(
        schema: Schema,
        options: Arc<ModelEngineOptions>,
        mode: CompileMode,
    ) -> ConfigResult<Self> {
        let mut seen: HashSet<String> = HashSet::with_capacity(schema.fields.len());
        let mut fields = Vec::with_capacity(schema.fields.len());
        for (name, entry) in schema.fields {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateField(name));
            }
            fields.push(parser::parse_entry(&name, entry, &options, mode)?);
        }
        let compiled = Self { fields, options };
        compiled.validate_defaults()?;
        tracing::debug!(fields = compiled.fields.len(), "schema compiled");
        Ok(compiled)
    }

    /// Declared defaults are validated eagerly so a bad default surfaces
    /// here, not on the first construction that happens to need it.
    fn validate_defaults(&self) -> ConfigResult<()> {
        for desc in &self.fields {
            if let Some(spec) = &desc.default {
                let value = match spec {
                    DefaultSpec::Value(value) => value.clone(),
                    DefaultSpec::Thunk(thunk) => thunk(),
                };
                validator::validate_field(desc, &self.options, Some(&value)).map_err(
                    |source| ConfigError::InvalidDefault {
                        field: desc.name.clone(),
                        source,
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Validates a whole record. Fails with the first offending field's
    /// error; the caller's value is never mutated.
    pub fn validate(&self, value: &Value) -> SchemaResult<()> {
        validator::validate_record(&self.fields, &self.options, value)
    }

    /// Boolean convenience over [`CompiledSchema::validate`].
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    /// Validates an array of records (the `test_arr` surface). Element
    /// errors carry an index prefix.
    pub fn validate_array(&self, value: &Value) -> SchemaResult<()> {
        let items = value.as_array().ok_or(SchemaError::ModelInvalid)?;
        for (index, item) in items.iter().enumerate() {
            self.validate(item)
                .map_err(|e| e.prefixed(&format!("[{}]", index)))?;
        }
        Ok(())
    }

    /// Applies declared transforms to the caller's record in place, then
    /// validates it. The explicit opt-in for observing transformed values;
    /// [`CompiledSchema::validate`] is the pure variant.
    pub fn normalize(&self, value: &mut Value) -> SchemaResult<()> {
        validator::normalize_record(&self.fields, &self.options, value)
    }

    /// Builds a complete, defaulted, deep-cloned record from a partial
    /// input object.
    pub fn construct(&self, partial: &Value) -> SchemaResult<Value> {
        constructor::construct_record(&self.fields, &self.options, partial)
    }

    /// Builds a record entirely from defaults, as `construct` over `{}`.
    pub fn construct_default(&self) -> SchemaResult<Value> {
        self.construct(&Value::Object(Map::new()))
    }

    /// Projects one field's validator and default. Returns `None` for
    /// unknown field names — the caller guards, nothing crashes.
    pub fn pick(&self, name: &str) -> Option<PickedField<'_>> {
        let desc = self.fields.iter().find(|d| d.name == name)?;
        Some(PickedField {
            desc,
            options: &self.options,
        })
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|d| d.name.as_str())
    }
}

/// A field-scoped view over a compiled schema: the field's own default and
/// validator, recursively available for nested object fields.
pub struct PickedField<'a> {
    desc: &'a Descriptor,
    options: &'a Arc<ModelEngineOptions>,
}

impl<'a> PickedField<'a> {
    /// A fresh copy of the field's computed default. Never a shared
    /// reference: each call clones (and re-stamps dates).
    pub fn default_value(&self) -> SchemaResult<Value> {
        constructor::field_default(self.desc, self.options)
    }

    /// Validates one value against this field alone. A supplied value is
    /// never "absent", so optional leniency does not apply here; null still
    /// follows the field's nullability.
    pub fn validate(&self, value: &Value) -> SchemaResult<()> {
        validator::validate_field(self.desc, self.options, Some(value))
    }

    /// Boolean convenience over [`PickedField::validate`].
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    /// Recurses into a nested object field. On fields without nested props
    /// this is a guarded stub: it logs and reports `None` rather than
    /// crashing.
    pub fn pick(&self, name: &str) -> Option<PickedField<'a>> {
        let desc: &'a Descriptor = self.desc;
        match &desc.nested {
            Some(nested) => nested.pick(name),
            None => {
                tracing::warn!(
                    field = %desc.name,
                    "pick() called on a field without nested props"
                );
                None
            }
        }
    }
}
