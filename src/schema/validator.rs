//! Validator engine.
//!
//! Walks a value against a compiled descriptor with a fixed decision order:
//!
//! 1. Absent → allowed only for optional fields.
//! 2. Array kinds → the value must be an array; each element is validated
//!    against the element descriptor, first failure wins.
//! 3. Null → allowed only for nullable fields (per element for arrays; a
//!    null where the array itself should be is not a valid array).
//! 4. Kind dispatch — dates, relational keys, formatted strings, numbers
//!    with ranges, nested objects, enums.
//! 5. Refinement last, after the base kind check passed.
//!
//! Failures are exceptional, not quiet booleans: every mismatch raises the
//! specific [`SchemaError`] for its reason. Validation never mutates the
//! caller's value; transforms run against an internal working copy (see
//! [`normalize_record`] for the opt-in in-place variant).

use serde_json::Value;

use crate::engine::ModelEngineOptions;

use super::descriptor::{Descriptor, Kind};
use super::errors::{SchemaError, SchemaResult};

/// Validates a whole record: the value must be an object, then each schema
/// field is checked in declaration order.
pub(crate) fn validate_record(
    fields: &[Descriptor],
    options: &ModelEngineOptions,
    value: &Value,
) -> SchemaResult<()> {
    let map = value.as_object().ok_or(SchemaError::ModelInvalid)?;
    for desc in fields {
        let raw = map.get(&desc.name);
        match (raw, &desc.transform) {
            (Some(val), Some(transform)) => {
                let transformed = apply_transform(desc, transform, val)?;
                validate_field(desc, options, Some(&transformed))?;
            }
            _ => validate_field(desc, options, raw)?,
        }
    }
    Ok(())
}

/// In-place variant: applies declared transforms to the caller's value,
/// then validates the rewritten record. Downstream readers observe the
/// transformed values.
pub(crate) fn normalize_record(
    fields: &[Descriptor],
    options: &ModelEngineOptions,
    value: &mut Value,
) -> SchemaResult<()> {
    let map = value.as_object_mut().ok_or(SchemaError::ModelInvalid)?;
    for desc in fields {
        if let Some(transform) = &desc.transform {
            if let Some(val) = map.get(&desc.name) {
                let transformed = apply_transform(desc, transform, val)?;
                map.insert(desc.name.clone(), transformed);
            }
        }
    }
    for desc in fields {
        validate_field(desc, options, map.get(&desc.name))?;
    }
    Ok(())
}

pub(crate) fn apply_transform(
    desc: &Descriptor,
    transform: &super::descriptor::ResolvedTransform,
    value: &Value,
) -> SchemaResult<Value> {
    transform(value).map_err(|reason| SchemaError::TransformFailed {
        field: desc.name.clone(),
        reason,
    })
}

/// Validates one field. `None` means the field was absent from the record.
pub(crate) fn validate_field(
    desc: &Descriptor,
    options: &ModelEngineOptions,
    value: Option<&Value>,
) -> SchemaResult<()> {
    let Some(val) = value else {
        if desc.is_optional {
            return Ok(());
        }
        return Err(SchemaError::PropMissing(desc.name.clone()));
    };
    if desc.is_array {
        let Some(items) = val.as_array() else {
            return Err(SchemaError::NotValidArray(desc.name.clone()));
        };
        for (index, item) in items.iter().enumerate() {
            let path = format!("{}[{}]", desc.name, index);
            validate_scalar(desc, options, item, &path)?;
        }
        return Ok(());
    }
    validate_scalar(desc, options, val, &desc.name)
}

/// Scalar (non-array) validation with the field path used for error text.
fn validate_scalar(
    desc: &Descriptor,
    options: &ModelEngineOptions,
    val: &Value,
    path: &str,
) -> SchemaResult<()> {
    if val.is_null() {
        if desc.is_nullable {
            // Null short-circuits: refinements never see it.
            return Ok(());
        }
        return Err(SchemaError::NotNullable(path.to_string()));
    }

    match desc.kind {
        Kind::Date => {
            if !(options.date_check)(val) {
                return Err(SchemaError::NotValidDate(path.to_string()));
            }
        }
        Kind::Pk | Kind::Fk => {
            if !val.is_number() {
                return Err(SchemaError::RelationalKey(path.to_string()));
            }
        }
        Kind::Email => {
            let text = val.as_str().ok_or_else(|| mismatch(desc, val, path))?;
            // Empty string is an allowed "unset" email.
            if let Some(format) = &desc.format {
                if !text.is_empty() && !format.test(text) {
                    return Err(SchemaError::RefineFailed(path.to_string()));
                }
            }
        }
        Kind::Color | Kind::Str => {
            let text = val.as_str().ok_or_else(|| mismatch(desc, val, path))?;
            if let Some(format) = &desc.format {
                if !format.test(text) {
                    return Err(SchemaError::RefineFailed(path.to_string()));
                }
            }
        }
        Kind::Num => {
            if !val.is_number() {
                return Err(mismatch(desc, val, path));
            }
        }
        Kind::Bool => {
            if !val.is_boolean() {
                return Err(mismatch(desc, val, path));
            }
        }
        Kind::Obj => {
            if let Some(nested) = &desc.nested {
                if !val.is_object() {
                    return Err(mismatch(desc, val, path));
                }
                nested
                    .validate(val)
                    .map_err(|e| e.prefixed(path))?;
            }
            // Without nested props the structural check is the refinement's
            // job entirely.
        }
        Kind::Enum => {
            if !val.is_number() && !val.is_string() {
                return Err(mismatch(desc, val, path));
            }
        }
        Kind::Any => {}
    }

    if let Some(range) = &desc.range {
        if let Some(n) = val.as_f64() {
            if !range(n) {
                return Err(SchemaError::RangeValidationFailed(path.to_string()));
            }
        }
    }

    if let Some(refine) = &desc.refine {
        if !refine(val) {
            return Err(SchemaError::RefineFailed(path.to_string()));
        }
    }
    Ok(())
}

fn mismatch(desc: &Descriptor, val: &Value, path: &str) -> SchemaError {
    SchemaError::TypeMismatch {
        field: path.to_string(),
        expected: desc.kind.type_name(),
        actual: json_type_name(val),
    }
}

/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
