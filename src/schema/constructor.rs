//! Constructor engine.
//!
//! Builds a complete record from a partial input. Per field:
//!
//! - null on an optional field counts as "not provided" — the key is
//!   omitted from the result entirely;
//! - an absent field is omitted when optional, otherwise it receives its
//!   default (declared, derived from nested props, or the kind built-in);
//! - null on a required field runs the declared transform when there is
//!   one (loose-input coercion), otherwise a nullable field keeps the
//!   null and a non-nullable one falls back to its default;
//! - anything else is transformed (if declared), validated, and deep-cloned
//!   into the result. Dates are re-stamped from the validated value rather
//!   than shared by reference.
//!
//! The caller's input is never mutated.

use serde_json::{Map, Value};

use crate::engine::{fresh_date, ModelEngineOptions};

use super::descriptor::{Descriptor, Kind};
use super::entry::DefaultSpec;
use super::errors::{SchemaError, SchemaResult};
use super::validator;

/// Builds a complete record from `partial`, which must be an object.
pub(crate) fn construct_record(
    fields: &[Descriptor],
    options: &ModelEngineOptions,
    partial: &Value,
) -> SchemaResult<Value> {
    let input = partial.as_object().ok_or(SchemaError::ModelInvalid)?;
    let mut out = Map::new();
    for desc in fields {
        match input.get(&desc.name) {
            None => {
                if !desc.is_optional {
                    out.insert(desc.name.clone(), field_default(desc, options)?);
                }
            }
            Some(Value::Null) if desc.is_optional => {}
            Some(Value::Null) if desc.transform.is_none() => {
                let value = if desc.is_nullable {
                    Value::Null
                } else {
                    field_default(desc, options)?
                };
                out.insert(desc.name.clone(), value);
            }
            Some(raw) => {
                let value = match &desc.transform {
                    Some(transform) => validator::apply_transform(desc, transform, raw)?,
                    None => raw.clone(),
                };
                validator::validate_field(desc, options, Some(&value))?;
                out.insert(desc.name.clone(), clone_field(desc, options, &value));
            }
        }
    }
    Ok(Value::Object(out))
}

/// Resolves a field's default: declared value or thunk first, then `[]` for
/// arrays, then the nested schema's constructor, then the kind built-in.
pub(crate) fn field_default(
    desc: &Descriptor,
    options: &ModelEngineOptions,
) -> SchemaResult<Value> {
    if let Some(spec) = &desc.default {
        return Ok(match spec {
            DefaultSpec::Value(value) => clone_field(desc, options, value),
            DefaultSpec::Thunk(thunk) => thunk(),
        });
    }
    if desc.is_array {
        return Ok(Value::Array(Vec::new()));
    }
    if let Some(nested) = &desc.nested {
        return nested
            .construct_default()
            .map_err(|e| e.prefixed(&desc.name));
    }
    let value = match desc.kind {
        Kind::Str | Kind::Email | Kind::Color => match &desc.format {
            Some(format) => Value::String(format.default_value().to_string()),
            None => Value::String(String::new()),
        },
        Kind::Num => Value::from(0),
        Kind::Bool => Value::Bool(false),
        // Evaluated fresh per call, never cached at compile time.
        Kind::Date => fresh_date(),
        Kind::Pk => Value::from(-1),
        Kind::Fk => {
            if desc.is_nullable {
                Value::Null
            } else {
                Value::from(-1)
            }
        }
        // Reached only for optional/nullable fields; required ones are
        // guaranteed a declared default or props at compile time.
        Kind::Obj | Kind::Enum | Kind::Any => Value::Null,
    };
    Ok(value)
}

/// Deep-clones a validated value into the result. Dates (and date array
/// elements) go through the clone hook with the date flag set so they are
/// reconstructed, not aliased.
fn clone_field(desc: &Descriptor, options: &ModelEngineOptions, value: &Value) -> Value {
    if desc.is_date() {
        if let Value::Array(items) = value {
            return Value::Array(
                items
                    .iter()
                    .map(|item| {
                        if item.is_null() {
                            Value::Null
                        } else {
                            (options.clone_fn)(item, true)
                        }
                    })
                    .collect(),
            );
        }
        if !value.is_null() {
            return (options.clone_fn)(value, true);
        }
    }
    (options.clone_fn)(value, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compiler::CompileMode;
    use crate::schema::entry::SchemaEntry;
    use crate::schema::parser::parse_entry;
    use serde_json::json;
    use std::sync::Arc;

    fn options() -> Arc<ModelEngineOptions> {
        Arc::new(ModelEngineOptions::default())
    }

    fn build(entries: Vec<(&str, SchemaEntry)>, partial: Value) -> SchemaResult<Value> {
        let opts = options();
        let fields: Vec<Descriptor> = entries
            .into_iter()
            .map(|(name, entry)| parse_entry(name, entry, &opts, CompileMode::Model).unwrap())
            .collect();
        construct_record(&fields, &opts, &partial)
    }

    #[test]
    fn test_builtin_defaults() {
        let result = build(
            vec![
                ("id", "pk".into()),
                ("name", "str".into()),
                ("age", "num".into()),
                ("active", "bool".into()),
                ("tags", "str[]".into()),
                ("boss", "fk | null".into()),
            ],
            json!({}),
        )
        .unwrap();
        assert_eq!(
            result,
            json!({
                "id": -1,
                "name": "",
                "age": 0,
                "active": false,
                "tags": [],
                "boss": null,
            })
        );
    }

    #[test]
    fn test_declared_default_wins() {
        let result = build(
            vec![("display_name", SchemaEntry::of("str").default(json!("anon")))],
            json!({}),
        )
        .unwrap();
        assert_eq!(result, json!({ "display_name": "anon" }));
    }

    #[test]
    fn test_thunk_default_evaluated_per_call() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let entry = SchemaEntry::of("num").default_with(move || {
            Value::from(seen.fetch_add(1, Ordering::SeqCst) as i64)
        });
        let opts = options();
        let desc = parse_entry("seq", entry, &opts, CompileMode::Model).unwrap();
        let fields = vec![desc];
        let first = construct_record(&fields, &opts, &json!({})).unwrap();
        let second = construct_record(&fields, &opts, &json!({})).unwrap();
        assert_ne!(first["seq"], second["seq"]);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let result = build(
            vec![("email", "?email".into()), ("name", "str".into())],
            json!({}),
        )
        .unwrap();
        assert_eq!(result, json!({ "name": "" }));
    }

    #[test]
    fn test_null_on_optional_field_is_elided() {
        let result = build(vec![("email", "?email".into())], json!({ "email": null })).unwrap();
        assert_eq!(result, json!({}));
    }

    #[test]
    fn test_null_on_required_nullable_field_stays_null() {
        let result = build(vec![("boss", "fk | null".into())], json!({ "boss": null })).unwrap();
        assert_eq!(result, json!({ "boss": null }));
    }

    #[test]
    fn test_null_on_required_non_nullable_field_gets_default() {
        let result = build(vec![("name", "str".into())], json!({ "name": null })).unwrap();
        assert_eq!(result, json!({ "name": "" }));
    }

    #[test]
    fn test_null_with_transform_goes_through_coercion() {
        let entry = SchemaEntry::of("bool").transform_auto();
        let result = build(vec![("flag", entry)], json!({ "flag": null })).unwrap();
        assert_eq!(result, json!({ "flag": false }));
    }

    #[test]
    fn test_supplied_values_are_validated() {
        let err = build(vec![("age", "num".into())], json!({ "age": "old" })).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn test_array_element_error_propagates() {
        let err = build(
            vec![("tags", "str[]".into())],
            json!({ "tags": ["ok", 42] }),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("tags[1]"));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let entry = SchemaEntry::of("num").transform_auto();
        let opts = options();
        let fields = vec![parse_entry("page", entry, &opts, CompileMode::Model).unwrap()];
        let partial = json!({ "page": "7" });
        let result = construct_record(&fields, &opts, &partial).unwrap();
        assert_eq!(result, json!({ "page": 7 }));
        assert_eq!(partial, json!({ "page": "7" }));
    }

    #[test]
    fn test_date_default_is_fresh_and_valid() {
        let opts = options();
        let fields = vec![parse_entry("created", SchemaEntry::of("date"), &opts, CompileMode::Model).unwrap()];
        let result = construct_record(&fields, &opts, &json!({})).unwrap();
        assert!((opts.date_check)(&result["created"]));
    }

    #[test]
    fn test_supplied_date_is_normalized_not_aliased() {
        let opts = options();
        let fields = vec![parse_entry("when", SchemaEntry::of("date"), &opts, CompileMode::Model).unwrap()];
        let result = construct_record(&fields, &opts, &json!({ "when": "2024-03-01" })).unwrap();
        let text = result["when"].as_str().unwrap();
        assert!(text.starts_with("2024-03-01T00:00:00"));
    }

    #[test]
    fn test_partial_must_be_object() {
        let err = build(vec![("name", "str".into())], json!(42)).unwrap_err();
        assert_eq!(err, SchemaError::ModelInvalid);
    }
}
