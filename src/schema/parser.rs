//! Type-descriptor parser.
//!
//! Reduces one schema entry into a normalized [`Descriptor`]:
//!
//! 1. Strip modifiers from the type string in fixed order: the ` | null`
//!    suffix (nullable), then the `?` prefix (optional), then the `[]`
//!    suffix (array). The remainder is the root kind token.
//! 2. Map the token to a [`Kind`]; unknown tokens fail compilation.
//! 3. Resolve the attached behaviors — refine, transform, range, format,
//!    nested props — into uniform callables, once, so validation never
//!    re-interprets the entry.
//!
//! All schema invariants that can be checked per-field are enforced here,
//! before any value is ever validated.

use std::sync::Arc;

use serde_json::Value;

use crate::engine::{format_datetime, parse_datetime, ModelEngineOptions};

use super::compiler::{CompileMode, CompiledSchema};
use super::descriptor::{Descriptor, Kind, ResolvedRange, ResolvedRefine, ResolvedTransform};
use super::entry::{RangeSpec, RefineSpec, SchemaEntry, TransformSpec};
use super::errors::{ConfigError, ConfigResult};

/// Parses one entry into its descriptor. Never panics; every malformed
/// entry is a [`ConfigError`].
pub(crate) fn parse_entry(
    name: &str,
    entry: SchemaEntry,
    options: &Arc<ModelEngineOptions>,
    mode: CompileMode,
) -> ConfigResult<Descriptor> {
    let SchemaEntry {
        type_str,
        default,
        refine,
        transform,
        range,
        props,
        format,
    } = entry;

    if type_str.is_empty() {
        return Err(ConfigError::EmptyType(name.to_string()));
    }

    // Modifier stripping, in fixed order: nullable, optional, array.
    let mut token = type_str.as_str();
    let is_nullable = token.ends_with(" | null");
    if is_nullable {
        token = &token[..token.len() - " | null".len()];
    }
    let is_optional = token.starts_with('?');
    if is_optional {
        token = &token[1..];
    }
    let is_array = token.ends_with("[]");
    if is_array {
        token = &token[..token.len() - 2];
    }

    let kind = Kind::from_token(token).ok_or_else(|| ConfigError::UnknownType {
        field: name.to_string(),
        token: token.to_string(),
    })?;

    if kind.is_relational_key() {
        if is_array {
            return Err(relational_modifier(name, "an array"));
        }
        if is_optional {
            return Err(relational_modifier(name, "optional"));
        }
        if kind == Kind::Pk && is_nullable {
            return Err(relational_modifier(name, "nullable"));
        }
    }

    if mode == CompileMode::Test && default.is_some() {
        return Err(ConfigError::DefaultNotAllowed(name.to_string()));
    }

    // Nested props compile recursively; a failing sub-schema aborts this
    // one, with the field path prefixed onto the inner error.
    let nested = match props {
        Some(sub) => {
            if kind != Kind::Obj {
                return Err(ConfigError::PropsNotObject(name.to_string()));
            }
            let compiled = CompiledSchema::compile(sub, Arc::clone(options), mode)
                .map_err(|e| e.prefixed(name))?;
            Some(Arc::new(compiled))
        }
        None => None,
    };

    let format = resolve_format(name, kind, format.as_deref(), options)?;
    let range = resolve_range(name, kind, range)?;
    let refine = refine.and_then(resolve_refine);
    let transform = transform.map(|t| resolve_transform(kind, t));

    // Invariants that make construction total. Object kinds with neither
    // props nor refine would accept anything; required fields without a
    // derivable default could never be constructed from `{}`.
    match kind {
        Kind::Obj => {
            if nested.is_none() && refine.is_none() {
                return Err(ConfigError::RefineMissing(name.to_string()));
            }
            if !is_array
                && !is_optional
                && !is_nullable
                && nested.is_none()
                && default.is_none()
                && mode == CompileMode::Model
            {
                return Err(ConfigError::DefaultMissing(name.to_string()));
            }
        }
        Kind::Enum | Kind::Any => {
            if refine.is_none() {
                return Err(ConfigError::RefineMissing(name.to_string()));
            }
            if !is_optional && !is_nullable && default.is_none() && mode == CompileMode::Model {
                return Err(ConfigError::DefaultMissing(name.to_string()));
            }
        }
        _ => {}
    }

    Ok(Descriptor {
        name: name.to_string(),
        kind,
        is_array,
        is_optional,
        is_nullable,
        default,
        refine,
        transform,
        range,
        format,
        nested,
    })
}

fn relational_modifier(name: &str, modifier: &'static str) -> ConfigError {
    ConfigError::RelationalKeyModifier {
        field: name.to_string(),
        modifier,
    }
}

/// Email and color resolve their formats implicitly; plain strings opt in
/// by name. Formats anywhere else are a configuration mistake.
fn resolve_format(
    name: &str,
    kind: Kind,
    format: Option<&str>,
    options: &ModelEngineOptions,
) -> ConfigResult<Option<crate::schema::formats::StringFormat>> {
    let lookup = |format_name: &str| {
        options
            .formats
            .get(format_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFormat {
                field: name.to_string(),
                format: format_name.to_string(),
            })
    };
    match (kind, format) {
        (Kind::Email, _) => Ok(Some(lookup("email")?)),
        (Kind::Color, _) => Ok(Some(lookup("color")?)),
        (Kind::Str, Some(format_name)) => Ok(Some(lookup(format_name)?)),
        (_, Some(_)) => Err(ConfigError::FormatNotString(name.to_string())),
        _ => Ok(None),
    }
}

fn resolve_range(name: &str, kind: Kind, range: Option<RangeSpec>) -> ConfigResult<Option<ResolvedRange>> {
    let Some(spec) = range else {
        return Ok(None);
    };
    if !kind.is_numeric() {
        return Err(ConfigError::RangeNotNumeric(name.to_string()));
    }
    let check: ResolvedRange = match spec {
        RangeSpec::Between(a, b) => {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            Arc::new(move |n| n >= lo && n <= hi)
        }
        RangeSpec::Cmp(op, bound) => Arc::new(move |n| op.holds(n, bound)),
        RangeSpec::NonNegative => Arc::new(|n| n >= 0.0),
        RangeSpec::Negative => Arc::new(|n| n < 0.0),
    };
    Ok(Some(check))
}

/// Resolves a refine spec into a uniform predicate. Empty literal lists are
/// treated as no refinement at all.
fn resolve_refine(spec: RefineSpec) -> Option<ResolvedRefine> {
    match spec {
        RefineSpec::Predicate(f) => Some(f),
        RefineSpec::OneOfStr(items) => {
            if items.is_empty() {
                return None;
            }
            Some(Arc::new(move |val| {
                val.as_str().is_some_and(|s| items.iter().any(|item| item == s))
            }))
        }
        RefineSpec::OneOfNum(items) => {
            if items.is_empty() {
                return None;
            }
            Some(Arc::new(move |val| {
                val.as_f64().is_some_and(|n| items.iter().any(|item| *item == n))
            }))
        }
        RefineSpec::OneOf(values) => {
            if values.is_empty() {
                return None;
            }
            Some(Arc::new(move |val| {
                values.iter().any(|allowed| values_equal(allowed, val))
            }))
        }
    }
}

/// Membership equality: numbers compare by value (`1` and `1.0` are the
/// same member), everything else structurally.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn resolve_transform(kind: Kind, spec: TransformSpec) -> ResolvedTransform {
    match spec {
        TransformSpec::Func(f) => Arc::new(move |val| Ok(f(val))),
        // Only strings are parsed; anything already structured passes
        // through untouched, which keeps the transform idempotent (a
        // constructed record re-validates cleanly).
        TransformSpec::Json => Arc::new(|val| match val {
            Value::String(text) => {
                serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))
            }
            other => Ok(other.clone()),
        }),
        TransformSpec::Auto => match kind {
            Kind::Str | Kind::Email | Kind::Color => Arc::new(auto_string),
            Kind::Num | Kind::Pk | Kind::Fk => Arc::new(auto_number),
            Kind::Bool => Arc::new(auto_bool),
            Kind::Date => Arc::new(auto_date),
            // No meaningful coercion for the remaining kinds.
            _ => Arc::new(|val: &Value| Ok(val.clone())),
        },
    }
}

fn auto_string(val: &Value) -> Result<Value, String> {
    match val {
        Value::String(_) => Ok(val.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(format!("cannot stringify {}", type_of(other))),
    }
}

fn auto_number(val: &Value) -> Result<Value, String> {
    match val {
        Value::Number(_) => Ok(val.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Value::from(0));
            }
            trimmed
                .parse::<f64>()
                .map(number_value)
                .map_err(|_| format!("'{}' is not numeric", s))
        }
        Value::Bool(b) => Ok(Value::from(if *b { 1 } else { 0 })),
        Value::Null => Ok(Value::from(0)),
        other => Err(format!("cannot coerce {} to a number", type_of(other))),
    }
}

fn auto_bool(val: &Value) -> Result<Value, String> {
    let truthy = match val {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    };
    Ok(Value::Bool(truthy))
}

fn auto_date(val: &Value) -> Result<Value, String> {
    parse_datetime(val)
        .map(|dt| Value::String(format_datetime(dt)))
        .ok_or_else(|| format!("cannot coerce {} to a date", type_of(val)))
}

/// Collapses a float back to an integer number where it is one, so coerced
/// values round-trip as `1234` rather than `1234.0`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn type_of(val: &Value) -> &'static str {
    match val {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> Arc<ModelEngineOptions> {
        Arc::new(ModelEngineOptions::default())
    }

    fn parse(name: &str, entry: impl Into<SchemaEntry>) -> ConfigResult<Descriptor> {
        parse_entry(name, entry.into(), &options(), CompileMode::Model)
    }

    #[test]
    fn test_modifier_stripping_order() {
        let desc = parse("flags", "?bool[] | null").unwrap();
        assert_eq!(desc.kind, Kind::Bool);
        assert!(desc.is_array);
        assert!(desc.is_optional);
        assert!(desc.is_nullable);
    }

    #[test]
    fn test_plain_kinds() {
        assert_eq!(parse("n", "num").unwrap().kind, Kind::Num);
        assert_eq!(parse("n", "number").unwrap().kind, Kind::Num);
        assert_eq!(parse("s", "string").unwrap().kind, Kind::Str);
        assert_eq!(parse("d", "date").unwrap().kind, Kind::Date);
    }

    #[test]
    fn test_unknown_token_rejected() {
        assert!(matches!(
            parse("x", "horse"),
            Err(ConfigError::UnknownType { .. })
        ));
        assert!(matches!(parse("x", ""), Err(ConfigError::EmptyType(_))));
    }

    #[test]
    fn test_relational_key_modifiers_rejected() {
        assert!(matches!(
            parse("id", "?pk"),
            Err(ConfigError::RelationalKeyModifier { .. })
        ));
        assert!(matches!(
            parse("id", "pk | null"),
            Err(ConfigError::RelationalKeyModifier { .. })
        ));
        assert!(matches!(
            parse("ids", "fk[]"),
            Err(ConfigError::RelationalKeyModifier { .. })
        ));
        assert!(parse("boss", "fk | null").unwrap().is_nullable);
    }

    #[test]
    fn test_email_and_color_get_implicit_formats() {
        assert!(parse("e", "?email").unwrap().format.is_some());
        assert!(parse("c", "color").unwrap().format.is_some());
        assert!(parse("s", "str").unwrap().format.is_none());
    }

    #[test]
    fn test_format_on_non_string_rejected() {
        let entry = SchemaEntry::of("num").format("nonemp");
        assert!(matches!(
            parse("n", entry),
            Err(ConfigError::FormatNotString(_))
        ));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let entry = SchemaEntry::of("str").format("zipcode");
        assert!(matches!(
            parse("z", entry),
            Err(ConfigError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn test_range_on_non_numeric_rejected() {
        let entry = SchemaEntry::of("str").range(0.0, 10.0);
        assert!(matches!(
            parse("s", entry),
            Err(ConfigError::RangeNotNumeric(_))
        ));
    }

    #[test]
    fn test_range_auto_swap() {
        let desc = parse("n", SchemaEntry::of("num").range(100.0, 1.0)).unwrap();
        let check = desc.range.unwrap();
        assert!(check(1.0));
        assert!(check(100.0));
        assert!(!check(0.0));
        assert!(!check(101.0));
    }

    #[test]
    fn test_range_sentinels() {
        let plus = parse("n", SchemaEntry::of("num").range_non_negative())
            .unwrap()
            .range
            .unwrap();
        assert!(plus(0.0));
        assert!(!plus(-0.5));
        let minus = parse("n", SchemaEntry::of("num").range_negative())
            .unwrap()
            .range
            .unwrap();
        assert!(minus(-1.0));
        assert!(!minus(0.0));
    }

    #[test]
    fn test_literal_refine_membership() {
        let desc = parse("dir", SchemaEntry::of("str").one_of_str(["asc", "desc", ""])).unwrap();
        let refine = desc.refine.unwrap();
        assert!(refine(&json!("asc")));
        assert!(refine(&json!("")));
        assert!(!refine(&json!("cheese")));
        assert!(!refine(&json!(42)));
    }

    #[test]
    fn test_numeric_refine_membership() {
        let desc = parse("lvl", SchemaEntry::of("num").one_of_num([0.0, 1.0, 2.0])).unwrap();
        let refine = desc.refine.unwrap();
        assert!(refine(&json!(1)));
        assert!(refine(&json!(1.0)));
        assert!(!refine(&json!(3)));
    }

    #[test]
    fn test_empty_literal_list_is_no_refine() {
        let desc = parse("dir", SchemaEntry::of("str").one_of_str(Vec::<String>::new())).unwrap();
        assert!(desc.refine.is_none());
    }

    #[test]
    fn test_obj_without_refine_or_props_rejected() {
        assert!(matches!(
            parse("avatar", "?obj"),
            Err(ConfigError::RefineMissing(_))
        ));
    }

    #[test]
    fn test_required_obj_needs_default() {
        let entry = SchemaEntry::of("obj").refine(|v| v.is_object());
        assert!(matches!(
            parse("avatar", entry),
            Err(ConfigError::DefaultMissing(_))
        ));
        // Optional, nullable and defaulted variants are all fine.
        assert!(parse("a", SchemaEntry::of("?obj").refine(|v| v.is_object())).is_ok());
        assert!(parse("a", SchemaEntry::of("obj | null").refine(|v| v.is_object())).is_ok());
        let defaulted = SchemaEntry::of("obj")
            .refine(|v| v.is_object())
            .default(json!({}));
        assert!(parse("a", defaulted).is_ok());
    }

    #[test]
    fn test_enum_requires_refine_and_default() {
        assert!(matches!(
            parse("status", "enum"),
            Err(ConfigError::RefineMissing(_))
        ));
        let no_default = SchemaEntry::of("enum").one_of([json!(0), json!(1)]);
        assert!(matches!(
            parse("status", no_default),
            Err(ConfigError::DefaultMissing(_))
        ));
        let full = SchemaEntry::of("enum").one_of([json!(0), json!(1)]).default(json!(0));
        assert!(parse("status", full).is_ok());
    }

    #[test]
    fn test_defaults_rejected_in_test_mode() {
        let entry: SchemaEntry = SchemaEntry::of("str").default(json!(""));
        let result = parse_entry("s", entry, &options(), CompileMode::Test);
        assert!(matches!(result, Err(ConfigError::DefaultNotAllowed(_))));
    }

    #[test]
    fn test_auto_number_coercions() {
        assert_eq!(auto_number(&json!("1234")).unwrap(), json!(1234));
        assert_eq!(auto_number(&json!("12.5")).unwrap(), json!(12.5));
        assert_eq!(auto_number(&json!("")).unwrap(), json!(0));
        assert_eq!(auto_number(&json!(true)).unwrap(), json!(1));
        assert_eq!(auto_number(&json!(null)).unwrap(), json!(0));
        assert!(auto_number(&json!("horse")).is_err());
        assert!(auto_number(&json!([1])).is_err());
    }

    #[test]
    fn test_auto_bool_truthiness() {
        assert_eq!(auto_bool(&json!(null)).unwrap(), json!(false));
        assert_eq!(auto_bool(&json!(0)).unwrap(), json!(false));
        assert_eq!(auto_bool(&json!("")).unwrap(), json!(false));
        assert_eq!(auto_bool(&json!("x")).unwrap(), json!(true));
        assert_eq!(auto_bool(&json!(2)).unwrap(), json!(true));
        assert_eq!(auto_bool(&json!({})).unwrap(), json!(true));
    }

    #[test]
    fn test_auto_string_coercions() {
        assert_eq!(auto_string(&json!(1234)).unwrap(), json!("1234"));
        assert_eq!(auto_string(&json!(true)).unwrap(), json!("true"));
        assert!(auto_string(&json!({})).is_err());
    }

    #[test]
    fn test_json_transform() {
        let transform = resolve_transform(Kind::Obj, TransformSpec::Json);
        let parsed = transform(&json!("{\"a\": 1}")).unwrap();
        assert_eq!(parsed, json!({ "a": 1 }));
        assert!(transform(&json!("{nope")).is_err());
        // Structured input passes through untouched.
        assert_eq!(transform(&json!({ "a": 1 })).unwrap(), json!({ "a": 1 }));
    }
}
