//! Schema authoring surface.
//!
//! A [`Schema`] is an ordered map of field name → [`SchemaEntry`]. An entry
//! is either a compact type string (`"str"`, `"?num[] | null"`, `"pk"`) or a
//! long-form descriptor built with the [`SchemaEntry`] methods: a default, a
//! refinement, a transform, a numeric range, nested props or a named string
//! format on top of the same type-string vocabulary.
//!
//! Everything except custom closures is JSON-expressible, so a schema can
//! also be authored as a document and parsed with [`Schema::from_value`]:
//!
//! ```json
//! {
//!   "id": "pk",
//!   "name": { "type": "str", "format": "nonemp" },
//!   "age": { "type": "num", "range": [0, 120] },
//!   "role": { "type": "str", "refine": ["admin", "user"] },
//!   "avatar": { "type": "?obj", "props": { "file_name": "str" } }
//! }
//! ```

use std::sync::Arc;

use serde_json::Value;

use super::errors::{ConfigError, ConfigResult};

/// User-supplied refinement predicate.
pub type RefineFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// User-supplied transform function.
pub type TransformFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// User-supplied default-value thunk.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// A refinement, in whichever form the author supplied it. Resolved once at
/// compile time into a uniform predicate.
#[derive(Clone)]
pub enum RefineSpec {
    /// Arbitrary predicate.
    Predicate(RefineFn),
    /// Membership in a list of string literals.
    OneOfStr(Vec<String>),
    /// Membership in a list of numeric literals.
    OneOfNum(Vec<f64>),
    /// Membership in a set of values (enum kinds).
    OneOf(Vec<Value>),
}

/// A transform, in whichever form the author supplied it.
#[derive(Clone)]
pub enum TransformSpec {
    /// Arbitrary coercion function, applied before validation.
    Func(TransformFn),
    /// Kind-appropriate coercion (stringify / parse number / truthiness /
    /// date normalization).
    Auto,
    /// Parse a string value as JSON.
    Json,
}

/// Comparison operator for one-sided ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    pub(crate) fn parse(token: &str) -> Option<Self> {
        match token {
            "<" => Some(CmpOp::Lt),
            ">" => Some(CmpOp::Gt),
            "<=" => Some(CmpOp::Le),
            ">=" => Some(CmpOp::Ge),
            _ => None,
        }
    }

    pub(crate) fn holds(self, value: f64, bound: f64) -> bool {
        match self {
            CmpOp::Lt => value < bound,
            CmpOp::Gt => value > bound,
            CmpOp::Le => value <= bound,
            CmpOp::Ge => value >= bound,
        }
    }
}

/// A numeric range constraint. Bounds are always inclusive for the
/// two-sided form; a reversed tuple is swapped at compile time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeSpec {
    /// Closed interval `[lo, hi]`.
    Between(f64, f64),
    /// One-sided comparison against a bound.
    Cmp(CmpOp, f64),
    /// The `"+"` sentinel: zero or greater.
    NonNegative,
    /// The `"-"` sentinel: strictly below zero.
    Negative,
}

/// A declared default: a plain value, or a thunk evaluated per construction.
#[derive(Clone)]
pub enum DefaultSpec {
    Value(Value),
    Thunk(DefaultFn),
}

/// One field's schema entry.
#[derive(Clone)]
pub struct SchemaEntry {
    pub(crate) type_str: String,
    pub(crate) default: Option<DefaultSpec>,
    pub(crate) refine: Option<RefineSpec>,
    pub(crate) transform: Option<TransformSpec>,
    pub(crate) range: Option<RangeSpec>,
    pub(crate) props: Option<Schema>,
    pub(crate) format: Option<String>,
}

impl SchemaEntry {
    /// Starts a long-form entry from a type string.
    pub fn of(type_str: impl Into<String>) -> Self {
        Self {
            type_str: type_str.into(),
            default: None,
            refine: None,
            transform: None,
            range: None,
            props: None,
            format: None,
        }
    }

    /// Declares a default value. Validated against the entry's own type at
    /// compile time.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultSpec::Value(value.into()));
        self
    }

    /// Declares a default produced by a thunk, evaluated fresh per call.
    pub fn default_with(mut self, thunk: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultSpec::Thunk(Arc::new(thunk)));
        self
    }

    /// Attaches a refinement predicate, evaluated after the base kind check.
    pub fn refine(mut self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.refine = Some(RefineSpec::Predicate(Arc::new(predicate)));
        self
    }

    /// Restricts a string field to a list of literals.
    pub fn one_of_str<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refine = Some(RefineSpec::OneOfStr(
            items.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Restricts a numeric field to a list of literals.
    pub fn one_of_num(mut self, items: impl IntoIterator<Item = f64>) -> Self {
        self.refine = Some(RefineSpec::OneOfNum(items.into_iter().collect()));
        self
    }

    /// Restricts a field to membership in a value set (enum kinds).
    pub fn one_of(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.refine = Some(RefineSpec::OneOf(values.into_iter().collect()));
        self
    }

    /// Attaches a transform, applied to raw input before validation.
    pub fn transform(mut self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.transform = Some(TransformSpec::Func(Arc::new(f)));
        self
    }

    /// Kind-appropriate automatic coercion (the `"auto"` sentinel).
    pub fn transform_auto(mut self) -> Self {
        self.transform = Some(TransformSpec::Auto);
        self
    }

    /// Parse string input as JSON before validating (the `"json"` sentinel).
    pub fn transform_json(mut self) -> Self {
        self.transform = Some(TransformSpec::Json);
        self
    }

    /// Closed numeric range; a reversed tuple is swapped automatically.
    pub fn range(mut self, lo: f64, hi: f64) -> Self {
        self.range = Some(RangeSpec::Between(lo, hi));
        self
    }

    /// One-sided numeric range.
    pub fn range_op(mut self, op: CmpOp, bound: f64) -> Self {
        self.range = Some(RangeSpec::Cmp(op, bound));
        self
    }

    /// The `"+"` range sentinel: non-negative.
    pub fn range_non_negative(mut self) -> Self {
        self.range = Some(RangeSpec::NonNegative);
        self
    }

    /// The `"-"` range sentinel: negative.
    pub fn range_negative(mut self) -> Self {
        self.range = Some(RangeSpec::Negative);
        self
    }

    /// Nested schema for object kinds. The nested schema's validator becomes
    /// this field's refinement and its constructor the default generator.
    pub fn props(mut self, schema: Schema) -> Self {
        self.props = Some(schema);
        self
    }

    /// Names a registered string format whose test and default apply here.
    pub fn format(mut self, name: impl Into<String>) -> Self {
        self.format = Some(name.into());
        self
    }
}

impl From<&str> for SchemaEntry {
    fn from(type_str: &str) -> Self {
        SchemaEntry::of(type_str)
    }
}

impl From<String> for SchemaEntry {
    fn from(type_str: String) -> Self {
        SchemaEntry::of(type_str)
    }
}

/// An ordered field-name → entry map. Order is preserved so compile-time
/// and validation-time errors surface deterministically.
#[derive(Clone, Default)]
pub struct Schema {
    pub(crate) fields: Vec<(String, SchemaEntry)>,
}

impl Schema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Appends a field. Short-form strings and long-form entries both work.
    pub fn field(mut self, name: impl Into<String>, entry: impl Into<SchemaEntry>) -> Self {
        self.fields.push((name.into(), entry.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses the JSON-expressible authoring subset from a document.
    ///
    /// Custom closures cannot appear in a document; literal refine lists,
    /// enum membership objects, the `"auto"`/`"json"` transform sentinels,
    /// ranges, formats, defaults and nested props all can. Unknown entry
    /// keys are rejected.
    pub fn from_value(doc: &Value) -> ConfigResult<Self> {
        let map = doc.as_object().ok_or_else(|| {
            ConfigError::MalformedDocument("schema document must be an object".into())
        })?;
        let mut schema = Schema::new();
        for (name, raw) in map {
            let entry = entry_from_value(name, raw)?;
            schema.fields.push((name.clone(), entry));
        }
        Ok(schema)
    }

    /// Parses a schema document from JSON text.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| ConfigError::MalformedDocument(format!("{}", e)))?;
        Self::from_value(&doc)
    }
}

fn entry_from_value(name: &str, raw: &Value) -> ConfigResult<SchemaEntry> {
    match raw {
        Value::String(type_str) => Ok(SchemaEntry::of(type_str.clone())),
        Value::Object(map) => {
            let mut entry = match map.get("type") {
                Some(Value::String(t)) => SchemaEntry::of(t.clone()),
                _ => {
                    return Err(ConfigError::MalformedDocument(format!(
                        "entry '{}' must carry a string 'type'",
                        name
                    )))
                }
            };
            for (key, val) in map {
                match key.as_str() {
                    "type" => {}
                    "default" => entry.default = Some(DefaultSpec::Value(val.clone())),
                    "refine" => entry.refine = Some(refine_from_value(name, val)?),
                    "transform" => entry.transform = Some(transform_from_value(name, val)?),
                    "range" => entry.range = Some(range_from_value(name, val)?),
                    "props" => {
                        entry.props =
                            Some(Schema::from_value(val).map_err(|e| e.prefixed(name))?);
                    }
                    "format" => match val {
                        Value::String(f) => entry.format = Some(f.clone()),
                        _ => {
                            return Err(ConfigError::MalformedDocument(format!(
                                "format for '{}' must be a string",
                                name
                            )))
                        }
                    },
                    other => {
                        return Err(ConfigError::MalformedDocument(format!(
                            "unknown key '{}' in entry '{}'",
                            other, name
                        )))
                    }
                }
            }
            Ok(entry)
        }
        _ => Err(ConfigError::MalformedDocument(format!(
            "entry '{}' must be a type string or an object",
            name
        ))),
    }
}

fn refine_from_value(name: &str, raw: &Value) -> ConfigResult<RefineSpec> {
    match raw {
        Value::Array(items) if !items.is_empty() => {
            if items.iter().all(Value::is_string) {
                Ok(RefineSpec::OneOfStr(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect(),
                ))
            } else if items.iter().all(Value::is_number) {
                Ok(RefineSpec::OneOfNum(
                    items.iter().filter_map(Value::as_f64).collect(),
                ))
            } else {
                Ok(RefineSpec::OneOf(items.clone()))
            }
        }
        // Enum-membership object: allowed values are the map's values,
        // deduplicated (two-way numeric enum maps repeat them).
        Value::Object(map) if !map.is_empty() => {
            let mut values: Vec<Value> = Vec::new();
            for val in map.values() {
                if !values.contains(val) {
                    values.push(val.clone());
                }
            }
            Ok(RefineSpec::OneOf(values))
        }
        _ => Err(ConfigError::MalformedDocument(format!(
            "refine for '{}' must be a non-empty array or enum object",
            name
        ))),
    }
}

fn transform_from_value(name: &str, raw: &Value) -> ConfigResult<TransformSpec> {
    match raw.as_str() {
        Some("auto") => Ok(TransformSpec::Auto),
        Some("json") => Ok(TransformSpec::Json),
        _ => Err(ConfigError::MalformedDocument(format!(
            "transform for '{}' must be \"auto\" or \"json\"",
            name
        ))),
    }
}

fn range_from_value(name: &str, raw: &Value) -> ConfigResult<RangeSpec> {
    let malformed = || {
        ConfigError::MalformedDocument(format!(
            "range for '{}' must be [lo, hi], [op, bound], \"+\" or \"-\"",
            name
        ))
    };
    match raw {
        Value::String(s) if s == "+" => Ok(RangeSpec::NonNegative),
        Value::String(s) if s == "-" => Ok(RangeSpec::Negative),
        Value::Array(pair) if pair.len() == 2 => match (&pair[0], &pair[1]) {
            (Value::Number(lo), Value::Number(hi)) => {
                match (lo.as_f64(), hi.as_f64()) {
                    (Some(lo), Some(hi)) => Ok(RangeSpec::Between(lo, hi)),
                    _ => Err(malformed()),
                }
            }
            (Value::String(op), Value::Number(bound)) => {
                let op = CmpOp::parse(op).ok_or_else(malformed)?;
                let bound = bound.as_f64().ok_or_else(malformed)?;
                Ok(RangeSpec::Cmp(op, bound))
            }
            _ => Err(malformed()),
        },
        _ => Err(malformed()),
    }
}
