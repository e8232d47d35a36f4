//! Normalized type descriptors: the compiled form of one schema entry.
//!
//! The parser reduces every entry — compact string or long form — into a
//! [`Descriptor`]: the root [`Kind`], the three independent modifiers
//! (array / optional / nullable) and the behaviors resolved into uniform
//! callables. Descriptors are built once at compile time and never mutated;
//! the validator and constructor only read them.

use std::sync::Arc;

use serde_json::Value;

use super::compiler::CompiledSchema;
use super::entry::DefaultSpec;
use super::formats::StringFormat;

/// The closed set of root kinds a type string can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Num,
    Str,
    Date,
    Email,
    Color,
    Obj,
    Pk,
    Fk,
    Enum,
    Any,
}

impl Kind {
    /// Maps a kind token to its canonical kind. Both the abbreviated and
    /// long spellings are accepted.
    pub(crate) fn from_token(token: &str) -> Option<Self> {
        match token {
            "bool" | "boolean" => Some(Kind::Bool),
            "num" | "number" => Some(Kind::Num),
            "str" | "string" => Some(Kind::Str),
            "date" => Some(Kind::Date),
            "email" => Some(Kind::Email),
            "color" => Some(Kind::Color),
            "obj" | "object" => Some(Kind::Obj),
            "pk" => Some(Kind::Pk),
            "fk" => Some(Kind::Fk),
            "enum" => Some(Kind::Enum),
            "any" => Some(Kind::Any),
            _ => None,
        }
    }

    /// Returns the type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Num | Kind::Pk | Kind::Fk => "number",
            Kind::Str => "string",
            Kind::Date => "date",
            Kind::Email => "email",
            Kind::Color => "color",
            Kind::Obj => "object",
            Kind::Enum => "enum",
            Kind::Any => "any",
        }
    }

    /// True for `pk` / `fk`.
    pub fn is_relational_key(&self) -> bool {
        matches!(self, Kind::Pk | Kind::Fk)
    }

    /// True for the kinds a `range` may attach to.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Kind::Num | Kind::Pk | Kind::Fk)
    }
}

/// Refinement resolved to a uniform predicate.
pub(crate) type ResolvedRefine = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Transform resolved to a fallible coercion; the error is the reason text
/// carried into `SchemaError::TransformFailed`.
pub(crate) type ResolvedTransform = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Range resolved to a closed predicate over numbers.
pub(crate) type ResolvedRange = Arc<dyn Fn(f64) -> bool + Send + Sync>;

/// The compiled form of one field.
pub struct Descriptor {
    pub(crate) name: String,
    pub(crate) kind: Kind,
    pub(crate) is_array: bool,
    pub(crate) is_optional: bool,
    pub(crate) is_nullable: bool,
    /// Declared default, if any. Built-in defaults are synthesized by the
    /// constructor engine when this is `None`.
    pub(crate) default: Option<DefaultSpec>,
    pub(crate) refine: Option<ResolvedRefine>,
    pub(crate) transform: Option<ResolvedTransform>,
    pub(crate) range: Option<ResolvedRange>,
    /// Resolved string format (implicit for email/color kinds, opt-in for
    /// plain strings).
    pub(crate) format: Option<StringFormat>,
    /// Compiled sub-schema when the entry carried nested props.
    pub(crate) nested: Option<Arc<CompiledSchema>>,
}

impl Descriptor {
    /// True when the field is a date kind (dates get re-stamped rather than
    /// shared on clone).
    pub(crate) fn is_date(&self) -> bool {
        self.kind == Kind::Date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_mapping_accepts_both_spellings() {
        assert_eq!(Kind::from_token("num"), Some(Kind::Num));
        assert_eq!(Kind::from_token("number"), Some(Kind::Num));
        assert_eq!(Kind::from_token("obj"), Some(Kind::Obj));
        assert_eq!(Kind::from_token("object"), Some(Kind::Obj));
        assert_eq!(Kind::from_token("horse"), None);
        assert_eq!(Kind::from_token(""), None);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(Kind::Pk.is_relational_key());
        assert!(Kind::Fk.is_relational_key());
        assert!(!Kind::Num.is_relational_key());
        assert!(Kind::Num.is_numeric());
        assert!(Kind::Fk.is_numeric());
        assert!(!Kind::Str.is_numeric());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Kind::Pk.type_name(), "number");
        assert_eq!(Kind::Obj.type_name(), "object");
        assert_eq!(Kind::Bool.type_name(), "bool");
    }
}
