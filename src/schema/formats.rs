//! Named string formats: a pluggable table of `{test, default}` pairs.
//!
//! A format supplies a membership test over strings and the default value a
//! constructed record receives when the field is omitted. The `email` and
//! `color` kinds resolve their behavior through this registry, so replacing
//! a built-in changes those kinds everywhere a schema is compiled against
//! the registry. Plain string fields opt in with `format: "<name>"`.
//!
//! Built-ins:
//! - `email` — case-insensitive address check; defaults to `""`
//! - `color` — `#rgb` / `#rrggbb` hex; defaults to `"#ffffff"`
//! - `nonemp` — any non-empty string; defaults to `"_"`

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

type TestFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A single named format: a string predicate plus the default value used
/// when constructing records.
#[derive(Clone)]
pub struct StringFormat {
    test: TestFn,
    default: String,
}

impl StringFormat {
    /// Creates a format from a predicate and a default value.
    pub fn new(
        test: impl Fn(&str) -> bool + Send + Sync + 'static,
        default: impl Into<String>,
    ) -> Self {
        Self {
            test: Arc::new(test),
            default: default.into(),
        }
    }

    /// Runs the membership test.
    pub fn test(&self, value: &str) -> bool {
        (self.test)(value)
    }

    /// Returns the default value for fields using this format.
    pub fn default_value(&self) -> &str {
        &self.default
    }
}

/// Registry of named string formats, consulted at schema-compile time.
///
/// The registry is part of the engine configuration: configure it before
/// compiling schemas; compiled schemas hold resolved format handles and are
/// unaffected by later registry changes.
#[derive(Clone)]
pub struct FormatRegistry {
    formats: HashMap<String, StringFormat>,
}

impl FormatRegistry {
    /// An empty registry with no formats at all.
    pub fn empty() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    /// The built-in registry: `email`, `color` and `nonemp`.
    pub fn builtin() -> Self {
        let email = Regex::new(r"(?i)^[A-Z0-9_'+.-]*[A-Z0-9_+-]@([A-Z0-9][A-Z0-9-]*\.)+[A-Z]{2,}$")
            .expect("email pattern is well-formed");
        let color =
            Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("color pattern is well-formed");

        let mut registry = Self::empty();
        registry.register(
            "email",
            StringFormat::new(
                move |val| {
                    // no lookahead in the regex crate; dot rules checked by hand
                    !val.starts_with('.') && !val.contains("..") && email.is_match(val)
                },
                "",
            ),
        );
        registry.register(
            "color",
            StringFormat::new(move |val| color.is_match(val), "#ffffff"),
        );
        registry.register("nonemp", StringFormat::new(|val| !val.is_empty(), "_"));
        registry
    }

    /// Registers (or replaces) a named format.
    pub fn register(&mut self, name: impl Into<String>, format: StringFormat) {
        self.formats.insert(name.into(), format);
    }

    /// Looks up a format by name.
    pub fn get(&self, name: &str) -> Option<&StringFormat> {
        self.formats.get(name)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin(name: &str) -> StringFormat {
        FormatRegistry::builtin().get(name).unwrap().clone()
    }

    #[test]
    fn test_email_accepts_common_addresses() {
        let email = builtin("email");
        assert!(email.test("john@example.com"));
        assert!(email.test("j.doe+tag@mail.example.co.uk"));
        assert!(email.test("UPPER@EXAMPLE.COM"));
    }

    #[test]
    fn test_email_rejects_malformed_addresses() {
        let email = builtin("email");
        assert!(!email.test("not-an-email"));
        assert!(!email.test(".leading@example.com"));
        assert!(!email.test("double..dot@example.com"));
        assert!(!email.test("noone@nodot"));
        assert!(!email.test(""));
    }

    #[test]
    fn test_color_hex_forms() {
        let color = builtin("color");
        assert!(color.test("#ffffff"));
        assert!(color.test("#0aF"));
        assert!(!color.test("ffffff"));
        assert!(!color.test("#ffff"));
        assert!(!color.test("#gggggg"));
    }

    #[test]
    fn test_nonemp() {
        let nonemp = builtin("nonemp");
        assert!(nonemp.test("x"));
        assert!(!nonemp.test(""));
        assert_eq!(nonemp.default_value(), "_");
    }

    #[test]
    fn test_custom_format_registration() {
        let mut registry = FormatRegistry::builtin();
        registry.register(
            "slug",
            StringFormat::new(
                |val| !val.is_empty() && val.chars().all(|c| c.is_ascii_lowercase() || c == '-'),
                "untitled",
            ),
        );
        let slug = registry.get("slug").unwrap();
        assert!(slug.test("hello-world"));
        assert!(!slug.test("Hello"));
        assert_eq!(slug.default_value(), "untitled");
    }
}
