//! Cvars: page variables shared by scripts and text substitution.
//!
//! A [`CvarStore`] maps names to scalar [`Value`]s. The build seeds one base
//! store from `config.json`; every page generation works on its own clone, so
//! a script mutating `cvars.title` in one page can never be observed by
//! another page.
//!
//! Text blocks reference cvars with `@name@` placeholders, where `name` is an
//! identifier (`[A-Za-z_][A-Za-z0-9_]*`). [`substitute`] replaces them in a
//! single left-to-right pass: substituted values are never re-scanned, and an
//! `@` that doesn't open a well-formed placeholder (an e-mail address, a lone
//! `@`) is kept as literal text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubstituteError {
    #[error("placeholder @{name}@ references an unset cvar")]
    MissingCvar { name: String },
}

/// A cvar value. Only scalars are representable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Ordered name → value mapping. `Clone` is a deep copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CvarStore {
    vars: BTreeMap<String, Value>,
}

impl CvarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for CvarStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = CvarStore::new();
        for (k, v) in iter {
            store.set(k, v);
        }
        store
    }
}

/// What to do with an `@name@` placeholder whose cvar is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingCvar {
    /// Fail the page.
    #[default]
    Error,
    /// Leave `@name@` in the output.
    Keep,
    /// Replace with nothing.
    Empty,
}

/// Replace every `@name@` placeholder in `text` with the current value of
/// the cvar `name`.
pub fn substitute(
    text: &str,
    store: &CvarStore,
    missing: MissingCvar,
) -> Result<String, SubstituteError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        let name_len = identifier_len(after);

        if name_len == 0 || !after[name_len..].starts_with('@') {
            out.push('@');
            rest = after;
            continue;
        }

        let name = &after[..name_len];
        match (store.get(name), missing) {
            (Some(value), _) => {
                // Writing to a String cannot fail.
                let _ = write!(out, "{}", value);
            }
            (None, MissingCvar::Error) => {
                return Err(SubstituteError::MissingCvar {
                    name: name.to_string(),
                });
            }
            (None, MissingCvar::Keep) => out.push_str(&rest[at..at + name_len + 2]),
            (None, MissingCvar::Empty) => {}
        }
        rest = &after[name_len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Length in bytes of the identifier at the start of `s`, or 0.
fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Whether `name` is usable in an `@name@` placeholder.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && identifier_len(name) == name.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CvarStore {
        [
            ("title", Value::from("Home")),
            ("year", Value::from(2012i64)),
            ("ratio", Value::from(1.5f64)),
            ("draft", Value::from(false)),
            ("nothing", Value::Null),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn replaces_known_placeholders() {
        let out = substitute("<title>@title@ (@year@)</title>", &store(), MissingCvar::Error);
        assert_eq!(out.unwrap(), "<title>Home (2012)</title>");
    }

    #[test]
    fn scalar_display_forms() {
        let s = store();
        assert_eq!(
            substitute("@ratio@|@draft@|@nothing@|", &s, MissingCvar::Error).unwrap(),
            "1.5|false||"
        );
        assert_eq!(Value::Float(2.0).to_string(), "2");
    }

    #[test]
    fn missing_cvar_is_error_by_default() {
        let err = substitute("Hi @who@", &store(), MissingCvar::default()).unwrap_err();
        assert_eq!(
            err,
            SubstituteError::MissingCvar {
                name: "who".to_string()
            }
        );
    }

    #[test]
    fn missing_cvar_keep_and_empty_policies() {
        let s = store();
        assert_eq!(
            substitute("a @who@ b", &s, MissingCvar::Keep).unwrap(),
            "a @who@ b"
        );
        assert_eq!(substitute("a @who@ b", &s, MissingCvar::Empty).unwrap(), "a  b");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let mut s = CvarStore::new();
        s.set("a", "@b@");
        s.set("b", "boom");
        assert_eq!(substitute("@a@", &s, MissingCvar::Error).unwrap(), "@b@");
    }

    #[test]
    fn stray_at_signs_are_literal() {
        let s = store();
        assert_eq!(
            substitute("mail me@example.com @ 5", &s, MissingCvar::Error).unwrap(),
            "mail me@example.com @ 5"
        );
        assert_eq!(substitute("@@title@", &s, MissingCvar::Error).unwrap(), "@Home");
        assert_eq!(substitute("trailing @", &s, MissingCvar::Error).unwrap(), "trailing @");
    }

    #[test]
    fn adjacent_placeholders() {
        assert_eq!(
            substitute("@title@@year@", &store(), MissingCvar::Error).unwrap(),
            "Home2012"
        );
    }

    #[test]
    fn clone_does_not_alias() {
        let base = store();
        let mut page = base.clone();
        page.set("title", "Changed");
        page.set("extra", 1i64);
        assert_eq!(base.get("title"), Some(&Value::from("Home")));
        assert!(!base.contains("extra"));
    }

    #[test]
    fn store_deserializes_scalars() {
        let store: CvarStore = serde_json::from_str(
            r#"{ "n": 3, "x": 0.25, "s": "x", "b": true, "z": null }"#,
        )
        .unwrap();
        assert_eq!(store.get("n"), Some(&Value::Int(3)));
        assert_eq!(store.get("x"), Some(&Value::Float(0.25)));
        assert_eq!(store.get("s"), Some(&Value::from("x")));
        assert_eq!(store.get("b"), Some(&Value::Bool(true)));
        assert_eq!(store.get("z"), Some(&Value::Null));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["b", "n", "s", "x", "z"]);
    }

    #[test]
    fn store_rejects_non_scalars() {
        assert!(serde_json::from_str::<CvarStore>(r#"{ "menu": [1, 2] }"#).is_err());
        assert!(serde_json::from_str::<CvarStore>(r#"{ "nav": { "a": 1 } }"#).is_err());
    }

    #[test]
    fn valid_names() {
        assert!(is_valid_name("page_root"));
        assert!(is_valid_name("_x1"));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name("a-b"));
        assert!(!is_valid_name(""));
    }
}
