//! Pluggable `format` predicates
//!
//! Formats are annotations layered on top of the type check: a predicate only
//! ever sees values that already passed the type check, and formats without a
//! registered predicate always pass.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;

/// A format predicate over a JSON value
pub type FormatPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
static URI_REGEX: OnceLock<Regex> = OnceLock::new();
static HOSTNAME_LABEL_REGEX: OnceLock<Regex> = OnceLock::new();
static BASE64_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
            .expect("Failed to compile email regex")
    })
}

fn uri_regex() -> &'static Regex {
    URI_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:[^\s]*$").expect("Failed to compile uri regex")
    })
}

fn hostname_label_regex() -> &'static Regex {
    HOSTNAME_LABEL_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
            .expect("Failed to compile hostname regex")
    })
}

fn base64_regex() -> &'static Regex {
    BASE64_REGEX.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$")
            .expect("Failed to compile base64 regex")
    })
}

/// Named format predicates, extensible at runtime
#[derive(Clone)]
pub struct FormatRegistry {
    predicates: BTreeMap<String, FormatPredicate>,
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormatRegistry {
    /// A registry without any predicates; every format passes
    pub fn empty() -> Self {
        Self {
            predicates: BTreeMap::new(),
        }
    }

    /// A registry carrying the built-in formats
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_str("email", |s| email_regex().is_match(s));
        registry.register_str("date", |s| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() && s.len() == 10
        });
        registry.register_str("date-time", |s| chrono::DateTime::parse_from_rfc3339(s).is_ok());
        registry.register_str("uuid", is_hyphenated_uuid);
        registry.register_str("uri", |s| uri_regex().is_match(s));
        registry.register_str("ipv4", |s| s.parse::<Ipv4Addr>().is_ok());
        registry.register_str("ipv6", |s| s.parse::<Ipv6Addr>().is_ok());
        registry.register_str("hostname", is_hostname);
        registry.register_str("byte", |s| base64_regex().is_match(s));
        registry.register("int32", |value| integer_in_range(value, i32::MIN as i64, i32::MAX as i64));
        registry.register("int64", |value| integer_in_range(value, i64::MIN, i64::MAX));
        registry
    }

    /// Register or replace the predicate for `name`
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    /// Register a predicate that only applies to strings; other values pass
    pub fn register_str<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.register(name, move |value| match value {
            Value::String(s) => predicate(s),
            _ => true,
        });
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Check `value` against the named format; unknown formats pass
    pub fn check(&self, name: &str, value: &Value) -> bool {
        self.predicates
            .get(name)
            .is_none_or(|predicate| predicate(value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }
}

/// Only the 8-4-4-4-12 hyphenated form; braced, URN and simple forms are rejected
fn is_hyphenated_uuid(s: &str) -> bool {
    s.len() == 36 && uuid::Uuid::parse_str(s).is_ok()
}

fn is_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    !s.is_empty() && s.len() <= 253 && s.split('.').all(|label| hostname_label_regex().is_match(label))
}

fn integer_in_range(value: &Value, min: i64, max: i64) -> bool {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => i >= min && i <= max,
            (None, Some(_)) => false,
            // Fractional numbers are rejected by the type check
            (None, None) => true,
        },
        _ => true,
    }
}
