//! Which string leaves of a document are natural-language text.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate};
use uuid::Uuid;

/// Keys whose values are identifiers, enums or machine data.
const EXCLUDED_KEYS: &[&str] = &[
    "id",
    "_id",
    "uuid",
    "role",
    "type",
    "kind",
    "status",
    "slug",
    "code",
    "lang",
    "language",
    "email",
    "phone",
    "url",
    "href",
    "link",
    "path",
    "image",
    "icon",
    "avatar",
    "token",
    "currency",
    "source",
    "version",
    "created_at",
    "updated_at",
    "deleted_at",
    "timestamp",
];

/// Suffixes matched case-insensitively.
const EXCLUDED_SUFFIXES: &[&str] = &["_id", "_at", "_url", "_type"];

/// Decides whether a string leaf is sent for translation.
///
/// A leaf is skipped when its key is excluded or when the value itself
/// looks like data (numbers, URLs, emails, UUIDs, dates).
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    extra_keys: HashSet<String>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExclusionPolicy {
    /// Policy with only the built-in exclusions.
    pub fn new() -> Self {
        Self {
            extra_keys: HashSet::new(),
        }
    }

    /// Exclude additional keys (case-insensitive).
    pub fn with_extra_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_keys
            .extend(keys.into_iter().map(|k| k.as_ref().to_ascii_lowercase()));
        self
    }

    /// Whether values under `key` are kept out of translation.
    pub fn is_excluded_key(&self, key: &str) -> bool {
        let lower = key.to_ascii_lowercase();
        if EXCLUDED_KEYS.contains(&lower.as_str()) || self.extra_keys.contains(&lower) {
            return true;
        }
        if EXCLUDED_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            return true;
        }
        // camelCase identifiers: userId, procedureID
        key.len() > 2 && (key.ends_with("Id") || key.ends_with("ID"))
    }

    /// Whether a value is data rather than prose, regardless of key.
    pub fn is_untranslatable_value(&self, value: &str) -> bool {
        let v = value.trim();
        v.is_empty()
            || looks_like_number(v)
            || looks_like_url(v)
            || looks_like_email(v)
            || Uuid::parse_str(v).is_ok()
            || DateTime::parse_from_rfc3339(v).is_ok()
            || NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok()
    }

    /// Whether a leaf under `key` (if any) with `value` gets translated.
    pub fn should_translate(&self, key: Option<&str>, value: &str) -> bool {
        if let Some(key) = key
            && self.is_excluded_key(key)
        {
            return false;
        }
        !self.is_untranslatable_value(value)
    }
}

fn looks_like_number(v: &str) -> bool {
    // f64 parsing also accepts words like "inf" and "NaN"
    v.parse::<f64>().is_ok() && v.chars().any(|c| c.is_ascii_digit())
}

fn looks_like_url(v: &str) -> bool {
    let lower = v.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:"))
        && !v.contains(char::is_whitespace)
}

fn looks_like_email(v: &str) -> bool {
    if v.contains(char::is_whitespace) {
        return false;
    }
    match v.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
