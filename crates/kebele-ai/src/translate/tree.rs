//! Walking a JSON document to collect and replace translatable leaves.
//!
//! Object keys are never translated. Array elements inherit the key of the
//! array that holds them, so `{"tags": ["a", "b"]}` is judged as two leaves
//! under `tags`.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use super::policy::ExclusionPolicy;

/// Collect every translatable string leaf, deduplicated and sorted.
pub fn collect_units(doc: &Value, policy: &ExclusionPolicy) -> BTreeSet<String> {
    let mut units = BTreeSet::new();
    collect(doc, None, policy, &mut units);
    units
}

fn collect(value: &Value, key: Option<&str>, policy: &ExclusionPolicy, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if policy.should_translate(key, s) {
                out.insert(s.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, key, policy, out);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                // Nothing under an excluded key is translated, however deep
                if policy.is_excluded_key(k) {
                    continue;
                }
                collect(v, Some(k), policy, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Copy `doc`, replacing each translatable leaf found in `translations`.
///
/// Leaves the policy rejects are copied as-is even if the same text was
/// translated elsewhere in the document.
pub fn apply_translations(
    doc: &Value,
    policy: &ExclusionPolicy,
    translations: &HashMap<&str, &str>,
) -> Value {
    apply(doc, None, policy, translations)
}

fn apply(
    value: &Value,
    key: Option<&str>,
    policy: &ExclusionPolicy,
    translations: &HashMap<&str, &str>,
) -> Value {
    match value {
        Value::String(s) => {
            if policy.should_translate(key, s)
                && let Some(translated) = translations.get(s.as_str())
            {
                Value::String((*translated).to_string())
            } else {
                value.clone()
            }
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| apply(item, key, policy, translations))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if policy.is_excluded_key(k) {
                        v.clone()
                    } else {
                        apply(v, Some(k), policy, translations)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}
