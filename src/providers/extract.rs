//! Tolerant field extraction over provider JSON.
//!
//! Vendors change field names and nesting without notice, so adapters do not
//! mirror wire formats with typed structs. Instead each lookup is an ordered
//! list of candidate paths over a generic [`serde_json::Value`]; the first
//! non-empty match wins. The same rules serve both the read path
//! (status lookups) and the push path (webhook callbacks), so every adapter
//! has exactly one normalization surface.

use serde_json::Value;

/// Descend into a `data` wrapper object when present.
///
/// Providers deliver the task object either directly or wrapped under a
/// `data` key; both shapes must parse identically.
pub fn unwrap_data(value: &Value) -> &Value {
    match value.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    }
}

/// First non-empty string among the aliased fields.
///
/// Numeric values are accepted and stringified: some vendors return task
/// ids as JSON numbers.
pub fn string_field(value: &Value, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        match value.get(alias) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// First integer among the aliased fields. String-encoded integers are
/// accepted.
pub fn int_field(value: &Value, aliases: &[&str]) -> Option<i64> {
    for alias in aliases {
        match value.get(alias) {
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Some(i);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Progress as a 0-100 integer from the aliased fields.
///
/// Accepts bare numbers and `"45"` / `"45%"` strings; values above 100 are
/// clamped. Anything unparseable is treated as absent — progress is
/// best-effort and never required for correctness.
pub fn progress_field(value: &Value, aliases: &[&str]) -> Option<u8> {
    for alias in aliases {
        let parsed = match value.get(alias) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<u64>().ok(),
            _ => None,
        };
        if let Some(p) = parsed {
            return Some(p.min(100) as u8);
        }
    }
    None
}

/// Extract result media URLs.
///
/// Checked in order: a single direct URL field (`direct_aliases`), then a
/// results array (`array_aliases`) whose elements are either bare string
/// URLs or objects carrying a URL under one of `element_url_aliases`. The
/// first non-empty match wins; an array match collects every element that
/// yields a URL.
pub fn result_urls(
    value: &Value,
    direct_aliases: &[&str],
    array_aliases: &[&str],
    element_url_aliases: &[&str],
) -> Vec<String> {
    if let Some(url) = string_field(value, direct_aliases) {
        return vec![url];
    }

    for alias in array_aliases {
        let Some(Value::Array(elements)) = value.get(alias) else {
            continue;
        };

        let urls: Vec<String> = elements
            .iter()
            .filter_map(|element| match element {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Object(_) => string_field(element, element_url_aliases),
                _ => None,
            })
            .collect();

        if !urls.is_empty() {
            return urls;
        }
    }

    Vec::new()
}
