//! Type-preserving `{{key}}` template rendering.
//!
//! Templates are arbitrary JSON-shaped values. Objects and arrays render
//! element-wise. A string that is exactly one placeholder is replaced by the
//! raw value of that key, whatever its type; a string with placeholders
//! embedded among other characters interpolates stringified values. Numbers,
//! booleans, and nulls pass through untouched.
//!
//! In strict mode a missing key is an error carrying the key and its
//! location inside the template; in lenient mode the `{{key}}` text is left
//! verbatim.

use crate::error::EngineError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex is valid"))
}

fn exact_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{\{(\w+)\}\}$").expect("placeholder regex is valid"))
}

/// Render `template`, substituting `{{key}}` placeholders from `values`.
pub fn render(
    template: &Value,
    values: &Map<String, Value>,
    strict: bool,
) -> Result<Value, EngineError> {
    render_at(template, values, strict, &mut Vec::new())
}

fn render_at(
    template: &Value,
    values: &Map<String, Value>,
    strict: bool,
    location: &mut Vec<String>,
) -> Result<Value, EngineError> {
    match template {
        Value::Object(map) => {
            let mut rendered = Map::new();
            for (key, value) in map {
                location.push(key.clone());
                rendered.insert(key.clone(), render_at(value, values, strict, location)?);
                location.pop();
            }
            Ok(Value::Object(rendered))
        }
        Value::Array(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                location.push(index.to_string());
                rendered.push(render_at(item, values, strict, location)?);
                location.pop();
            }
            Ok(Value::Array(rendered))
        }
        Value::String(text) => render_string(text, values, strict, location),
        other => Ok(other.clone()),
    }
}

fn render_string(
    text: &str,
    values: &Map<String, Value>,
    strict: bool,
    location: &[String],
) -> Result<Value, EngineError> {
    // A string that is exactly one placeholder substitutes the raw value,
    // preserving its type.
    if let Some(caps) = exact_placeholder_re().captures(text) {
        let key = &caps[1];
        return match values.get(key) {
            Some(value) => Ok(value.clone()),
            None if strict => Err(missing_key(key, location)),
            None => Ok(Value::String(text.to_string())),
        };
    }

    if !text.contains("{{") {
        return Ok(Value::String(text.to_string()));
    }

    // Embedded placeholders interpolate stringified values.
    let re = placeholder_re();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let m = caps.get(0).expect("capture 0 always present");
        let key = &caps[1];
        out.push_str(&text[last..m.start()]);
        match values.get(key) {
            Some(value) => out.push_str(&stringify(value)),
            None if strict => return Err(missing_key(key, location)),
            None => out.push_str(m.as_str()),
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(Value::String(out))
}

/// Stringify a value for interpolation: strings verbatim, everything else
/// as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn missing_key(key: &str, location: &[String]) -> EngineError {
    let path = if location.is_empty() {
        "<root>".to_string()
    } else {
        location.join(".")
    };
    EngineError::Template {
        key: key.to_string(),
        path,
    }
}

/// Collect every `{{key}}` placeholder name appearing in `template`.
pub fn extract_keys(template: &Value) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    collect_keys(template, &mut keys);
    keys
}

fn collect_keys(template: &Value, keys: &mut BTreeSet<String>) {
    match template {
        Value::Object(map) => map.values().for_each(|v| collect_keys(v, keys)),
        Value::Array(items) => items.iter().for_each(|v| collect_keys(v, keys)),
        Value::String(text) => {
            for caps in placeholder_re().captures_iter(text) {
                keys.insert(caps[1].to_string());
            }
        }
        _ => {}
    }
}
