// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder substitution for scripts and condition expressions.
//!
//! Scalars: `${NAME}` and bare `$NAME` (word-bounded).
//! Objects and arrays: `${NAME.a.b}`, `$NAME.a[0]`, and `${NAME}` / `$NAME`
//! for the whole value as JSON.

use regex::{Captures, Regex};
use serde_json::Value;

/// Escape a label for literal use inside a regex.
pub fn escape(label: &str) -> String {
    regex::escape(label)
}

/// Text inserted for a scalar: strings raw, null empty, others via `to_string`.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

const PATH_ITEM: &str = r"(?:\.[A-Za-z_][A-Za-z0-9_]*|\[\d+\])";

fn scalar_pattern(name: &str) -> Option<Regex> {
    let name = escape(name);
    Regex::new(&format!(r"\$\{{{name}\}}|\${name}\b")).ok()
}

fn object_pattern(name: &str) -> Option<Regex> {
    let name = escape(name);
    Regex::new(&format!(
        r"\$\{{{name}({PATH_ITEM}*)\}}|\${name}({PATH_ITEM}+)|\${name}\b"
    ))
    .ok()
}

/// Walk a `.a.b[0]` suffix into `value`.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            current = current.get(&after[..end])?;
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            let index: usize = after[..end].parse().ok()?;
            current = current.get(index)?;
            rest = &after[end + 1..];
        } else {
            return None;
        }
    }
    Some(current)
}

/// Replace `${name}` / `$name` with a scalar's text.
pub fn substitute_scalar(text: &str, name: &str, value: &Value) -> String {
    let Some(re) = scalar_pattern(name) else {
        return text.to_string();
    };
    let replacement = scalar_text(value);
    re.replace_all(text, regex::NoExpand(&replacement)).into_owned()
}

/// Replace path references into an object or array.
///
/// Unresolvable paths are left as written.
pub fn substitute_object(text: &str, name: &str, value: &Value) -> String {
    let Some(re) = object_pattern(name) else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures| {
        let path = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        match lookup(value, path) {
            Some(found) if path.is_empty() => found.to_string(),
            Some(found) => scalar_text(found),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

/// Substitute every binding into a script.
///
/// Longer names go first so `$AB` is never consumed by a binding for `$A`.
pub fn render(text: &str, bindings: &[(String, Value)]) -> String {
    let mut ordered: Vec<&(String, Value)> = bindings.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    ordered.into_iter().fold(text.to_string(), |acc, (name, value)| match value {
        Value::Object(_) | Value::Array(_) => substitute_object(&acc, name, value),
        _ => substitute_scalar(&acc, name, value),
    })
}

/// Substitute bindings into a condition expression as JSON literals.
///
/// Path references resolve before encoding; misses become `null`.
pub fn render_condition(text: &str, bindings: &[(String, Value)]) -> String {
    let mut ordered: Vec<&(String, Value)> = bindings.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    ordered.into_iter().fold(text.to_string(), |acc, (name, value)| {
        let escaped = escape(name);
        let Ok(re) = Regex::new(&format!(r"\$\{{{escaped}({PATH_ITEM}*)\}}|\${escaped}\b")) else {
            return acc;
        };
        re.replace_all(&acc, |caps: &Captures| {
            let path = caps.get(1).map_or("", |m| m.as_str());
            lookup(value, path).map_or_else(|| "null".to_string(), Value::to_string)
        })
        .into_owned()
    })
}

#[cfg(test)]
#[path = "placeholder_tests.rs"]
mod tests;
