// src/packet/interpolate.rs

//! `${field}` substitution against a packet's fields.
//!
//! Dotted references (`${user.name}`) walk nested mappings when no field with
//! the literal dotted name exists. String values substitute raw; any other
//! value substitutes its JSON text. References that do not resolve are left
//! untouched.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::Fields;

static FIELD_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^{}]+)\}").expect("valid field reference regex"));

/// Replace every `${name}` in `template` with the matching field value.
pub fn interpolate(template: &str, fields: &Fields) -> String {
    if !template.contains("${") {
        return template.to_string();
    }

    FIELD_REF_RE
        .replace_all(template, |caps: &Captures| match lookup(fields, caps[1].trim()) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of the `${...}` references in `template` that do not resolve.
pub fn missing_references(template: &str, fields: &Fields) -> Vec<String> {
    FIELD_REF_RE
        .captures_iter(template)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| lookup(fields, name).is_none())
        .collect()
}

/// Resolve a possibly dotted field path.
pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    if let Some(value) = fields.get(path) {
        return Some(value);
    }

    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn substitutes_strings_raw_and_other_values_as_json() {
        let f = fields(json!({"file": "a.txt", "n": 3, "ok": true}));
        assert_eq!(interpolate("out/${file}", &f), "out/a.txt");
        assert_eq!(interpolate("${n}-${ok}", &f), "3-true");
    }

    #[test]
    fn walks_nested_mappings() {
        let f = fields(json!({"user": {"name": "ada", "id": 7}}));
        assert_eq!(interpolate("${user.name}#${user.id}", &f), "ada#7");
    }

    #[test]
    fn literal_dotted_key_wins_over_nesting() {
        let f = fields(json!({"a.b": "flat", "a": {"b": "nested"}}));
        assert_eq!(interpolate("${a.b}", &f), "flat");
    }

    #[test]
    fn unresolved_references_are_left_as_is() {
        let f = fields(json!({"x": 1}));
        assert_eq!(interpolate("${missing} ${x}", &f), "${missing} 1");
        assert_eq!(interpolate("no refs", &f), "no refs");
        assert_eq!(missing_references("${missing} ${x}", &f), vec!["missing".to_string()]);
    }
}
