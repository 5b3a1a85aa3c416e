// src/packet/common.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{Fields, interpolate};

/// Option keys owned by the pipeline rather than the delegate.
///
/// These are stripped from a stage's raw option map before the remainder is
/// turned into delegate flags. `trace` and `interval` are scheduling knobs of
/// the engine; they are accepted and dropped here.
pub const COMMON_OPTION_KEYS: &[&str] = &[
    "add_field",
    "type",
    "remove_tag",
    "remove_field",
    "add_tag",
    "trace",
    "interval",
];

/// Tag/field mutations applied to every packet a stage emits.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommonOptions {
    /// Fields to add; values may reference other fields with `${name}`.
    pub add_field: BTreeMap<String, String>,

    /// Tags appended to the `tags` field.
    #[serde(deserialize_with = "one_or_many")]
    pub add_tag: Vec<String>,

    #[serde(deserialize_with = "one_or_many")]
    pub remove_field: Vec<String>,

    #[serde(deserialize_with = "one_or_many")]
    pub remove_tag: Vec<String>,

    /// Value for the `type` field; never overwrites an existing one.
    #[serde(rename = "type")]
    pub type_name: Option<String>,
}

impl CommonOptions {
    pub fn is_empty(&self) -> bool {
        self.add_field.is_empty()
            && self.add_tag.is_empty()
            && self.remove_field.is_empty()
            && self.remove_tag.is_empty()
            && self.type_name.is_none()
    }

    pub fn apply(&self, fields: &mut Fields) {
        if let Some(ref type_name) = self.type_name {
            if !fields.contains_key("type") {
                fields.insert("type".to_string(), Value::String(type_name.clone()));
            }
        }

        for (name, template) in &self.add_field {
            let value = interpolate(template, fields);
            fields.insert(name.clone(), Value::String(value));
        }

        if !self.add_tag.is_empty() {
            let new_tags: Vec<String> = self
                .add_tag
                .iter()
                .map(|t| interpolate(t, fields))
                .collect();
            let mut tags = take_tags(fields);
            for tag in new_tags {
                if !tags.iter().any(|t| t.as_str() == Some(tag.as_str())) {
                    tags.push(Value::String(tag));
                }
            }
            fields.insert("tags".to_string(), Value::Array(tags));
        }

        for name in &self.remove_field {
            fields.remove(name);
        }

        if !self.remove_tag.is_empty() {
            if let Some(Value::Array(tags)) = fields.get_mut("tags") {
                tags.retain(|t| {
                    !t.as_str()
                        .is_some_and(|s| self.remove_tag.iter().any(|r| r == s))
                });
            }
        }
    }
}

/// Remove the `tags` field and return it as a list; a scalar becomes a
/// one-element list.
fn take_tags(fields: &mut Fields) -> Vec<Value> {
    match fields.remove("tags") {
        Some(Value::Array(tags)) => tags,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn adds_interpolated_fields_and_tags_once() {
        let opts = CommonOptions {
            add_field: BTreeMap::from([("origin".to_string(), "from-${host}".to_string())]),
            add_tag: vec!["seen".to_string(), "seen".to_string()],
            ..Default::default()
        };
        let mut f = fields(json!({"host": "h1", "tags": ["old"]}));
        opts.apply(&mut f);

        assert_eq!(f["origin"], json!("from-h1"));
        assert_eq!(f["tags"], json!(["old", "seen"]));
    }

    #[test]
    fn removes_fields_and_tags() {
        let opts = CommonOptions {
            remove_field: vec!["secret".to_string()],
            remove_tag: vec!["tmp".to_string()],
            ..Default::default()
        };
        let mut f = fields(json!({"secret": 1, "keep": 2, "tags": ["tmp", "x"]}));
        opts.apply(&mut f);

        assert!(!f.contains_key("secret"));
        assert_eq!(f["keep"], json!(2));
        assert_eq!(f["tags"], json!(["x"]));
    }

    #[test]
    fn type_does_not_overwrite() {
        let opts = CommonOptions {
            type_name: Some("delegate".to_string()),
            ..Default::default()
        };

        let mut fresh = Fields::new();
        opts.apply(&mut fresh);
        assert_eq!(fresh["type"], json!("delegate"));

        let mut typed = fields(json!({"type": "mine"}));
        opts.apply(&mut typed);
        assert_eq!(typed["type"], json!("mine"));
    }

    #[test]
    fn scalar_tag_field_becomes_array() {
        let opts = CommonOptions {
            add_tag: vec!["b".to_string()],
            ..Default::default()
        };
        let mut f = fields(json!({"tags": "a"}));
        opts.apply(&mut f);
        assert_eq!(f["tags"], json!(["a", "b"]));
    }

    #[test]
    fn deserializes_single_tag_as_list() {
        let opts: CommonOptions =
            serde_json::from_value(json!({"add_tag": "one", "type": "t"})).unwrap();
        assert_eq!(opts.add_tag, vec!["one".to_string()]);
        assert_eq!(opts.type_name.as_deref(), Some("t"));
        assert!(!opts.is_empty());
        assert!(CommonOptions::default().is_empty());
    }
}
