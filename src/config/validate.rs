// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use crate::codec;
use crate::config::interpreter;
use crate::config::model::{ConfigFile, RawConfigFile, RawStageConfig, StageConfig};
use crate::errors::{Result, StageError};
use crate::packet::{COMMON_OPTION_KEYS, CommonOptions};
use crate::types::{Behavior, parse_duration};

/// Explicit flag table, merged with the loose `[stage]` keys.
const FLAGS_KEY: &str = "flags";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StageError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let stage = StageConfig::try_from(raw.stage)?;
        Ok(ConfigFile {
            pipeline: raw.pipeline,
            stage,
        })
    }
}

impl TryFrom<RawStageConfig> for StageConfig {
    type Error = StageError;

    fn try_from(raw: RawStageConfig) -> std::result::Result<Self, Self::Error> {
        let behavior = validate_behavior(&raw.behavior)?;
        validate_command(&raw)?;
        let stop_timeout = validate_stop_timeout(&raw.stop_timeout)?;
        let (common, flags) = split_options(&raw.options)?;

        let input_codec = codec::from_name(&raw.stdin_as);
        let output_codec = codec::from_name(&raw.stdout_as);
        if behavior.reads_output() && output_codec.is_none() {
            warn!(
                stage = %raw.name,
                stdout_as = %raw.stdout_as,
                %behavior,
                "no decoder for stdout_as; delegate output will not be read"
            );
        }

        let args = if raw.args.is_empty() {
            interpreter::default_args(&raw.command, &raw.code).unwrap_or_default()
        } else {
            raw.args
        };

        Ok(StageConfig {
            name: raw.name,
            label: raw.label,
            data_dir: raw.data_dir,
            behavior,
            stream: raw.stream,
            command: raw.command.trim().to_string(),
            args,
            code: raw.code,
            input_codec,
            output_codec,
            flags,
            common,
            stop_timeout,
        })
    }
}

fn validate_behavior(raw: &str) -> Result<Behavior> {
    raw.parse::<Behavior>().map_err(StageError::ConfigError)
}

fn validate_command(raw: &RawStageConfig) -> Result<()> {
    if raw.command.trim().is_empty() {
        return Err(StageError::ConfigError(format!(
            "stage '{}' must set `command`",
            raw.name
        )));
    }
    Ok(())
}

fn validate_stop_timeout(raw: &str) -> Result<Duration> {
    parse_duration(raw)
        .map_err(|e| StageError::ConfigError(format!("invalid stop_timeout '{raw}': {e}")))
}

/// Separate pipeline-common options from delegate flags.
///
/// Common keys never reach the delegate's command line. Everything else is
/// weakly converted to a string flag value.
fn split_options(
    options: &BTreeMap<String, Value>,
) -> Result<(CommonOptions, BTreeMap<String, String>)> {
    let mut common = Map::new();
    let mut flags = BTreeMap::new();

    for (key, value) in options {
        if COMMON_OPTION_KEYS.contains(&key.as_str()) {
            common.insert(key.clone(), value.clone());
            continue;
        }

        if key == FLAGS_KEY {
            if let Value::Object(table) = value {
                for (name, v) in table {
                    flags.insert(name.clone(), flag_value(name, v)?);
                }
                continue;
            }
        }

        flags.insert(key.clone(), flag_value(key, value)?);
    }

    let common: CommonOptions = serde_json::from_value(Value::Object(common))
        .map_err(|e| StageError::ConfigError(format!("invalid common options: {e}")))?;

    Ok((common, flags))
}

fn flag_value(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(StageError::ConfigError(format!(
            "flag '{name}' must be a string, number or boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(command: &str) -> RawStageConfig {
        RawStageConfig {
            command: command.to_string(),
            ..Default::default()
        }
    }

    fn options(v: Value) -> BTreeMap<String, Value> {
        v.as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[test]
    fn unknown_behavior_is_a_config_error() {
        let mut r = raw("cat");
        r.behavior = "bogus".to_string();
        match StageConfig::try_from(r) {
            Err(StageError::ConfigError(msg)) => assert!(msg.contains("bogus")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            StageConfig::try_from(raw("  ")),
            Err(StageError::ConfigError(_))
        ));
    }

    #[test]
    fn bad_stop_timeout_is_rejected() {
        let mut r = raw("cat");
        r.stop_timeout = "soon".to_string();
        assert!(matches!(
            StageConfig::try_from(r),
            Err(StageError::ConfigError(_))
        ));

        let mut r = raw("cat");
        r.stop_timeout = "9999999999999999999h".to_string();
        assert!(matches!(
            StageConfig::try_from(r),
            Err(StageError::ConfigError(msg)) if msg.contains("too large")
        ));
    }

    #[test]
    fn common_options_are_stripped_from_flags() {
        let mut r = raw("tool");
        r.options = options(json!({
            "add_tag": ["a"],
            "add_field": {"k": "v"},
            "remove_field": "x",
            "remove_tag": [],
            "type": "t",
            "trace": true,
            "interval": "10s",
            "verbose": "",
            "level": 3,
            "dry": false,
            "_": "input.txt",
        }));

        let cfg = StageConfig::try_from(r).unwrap();
        let names: Vec<&str> = cfg.flags.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["_", "dry", "level", "verbose"]);
        assert_eq!(cfg.flags["level"], "3");
        assert_eq!(cfg.flags["dry"], "false");
        assert_eq!(cfg.common.add_tag, vec!["a".to_string()]);
        assert_eq!(cfg.common.remove_field, vec!["x".to_string()]);
        assert_eq!(cfg.common.type_name.as_deref(), Some("t"));
    }

    #[test]
    fn explicit_flag_table_is_merged() {
        let mut r = raw("tool");
        r.options = options(json!({"flags": {"out": "o.txt"}, "in": "i.txt"}));
        let cfg = StageConfig::try_from(r).unwrap();
        assert_eq!(cfg.flags.len(), 2);
        assert_eq!(cfg.flags["out"], "o.txt");
        assert_eq!(cfg.flags["in"], "i.txt");
    }

    #[test]
    fn structured_flag_values_are_rejected() {
        let mut r = raw("tool");
        r.options = options(json!({"list": [1, 2]}));
        assert!(matches!(
            StageConfig::try_from(r),
            Err(StageError::ConfigError(_))
        ));
    }

    #[test]
    fn codecs_resolve_by_name_and_unknown_means_unused() {
        let mut r = raw("cat");
        r.stdin_as = "line".to_string();
        r.stdout_as = "nope".to_string();
        let cfg = StageConfig::try_from(r).unwrap();
        assert_eq!(cfg.input_codec.as_ref().map(|c| c.name()), Some("line"));
        assert!(cfg.output_codec.is_none());
        assert!(!cfg.reads_output());
    }

    #[test]
    fn interpreter_defaults_apply_only_without_args() {
        let mut r = raw("python");
        r.code = "print('hi')".to_string();
        let cfg = StageConfig::try_from(r.clone()).unwrap();
        assert_eq!(cfg.args, vec!["-u", "-c", "print('hi')"]);

        r.args = vec!["script.py".to_string()];
        let cfg = StageConfig::try_from(r).unwrap();
        assert_eq!(cfg.args, vec!["script.py"]);
    }
}
