#![allow(dead_code)]

use std::collections::BTreeMap;

use delegate_stage::config::{RawStageConfig, StageConfig};
use serde_json::Value;

/// Builder for `StageConfig` to simplify test setup.
///
/// Goes through the same `TryFrom<RawStageConfig>` validation as a TOML
/// file would.
pub struct StageConfigBuilder {
    raw: RawStageConfig,
}

impl StageConfigBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            raw: RawStageConfig {
                command: command.to_string(),
                stop_timeout: "2s".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.raw.name = name.to_string();
        self
    }

    pub fn behavior(mut self, behavior: &str) -> Self {
        self.raw.behavior = behavior.to_string();
        self
    }

    pub fn stream(mut self, val: bool) -> Self {
        self.raw.stream = val;
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.raw.args.push(arg.to_string());
        self
    }

    pub fn code(mut self, code: &str) -> Self {
        self.raw.code = code.to_string();
        self
    }

    pub fn stdin_as(mut self, format: &str) -> Self {
        self.raw.stdin_as = format.to_string();
        self
    }

    pub fn stdout_as(mut self, format: &str) -> Self {
        self.raw.stdout_as = format.to_string();
        self
    }

    pub fn stop_timeout(mut self, duration: &str) -> Self {
        self.raw.stop_timeout = duration.to_string();
        self
    }

    /// Any loose `[stage]` key: a delegate flag or a common option.
    pub fn option(mut self, key: &str, value: Value) -> Self {
        self.raw.options.insert(key.to_string(), value);
        self
    }

    pub fn flag(self, name: &str, value: &str) -> Self {
        self.option(name, Value::String(value.to_string()))
    }

    pub fn raw(self) -> RawStageConfig {
        self.raw
    }

    pub fn build(self) -> StageConfig {
        StageConfig::try_from(self.raw).expect("Failed to build valid stage config from builder")
    }
}

/// Flag map from `(name, value)` pairs.
pub fn flags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
