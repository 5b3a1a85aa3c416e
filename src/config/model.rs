// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::codec::Codec;
use crate::packet::CommonOptions;
use crate::types::Behavior;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [pipeline]
/// uuid = "2f0c9a4e"
/// working_dir = "."
///
/// [stage]
/// name = "upper"
/// behavior = "transformer"
/// stream = true
/// command = "python3"
/// code = "import sys\nfor l in sys.stdin: print(l.upper(), end='')"
/// stdin_as = "line"
/// stdout_as = "line"
/// add_tag = ["shouted"]
/// verbose = ""          # becomes `--verbose`
/// _ = "${file}"         # trailing positional argument
/// ```
///
/// Only `stage.command` is required. Keys of `[stage]` that are neither stage
/// options nor pipeline-common options are passed to the delegate as flags.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub pipeline: PipelineSection,

    pub stage: RawStageConfig,
}

/// `[pipeline]` section: the execution context an engine would normally
/// provide.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct PipelineSection {
    /// Pipeline instance identifier, exported as `BF_PIPELINE_UUID`.
    #[serde(default)]
    pub uuid: String,

    /// Working directory for the delegate; `None` keeps the current one.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// `[stage]` section before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStageConfig {
    #[serde(default = "default_stage_name")]
    pub name: String,

    #[serde(default)]
    pub label: String,

    /// Stage data directory, exported as `BF_PROCESSOR_DATA_PATH`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// `"producer"`, `"transformer"` (default) or `"consumer"`.
    ///
    /// Kept as a string here so an unknown value surfaces as a configuration
    /// error from validation rather than a deserialization error.
    #[serde(default = "default_behavior")]
    pub behavior: String,

    /// One long-lived delegate (`true`) or one delegate per event (`false`).
    #[serde(default)]
    pub stream: bool,

    /// Path or name of the delegate executable.
    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Inline script for interpreter commands (see `config::interpreter`).
    #[serde(default)]
    pub code: String,

    #[serde(default = "default_format")]
    pub stdin_as: String,

    #[serde(default = "default_format")]
    pub stdout_as: String,

    /// How long `stop` waits after closing stdin before killing the delegate.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,

    /// Everything else: common options and delegate flags.
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

fn default_stage_name() -> String {
    "delegate".to_string()
}

fn default_behavior() -> String {
    Behavior::default().as_str().to_string()
}

fn default_format() -> String {
    "json".to_string()
}

fn default_stop_timeout() -> String {
    "5s".to_string()
}

impl Default for RawStageConfig {
    fn default() -> Self {
        Self {
            name: default_stage_name(),
            label: String::new(),
            data_dir: None,
            behavior: default_behavior(),
            stream: false,
            command: String::new(),
            args: Vec::new(),
            code: String::new(),
            stdin_as: default_format(),
            stdout_as: default_format(),
            stop_timeout: default_stop_timeout(),
            options: BTreeMap::new(),
        }
    }
}

/// Validated configuration file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub pipeline: PipelineSection,
    pub stage: StageConfig,
}

/// Validated, immutable stage configuration.
#[derive(Clone)]
pub struct StageConfig {
    pub name: String,
    pub label: String,
    pub data_dir: Option<PathBuf>,
    pub behavior: Behavior,
    pub stream: bool,
    pub command: String,

    /// Static arguments, after interpreter defaults were applied.
    pub args: Vec<String>,
    pub code: String,

    /// Encoder factory for the delegate's stdin; `None` disables writing.
    pub input_codec: Option<Arc<dyn Codec>>,

    /// Decoder factory for the delegate's stdout; `None` disables reading.
    pub output_codec: Option<Arc<dyn Codec>>,

    /// Delegate flags; `"_"` is the trailing positional argument.
    pub flags: BTreeMap<String, String>,

    pub common: CommonOptions,
    pub stop_timeout: Duration,
}

impl fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageConfig")
            .field("name", &self.name)
            .field("behavior", &self.behavior)
            .field("stream", &self.stream)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("input_codec", &self.input_codec.as_ref().map(|c| c.name().to_string()))
            .field("output_codec", &self.output_codec.as_ref().map(|c| c.name().to_string()))
            .field("flags", &self.flags)
            .field("stop_timeout", &self.stop_timeout)
            .finish_non_exhaustive()
    }
}

impl StageConfig {
    /// Whether a running stage decodes the delegate's stdout.
    pub fn reads_output(&self) -> bool {
        self.behavior.reads_output() && self.output_codec.is_some()
    }
}
