// src/config/mod.rs

//! Stage configuration: TOML model, validation, interpreter defaults.

pub mod interpreter;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, PipelineSection, RawConfigFile, RawStageConfig, StageConfig};
