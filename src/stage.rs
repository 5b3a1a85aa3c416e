// src/stage.rs

//! The stage abstraction the pipeline engine drives.
//!
//! The engine configures a stage once, calls [`Stage::start`], delivers each
//! event with [`Stage::receive`], and finally calls [`Stage::stop`]. Packets
//! the stage produces go out through [`StageContext::output`].

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::codec::BoxFuture;
use crate::config::{ConfigFile, StageConfig};
use crate::errors::Result;
use crate::exec::{StreamingStage, TransientStage};
use crate::packet::Packet;

/// Everything the engine tells a stage about where it runs.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub pipeline_uuid: String,
    pub working_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub name: String,
    pub label: String,

    /// Hand-off to the next stage.
    pub output: mpsc::Sender<Packet>,
}

impl StageContext {
    /// Minimal context: a named stage with no pipeline metadata.
    pub fn new(name: impl Into<String>, output: mpsc::Sender<Packet>) -> Self {
        Self {
            pipeline_uuid: String::new(),
            working_dir: None,
            data_dir: None,
            name: name.into(),
            label: String::new(),
            output,
        }
    }

    pub fn from_config(cfg: &ConfigFile, output: mpsc::Sender<Packet>) -> Self {
        Self {
            pipeline_uuid: cfg.pipeline.uuid.clone(),
            working_dir: cfg.pipeline.working_dir.clone(),
            data_dir: cfg.stage.data_dir.clone(),
            name: cfg.stage.name.clone(),
            label: cfg.stage.label.clone(),
            output,
        }
    }

    /// Forward a packet downstream; `false` once the receiver is gone.
    pub async fn send(&self, packet: Packet) -> bool {
        self.output.send(packet).await.is_ok()
    }
}

/// A pipeline stage.
///
/// Production code builds one with [`build_stage`]; tests can drive either
/// execution mode directly.
pub trait Stage: Send {
    fn start(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Deliver one event. Errors are per event; the stage stays usable.
    fn receive<'a>(&'a mut self, packet: &'a Packet) -> BoxFuture<'a, Result<()>>;

    fn stop(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Pick the execution mode from `config.stream`.
pub fn build_stage(config: StageConfig, ctx: StageContext) -> Box<dyn Stage> {
    if config.stream {
        Box::new(StreamingStage::new(config, ctx))
    } else {
        Box::new(TransientStage::new(config, ctx))
    }
}
