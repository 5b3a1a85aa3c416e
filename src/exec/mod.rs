// src/exec/mod.rs

//! Delegate execution layer.
//!
//! This module is responsible for running the delegate program with
//! `tokio::process::Command` and moving records across its pipes.
//!
//! - [`args`] builds the delegate's argv from static args, flags and the
//!   current event.
//! - [`adapter`] turns decoded records into packets.
//! - [`process`] owns spawning, environment injection and teardown.
//! - [`output`] holds the stderr drain and the stdout reader loop.
//! - [`streaming`] keeps one delegate alive for the stage's lifetime.
//! - [`transient`] runs one delegate per received event.

pub mod adapter;
pub mod args;
pub mod output;
pub mod process;
pub mod streaming;
pub mod transient;

pub use args::build_command_args;
pub use process::{DelegateProcess, spawn_delegate};
pub use streaming::StreamingStage;
pub use transient::TransientStage;
