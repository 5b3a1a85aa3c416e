// src/lib.rs

pub mod cli;
pub mod codec;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod packet;
pub mod stage;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::exec::adapter::packet_from_record;
use crate::exec::build_command_args;
use crate::exec::process::delegate_env;
use crate::packet::Packet;
use crate::stage::{Stage, StageContext, build_stage};

pub use crate::errors::{Result as StageResult, StageError};

/// High-level entry point used by `main.rs`.
///
/// Plays the pipeline engine for a single stage:
/// - config loading and validation
/// - stage start
/// - stdin JSON lines → `receive`
/// - emitted packets → stdout JSON lines
/// - stop on stdin EOF or Ctrl-C
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading stage config {:?}", config_path))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let (out_tx, out_rx) = mpsc::channel::<Packet>(args.buffer.max(1));
    let ctx = StageContext::from_config(&cfg, out_tx);
    let printer = tokio::spawn(print_packets(out_rx));

    let mut stage = build_stage(cfg.stage, ctx);
    stage.start().await?;

    let fed = feed_stdin(stage.as_mut()).await;

    // Stop even if feeding failed, so the delegate is reaped.
    let stopped = stage.stop().await;
    drop(stage);

    fed?;
    stopped?;
    printer.await.context("joining packet printer")??;

    info!("stage finished");
    Ok(())
}

/// Deliver stdin lines to the stage until EOF or Ctrl-C.
///
/// Each non-blank line is parsed as JSON and converted like delegate output:
/// objects become the field map, strings become `message`, arrays become
/// `data`. Unparseable lines are logged and skipped.
async fn feed_stdin(stage: &mut dyn Stage) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut delivered = 0usize;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading events from stdin")? else {
                    info!(delivered, "stdin closed; stopping stage");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(packet) = parse_event_line(&line) else {
                    continue;
                };
                // Per-event failures are logged by the stage itself.
                if stage.receive(&packet).await.is_ok() {
                    delivered += 1;
                }
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                info!(delivered, "Ctrl+C received; stopping stage");
                break;
            }
        }
    }

    Ok(())
}

fn parse_event_line(line: &str) -> Option<Packet> {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "skipping input line that is not JSON");
            return None;
        }
    };

    match packet_from_record(value) {
        Ok(packet) => Some(packet),
        Err(other) => {
            warn!(record = %other, "skipping input line with unsupported structure");
            None
        }
    }
}

/// Print every emitted packet as one JSON line on stdout.
async fn print_packets(mut rx: mpsc::Receiver<Packet>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut printed = 0usize;

    while let Some(packet) = rx.recv().await {
        let mut line = serde_json::to_vec(&packet)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
        printed += 1;
    }

    debug!(printed, "packet printer finished");
    Ok(())
}

/// Dry-run output: the resolved delegate invocation and stage options.
fn print_dry_run(cfg: &ConfigFile) {
    let stage = &cfg.stage;
    let args = build_command_args(&stage.args, &stage.flags, None);
    let codec_name = |c: &Option<std::sync::Arc<dyn codec::Codec>>| {
        c.as_ref()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };

    println!("delegate-stage dry-run");
    println!("  stage: {}", stage.name);
    if !stage.label.is_empty() {
        println!("  label: {}", stage.label);
    }
    println!("  behavior: {}", stage.behavior);
    println!("  mode: {}", if stage.stream { "streaming" } else { "transient" });
    println!("  stdin codec: {}", codec_name(&stage.input_codec));
    println!("  stdout codec: {}", codec_name(&stage.output_codec));
    println!("  stop_timeout: {:?}", stage.stop_timeout);
    println!();

    println!("command:");
    println!("  {} {}", stage.command, args.join(" "));
    if !stage.stream && stage.flags.values().any(|v| v.contains("${")) {
        println!("  (field references are resolved per event)");
    }
    println!();

    if !stage.common.is_empty() {
        println!("common options: {:?}", stage.common);
        println!();
    }

    let ctx = StageContext::from_config(cfg, mpsc::channel(1).0);
    println!("environment:");
    for (name, value) in delegate_env(&ctx) {
        println!("  {name}={value}");
    }

    debug!("dry-run complete (no execution)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_lines_map_like_delegate_output() {
        assert_eq!(
            parse_event_line("{\"message\":\"x\"}").unwrap().message(),
            Some("x")
        );
        assert_eq!(parse_event_line("\"plain\"").unwrap().message(), Some("plain"));
        assert_eq!(
            parse_event_line("[1]").unwrap().get("data"),
            Some(&json!([1]))
        );
        assert!(parse_event_line("7").is_none());
        assert!(parse_event_line("{broken").is_none());
    }
}
