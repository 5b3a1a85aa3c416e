// src/exec/transient.rs

//! One delegate process per received event.

use std::io::ErrorKind;

use tracing::{debug, error, info};

use crate::codec::BoxFuture;
use crate::config::StageConfig;
use crate::errors::{Result, StageError};
use crate::exec::args::build_command_args;
use crate::exec::output::{spawn_output_reader, spawn_stderr_drain};
use crate::exec::process::{exit_signal, spawn_delegate, write_record};
use crate::exec::streaming::join_within;
use crate::packet::Packet;
use crate::stage::{Stage, StageContext};

/// Transient execution mode.
///
/// Each event gets its own delegate, with `${field}` references in flag
/// values resolved against that event. Failures are reported for the event
/// only.
#[derive(Debug)]
pub struct TransientStage {
    config: StageConfig,
    ctx: StageContext,
}

impl TransientStage {
    pub fn new(config: StageConfig, ctx: StageContext) -> Self {
        Self { config, ctx }
    }

    /// Run the delegate once for `packet`; resolves to the number of packets
    /// it produced.
    pub async fn run_once(&self, packet: &Packet) -> Result<usize> {
        let args = build_command_args(&self.config.args, &self.config.flags, Some(packet.fields()));
        let mut process = spawn_delegate(&self.config.command, &args, &self.ctx)?;

        let stderr_task = process
            .take_stderr()
            .map(|stderr| spawn_stderr_drain(stderr, self.ctx.name.clone()));

        // Read concurrently with the write so a chatty delegate cannot block
        // on a full stdout pipe.
        let output_task = match self.config.output_codec {
            Some(ref codec) if self.config.behavior.reads_output() => {
                process.take_stdout().map(|stdout| {
                    let decoder = codec.new_decoder(Box::new(stdout));
                    spawn_output_reader(decoder, self.ctx.clone(), self.config.common.clone())
                })
            }
            _ => None,
        };

        if let (Some(codec), Some(stdin)) = (&self.config.input_codec, process.stdin_mut()) {
            match write_record(codec.as_ref(), stdin, packet.fields()).await {
                Ok(()) => {}
                // The delegate does not read its input; its exit status decides.
                Err(StageError::IoError(e)) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(stage = %self.ctx.name, "delegate closed stdin before the event was written");
                }
                Err(e) => return Err(e),
            }
        }

        let status = process.wait().await?;
        debug!(
            stage = %self.ctx.name,
            pid = process.pid(),
            exit_code = ?status.code(),
            signal = ?exit_signal(&status),
            "transient delegate exited"
        );

        let grace = self.config.stop_timeout;
        let forwarded = match output_task {
            Some(task) => match join_within(task, grace).await {
                Some(Ok(result)) => result?,
                Some(Err(e)) => return Err(StageError::Other(e.into())),
                None => {
                    return Err(StageError::Decode(
                        "delegate output did not reach end of stream after exit".to_string(),
                    ));
                }
            },
            None => 0,
        };

        if let Some(task) = stderr_task {
            let _ = join_within(task, grace).await;
        }

        if !status.success() {
            return Err(StageError::DelegateExit { status });
        }

        Ok(forwarded)
    }
}

impl Stage for TransientStage {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            info!(
                stage = %self.ctx.name,
                behavior = %self.config.behavior,
                stream = false,
                "starting delegate stage"
            );
            Ok(())
        })
    }

    fn receive<'a>(&'a mut self, packet: &'a Packet) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.run_once(packet).await {
                Ok(forwarded) => {
                    debug!(stage = %self.ctx.name, forwarded, "event processed");
                    Ok(())
                }
                Err(e) => {
                    error!(stage = %self.ctx.name, error = %e, "event processing failed");
                    Err(e)
                }
            }
        })
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            debug!(stage = %self.ctx.name, "transient stage stopped");
            Ok(())
        })
    }
}
