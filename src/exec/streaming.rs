// src/exec/streaming.rs

//! One long-lived delegate per stage.

use std::fmt;

use anyhow::anyhow;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::codec::BoxFuture;
use crate::config::StageConfig;
use crate::errors::{Result, StageError};
use crate::exec::args::build_command_args;
use crate::exec::output::{spawn_output_reader, spawn_stderr_drain};
use crate::exec::process::{DelegateProcess, exit_signal, spawn_delegate, write_record};
use crate::packet::Packet;
use crate::stage::{Stage, StageContext};

enum StreamState {
    Idle,
    Running(RunningDelegate),
    Stopped,
}

/// The delegate plus one join handle per background task.
struct RunningDelegate {
    process: DelegateProcess,
    stderr_task: Option<JoinHandle<()>>,
    output_task: Option<JoinHandle<Result<usize>>>,
}

/// Streaming execution mode: `idle -> running -> stopped`.
///
/// Received events are encoded onto the delegate's stdin in arrival order.
/// When the behavior reads output, a background task decodes stdout and
/// forwards packets through the stage context.
pub struct StreamingStage {
    config: StageConfig,
    ctx: StageContext,
    state: StreamState,
}

impl fmt::Debug for StreamingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            StreamState::Idle => "idle",
            StreamState::Running(_) => "running",
            StreamState::Stopped => "stopped",
        };
        f.debug_struct("StreamingStage")
            .field("stage", &self.ctx.name)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl StreamingStage {
    pub fn new(config: StageConfig, ctx: StageContext) -> Self {
        Self {
            config,
            ctx,
            state: StreamState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, StreamState::Running(_))
    }

    /// PID of the running delegate, if any.
    pub fn pid(&self) -> Option<u32> {
        match &self.state {
            StreamState::Running(running) => running.process.pid(),
            _ => None,
        }
    }

    async fn start_inner(&mut self) -> Result<()> {
        if !matches!(self.state, StreamState::Idle) {
            return Err(StageError::Other(anyhow!(
                "stage '{}' was already started",
                self.ctx.name
            )));
        }

        info!(
            stage = %self.ctx.name,
            behavior = %self.config.behavior,
            stream = true,
            "starting delegate stage"
        );

        let args = build_command_args(&self.config.args, &self.config.flags, None);
        let mut process = spawn_delegate(&self.config.command, &args, &self.ctx)?;

        let stderr_task = process
            .take_stderr()
            .map(|stderr| spawn_stderr_drain(stderr, self.ctx.name.clone()));

        let output_task = match (&self.config.output_codec, self.config.behavior.reads_output()) {
            (Some(codec), true) => process.take_stdout().map(|stdout| {
                let decoder = codec.new_decoder(Box::new(stdout));
                spawn_output_reader(decoder, self.ctx.clone(), self.config.common.clone())
            }),
            (None, true) => {
                warn!(stage = %self.ctx.name, "no output codec configured; delegate stdout is not read");
                None
            }
            (_, false) => {
                debug!(stage = %self.ctx.name, "consumer behavior; delegate stdout is not read");
                None
            }
        };

        self.state = StreamState::Running(RunningDelegate {
            process,
            stderr_task,
            output_task,
        });
        Ok(())
    }

    async fn receive_inner(&mut self, packet: &Packet) -> Result<()> {
        let StreamState::Running(ref mut running) = self.state else {
            return Err(StageError::NotRunning);
        };

        let Some(ref codec) = self.config.input_codec else {
            debug!(stage = %self.ctx.name, "no input codec configured; event not written");
            return Ok(());
        };

        let stdin = running.process.stdin_mut().ok_or(StageError::NotRunning)?;

        write_record(codec.as_ref(), stdin, packet.fields())
            .await
            .inspect_err(|e| {
                error!(stage = %self.ctx.name, error = %e, "failed to write event to delegate");
            })
    }

    async fn stop_inner(&mut self) -> Result<()> {
        let StreamState::Running(mut running) =
            std::mem::replace(&mut self.state, StreamState::Stopped)
        else {
            debug!(stage = %self.ctx.name, "stop requested but delegate is not running");
            return Ok(());
        };

        let grace = self.config.stop_timeout;
        let status = running.process.stop(grace).await?;
        info!(
            stage = %self.ctx.name,
            exit_code = ?status.code(),
            signal = ?exit_signal(&status),
            success = status.success(),
            "delegate exited"
        );

        if let Some(task) = running.output_task.take() {
            match join_within(task, grace).await {
                Some(Ok(Ok(forwarded))) => {
                    debug!(stage = %self.ctx.name, forwarded, "output reader finished")
                }
                // Decode errors were logged by the reader itself.
                Some(Ok(Err(_))) => {}
                Some(Err(e)) => warn!(stage = %self.ctx.name, error = %e, "output reader task failed"),
                None => warn!(stage = %self.ctx.name, "output reader did not finish in time; aborted"),
            }
        }

        if let Some(task) = running.stderr_task.take() {
            if let Some(Err(e)) = join_within(task, grace).await {
                warn!(stage = %self.ctx.name, error = %e, "stderr drain task failed");
            }
        }

        Ok(())
    }
}

/// Await a task for at most `limit`; abort it and return `None` on expiry.
pub(crate) async fn join_within<T>(
    mut task: JoinHandle<T>,
    limit: std::time::Duration,
) -> Option<std::result::Result<T, tokio::task::JoinError>> {
    match timeout(limit, &mut task).await {
        Ok(joined) => Some(joined),
        Err(_) => {
            task.abort();
            None
        }
    }
}

impl Stage for StreamingStage {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.start_inner())
    }

    fn receive<'a>(&'a mut self, packet: &'a Packet) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.receive_inner(packet))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.stop_inner())
    }
}
