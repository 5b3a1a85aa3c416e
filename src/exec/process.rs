// src/exec/process.rs

//! Delegate process lifecycle: spawn with piped stdio, feed stdin, stop.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::errors::{Result, StageError};
use crate::packet::Fields;
use crate::stage::StageContext;

pub const ENV_PIPELINE_UUID: &str = "BF_PIPELINE_UUID";
pub const ENV_PIPELINE_WORKING_PATH: &str = "BF_PIPELINE_WORKING_PATH";
pub const ENV_PROCESSOR_DATA_PATH: &str = "BF_PROCESSOR_DATA_PATH";
pub const ENV_PROCESSOR_NAME: &str = "BF_PROCESSOR_NAME";
pub const ENV_PROCESSOR_LABEL: &str = "BF_PROCESSOR_LABEL";

/// Separator written after every encoded input record.
pub const RECORD_SEPARATOR: &[u8] = b"\n";

/// Variables exported to every delegate on top of the inherited environment.
pub fn delegate_env(ctx: &StageContext) -> Vec<(&'static str, String)> {
    let path = |p: &Option<std::path::PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    };

    vec![
        (ENV_PIPELINE_UUID, ctx.pipeline_uuid.clone()),
        (ENV_PIPELINE_WORKING_PATH, path(&ctx.working_dir)),
        (ENV_PROCESSOR_DATA_PATH, path(&ctx.data_dir)),
        (ENV_PROCESSOR_NAME, ctx.name.clone()),
        (ENV_PROCESSOR_LABEL, ctx.label.clone()),
    ]
}

/// Signal that terminated the delegate, if it did not exit normally.
#[cfg(unix)]
pub fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
pub fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// A running delegate and the pipes the stage has not handed out yet.
#[derive(Debug)]
pub struct DelegateProcess {
    stage: String,
    pid: Option<u32>,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

/// Start `command` with `args`, stdio fully piped.
///
/// The child is killed if the returned handle is dropped without `stop`.
pub fn spawn_delegate(
    command: &str,
    args: &[String],
    ctx: &StageContext,
) -> Result<DelegateProcess> {
    debug!(stage = %ctx.name, command, ?args, "spawning delegate");

    let mut cmd = Command::new(command);
    cmd.args(args)
        .envs(delegate_env(ctx))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = ctx.working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| StageError::Spawn {
        command: command.to_string(),
        source,
    })?;

    let pid = child.id();
    info!(stage = %ctx.name, pid, command, "delegate started");

    Ok(DelegateProcess {
        stage: ctx.name.clone(),
        pid,
        stdin: child.stdin.take(),
        stdout: child.stdout.take(),
        stderr: child.stderr.take(),
        child,
    })
}

impl DelegateProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// `None` once stdin has been closed.
    pub fn stdin_mut(&mut self) -> Option<&mut ChildStdin> {
        self.stdin.as_mut()
    }

    /// Close the write end of stdin, signalling end of input.
    pub fn close_stdin(&mut self) {
        if self.stdin.take().is_some() {
            debug!(stage = %self.stage, pid = self.pid, "delegate stdin closed");
        }
    }

    /// Close stdin and wait for the delegate to exit, however long it takes.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.close_stdin();
        Ok(self.child.wait().await?)
    }

    /// Close stdin and wait up to `grace` for the delegate to exit, then kill
    /// it.
    pub async fn stop(&mut self, grace: Duration) -> Result<ExitStatus> {
        self.close_stdin();

        match timeout(grace, self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!(
                    stage = %self.stage,
                    pid = self.pid,
                    ?grace,
                    "delegate still running after stdin was closed; killing it"
                );
                self.child.start_kill()?;
                Ok(self.child.wait().await?)
            }
        }
    }
}

/// Encode one record with `codec` and write it, followed by
/// [`RECORD_SEPARATOR`], to the delegate's stdin.
pub async fn write_record(codec: &dyn Codec, stdin: &mut ChildStdin, fields: &Fields) -> Result<()> {
    {
        let mut encoder = codec.new_encoder(&mut *stdin);
        encoder.encode(fields).await?;
    }
    stdin.write_all(RECORD_SEPARATOR).await?;
    stdin.flush().await?;
    Ok(())
}
