//! Process management for the sampler
//!
//! Handles spawning, reconfiguration, and bounded-time shutdown of the
//! sampler process.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::stream::{SharedSink, log_stderr, read_frames};
use super::types::{
    ControlCommand, ErrorFrame, EventSink, SamplerConfig, SamplerMessage, SamplerSettings,
};
use crate::error::{SamplerError, SamplerResult};

/// How long `stop` waits for a clean exit before killing
pub const STOP_GRACE: Duration = Duration::from_millis(500);

/// How long `stop` waits after the kill before giving up
pub const KILL_GRACE: Duration = Duration::from_millis(100);

/// Default deadline for [`SamplerManager::ensure_started`]
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// A live sampler process and its I/O tasks
struct SamplerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    sink: SharedSink,
    reader: JoinHandle<()>,
    stderr_logger: JoinHandle<()>,
}

impl SamplerProcess {
    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    fn abort_tasks(&self) {
        self.reader.abort();
        self.stderr_logger.abort();
    }
}

/// Owner of zero or one sampler process
pub struct SamplerManager {
    settings: SamplerSettings,
    process: Option<SamplerProcess>,
}

impl SamplerManager {
    pub fn new(settings: SamplerSettings) -> Self {
        Self {
            settings,
            process: None,
        }
    }

    /// Spawn the sampler and send it a `start` command.
    ///
    /// A running sampler is stopped first. Parsed output is delivered to
    /// `sink`. Spawn failures are sent to `sink` as an error and returned.
    pub async fn start(&mut self, config: SamplerConfig, sink: EventSink) -> SamplerResult<()> {
        if self.process.is_some() {
            debug!("Sampler already running, stopping it before restart");
            self.stop().await;
        }

        let binary = self.settings.resolve_binary();
        info!(binary = %binary.display(), grid_size = config.grid_size, sample_rate = config.sample_rate, "Starting sampler");

        let mut cmd = Command::new(&binary);
        cmd.args(&self.settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = SamplerError::Spawn { binary, source };
                error!(error = %err, "Failed to spawn sampler");
                report(&sink, &err);
                return Err(err);
            }
        };

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdin, stdout, stderr) = match (stdin, stdout, stderr) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            (stdin, stdout, _) => {
                let missing = if stdin.is_none() {
                    "stdin"
                } else if stdout.is_none() {
                    "stdout"
                } else {
                    "stderr"
                };
                let err = SamplerError::StreamUnavailable(missing);
                error!(error = %err, "Sampler spawned without stdio, killing it");
                if let Err(e) = child.start_kill() {
                    warn!(error = %e, "Failed to kill partially spawned sampler");
                }
                report(&sink, &err);
                return Err(err);
            }
        };

        let shared: SharedSink = Arc::new(RwLock::new(Some(sink)));
        let reader = tokio::spawn(read_frames(stdout, shared.clone()));
        let stderr_logger = tokio::spawn(log_stderr(stderr));

        debug!(pid = ?child.id(), "Sampler spawned");
        self.process = Some(SamplerProcess {
            child,
            stdin: Some(stdin),
            sink: shared,
            reader,
            stderr_logger,
        });

        self.send(config.start_command()).await;
        Ok(())
    }

    /// Start the sampler and wait for its first sample.
    ///
    /// Forces any OS permission prompt the sampler triggers to appear before
    /// the picker surface is shown. Fails on the first error frame, when the
    /// sampler output closes, or after `timeout`, whichever comes first.
    /// The sampler keeps running afterwards; install a new sink with
    /// [`SamplerManager::set_sink`] to receive later frames.
    pub async fn ensure_started(
        &mut self,
        config: SamplerConfig,
        timeout: Duration,
    ) -> SamplerResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.start(config, tx).await?;

        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(SamplerMessage::Sample(_))) => {
                debug!("Sampler produced its first sample");
                Ok(())
            }
            Ok(Some(SamplerMessage::Error(frame))) => Err(SamplerError::Sampler(frame.error)),
            Ok(None) => Err(SamplerError::Closed),
            Err(_) => {
                warn!(?timeout, "Sampler did not produce a sample in time");
                Err(SamplerError::StartupTimeout(timeout))
            }
        }
    }

    /// Redirect output of the running sampler to a new sink
    pub async fn set_sink(&mut self, sink: EventSink) -> bool {
        match self.process {
            Some(ref process) => {
                *process.sink.write().await = Some(sink);
                true
            }
            None => false,
        }
    }

    /// Ask the running sampler to capture a different grid size.
    ///
    /// Advisory only: without a running sampler the update is dropped.
    pub async fn update_grid_size(&mut self, grid_size: u32) {
        if !self.is_running() {
            debug!(grid_size, "Sampler not running, grid update dropped");
            return;
        }
        self.send(ControlCommand::UpdateGrid { grid_size }).await;
    }

    /// Stop the sampler, killing it if it does not exit in time.
    ///
    /// Returns immediately when nothing is running. The manager reports
    /// not-running as soon as this is called. Always completes: a process
    /// that survives the kill grace period is abandoned.
    pub async fn stop(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        *process.sink.write().await = None;

        let pid = process.child.id();
        debug!(?pid, "Stopping sampler");

        let mut stdin = process.stdin.take();
        let child = &mut process.child;
        let graceful = tokio::time::timeout(STOP_GRACE, async {
            if let Some(mut stdin) = stdin.take() {
                if let Err(e) = write_command(&mut stdin, &ControlCommand::Stop).await {
                    debug!(error = %e, "Failed to send stop command");
                }
                // Dropping stdin closes the pipe and signals end of input
            }
            child.wait().await
        })
        .await;

        match graceful {
            Ok(Ok(status)) => debug!(?pid, %status, "Sampler exited"),
            Ok(Err(e)) => warn!(?pid, error = %e, "Failed to wait for sampler exit"),
            Err(_) => {
                warn!(?pid, "Sampler did not exit within {:?}, killing", STOP_GRACE);
                if let Err(e) = process.child.start_kill() {
                    warn!(?pid, error = %e, "Failed to kill sampler");
                }
                if tokio::time::timeout(KILL_GRACE, process.child.wait())
                    .await
                    .is_err()
                {
                    warn!(?pid, "Sampler still alive after kill, abandoning it");
                }
            }
        }

        process.abort_tasks();
    }

    /// Kill the sampler without waiting for it to exit.
    ///
    /// For synchronous contexts such as `Drop`, where [`SamplerManager::stop`]
    /// cannot be awaited. The reader tasks are aborted, so no further output
    /// reaches the sink, and the killed child is reaped by the runtime.
    pub fn abort(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        let pid = process.child.id();

        process.abort_tasks();
        match process.child.start_kill() {
            Ok(()) => debug!(?pid, "Sampler killed"),
            Err(e) => warn!(?pid, error = %e, "Failed to kill sampler"),
        }
    }

    /// Whether a sampler process is held and has not exited
    pub fn is_running(&mut self) -> bool {
        let exited = match self.process {
            Some(ref mut process) => process.has_exited(),
            None => return false,
        };

        if exited {
            warn!("Sampler exited unexpectedly");
            if let Some(process) = self.process.take() {
                process.abort_tasks();
            }
            return false;
        }
        true
    }

    /// OS process id of the running sampler
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.child.id())
    }

    async fn send(&mut self, command: ControlCommand) {
        let Some(stdin) = self.process.as_mut().and_then(|p| p.stdin.as_mut()) else {
            warn!(command = command.name(), "Cannot send command, sampler not running");
            return;
        };

        match write_command(stdin, &command).await {
            Ok(()) => debug!(command = command.name(), "Sent sampler command"),
            Err(e) => warn!(command = command.name(), error = %e, "Failed to send sampler command"),
        }
    }
}

impl Default for SamplerManager {
    fn default() -> Self {
        Self::new(SamplerSettings::default())
    }
}

async fn write_command(stdin: &mut ChildStdin, command: &ControlCommand) -> SamplerResult<()> {
    let line = command.to_line()?;
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

fn report(sink: &EventSink, err: &SamplerError) {
    let _ = sink.send(SamplerMessage::Error(ErrorFrame::new(err.to_string())));
}
