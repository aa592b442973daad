//! ProfilerSession - one profiler process attached to one target.

use crate::tool::ProfilerTool;
use perfshot_common::{ExitInfo, ShotError, ShotResult, SignalKind};
use perfshot_managed_process::ManagedProcess;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const SIGKILL: i32 = 9;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unattached,
    Attached,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unattached => write!(f, "unattached"),
            SessionState::Attached => write!(f, "attached"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// A finalised trace file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// A sampling profiler attached to a running target process.
///
/// The trace is only valid after [`stop`](Self::stop) has interrupted the
/// profiler and observed its exit. If the session is dropped while still
/// attached, the profiler gets SIGINT so it can still flush.
#[derive(Debug)]
pub struct ProfilerSession {
    target_pid: u32,
    output: PathBuf,
    process: Option<ManagedProcess>,
    state: SessionState,
    trace: Option<TraceFile>,
    interrupts_sent: u32,
}

impl ProfilerSession {
    /// Spawn `tool` against `target_pid`, writing to `output`, then wait
    /// `settle` so sampling is live before control returns.
    ///
    /// Fails with [`ShotError::ProfilerAttach`] when the tool cannot be
    /// launched or exits during the settle time (missing binary, missing
    /// permissions, bad PID).
    pub async fn attach(
        tool: &dyn ProfilerTool,
        target_pid: u32,
        output: impl Into<PathBuf>,
        settle: Duration,
    ) -> ShotResult<Self> {
        let output = output.into();
        remove_stale_trace(&output)
            .map_err(|e| ShotError::profiler_attach(target_pid, e.to_string()))?;

        let args = tool.attach_args(target_pid, &output);
        let mut process = tool
            .spawn(&args)
            .map_err(|e| ShotError::profiler_attach(target_pid, e.to_string()))?
            .with_drop_signal(Some(SignalKind::Interrupt));

        info!(
            "Profiler {} (PID {}) attaching to PID {}, trace: {}",
            tool.name(),
            process.pid(),
            target_pid,
            output.display()
        );

        tokio::time::sleep(settle).await;

        let status = process
            .try_status()
            .map_err(|e| ShotError::profiler_attach(target_pid, e.to_string()))?;
        if let Some(exit) = status {
            return Err(ShotError::profiler_attach(
                target_pid,
                format!("{} exited during settle time: {}", tool.name(), exit),
            ));
        }

        debug!("Profiler settled after {:?}", settle);
        Ok(Self {
            target_pid,
            output,
            process: Some(process),
            state: SessionState::Attached,
            trace: None,
            interrupts_sent: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target_pid(&self) -> u32 {
        self.target_pid
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// PID of the profiler itself while it is still owned by the session.
    pub fn profiler_pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.pid())
    }

    /// Number of graceful-stop signals delivered so far.
    pub fn interrupts_sent(&self) -> u32 {
        self.interrupts_sent
    }

    /// The finalised trace, after a successful stop that left a non-empty file.
    pub fn trace(&self) -> Option<&TraceFile> {
        self.trace.as_ref()
    }

    /// Interrupt the profiler, wait for it to exit, then record the trace if
    /// a non-empty one was written.
    ///
    /// With `limit` set, a profiler that is still running when it elapses is
    /// force killed and the stop fails with [`ShotError::TraceTruncated`].
    /// Whatever the outcome, the session ends in `Stopped` and the profiler
    /// has been reaped. A second call is a no-op.
    pub async fn stop(&mut self, limit: Option<Duration>) -> ShotResult<()> {
        match self.state {
            SessionState::Stopped => {
                debug!("Profiler session for PID {} already stopped", self.target_pid);
                return Ok(());
            }
            SessionState::Unattached => {
                return Err(ShotError::invalid_state(
                    "profiler-session",
                    self.state.to_string(),
                    SessionState::Stopped.to_string(),
                ));
            }
            SessionState::Attached => {}
        }

        let Some(mut process) = self.process.take() else {
            self.state = SessionState::Stopped;
            return Err(ShotError::invalid_state(
                "profiler-session",
                "attached without a profiler process",
                SessionState::Stopped.to_string(),
            ));
        };
        self.state = SessionState::Stopped;

        let result = self.interrupt_and_wait(&mut process, limit).await;
        match &result {
            Ok(()) => info!("Profiler session for PID {} stopped", self.target_pid),
            Err(e) => warn!("Profiler session for PID {} stopped with error: {}", self.target_pid, e),
        }
        result
    }

    async fn interrupt_and_wait(
        &mut self,
        process: &mut ManagedProcess,
        limit: Option<Duration>,
    ) -> ShotResult<()> {
        let exited_early = match process.send_signal(SignalKind::Interrupt) {
            Ok(()) => {
                self.interrupts_sent += 1;
                false
            }
            Err(e) if e.is_no_such_process() => {
                warn!("Profiler exited before it was interrupted");
                true
            }
            Err(e) => {
                // Could not deliver the graceful stop: the trace cannot be
                // finalised, so reap the profiler the hard way.
                process.kill()?;
                process.wait().await?;
                return Err(ShotError::trace_truncated(
                    self.output.display().to_string(),
                    format!("graceful stop could not be delivered: {}", e),
                ));
            }
        };

        let exit = match limit {
            Some(limit) => match process.wait_timeout(limit).await? {
                Some(exit) => exit,
                None => {
                    warn!(
                        "Profiler (PID {}) ignored SIGINT for {:?}, force killing",
                        process.pid(),
                        limit
                    );
                    process.kill()?;
                    process.wait().await?;
                    return Err(ShotError::trace_truncated(
                        self.output.display().to_string(),
                        format!("profiler did not exit within {:?} of SIGINT and was killed", limit),
                    ));
                }
            },
            None => process.wait().await?,
        };

        self.finalise(exit, exited_early)
    }

    fn finalise(&mut self, exit: ExitInfo, exited_early: bool) -> ShotResult<()> {
        let path = self.output.display().to_string();

        if exit.signal == Some(SIGKILL) {
            return Err(ShotError::trace_truncated(path, format!("profiler was killed ({exit})")));
        }
        if exited_early && !exit.success() {
            return Err(ShotError::trace_truncated(
                path,
                format!("profiler exited on its own before the load finished ({exit})"),
            ));
        }
        if !exit.success() && !exit.killed_by_signal() {
            warn!("Profiler finished with {}", exit);
        }

        let metadata = match std::fs::metadata(&self.output) {
            Ok(metadata) if metadata.len() > 0 => metadata,
            Ok(_) => {
                warn!("Profiler exited ({}) but trace {} is empty", exit, path);
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Profiler exited ({}) without writing {}", exit, path);
                return Ok(());
            }
            Err(e) => return Err(ShotError::io(format!("inspect trace {path}"), &e)),
        };

        self.trace = Some(TraceFile {
            path: self.output.clone(),
            size_bytes: metadata.len(),
        });
        Ok(())
    }
}

fn remove_stale_trace(output: &Path) -> ShotResult<()> {
    match std::fs::remove_file(output) {
        Ok(()) => {
            debug!("Removed stale trace {}", output.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ShotError::io(format!("remove stale trace {}", output.display()), &e)),
    }
}
