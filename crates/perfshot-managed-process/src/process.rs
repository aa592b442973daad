//! ManagedProcess - exclusive owner of one spawned child.

use crate::io::ProcessIo;
use crate::state::{ProcessState, ProcessStateMachine};
use chrono::{DateTime, Utc};
use perfshot_common::{ExitInfo, ShotError, ShotResult, SignalKind};
use perfshot_process::CommandLine;
use std::time::Duration;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

/// One external process, from spawn until its exit has been observed.
///
/// The handle is not `Clone`: whoever started the process owns it and is the
/// only one allowed to signal or wait on it. Dropping a handle whose child
/// is still running delivers the drop signal (SIGTERM unless configured
/// otherwise) without blocking.
#[derive(Debug)]
pub struct ManagedProcess {
    label: String,
    command: CommandLine,
    pid: u32,
    started_at: DateTime<Utc>,
    child: Child,
    exit: Option<ExitInfo>,
    state: ProcessStateMachine,
    drop_signal: Option<SignalKind>,
}

impl ManagedProcess {
    /// Spawn `command`.
    ///
    /// Fails with [`ShotError::Spawn`] when the executable cannot be found or
    /// launched. On Unix the child gets its own process group, so a terminal
    /// Ctrl-C reaches only the harness.
    pub fn start(label: &str, command: &CommandLine, io: ProcessIo) -> ShotResult<Self> {
        info!("Spawning {}: {}", label, command);

        let mut cmd = Command::new(command.program());
        cmd.args(command.arguments())
            .stdin(io.stdin)
            .stdout(io.stdout)
            .stderr(io.stderr)
            .kill_on_drop(false);

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| ShotError::spawn(command.program(), e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| ShotError::spawn(command.program(), "child exited before its PID was read"))?;

        info!("Spawned {} (PID: {})", label, pid);

        Ok(Self {
            label: label.to_string(),
            command: command.clone(),
            pid,
            started_at: Utc::now(),
            child,
            exit: None,
            state: ProcessStateMachine::new(label),
            drop_signal: Some(SignalKind::Terminate),
        })
    }

    /// Signal delivered if the handle is dropped while the child still runs.
    /// `None` leaves the child alone.
    pub fn with_drop_signal(mut self, signal: Option<SignalKind>) -> Self {
        self.drop_signal = signal;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Exit status, once observed.
    pub fn exit_status(&self) -> Option<ExitInfo> {
        self.exit
    }

    pub fn state(&self) -> ProcessState {
        self.state.current_state()
    }

    /// Take the child's stdout pipe, if it was spawned with one.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Non-blocking exit check. Records the status if the child has exited.
    pub fn try_status(&mut self) -> ShotResult<Option<ExitInfo>> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }

        match self.child.try_wait() {
            Ok(Some(status)) => Ok(Some(self.record_exit(status.into()))),
            Ok(None) => Ok(None),
            Err(e) => Err(ShotError::io(format!("poll {}", self.label), &e)),
        }
    }

    /// Whether the child is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.try_status(), Ok(None))
    }

    /// Deliver `kind` to the child.
    ///
    /// Fails with [`ShotError::NoSuchProcess`] when the child has already
    /// exited, including the case where it is an unreaped zombie.
    pub fn send_signal(&mut self, kind: SignalKind) -> ShotResult<()> {
        if self.try_status()?.is_some() {
            return Err(ShotError::no_such_process(&self.label, self.pid));
        }

        perfshot_process::send_signal(&self.label, self.pid, kind)?;
        self.state
            .transition_to(ProcessState::Stopping, Some(format!("{} delivered", kind)))?;
        Ok(())
    }

    /// Block until the child exits.
    ///
    /// Safe to call any number of times; after the first observed exit the
    /// cached status is returned.
    pub async fn wait(&mut self) -> ShotResult<ExitInfo> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ShotError::io(format!("wait for {}", self.label), &e))?;
        Ok(self.record_exit(status.into()))
    }

    /// [`wait`](Self::wait) bounded by `limit`. `Ok(None)` means the child is
    /// still running when the limit elapsed.
    pub async fn wait_timeout(&mut self, limit: Duration) -> ShotResult<Option<ExitInfo>> {
        match tokio::time::timeout(limit, self.wait()).await {
            Ok(result) => result.map(Some),
            Err(_) => {
                debug!("{} (PID {}) still running after {:?}", self.label, self.pid, limit);
                Ok(None)
            }
        }
    }

    /// Request termination (SIGTERM) without waiting for exit.
    ///
    /// Terminating a child that has already exited, or that has already
    /// been asked to stop, is a no-op.
    pub fn terminate(&mut self) -> ShotResult<()> {
        if self.state() == ProcessState::Stopping {
            debug!("{} (PID {}) already stopping", self.label, self.pid);
            return Ok(());
        }
        self.signal_unless_gone(SignalKind::Terminate)
    }

    /// Force kill (SIGKILL) without waiting. A no-op once the child is gone.
    pub fn kill(&mut self) -> ShotResult<()> {
        self.signal_unless_gone(SignalKind::Kill)
    }

    fn signal_unless_gone(&mut self, kind: SignalKind) -> ShotResult<()> {
        match self.send_signal(kind) {
            Err(e) if e.is_no_such_process() => {
                debug!("{} (PID {}) already exited, skipping {}", self.label, self.pid, kind);
                Ok(())
            }
            other => other,
        }
    }

    fn record_exit(&mut self, exit: ExitInfo) -> ExitInfo {
        if self.exit.is_none() {
            if exit.success() || self.state() == ProcessState::Stopping {
                info!("{} (PID {}) exited: {}", self.label, self.pid, exit);
            } else {
                warn!("{} (PID {}) exited: {}", self.label, self.pid, exit);
            }
            self.exit = Some(exit);
            let _ = self
                .state
                .transition_to(ProcessState::Exited, Some(exit.to_string()));
        }
        exit
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.exit.is_some() {
            return;
        }
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Some(signal) = self.drop_signal {
            warn!(
                "{} (PID {}) still running at end of scope, sending {}",
                self.label, self.pid, signal
            );
            if let Err(e) = perfshot_process::send_signal(&self.label, self.pid, signal) {
                warn!("Failed to signal {} on drop: {}", self.label, e);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandLine {
        CommandLine::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let err = ManagedProcess::start(
            "ghost",
            &CommandLine::new("/definitely/not/here/server"),
            ProcessIo::quiet(),
        )
        .unwrap_err();
        assert!(matches!(err, ShotError::Spawn { .. }), "unexpected: {err}");
    }

    #[tokio::test]
    async fn test_wait_returns_cached_status() {
        let mut process = ManagedProcess::start("exiter", &sh("exit 3"), ProcessIo::quiet()).unwrap();
        assert!(process.pid() > 0);

        let first = process.wait().await.unwrap();
        let second = process.wait().await.unwrap();
        assert_eq!(first, ExitInfo::from_code(3));
        assert_eq!(first, second);
        assert_eq!(process.state(), ProcessState::Exited);
    }

    #[tokio::test]
    async fn test_signal_after_exit_is_no_such_process() {
        let mut process = ManagedProcess::start("quick", &CommandLine::new("true"), ProcessIo::quiet()).unwrap();
        process.wait().await.unwrap();

        let err = process.send_signal(SignalKind::Interrupt).unwrap_err();
        assert!(err.is_no_such_process());
    }

    #[tokio::test]
    async fn test_double_terminate_is_noop() {
        let mut process = ManagedProcess::start(
            "sleeper",
            &CommandLine::new("sleep").arg("30"),
            ProcessIo::quiet(),
        )
        .unwrap();

        process.terminate().unwrap();
        process.terminate().unwrap();

        let exit = process.wait().await.unwrap();
        assert!(exit.killed_by_signal());

        // Still a no-op once the exit has been observed.
        process.terminate().unwrap();
        process.kill().unwrap();
    }

    #[tokio::test]
    async fn test_wait_timeout_then_kill() {
        let mut process = ManagedProcess::start(
            "stubborn",
            &CommandLine::new("sleep").arg("30"),
            ProcessIo::quiet(),
        )
        .unwrap();

        let waited = process.wait_timeout(Duration::from_millis(100)).await.unwrap();
        assert!(waited.is_none());
        assert!(process.is_running());

        process.kill().unwrap();
        let exit = process
            .wait_timeout(Duration::from_secs(5))
            .await
            .unwrap()
            .expect("killed process should exit");
        assert_eq!(exit.signal, Some(9));
    }

    #[tokio::test]
    async fn test_drop_delivers_drop_signal() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("terminated");
        let script = format!(
            "trap 'echo term > {}; exit 0' TERM; while :; do sleep 0.05; done",
            marker.display()
        );

        let process = ManagedProcess::start("scoped", &sh(&script), ProcessIo::quiet()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(process);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !marker.exists() && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(marker.exists(), "drop did not terminate the child");
    }
}
