//! Error types for the perfshot harness.
//!
//! Every fallible operation in the harness returns [`ShotResult`]. The
//! variants map one-to-one onto the failure kinds the orchestrator reasons
//! about when it decides between aborting a run and walking the teardown
//! path.
//!
//! ```rust
//! use perfshot_common::{ShotError, ShotResult};
//!
//! fn launch() -> ShotResult<u32> {
//!     Err(ShotError::spawn("target", "No such file or directory"))
//! }
//!
//! let err = launch().unwrap_err();
//! assert!(err.to_string().contains("target"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout perfshot.
pub type ShotResult<T> = std::result::Result<T, ShotError>;

/// Everything that can go wrong while driving a profiling run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShotError {
    /// An external process could not be launched.
    #[error("Spawn failed: {program} - {reason}")]
    Spawn { program: String, reason: String },

    /// A signal or wait targeted a process that has already exited.
    #[error("No such process: {label} (PID {pid})")]
    NoSuchProcess { label: String, pid: u32 },

    /// The profiler could not be attached to the target.
    #[error("Profiler attach failed for PID {target_pid}: {reason}")]
    ProfilerAttach { target_pid: u32, reason: String },

    /// A single shot failed. Never fatal for a run.
    #[error("Request failed: {url} - {reason}")]
    Request { url: String, reason: String },

    /// The flame graph could not be produced.
    #[error("Render failed: {reason}")]
    Render { reason: String },

    /// The trace file is missing, empty, or the profiler was killed before
    /// it could finalise it.
    #[error("Trace truncated: {path} - {reason}")]
    TraceTruncated { path: String, reason: String },

    /// Signal delivery failed for a reason other than the process being gone.
    #[error("Signal {signal} to PID {pid} failed: {reason}")]
    Signal {
        pid: u32,
        signal: String,
        reason: String,
    },

    /// A state machine was asked to make an illegal transition.
    #[error("Invalid state: {id} - cannot move from {from} to {to}")]
    InvalidState { id: String, from: String, to: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {operation} - {reason}")]
    Io { operation: String, reason: String },
}

impl ShotError {
    pub fn spawn(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn no_such_process(label: impl Into<String>, pid: u32) -> Self {
        Self::NoSuchProcess {
            label: label.into(),
            pid,
        }
    }

    pub fn profiler_attach(target_pid: u32, reason: impl Into<String>) -> Self {
        Self::ProfilerAttach {
            target_pid,
            reason: reason.into(),
        }
    }

    pub fn request(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Request {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn render(reason: impl Into<String>) -> Self {
        Self::Render {
            reason: reason.into(),
        }
    }

    pub fn trace_truncated(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TraceTruncated {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn signal(pid: u32, signal: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Signal {
            pid,
            signal: signal.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_state(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            id: id.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn io(operation: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            reason: err.to_string(),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::NoSuchProcess { .. } => "no_such_process",
            Self::ProfilerAttach { .. } => "profiler_attach",
            Self::Request { .. } => "request",
            Self::Render { .. } => "render",
            Self::TraceTruncated { .. } => "trace_truncated",
            Self::Signal { .. } => "signal",
            Self::InvalidState { .. } => "invalid_state",
            Self::Configuration { .. } => "configuration",
            Self::Io { .. } => "io",
        }
    }

    /// True when the process the error refers to is already gone.
    pub fn is_no_such_process(&self) -> bool {
        matches!(self, Self::NoSuchProcess { .. })
    }
}
