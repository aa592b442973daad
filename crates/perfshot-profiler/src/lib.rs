//! # Perfshot Profiler
//!
//! Attaches a sampling profiler to a live target and stops it so that its
//! trace file is complete.
//!
//! Session lifecycle:
//! ```text
//! Unattached --attach--> Attached --stop (SIGINT, wait)--> Stopped
//! ```
//! A profiler that has to be killed leaves a truncated trace; the session
//! reports that as an error instead of handing the file on.

pub mod session;
pub mod tool;

pub use session::{ProfilerSession, SessionState, TraceFile};
pub use tool::{PerfRecord, ProfilerTool};
