//! # Perfshot Orchestrator
//!
//! Sequences one profiling run:
//!
//! ```text
//! start target -> attach profiler (settle) -> warm-up -> load
//!   -> stop profiler (SIGINT, wait) -> stop target (SIGTERM, wait)
//!   -> cooldown -> render flame graph
//! ```
//!
//! Configuration comes from YAML ([`PerfshotConfig`]); the outcome of a run
//! is a [`RunReport`].

pub mod config;
pub mod orchestrator;
pub mod report;
pub mod state;

pub use config::PerfshotConfig;
pub use orchestrator::{Orchestrator, RunSettings};
pub use report::{RecordedFailure, RunReport};
pub use state::{RunState, RunStateMachine, RunTransition};
