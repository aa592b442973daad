//! # Perfshot Managed Process
//!
//! Scoped ownership of the external processes a profiling run launches.
//!
//! **Architecture:**
//! ```text
//! Orchestrator / ProfilerSession / GraphRenderer
//!       ↓ spawn through
//! ExternalTool trait (one implementation per tool)
//!       ↓ produces
//! ManagedProcess (owns the child, signals it, waits on it)
//!       ↓ uses
//! perfshot-process primitives (signals, command lines)
//! ```
//!
//! A [`ManagedProcess`] is owned by exactly one component. When it goes out
//! of scope while the child is still running, its drop signal is delivered
//! so no child outlives the run that started it.

pub mod io;
pub mod process;
pub mod state;
pub mod tool;

pub use io::ProcessIo;
pub use process::ManagedProcess;
pub use state::{ProcessState, ProcessStateMachine, StateTransition};
pub use tool::{CommandTool, ExternalTool};
