//! # Perfshot Process
//!
//! Low-level process operations the managed layer is built on:
//! - Command-line construction and shell-word parsing
//! - Signal delivery (interrupt, terminate, kill)
//! - Process existence checks
//! - Executable validation
//!
//! Nothing in this crate owns a child process; it only acts on PIDs and
//! command descriptions.

pub mod check;
pub mod command;
pub mod signal;
pub mod validation;

pub use check::*;
pub use command::CommandLine;
pub use signal::*;
pub use validation::*;
