//! # Perfshot Common
//!
//! Error kinds and small value types shared by every perfshot crate.
//!
//! Nothing in here touches the operating system; the process crates build
//! on these types to describe what happened to a child process.

pub mod errors;
pub mod types;

pub use errors::{ShotError, ShotResult};
pub use types::{ExitInfo, SignalKind};
