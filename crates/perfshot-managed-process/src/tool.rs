//! ExternalTool - how the harness launches each external program.
//!
//! Orchestration code never composes shell strings. It asks a tool to spawn
//! itself with a list of arguments and gets a [`ManagedProcess`] back; how
//! the tool turns those arguments into a command line is the tool's business.

use crate::io::ProcessIo;
use crate::process::ManagedProcess;
use perfshot_common::ShotResult;
use perfshot_process::CommandLine;

/// Capability to launch one kind of external program.
pub trait ExternalTool: Send + Sync {
    /// Label used in logs and errors.
    fn name(&self) -> &str;

    /// The full command line for an invocation with `args`.
    fn command_line(&self, args: &[String]) -> CommandLine;

    /// Stream wiring used by [`spawn`](Self::spawn).
    fn io(&self) -> ProcessIo {
        ProcessIo::quiet()
    }

    fn spawn(&self, args: &[String]) -> ShotResult<ManagedProcess> {
        self.spawn_with_io(args, self.io())
    }

    fn spawn_with_io(&self, args: &[String], io: ProcessIo) -> ShotResult<ManagedProcess> {
        ManagedProcess::start(self.name(), &self.command_line(args), io)
    }
}

/// A tool described by a fixed base command; invocation arguments are
/// appended to it.
#[derive(Debug, Clone)]
pub struct CommandTool {
    name: String,
    base: CommandLine,
    inherit_output: bool,
}

impl CommandTool {
    pub fn new(name: impl Into<String>, base: CommandLine) -> Self {
        Self {
            name: name.into(),
            base,
            inherit_output: false,
        }
    }

    /// Build from a single shell-word string such as `"perf script"`.
    pub fn parse(name: impl Into<String>, line: &str) -> ShotResult<Self> {
        Ok(Self::new(name, CommandLine::parse(line)?))
    }

    /// Share stdout/stderr with the harness instead of discarding them.
    pub fn with_inherited_output(mut self, inherit: bool) -> Self {
        self.inherit_output = inherit;
        self
    }

    pub fn base(&self) -> &CommandLine {
        &self.base
    }
}

impl ExternalTool for CommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn command_line(&self, args: &[String]) -> CommandLine {
        self.base.clone().args(args.iter().cloned())
    }

    fn io(&self) -> ProcessIo {
        if self.inherit_output {
            ProcessIo::inherit_output()
        } else {
            ProcessIo::quiet()
        }
    }
}
