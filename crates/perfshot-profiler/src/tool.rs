//! Profiler tools.

use perfshot_common::ShotResult;
use perfshot_managed_process::ExternalTool;
use perfshot_process::CommandLine;
use std::path::Path;

/// An external tool that can attach to a PID and write a trace file.
pub trait ProfilerTool: ExternalTool {
    /// Arguments that make the tool sample `target_pid` into `output`.
    fn attach_args(&self, target_pid: u32, output: &Path) -> Vec<String>;
}

/// `perf record` attached to an existing PID.
#[derive(Debug, Clone)]
pub struct PerfRecord {
    program: CommandLine,
    call_graph: bool,
    frequency: Option<u32>,
    extra_args: Vec<String>,
}

impl PerfRecord {
    /// `program` may carry a prefix, e.g. `sudo perf`.
    pub fn new(program: CommandLine) -> Self {
        Self {
            program,
            call_graph: true,
            frequency: None,
            extra_args: Vec::new(),
        }
    }

    pub fn parse(program: &str) -> ShotResult<Self> {
        Ok(Self::new(CommandLine::parse(program)?))
    }

    /// Record call graphs (`-g`). On by default.
    pub fn with_call_graph(mut self, enabled: bool) -> Self {
        self.call_graph = enabled;
        self
    }

    /// Sampling frequency in Hz (`-F`). perf's default when unset.
    pub fn with_frequency(mut self, frequency: Option<u32>) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}

impl Default for PerfRecord {
    fn default() -> Self {
        Self::new(CommandLine::new("perf"))
    }
}

impl ExternalTool for PerfRecord {
    fn name(&self) -> &str {
        "perf-record"
    }

    fn command_line(&self, args: &[String]) -> CommandLine {
        self.program
            .clone()
            .arg("record")
            .args(args.iter().cloned())
    }
}

impl ProfilerTool for PerfRecord {
    fn attach_args(&self, target_pid: u32, output: &Path) -> Vec<String> {
        let mut args = vec!["-o".to_string(), output.display().to_string()];
        if self.call_graph {
            args.push("-g".to_string());
        }
        if let Some(frequency) = self.frequency {
            args.push("-F".to_string());
            args.push(frequency.to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("-p".to_string());
        args.push(target_pid.to_string());
        args
    }
}
