//! Standard stream wiring for spawned children.

use std::process::Stdio;

/// Where a child's stdin, stdout and stderr go.
///
/// `Stdio` is not `Clone`, so a `ProcessIo` is consumed by the spawn that
/// uses it.
#[derive(Debug)]
pub struct ProcessIo {
    pub stdin: Stdio,
    pub stdout: Stdio,
    pub stderr: Stdio,
}

impl ProcessIo {
    /// Every stream connected to the null device.
    pub fn quiet() -> Self {
        Self {
            stdin: Stdio::null(),
            stdout: Stdio::null(),
            stderr: Stdio::null(),
        }
    }

    /// stdout and stderr shared with the harness, stdin closed.
    pub fn inherit_output() -> Self {
        Self {
            stdin: Stdio::null(),
            stdout: Stdio::inherit(),
            stderr: Stdio::inherit(),
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<Stdio>) -> Self {
        self.stdin = stdin.into();
        self
    }

    pub fn with_stdout(mut self, stdout: impl Into<Stdio>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<Stdio>) -> Self {
        self.stderr = stderr.into();
        self
    }
}

impl Default for ProcessIo {
    fn default() -> Self {
        Self::quiet()
    }
}
