//! Signal delivery.
//!
//! `ESRCH` is reported as [`ShotError::NoSuchProcess`] so callers can treat
//! "already gone" differently from a real delivery failure.

use perfshot_common::{ShotError, ShotResult, SignalKind};
use tracing::debug;

/// Deliver `kind` to `pid`. `label` only flavours the error message.
pub fn send_signal(label: &str, pid: u32, kind: SignalKind) -> ShotResult<()> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let signal = match kind {
            SignalKind::Interrupt => Signal::SIGINT,
            SignalKind::Terminate => Signal::SIGTERM,
            SignalKind::Kill => Signal::SIGKILL,
        };

        debug!("Sending {} to {} (PID {})", kind, label, pid);
        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(ShotError::no_such_process(label, pid)),
            Err(e) => Err(ShotError::signal(pid, kind.name(), e.to_string())),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = label;
        Err(ShotError::signal(
            pid,
            kind.name(),
            "signal delivery is only supported on Unix",
        ))
    }
}
