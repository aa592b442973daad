//! Process existence checks.

use perfshot_common::{ShotError, ShotResult};

/// Check whether a process with the given PID exists.
///
/// On Unix this is `kill(pid, 0)`: no signal is sent, only the permission
/// and existence checks run. A zombie still counts as existing until it is
/// reaped.
///
/// * `Ok(true)` - the process exists (possibly owned by another user)
/// * `Ok(false)` - no such process
/// * `Err(_)` - the check itself failed
pub fn process_exists(pid: u32) -> ShotResult<bool> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(Errno::EPERM) => Ok(true),
            Err(e) => Err(ShotError::signal(pid, "probe", e.to_string())),
        }
    }

    #[cfg(not(unix))]
    {
        Err(ShotError::signal(
            pid,
            "probe",
            "process probing is only supported on Unix",
        ))
    }
}
