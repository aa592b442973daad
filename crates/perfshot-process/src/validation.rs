//! Validation helpers run before anything is spawned.

use crate::CommandLine;
use perfshot_common::{ShotError, ShotResult};
use std::path::{Path, PathBuf};

/// Resolve the program of `command` to an executable path.
///
/// Programs containing a path separator are checked as given; bare names
/// are looked up on `PATH`. A failure is reported as a spawn error because
/// that is what launching it would have produced.
pub fn validate_executable(command: &CommandLine) -> ShotResult<PathBuf> {
    let program = command.program();
    if program.is_empty() {
        return Err(ShotError::configuration("Executable path cannot be empty"));
    }

    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        let path = Path::new(program);
        if !path.is_file() {
            return Err(ShotError::spawn(program, "executable not found"));
        }
        return Ok(path.to_path_buf());
    }

    which::which(program).map_err(|e| ShotError::spawn(program, e.to_string()))
}
