use crate::launcher::Launcher;
use crate::LaunchError;
use std::io::ErrorKind;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Command, ExitStatus};
use tracing::debug;

/// Replaces the current process image with the target (`execvp`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecLauncher;

/// Spawns the target as a child and waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnLauncher;

impl Launcher for ExecLauncher {
    fn name(&self) -> &'static str {
        "exec"
    }

    fn launch(&self, program: &Path, args: &[String]) -> Result<i32, LaunchError> {
        debug!("exec {}", program.display());
        // exec() only returns when the image could not be replaced.
        let err = Command::new(program).args(args).exec();
        Err(launch_error(program, err))
    }
}

impl Launcher for SpawnLauncher {
    fn name(&self) -> &'static str {
        "spawn"
    }

    fn launch(&self, program: &Path, args: &[String]) -> Result<i32, LaunchError> {
        debug!("spawn {}", program.display());
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| launch_error(program, e))?;
        Ok(exit_code(status))
    }
}

fn launch_error(program: &Path, err: std::io::Error) -> LaunchError {
    if err.kind() == ErrorKind::NotFound {
        LaunchError::NotFound(program.display().to_string())
    } else {
        LaunchError::Spawn {
            program: program.to_path_buf(),
            source: err,
        }
    }
}

/// Map a child's status to a shell-style exit code: the code itself, or
/// 128 + signal number when the child was killed.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}
