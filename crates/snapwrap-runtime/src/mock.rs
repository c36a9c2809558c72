use crate::launcher::Launcher;
use crate::LaunchError;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Launcher that records invocations instead of starting processes.
#[derive(Debug, Default)]
pub struct MockLauncher {
    exit_code: i32,
    missing: Vec<PathBuf>,
    launches: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit code reported for every launch.
    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Treat `program` as absent.
    #[must_use]
    pub fn with_missing(mut self, program: impl Into<PathBuf>) -> Self {
        self.missing.push(program.into());
        self
    }

    pub fn launches(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.launches
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

impl Launcher for MockLauncher {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn launch(&self, program: &Path, args: &[String]) -> Result<i32, LaunchError> {
        if self.missing.iter().any(|m| m == program) {
            return Err(LaunchError::NotFound(program.display().to_string()));
        }
        let mut launches = self
            .launches
            .lock()
            .map_err(|e| LaunchError::Spawn {
                program: program.to_path_buf(),
                source: std::io::Error::other(format!("mock state poisoned: {e}")),
            })?;
        launches.push((program.to_path_buf(), args.to_vec()));
        Ok(self.exit_code)
    }
}
