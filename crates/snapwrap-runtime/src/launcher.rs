use crate::LaunchError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directories under the install root searched for confined binaries.
pub const INSTALL_ROOT_BIN_DIRS: [&str; 4] = ["usr/bin", "bin", "usr/sbin", "sbin"];

/// How a binary name is turned into something the OS can start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "strategy", content = "root")]
pub enum BinaryLookup {
    /// Let the OS search `PATH` (classic entry points and absolute paths).
    SearchPath,
    /// Look under the given install root.
    InstallRoot(PathBuf),
}

/// The program half of a resolved invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Executable {
    pub program: String,
    pub lookup: BinaryLookup,
}

impl Executable {
    pub fn search_path(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            lookup: BinaryLookup::SearchPath,
        }
    }

    pub fn install_root(program: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            lookup: BinaryLookup::InstallRoot(root.into()),
        }
    }

    /// Turn the program into a path to hand to the launcher.
    ///
    /// Search-path programs are returned untouched; the OS reports a missing
    /// binary when the launch is attempted.
    pub fn locate(&self) -> Result<PathBuf, LaunchError> {
        match &self.lookup {
            BinaryLookup::SearchPath => Ok(PathBuf::from(&self.program)),
            BinaryLookup::InstallRoot(root) => {
                let program = Path::new(&self.program);
                if program.is_absolute() {
                    return Ok(program.to_path_buf());
                }
                if self.program.contains('/') {
                    let candidate = root.join(program);
                    return if candidate.is_file() {
                        Ok(candidate)
                    } else {
                        Err(LaunchError::NotFound(candidate.display().to_string()))
                    };
                }
                INSTALL_ROOT_BIN_DIRS
                    .iter()
                    .map(|dir| root.join(dir).join(program))
                    .find(|candidate| candidate.is_file())
                    .ok_or_else(|| {
                        LaunchError::NotFound(format!(
                            "{} (searched {{{}}} under {})",
                            self.program,
                            INSTALL_ROOT_BIN_DIRS.join(","),
                            root.display()
                        ))
                    })
            }
        }
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)
    }
}

/// Starts the target binary with standard streams and environment inherited.
pub trait Launcher {
    fn name(&self) -> &str;

    /// Run `program` with `args` and return its exit code.
    ///
    /// Process-replacing launchers only return on failure.
    fn launch(&self, program: &Path, args: &[String]) -> Result<i32, LaunchError>;
}

/// Shared launchers, so a caller can keep a handle on one it hands over.
impl<L: Launcher + ?Sized> Launcher for std::sync::Arc<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn launch(&self, program: &Path, args: &[String]) -> Result<i32, LaunchError> {
        (**self).launch(program, args)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// Replace the wrapper's process image.
    #[default]
    Exec,
    /// Spawn a child and wait for it.
    Spawn,
}

impl FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exec" => Ok(Self::Exec),
            "spawn" => Ok(Self::Spawn),
            other => Err(format!(
                "unknown launch mode '{other}', expected 'exec' or 'spawn'"
            )),
        }
    }
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exec => "exec",
            Self::Spawn => "spawn",
        })
    }
}

pub fn select_launcher(mode: LaunchMode) -> Box<dyn Launcher> {
    match mode {
        LaunchMode::Exec => Box::new(crate::process::ExecLauncher),
        LaunchMode::Spawn => Box::new(crate::process::SpawnLauncher),
    }
}
