use crate::CoreError;
use serde::Serialize;
use snapwrap_runtime::LaunchMode;
use snapwrap_schema::{find_manifest, SnapContext};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MANIFEST_ENV: &str = "SNAPWRAP_MANIFEST";
pub const TEMPLATES_ENV: &str = "SNAPWRAP_TEMPLATES";
pub const LOCK_FILE_ENV: &str = "SNAPWRAP_LOCK_FILE";
pub const LAUNCH_ENV: &str = "SNAPWRAP_LAUNCH";

pub const DEFAULT_LOCK_FILE: &str = "/var/lock/snapwrap.lock";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Explicit choices layered over the defaults, from the environment or the
/// command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub manifest: Option<PathBuf>,
    pub templates: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
    pub launch_mode: Option<LaunchMode>,
}

impl ConfigOverrides {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let launch_mode = get(LAUNCH_ENV)
            .map(|v| {
                v.parse::<LaunchMode>()
                    .map_err(|e| CoreError::Environment(format!("{LAUNCH_ENV}: {e}")))
            })
            .transpose()?;
        Ok(Self {
            manifest: get(MANIFEST_ENV).map(PathBuf::from),
            templates: get(TEMPLATES_ENV).map(PathBuf::from),
            lock_file: get(LOCK_FILE_ENV).map(PathBuf::from),
            launch_mode,
        })
    }

    /// Values set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            manifest: other.manifest.or(self.manifest),
            templates: other.templates.or(self.templates),
            lock_file: other.lock_file.or(self.lock_file),
            launch_mode: other.launch_mode.or(self.launch_mode),
        }
    }
}

/// Fully resolved wrapper settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrapperConfig {
    pub manifest_path: PathBuf,
    pub templates_dir: PathBuf,
    pub lock_file: PathBuf,
    #[serde(skip)]
    pub lock_timeout: Duration,
    pub launch_mode: LaunchMode,
}

impl WrapperConfig {
    /// Fill in whatever `overrides` leaves open.
    ///
    /// Without an explicit manifest the install root must be known, since
    /// that is where the manifest is looked for.
    pub fn resolve(context: &SnapContext, overrides: ConfigOverrides) -> Result<Self, CoreError> {
        let manifest_path = match overrides.manifest {
            Some(path) => path,
            None => {
                let root = context.install_root().ok_or_else(|| {
                    CoreError::Environment(
                        "SNAP is not set: not executing in a snap environment \
                         (pass --manifest to run outside one)"
                            .to_owned(),
                    )
                })?;
                find_manifest(root)?
            }
        };
        let templates_dir = overrides
            .templates
            .unwrap_or_else(|| default_templates_dir(context, &manifest_path));
        Ok(Self {
            manifest_path,
            templates_dir,
            lock_file: overrides
                .lock_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCK_FILE)),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            launch_mode: overrides.launch_mode.unwrap_or_default(),
        })
    }
}

/// `{snap}/templates`, or next to the manifest when running outside a snap.
fn default_templates_dir(context: &SnapContext, manifest_path: &Path) -> PathBuf {
    context
        .install_root()
        .or_else(|| manifest_path.parent().filter(|p| !p.as_os_str().is_empty()))
        .unwrap_or_else(|| Path::new("."))
        .join("templates")
}
