pub mod dry_run;
pub mod launch;

use snapwrap_core::CoreError;
use thiserror::Error;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_MANIFEST_ERROR: u8 = 3;
pub const EXIT_SETUP_ERROR: u8 = 4;
pub const EXIT_UNKNOWN_ENTRY_POINT: u8 = 5;
pub const EXIT_LAUNCH_FAILURE: u8 = 127;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("usage: {0}")]
    Usage(String),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Core(CoreError::Environment(_)) | Self::Json(_) => EXIT_FAILURE,
            Self::Usage(_) => EXIT_USAGE,
            Self::Core(CoreError::Manifest(_)) => EXIT_MANIFEST_ERROR,
            Self::Core(CoreError::Setup(_)) => EXIT_SETUP_ERROR,
            Self::Core(CoreError::UnknownEntryPoint(_)) => EXIT_UNKNOWN_ENTRY_POINT,
            Self::Core(CoreError::Launch(_)) => EXIT_LAUNCH_FAILURE,
        }
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Narrow a child's exit code to what the wrapper can itself exit with.
pub fn child_exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(EXIT_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapwrap_runtime::{LaunchError, SetupError};
    use snapwrap_schema::ManifestError;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn exit_codes_are_distinct_per_phase() {
        let cases = [
            (
                CliError::from(CoreError::Environment("SNAP".to_owned())),
                EXIT_FAILURE,
            ),
            (CliError::Usage("missing".to_owned()), EXIT_USAGE),
            (
                CliError::from(CoreError::Manifest(ManifestError::NoEntryPoints)),
                EXIT_MANIFEST_ERROR,
            ),
            (
                CliError::from(CoreError::Setup(SetupError::Account {
                    name: "nova".to_owned(),
                    reason: "no such user".to_owned(),
                })),
                EXIT_SETUP_ERROR,
            ),
            (
                CliError::from(CoreError::UnknownEntryPoint("x".to_owned())),
                EXIT_UNKNOWN_ENTRY_POINT,
            ),
            (
                CliError::from(CoreError::Launch(LaunchError::NotFound("x".to_owned()))),
                EXIT_LAUNCH_FAILURE,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.exit_code(), code, "{err}");
        }
    }

    #[test]
    fn child_codes_pass_through() {
        assert_eq!(child_exit_code(0), EXIT_SUCCESS);
        assert_eq!(child_exit_code(42), 42);
        assert_eq!(child_exit_code(143), 143);
        assert_eq!(child_exit_code(-1), EXIT_FAILURE);
        assert_eq!(child_exit_code(300), EXIT_FAILURE);
    }
}
