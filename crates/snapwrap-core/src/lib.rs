//! Orchestration layer for snapwrap.
//!
//! This crate ties the manifest model and the host-side runtime together:
//! [`WrapperConfig`] decides where the manifest, templates and setup lock
//! live, [`resolve_entry_point`] turns an entry point into a concrete
//! [`Invocation`], and the [`Dispatcher`] runs setup once under the setup
//! lock before handing the invocation to a launcher.

pub mod concurrency;
pub mod config;
pub mod dispatch;
pub mod resolve;

pub use concurrency::{install_interrupt_passthrough, SetupLock};
pub use config::{ConfigOverrides, WrapperConfig, DEFAULT_LOCK_FILE, DEFAULT_LOCK_TIMEOUT};
pub use dispatch::Dispatcher;
pub use resolve::{resolve_entry_point, Invocation, UWSGI_ARGS};

use snapwrap_runtime::{LaunchError, SetupError};
use snapwrap_schema::ManifestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),
    #[error("unknown entry point '{0}'")]
    UnknownEntryPoint(String),
    #[error("launch error: {0}")]
    Launch(#[from] LaunchError),
    #[error("environment error: {0}")]
    Environment(String),
}

impl CoreError {
    /// Short name of the phase that failed, for logs and JSON output.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Manifest(_) => "manifest",
            Self::Setup(_) => "setup",
            Self::UnknownEntryPoint(_) => "resolution",
            Self::Launch(_) => "launch",
            Self::Environment(_) => "environment",
        }
    }
}
