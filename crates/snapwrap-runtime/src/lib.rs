//! Side-effecting half of snapwrap.
//!
//! This crate implements everything that touches the host: the setup runner
//! (directories, symlinks, rendered templates, copied files), the Jinja
//! template renderer, system account creation and privilege dropping, binary
//! location, and the pluggable [`Launcher`] trait with exec, spawn and mock
//! implementations.

pub mod account;
pub mod launcher;
pub mod mock;
pub mod process;
pub mod render;
pub mod setup;

pub use account::{drop_privileges, ensure_account, lookup_owner, Owner};
pub use launcher::{select_launcher, BinaryLookup, Executable, LaunchMode, Launcher};
pub use mock::MockLauncher;
pub use process::{ExecLauncher, SpawnLauncher};
pub use render::{JinjaRenderer, TemplateRenderer};
pub use setup::{run_setup, SetupReport, DIR_MODE, FILE_MODE};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template '{name}' not found in {dir}")]
    NotFound { name: String, dir: PathBuf },
    #[error("failed to render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create symlink {link} -> {target}: {source}")]
    Symlink {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to set permissions on {path}: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to change owner of {path}: {source}")]
    Chown {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create system account '{name}': {reason}")]
    Account { name: String, reason: String },
    #[error("setup lock {path}: {reason}")]
    Lock { path: PathBuf, reason: String },
    #[error("refusing to write {path}: not under a mutable data root ({roots})")]
    OutsideDataRoot { path: PathBuf, roots: String },
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("binary '{0}' not found")]
    NotFound(String),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to drop privileges to {account}: {reason}")]
    Privileges { account: String, reason: String },
}
