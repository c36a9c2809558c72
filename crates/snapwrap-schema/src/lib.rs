//! Manifest model and path-template resolution for snapwrap.
//!
//! This crate defines the schema layer: decoding a YAML/JSON/TOML manifest
//! into a validated [`Manifest`], the setup and entry-point sections it
//! carries, and the [`SnapContext`] used to substitute runtime tokens such as
//! `{snap}` and `{snap_common}` into path templates.

pub mod context;
pub mod manifest;
pub mod types;
mod unique;

pub use context::{SnapContext, SNAP_ENV};
pub use manifest::{
    decode, decode_as, find_manifest, parse_manifest_file, Account, EntryPoint, EntryPointKind,
    Manifest, ManifestError, ManifestFormat, SetupSpec, MANIFEST_CANDIDATES,
};
pub use types::{EntryPointName, PathTemplate};
