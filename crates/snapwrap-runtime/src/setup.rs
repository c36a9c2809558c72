use crate::account::ensure_account;
use crate::render::TemplateRenderer;
use crate::SetupError;
use serde::Serialize;
use snapwrap_schema::{Account, SetupSpec, SnapContext};
use std::fs::{self, DirBuilder, Permissions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Mode for directories created during setup (subject to the umask).
pub const DIR_MODE: u32 = 0o750;
/// Mode for rendered templates and copied files.
pub const FILE_MODE: u32 = 0o640;

/// What a setup pass touched, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub dirs: Vec<PathBuf>,
    /// Links created by this pass; links already present are not listed.
    pub symlinks: Vec<PathBuf>,
    pub templates: Vec<PathBuf>,
    /// Files copied by this pass; existing destinations are never replaced.
    pub copied: Vec<PathBuf>,
}

/// Apply every setup action in `spec`.
///
/// Order is fixed: account, directories, symlinks, templates, copied files,
/// each in declaration order. The first failure aborts the pass; whatever was
/// already done stays in place, and re-running converges on the same end
/// state.
pub fn run_setup(
    spec: &SetupSpec,
    context: &SnapContext,
    renderer: &dyn TemplateRenderer,
) -> Result<SetupReport, SetupError> {
    let owner = match &spec.user {
        Some(account) => Some(ensure_account(account, &account_home(account, context)?)?),
        None => None,
    };
    let mut report = SetupReport::default();

    for template in &spec.dirs {
        let dir = template.resolve_path(context);
        create_dir(&dir)?;
        if let Some(owner) = owner {
            owner.chown(&dir)?;
        }
        report.dirs.push(dir);
    }

    for (target, link) in &spec.symlinks {
        let target = target.resolve_path(context);
        let link = link.resolve_path(context);
        check_data_root(&link, context)?;
        if fs::symlink_metadata(&link).is_err() {
            debug!("creating symlink {} to {}", link.display(), target.display());
            std::os::unix::fs::symlink(&target, &link).map_err(|source| SetupError::Symlink {
                link: link.clone(),
                target: target.clone(),
                source,
            })?;
            report.symlinks.push(link.clone());
        }
        if let Some(owner) = owner {
            owner.lchown(&link)?;
        }
    }

    for (name, destination) in &spec.templates {
        let path = destination.resolve_path(context);
        check_data_root(&path, context)?;
        if let Some(parent) = parent_dir(&path) {
            create_dir(parent)?;
        }
        debug!("rendering {name} to {}", path.display());
        let text = renderer
            .render(name, context)
            .map_err(|source| SetupError::Render {
                path: path.clone(),
                source,
            })?;
        write_file(&path, &text)?;
        if let Some(owner) = owner {
            owner.chown(&path)?;
        }
        report.templates.push(path);
    }

    for (source, destination) in &spec.copyfiles {
        let source_dir = source.resolve_path(context);
        let dest_dir = destination.resolve_path(context);
        check_data_root(&dest_dir, context)?;
        create_dir(&dest_dir)?;
        for file in regular_files(&source_dir, &dest_dir)? {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let dest = dest_dir.join(file_name);
            if fs::symlink_metadata(&dest).is_ok() {
                continue;
            }
            debug!("copying file {} to {}", file.display(), dest.display());
            fs::copy(&file, &dest).map_err(|source| SetupError::Copy {
                from: file.clone(),
                to: dest.clone(),
                source,
            })?;
            set_mode(&dest, FILE_MODE)?;
            if let Some(owner) = owner {
                owner.chown(&dest)?;
            }
            report.copied.push(dest);
        }
    }

    Ok(report)
}

/// Create `path` and any missing parents. An existing directory is fine; an
/// existing non-directory is an error.
pub(crate) fn create_dir(path: &Path) -> Result<(), SetupError> {
    if path.is_dir() {
        return Ok(());
    }
    info!("creating directory {}", path.display());
    DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .map_err(|source| SetupError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}

fn account_home(account: &Account, context: &SnapContext) -> Result<PathBuf, SetupError> {
    let common = context.common_root().ok_or_else(|| SetupError::Account {
        name: account.user.clone(),
        reason: "SNAP_COMMON is not set, so there is no place for its home directory".to_owned(),
    })?;
    Ok(common.join("lib").join(&account.user))
}

/// Setup only writes files below `{snap_common}` or `{snap_data}`.
fn check_data_root(path: &Path, context: &SnapContext) -> Result<(), SetupError> {
    let roots = context.data_roots();
    let climbs = path.components().any(|c| c == Component::ParentDir);
    if !climbs && roots.iter().any(|root| path.starts_with(root) && path != *root) {
        return Ok(());
    }
    let roots = if roots.is_empty() {
        "none set".to_owned()
    } else {
        roots
            .iter()
            .map(|r| r.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    Err(SetupError::OutsideDataRoot {
        path: path.to_path_buf(),
        roots,
    })
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Replace `path` with `contents` via a temp file in the same directory, so
/// readers never observe a partially written file.
fn write_file(path: &Path, contents: &str) -> Result<(), SetupError> {
    let write_err = |source| SetupError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file()
        .set_permissions(Permissions::from_mode(FILE_MODE))
        .map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> Result<(), SetupError> {
    fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|source| {
        SetupError::Permissions {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Regular files directly inside `dir`, sorted by name.
fn regular_files(dir: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, SetupError> {
    let copy_err = |source| SetupError::Copy {
        from: dir.to_path_buf(),
        to: dest_dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(copy_err)? {
        let path = entry.map_err(copy_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
