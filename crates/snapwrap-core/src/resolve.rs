use crate::CoreError;
use serde::Serialize;
use snapwrap_runtime::Executable;
use snapwrap_schema::{EntryPoint, EntryPointKind, Manifest, SnapContext};
use std::fmt::Write as _;
use std::path::Path;

/// Fixed leading arguments of a uWSGI emperor invocation.
pub const UWSGI_ARGS: [&str; 3] = ["--master", "--die-on-term", "--emperor"];

/// A fully resolved launch: what to run and with which arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub entry_point: String,
    pub executable: Executable,
    /// Arguments after the program name.
    pub args: Vec<String>,
}

impl Invocation {
    /// The invocation as a copy-pastable shell command line.
    pub fn command_line(&self) -> String {
        let mut line = shell_quote(&self.executable.program);
        for arg in &self.args {
            let _ = write!(line, " {}", shell_quote(arg));
        }
        line
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,+@%".contains(&b));
    if plain {
        s.to_owned()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// Build the invocation for entry point `name`.
///
/// Pure: nothing is read from or written to the host. Pass-through
/// arguments are appended after the constructed flags exactly as given.
pub fn resolve_entry_point(
    manifest: &Manifest,
    name: &str,
    context: &SnapContext,
    passthrough: &[String],
) -> Result<Invocation, CoreError> {
    let entry = manifest
        .entry_point(name)
        .ok_or_else(|| CoreError::UnknownEntryPoint(name.to_owned()))?;

    let mut args = match entry.kind {
        EntryPointKind::Simple => simple_args(entry, context),
        EntryPointKind::Uwsgi => uwsgi_args(entry, context),
    };
    args.extend(passthrough.iter().cloned());

    Ok(Invocation {
        entry_point: name.to_owned(),
        executable: executable(entry, context),
        args,
    })
}

fn simple_args(entry: &EntryPoint, context: &SnapContext) -> Vec<String> {
    let mut args = Vec::with_capacity(entry.config_files.len() + entry.config_dirs.len() + 1);
    for file in &entry.config_files {
        args.push(format!("--config-file={}", file.resolve(context)));
    }
    for dir in &entry.config_dirs {
        args.push(format!("--config-dir={}", dir.resolve(context)));
    }
    if let Some(log_file) = &entry.log_file {
        args.push(format!("--log-file={}", log_file.resolve(context)));
    }
    args
}

fn uwsgi_args(entry: &EntryPoint, context: &SnapContext) -> Vec<String> {
    let mut args: Vec<String> = UWSGI_ARGS.iter().map(|a| (*a).to_owned()).collect();
    if let Some(dir) = &entry.uwsgi_dir {
        args.push(dir.resolve(context));
    }
    if let Some(log_file) = &entry.log_file {
        args.push("--logto".to_owned());
        args.push(log_file.resolve(context));
    }
    args
}

// Outside a snap there is no install root to search, so confined entries
// fall back to the search path.
fn executable(entry: &EntryPoint, context: &SnapContext) -> Executable {
    let program = context.resolve(entry.binary());
    if entry.classic || Path::new(&program).is_absolute() {
        return Executable::search_path(program);
    }
    match context.install_root() {
        Some(root) => Executable::install_root(program, root),
        None => Executable::search_path(program),
    }
}
