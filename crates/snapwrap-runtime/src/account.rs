use crate::{LaunchError, SetupError};
use snapwrap_schema::Account;
use std::ffi::CString;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Numeric identity of a resolved [`Account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    pub fn chown(&self, path: &Path) -> Result<(), SetupError> {
        debug!("changing owner of {} to {}:{}", path.display(), self.uid, self.gid);
        std::os::unix::fs::chown(path, Some(self.uid), Some(self.gid)).map_err(|source| {
            SetupError::Chown {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Like [`chown`](Self::chown) but changes a symlink itself.
    pub fn lchown(&self, path: &Path) -> Result<(), SetupError> {
        debug!("changing owner of link {} to {}:{}", path.display(), self.uid, self.gid);
        std::os::unix::fs::lchown(path, Some(self.uid), Some(self.gid)).map_err(|source| {
            SetupError::Chown {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

#[allow(unsafe_code)]
fn user_id(name: &str) -> Option<u32> {
    let name = CString::new(name).ok()?;
    // SAFETY: `name` is NUL-terminated and outlives the call. getpwnam returns
    // null or a pointer into static storage that is read before any other
    // passwd lookup can overwrite it.
    unsafe {
        let pw = libc::getpwnam(name.as_ptr());
        if pw.is_null() {
            None
        } else {
            Some((*pw).pw_uid)
        }
    }
}

#[allow(unsafe_code)]
fn group_id(name: &str) -> Option<u32> {
    let name = CString::new(name).ok()?;
    // SAFETY: as for getpwnam above.
    unsafe {
        let gr = libc::getgrnam(name.as_ptr());
        if gr.is_null() {
            None
        } else {
            Some((*gr).gr_gid)
        }
    }
}

#[allow(unsafe_code)]
fn effective_uid() -> u32 {
    // SAFETY: geteuid() has no arguments, no side effects and cannot fail.
    unsafe { libc::geteuid() }
}

pub fn lookup_owner(account: &Account) -> Result<Owner, SetupError> {
    let uid = user_id(&account.user).ok_or_else(|| SetupError::Account {
        name: account.user.clone(),
        reason: "no such user".to_owned(),
    })?;
    let gid = group_id(&account.group).ok_or_else(|| SetupError::Account {
        name: account.group.clone(),
        reason: "no such group".to_owned(),
    })?;
    Ok(Owner { uid, gid })
}

/// Create the group and system user if they do not exist yet.
///
/// The user gets `home` as its home directory (not populated), no login
/// shell, and `account.group` as its primary group.
pub fn ensure_account(account: &Account, home: &Path) -> Result<Owner, SetupError> {
    if group_id(&account.group).is_none() {
        info!("adding group {} to system", account.group);
        run_account_tool(&account.group, "addgroup", &["--system", &account.group])?;
    }

    if user_id(&account.user).is_none() {
        crate::setup::create_dir(home)?;
        info!("adding user {} to system", account.user);
        let home = home.to_string_lossy();
        run_account_tool(
            &account.user,
            "adduser",
            &[
                "--quiet",
                "--system",
                "--home",
                &home,
                "--no-create-home",
                "--ingroup",
                &account.group,
                "--shell",
                "/bin/false",
                &account.user,
            ],
        )?;
    }

    lookup_owner(account)
}

fn run_account_tool(name: &str, tool: &str, args: &[&str]) -> Result<(), SetupError> {
    let status = Command::new(tool)
        .args(args)
        .status()
        .map_err(|e| SetupError::Account {
            name: name.to_owned(),
            reason: format!("{tool} could not be started: {e}"),
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(SetupError::Account {
            name: name.to_owned(),
            reason: format!("{tool} exited with {status}"),
        })
    }
}

/// Switch the process to `account` for everything launched afterwards.
///
/// Supplementary groups are reset to the account's primary group. A no-op
/// when already running as that user.
#[allow(unsafe_code)]
pub fn drop_privileges(account: &Account) -> Result<(), LaunchError> {
    let privileges = |reason: String| LaunchError::Privileges {
        account: account.to_string(),
        reason,
    };
    let owner = lookup_owner(account).map_err(|e| privileges(e.to_string()))?;
    if effective_uid() == owner.uid {
        return Ok(());
    }

    debug!("dropping privileges to {account}");
    // SAFETY: plain syscalls on integers owned by this frame; each result is
    // checked and errno read immediately afterwards.
    unsafe {
        if libc::setgroups(1, &owner.gid) != 0 {
            return Err(privileges(format!(
                "setgroups: {}",
                std::io::Error::last_os_error()
            )));
        }
        if libc::setgid(owner.gid) != 0 {
            return Err(privileges(format!(
                "setgid: {}",
                std::io::Error::last_os_error()
            )));
        }
        if libc::setuid(owner.uid) != 0 {
            return Err(privileges(format!(
                "setuid: {}",
                std::io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}
