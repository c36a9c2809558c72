use fs2::FileExt;
use snapwrap_runtime::SetupError;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exclusive advisory lock serialising setup across concurrent wrapper
/// invocations. Released on drop.
#[derive(Debug)]
pub struct SetupLock {
    lock_file: File,
    path: PathBuf,
}

impl SetupLock {
    /// Block until the lock is held, polling until `timeout` has elapsed.
    pub fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self, SetupError> {
        let file = open_lock_file(lock_path)?;
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    info!("setup lock {} acquired", lock_path.display());
                    return Ok(Self {
                        lock_file: file,
                        path: lock_path.to_path_buf(),
                    });
                }
                Err(e) if is_contended(&e) => {
                    if started.elapsed() >= timeout {
                        return Err(lock_error(
                            lock_path,
                            format!("timed out after {}s waiting for lock", timeout.as_secs()),
                        ));
                    }
                    debug!("setup lock {} busy, retrying", lock_path.display());
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(lock_error(lock_path, e.to_string())),
            }
        }
    }

    /// Take the lock only if nobody else holds it.
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, SetupError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                lock_file: file,
                path: lock_path.to_path_buf(),
            })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(lock_error(lock_path, e.to_string())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SetupLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
        info!("setup lock {} released", self.path.display());
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File, SetupError> {
    if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| lock_error(lock_path, e.to_string()))?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| lock_error(lock_path, e.to_string()))
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn lock_error(path: &Path, reason: String) -> SetupError {
    SetupError::Lock {
        path: path.to_path_buf(),
        reason,
    }
}

/// Keep the wrapper alive on Ctrl-C while a spawned child handles it.
///
/// The terminal delivers SIGINT to the whole foreground process group, so
/// the child sees it directly; the wrapper only notes it and goes on
/// waiting for the child's exit status.
pub fn install_interrupt_passthrough() {
    let _ = ctrlc::set_handler(|| {
        debug!("interrupt received, waiting for the child to exit");
    });
}
