use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::errors::RunnerError;

/// Installation-scoped lock guard held while the master configuration is seeded and
/// rendered. Removes the lock file on drop.
#[derive(Debug)]
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        // Unlink before unlocking; late openers are caught by `lock_opened`.
        let _ = fs::remove_file(&self.path);
        let _ = self.file.unlock();
    }
}

/// Acquire a non-blocking exclusive lock at `p`. A lock held by another runner is an
/// immediate error rather than a wait.
pub fn acquire_install_lock(p: &Path) -> Result<InstallLock, RunnerError> {
    for _ in 0..LOCK_ATTEMPTS {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(p)
            .map_err(|e| RunnerError::io(format!("cannot open lock file {}", p.display()), e))?;
        if let Some(lock) = lock_opened(file, p)? {
            return Ok(lock);
        }
    }
    Err(busy(p))
}

const LOCK_ATTEMPTS: usize = 3;

fn busy(p: &Path) -> RunnerError {
    RunnerError::Lock(format!(
        "another dev-runner is reconfiguring this installation ({} is locked). Please try again later.",
        p.display()
    ))
}

/// Lock an already opened `file`. `None` when the previous holder unlinked `p` in the
/// meantime, leaving us with a lock on a file nobody else can see.
fn lock_opened(file: File, p: &Path) -> Result<Option<InstallLock>, RunnerError> {
    match file.try_lock_exclusive() {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(busy(p)),
        Err(e) => return Err(RunnerError::io(format!("cannot lock {}", p.display()), e)),
    }
    if !same_inode(&file, p) {
        tracing::debug!(path = %p.display(), "lock file replaced while locking; retrying");
        let _ = file.unlock();
        return Ok(None);
    }
    tracing::debug!(path = %p.display(), "installation lock acquired");
    Ok(Some(InstallLock {
        file,
        path: p.to_path_buf(),
    }))
}

fn same_inode(file: &File, p: &Path) -> bool {
    match (file.metadata(), fs::metadata(p)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}
