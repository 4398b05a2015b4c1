//! Detached daemon spawning.
//!
//! Every daemon starts in its own session (`setsid` between fork and exec) with stdio
//! pointed at /dev/null, so a terminal interrupt delivered to the runner's process group
//! never reaches it and closing the terminal does not hang it up. The runner keeps only
//! the pid.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::errors::RunnerError;
use crate::util::fs::write_atomic;

/// Best-effort reference to a detached process. Not a controllable child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonHandle {
    name: String,
    pid: u32,
}

impl DaemonHandle {
    pub fn new(name: impl Into<String>, pid: u32) -> Self {
        Self {
            name: name.into(),
            pid,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

#[derive(Debug, Clone, Default)]
pub struct DaemonSupervisor;

impl DaemonSupervisor {
    pub fn new() -> Self {
        Self
    }

    /// Start `command` in a new session and return as soon as exec succeeded.
    /// Exit status is never reported back.
    pub fn spawn<I, S>(
        &self,
        name: &str,
        command: &Path,
        args: I,
        cwd: &Path,
    ) -> Result<DaemonHandle, RunnerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // SAFETY: setsid is async-signal-safe and touches no state shared with the parent.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(io::Error::from)?;
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            name: name.to_string(),
            program: command.to_path_buf(),
            source,
        })?;
        let pid = child.id();
        tracing::info!(subsystem = name, pid, program = %command.display(), "daemon spawned");

        // Reap in the background so an early exit does not linger as a zombie while the
        // runner stays resident. The status itself is discarded.
        let reaper = std::thread::Builder::new()
            .name(format!("reap-{name}"))
            .spawn(move || {
                let _ = child.wait();
            });
        if let Err(e) = reaper {
            tracing::debug!(subsystem = name, "cannot start reaper thread: {e}");
        }

        Ok(DaemonHandle::new(name, pid))
    }
}

pub fn write_pidfile(path: &Path, pid: u32) -> Result<(), RunnerError> {
    if let Some(parent) = path.parent() {
        crate::util::fs::ensure_dir(parent)
            .map_err(|e| RunnerError::io(format!("cannot create {}", parent.display()), e))?;
    }
    write_atomic(path, format!("{pid}\n").as_bytes())
        .map_err(|e| RunnerError::io(format!("cannot write pidfile {}", path.display()), e))
}

/// `None` when the file is absent or does not hold a positive pid.
pub fn read_pidfile(path: &Path) -> Option<i32> {
    let text = fs::read_to_string(path).ok()?;
    text.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
}

pub fn remove_pidfile(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "cannot remove pidfile: {e}"),
    }
}
