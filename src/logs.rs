//! Error-log bootstrapping and console mirroring.
//!
//! Log files are created (truncated) before any daemon starts so `tail -f` always has a
//! file to attach to. Tail children write straight onto the runner's stderr and are killed
//! with their [`TailHandle`]; the subsystems keep writing to the files afterwards. On Linux
//! a tail also receives SIGTERM when the runner dies without running destructors.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
#[cfg(target_os = "linux")]
use std::os::unix::process::CommandExt;

use crate::errors::RunnerError;
use crate::layout::SubsystemDescriptor;
use crate::util::fs::ensure_dir;

/// A background `tail -f` mirroring one file. Dropping it stops the mirroring.
#[derive(Debug)]
pub struct TailHandle {
    path: PathBuf,
    child: Child,
}

impl TailHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for TailHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[derive(Debug, Clone)]
pub struct LogAggregator {
    log_dir: PathBuf,
}

impl LogAggregator {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Create or truncate one `.err` file per subsystem.
    pub fn prepare_logs(
        &self,
        subsystems: &[SubsystemDescriptor],
    ) -> Result<Vec<PathBuf>, RunnerError> {
        ensure_dir(&self.log_dir).map_err(|e| {
            RunnerError::io(format!("cannot create log dir {}", self.log_dir.display()), e)
        })?;
        let mut out = Vec::with_capacity(subsystems.len());
        for sub in subsystems {
            File::create(&sub.log_path).map_err(|e| {
                RunnerError::io(format!("cannot create {}", sub.log_path.display()), e)
            })?;
            out.push(sub.log_path.clone());
        }
        Ok(out)
    }

    /// Mirror appended content of `path` onto the runner's stderr.
    pub fn tail(&self, path: &Path) -> Result<TailHandle, RunnerError> {
        let tail = which::which("tail").map_err(|e| RunnerError::Spawn {
            name: "tail".to_string(),
            program: PathBuf::from("tail"),
            source: io::Error::new(io::ErrorKind::NotFound, e.to_string()),
        })?;
        let mut cmd = Command::new(&tail);
        cmd.arg("-f")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(io::stderr()))
            .stderr(Stdio::null());
        #[cfg(target_os = "linux")]
        {
            let parent = nix::unistd::getpid();
            // SAFETY: prctl and getppid are async-signal-safe syscalls.
            unsafe {
                cmd.pre_exec(move || {
                    nix::sys::prctl::set_pdeathsig(nix::sys::signal::Signal::SIGTERM)
                        .map_err(io::Error::from)?;
                    // Parent already gone before the death signal was armed.
                    if nix::unistd::getppid() != parent {
                        return Err(io::Error::other("runner exited"));
                    }
                    Ok(())
                });
            }
        }
        let child = cmd
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                name: "tail".to_string(),
                program: tail.clone(),
                source,
            })?;
        let argv = [
            tail.display().to_string(),
            "-f".to_string(),
            path.display().to_string(),
        ];
        tracing::debug!(cmd = %crate::util::shell_join(&argv), pid = child.id(), "tailing log");
        Ok(TailHandle {
            path: path.to_path_buf(),
            child,
        })
    }

    /// Pre-create every subsystem log, then attach a tail to each.
    pub fn prepare_and_tail(
        &self,
        subsystems: &[SubsystemDescriptor],
    ) -> Result<Vec<TailHandle>, RunnerError> {
        let paths = self.prepare_logs(subsystems)?;
        paths.iter().map(|p| self.tail(p)).collect()
    }
}
