//! Front-end process discovery and the explicit stop path.
//!
//! Lookup order: the pidfile written when this tool spawned deck (only trusted while that
//! pid is alive and still leads its own process group), then a scrape of the `ps` listing for deck's webpack dev server command
//! line. The scrape is a fallback for a deck somebody else started; matching on argv text
//! is inherently brittle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgid, Pid};

use crate::daemon::{read_pidfile, remove_pidfile};
use crate::errors::RunnerError;
use crate::util::{ExecRequest, ExecService};

/// Command line fragment identifying deck's dev server in the process table.
pub const DECK_PROGRAM: &str = "node ./node_modules/webpack-dev-server/bin/webpack-dev-server.js";

/// Source of a raw process listing (`ps` output or a canned snapshot in tests).
pub trait ProcessTable {
    fn snapshot(&self) -> Result<String, RunnerError>;
}

/// `ps` restricted to the node interpreter where the platform's ps supports it.
#[derive(Debug, Clone)]
pub struct PsProcessTable {
    exec: ExecService,
    interpreter: String,
}

impl PsProcessTable {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            exec: ExecService::new(Duration::from_secs(10)),
            interpreter: interpreter.into(),
        }
    }

    fn args(&self) -> Vec<String> {
        if cfg!(target_os = "linux") {
            vec!["-fwwwC".to_string(), self.interpreter.clone()]
        } else {
            vec!["-efww".to_string()]
        }
    }
}

impl Default for PsProcessTable {
    fn default() -> Self {
        Self::new("node")
    }
}

impl ProcessTable for PsProcessTable {
    fn snapshot(&self) -> Result<String, RunnerError> {
        let out = self
            .exec
            .run(ExecRequest::new("ps").args(self.args()))
            .map_err(|e| RunnerError::ProcessTable(format!("{e:#}")))?;
        // procps exits 1 when -C matched nothing; that is an empty table, not a failure.
        if !out.status.success() && !out.stderr.trim().is_empty() {
            return Err(RunnerError::ProcessTable(out.stderr.trim().to_string()));
        }
        Ok(out.stdout)
    }
}

/// First pid (second column) of a line mentioning `program`.
pub fn find_pid_in_listing(listing: &str, program: &str) -> Option<i32> {
    listing
        .lines()
        .filter(|line| line.contains(program))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            fields.next()?;
            fields.next()?.parse::<i32>().ok().filter(|pid| *pid > 0)
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopVia {
    Pidfile,
    ProcessTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: i32, via: StopVia },
    NotRunning,
}

pub struct ProcessLocator<T: ProcessTable> {
    table: T,
    pidfile: PathBuf,
    program: String,
}

impl<T: ProcessTable> ProcessLocator<T> {
    pub fn new(table: T, pidfile: impl Into<PathBuf>) -> Self {
        Self {
            table,
            pidfile: pidfile.into(),
            program: DECK_PROGRAM.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn pidfile(&self) -> &Path {
        &self.pidfile
    }

    /// Pid recorded by our own spawn, if that process still exists and leads its own
    /// process group. A pid reused by an unrelated process fails the group check.
    /// With `prune`, a pidfile that fails either check is removed.
    fn tracked_pid(&self, prune: bool) -> Option<i32> {
        let pid = read_pidfile(&self.pidfile)?;
        if is_alive(pid) && is_group_leader(pid) {
            return Some(pid);
        }
        if prune {
            tracing::debug!(pid, "removing stale deck pidfile");
            remove_pidfile(&self.pidfile);
        }
        None
    }

    fn locate(&self, prune: bool) -> Result<Option<(i32, StopVia)>, RunnerError> {
        if let Some(pid) = self.tracked_pid(prune) {
            return Ok(Some((pid, StopVia::Pidfile)));
        }
        let listing = self.table.snapshot()?;
        Ok(find_pid_in_listing(&listing, &self.program).map(|pid| (pid, StopVia::ProcessTable)))
    }

    pub fn find_front_end_pid(&self) -> Result<Option<i32>, RunnerError> {
        Ok(self.locate(true)?.map(|(pid, _)| pid))
    }

    /// Same lookup as [`find_front_end_pid`](Self::find_front_end_pid) but leaves a stale
    /// pidfile on disk.
    pub fn peek_front_end_pid(&self) -> Result<Option<i32>, RunnerError> {
        Ok(self.locate(false)?.map(|(pid, _)| pid))
    }

    /// SIGTERM the front-end. A tracked pid leads its own session, so its whole process
    /// group (start script plus node) is signalled.
    pub fn stop_front_end(&self) -> Result<StopOutcome, RunnerError> {
        let Some((pid, via)) = self.locate(true)? else {
            return Ok(StopOutcome::NotRunning);
        };
        let target = Pid::from_raw(pid);
        let sent = match via {
            StopVia::Pidfile => killpg(target, Signal::SIGTERM),
            StopVia::ProcessTable => kill(target, Signal::SIGTERM),
        };
        if via == StopVia::Pidfile {
            remove_pidfile(&self.pidfile);
        }
        match sent {
            Ok(()) => {
                tracing::info!(pid, ?via, "sent SIGTERM to deck");
                Ok(StopOutcome::Stopped { pid, via })
            }
            // Exited between lookup and signal.
            Err(nix::errno::Errno::ESRCH) => Ok(StopOutcome::NotRunning),
            Err(e) => Err(RunnerError::io(
                format!("cannot signal deck pid {pid}"),
                std::io::Error::from(e),
            )),
        }
    }
}

/// `kill(pid, 0)`: EPERM still means the process exists.
pub fn is_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Our detached spawns call `setsid`, so a tracked deck has pgid == pid.
fn is_group_leader(pid: i32) -> bool {
    let pid = Pid::from_raw(pid);
    getpgid(Some(pid)).is_ok_and(|pgid| pgid == pid)
}
