//! Error mapping guide:
//! - Precondition failures (wrong working directory, no home) exit 255 before any side effect.
//! - Spawn failures for a missing start script map io::ErrorKind::NotFound to 127; all others to 1.
//! - A startup deadline that expires exits 124, distinct from "could not start".
//! - Transient readiness failures never reach this type; they are absorbed by the polling loops.
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// Every fatal condition the runner can hit.
#[derive(Debug)]
pub enum RunnerError {
    /// Wrong invocation location or unusable environment.
    Precondition(String),
    /// Master configuration could not be seeded, validated or rendered.
    Config(ConfigError),
    /// A subsystem (or deck) start script could not be executed.
    Spawn {
        name: String,
        program: PathBuf,
        source: io::Error,
    },
    Io {
        context: String,
        source: io::Error,
    },
    /// Listing the OS process table failed outright.
    ProcessTable(String),
    /// Another runner holds the installation lock.
    Lock(String),
    StartupTimedOut {
        phase: &'static str,
        waited: Duration,
    },
    Http(String),
}

impl RunnerError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        RunnerError::Io {
            context: context.into(),
            source,
        }
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Precondition(msg) => write!(f, "{msg}"),
            RunnerError::Config(e) => write!(f, "configuration error: {e}"),
            RunnerError::Spawn {
                name,
                program,
                source,
            } => write!(
                f,
                "failed to start {name} ({}): {source}",
                program.display()
            ),
            RunnerError::Io { context, source } => write!(f, "{context}: {source}"),
            RunnerError::ProcessTable(msg) => write!(f, "cannot list processes: {msg}"),
            RunnerError::Lock(msg) => write!(f, "{msg}"),
            RunnerError::StartupTimedOut { phase, waited } => write!(
                f,
                "startup timed out after {} while {phase}",
                humantime::format_duration(*waited)
            ),
            RunnerError::Http(msg) => write!(f, "http client error: {msg}"),
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Config(e) => Some(e),
            RunnerError::Spawn { source, .. } | RunnerError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for RunnerError {
    fn from(e: ConfigError) -> Self {
        RunnerError::Config(e)
    }
}

/// Convert RunnerError to a process exit code.
pub fn exit_code_for_runner_error(e: &RunnerError) -> u8 {
    match e {
        RunnerError::Precondition(_) => 255,
        RunnerError::Spawn { source, .. } => exit_code_for_io_error(source),
        RunnerError::StartupTimedOut { .. } => 124,
        _ => 1,
    }
}

/// Exit code for an error that crossed the anyhow boundary in the binary.
pub fn exit_code_for_anyhow(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<RunnerError>() {
        Some(re) => exit_code_for_runner_error(re),
        None => e
            .downcast_ref::<io::Error>()
            .map(exit_code_for_io_error)
            .unwrap_or(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let pre = RunnerError::Precondition("no deck".into());
        assert_eq!(exit_code_for_runner_error(&pre), 255);

        let spawn = RunnerError::Spawn {
            name: "gate".into(),
            program: PathBuf::from("/nope/start_dev.sh"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(exit_code_for_runner_error(&spawn), 127);

        let denied = RunnerError::Spawn {
            name: "gate".into(),
            program: PathBuf::from("/x/start_dev.sh"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(exit_code_for_runner_error(&denied), 1);

        let timeout = RunnerError::StartupTimedOut {
            phase: "waiting for deck",
            waited: Duration::from_secs(3),
        };
        assert_eq!(exit_code_for_runner_error(&timeout), 124);
        assert!(timeout.to_string().contains("3s"), "{timeout}");
    }

    #[test]
    fn test_exit_code_through_anyhow() {
        let e = anyhow::Error::new(RunnerError::Precondition("x".into()));
        assert_eq!(exit_code_for_anyhow(&e), 255);
        let e = anyhow::anyhow!("plain");
        assert_eq!(exit_code_for_anyhow(&e), 1);
    }
}
