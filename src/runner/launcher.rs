use std::path::PathBuf;

use crate::daemon::{DaemonHandle, DaemonSupervisor};
use crate::errors::RunnerError;
use crate::layout::SubsystemDescriptor;

/// How a runner flavour turns a subsystem into a running daemon.
pub trait SubsystemLauncher {
    fn start_subsystem(&self, subsystem: &SubsystemDescriptor) -> Result<DaemonHandle, RunnerError>;
    fn program_to_subsystem(&self, program: &str) -> String;
    fn subsystem_to_program(&self, subsystem: &str) -> String;
}

/// Runs each component from its source checkout via `<root>/<name>/start_dev.sh`.
#[derive(Debug, Clone)]
pub struct DevLauncher {
    supervisor: DaemonSupervisor,
    root: PathBuf,
}

impl DevLauncher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            supervisor: DaemonSupervisor::new(),
            root: root.into(),
        }
    }
}

impl SubsystemLauncher for DevLauncher {
    fn start_subsystem(&self, subsystem: &SubsystemDescriptor) -> Result<DaemonHandle, RunnerError> {
        crate::log_info_stderr(
            crate::color_enabled_stderr(),
            &format!("Starting {}", subsystem.name),
        );
        self.supervisor.spawn(
            &subsystem.name,
            &subsystem.start_script,
            std::iter::empty::<&str>(),
            &self.root,
        )
    }

    // Source checkouts are named after the subsystem itself.
    fn program_to_subsystem(&self, program: &str) -> String {
        program.to_string()
    }

    fn subsystem_to_program(&self, subsystem: &str) -> String {
        subsystem.to_string()
    }
}
