#![doc = include_str!("lib_docs.rs")]

mod color;
pub mod config;
pub mod daemon;
mod errors;
pub mod layout;
mod lock;
pub mod logs;
pub mod process;
pub mod readiness;
pub mod runner;
pub mod telemetry;
pub mod util;

pub use color::*;
pub use config::{
    ConfigError, ConfigurationBindings, ConfigurationMaterializer, MaterializeReport, SeedOutcome,
};
pub use daemon::{DaemonHandle, DaemonSupervisor};
pub use errors::*;
pub use layout::{InstallationLayout, LayoutOverrides, SubsystemDescriptor};
pub use lock::{acquire_install_lock, InstallLock};
pub use logs::{LogAggregator, TailHandle};
pub use process::{
    find_pid_in_listing, ProcessLocator, ProcessTable, PsProcessTable, StopOutcome, StopVia,
};
pub use readiness::{HttpProbe, Probe, ProbeStatus, ReadinessGate, ReadyReport};
pub use runner::{
    DeckStart, DevLauncher, DevRunner, RunnerState, StartOptions, StartReport, SubsystemLauncher,
};
