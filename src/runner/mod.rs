//! Development runner: the start sequence and the front-end stop path.
//!
//! `start_all` is strictly sequential. Configuration is rendered before any spawn, every
//! subsystem log exists before its tail, and readiness polling begins only after deck's
//! log file appeared. Subsystems run in their own sessions and survive the runner.

mod launcher;

use std::path::PathBuf;
use std::time::Duration;

pub use launcher::{DevLauncher, SubsystemLauncher};

use crate::config::{ConfigurationMaterializer, MaterializeReport};
use crate::daemon::{write_pidfile, DaemonHandle};
use crate::errors::RunnerError;
use crate::layout::{InstallationLayout, SubsystemDescriptor};
use crate::logs::{LogAggregator, TailHandle};
use crate::process::{ProcessLocator, ProcessTable, StopOutcome};
use crate::readiness::{
    Probe, ReadinessGate, ReadyReport, DEFAULT_STARTUP_TIMEOUT, POLL_INTERVAL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Init,
    Configuring,
    LoggingPrepared,
    SubsystemsStarting,
    FrontEndStarting,
    AwaitingFrontEndLog,
    AwaitingFrontEndReady,
    Ready,
}

#[derive(Debug, Clone)]
pub struct StartOptions {
    pub reconfigure: bool,
    /// `None` waits for deck indefinitely.
    pub startup_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            reconfigure: true,
            startup_timeout: Some(DEFAULT_STARTUP_TIMEOUT),
            poll_interval: POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckStart {
    Spawned(DaemonHandle),
    AlreadyRunning(i32),
}

/// Everything `start_all` produced. Dropping it stops the console mirroring.
#[derive(Debug)]
pub struct StartReport {
    pub rendered: Vec<PathBuf>,
    pub daemons: Vec<DaemonHandle>,
    pub deck: DeckStart,
    pub tails: Vec<TailHandle>,
    pub ready: ReadyReport,
}

pub struct DevRunner<L: SubsystemLauncher, P: Probe, T: ProcessTable> {
    layout: InstallationLayout,
    subsystems: Vec<SubsystemDescriptor>,
    launcher: L,
    gate: ReadinessGate<P>,
    locator: ProcessLocator<T>,
    logs: LogAggregator,
    options: StartOptions,
    state: RunnerState,
}

impl<L: SubsystemLauncher, P: Probe, T: ProcessTable> DevRunner<L, P, T> {
    pub fn new(
        layout: InstallationLayout,
        subsystems: Vec<SubsystemDescriptor>,
        launcher: L,
        probe: P,
        locator: ProcessLocator<T>,
        options: StartOptions,
    ) -> Self {
        let gate = ReadinessGate::new(probe)
            .with_interval(options.poll_interval)
            .with_timeout(options.startup_timeout);
        let logs = LogAggregator::new(&layout.log_dir);
        Self {
            layout,
            subsystems,
            launcher,
            gate,
            locator,
            logs,
            options,
            state: RunnerState::Init,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn layout(&self) -> &InstallationLayout {
        &self.layout
    }

    pub fn subsystems(&self) -> &[SubsystemDescriptor] {
        &self.subsystems
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    fn transition(&mut self, to: RunnerState) {
        tracing::debug!(from = ?self.state, to = ?to, "runner state");
        self.state = to;
    }

    /// Seed, validate and render configuration. Running subsystems are left alone.
    pub fn reconfigure(&self) -> Result<MaterializeReport, RunnerError> {
        ConfigurationMaterializer::new(&self.layout).materialize(&self.subsystems)
    }

    /// Run the whole start sequence and return once deck answers `200`.
    pub fn start_all(&mut self) -> Result<StartReport, RunnerError> {
        let rendered = if self.options.reconfigure {
            self.transition(RunnerState::Configuring);
            self.reconfigure()?.rendered
        } else {
            Vec::new()
        };

        self.transition(RunnerState::LoggingPrepared);
        let mut tails = self.logs.prepare_and_tail(&self.subsystems)?;

        self.transition(RunnerState::SubsystemsStarting);
        let mut daemons = Vec::with_capacity(self.subsystems.len());
        for sub in &self.subsystems {
            tracing::debug!(
                subsystem = %sub.name,
                program = %self.launcher.subsystem_to_program(&sub.name),
                "starting subsystem"
            );
            daemons.push(self.launcher.start_subsystem(sub)?);
        }

        self.transition(RunnerState::FrontEndStarting);
        let deck = self.start_front_end()?;

        self.transition(RunnerState::AwaitingFrontEndLog);
        crate::log_info_stderr(
            crate::color_enabled_stderr(),
            &format!("Waiting for deck to start on port {}", self.layout.deck_port),
        );
        let url = self.layout.base_url()?;
        let deck_log = self.layout.deck_log_path();
        let logs = &self.logs;
        let state = &mut self.state;
        let mut deck_tail = None;
        let ready = self.gate.await_front_end(&deck_log, &url, |path| {
            deck_tail = Some(logs.tail(path)?);
            let from = *state;
            tracing::debug!(from = ?from, to = ?RunnerState::AwaitingFrontEndReady, "runner state");
            *state = RunnerState::AwaitingFrontEndReady;
            Ok(())
        })?;
        tails.extend(deck_tail);

        self.transition(RunnerState::Ready);
        tracing::info!(attempts = ready.attempts, elapsed = ?ready.elapsed, "deck is ready");
        Ok(StartReport {
            rendered,
            daemons,
            deck,
            tails,
            ready,
        })
    }

    /// Spawn deck unless one is already up, recording the pid of our own spawn.
    pub fn start_front_end(&self) -> Result<DeckStart, RunnerError> {
        if let Some(pid) = self.locator.find_front_end_pid()? {
            crate::log_info_stderr(
                crate::color_enabled_stderr(),
                &format!("Deck is already running as pid={pid}"),
            );
            return Ok(DeckStart::AlreadyRunning(pid));
        }
        let handle = self.launcher.start_subsystem(&self.layout.deck())?;
        write_pidfile(self.locator.pidfile(), handle.pid())?;
        Ok(DeckStart::Spawned(handle))
    }

    pub fn stop_front_end(&self) -> Result<StopOutcome, RunnerError> {
        let outcome = self.locator.stop_front_end()?;
        if let StopOutcome::Stopped { pid, .. } = outcome {
            crate::log_info_stderr(
                crate::color_enabled_stderr(),
                &format!("Terminating deck in pid={pid}"),
            );
        }
        Ok(outcome)
    }
}
