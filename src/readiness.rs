//! Front-end readiness gate.
//!
//! Two phases share one optional deadline: wait for deck's log file to exist, then poll
//! deck's base URL until it answers `200`. Everything short of that (other statuses,
//! refused connections, timeouts) counts as "not ready yet" and is retried at a fixed
//! interval. Without a deadline the gate waits forever.

use std::path::Path;
use std::time::{Duration, Instant};

use url::Url;

use crate::errors::RunnerError;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const IDLE_INTERVAL: Duration = Duration::from_secs(3600);
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Status(u16),
    Unreachable(String),
}

impl ProbeStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeStatus::Status(200))
    }
}

/// One readiness attempt against `url`.
pub trait Probe {
    fn probe(&self, url: &Url) -> ProbeStatus;
}

/// Plain unauthenticated GET. Proxies are bypassed: the target is always local.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(attempt_timeout: Duration) -> Result<Self, RunnerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(attempt_timeout)
            .no_proxy()
            .build()
            .map_err(|e| RunnerError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Probe for HttpProbe {
    fn probe(&self, url: &Url) -> ProbeStatus {
        match self.client.get(url.clone()).send() {
            Ok(resp) => ProbeStatus::Status(resp.status().as_u16()),
            Err(e) => ProbeStatus::Unreachable(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyReport {
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct ReadinessGate<P: Probe> {
    probe: P,
    interval: Duration,
    timeout: Option<Duration>,
}

impl<P: Probe> ReadinessGate<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            interval: POLL_INTERVAL,
            timeout: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// `None` keeps the gate unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        self.timeout.map(|t| start + t)
    }

    fn sleep_or_expire(
        &self,
        started: Instant,
        deadline: Option<Instant>,
        phase: &'static str,
    ) -> Result<(), RunnerError> {
        if let Some(d) = deadline {
            let now = Instant::now();
            if now >= d {
                return Err(RunnerError::StartupTimedOut {
                    phase,
                    waited: now.duration_since(started),
                });
            }
            std::thread::sleep(self.interval.min(d - now));
        } else {
            std::thread::sleep(self.interval);
        }
        Ok(())
    }

    /// Phase 1: block until `path` exists.
    pub fn wait_for_file(&self, path: &Path, deadline: Option<Instant>) -> Result<(), RunnerError> {
        let started = Instant::now();
        while !path.exists() {
            self.sleep_or_expire(started, deadline, "waiting for the deck log file")?;
        }
        Ok(())
    }

    /// Phase 2: poll until the probe reports `200`. Sleeps only after a failed attempt.
    pub fn wait_for_success(
        &self,
        url: &Url,
        deadline: Option<Instant>,
    ) -> Result<ReadyReport, RunnerError> {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let status = self.probe.probe(url);
            if status.is_ready() {
                return Ok(ReadyReport {
                    attempts,
                    elapsed: started.elapsed(),
                });
            }
            tracing::trace!(attempt = attempts, ?status, "deck not ready yet");
            self.sleep_or_expire(started, deadline, "waiting for deck to answer HTTP 200")?;
        }
    }

    /// Both phases under one deadline. `on_log` runs once the log file exists, typically
    /// to attach a tail to it.
    pub fn await_front_end<F>(
        &self,
        log_path: &Path,
        url: &Url,
        on_log: F,
    ) -> Result<ReadyReport, RunnerError>
    where
        F: FnOnce(&Path) -> Result<(), RunnerError>,
    {
        let started = Instant::now();
        let deadline = self.deadline_from(started);
        self.wait_for_file(log_path, deadline)?;
        on_log(log_path)?;
        let report = self.wait_for_success(url, deadline)?;
        Ok(ReadyReport {
            attempts: report.attempts,
            elapsed: started.elapsed(),
        })
    }
}

/// Keep the process (and therefore the tails) alive until interrupted.
pub fn idle_forever() -> ! {
    loop {
        std::thread::sleep(IDLE_INTERVAL);
    }
}
