//! tracing subscriber setup.
//!
//! Filter precedence: DEV_RUNNER_LOG, then RUST_LOG, then a level derived from `-v` count.
//! Output goes to stderr so it interleaves with the mirrored subsystem logs.

use std::env;

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn filter_from_env(verbosity: u8) -> EnvFilter {
    let from_env = env::var("DEV_RUNNER_LOG")
        .ok()
        .or_else(|| env::var("RUST_LOG").ok())
        .filter(|s| !s.trim().is_empty());
    match from_env {
        Some(spec) => EnvFilter::try_new(&spec)
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity))),
        None => EnvFilter::new(default_directive(verbosity)),
    }
}

/// Install the global subscriber once. Later calls (tests, re-entry) are no-ops.
pub fn init_logging(verbosity: u8) {
    if INIT.get().is_some() {
        return;
    }
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(crate::color_enabled_stderr());
    let registry = tracing_subscriber::registry()
        .with(filter_from_env(verbosity))
        .with(fmt_layer);
    if registry.try_init().is_err() {
        tracing::debug!("tracing subscriber already installed; keeping it");
    }
    let _ = INIT.set(());
}
