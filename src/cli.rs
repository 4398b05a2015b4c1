use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};

/// Validate a subsystem name flag value
fn parse_subsystem(s: &str) -> Result<String, String> {
    dev_runner::layout::validate_subsystem_name(s)?;
    Ok(s.to_string())
}

/// `--startup-timeout` value; `None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StartupTimeout(pub(crate) Option<Duration>);

/// Parse `--startup-timeout`: a humantime duration, or `0` to wait forever
fn parse_timeout(s: &str) -> Result<StartupTimeout, String> {
    if s.trim() == "0" {
        return Ok(StartupTimeout(None));
    }
    let d = humantime::parse_duration(s.trim()).map_err(|e| e.to_string())?;
    Ok(StartupTimeout(if d.is_zero() { None } else { Some(d) }))
}

#[derive(Parser, Debug)]
#[command(
    name = "dev-runner",
    version = crate::commands::LONG_VERSION,
    about = "Start Spinnaker subsystems from a developer build directory and mirror their error logs.",
    after_long_help = "Examples:\n  dev-runner\n  dev-runner start --no-reconfigure --startup-timeout 5m\n  dev-runner start --subsystem gate --subsystem orca\n  dev-runner stop-deck\n  dev-runner status --json\n\n",
    after_help = "\n"
)]
pub(crate) struct Cli {
    /// Directory holding the configuration templates (default: <install>/config/templates)
    #[arg(long = "template-dir", global = true)]
    pub(crate) template_dir: Option<PathBuf>,

    /// Port deck's dev server listens on
    #[arg(long = "deck-port", global = true)]
    pub(crate) deck_port: Option<u16>,

    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum, global = true)]
    pub(crate) color: Option<dev_runner::ColorMode>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,

    #[command(subcommand)]
    pub(crate) command: Option<RunnerCmd>,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum RunnerCmd {
    /// Reconfigure, start every subsystem and deck, then mirror error logs (default)
    Start(StartArgs),
    /// Terminate a running deck dev server
    #[command(name = "stop-deck")]
    StopDeck,
    /// Re-render subsystem configuration without starting or stopping anything
    Reconfigure {
        /// Limit to these subsystems (repeatable)
        #[arg(long = "subsystem", value_parser = parse_subsystem)]
        subsystem: Vec<String>,
    },
    /// Show the resolved layout and what is running; changes nothing on disk
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub(crate) struct StartArgs {
    /// Skip seeding and rendering configuration
    #[arg(long = "no-reconfigure")]
    pub(crate) no_reconfigure: bool,

    /// Give up waiting for deck after this long (default 10m; e.g. 90s, 1h); 0 waits forever
    #[arg(long = "startup-timeout", value_parser = parse_timeout)]
    pub(crate) startup_timeout: Option<StartupTimeout>,

    /// Start only these subsystems (repeatable)
    #[arg(long = "subsystem", value_parser = parse_subsystem)]
    pub(crate) subsystem: Vec<String>,
}

impl Cli {
    pub(crate) fn command_or_default(&self) -> RunnerCmd {
        self.command
            .clone()
            .unwrap_or_else(|| RunnerCmd::Start(StartArgs::default()))
    }
}
