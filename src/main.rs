use clap::Parser;
use std::process::ExitCode;

use dev_runner::{
    exit_code_for_anyhow, exit_code_for_runner_error, InstallationLayout, LayoutOverrides,
    RunnerError,
};

mod banner;
mod cli;
mod commands;

use crate::banner::print_precondition_failure;
use crate::cli::{Cli, RunnerCmd};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        dev_runner::set_color_mode(mode);
    }
    dev_runner::telemetry::init_logging(cli.verbose);

    let overrides = LayoutOverrides {
        template_dir: cli.template_dir.clone(),
        deck_port: cli.deck_port,
    };
    let layout = match InstallationLayout::from_env(&overrides) {
        Ok(l) => l,
        Err(e) => {
            print_precondition_failure(&e.to_string());
            return ExitCode::from(exit_code_for_runner_error(&e));
        }
    };

    // Checked before anything touches the filesystem.
    if !layout.has_deck_dir() {
        let e = RunnerError::Precondition(
            "This script needs to be run from the root of your build directory.".to_string(),
        );
        print_precondition_failure(&e.to_string());
        return ExitCode::from(exit_code_for_runner_error(&e));
    }
    tracing::debug!(root = %layout.subsystem_root.display(), "resolved installation layout");

    let result = match cli.command_or_default() {
        RunnerCmd::Start(args) => commands::run_start(layout, &args),
        RunnerCmd::StopDeck => commands::run_stop_deck(layout),
        RunnerCmd::Reconfigure { subsystem } => commands::run_reconfigure(layout, &subsystem),
        RunnerCmd::Status { json } => commands::run_status(layout, json),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let use_err = dev_runner::color_enabled_stderr();
            dev_runner::log_error_stderr(use_err, &format!("dev-runner: {e:#}"));
            ExitCode::from(exit_code_for_anyhow(&e))
        }
    }
}
