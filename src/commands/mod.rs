use std::time::Duration;

use anyhow::Context;
use serde::Serialize;

use dev_runner::layout::DEFAULT_SUBSYSTEMS;
use dev_runner::readiness::idle_forever;
use dev_runner::{
    ConfigurationMaterializer, DevLauncher, DevRunner, HttpProbe, InstallationLayout,
    ProcessLocator, PsProcessTable, SeedOutcome, StartOptions, StopOutcome,
};

use crate::banner::print_ready_banner;
use crate::cli::StartArgs;

pub(crate) const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("DEV_RUNNER_BUILD_DATE"),
    ", ",
    env!("DEV_RUNNER_BUILD_TARGET"),
    ", ",
    env!("DEV_RUNNER_BUILD_PROFILE"),
    ")"
);

/// Per-attempt bound for the deck readiness GET.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

fn subsystem_names(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        DEFAULT_SUBSYSTEMS.iter().map(|s| s.to_string()).collect()
    } else {
        requested.to_vec()
    }
}

type Runner = DevRunner<DevLauncher, HttpProbe, PsProcessTable>;

fn build_runner(
    layout: InstallationLayout,
    names: &[String],
    options: StartOptions,
) -> anyhow::Result<Runner> {
    let subsystems = layout.subsystems(names);
    let launcher = DevLauncher::new(&layout.subsystem_root);
    let probe = HttpProbe::new(PROBE_TIMEOUT)?;
    let locator = ProcessLocator::new(PsProcessTable::default(), layout.deck_pid_path());
    Ok(DevRunner::new(
        layout, subsystems, launcher, probe, locator, options,
    ))
}

pub(crate) fn run_start(layout: InstallationLayout, args: &StartArgs) -> anyhow::Result<()> {
    let mut options = StartOptions {
        reconfigure: !args.no_reconfigure,
        ..StartOptions::default()
    };
    if let Some(t) = args.startup_timeout {
        options.startup_timeout = t.0;
    }
    let port = layout.deck_port;
    let mut runner = build_runner(layout, &subsystem_names(&args.subsystem), options)?;
    // Tails live as long as the report; keep it until the process is interrupted.
    let _report = runner.start_all()?;
    print_ready_banner(port);
    idle_forever()
}

pub(crate) fn run_stop_deck(layout: InstallationLayout) -> anyhow::Result<()> {
    let runner = build_runner(layout, &[], StartOptions::default())?;
    match runner.stop_front_end()? {
        StopOutcome::Stopped { .. } => {}
        StopOutcome::NotRunning => {
            let use_err = dev_runner::color_enabled_stderr();
            dev_runner::log_info_stderr(use_err, "Deck is not running");
        }
    }
    Ok(())
}

pub(crate) fn run_reconfigure(
    layout: InstallationLayout,
    requested: &[String],
) -> anyhow::Result<()> {
    let subsystems = layout.subsystems(&subsystem_names(requested));
    let report = ConfigurationMaterializer::new(&layout).materialize(&subsystems)?;
    let use_err = dev_runner::color_enabled_stderr();
    if report.seed == SeedOutcome::Seeded {
        dev_runner::log_info_stderr(
            use_err,
            &format!("seeded {}", layout.master_config_path().display()),
        );
    }
    for p in &report.rendered {
        dev_runner::log_info_stderr(use_err, &format!("wrote {}", p.display()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SubsystemStatus {
    name: String,
    start_script: String,
    start_script_present: bool,
    log_present: bool,
    config_present: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    version: &'static str,
    build_date: &'static str,
    build_target: &'static str,
    build_profile: &'static str,
    install_dir: String,
    subsystem_root: String,
    config_dir: String,
    config_template_dir: String,
    log_dir: String,
    master_config: String,
    master_config_present: bool,
    deck_port: u16,
    deck_pid: Option<i32>,
    subsystems: Vec<SubsystemStatus>,
}

fn collect_status(layout: &InstallationLayout) -> StatusReport {
    let locator = ProcessLocator::new(PsProcessTable::default(), layout.deck_pid_path());
    let deck_pid = match locator.peek_front_end_pid() {
        Ok(pid) => pid,
        Err(e) => {
            dev_runner::warn_print(&format!("cannot determine deck pid: {e}"));
            None
        }
    };
    let subsystems = DEFAULT_SUBSYSTEMS
        .iter()
        .map(|name| {
            let d = layout.subsystem(name);
            SubsystemStatus {
                name: d.name.clone(),
                start_script: d.start_script.display().to_string(),
                start_script_present: d.start_script.is_file(),
                log_present: d.log_path.is_file(),
                config_present: d.config_path.is_file(),
            }
        })
        .collect();
    let master = layout.master_config_path();
    StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("DEV_RUNNER_BUILD_DATE"),
        build_target: env!("DEV_RUNNER_BUILD_TARGET"),
        build_profile: env!("DEV_RUNNER_BUILD_PROFILE"),
        install_dir: layout.install_dir.display().to_string(),
        subsystem_root: layout.subsystem_root.display().to_string(),
        config_dir: layout.config_dir.display().to_string(),
        config_template_dir: layout.config_template_dir.display().to_string(),
        log_dir: layout.log_dir.display().to_string(),
        master_config_present: master.is_file(),
        master_config: master.display().to_string(),
        deck_port: layout.deck_port,
        deck_pid,
        subsystems,
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

pub(crate) fn run_status(layout: InstallationLayout, json: bool) -> anyhow::Result<()> {
    let report = collect_status(&layout);
    if json {
        let text = serde_json::to_string_pretty(&report).context("cannot encode status")?;
        println!("{text}");
        return Ok(());
    }
    let use_out = dev_runner::color_enabled_stdout();
    let val = |s: &str| dev_runner::paint(use_out, "\x1b[34;1m", s);
    println!("dev-runner {}", report.version);
    println!("  install dir:   {}", val(&report.install_dir));
    println!("  build root:    {}", val(&report.subsystem_root));
    println!("  config dir:    {}", val(&report.config_dir));
    println!("  templates:     {}", val(&report.config_template_dir));
    println!("  logs:          {}", val(&report.log_dir));
    println!(
        "  master config: {} (present: {})",
        val(&report.master_config),
        yes_no(report.master_config_present)
    );
    let deck = match report.deck_pid {
        Some(pid) => format!("running as pid={pid}"),
        None => "not running".to_string(),
    };
    println!("  deck:          {} on port {}", val(&deck), report.deck_port);
    println!();
    for s in &report.subsystems {
        println!(
            "  {:<12} script: {:<3}  log: {:<3}  config: {}",
            s.name,
            yes_no(s.start_script_present),
            yes_no(s.log_present),
            yes_no(s.config_present)
        );
    }
    Ok(())
}
