mod common;

use std::fs;
use std::process::Command;

use common::Sandbox;

fn dev_runner() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dev-runner"));
    cmd.env_remove("RUST_LOG")
        .env_remove("DEV_RUNNER_LOG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_outside_build_root_exits_without_writing() {
    let td = tempfile::tempdir().expect("tmpdir");
    let cwd = td.path().join("elsewhere");
    let home = td.path().join("home");
    fs::create_dir_all(&cwd).expect("mkdir cwd");
    fs::create_dir_all(&home).expect("mkdir home");

    for args in [&[][..], &["stop-deck"][..], &["reconfigure"][..], &["status"][..]] {
        let out = dev_runner()
            .args(args)
            .current_dir(&cwd)
            .env("HOME", &home)
            .output()
            .expect("run dev-runner");
        assert_eq!(out.status.code(), Some(255), "args {args:?}");
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(
            stderr.contains("root of your build directory"),
            "stderr: {stderr}"
        );
    }
    assert_eq!(fs::read_dir(&cwd).expect("ls cwd").count(), 0);
    assert_eq!(fs::read_dir(&home).expect("ls home").count(), 0);
}

#[test]
fn test_status_json_reports_layout() {
    let sb = Sandbox::new();
    let out = dev_runner()
        .args(["--deck-port", "9100", "status", "--json"])
        .current_dir(&sb.root)
        .env("HOME", &sb.home)
        .output()
        .expect("run dev-runner");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(v["deck_port"], 9100);
    assert_eq!(v["master_config_present"], false);
    assert_eq!(v["subsystems"].as_array().map(Vec::len), Some(7));
    assert!(v["log_dir"]
        .as_str()
        .is_some_and(|s| s.ends_with("build/logs")));
}

#[test]
fn test_status_leaves_stale_pidfile_in_place() {
    let sb = Sandbox::new();
    let pidfile = sb.root.join("logs").join("deck.pid");
    fs::create_dir_all(sb.root.join("logs")).expect("mkdir logs");
    // Above any kernel pid_max, so never alive.
    fs::write(&pidfile, "2000000000\n").expect("pidfile");
    let out = dev_runner()
        .args(["status", "--json"])
        .current_dir(&sb.root)
        .env("HOME", &sb.home)
        .output()
        .expect("run dev-runner");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert!(v["deck_pid"].is_null(), "{v}");
    assert!(pidfile.exists(), "status must not remove the pidfile");
}

#[test]
fn test_reconfigure_seeds_and_renders() {
    let sb = Sandbox::new();
    sb.with_subsystem_template("gate");
    let out = dev_runner()
        .arg("--template-dir")
        .arg(&sb.templates)
        .args(["reconfigure", "--subsystem", "gate"])
        .current_dir(&sb.root)
        .env("HOME", &sb.home)
        .output()
        .expect("run dev-runner");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("No master config file"), "stderr: {stderr}");
    let rendered = fs::read_to_string(sb.home.join(".spinnaker/gate-local.yml")).expect("gate");
    assert!(rendered.contains("gate: http://localhost:8084"), "{rendered}");
    // Nothing was started, so no logs either.
    assert!(!sb.root.join("logs").exists());
}

#[test]
fn test_invalid_master_config_fails_before_any_spawn() {
    let sb = Sandbox::new();
    sb.with_subsystem_template("gate");
    fs::create_dir_all(sb.home.join(".spinnaker")).expect("mkdir");
    fs::write(sb.home.join(".spinnaker/spinnaker_config.cfg"), "GATE_URL=${NOPE_NOT_SET_ANYWHERE}\n")
        .expect("bad master");
    common::write_script(&sb.root.join("gate/start_dev.sh"), "touch \"$PWD/gate-started\"");
    let out = dev_runner()
        .arg("--template-dir")
        .arg(&sb.templates)
        .args(["start", "--subsystem", "gate"])
        .current_dir(&sb.root)
        .env("HOME", &sb.home)
        .output()
        .expect("run dev-runner");
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("NOPE_NOT_SET_ANYWHERE"), "stderr: {stderr}");
    assert!(!sb.root.join("logs").exists());
    assert!(!sb.root.join("gate-started").exists());
}

#[test]
fn test_start_times_out_when_deck_never_logs() {
    let sb = Sandbox::new();
    common::write_script(&sb.root.join("gate/start_dev.sh"), "exit 0");
    common::write_script(&sb.root.join("deck/start_dev.sh"), "exit 0");
    let out = dev_runner()
        .args(["--deck-port", "1", "start", "--no-reconfigure", "--startup-timeout", "1s"])
        .args(["--subsystem", "gate"])
        .current_dir(&sb.root)
        .env("HOME", &sb.home)
        .output()
        .expect("run dev-runner");
    assert_eq!(out.status.code(), Some(124), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(sb.root.join("logs/gate.err").exists());
    assert!(!sb.home.join(".spinnaker").exists());
}

#[test]
fn test_missing_start_script_exits_127() {
    let sb = Sandbox::new();
    let out = dev_runner()
        .args(["start", "--no-reconfigure", "--subsystem", "ghost"])
        .current_dir(&sb.root)
        .env("HOME", &sb.home)
        .output()
        .expect("run dev-runner");
    assert_eq!(out.status.code(), Some(127), "stderr: {}", String::from_utf8_lossy(&out.stderr));
}

/// `(comm, state, ppid)` from `/proc/<pid>/stat`.
#[cfg(target_os = "linux")]
fn proc_stat(pid: u32) -> Option<(String, char, u32)> {
    let text = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    let comm = text[open + 1..close].to_string();
    let mut rest = text[close + 1..].split_whitespace();
    let state = rest.next()?.chars().next()?;
    let ppid = rest.next()?.parse().ok()?;
    Some((comm, state, ppid))
}

#[cfg(target_os = "linux")]
fn tail_children(parent: u32) -> Vec<u32> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok()?.file_name().to_str()?.parse::<u32>().ok())
        .filter(|pid| {
            proc_stat(*pid).is_some_and(|(comm, _, ppid)| comm == "tail" && ppid == parent)
        })
        .collect()
}

#[cfg(target_os = "linux")]
#[test]
fn test_tails_exit_when_runner_is_killed() {
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    let sb = Sandbox::new();
    common::write_script(&sb.root.join("gate/start_dev.sh"), "exit 0");
    // Deck never writes its log, so the runner waits with the gate tail attached.
    common::write_script(&sb.root.join("deck/start_dev.sh"), "exit 0");
    let mut runner = dev_runner()
        .args(["--deck-port", "1", "start", "--no-reconfigure", "--startup-timeout", "0"])
        .args(["--subsystem", "gate"])
        .current_dir(&sb.root)
        .env("HOME", &sb.home)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn dev-runner");

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut tails = Vec::new();
    while tails.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
        tails = tail_children(runner.id());
    }
    runner.kill().expect("kill runner");
    runner.wait().expect("reap runner");
    assert!(!tails.is_empty(), "runner never attached a tail");

    let deadline = Instant::now() + Duration::from_secs(5);
    let gone = |pid: u32| proc_stat(pid).map_or(true, |(comm, state, _)| comm != "tail" || state == 'Z');
    while !tails.iter().all(|p| gone(*p)) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(tails.iter().all(|p| gone(*p)), "orphaned tails: {tails:?}");
}
