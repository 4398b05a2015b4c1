mod common;

use std::fs;

use common::Sandbox;
use dev_runner::LogAggregator;

#[test]
fn test_every_log_exists_before_its_tail() {
    let sb = Sandbox::new();
    let layout = sb.layout();
    let subs = layout.subsystems(&["clouddriver", "echo", "front50"]);
    assert!(!layout.log_dir.exists());

    let tails = LogAggregator::new(&layout.log_dir)
        .prepare_and_tail(&subs)
        .expect("prepare and tail");
    assert_eq!(tails.len(), 3);
    for (tail, sub) in tails.iter().zip(&subs) {
        assert_eq!(tail.path(), sub.log_path.as_path());
        let meta = fs::metadata(&sub.log_path).expect("log exists");
        assert_eq!(meta.len(), 0);
    }
    // deck writes its own log; it is never pre-created.
    assert!(!layout.deck_log_path().exists());
}

#[test]
fn test_previous_run_output_is_truncated() {
    let sb = Sandbox::new();
    let layout = sb.layout();
    let subs = layout.subsystems(&["rosco"]);
    fs::create_dir_all(&layout.log_dir).expect("mkdir logs");
    fs::write(&subs[0].log_path, "stale stack trace\n").expect("stale log");

    LogAggregator::new(&layout.log_dir)
        .prepare_logs(&subs)
        .expect("prepare");
    assert_eq!(fs::read_to_string(&subs[0].log_path).expect("read"), "");
}

#[test]
fn test_log_dir_blocked_by_file_is_fatal() {
    let sb = Sandbox::new();
    let layout = sb.layout();
    fs::write(&layout.log_dir, "oops").expect("blocker");
    let err = LogAggregator::new(&layout.log_dir)
        .prepare_logs(&layout.subsystems(&["gate"]))
        .expect_err("file in the way");
    assert_eq!(dev_runner::exit_code_for_runner_error(&err), 1);
}
