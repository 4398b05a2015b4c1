pub(crate) fn print_ready_banner(port: u16) {
    let use_err = dev_runner::color_enabled_stderr();
    eprintln!();
    dev_runner::log_info_stderr(use_err, &format!("Spinnaker is now ready on port {port}."));
    eprintln!();
    eprintln!("You can ^C (ctrl-c) to finish the script, which will stop emitting errors.");
    eprintln!("Spinnaker will continue until you run scripts/release/stop_spinnaker.sh");
    eprintln!();
}

pub(crate) fn print_precondition_failure(msg: &str) {
    let use_err = dev_runner::color_enabled_stderr();
    dev_runner::log_error_stderr(use_err, &format!("dev-runner: {msg}"));
}
