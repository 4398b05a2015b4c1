dev-runner crate: architecture overview, environment invariants and module map.

Architecture
- Binary glue (src/main.rs) parses the CLI, checks the build-directory precondition and
  dispatches to src/commands (start, stop-deck, reconfigure, status).
- The library owns every lifecycle decision; the binary only wires concrete implementations
  (DevLauncher, HttpProbe, PsProcessTable) into runner::DevRunner.

Key modules
- layout: InstallationLayout (pure path arithmetic) and SubsystemDescriptor.
- config: master file seeding, KEY=value parsing/validation, ${KEY} template rendering.
- daemon: setsid-detached spawning, DaemonHandle, front-end pidfile helpers.
- logs: log pre-creation and `tail -f` mirroring onto stderr.
- process: front-end discovery (pidfile first, `ps` scrape as fallback) and stop.
- readiness: log-file wait and HTTP 200 polling with an optional deadline.
- runner: the start sequence state machine and the SubsystemLauncher strategy.
- color.rs / telemetry.rs: stderr one-liners and the tracing subscriber.

Environment invariants (documented for contributors)
- HOME: resolves the configuration directory (<home>/.spinnaker).
- Working directory: must be the build root (contains ./deck); all subsystem and log paths hang off it.
- DEV_RUNNER_COLOR / NO_COLOR: crate-wide color control; helpers never change message text.
- DEV_RUNNER_LOG / RUST_LOG: tracing filter, DEV_RUNNER_LOG wins.

Style guidance
- Subsystem daemons must never be tied to the runner's process group or stdio.
- Tail children must die with the runner (TailHandle kills on drop).
