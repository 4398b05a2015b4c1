#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dev_runner::{InstallationLayout, LayoutOverrides};

pub const MASTER_TEMPLATE: &str = "\
# Minimal development configuration
SPINNAKER_HOST=localhost
GATE_PORT=8084
export GATE_URL=http://${SPINNAKER_HOST}:${GATE_PORT}
";

/// A throwaway build root: `<td>/build` (with `deck/`), `<td>/home` and `<td>/templates`.
pub struct Sandbox {
    pub dir: tempfile::TempDir,
    pub root: PathBuf,
    pub home: PathBuf,
    pub templates: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tmpdir");
        let root = dir.path().join("build");
        let home = dir.path().join("home");
        let templates = dir.path().join("templates");
        fs::create_dir_all(root.join("deck")).expect("mkdir deck");
        fs::create_dir_all(&home).expect("mkdir home");
        fs::create_dir_all(&templates).expect("mkdir templates");
        fs::write(templates.join("default_spinnaker_config.cfg"), MASTER_TEMPLATE)
            .expect("write default template");
        Sandbox {
            dir,
            root,
            home,
            templates,
        }
    }

    pub fn layout(&self) -> InstallationLayout {
        InstallationLayout::resolve(&self.root.join("dev"), &self.root, &self.home).with_overrides(
            &LayoutOverrides {
                template_dir: Some(self.templates.clone()),
                deck_port: None,
            },
        )
    }

    pub fn with_subsystem_template(&self, name: &str) -> &Self {
        fs::write(
            self.templates.join(format!("{name}-local.yml")),
            format!("{name}:\n  host: ${{SPINNAKER_HOST}}\n  gate: ${{GATE_URL}}\n  debug: ${{DEBUG:false}}\n"),
        )
        .expect("write subsystem template");
        self
    }
}

pub fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir script dir");
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod script");
}

pub fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).expect("stat").permissions().mode() & 0o777
}

/// Local HTTP server answering `503` for the first `failures` requests and `200` after.
pub struct FakeDeck {
    pub port: u16,
    pub hits: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
}

impl FakeDeck {
    pub fn start(failures: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.set_nonblocking(true).expect("nonblocking");
        let port = listener.local_addr().expect("addr").port();
        let hits = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let (h, s) = (hits.clone(), stop.clone());
        std::thread::spawn(move || {
            while !s.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((mut conn, _)) => {
                        let _ = conn.set_nonblocking(false);
                        let _ = conn.set_read_timeout(Some(Duration::from_secs(2)));
                        let mut buf = [0u8; 1024];
                        let _ = conn.read(&mut buf);
                        let n = h.fetch_add(1, Ordering::SeqCst) + 1;
                        let status = if n <= failures {
                            "503 Service Unavailable"
                        } else {
                            "200 OK"
                        };
                        let resp = format!(
                            "HTTP/1.1 {status}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
                        );
                        let _ = conn.write_all(resp.as_bytes());
                    }
                    Err(_) => std::thread::sleep(Duration::from_millis(5)),
                }
            }
        });
        FakeDeck { port, hits, stop }
    }
}

impl Drop for FakeDeck {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
