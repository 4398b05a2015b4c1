//! Installation layout for a developer build directory.
//!
//! Everything here is plain path arithmetic over three inputs: the directory holding the
//! runner executable, the invocation working directory and the user's home directory.
//! Nothing touches the filesystem, so resolution cannot fail on missing directories;
//! callers create what they need lazily.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::errors::RunnerError;

/// Default port deck's webpack dev server listens on.
pub const DECK_PORT: u16 = 9000;
pub const DECK_NAME: &str = "deck";
pub const START_SCRIPT: &str = "start_dev.sh";
pub const MASTER_CONFIG_FILENAME: &str = "spinnaker_config.cfg";
pub const DEFAULT_CONFIG_TEMPLATE: &str = "default_spinnaker_config.cfg";

/// Subsystems started when no `--subsystem` flag is given.
pub const DEFAULT_SUBSYSTEMS: &[&str] = &[
    "clouddriver",
    "echo",
    "front50",
    "gate",
    "igor",
    "orca",
    "rosco",
];

/// Optional CLI overrides applied on top of the derived layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutOverrides {
    pub template_dir: Option<PathBuf>,
    pub deck_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationLayout {
    pub dev_script_dir: PathBuf,
    pub install_dir: PathBuf,
    pub subsystem_root: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_template_dir: PathBuf,
    pub deck_install_dir: PathBuf,
    pub deck_port: u16,
}

impl InstallationLayout {
    /// Derive every path from the executable directory, working directory and home.
    /// Relative inputs are anchored at `cwd`; `..` segments are folded lexically.
    pub fn resolve(script_dir: &Path, cwd: &Path, home: &Path) -> Self {
        let cwd = normalize(cwd);
        let anchor = |p: &Path| {
            if p.is_absolute() {
                normalize(p)
            } else {
                normalize(&cwd.join(p))
            }
        };
        let dev_script_dir = anchor(script_dir);
        let install_dir = normalize(&dev_script_dir.join(".."));
        let home = anchor(home);
        InstallationLayout {
            config_template_dir: install_dir.join("config").join("templates"),
            config_dir: home.join(".spinnaker"),
            log_dir: cwd.join("logs"),
            deck_install_dir: cwd.join(DECK_NAME),
            deck_port: DECK_PORT,
            dev_script_dir,
            install_dir,
            subsystem_root: cwd,
        }
    }

    /// Gather the inputs from the running process and resolve.
    pub fn from_env(overrides: &LayoutOverrides) -> Result<Self, RunnerError> {
        let cwd = std::env::current_dir().map_err(|e| {
            RunnerError::Precondition(format!("cannot determine working directory: {e}"))
        })?;
        let script_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| cwd.clone());
        let home = home::home_dir().ok_or_else(|| {
            RunnerError::Precondition("cannot determine home directory (is HOME set?)".to_string())
        })?;
        Ok(Self::resolve(&script_dir, &cwd, &home).with_overrides(overrides))
    }

    pub fn with_overrides(mut self, overrides: &LayoutOverrides) -> Self {
        if let Some(dir) = &overrides.template_dir {
            self.config_template_dir = if dir.is_absolute() {
                normalize(dir)
            } else {
                normalize(&self.subsystem_root.join(dir))
            };
        }
        if let Some(port) = overrides.deck_port {
            self.deck_port = port;
        }
        self
    }

    pub fn master_config_path(&self) -> PathBuf {
        self.config_dir.join(MASTER_CONFIG_FILENAME)
    }

    pub fn default_config_template_path(&self) -> PathBuf {
        self.config_template_dir.join(DEFAULT_CONFIG_TEMPLATE)
    }

    pub fn install_lock_path(&self) -> PathBuf {
        self.config_dir.join(".dev-runner.lock")
    }

    /// Written by deck's own start script, never pre-created by the runner.
    pub fn deck_log_path(&self) -> PathBuf {
        self.log_dir.join("deck.log")
    }

    pub fn deck_pid_path(&self) -> PathBuf {
        self.log_dir.join("deck.pid")
    }

    pub fn deck_start_script(&self) -> PathBuf {
        self.deck_install_dir.join(START_SCRIPT)
    }

    pub fn base_url(&self) -> Result<Url, RunnerError> {
        let raw = format!("http://localhost:{}/", self.deck_port);
        Url::parse(&raw).map_err(|e| RunnerError::Http(format!("invalid base url {raw}: {e}")))
    }

    /// True when the working directory looks like a build root.
    pub fn has_deck_dir(&self) -> bool {
        self.deck_install_dir.is_dir()
    }

    pub fn subsystem(&self, name: &str) -> SubsystemDescriptor {
        SubsystemDescriptor {
            name: name.to_string(),
            start_script: self.subsystem_root.join(name).join(START_SCRIPT),
            log_path: self.log_dir.join(format!("{name}.err")),
            config_path: self.config_dir.join(format!("{name}-local.yml")),
            template_path: self.config_template_dir.join(format!("{name}-local.yml")),
        }
    }

    /// Descriptor for the front-end. Its log file is `deck.log`, not `deck.err`.
    pub fn deck(&self) -> SubsystemDescriptor {
        SubsystemDescriptor {
            name: DECK_NAME.to_string(),
            start_script: self.deck_start_script(),
            log_path: self.deck_log_path(),
            config_path: self.deck_install_dir.join("settings.js"),
            template_path: self.config_template_dir.join("settings.js"),
        }
    }

    pub fn subsystems<S: AsRef<str>>(&self, names: &[S]) -> Vec<SubsystemDescriptor> {
        names.iter().map(|n| self.subsystem(n.as_ref())).collect()
    }
}

/// One independently started backend component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemDescriptor {
    pub name: String,
    pub start_script: PathBuf,
    pub log_path: PathBuf,
    pub config_path: PathBuf,
    pub template_path: PathBuf,
}

/// Reject names that would escape the subsystem root.
pub fn validate_subsystem_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("subsystem name must not be empty".to_string());
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(format!("invalid subsystem name '{name}'"));
    }
    Ok(())
}

fn normalize(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InstallationLayout {
        InstallationLayout::resolve(
            Path::new("/opt/spinnaker/dev"),
            Path::new("/work/build"),
            Path::new("/home/dev"),
        )
    }

    #[test]
    fn test_resolve_paths() {
        let l = sample();
        assert_eq!(l.install_dir, PathBuf::from("/opt/spinnaker"));
        assert_eq!(l.config_dir, PathBuf::from("/home/dev/.spinnaker"));
        assert_eq!(l.log_dir, PathBuf::from("/work/build/logs"));
        assert_eq!(l.deck_install_dir, PathBuf::from("/work/build/deck"));
        assert_eq!(
            l.config_template_dir,
            PathBuf::from("/opt/spinnaker/config/templates")
        );
        assert_eq!(
            l.master_config_path(),
            PathBuf::from("/home/dev/.spinnaker/spinnaker_config.cfg")
        );
        assert_eq!(l.deck_port, 9000);
        assert_eq!(l.base_url().unwrap().as_str(), "http://localhost:9000/");
    }

    #[test]
    fn test_resolve_anchors_relative_inputs_at_cwd() {
        let l = InstallationLayout::resolve(
            Path::new("./scripts/../dev"),
            Path::new("/work/build/."),
            Path::new("/home/dev"),
        );
        assert_eq!(l.dev_script_dir, PathBuf::from("/work/build/dev"));
        assert_eq!(l.install_dir, PathBuf::from("/work/build"));
        assert_eq!(l.subsystem_root, PathBuf::from("/work/build"));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        assert_eq!(sample(), sample());
    }

    #[test]
    fn test_subsystem_descriptor() {
        let d = sample().subsystem("gate");
        assert_eq!(d.start_script, PathBuf::from("/work/build/gate/start_dev.sh"));
        assert_eq!(d.log_path, PathBuf::from("/work/build/logs/gate.err"));
        assert_eq!(d.config_path, PathBuf::from("/home/dev/.spinnaker/gate-local.yml"));
        let deck = sample().deck();
        assert_eq!(deck.log_path, PathBuf::from("/work/build/logs/deck.log"));
    }

    #[test]
    fn test_overrides() {
        let l = sample().with_overrides(&LayoutOverrides {
            template_dir: Some(PathBuf::from("tpl")),
            deck_port: Some(9100),
        });
        assert_eq!(l.config_template_dir, PathBuf::from("/work/build/tpl"));
        assert_eq!(l.base_url().unwrap().as_str(), "http://localhost:9100/");
    }

    #[test]
    fn test_validate_subsystem_name() {
        assert!(validate_subsystem_name("clouddriver").is_ok());
        assert!(validate_subsystem_name("").is_err());
        assert!(validate_subsystem_name("..").is_err());
        assert!(validate_subsystem_name("a/b").is_err());
    }
}
