//! Master configuration materialization.
//!
//! Order is fixed: ensure the config dir, seed a default master file when none exists,
//! validate it into [`ConfigurationBindings`], then render every subsystem file. Rendering
//! happens fully in memory before the first write, so a bad template never leaves the
//! subsystems with a half-updated configuration set.

pub mod bindings;
pub mod render;

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub use bindings::{parse_master_config, ConfigurationBindings};

use crate::errors::RunnerError;
use crate::layout::{InstallationLayout, SubsystemDescriptor};
use crate::util::fs::{ensure_dir, write_atomic};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    MissingTemplate(PathBuf),
    Syntax {
        path: PathBuf,
        line: usize,
        text: String,
    },
    InvalidKey {
        path: PathBuf,
        line: usize,
        key: String,
    },
    DuplicateKey {
        path: PathBuf,
        line: usize,
        first_line: usize,
        key: String,
    },
    Unresolved {
        path: PathBuf,
        line: usize,
        key: String,
        reference: String,
    },
    Cycle {
        path: PathBuf,
        key: String,
    },
    Render {
        path: PathBuf,
        message: String,
    },
    InvalidYaml {
        path: PathBuf,
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            ConfigError::MissingTemplate(p) => write!(f, "missing template {}", p.display()),
            ConfigError::Syntax { path, line, text } => write!(
                f,
                "{}:{line}: expected KEY=value, got '{text}'",
                path.display()
            ),
            ConfigError::InvalidKey { path, line, key } => {
                write!(f, "{}:{line}: invalid key '{key}'", path.display())
            }
            ConfigError::DuplicateKey {
                path,
                line,
                first_line,
                key,
            } => write!(
                f,
                "{}:{line}: '{key}' already defined on line {first_line}",
                path.display()
            ),
            ConfigError::Unresolved {
                path,
                line,
                key,
                reference,
            } => write!(
                f,
                "{}:{line}: '{key}' references undefined '${{{reference}}}'",
                path.display()
            ),
            ConfigError::Cycle { path, key } => {
                write!(f, "{}: '{key}' references itself", path.display())
            }
            ConfigError::Render { path, message } => {
                write!(f, "{}: {message}", path.display())
            }
            ConfigError::InvalidYaml { path, message } => {
                write!(f, "{} would not be valid YAML: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded,
    AlreadyPresent,
}

#[derive(Debug)]
pub struct MaterializeReport {
    pub seed: SeedOutcome,
    pub bindings: ConfigurationBindings,
    pub rendered: Vec<PathBuf>,
}

pub struct ConfigurationMaterializer<'a> {
    layout: &'a InstallationLayout,
}

impl<'a> ConfigurationMaterializer<'a> {
    pub fn new(layout: &'a InstallationLayout) -> Self {
        Self { layout }
    }

    pub fn ensure_config_dir(&self) -> Result<(), ConfigError> {
        let dir = &self.layout.config_dir;
        ensure_dir(dir).map_err(io_err(dir))
    }

    /// Copy the default template into place with owner-only permissions. An existing master
    /// file is never touched.
    pub fn seed_default_if_missing(&self) -> Result<SeedOutcome, ConfigError> {
        let master = self.layout.master_config_path();
        if master.exists() {
            return Ok(SeedOutcome::AlreadyPresent);
        }
        let template = self.layout.default_config_template_path();
        let contents = match fs::read(&template) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingTemplate(template))
            }
            Err(e) => return Err(io_err(&template)(e)),
        };

        let mut opts = OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = match opts.open(&master) {
            Ok(f) => f,
            // Another invocation won the race; its copy is as good as ours.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(SeedOutcome::AlreadyPresent)
            }
            Err(e) => return Err(io_err(&master)(e)),
        };
        file.write_all(&contents).map_err(io_err(&master))?;
        file.sync_all().map_err(io_err(&master))?;
        #[cfg(unix)]
        {
            // umask may have narrowed the mode further; pin it explicitly.
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&master, fs::Permissions::from_mode(0o600))
                .map_err(io_err(&master))?;
        }

        tracing::warn!(path = %master.display(), "seeded default master configuration");
        print_seeded_warning(&master);
        Ok(SeedOutcome::Seeded)
    }

    pub fn validate(&self) -> Result<ConfigurationBindings, ConfigError> {
        let master = self.layout.master_config_path();
        let text = fs::read_to_string(&master).map_err(io_err(&master))?;
        let bindings = parse_master_config(&master, &text, |name| std::env::var(name).ok())?;
        tracing::debug!(bindings = bindings.len(), "master configuration is valid");
        Ok(bindings)
    }

    /// Render every subsystem file, writing only once all of them rendered cleanly.
    pub fn render_all(
        &self,
        bindings: &ConfigurationBindings,
        subsystems: &[SubsystemDescriptor],
    ) -> Result<Vec<PathBuf>, ConfigError> {
        let mut staged: Vec<(&Path, String)> = Vec::with_capacity(subsystems.len());
        for sub in subsystems {
            let template = match fs::read_to_string(&sub.template_path) {
                Ok(t) => t,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(ConfigError::MissingTemplate(sub.template_path.clone()))
                }
                Err(e) => return Err(io_err(&sub.template_path)(e)),
            };
            let rendered = render::render_template(&sub.template_path, &template, bindings)?;
            render::check_yaml(&sub.config_path, &rendered)?;
            staged.push((sub.config_path.as_path(), rendered));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (path, contents) in staged {
            if let Some(parent) = path.parent() {
                ensure_dir(parent).map_err(io_err(parent))?;
            }
            write_atomic(path, contents.as_bytes()).map_err(io_err(path))?;
            tracing::info!(path = %path.display(), "rendered subsystem configuration");
            written.push(path.to_path_buf());
        }
        Ok(written)
    }

    /// Whole pipeline under the installation lock.
    pub fn materialize(
        &self,
        subsystems: &[SubsystemDescriptor],
    ) -> Result<MaterializeReport, RunnerError> {
        self.ensure_config_dir()?;
        let _lock = crate::lock::acquire_install_lock(&self.layout.install_lock_path())?;
        let seed = self.seed_default_if_missing()?;
        let bindings = self.validate()?;
        let rendered = self.render_all(&bindings, subsystems)?;
        Ok(MaterializeReport {
            seed,
            bindings,
            rendered,
        })
    }
}

fn print_seeded_warning(master: &Path) {
    let use_err = crate::color_enabled_stderr();
    let lines = [
        String::new(),
        "*** WARNING: ********************************************************".to_string(),
        format!("***  No master config file {}", master.display()),
        "***  We will create one for you, assuming a minimal configuration.".to_string(),
        "***".to_string(),
        "*** If that is not your intention, edit the .cfg and run again.".to_string(),
        "**********************************************************************".to_string(),
        String::new(),
    ];
    for l in &lines {
        crate::log_warn_stderr(use_err, l);
    }
}
