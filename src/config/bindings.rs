//! Master configuration parsing.
//!
//! The master file is a flat list of `KEY=value` lines. Values may reference other keys
//! (or process environment variables) as `${NAME}`; references are resolved eagerly so a
//! [`ConfigurationBindings`] only ever holds final values.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::ConfigError;
use crate::util::{is_identifier, strip_outer_quotes};

/// Fully resolved master configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationBindings {
    values: BTreeMap<String, String>,
}

impl ConfigurationBindings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

struct RawEntry {
    line: usize,
    value: String,
}

/// Parse and resolve master configuration text. `env` is consulted for references that
/// are not defined in the file itself.
pub fn parse_master_config<F>(
    path: &Path,
    text: &str,
    env: F,
) -> Result<ConfigurationBindings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut raw: BTreeMap<String, RawEntry> = BTreeMap::new();
    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let body = trimmed.strip_prefix("export ").unwrap_or(trimmed).trim_start();
        let Some((key, value)) = body.split_once('=') else {
            return Err(ConfigError::Syntax {
                path: path.to_path_buf(),
                line: lineno,
                text: trimmed.to_string(),
            });
        };
        let key = key.trim();
        if !is_identifier(key) {
            return Err(ConfigError::InvalidKey {
                path: path.to_path_buf(),
                line: lineno,
                key: key.to_string(),
            });
        }
        if let Some(first) = raw.get(key) {
            return Err(ConfigError::DuplicateKey {
                path: path.to_path_buf(),
                line: lineno,
                first_line: first.line,
                key: key.to_string(),
            });
        }
        raw.insert(
            key.to_string(),
            RawEntry {
                line: lineno,
                value: strip_outer_quotes(value.trim()).to_string(),
            },
        );
    }

    let mut resolver = Resolver {
        path,
        raw: &raw,
        env: &env,
        done: BTreeMap::new(),
        in_progress: BTreeSet::new(),
    };
    for key in raw.keys() {
        resolver.resolve(key)?;
    }
    Ok(ConfigurationBindings {
        values: resolver.done,
    })
}

struct Resolver<'a, F> {
    path: &'a Path,
    raw: &'a BTreeMap<String, RawEntry>,
    env: &'a F,
    done: BTreeMap<String, String>,
    in_progress: BTreeSet<String>,
}

impl<'a, F> Resolver<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&mut self, key: &str) -> Result<String, ConfigError> {
        if let Some(v) = self.done.get(key) {
            return Ok(v.clone());
        }
        let raw = self.raw;
        let Some(entry) = raw.get(key) else {
            return Err(ConfigError::Unresolved {
                path: self.path.to_path_buf(),
                line: 0,
                key: key.to_string(),
                reference: key.to_string(),
            });
        };
        if !self.in_progress.insert(key.to_string()) {
            return Err(ConfigError::Cycle {
                path: self.path.to_path_buf(),
                key: key.to_string(),
            });
        }
        let mut out = String::with_capacity(entry.value.len());
        let mut rest = entry.value.as_str();
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(ConfigError::Syntax {
                    path: self.path.to_path_buf(),
                    line: entry.line,
                    text: entry.value.clone(),
                });
            };
            let name = &after[..end];
            let value = if raw.contains_key(name) {
                self.resolve(name)?
            } else if let Some(v) = (self.env)(name) {
                v
            } else {
                return Err(ConfigError::Unresolved {
                    path: self.path.to_path_buf(),
                    line: entry.line,
                    key: key.to_string(),
                    reference: name.to_string(),
                });
            };
            out.push_str(&value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        self.in_progress.remove(key);
        self.done.insert(key.to_string(), out.clone());
        Ok(out)
    }
}
