//! Registry configuration (config.json)
//!
//! A registry maps a sub-path of the KB bundle to a destination inside the
//! target project. The file is either wrapped:
//!
//! ```json
//! { "registries": { "knowledge": { "source": ".pair/knowledge", "target": ".pair/knowledge" } } }
//! ```
//!
//! or a bare registry map. Registry order in the file is the order of
//! application.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::fs::normalize_relative;
use crate::error::{PairError, Result};

/// Default configuration file name inside a project
pub const CONFIG_FILE: &str = "config.json";

const DEFAULT_CONFIG: &str = include_str!("default_config.json");

/// How a registry destination is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Destination is replaced by the bundle content
    #[default]
    Mirror,
    /// Bundle files are copied over the destination; other files stay
    Add,
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Mirror => f.write_str("mirror"),
            Behavior::Add => f.write_str("add"),
        }
    }
}

/// One registry: bundle sub-path to project destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntry {
    #[serde(skip)]
    pub name: String,
    /// Sub-path inside the bundle (`.` for the bundle root)
    pub source: String,
    /// Destination relative to the project root
    pub target: String,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RegistryEntry {
    /// Normalized bundle sub-path; empty for the bundle root
    pub fn source_path(&self) -> Option<PathBuf> {
        normalize_relative(Path::new(&self.source))
    }

    /// Normalized destination inside the project
    pub fn target_path(&self) -> Option<PathBuf> {
        normalize_relative(Path::new(&self.target)).filter(|p| !p.as_os_str().is_empty())
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    BuiltIn,
    File(PathBuf),
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::BuiltIn => f.write_str("built-in defaults"),
            ConfigOrigin::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Ordered registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    registries: Vec<RegistryEntry>,
    origin: ConfigOrigin,
}

impl RegistryConfig {
    /// Built-in default registries
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG, ConfigOrigin::BuiltIn)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PairError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| crate::error::read_failed(path, e))?;
        let config = Self::parse(&content, ConfigOrigin::File(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), registries = config.len(), "loaded config");
        Ok(config)
    }

    /// Pick the configuration for a project.
    ///
    /// An explicit path must exist. Otherwise `<project>/config.json` is used
    /// when present, falling back to the built-in registries.
    pub fn for_project(project: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = project.join(CONFIG_FILE);
        if candidate.is_file() {
            return Self::load(&candidate);
        }
        tracing::debug!("no {CONFIG_FILE} in project, using built-in registries");
        Self::builtin()
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str, origin: ConfigOrigin) -> Result<Self> {
        let parse_error = |reason: String| PairError::ConfigParseFailed {
            path: origin.to_string(),
            reason,
        };

        let value: Value = serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;
        let Value::Object(mut top) = value else {
            return Err(parse_error("top level must be a JSON object".to_string()));
        };

        let map: Map<String, Value> = match top.remove("registries") {
            Some(Value::Object(map)) => map,
            Some(_) => return Err(parse_error("'registries' must be an object".to_string())),
            None => top,
        };

        let mut registries = Vec::with_capacity(map.len());
        for (name, raw) in map {
            let mut entry: RegistryEntry = serde_json::from_value(raw)
                .map_err(|e| parse_error(format!("registry '{name}': {e}")))?;
            entry.name = name;
            registries.push(entry);
        }

        let config = Self { registries, origin };
        config.validate()?;
        Ok(config)
    }

    /// Structural validation independent of any bundle
    pub fn validate(&self) -> Result<()> {
        if self.registries.is_empty() {
            return Err(invalid("no registries configured"));
        }

        let mut targets: Vec<(&str, PathBuf)> = Vec::with_capacity(self.registries.len());
        for entry in &self.registries {
            if entry.name.trim().is_empty() {
                return Err(invalid("registry names must not be empty"));
            }
            if entry.source_path().is_none() {
                return Err(invalid(format!(
                    "registry '{}': source '{}' must be a relative path inside the bundle",
                    entry.name, entry.source
                )));
            }
            let Some(target) = entry.target_path() else {
                return Err(invalid(format!(
                    "registry '{}': target '{}' must be a non-empty relative path inside the project",
                    entry.name, entry.target
                )));
            };

            for (other, other_target) in &targets {
                if *other_target == target {
                    return Err(invalid(format!(
                        "registries '{other}' and '{}' share target '{}'",
                        entry.name, entry.target
                    )));
                }
                if target.starts_with(other_target) || other_target.starts_with(&target) {
                    return Err(invalid(format!(
                        "targets of registries '{other}' and '{}' are nested",
                        entry.name
                    )));
                }
            }
            targets.push((entry.name.as_str(), target));
        }
        Ok(())
    }

    pub fn registries(&self) -> &[RegistryEntry] {
        &self.registries
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.registries.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    pub fn origin(&self) -> &ConfigOrigin {
        &self.origin
    }
}

fn invalid(message: impl Into<String>) -> PairError {
    PairError::ConfigInvalid {
        message: message.into(),
    }
}
