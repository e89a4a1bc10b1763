//! Install state of a project
//!
//! State is derived from the filesystem, never stored: a project is
//! installed as soon as any configured registry destination exists.

use std::path::Path;

use crate::config::RegistryConfig;
use crate::error::{PairError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    NotInstalled,
    /// Destinations (as configured) found in the project
    Installed { present: Vec<String> },
}

impl InstallState {
    pub fn is_installed(&self) -> bool {
        matches!(self, InstallState::Installed { .. })
    }
}

/// Derive the install state of `project`
pub fn state_of(project: &Path, config: &RegistryConfig) -> InstallState {
    let present: Vec<String> = config
        .registries()
        .iter()
        .filter(|entry| {
            entry
                .target_path()
                .is_some_and(|target| project.join(target).symlink_metadata().is_ok())
        })
        .map(|entry| entry.target.clone())
        .collect();

    if present.is_empty() {
        InstallState::NotInstalled
    } else {
        InstallState::Installed { present }
    }
}

/// Gate for `install`: nothing may be installed yet
pub fn ensure_not_installed(project: &Path, config: &RegistryConfig) -> Result<()> {
    match state_of(project, config) {
        InstallState::NotInstalled => Ok(()),
        InstallState::Installed { present } => Err(PairError::AlreadyInstalled {
            project: project.display().to_string(),
            existing: present.join(", "),
        }),
    }
}

/// Gate for `update`: something must be installed
pub fn ensure_installed(project: &Path, config: &RegistryConfig) -> Result<Vec<String>> {
    match state_of(project, config) {
        InstallState::NotInstalled => Err(PairError::NotInstalled {
            project: project.display().to_string(),
        }),
        InstallState::Installed { present } => Ok(present),
    }
}
