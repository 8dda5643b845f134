//! # Zinc Backend Configuration
//!
//! Where the toolchain binaries live, where scratch files go, and how long
//! each phase may run. Loaded from YAML; every field has a default so an
//! empty file is a valid configuration.
//!
//! ```yaml
//! zargo: /opt/zinc/bin/zargo
//! zvm: /opt/zinc/bin/zvm
//! work_dir: /var/tmp/zkl
//! timeouts:
//!   build_secs: 300
//!   setup_secs: 3000
//!   prove_secs: 300
//!   verify_secs: 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::Phase;

/// Errors loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {}: {source}", path.display())]
    YamlParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Per-phase timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhaseTimeouts {
    pub build_secs: u64,
    pub setup_secs: u64,
    pub prove_secs: u64,
    pub verify_secs: u64,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self {
            build_secs: 300,
            setup_secs: 3000,
            prove_secs: 300,
            verify_secs: 30,
        }
    }
}

impl PhaseTimeouts {
    /// The bound for `phase`.
    pub fn for_phase(&self, phase: Phase) -> Duration {
        let secs = match phase {
            Phase::Build => self.build_secs,
            Phase::Setup => self.setup_secs,
            Phase::Prove => self.prove_secs,
            Phase::Verify => self.verify_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Configuration of the external-process Zinc backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZincConfig {
    /// The circuit compiler. Resolved through `PATH` when relative.
    pub zargo: PathBuf,
    /// The Zinc virtual machine (setup, prove, verify).
    pub zvm: PathBuf,
    /// Parent for per-invocation scratch directories. System temp when unset.
    pub work_dir: Option<PathBuf>,
    pub timeouts: PhaseTimeouts,
}

impl Default for ZincConfig {
    fn default() -> Self {
        Self {
            zargo: PathBuf::from("zargo"),
            zvm: PathBuf::from("zvm"),
            work_dir: None,
            timeouts: PhaseTimeouts::default(),
        }
    }
}

impl ZincConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Load and parse a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::from_yaml_str(&content).map_err(|source| ConfigError::YamlParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
