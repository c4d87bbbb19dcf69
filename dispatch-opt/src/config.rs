//! System configuration, read from an optional TOML file.
use energy_system_model::{DemandParams, DieselParams, GensetParams, PvParams, StorageParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::system::optimise::SolverKind;
use crate::system::time_index::TimeIndex;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to serialise configuration: {0}")]
    Serialise(#[from] toml::ser::Error),
}

/// Parameters of every component of the energy system.
///
/// In a TOML file each field may be omitted and falls back to its default, except
/// `storage` and `pv`: a missing `[storage]` or `[pv]` table leaves that component out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    /// Log level used when `DISPATCH_LOG_LEVEL` is not set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    pub solver: SolverKind,
    pub time_index: TimeIndex,
    pub diesel: DieselParams,
    pub genset: GensetParams,
    pub demand: DemandParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv: Option<PvParams>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            solver: SolverKind::default(),
            time_index: TimeIndex::default(),
            diesel: DieselParams::default(),
            genset: GensetParams::default(),
            demand: DemandParams::default(),
            storage: Some(StorageParams::default()),
            pv: None,
        }
    }
}

impl SystemConfig {
    /// Reads the configuration from `file_path`, or returns the default system if no path is given
    pub fn load(file_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match file_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(file_path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: file_path.to_path_buf(),
            source,
        })
    }

    /// Checks every component's parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_index.is_empty() {
            return Err(ConfigError::Invalid(
                "time index must have at least one step".to_string(),
            ));
        }
        self.diesel.validate().map_err(ConfigError::Invalid)?;
        self.genset.validate().map_err(ConfigError::Invalid)?;
        self.demand.validate().map_err(ConfigError::Invalid)?;
        if let Some(storage) = &self.storage {
            storage.validate().map_err(ConfigError::Invalid)?;
        }
        if let Some(pv) = &self.pv {
            pv.validate().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    pub fn storage_enabled(&self) -> bool {
        self.storage.is_some()
    }

    pub fn pv_enabled(&self) -> bool {
        self.pv.is_some()
    }

    /// The configuration as a TOML document
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}
