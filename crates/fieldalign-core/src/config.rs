use crate::domain::{AlignError, AlignResult};
use crate::simulation::BenchConfig;
use crate::sweep::SweepRequest;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A simulated bench plus the sweep to run on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default)]
    pub bench: BenchConfig,
    pub sweep: SweepRequest,
}

impl RunConfig {
    /// Checks everything that can be checked without touching the bench.
    pub fn validate(&self) -> AlignResult<()> {
        self.bench.validate()?;
        self.sweep.policy()?;
        self.sweep.line_search.validate()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("failed to read run config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse run config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ConfigFileError> for AlignError {
    fn from(error: ConfigFileError) -> Self {
        let code = match &error {
            ConfigFileError::Read { .. } => "CONFIG.READ",
            ConfigFileError::Parse { .. } => "CONFIG.PARSE",
        };
        AlignError::configuration(code, error.to_string())
    }
}

pub fn load_run_config(config_path: impl AsRef<Path>) -> Result<RunConfig, ConfigFileError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigFileError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ConfigFileError::Parse {
        path: config_path.to_path_buf(),
        source,
    })
}
