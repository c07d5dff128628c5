use std::fs;
use std::path::{Path, PathBuf};

use foundation_testing::HarnessConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Loads a scenario config from a TOML file; absent keys keep their defaults.
pub fn load(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Command line values that take precedence over the config file.
#[derive(clap::Args, Debug, Default, Clone, Copy)]
pub struct Overrides {
    /// Queue capacity
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Number of producer threads
    #[arg(long)]
    pub producers: Option<usize>,

    /// Number of consumer threads
    #[arg(long)]
    pub consumers: Option<usize>,

    /// Items handled by every producer and every consumer
    #[arg(long)]
    pub items: Option<usize>,

    /// Seconds to wait on scenario threads before cancelling them
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl Overrides {
    #[must_use]
    pub fn apply(&self, mut config: HarnessConfig) -> HarnessConfig {
        if let Some(capacity) = self.capacity {
            config = config.capacity(capacity);
        }
        if let Some(producers) = self.producers {
            config = config.producers(producers);
        }
        if let Some(consumers) = self.consumers {
            config = config.consumers(consumers);
        }
        if let Some(items) = self.items {
            config = config.items(items);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.timeout_secs(secs);
        }
        config
    }
}
