//! Runtime configuration for the scrape binary.
//!
//! Everything has a default, so the file is optional. A minimal
//! `config.yaml` looks like:
//!
//! ```yaml
//! causes_url: https://api.silobase.com/data/billionaireboard/causes
//! concurrency: 12
//! retry:
//!   max_retries: 5
//!   base_delay_ms: 1000
//!   max_delay_ms: 30000
//!   jitter_ms: 250
//!   timeout_ms: 20000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::api::{DEFAULT_CAUSES_URL, RetryPolicy};
use crate::normalizer::DEFAULT_CONCURRENCY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Endpoint serving the cause reference list.
    pub causes_url: String,
    /// Records normalized at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            causes_url: DEFAULT_CAUSES_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml(yaml: &str, path: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })
    }
}

/// Load an [`AppConfig`] from a YAML file.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
    let config = AppConfig::from_yaml(&yaml, &display)?;
    info!(causes_url = %config.causes_url, concurrency = config.concurrency, "Loaded configuration");
    Ok(config)
}
