//! Configuration file loader with multi-source merging

use super::env::expand_config;
use super::file_config::{ConfigValidationError, FileConfig};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] Box<figment::Error>),

    #[error(transparent)]
    Invalid(#[from] ConfigValidationError),
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Explicit config path (if provided)
    /// 2. Project root: `./sandbox.toml` or `./.sandbox.toml`
    /// 3. Default values
    ///
    /// After merging, string values get `${VAR}` / `${VAR:-default}`
    /// substitution applied.
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        for filename in &["sandbox.toml", ".sandbox.toml"] {
            let path = PathBuf::from(filename);
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
                break;
            }
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        let mut config: FileConfig = figment.extract().map_err(Box::new)?;
        expand_config(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }
}
