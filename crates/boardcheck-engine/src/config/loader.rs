use super::schema::BoardcheckConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("Selector chain '{0}' has no strategies")]
    EmptyChain(String),
    #[error("No card patterns configured")]
    NoCardPatterns,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./boardcheck.yaml
    /// 2. ~/.boardcheck/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<BoardcheckConfig, ConfigError> {
        let local_config = PathBuf::from("./boardcheck.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".boardcheck").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(BoardcheckConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<BoardcheckConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: BoardcheckConfig = serde_yaml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

impl BoardcheckConfig {
    /// Reject configurations a run could never succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed =
            url::Url::parse(&self.target.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
                url: self.target.base_url.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(parsed.scheme(), "http" | "https" | "file" | "data") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.target.base_url.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        for (name, chain) in self.selectors.chains() {
            if chain.is_empty() {
                return Err(ConfigError::EmptyChain(name.to_string()));
            }
        }
        if self.selectors.cards.is_empty() {
            return Err(ConfigError::NoCardPatterns);
        }
        Ok(())
    }
}
