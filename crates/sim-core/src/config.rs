use crate::error::Result;
use crate::path::resolve_workspace_path;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// LLM vendor connection details consumed by `sim-providers`' default/HTTP-backed
/// `LlmClient` implementations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Graph backend connection details consumed by `sim-providers`' `GraphClient`
/// implementations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphConfig {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Overrides `resolve_workspace_path`'s default when set.
    #[serde(default)]
    pub upload_root: Option<PathBuf>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    /// Suppresses duplicate shutdown-hook registration under an auto-reloader.
    #[serde(default)]
    pub reloader: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_root: None,
            llm: LlmConfig::default(),
            graph: GraphConfig::default(),
            reloader: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(resolve_workspace_path(None)?.join("config.toml"))
    }

    /// Resolves the effective upload root: the configured override, or
    /// `resolve_workspace_path(None)` joined with `uploads`.
    pub fn resolve_upload_root(&self) -> Result<PathBuf> {
        match &self.upload_root {
            Some(path) => Ok(path.clone()),
            None => Ok(resolve_workspace_path(None)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_no_credentials() {
        let config = Config::default();
        assert!(config.llm.api_key.is_none());
        assert!(config.graph.uri.is_none());
        assert!(!config.reloader);
    }

    #[test]
    fn save_and_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.llm.model = Some("gpt-test".to_string());
        config.reloader = true;

        config.save_to(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = Config::load_from(&config_path).unwrap();
        assert_eq!(loaded.llm.model.as_deref(), Some("gpt-test"));
        assert!(loaded.reloader);
    }

    #[test]
    fn load_nonexistent_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("missing.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert!(config.llm.api_key.is_none());
    }
}
