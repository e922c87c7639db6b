use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for user state and workflow journals
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Base URL of the Ollama-compatible API
    pub base_url: String,
    /// Model tag used for all generation calls
    pub model: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig { data_dir: None }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(&config_path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".studybuddy").join("config.toml"))
    }

    /// Resolve the data directory, defaulting to ~/.studybuddy/data
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }

        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".studybuddy").join("data"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.storage.data_dir.is_none());
        assert_eq!(config.generator.base_url, "http://127.0.0.1:11434");
        assert_eq!(config.generator.timeout_secs, 120);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.generator.model = "llama3.1:8b".to_string();

        let toml_string = toml::to_string(&config).unwrap();
        assert!(toml_string.contains("llama3.1:8b"));

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized.generator.model, "llama3.1:8b");
    }

    #[test]
    fn test_explicit_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/tmp/studybuddy"));
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/studybuddy"));
    }
}
