//! Configuration management
//!
//! Loads `config.toml` from the platform config directory, creating it with
//! defaults on first use.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::learning::RankingConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Suggestion engine settings
    #[serde(default)]
    pub learning: LearningConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Learning database; defaults to `<data dir>/learning.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// Days for the recency boost to halve (<= 0 disables decay)
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    /// Minimum recency weight, 0.0 - 1.0
    #[serde(default = "default_recency_floor")]
    pub recency_floor: f64,
    /// Suggestions returned per field
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Default window for `cleanup`
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_half_life_days() -> f64 {
    RankingConfig::default().half_life_days
}

fn default_recency_floor() -> f64 {
    RankingConfig::default().recency_floor
}

fn default_limit() -> usize {
    crate::learning::service::DEFAULT_LIMIT
}

fn default_retention_days() -> u32 {
    365
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            half_life_days: default_half_life_days(),
            recency_floor: default_recency_floor(),
            default_limit: default_limit(),
            retention_days: default_retention_days(),
        }
    }
}

impl LearningConfig {
    pub fn ranking(&self) -> RankingConfig {
        RankingConfig {
            half_life_days: self.half_life_days,
            recency_floor: self.recency_floor,
        }
    }

    /// Configured database path, or the default under the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("learning.db")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Reject settings the ranker cannot work with
    pub fn validate(&self) -> Result<()> {
        let floor = self.learning.recency_floor;
        if !(0.0..=1.0).contains(&floor) {
            anyhow::bail!("learning.recency_floor must be between 0.0 and 1.0, got {}", floor);
        }
        if !self.learning.half_life_days.is_finite() {
            anyhow::bail!("learning.half_life_days must be a finite number");
        }
        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "meta-suggest", "meta-suggest")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "meta-suggest", "meta-suggest")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("Learning:");
    match &config.learning.database_path {
        Some(path) => println!("  database:        {}", path.display()),
        None => println!("  database:        {} (default)", config.learning.database_path()?.display()),
    }
    println!("  half-life:       {} days", config.learning.half_life_days);
    println!("  recency floor:   {}", config.learning.recency_floor);
    println!("  default limit:   {}", config.learning.default_limit);
    println!("  retention:       {} days", config.learning.retention_days);
    println!("Server:");
    println!("  address:         {}:{}", config.server.host, config.server.port);
    println!("\nConfig file: {}", config_path()?.display());
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults.");
    Ok(())
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}
