//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - Article source endpoint and curated author
//! - Discovery tuning (page size, debounce delay, relevance lists)
//! - Server binding settings
//! - Local content database path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub article_source: ArticleSourceConfig,
    pub discovery: DiscoveryConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Remote article API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSourceConfig {
    pub base_url: String,
    /// Author identity whose articles form the primary feed
    pub curated_author: String,
    /// Single article looked up when the primary feed is unreachable
    #[serde(default)]
    pub featured_article_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

/// Discovery pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub page_size: usize,
    pub debounce_ms: u64,
    /// Tags that mark an article as on-topic
    pub allow_tags: Vec<String>,
    /// Keywords that mark an article as on-topic when found in title or excerpt
    pub allow_words: Vec<String>,
    /// Ordered tags swept when a page comes back empty
    pub fallback_tags: Vec<String>,
}

impl DiscoveryConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Local content database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "vidya.db".to_string(),
        }
    }
}

impl Config {
    /// Load from config.toml or use defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config: Self = if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")?
        };

        config.apply_env();
        Ok(config)
    }

    /// Environment variables take precedence over file values
    fn apply_env(&mut self) {
        if let Some(url) = non_empty_env("DEVTO_API_URL") {
            self.article_source.base_url = url;
        }
        if let Some(path) = non_empty_env("VIDYA_DB_PATH") {
            self.database.path = path;
        }
        if let Some(host) = non_empty_env("VIDYA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty_env("VIDYA_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        // Built-in values if the embedded file fails to parse
        toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            article_source: ArticleSourceConfig {
                base_url: "https://dev.to/api".to_string(),
                curated_author: "luaxd777".to_string(),
                featured_article_id: None,
                timeout_secs: default_timeout_secs(),
            },
            discovery: DiscoveryConfig {
                page_size: 15,
                debounce_ms: 300,
                allow_tags: Vec::new(),
                allow_words: Vec::new(),
                fallback_tags: vec!["cybersecurity".to_string(), "security".to_string()],
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig::default(),
        })
    }
}
