//! Configuration management for anime-hub.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder used when a source provides no cover image
pub const DEFAULT_FALLBACK_IMAGE: &str =
    "https://via.placeholder.com/460x690/1e1e2a/6366f1?text=No+Image";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Upstream API settings
    pub sources: SourcesConfig,

    /// Request budget settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Search history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Fallback values
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// User agent sent with every request
    pub user_agent: String,

    /// Transport timeout in seconds
    pub timeout_seconds: u64,

    /// AniList GraphQL catalog
    pub anilist: EndpointConfig,

    /// Jikan REST catalog
    pub jikan: EndpointConfig,

    /// OMDb REST ratings service
    pub omdb: OmdbConfig,
}

/// Endpoint with a request budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL
    pub endpoint: String,

    /// Maximum requests per rate-limit window
    pub requests_per_window: u32,
}

/// OMDb endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmdbConfig {
    /// Base URL
    pub endpoint: String,

    /// API key passed as the `apikey` query parameter
    pub api_key: String,

    /// Maximum requests per rate-limit window
    pub requests_per_window: u32,
}

/// Request budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Length of the fixed window after which all counters reset
    pub window_seconds: u64,

    /// Minimum delay between two requests to the same source
    pub min_interval_ms: u64,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries before the oldest is evicted
    pub max_entries: usize,

    /// Search results time-to-live
    pub search_results_seconds: u64,

    /// Details time-to-live
    pub details_seconds: u64,

    /// Trending and new releases time-to-live
    pub trending_seconds: u64,

    /// Top rated time-to-live
    pub top_rated_seconds: u64,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Queries shorter than this are rejected
    pub min_query_length: usize,

    /// Results returned per page (also the per-source page size)
    pub page_size: usize,

    /// Maximum live suggestions returned
    pub max_suggestions: usize,
}

/// Search history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// History file (relative to data directory or absolute)
    pub file: String,

    /// Maximum remembered queries
    pub max_entries: usize,
}

/// Fallback values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Image URI used when a source omits cover art
    pub fallback_image: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            min_interval_ms: 100,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            search_results_seconds: 5 * 60,
            details_seconds: 30 * 60,
            trending_seconds: 60 * 60,
            top_rated_seconds: 6 * 60 * 60,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_length: 2,
            page_size: 12,
            max_suggestions: 8,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: "search_history.json".to_string(),
            max_entries: 20,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            fallback_image: DEFAULT_FALLBACK_IMAGE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            sources: SourcesConfig {
                user_agent: concat!("anime-hub/", env!("CARGO_PKG_VERSION")).to_string(),
                timeout_seconds: 30,
                anilist: EndpointConfig {
                    endpoint: "https://graphql.anilist.co".to_string(),
                    requests_per_window: 90,
                },
                jikan: EndpointConfig {
                    endpoint: "https://api.jikan.moe/v4".to_string(),
                    requests_per_window: 60,
                },
                omdb: OmdbConfig {
                    endpoint: "https://www.omdbapi.com".to_string(),
                    api_key: "demo".to_string(),
                    requests_per_window: 1000,
                },
            },
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
            history: HistoryConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn search_results_ttl(&self) -> Duration {
        Duration::from_secs(self.search_results_seconds)
    }

    pub fn details_ttl(&self) -> Duration {
        Duration::from_secs(self.details_seconds)
    }

    pub fn trending_ttl(&self) -> Duration {
        Duration::from_secs(self.trending_seconds)
    }

    pub fn top_rated_ttl(&self) -> Duration {
        Duration::from_secs(self.top_rated_seconds)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Get the absolute path for the search history file
    pub fn history_path(&self) -> PathBuf {
        self.resolve(&self.history.file)
    }

    /// Resolve a path relative to the data directory unless it is absolute
    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}
