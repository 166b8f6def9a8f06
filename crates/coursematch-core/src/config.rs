use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CourseMatchError, Result};
use crate::types::Metric;

/// Top-level configuration for the course matcher.
///
/// Loaded from `~/.coursematch/config.toml` by default. Every section falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseMatchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
}

impl CourseMatchConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CourseMatchConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject settings that would make the engine unusable.
    pub fn validate(&self) -> Result<()> {
        if self.provider.model.trim().is_empty() {
            return Err(CourseMatchError::Config(
                "provider.model must not be empty".to_string(),
            ));
        }
        if self.provider.timeout_secs == 0 {
            return Err(CourseMatchError::Config(
                "provider.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.provider.mock_dimensions == 0 {
            return Err(CourseMatchError::Config(
                "provider.mock_dimensions must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(CourseMatchError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(CourseMatchError::Config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        if self.index.default_top_k == 0 {
            return Err(CourseMatchError::Config(
                "index.default_top_k must be at least 1".to_string(),
            ));
        }
        if self.index.build_concurrency == 0 {
            return Err(CourseMatchError::Config(
                "index.build_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Which embedding backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// An OpenAI-compatible `/embeddings` HTTP endpoint.
    #[default]
    Openai,
    /// Deterministic offline embeddings (no network).
    Mock,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Base URL of the OpenAI-compatible API, without the `/embeddings` suffix.
    pub base_url: String,
    /// Embedding model identifier. The index remembers it.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Requested output dimension, for models that support shortening.
    pub dimensions: Option<usize>,
    /// Timeout for a single provider attempt, in seconds.
    pub timeout_secs: u64,
    /// Vector size produced by the mock provider.
    pub mock_dimensions: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Openai,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: None,
            timeout_secs: 30,
            mock_dimensions: 256,
        }
    }
}

/// Retry and backoff settings for rate-limited provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per text, including the first one.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `base * 2^n` plus jitter.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay.
    pub max_delay_ms: u64,
    /// Maximum random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub metric: Metric,
    /// Number of recommendations returned when the caller does not say.
    pub default_top_k: usize,
    /// Maximum number of embedding calls in flight while building.
    pub build_concurrency: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: Metric::SquaredEuclidean,
            default_top_k: 1,
            build_concurrency: 4,
        }
    }
}

/// Where the course catalog comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// JSON file with an array of course records. Empty means the built-in
    /// demo catalog.
    pub path: String,
}
