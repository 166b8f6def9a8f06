//! CLI argument definitions for the coursematch binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use coursematch_core::config::{CourseMatchConfig, ProviderKind};
use coursematch_core::types::Metric;

/// Recommend the course that best matches what you want to learn.
#[derive(Parser, Debug)]
#[command(name = "coursematch", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// JSON file with the course catalog. Defaults to the built-in catalog.
    #[arg(long = "corpus")]
    pub corpus: Option<PathBuf>,

    /// Embedding provider.
    #[arg(short = 'p', long = "provider", value_enum)]
    pub provider: Option<ProviderArg>,

    /// Embedding model name.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Ranking metric.
    #[arg(long = "metric", value_enum)]
    pub metric: Option<MetricArg>,

    /// Number of courses to show per query.
    #[arg(short = 'k', long = "top-k")]
    pub top_k: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Print results as JSON instead of text.
    #[arg(long = "json")]
    pub json: bool,

    /// What you want to learn. Reads queries from stdin when omitted.
    pub query: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Openai,
    Mock,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Openai => ProviderKind::Openai,
            ProviderArg::Mock => ProviderKind::Mock,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    SquaredEuclidean,
    Cosine,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::SquaredEuclidean => Metric::SquaredEuclidean,
            MetricArg::Cosine => Metric::Cosine,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > COURSEMATCH_CONFIG env var > ~/.coursematch/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("COURSEMATCH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// The query given on the command line, if any.
    pub fn query_text(&self) -> Option<String> {
        let text = self.query.join(" ");
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Resolve the log level: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &CourseMatchConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    /// Fold command-line overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut CourseMatchConfig) {
        if let Some(provider) = self.provider {
            config.provider.kind = provider.into();
        }
        if let Some(ref model) = self.model {
            config.provider.model = model.clone();
        }
        if let Some(metric) = self.metric {
            config.index.metric = metric.into();
        }
        if let Some(k) = self.top_k {
            config.index.default_top_k = k;
        }
        if let Some(ref path) = self.corpus {
            config.corpus.path = path.to_string_lossy().to_string();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".coursematch").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".coursematch").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_words_are_joined() {
        let args = CliArgs::try_parse_from(["coursematch", "learn", "sql", "joins"]).unwrap();
        assert_eq!(args.query_text().as_deref(), Some("learn sql joins"));

        let args = CliArgs::try_parse_from(["coursematch"]).unwrap();
        assert_eq!(args.query_text(), None);
    }

    #[test]
    fn test_overrides_win_over_config() {
        let args = CliArgs::try_parse_from([
            "coursematch",
            "--provider",
            "mock",
            "--metric",
            "cosine",
            "-k",
            "3",
            "--model",
            "custom-model",
            "--corpus",
            "courses.json",
        ])
        .unwrap();

        let mut config = CourseMatchConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.provider.kind, ProviderKind::Mock);
        assert_eq!(config.provider.model, "custom-model");
        assert_eq!(config.index.metric, Metric::Cosine);
        assert_eq!(config.index.default_top_k, 3);
        assert_eq!(config.corpus.path, "courses.json");
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let args = CliArgs::try_parse_from(["coursematch", "python"]).unwrap();
        let mut config = CourseMatchConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.provider.kind, ProviderKind::Openai);
        assert_eq!(config.index.metric, Metric::SquaredEuclidean);
        assert_eq!(args.resolve_log_level(&config), "info");
    }

    #[test]
    fn test_explicit_config_path() {
        let args = CliArgs::try_parse_from(["coursematch", "-c", "/tmp/cm.toml"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/cm.toml"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(CliArgs::try_parse_from(["coursematch", "--provider", "faiss"]).is_err());
    }
}
