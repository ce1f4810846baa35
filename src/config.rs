/// Configuration module for errorrag.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedder::Embedder;
use crate::embedder::mock::MockEmbedder;
use crate::embedder::openai::OpenAiEmbedder;
use crate::pipeline::{DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD, DEFAULT_TOP_K, Thresholds};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

// ── Default value functions ──────────────────────────────────────────

fn default_csv_path() -> String {
    "data/errors.csv".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_high_threshold() -> Option<f32> {
    Some(DEFAULT_HIGH_THRESHOLD)
}

fn default_low_threshold() -> f32 {
    DEFAULT_LOW_THRESHOLD
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_provider() -> Provider {
    Provider::OpenAi
}

fn default_model_name() -> String {
    "text-embedding-3-small".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    3
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_csv_path")]
    pub csv_path: String,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed to call the HTTP API from a browser. `"*"` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// `null` disables confidence gating.
    #[serde(default = "default_high_threshold")]
    pub high_threshold: Option<f32>,

    #[serde(default = "default_low_threshold")]
    pub low_threshold: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Mock,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,

    #[serde(default = "default_model_name")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Falls back to `$OPENAI_API_KEY` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Expected vector length, checked on every response.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Also send `dimensions` in the request. Only newer OpenAI models accept it.
    #[serde(default)]
    pub request_dimensions: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total requests per embedding call, the first one included.
    #[serde(default = "default_max_attempts", alias = "max_retries")]
    pub max_attempts: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            bind: default_bind(),
            cors_origins: default_cors_origins(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
            top_k: default_top_k(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model_name(),
            base_url: default_base_url(),
            api_key: None,
            dimensions: default_dimensions(),
            request_dimensions: false,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        anyhow::ensure!(!self.csv_path.trim().is_empty(), "csv_path must be set");
        anyhow::ensure!(r.top_k > 0, "retrieval.top_k must be positive");
        anyhow::ensure!(
            (-1.0..=1.0).contains(&r.low_threshold),
            "retrieval.low_threshold must be within [-1, 1]"
        );
        if let Some(high) = r.high_threshold {
            anyhow::ensure!(
                (-1.0..=1.0).contains(&high),
                "retrieval.high_threshold must be within [-1, 1]"
            );
            anyhow::ensure!(
                r.low_threshold <= high,
                "retrieval.low_threshold must not exceed high_threshold"
            );
        }
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(
            self.cors_origins.iter().all(|o| !o.trim().is_empty()),
            "cors_origins must not contain empty entries"
        );
        Ok(())
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(
            self.retrieval.high_threshold,
            self.retrieval.low_threshold,
        )
    }
}

impl EmbeddingConfig {
    /// API key from the config file, else from the environment.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// Construct the configured embedding provider.
    pub fn build_embedder(&self) -> Result<Box<dyn Embedder>> {
        match self.provider {
            Provider::Mock => {
                info!("Using mock embedder ({} dimensions)", self.dimensions);
                Ok(Box::new(MockEmbedder::new(self.dimensions)))
            }
            Provider::OpenAi => {
                let api_key = self.resolve_api_key().with_context(|| {
                    format!("no embedding API key: set embedding.api_key or ${API_KEY_ENV}")
                })?;
                info!("Using embedding model {} at {}", self.model, self.base_url);
                let embedder = OpenAiEmbedder::new(
                    &api_key,
                    &self.base_url,
                    &self.model,
                    self.dimensions,
                    Duration::from_secs(self.timeout_secs.max(1)),
                    self.max_attempts,
                )
                .context("failed to initialize embedding client")?
                .request_dimensions(self.request_dimensions);
                Ok(Box::new(embedder))
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.csv_path, "data/errors.csv");
        assert_eq!(config.bind, "127.0.0.1:8000");
        assert_eq!(config.retrieval.high_threshold, Some(0.60));
        assert_eq!(config.retrieval.low_threshold, 0.45);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.embedding.provider, Provider::OpenAi);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.dimensions, 1536);
        assert!(!config.embedding.request_dimensions);
        assert_eq!(config.embedding.max_attempts, 3);
        assert_eq!(config.cors_origins, vec!["*"]);
    }

    #[test]
    fn test_max_retries_key_still_accepted() {
        let json = r#"{"embedding": {"max_retries": 5}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.embedding.max_attempts, 5);
    }

    #[test]
    fn test_request_dimensions_from_json() {
        let json = r#"{"embedding": {"dimensions": 512, "request_dimensions": true}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.embedding.dimensions, 512);
        assert!(config.embedding.request_dimensions);
    }

    #[test]
    fn test_validate_empty_cors_origin() {
        let mut config = Config::default();
        config.cors_origins = vec![" ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"csv_path": "./checklist.csv", "embedding": {"provider": "mock", "dimensions": 64}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.csv_path, "./checklist.csv");
        assert_eq!(config.embedding.provider, Provider::Mock);
        assert_eq!(config.embedding.dimensions, 64);
        // Other fields should have defaults
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn test_null_high_threshold_disables_gate() {
        let json = r#"{"retrieval": {"high_threshold": null}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.retrieval.high_threshold, None);
        assert_eq!(config.thresholds(), Thresholds::new(None, 0.45));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let json = r#"{"embedding": {"provider": "cohere"}}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_top_k() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_low_above_high() {
        let mut config = Config::default();
        config.retrieval.low_threshold = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut config = Config::default();
        config.retrieval.high_threshold = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_csv_path() {
        let mut config = Config::default();
        config.csv_path = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_mock_embedder() {
        let mut config = Config::default();
        config.embedding.provider = Provider::Mock;
        config.embedding.dimensions = 16;
        let embedder = config.embedding.build_embedder().unwrap();
        assert_eq!(embedder.dimensions(), 16);
        assert_eq!(embedder.embed("hello").unwrap().len(), 16);
    }

    #[test]
    fn test_config_api_key_wins() {
        let mut embedding = EmbeddingConfig::default();
        embedding.api_key = Some("from-file".to_string());
        assert_eq!(embedding.resolve_api_key().as_deref(), Some("from-file"));
    }

    #[test]
    fn test_load_missing_custom_path_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.retrieval.top_k, 3);
        assert!(!path.exists(), "template only written for the default path");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.csv_path = "elsewhere.csv".to_string();
        config.retrieval.high_threshold = None;
        config.save(path).unwrap();

        let loaded = Config::load(path).unwrap();
        assert_eq!(loaded.csv_path, "elsewhere.csv");
        assert_eq!(loaded.retrieval.high_threshold, None);
    }

    #[test]
    fn test_load_invalid_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.csv_path, "data/errors.csv");
    }
}
