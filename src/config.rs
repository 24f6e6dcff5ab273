//! Layered application settings: built-in defaults, then an optional TOML file,
//! then `FASHION__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::error::ConfigurationError;

pub const DEFAULT_CONFIG_FILE: &str = "fashion-sense.toml";
pub const ENV_PREFIX: &str = "FASHION";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub dataset: DatasetConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
    pub frontend_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub source_column: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub cache_dir: PathBuf,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    pub score_threshold: f32,
    pub top_k: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    #[serde(alias = "openai-compatible", alias = "litellm")]
    OpenAi,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    #[serde(default)]
    pub prompt_template: Option<PathBuf>,
}

impl LlmConfig {
    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, LlmProvider::Gemini) => "https://generativelanguage.googleapis.com",
            (None, LlmProvider::OpenAi) => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub max_styles: usize,
    pub idle_timeout_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl AppConfig {
    /// Builder preloaded with every default; callers add their own sources on top.
    pub fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("server.addr", "127.0.0.1:8501")?
            .set_default("server.frontend_dir", "frontend")?
            .set_default("dataset.path", "Fashion sense.csv")?
            .set_default("dataset.source_column", "Input")?
            .set_default("index.dir", "vector_database")?
            .set_default("embedding.model", "all-MiniLM-L6-v2")?
            .set_default("embedding.cache_dir", ".fastembed_cache")?
            .set_default("embedding.batch_size", 32_i64)?
            .set_default("retrieval.score_threshold", 0.7_f64)?
            .set_default("retrieval.top_k", 4_i64)?
            .set_default("llm.provider", "gemini")?
            .set_default("llm.model", "gemini-2.0-flash")?
            .set_default("llm.temperature", 0.6_f64)?
            .set_default("llm.timeout_secs", 60_i64)?
            .set_default("session.max_styles", 3_i64)?
            .set_default("session.idle_timeout_minutes", 60_i64)?
            .set_default("logging.level", "info")?;
        Ok(builder)
    }

    /// Load settings from `path` (or `$FASHION_CONFIG`, or `fashion-sense.toml`) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("FASHION_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let settings = Self::builder()?
            .add_source(File::from(file.as_path()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", file.display()))?;

        let mut cfg: Self = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if cfg.llm.api_key.is_none() {
            let var = match cfg.llm.provider {
                LlmProvider::Gemini => "GOOGLE_API_KEY",
                LlmProvider::OpenAi => "OPENAI_API_KEY",
            };
            cfg.llm.api_key = std::env::var(var).ok().filter(|k| !k.is_empty());
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let threshold = self.retrieval.score_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(ConfigurationError::InvalidSetting {
                key: "retrieval.score_threshold",
                reason: format!("{} is outside [-1, 1]", threshold),
            });
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "retrieval.top_k",
                reason: "must be at least 1".to_string(),
            });
        }
        let temperature = self.llm.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigurationError::InvalidSetting {
                key: "llm.temperature",
                reason: format!("{} is outside [0, 2]", temperature),
            });
        }
        if self.session.max_styles == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "session.max_styles",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "embedding.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
