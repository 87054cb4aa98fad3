//! TOML-based configuration for Filament.
//!
//! Supports a config file (filament.toml) with environment variable
//! expansion. Every field has a default, so running without a file
//! reproduces the stock pipeline constants.
//!
//! Example configuration:
//! ```toml
//! [model]
//! endpoint = "https://api.groq.com/openai/v1/chat/completions"
//! model = "deepseek-r1-distill-llama-70b"
//! api_key_env = "GROQ_API_KEY"
//! max_retries = 3
//!
//! [extraction]
//! concurrent = true
//! table_batch_size = 8
//! pair_batch_size = 5
//!
//! [output]
//! base_dir = "lineage_output"
//!
//! [cache]
//! enabled = true
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default config file name, searched in the working directory.
const CONFIG_FILE: &str = "filament.toml";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Model endpoint configuration.
    pub model: ModelSettings,

    /// Four-pass extraction tuning.
    pub extraction: ExtractionSettings,

    /// Output artifact layout.
    pub output: OutputSettings,

    /// Incremental-processing cache.
    pub cache: CacheSettings,
}

impl Settings {
    /// Load settings from an explicit path.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `filament.toml` from the working directory, or defaults when
    /// the file does not exist.
    pub fn load_or_default() -> Result<Self, SettingsError> {
        let path = PathBuf::from(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Model endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelSettings {
    /// OpenAI-compatible chat completions URL (supports ${ENV_VAR}
    /// expansion).
    pub endpoint: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Attempts per call before giving up.
    pub max_retries: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Completion token budget.
    pub max_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "deepseek-r1-distill-llama-70b".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            max_retries: 3,
            temperature: 0.1,
            max_tokens: 64000,
        }
    }
}

impl ModelSettings {
    /// Get the endpoint with environment variables expanded.
    pub fn resolved_endpoint(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.endpoint)
    }
}

/// Four-pass extraction tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Issue independent calls within a pass concurrently.
    pub concurrent: bool,

    /// Pass-2 tables per concurrent batch.
    pub table_batch_size: usize,

    /// Pause between Pass-2 batches, in seconds.
    pub table_batch_pause_secs: u64,

    /// Pass-4 table pairs per batch call.
    pub pair_batch_size: usize,

    /// Fixed delay before every Pass-4 batch call, in seconds.
    pub pair_call_delay_secs: u64,

    /// Consecutive batch failures that open the circuit breaker.
    pub breaker_failure_threshold: u32,

    /// Breaker cooldown before attempts resume, in seconds.
    pub breaker_cooldown_secs: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            concurrent: true,
            table_batch_size: 8,
            table_batch_pause_secs: 5,
            pair_batch_size: 5,
            pair_call_delay_secs: 2,
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 300,
        }
    }
}

/// Output artifact layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Base directory for artifacts and the cache.
    pub base_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("lineage_output"),
        }
    }
}

/// Incremental-processing cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When false every file is processed fresh and no entries are read.
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var regex"));

/// Expand `${ENV_VAR}` references in a string.
pub fn expand_env_vars(input: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(input.len());
    let mut last = 0;

    for caps in ENV_VAR.captures_iter(input) {
        let whole = caps.get(0).expect("capture 0 always present");
        let name = &caps[1];
        let value = env::var(name).map_err(|_| SettingsError::MissingEnvVar(name.to_string()))?;
        result.push_str(&input[last..whole.start()]);
        result.push_str(&value);
        last = whole.end();
    }
    result.push_str(&input[last..]);
    Ok(result)
}
