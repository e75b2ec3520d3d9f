//! Application configuration for the explainer.
//!
//! User config lives at `~/.explainer/explainer.toml`.
//! CLI flags override config file values, which override defaults.
//! The resolved [`AppConfig`] is built once at process start and handed to
//! each component's constructor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExplainerError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "explainer.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".explainer";

// ---------------------------------------------------------------------------
// Config structs (matching explainer.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Model routing tiers.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Ollama backend settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Local documentation index.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Web search provider.
    #[serde(default)]
    pub search: SearchConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional path prefix for the API routes (e.g. `/api/v1`). Empty mounts at root.
    #[serde(default)]
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_prefix: String::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}

/// `[models]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model for short, shallow tasks (classification).
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Model for deep reasoning and synthesis.
    #[serde(default = "default_powerful_model")]
    pub powerful_model: String,

    /// Input length (chars) at which shallow tasks are promoted to the powerful model.
    #[serde(default = "default_long_input_threshold")]
    pub long_input_threshold: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            fast_model: default_fast_model(),
            powerful_model: default_powerful_model(),
            long_input_threshold: default_long_input_threshold(),
        }
    }
}

fn default_fast_model() -> String {
    "llama3.2:1b".into()
}
fn default_powerful_model() -> String {
    "llama3.2:3b".into()
}
fn default_long_input_threshold() -> usize {
    1200
}

/// `[ollama]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_ollama_timeout")]
    pub timeout_secs: u64,

    /// Maximum tokens to generate per call (`num_predict`).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature used when a caller passes a non-finite value.
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            timeout_secs: default_ollama_timeout(),
            max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}
fn default_ollama_timeout() -> u64 {
    120
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory scanned for `*.md` / `*.txt` source documents.
    #[serde(default = "default_documents_path")]
    pub documents_path: PathBuf,

    /// libSQL database file holding the persisted chunk index.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of hits returned per search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            documents_path: default_documents_path(),
            index_path: default_index_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

fn default_documents_path() -> PathBuf {
    PathBuf::from("./data/documents")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/vectordb/index.db")
}
fn default_chunk_size() -> usize {
    600
}
fn default_chunk_overlap() -> usize {
    80
}
fn default_top_k() -> usize {
    3
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the HTML search endpoint.
    #[serde(default = "default_search_url")]
    pub base_url: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Attempts made while the provider keeps rate-limiting.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before retry `n` is `backoff_base_ms * 2^n`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            max_results: default_max_results(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_url() -> String {
    "https://html.duckduckgo.com".into()
}
fn default_max_results() -> usize {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_search_timeout() -> u64 {
    15
}

impl AppConfig {
    /// Reject settings that would make a component misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.chunk_size == 0 {
            return Err(ExplainerError::config("retrieval.chunk_size must be positive"));
        }
        if r.chunk_overlap >= r.chunk_size {
            return Err(ExplainerError::config(format!(
                "retrieval.chunk_overlap ({}) must be smaller than chunk_size ({})",
                r.chunk_overlap, r.chunk_size
            )));
        }
        if r.top_k == 0 {
            return Err(ExplainerError::config("retrieval.top_k must be positive"));
        }
        if self.server.port == 0 {
            return Err(ExplainerError::config("server.port must be non-zero"));
        }
        let prefix = &self.server.api_prefix;
        if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
            return Err(ExplainerError::config(format!(
                "server.api_prefix '{prefix}' must start with '/' and not end with '/'"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.explainer/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExplainerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.explainer/explainer.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ExplainerError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ExplainerError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ExplainerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ExplainerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ExplainerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
