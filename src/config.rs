//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILTRAIL_CONFIG` (environment variable)
//! 2. `~/.config/mailtrail/config.toml` (Linux)
//!    `~/Library/Application Support/mailtrail/config.toml` (macOS)
//!    `%APPDATA%\mailtrail\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::parser::splitter::SplitStrategy;
use crate::query::SearchKind;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Embedding and generation services.
    pub backend: BackendConfig,
    /// Document store location and caching.
    pub store: StoreConfig,
    /// Single-email parsing.
    pub parser: ParserConfig,
    /// Multi-message blob splitting.
    pub splitter: SplitterConfig,
    /// Retrieval defaults for questions.
    pub retrieval: RetrievalConfig,
    /// Evaluation log locations.
    pub evaluation: EvaluationConfig,
    /// Credit bookkeeping for interactive sessions.
    pub session: SessionConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the data directory (store, logs).
    pub data_dir: Option<PathBuf>,
}

/// Which embedding / generation implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A local or remote Ollama server.
    Ollama,
    /// Offline feature-hashing embedder; generation is unavailable.
    Hashing,
}

/// Embedding and generation services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Embedding model name.
    pub embed_model: String,
    /// Generation model name.
    pub gen_model: String,
    pub embed_timeout_secs: u64,
    pub gen_timeout_secs: u64,
    /// Vector length produced by the hashing embedder.
    pub hashing_dimension: usize,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store directory (default: `<data_dir>/store`).
    pub path: Option<PathBuf>,
    /// Number of query embeddings kept in the LRU cache.
    pub query_cache_size: usize,
}

/// Single-email parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Reject header lines without a colon instead of ignoring them.
    pub strict: bool,
    /// Reverse quote trails so the latest reply comes first.
    pub reorder_trails: bool,
    /// Literal marker separating quoted messages inside a body.
    pub trail_marker: String,
}

/// Multi-message blob splitting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub strategy: SplitStrategy,
    /// Segments with fewer characters than this are dropped as noise.
    pub min_segment_len: usize,
    /// Maximum characters of subject used in segment labels.
    pub label_max_len: usize,
}

/// Retrieval defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub search: SearchKind,
    /// Documents handed to the model.
    pub top_k: usize,
    /// Candidates considered by MMR before diversification.
    pub fetch_k: usize,
    /// MMR trade-off: 1.0 = pure relevance, 0.0 = pure diversity.
    pub mmr_lambda: f32,
}

/// Evaluation log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub json_log: PathBuf,
    pub csv_log: PathBuf,
    /// Compute the hallucination ratio for every case.
    pub hallucination: bool,
}

/// Interactive session credits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub initial_credits: u32,
    pub top_up: u32,
    pub query_cost: u32,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            data_dir: None,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            embed_model: "all-minilm".to_string(),
            gen_model: "llama3.2".to_string(),
            embed_timeout_secs: 60,
            gen_timeout_secs: 300,
            hashing_dimension: 384,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            query_cache_size: 64,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict: false,
            reorder_trails: true,
            trail_marker: crate::parser::trail::DEFAULT_MARKER.to_string(),
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            strategy: SplitStrategy::SeparatorAnchored,
            min_segment_len: crate::parser::splitter::DEFAULT_MIN_SEGMENT_LEN,
            label_max_len: 60,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search: SearchKind::Mmr,
            top_k: 5,
            fetch_k: 20,
            mmr_lambda: 0.5,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            json_log: PathBuf::from("rag_eval_results.json"),
            csv_log: PathBuf::from("rag_eval_results.csv"),
            hallucination: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_credits: crate::session::DEFAULT_CREDITS,
            top_up: 5,
            query_cost: 1,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location and return the path written.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    save_config_to(&path, config)?;
    Ok(path)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(path: &Path, config: &Config) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILTRAIL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailtrail").join("config.toml"))
}

/// Return the data directory for the store and logs.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtrail")
}

/// Return the document store directory.
pub fn store_dir(config: &Config) -> PathBuf {
    match config.store.path {
        Some(ref dir) => dir.clone(),
        None => data_dir(config).join("store"),
    }
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    data_dir(config).join("mailtrail.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.backend.kind, BackendKind::Ollama);
        assert_eq!(cfg.backend.gen_model, "llama3.2");
        assert_eq!(cfg.splitter.strategy, SplitStrategy::SeparatorAnchored);
        assert_eq!(cfg.splitter.min_segment_len, 50);
        assert_eq!(cfg.retrieval.search, SearchKind::Mmr);
        assert_eq!(cfg.parser.trail_marker, "\n---\n");
        assert_eq!(cfg.session.initial_credits, 10);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.backend.base_url, cfg.backend.base_url);
        assert_eq!(parsed.parser.trail_marker, cfg.parser.trail_marker);
        assert_eq!(parsed.retrieval.fetch_k, cfg.retrieval.fetch_k);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[backend]
kind = "hashing"

[splitter]
strategy = "header"
min_segment_len = 30
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.backend.kind, BackendKind::Hashing);
        assert_eq!(cfg.splitter.strategy, SplitStrategy::HeaderAnchored);
        assert_eq!(cfg.splitter.min_segment_len, 30);
        // Other fields use defaults
        assert_eq!(cfg.splitter.label_max_len, 60);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert!(cfg.evaluation.hallucination);
    }

    #[test]
    fn test_save_config_to_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.backend.kind = BackendKind::Hashing;
        cfg.retrieval.top_k = 3;

        save_config_to(&path, &cfg).unwrap();

        let parsed: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.backend.kind, BackendKind::Hashing);
        assert_eq!(parsed.retrieval.top_k, 3);
    }

    #[test]
    fn test_store_dir_override() {
        let mut cfg = Config::default();
        cfg.store.path = Some(PathBuf::from("/tmp/trail-store"));
        assert_eq!(store_dir(&cfg), PathBuf::from("/tmp/trail-store"));
    }
}
