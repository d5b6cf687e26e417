//! Embedding and text-generation services.
//!
//! Both are blocking request/response calls. Implementations:
//! [`OllamaBackend`] talks HTTP to an Ollama server, [`HashingEmbedder`]
//! embeds offline, and [`ScriptedGenerator`] returns canned replies.

pub mod hashing;
pub mod ollama;
pub mod scripted;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaBackend;
pub use scripted::ScriptedGenerator;

use crate::config::{BackendConfig, BackendKind};
use crate::error::{Result, TrailError};

/// Turns text into a fixed-length vector. Identical input gives identical output.
pub trait Embedder: Send + Sync {
    /// Embed one text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Vector length, when known before the first call.
    fn dimension(&self) -> Option<usize>;

    /// Model identifier; stores refuse to mix vectors from different models.
    fn model_name(&self) -> &str;
}

/// Produces text from a prompt. May be slow and non-deterministic.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Build the embedder selected by `config.kind`.
pub fn embedder_from_config(config: &BackendConfig) -> Box<dyn Embedder> {
    match config.kind {
        BackendKind::Ollama => Box::new(OllamaBackend::from_config(config)),
        BackendKind::Hashing => Box::new(HashingEmbedder::new(config.hashing_dimension)),
    }
}

/// Build the generator selected by `config.kind`.
///
/// The hashing backend has no generation counterpart.
pub fn generator_from_config(config: &BackendConfig) -> Result<Box<dyn Generator>> {
    match config.kind {
        BackendKind::Ollama => Ok(Box::new(OllamaBackend::from_config(config))),
        BackendKind::Hashing => Err(TrailError::Generation(
            "backend.kind = \"hashing\" has no text generation; use an Ollama backend".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_config_builds_offline_embedder() {
        let config = BackendConfig {
            kind: BackendKind::Hashing,
            hashing_dimension: 64,
            ..BackendConfig::default()
        };
        let embedder = embedder_from_config(&config);
        assert_eq!(embedder.dimension(), Some(64));
        assert_eq!(embedder.embed("budget").unwrap().len(), 64);
        assert!(generator_from_config(&config).is_err());
    }

    #[test]
    fn test_ollama_config_uses_model_names() {
        let config = BackendConfig::default();
        assert_eq!(embedder_from_config(&config).model_name(), "all-minilm");
        assert_eq!(generator_from_config(&config).unwrap().model_name(), "llama3.2");
    }
}
