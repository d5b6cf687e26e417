//! Ollama HTTP backend: `/api/embed` for embeddings, `/api/generate` for answers.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{Embedder, Generator};
use crate::config::BackendConfig;
use crate::error::{Result, TrailError};

/// Generation calls slower than this are logged.
const SLOW_GENERATION: Duration = Duration::from_secs(30);

/// Blocking client for an Ollama server.
pub struct OllamaBackend {
    agent: ureq::Agent,
    base_url: String,
    embed_model: String,
    gen_model: String,
    embed_timeout: Duration,
    gen_timeout: Duration,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaBackend {
    pub fn new(
        base_url: impl Into<String>,
        embed_model: impl Into<String>,
        gen_model: impl Into<String>,
    ) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            embed_model: embed_model.into(),
            gen_model: gen_model.into(),
            embed_timeout: Duration::from_secs(60),
            gen_timeout: Duration::from_secs(300),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let mut backend = Self::new(&config.base_url, &config.embed_model, &config.gen_model);
        backend.embed_timeout = Duration::from_secs(config.embed_timeout_secs);
        backend.gen_timeout = Duration::from_secs(config.gen_timeout_secs);
        backend
    }

    fn post<T: Serialize>(
        &self,
        path: &str,
        timeout: Duration,
        body: &T,
    ) -> std::result::Result<ureq::Response, String> {
        let url = format!("{}{path}", self.base_url);
        match self.agent.post(&url).timeout(timeout).send_json(body) {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(format!("Ollama returned {code}: {body}"))
            }
            Err(e) => Err(format!("Request to {url} failed: {e}")),
        }
    }
}

impl Embedder for OllamaBackend {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.embed_model,
            input: vec![text],
        };
        let resp = self
            .post("/api/embed", self.embed_timeout, &request)
            .map_err(TrailError::Embedding)?;
        let parsed: EmbedResponse = resp
            .into_json()
            .map_err(|e| TrailError::Embedding(format!("Failed to parse response: {e}")))?;

        parsed
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TrailError::Embedding("Ollama returned no embedding".into()))
    }

    fn dimension(&self) -> Option<usize> {
        None
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}

impl Generator for OllamaBackend {
    fn generate(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let request = GenerateRequest {
            model: &self.gen_model,
            prompt,
            stream: false,
        };
        let resp = self
            .post("/api/generate", self.gen_timeout, &request)
            .map_err(TrailError::Generation)?;
        let parsed: GenerateResponse = resp
            .into_json()
            .map_err(|e| TrailError::Generation(format!("Failed to parse response: {e}")))?;

        let elapsed = start.elapsed();
        debug!(model = %self.gen_model, duration_ms = elapsed.as_millis() as u64, "Generation complete");
        if elapsed > SLOW_GENERATION {
            warn!(duration_ms = elapsed.as_millis() as u64, "Slow generation");
        }
        Ok(parsed.response)
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}
