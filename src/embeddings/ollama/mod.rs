#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::Embedder;
use crate::RagError;
use crate::config::OllamaConfig;
use crate::http::{DEFAULT_TIMEOUT_SECONDS, HttpTransport};

const DIMENSION_PROBE: &str = "dimension probe";

/// Embedding backend served by a local Ollama instance
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    batch_size: usize,
    dimension: usize,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    /// Build a client without touching the network
    #[inline]
    pub fn new(config: &OllamaConfig) -> crate::Result<Self> {
        config.validate()?;
        let base_url = config.ollama_url()?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: usize::try_from(config.batch_size).unwrap_or(usize::MAX),
            dimension: usize::try_from(config.embedding_dimension).unwrap_or(usize::MAX),
            transport: HttpTransport::new(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
        })
    }

    /// Build a client and make sure the model is served and produces vectors
    /// of at least the configured dimension
    #[inline]
    pub fn open(config: &OllamaConfig) -> crate::Result<Self> {
        let embedder = Self::new(config)?;

        embedder
            .health_check()
            .map_err(|e| RagError::ModelUnavailable(format!("{e:#}")))?;
        embedder.verify_dimension()?;

        info!(
            "Embedding model {} ready ({} dimensions)",
            embedder.model, embedder.dimension
        );
        Ok(embedder)
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;
        self.validate_model().context("Model validation failed")?;

        debug!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/version")
            .context("Failed to build ping URL")?;

        debug!("Pinging Ollama server at {}", url);
        self.transport
            .get_text(&url)
            .context("Failed to ping Ollama server")?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Validate that the configured model is available
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        debug!("Validating model: {}", self.model);

        let models = self.list_models().context("Failed to list models")?;

        if models.iter().any(|m| model_matches(&m.name, &self.model)) {
            debug!("Model {} is available", self.model);
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(anyhow::anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available_models
            ))
        }
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .transport
            .get_text(&url)
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn verify_dimension(&self) -> crate::Result<()> {
        let probe = self
            .request_embeddings(&[DIMENSION_PROBE.to_string()])
            .map_err(|e| RagError::ModelUnavailable(format!("{e:#}")))?;

        let produced = probe.first().map_or(0, Vec::len);
        if produced < self.dimension {
            return Err(RagError::Configuration(format!(
                "model {} produces {produced}-dimensional vectors, {} configured",
                self.model, self.dimension
            )));
        }
        if produced > self.dimension {
            info!(
                "Truncating {}-dimensional embeddings from {} to {}",
                produced, self.model, self.dimension
            );
        }
        Ok(())
    }

    fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            model: &self.model,
            inputs: texts,
        };

        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build embedding URL")?;

        let response_text = self
            .transport
            .post_json(&url, &request, None)
            .context("Failed to generate embeddings")?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    fn encode(&self, batch: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        let mut vectors = self
            .request_embeddings(batch)
            .with_context(|| format!("Failed to process batch of {} texts", batch.len()))
            .map_err(|e| RagError::Embedding(format!("{e:#}")))?;

        // Leading components of matryoshka-trained models form a valid smaller embedding
        for vector in &mut vectors {
            vector.truncate(self.dimension);
        }
        Ok(vectors)
    }
}

/// Ollama reports `name:tag`; an untagged configured name means `:latest`
fn model_matches(listed: &str, configured: &str) -> bool {
    listed == configured
        || (!configured.contains(':') && listed.strip_suffix(":latest") == Some(configured))
}
