//! Text generation backed by an Ollama server.
//!
//! The model is checked (and optionally pulled) once at startup; each
//! insight is then a single non-streaming `/api/generate` call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by the text generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Cannot connect to Ollama at {0}. Is Ollama running?")]
    Connect(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to send request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Ollama API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse Ollama response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Model '{model}' is not available: {detail}")]
    ModelUnavailable { model: String, detail: String },
}

/// Produces narrative text for a prompt.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    /// Generate one response of at most `max_output_length` tokens.
    async fn generate(&self, prompt: &str, max_output_length: u32)
        -> Result<String, GenerationError>;

    /// Name of the model behind this generator.
    fn model_name(&self) -> &str;
}

/// Connection settings for [`OllamaGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    /// Per-request timeout. `None` waits as long as the backend takes.
    pub timeout_seconds: Option<u64>,
    /// Pull the model when the server does not have it yet.
    pub pull_missing: bool,
}

impl From<&crate::config::ModelConfig> for GeneratorSettings {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            ollama_url: config.ollama_url.trim_end_matches('/').to_string(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            pull_missing: config.pull_missing,
        }
    }
}

#[derive(Debug, Serialize)]
struct ModelRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: String,
}

/// Ollama generate API request.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama generate API response.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[allow(dead_code)] // Always true for non-streaming requests
    #[serde(default)]
    done: bool,
}

/// Insight generator that delegates to an Ollama model.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    settings: GeneratorSettings,
    http_client: reqwest::Client,
}

impl OllamaGenerator {
    /// Build the generator without contacting the server.
    pub fn new(settings: GeneratorSettings) -> Result<Self, GenerationError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().map_err(GenerationError::Request)?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    /// Build the generator and make sure the model is ready to serve.
    pub async fn connect(settings: GeneratorSettings) -> Result<Self, GenerationError> {
        info!(
            "Connecting to Ollama at {} with model {}",
            settings.ollama_url, settings.model_name
        );

        let generator = Self::new(settings)?;
        generator.ensure_model().await?;
        Ok(generator)
    }

    /// Check that the model exists, pulling it if allowed.
    async fn ensure_model(&self) -> Result<(), GenerationError> {
        let url = format!("{}/api/show", self.settings.ollama_url);
        let response = self
            .send(&url, &ModelRequest {
                model: &self.settings.model_name,
                stream: None,
            })
            .await?;

        if response.status().is_success() {
            debug!("Model {} is available", self.settings.model_name);
            return Ok(());
        }

        if response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(api_error(response).await);
        }

        if !self.settings.pull_missing {
            return Err(GenerationError::ModelUnavailable {
                model: self.settings.model_name.clone(),
                detail: "not found on server and pulling is disabled".to_string(),
            });
        }

        warn!(
            "Model {} not found on server, pulling it now",
            self.settings.model_name
        );
        self.pull_model().await
    }

    async fn pull_model(&self) -> Result<(), GenerationError> {
        let url = format!("{}/api/pull", self.settings.ollama_url);
        let response = self
            .send(&url, &ModelRequest {
                model: &self.settings.model_name,
                stream: Some(false),
            })
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let pull: PullResponse = response.json().await.map_err(GenerationError::Decode)?;
        if pull.status != "success" {
            return Err(GenerationError::ModelUnavailable {
                model: self.settings.model_name.clone(),
                detail: format!("pull finished with status '{}'", pull.status),
            });
        }

        info!("Pulled model {}", self.settings.model_name);
        Ok(())
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response, GenerationError> {
        self.http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.settings.timeout_seconds.unwrap_or_default())
                } else if e.is_connect() {
                    GenerationError::Connect(self.settings.ollama_url.clone())
                } else {
                    GenerationError::Request(e)
                }
            })
    }
}

#[async_trait]
impl InsightGenerator for OllamaGenerator {
    async fn generate(
        &self,
        prompt: &str,
        max_output_length: u32,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.settings.ollama_url);
        let request = GenerateRequest {
            model: &self.settings.model_name,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.settings.temperature,
                num_predict: max_output_length,
            },
        };

        debug!("Sending generate request ({} chars)", prompt.len());
        let response = self.send(&url, &request).await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let generated: GenerateResponse =
            response.json().await.map_err(GenerationError::Decode)?;

        Ok(generated.response.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.settings.model_name
    }
}

async fn api_error(response: reqwest::Response) -> GenerationError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    GenerationError::Api { status, body }
}
