use crate::ai::backends::{ApiSettings, LLMBackend, OllamaBackend, OpenAICompatibleBackend};
use crate::ai::prompt::GenerationRequest;
use crate::ai::response::clean_response;
use crate::config::{ApiType, Config};
use crate::error::ApiError;
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;

/// Front door to the model-serving API
///
/// Picks the backend that matches the configured [`ApiType`] and cleans the
/// generated text before handing it back. Requests are never retried.
#[derive(Clone)]
pub struct ApiClient {
    backend: Arc<dyn LLMBackend>,
}

impl ApiClient {
    /// Create a client speaking the dialect named in `settings`
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let backend: Arc<dyn LLMBackend> = match settings.api_type {
            ApiType::Ollama => Arc::new(OllamaBackend::new(settings)?),
            ApiType::OpenAICompatible => Arc::new(OpenAICompatibleBackend::new(settings)?),
        };
        Ok(Self { backend })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&ApiSettings::from(config))
    }

    /// Create a client around an existing backend
    pub fn with_backend(backend: Arc<dyn LLMBackend>) -> Self {
        Self { backend }
    }

    pub fn api_type(&self) -> ApiType {
        self.backend.api_type()
    }

    /// Generate one prompt
    ///
    /// # Errors
    ///
    /// * `Status` for non-2xx replies
    /// * `InvalidResponse` for bodies that do not match the dialect
    /// * `EmptyResponse` when nothing is left after cleanup
    /// * `Network` / `Timeout` when the server cannot be reached in time
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        info!(
            "Generating via {} ({} examples)",
            self.backend.api_type(),
            request.examples.len()
        );
        let started = Instant::now();

        let raw = self.backend.generate(request).await.map_err(|e| {
            error!("Generation failed after {:?}: {}", started.elapsed(), e);
            e
        })?;

        let text = clean_response(&raw);
        if text.is_empty() {
            return Err(ApiError::EmptyResponse);
        }
        info!(
            "Generation finished in {:?} ({} chars)",
            started.elapsed(),
            text.len()
        );
        Ok(text)
    }

    /// List the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        let models = self.backend.list_models().await?;
        info!("Found {} models ({})", models.len(), self.backend.api_type());
        Ok(models)
    }
}

/// One-shot generation with the default model and timeout
///
/// Convenience wrapper over [`ApiClient`] for callers that only have the
/// connection details at hand.
pub async fn generate(
    endpoint: &str,
    api_type: ApiType,
    api_key: &str,
    system_prompt: &str,
    examples: &[String],
    user_topic: &str,
) -> Result<String, ApiError> {
    let client = ApiClient::new(&ApiSettings::new(endpoint, api_type, api_key))?;
    let request = GenerationRequest::new(system_prompt, examples.to_vec(), user_topic);
    client.generate(&request).await
}
