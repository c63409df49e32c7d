use crate::ai::prompt::GenerationRequest;
use crate::ai::response::{parse_model_list, snippet, GenerationResponse};
use crate::config::{ApiType, Config, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::error::ApiError;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by [`LLMBackend`] methods
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Trait for LLM backend implementations
pub trait LLMBackend: Send + Sync {
    /// Dialect this backend speaks
    fn api_type(&self) -> ApiType;

    /// Send one generation request and return the raw generated text
    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> BackendFuture<'a, String>;

    /// Names of the models installed on the server
    fn list_models(&self) -> BackendFuture<'_, Vec<String>>;
}

/// Connection settings shared by the HTTP backends
///
/// Built from a [`Config`] snapshot so a request never observes settings
/// edited while it is running.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub endpoint: String,
    pub api_type: ApiType,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("endpoint", &self.endpoint)
            .field("api_type", &self.api_type)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ApiSettings {
    /// Settings with the default model and timeout
    pub fn new(endpoint: impl Into<String>, api_type: ApiType, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_type,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<&Config> for ApiSettings {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_type: config.api_type,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.request_timeout(),
        }
    }
}

/// HTTP plumbing shared by both dialects
#[derive(Debug)]
struct HttpTransport {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpTransport {
    fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .no_proxy()
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }

    /// Send a request and return the body of a 2xx reply
    async fn send(&self, builder: reqwest::RequestBuilder, url: &str) -> Result<String, ApiError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }
        debug!("{} answered {} ({} bytes)", url, status, body.len());
        Ok(body)
    }

    async fn post_json<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<String, ApiError> {
        let builder = self.client.post(url).json(body);
        self.send(builder, url).await
    }

    async fn get(&self, url: &str) -> Result<String, ApiError> {
        let builder = self.client.get(url);
        self.send(builder, url).await
    }

    fn transport_error(&self, url: &str, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Network {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// Ollama backend for local LLM inference
///
/// Talks to `/api/generate` with streaming disabled and reads the text from
/// the `response` field of the reply.
#[derive(Debug)]
pub struct OllamaBackend {
    http: HttpTransport,
    model: String,
}

/// Request format for Ollama API
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct OllamaRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Example
    /// ```
    /// use promptsmith::ai::{ApiSettings, OllamaBackend};
    /// use promptsmith::config::ApiType;
    ///
    /// let settings = ApiSettings::new("http://localhost:11434", ApiType::Ollama, "");
    /// let backend = OllamaBackend::new(&settings).unwrap();
    /// ```
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        Ok(Self {
            http: HttpTransport::new(settings)?,
            model: settings.model.clone(),
        })
    }

    /// Format the Ollama API endpoint URL
    fn api_url(&self) -> String {
        self.http.url("api/generate")
    }

    fn tags_url(&self) -> String {
        self.http.url("api/tags")
    }

    pub fn build_request(&self, request: &GenerationRequest) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: request.combined_prompt(),
            stream: false,
        }
    }
}

impl LLMBackend for OllamaBackend {
    fn api_type(&self) -> ApiType {
        ApiType::Ollama
    }

    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> BackendFuture<'a, String> {
        Box::pin(async move {
            let url = self.api_url();
            let body = self.build_request(request);
            debug!(
                "POST {} (model {}, prompt {} chars)",
                url,
                body.model,
                body.prompt.len()
            );
            let reply = self.http.post_json(&url, &body).await?;
            GenerationResponse::parse(ApiType::Ollama, &reply)?.into_text()
        })
    }

    fn list_models(&self) -> BackendFuture<'_, Vec<String>> {
        Box::pin(async move {
            let url = self.tags_url();
            let reply = self.http.get(&url).await?;
            parse_model_list(ApiType::Ollama, &reply)
        })
    }
}

/// Backend for servers exposing the OpenAI chat completions API
///
/// Works with LM Studio, llama.cpp server, vLLM and similar. The endpoint
/// may be given with or without a trailing `/v1`.
#[derive(Debug)]
pub struct OpenAICompatibleBackend {
    http: HttpTransport,
    model: String,
}

/// Request format for the chat completions API
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// Message format for the chat completions API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl OpenAICompatibleBackend {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        Ok(Self {
            http: HttpTransport::new(settings)?,
            model: settings.model.clone(),
        })
    }

    fn versioned_url(&self, path: &str) -> String {
        if self.http.endpoint.ends_with("/v1") {
            self.http.url(path)
        } else {
            self.http.url(&format!("v1/{}", path))
        }
    }

    /// Format the chat completions endpoint URL
    fn api_url(&self) -> String {
        self.versioned_url("chat/completions")
    }

    fn models_url(&self) -> String {
        self.versioned_url("models")
    }

    pub fn build_request(&self, request: &GenerationRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_message(),
                },
            ],
            stream: false,
        }
    }
}

impl LLMBackend for OpenAICompatibleBackend {
    fn api_type(&self) -> ApiType {
        ApiType::OpenAICompatible
    }

    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> BackendFuture<'a, String> {
        Box::pin(async move {
            let url = self.api_url();
            let body = self.build_request(request);
            debug!(
                "POST {} (model {}, {} messages)",
                url,
                body.model,
                body.messages.len()
            );
            let reply = self.http.post_json(&url, &body).await?;
            GenerationResponse::parse(ApiType::OpenAICompatible, &reply)?.into_text()
        })
    }

    fn list_models(&self) -> BackendFuture<'_, Vec<String>> {
        Box::pin(async move {
            let url = self.models_url();
            let reply = self.http.get(&url).await?;
            parse_model_list(ApiType::OpenAICompatible, &reply)
        })
    }
}
