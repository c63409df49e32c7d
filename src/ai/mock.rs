use crate::ai::backends::{BackendFuture, LLMBackend};
use crate::ai::prompt::GenerationRequest;
use crate::config::ApiType;
use crate::error::ApiError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock backend for testing and development
///
/// Returns configured responses in order, cycling back to the first after
/// the last, and records every request it receives. An optional delay keeps
/// a request in flight long enough to exercise concurrency guards.
pub struct MockBackend {
    responses: Vec<Result<String, ApiError>>,
    models: Vec<String>,
    current_index: Arc<Mutex<usize>>,
    delay: Option<Duration>,
    call_count: Arc<Mutex<usize>>,
    last_request: Arc<Mutex<Option<GenerationRequest>>>,
}

impl MockBackend {
    /// Create a new mock backend with a single response
    ///
    /// # Example
    /// ```
    /// use promptsmith::ai::MockBackend;
    ///
    /// let backend = MockBackend::with_response(Ok("a green parrot".to_string()));
    /// ```
    pub fn with_response(response: Result<String, ApiError>) -> Self {
        Self::with_responses(vec![response])
    }

    /// Create a new mock backend with multiple responses
    pub fn with_responses(responses: Vec<Result<String, ApiError>>) -> Self {
        Self {
            responses,
            models: vec!["mock-model".to_string()],
            current_index: Arc::new(Mutex::new(0)),
            delay: None,
            call_count: Arc::new(Mutex::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a mock backend that always succeeds with `text`
    pub fn success(text: impl Into<String>) -> Self {
        Self::with_response(Ok(text.into()))
    }

    /// Create a mock backend that always fails with an HTTP status
    pub fn status_error(status: u16, body: impl Into<String>) -> Self {
        Self::with_response(Err(ApiError::Status {
            status,
            body: body.into(),
        }))
    }

    /// Create a mock backend that simulates timeout errors
    pub fn timeout() -> Self {
        Self::with_response(Err(ApiError::Timeout(Duration::from_secs(60))))
    }

    /// Add a delay to all responses
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Get the number of times generate() has been called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Get the last request that was passed to generate()
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

impl LLMBackend for MockBackend {
    fn api_type(&self) -> ApiType {
        ApiType::Ollama
    }

    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> BackendFuture<'a, String> {
        Box::pin(async move {
            *self.call_count.lock().unwrap() += 1;
            *self.last_request.lock().unwrap() = Some(request.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.responses.is_empty() {
                return Err(ApiError::EmptyResponse);
            }
            let mut index = self.current_index.lock().unwrap();
            let response_index = *index % self.responses.len();
            *index += 1;

            self.responses[response_index].clone()
        })
    }

    fn list_models(&self) -> BackendFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.models.clone()) })
    }
}
