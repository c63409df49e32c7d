/// Model-serving API client and its backends
pub mod backends;
pub mod client;
pub mod mock;
pub mod prompt;
pub mod response;

pub use backends::{
    ApiSettings, BackendFuture, ChatMessage, ChatRequest, LLMBackend, OllamaBackend,
    OllamaRequest, OpenAICompatibleBackend,
};
pub use client::{generate, ApiClient};
pub use mock::MockBackend;
pub use prompt::GenerationRequest;
pub use response::{clean_response, GenerationResponse};
