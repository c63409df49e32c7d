use crate::config::ApiType;
use crate::error::ApiError;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Longest slice of a response body carried inside an error
pub const BODY_SNIPPET_LEN: usize = 512;

/// Reply of Ollama's `/api/generate`
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reply of an OpenAI-compatible `/v1/chat/completions`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub error: Option<ChatError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

/// Generation reply, shaped by the dialect of the request that produced it
#[derive(Debug, Clone)]
pub enum GenerationResponse {
    Ollama(OllamaResponse),
    Chat(ChatResponse),
}

impl GenerationResponse {
    /// Decode `body` as the reply shape that belongs to `api_type`
    pub fn parse(api_type: ApiType, body: &str) -> Result<Self, ApiError> {
        let decoded = match api_type {
            ApiType::Ollama => serde_json::from_str(body).map(GenerationResponse::Ollama),
            ApiType::OpenAICompatible => serde_json::from_str(body).map(GenerationResponse::Chat),
        };
        decoded.map_err(|e| {
            ApiError::InvalidResponse(format!(
                "Failed to parse {} response: {}. Body: {}",
                api_type,
                e,
                snippet(body)
            ))
        })
    }

    /// Extract the generated text
    pub fn into_text(self) -> Result<String, ApiError> {
        match self {
            GenerationResponse::Ollama(reply) => {
                if let Some(error) = reply.error {
                    return Err(ApiError::InvalidResponse(format!("Ollama error: {}", error)));
                }
                reply.response.ok_or_else(|| {
                    ApiError::InvalidResponse("Ollama response has no 'response' field".to_string())
                })
            }
            GenerationResponse::Chat(reply) => {
                if let Some(error) = reply.error {
                    return Err(ApiError::InvalidResponse(format!(
                        "API error ({}): {}",
                        error.error_type.as_deref().unwrap_or("unknown"),
                        error.message
                    )));
                }
                reply
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        ApiError::InvalidResponse("No choices in chat response".to_string())
                    })?
                    .message
                    .content
                    .ok_or_else(|| {
                        ApiError::InvalidResponse("First choice has no message content".to_string())
                    })
            }
        }
    }
}

/// Model list from Ollama's `/api/tags`
#[derive(Debug, Deserialize)]
pub(crate) struct OllamaTags {
    #[serde(default)]
    pub models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaModel {
    pub name: Option<String>,
}

/// Model list from an OpenAI-compatible `/v1/models`
#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelEntry {
    pub id: Option<String>,
}

/// Decode a model listing for `api_type` into sorted model names
pub fn parse_model_list(api_type: ApiType, body: &str) -> Result<Vec<String>, ApiError> {
    let invalid = |e: serde_json::Error| {
        ApiError::InvalidResponse(format!(
            "Failed to parse model list: {}. Body: {}",
            e,
            snippet(body)
        ))
    };
    let mut names: Vec<String> = match api_type {
        ApiType::Ollama => serde_json::from_str::<OllamaTags>(body)
            .map_err(invalid)?
            .models
            .into_iter()
            .filter_map(|m| m.name)
            .collect(),
        ApiType::OpenAICompatible => serde_json::from_str::<ModelList>(body)
            .map_err(invalid)?
            .data
            .into_iter()
            .filter_map(|m| m.id)
            .collect(),
    };
    names.sort();
    names.dedup();
    Ok(names)
}

/// Strip `<think>...</think>` reasoning blocks and surrounding whitespace
pub fn clean_response(text: &str) -> String {
    static THINK_BLOCK: OnceLock<Regex> = OnceLock::new();
    let re = THINK_BLOCK.get_or_init(|| {
        Regex::new(r"(?is)<\s*think\s*>.*?<\s*/\s*think\s*>").expect("valid think-block regex")
    });
    re.replace_all(text, "").trim().to_string()
}

/// First [`BODY_SNIPPET_LEN`] characters of `body`
pub fn snippet(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(BODY_SNIPPET_LEN).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
