use crate::error::ConfigError;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default base URL of a local Ollama server
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Name of the preset that ships with the application
pub const DEFAULT_PRESET: &str = "default";

/// Model requested when none has been chosen
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Upper bound for a single generation request, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Wire-format dialect spoken by the configured endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ApiType {
    /// Ollama native API (`/api/generate`)
    #[default]
    Ollama,
    /// OpenAI-style chat completions (`/v1/chat/completions`), e.g. LM Studio
    #[serde(
        rename = "OpenAI-Compatible",
        alias = "OpenAI",
        alias = "OpenAICompatible"
    )]
    OpenAICompatible,
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiType::Ollama => write!(f, "Ollama"),
            ApiType::OpenAICompatible => write!(f, "OpenAI-Compatible"),
        }
    }
}

impl FromStr for ApiType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ApiType::Ollama),
            "openai" | "openai-compatible" | "openaicompatible" | "openai_compatible" => {
                Ok(ApiType::OpenAICompatible)
            }
            other => Err(ConfigError::ValidationError(format!(
                "unknown API type '{}' (expected 'ollama' or 'openai-compatible')",
                other
            ))),
        }
    }
}

/// Application settings persisted in the JSON config file
///
/// Field names on disk follow the historical layout (`api_endpoint`,
/// `active_system_prompt`, ...). Use [`Config::from_json`] rather than plain
/// serde deserialization: it falls back to a default per field instead of
/// rejecting the whole document.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Base URL of the model-serving API
    #[serde(rename = "api_endpoint")]
    pub endpoint: String,
    /// Request/response dialect of the endpoint
    pub api_type: ApiType,
    /// Name of the active system prompt preset
    #[serde(rename = "active_system_prompt")]
    pub active_preset: String,
    /// Bearer credential; empty means no `Authorization` header
    pub api_key: String,
    /// Model name sent with every request
    pub model: String,
    /// Timeout for one generation request
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_type: ApiType::Ollama,
            active_preset: DEFAULT_PRESET.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        f.debug_struct("Config")
            .field("endpoint", &self.endpoint)
            .field("api_type", &self.api_type)
            .field("active_preset", &self.active_preset)
            .field("api_key", &key)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Build a config from a parsed JSON document
    ///
    /// Every missing or invalid field is replaced by its default on its own;
    /// the remaining fields are kept as they are. Only a document whose root
    /// is not a JSON object is rejected.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let fields = value.as_object().ok_or_else(|| {
            ConfigError::ValidationError("config root must be a JSON object".to_string())
        })?;
        let defaults = Config::default();

        let endpoint = field::<String>(fields, "api_endpoint")
            .map(|e| e.trim().to_string())
            .filter(|e| match validate_endpoint(e) {
                Ok(()) => true,
                Err(err) => {
                    warn!("Ignoring configured endpoint: {}", err);
                    false
                }
            })
            .unwrap_or(defaults.endpoint);

        let active_preset = field::<String>(fields, "active_system_prompt")
            .map(|name| normalize_preset_name(&name))
            .filter(|name| {
                let usable = is_canonical_preset_name(name);
                if !usable {
                    warn!("Ignoring configured active preset '{}'", name);
                }
                usable
            })
            .unwrap_or(defaults.active_preset);

        let model = field::<String>(fields, "model")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or(defaults.model);

        let request_timeout_secs = field::<u64>(fields, "request_timeout_secs")
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.request_timeout_secs);

        Ok(Self {
            endpoint,
            api_type: field(fields, "api_type").unwrap_or(defaults.api_type),
            active_preset,
            api_key: field(fields, "api_key").unwrap_or(defaults.api_key),
            model,
            request_timeout_secs,
        })
    }

    /// Check the invariants a config must satisfy before it is persisted
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.endpoint)?;
        if !is_canonical_preset_name(&self.active_preset) {
            return Err(ConfigError::ValidationError(format!(
                "'{}' is not a valid preset name",
                self.active_preset
            )));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model name must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether a bearer credential should be sent
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Ensure `endpoint` parses as an absolute http(s) URL
pub fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(endpoint).map_err(|e| {
        ConfigError::ValidationError(format!("endpoint '{}' is not a valid URL: {}", endpoint, e))
    })?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        _ => Err(ConfigError::ValidationError(format!(
            "endpoint '{}' must be an http or https URL",
            endpoint
        ))),
    }
}

/// Strip surrounding whitespace and a legacy `.txt` suffix from a preset name
pub fn normalize_preset_name(name: &str) -> String {
    let name = name.trim();
    name.strip_suffix(".txt").unwrap_or(name).to_string()
}

/// Whether `name` is a preset name in its stored form
///
/// A canonical name is unchanged by [`normalize_preset_name`], is not
/// hidden and holds no path separators. Only such names map to exactly one
/// preset file.
pub fn is_canonical_preset_name(name: &str) -> bool {
    !name.is_empty()
        && normalize_preset_name(name) == name
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

fn field<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str) -> Option<T> {
    let value = fields.get(key)?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Config field '{}' is invalid ({}), using default", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert_eq!(config.api_type, ApiType::Ollama);
        assert_eq!(config.active_preset, "default");
        assert_eq!(config.api_key, "");
        assert!(!config.has_api_key());
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(value["api_endpoint"], "http://localhost:11434");
        assert_eq!(value["active_system_prompt"], "default");
        assert_eq!(value["api_type"], "Ollama");
        assert_eq!(value["api_key"], "");
    }

    #[test]
    fn test_api_type_wire_names() {
        assert_eq!(
            serde_json::to_value(ApiType::OpenAICompatible).unwrap(),
            json!("OpenAI-Compatible")
        );
        let legacy: ApiType = serde_json::from_value(json!("OpenAI")).unwrap();
        assert_eq!(legacy, ApiType::OpenAICompatible);
    }

    #[test]
    fn test_api_type_from_str() {
        assert_eq!("ollama".parse::<ApiType>().unwrap(), ApiType::Ollama);
        assert_eq!(
            "OpenAI-Compatible".parse::<ApiType>().unwrap(),
            ApiType::OpenAICompatible
        );
        assert_eq!(
            "openai".parse::<ApiType>().unwrap(),
            ApiType::OpenAICompatible
        );
        assert!("gemini".parse::<ApiType>().is_err());
    }

    #[test]
    fn test_from_json_partial_document() {
        let value = json!({
            "api_endpoint": "http://192.168.1.20:1234",
            "api_type": "OpenAI-Compatible",
        });

        let config = Config::from_json(&value).unwrap();
        assert_eq!(config.endpoint, "http://192.168.1.20:1234");
        assert_eq!(config.api_type, ApiType::OpenAICompatible);
        assert_eq!(config.active_preset, DEFAULT_PRESET);
        assert_eq!(config.api_key, "");
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_from_json_invalid_field_falls_back_individually() {
        let value = json!({
            "api_endpoint": "not a url",
            "api_type": "Carrier Pigeon",
            "active_system_prompt": "poetry.txt",
            "api_key": 42,
            "model": "mistral",
            "request_timeout_secs": 0,
            "window_geometry": [10, 20],
        });

        let config = Config::from_json(&value).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.api_type, ApiType::Ollama);
        assert_eq!(config.active_preset, "poetry");
        assert_eq!(config.api_key, "");
        assert_eq!(config.model, "mistral");
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(Config::from_json(&json!(["a", "b"])).is_err());
        assert!(Config::from_json(&json!("config")).is_err());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("http://localhost:11434").is_ok());
        assert!(validate_endpoint("https://api.example.com/v1").is_ok());
        assert!(validate_endpoint("localhost:11434").is_err());
        assert!(validate_endpoint("ftp://example.com").is_err());
        assert!(validate_endpoint("").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            api_key: "sk-secret".to_string(),
            ..Config::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_normalize_preset_name() {
        assert_eq!(normalize_preset_name("default.txt"), "default");
        assert_eq!(normalize_preset_name("  poetry "), "poetry");
        assert_eq!(normalize_preset_name("notes.md"), "notes.md");
    }

    #[test]
    fn test_canonical_preset_names() {
        assert!(is_canonical_preset_name("default"));
        assert!(is_canonical_preset_name("notes.md"));
        assert!(!is_canonical_preset_name(""));
        assert!(!is_canonical_preset_name(" spaced"));
        assert!(!is_canonical_preset_name("notes.txt"));
        assert!(!is_canonical_preset_name(".hidden"));
        assert!(!is_canonical_preset_name("a/b"));
    }

    #[test]
    fn test_validate_rejects_non_canonical_active_preset() {
        for name in ["notes.txt", " padded", ".hidden", ""] {
            let config = Config {
                active_preset: name.to_string(),
                ..Config::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationError(_))),
                "accepted {:?}",
                name
            );
        }
    }

    #[test]
    fn test_from_json_drops_unusable_active_preset() {
        let value = serde_json::json!({ "active_system_prompt": "notes.txt.txt" });
        let config = Config::from_json(&value).unwrap();
        assert_eq!(config.active_preset, DEFAULT_PRESET);
    }
}
