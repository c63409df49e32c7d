use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading or saving the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("Failed to write config file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the prompt preset manager
#[derive(Error, Debug)]
pub enum PresetError {
    #[error("Preset not found: {0}")]
    NotFound(String),

    #[error("Invalid preset operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid preset name: {0:?}")]
    InvalidName(String),

    #[error("Preset storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist active preset: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur while talking to the model-serving API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("API returned an empty response")]
    EmptyResponse,

    #[error("Could not reach {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl ApiError {
    /// True for failures where the server never answered
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network { .. } | ApiError::Timeout(_))
    }
}

/// Errors raised by the output writer
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("No output file selected; choose a file first")]
    PathNotSet,

    #[error("Output file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by a session to the shell
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A generation request is already in progress")]
    Busy,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Preset(#[from] PresetError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Failed to read example file {path}: {source}")]
    Examples {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Generation worker failed: {0}")]
    Worker(String),
}
