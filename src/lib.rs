/// Error types for every component
pub mod error;

/// Configuration model and JSON store
pub mod config;

/// System prompt presets
pub mod presets;

/// Example prompt files used as generation input
pub mod example_set;

/// Model-serving API client and backends
pub mod ai;

/// Output file writer
pub mod output;

/// Session context shared by the shell and generation workers
pub mod session;

mod fsutil;

// Re-export commonly used types
pub use config::{ApiType, Config, ConfigStore};
pub use error::{ApiError, ConfigError, OutputError, PresetError, SessionError};
pub use example_set::ExampleSet;
pub use output::OutputWriter;
pub use presets::PresetManager;
pub use session::{Session, SettingsUpdate};
