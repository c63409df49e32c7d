/// Configuration model and its JSON store
pub mod settings;
pub mod store;

pub use settings::{
    is_canonical_preset_name, normalize_preset_name, validate_endpoint, ApiType, Config,
    DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_PRESET, DEFAULT_TIMEOUT_SECS,
};
pub use store::{ConfigStore, DEFAULT_CONFIG_FILE};
