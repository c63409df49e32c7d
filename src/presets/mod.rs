/// System prompt presets stored as text files
pub mod manager;

pub use manager::{PresetManager, DEFAULT_PRESETS_DIR, DEFAULT_PRESET_TEXT, PRESET_EXTENSION};
