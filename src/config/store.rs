use crate::config::Config;
use crate::error::ConfigError;
use crate::fsutil::write_atomically;
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Loads and persists [`Config`] as a JSON document at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, recovering from every failure with defaults
    ///
    /// A missing file is created with default values. A file that is not a
    /// JSON object is backed up next to the original before defaults are
    /// returned. Errors are logged, never returned.
    pub fn load(&self) -> Config {
        match self.try_load() {
            Ok(config) => config,
            Err(ConfigError::ReadError { source, .. }) if source.kind() == ErrorKind::NotFound => {
                info!(
                    "Config file '{}' not found, creating it with defaults",
                    self.path.display()
                );
                let config = Config::default();
                if let Err(e) = self.save(&config) {
                    warn!("Could not write default config: {}", e);
                }
                config
            }
            Err(e @ ConfigError::ReadError { .. }) => {
                error!("{}. Using default configuration", e);
                Config::default()
            }
            Err(e) => {
                error!(
                    "Config file '{}' is malformed ({}). Using default configuration",
                    self.path.display(),
                    e
                );
                self.backup_corrupt_file();
                Config::default()
            }
        }
    }

    /// Strict variant of [`ConfigStore::load`]
    ///
    /// # Errors
    ///
    /// * `ReadError` if the file cannot be read
    /// * `ParseError` if it is not valid JSON
    /// * `ValidationError` if the JSON root is not an object
    pub fn try_load(&self) -> Result<Config, ConfigError> {
        let bytes = std::fs::read(&self.path).map_err(|source| ConfigError::ReadError {
            path: self.path.clone(),
            source,
        })?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        let config = Config::from_json(&value)?;
        debug!("Loaded config from {}: {:?}", self.path.display(), config);
        Ok(config)
    }

    /// Validate and write `config`, replacing the previous file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        config.validate()?;
        let mut json = serde_json::to_vec_pretty(config)?;
        json.push(b'\n');
        write_atomically(&self.path, &json).map_err(|source| ConfigError::WriteError {
            path: self.path.clone(),
            source,
        })?;
        info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    /// Copy an unreadable config aside as `<file>.<timestamp>.bak`
    fn backup_corrupt_file(&self) -> Option<PathBuf> {
        let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let file_name = self.path.file_name()?.to_string_lossy().into_owned();
        let backup = self
            .path
            .with_file_name(format!("{}.{}.bak", file_name, timestamp));
        match std::fs::copy(&self.path, &backup) {
            Ok(_) => {
                warn!("Backed up corrupted config to '{}'", backup.display());
                Some(backup)
            }
            Err(e) => {
                warn!("Could not back up corrupted config: {}", e);
                None
            }
        }
    }
}
