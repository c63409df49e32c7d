use crate::config::{is_canonical_preset_name, normalize_preset_name, Config, ConfigStore, DEFAULT_PRESET};
use crate::error::PresetError;
use log::{debug, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default directory holding the preset files
pub const DEFAULT_PRESETS_DIR: &str = "system_prompts";

/// Extension every preset file carries
pub const PRESET_EXTENSION: &str = "txt";

/// Instruction text written to `default.txt` on first start
pub const DEFAULT_PRESET_TEXT: &str = "\
You are provided with a collection of example text prompts.
Your task is to analyze these examples and determine their structure, wording patterns, and overall style.

Based on this analysis, generate a **new** text prompt that follows the same format and style as the provided examples.

Your response must:
- Match the format and style of the example prompts.
- Use common words, phrases, and patterns found in the examples.
- Be clear, coherent, and consistent with the example prompts.
- NOT introduce any new or unrelated styles.
- **ONLY return the generated text prompt. Do not include explanations, reasoning, or additional text.**";

/// File-backed store of named system prompt presets
///
/// Each preset is a `<name>.txt` file inside a single directory. The preset
/// name is the file stem. Which preset is active is recorded in [`Config`],
/// not here; operations that depend on it take the active name explicitly.
#[derive(Debug, Clone)]
pub struct PresetManager {
    dir: PathBuf,
}

impl PresetManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List preset names, ordered lexically by file name
    ///
    /// A missing directory yields an empty list. Files whose stem is not a
    /// canonical preset name (leading dots or blanks, a doubled `.txt`) are
    /// skipped, so every listed name can be read, activated and deleted.
    pub fn list(&self) -> Result<Vec<String>, PresetError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PresetError::Storage {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut file_names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PresetError::Storage {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(PRESET_EXTENSION) {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => file_names.push(name),
                Err(raw) => warn!("Skipping preset with non UTF-8 file name: {:?}", raw),
            }
        }

        file_names.sort();
        Ok(file_names
            .into_iter()
            .filter_map(|file| {
                let stem = file.strip_suffix(".txt")?;
                if is_canonical_preset_name(stem) {
                    Some(stem.to_string())
                } else {
                    debug!("Skipping preset file with unusable name: {:?}", file);
                    None
                }
            })
            .collect())
    }

    /// Whether a preset with this name exists
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Read the instruction text of a preset
    ///
    /// # Errors
    ///
    /// `NotFound` if no such preset exists, `Storage` on other I/O failures.
    pub fn read(&self, name: &str) -> Result<String, PresetError> {
        let path = self.path_for(name)?;
        fs::read_to_string(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                PresetError::NotFound(normalize_preset_name(name))
            } else {
                PresetError::Storage { path, source }
            }
        })
    }

    /// Create or overwrite a preset
    pub fn write(&self, name: &str, text: &str) -> Result<(), PresetError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir).map_err(|source| PresetError::Storage {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| PresetError::Storage {
            path: path.clone(),
            source,
        })?;
        info!("Saved preset '{}' ({} bytes)", normalize_preset_name(name), text.len());
        Ok(())
    }

    /// Delete a preset
    ///
    /// The active preset cannot be deleted; another preset has to be
    /// activated first. The last remaining preset cannot be deleted either.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the preset does not exist
    /// * `InvalidOperation` if it is active or the last one left
    /// * `Storage` if the file cannot be removed
    pub fn delete(&self, name: &str, active: &str) -> Result<(), PresetError> {
        let path = self.path_for(name)?;
        let name = normalize_preset_name(name);
        if !path.is_file() {
            return Err(PresetError::NotFound(name));
        }

        if self.list()?.len() <= 1 {
            return Err(PresetError::InvalidOperation(format!(
                "cannot delete '{}': it is the last remaining preset",
                name
            )));
        }
        if name == normalize_preset_name(active) {
            return Err(PresetError::InvalidOperation(format!(
                "cannot delete '{}': it is the active preset, activate another one first",
                name
            )));
        }

        fs::remove_file(&path).map_err(|source| PresetError::Storage { path, source })?;
        info!("Deleted preset '{}'", name);
        Ok(())
    }

    /// Make `name` the active preset and persist the choice
    ///
    /// `config` is only updated once the new value has been written.
    pub fn set_active(
        &self,
        name: &str,
        store: &ConfigStore,
        config: &mut Config,
    ) -> Result<(), PresetError> {
        let name = normalize_preset_name(name);
        if !self.exists(&name) {
            return Err(PresetError::NotFound(name));
        }

        let updated = Config {
            active_preset: name.clone(),
            ..config.clone()
        };
        store.save(&updated)?;
        *config = updated;
        info!("Active preset is now '{}'", name);
        Ok(())
    }

    /// Create the directory and the default preset when no preset exists
    ///
    /// Returns `true` if the default preset was written.
    pub fn ensure_default(&self) -> Result<bool, PresetError> {
        if !self.list()?.is_empty() {
            return Ok(false);
        }
        debug!("No presets in {}, creating default", self.dir.display());
        self.write(DEFAULT_PRESET, DEFAULT_PRESET_TEXT)?;
        Ok(true)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, PresetError> {
        let stem = normalize_preset_name(name);
        if !is_canonical_preset_name(&stem) {
            return Err(PresetError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", stem, PRESET_EXTENSION)))
    }
}
