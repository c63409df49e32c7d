use crate::error::SessionError;
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Example prompt files loaded for one generation request
///
/// Maps each file name to its raw content. Iteration follows file name
/// order, which is also the order the examples are sent to the model.
/// Files sharing a name get a numbered key (`examples (2).txt`) so none
/// is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleSet {
    files: BTreeMap<String, String>,
}

impl ExampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every file in `paths`
    ///
    /// # Errors
    ///
    /// `SessionError::Examples` naming the first file that could not be read.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, SessionError> {
        let mut set = Self::new();
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|source| SessionError::Examples {
                path: PathBuf::from(path),
                source,
            })?;
            let name = set.unique_name(path);
            debug!("Loaded example file '{}' ({} bytes)", name, content.len());
            set.insert(name, content);
        }
        Ok(set)
    }

    /// File name of `path`, numbered when another file already uses it
    fn unique_name(&self, path: &Path) -> String {
        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if !self.files.contains_key(&base) {
            return base;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| base.clone());
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (2..)
            .map(|n| format!("{} ({}){}", stem, n, extension))
            .find(|candidate| !self.files.contains_key(candidate))
            .unwrap_or(base)
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.files.insert(name.into(), content.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when there are no files or every file is blank
    pub fn is_empty(&self) -> bool {
        self.files.values().all(|c| c.trim().is_empty())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// File contents in name order, surrounding whitespace trimmed, blank files skipped
    pub fn texts(&self) -> Vec<String> {
        self.files
            .values()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}
