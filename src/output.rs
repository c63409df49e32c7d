use crate::error::OutputError;
use crate::fsutil::write_atomically;
use log::info;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Appends generated prompts to a user-chosen text file
///
/// The target path is optional; every operation against an unset path fails
/// with [`OutputError::PathNotSet`] without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct OutputWriter {
    path: Option<PathBuf>,
}

impl OutputWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn clear_path(&mut self) {
        self.path = None;
    }

    fn target(&self) -> Result<&Path, OutputError> {
        self.path.as_deref().ok_or(OutputError::PathNotSet)
    }

    /// Append `text` as one record terminated by a newline
    ///
    /// Trailing line breaks in `text` are dropped so each record ends with
    /// exactly one `\n`. The record goes out in a single write and the file
    /// is flushed and closed before returning.
    pub fn append(&self, text: &str) -> Result<(), OutputError> {
        let path = self.target()?;
        let io_error = |source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut record = text.trim_end_matches(['\r', '\n']).to_string();
        record.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_error)?;
        file.write_all(record.as_bytes()).map_err(io_error)?;
        file.flush().map_err(io_error)?;

        info!("Appended {} bytes to {}", record.len(), path.display());
        Ok(())
    }

    /// Read the whole file for viewing or editing
    pub fn read(&self) -> Result<String, OutputError> {
        let path = self.target()?;
        std::fs::read_to_string(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace the file content with edited text
    pub fn overwrite(&self, text: &str) -> Result<(), OutputError> {
        let path = self.target()?;
        write_atomically(path, text.as_bytes()).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved {} bytes to {}", text.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_unset_path_is_rejected_without_io() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new();

        assert!(matches!(writer.append("x"), Err(OutputError::PathNotSet)));
        assert!(matches!(writer.read(), Err(OutputError::PathNotSet)));
        assert!(matches!(writer.overwrite("x"), Err(OutputError::PathNotSet)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_append_creates_file_and_adds_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let writer = OutputWriter::with_path(&path);

        writer.append("a red fox in snow").unwrap();
        writer.append("a blue whale underwater\n\n").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "a red fox in snow\na blue whale underwater\n"
        );
    }

    #[test]
    fn test_append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        fs::write(&path, "existing line\n").unwrap();

        OutputWriter::with_path(&path).append("new line").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "existing line\nnew line\n"
        );
    }

    #[test]
    fn test_append_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::with_path(dir.path().join("missing").join("out.txt"));

        assert!(matches!(writer.append("x"), Err(OutputError::Io { .. })));
    }

    #[test]
    fn test_read_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let writer = OutputWriter::with_path(&path);
        writer.append("draft").unwrap();

        assert_eq!(writer.read().unwrap(), "draft\n");
        writer.overwrite("edited\n").unwrap();
        assert_eq!(writer.read().unwrap(), "edited\n");
    }

    #[test]
    fn test_set_and_clear_path() {
        let mut writer = OutputWriter::new();
        assert!(writer.path().is_none());

        writer.set_path("out.txt");
        assert_eq!(writer.path(), Some(Path::new("out.txt")));

        writer.clear_path();
        assert!(writer.path().is_none());
    }
}
