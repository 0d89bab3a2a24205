//! JSON file loading.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::error;

/// Why a JSON file could not be loaded.
///
/// Only raised at startup. Every variant carries the filename as given by
/// the caller.
#[derive(Debug, Error)]
pub enum FileLoadError {
    #[error("JSON File '{filename}' not found.")]
    NotFound { filename: String },

    #[error("JSON File '{filename}' is not a valid JSON. Error: {error}")]
    InvalidJson { filename: String, error: String },

    #[error("JSON File '{filename}' does not use valid utf-8 encoding. Error: {error}")]
    InvalidEncoding { filename: String, error: String },

    #[error("Unexpected error while reading '{filename}': {error}")]
    Io { filename: String, error: String },
}

impl FileLoadError {
    pub fn filename(&self) -> &str {
        match self {
            Self::NotFound { filename }
            | Self::InvalidJson { filename, .. }
            | Self::InvalidEncoding { filename, .. }
            | Self::Io { filename, .. } => filename,
        }
    }
}

/// Reads `path` and deserializes its JSON content into `T`.
///
/// Content that parses as JSON but does not fit `T` is reported as
/// [`FileLoadError::InvalidJson`] too.
pub fn load_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, FileLoadError> {
    let path = path.as_ref();
    let filename = path.display().to_string();

    let raw = fs::read(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            error!("File not found: {filename}");
            FileLoadError::NotFound { filename: filename.clone() }
        } else {
            error!("Unexpected error while reading '{filename}': {e}");
            FileLoadError::Io { filename: filename.clone(), error: e.to_string() }
        }
    })?;

    let text = String::from_utf8(raw).map_err(|e| {
        error!("Invalid encoding in file: {filename}. Error: {e}");
        FileLoadError::InvalidEncoding { filename: filename.clone(), error: e.to_string() }
    })?;

    serde_json::from_str(&text).map_err(|e| {
        error!("Invalid JSON in file: {filename}. Error: {e}");
        FileLoadError::InvalidJson { filename: filename.clone(), error: e.to_string() }
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::Value;

    use super::*;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn loads_valid_json() {
        let file = write_temp(br#"{"version": 1, "level": "info"}"#);
        let value: Value = load_json_file(file.path()).unwrap();
        assert_eq!(value["level"], "info");
    }

    #[test]
    fn missing_file_is_not_found_with_filename() {
        let err = load_json_file::<Value>("does/not/exist.json").unwrap_err();
        assert!(matches!(err, FileLoadError::NotFound { .. }));
        assert_eq!(err.filename(), "does/not/exist.json");
        assert_eq!(err.to_string(), "JSON File 'does/not/exist.json' not found.");
    }

    #[test]
    fn syntax_error_is_invalid_json_with_parser_message() {
        let file = write_temp(b"{ invalid json }");
        let err = load_json_file::<Value>(file.path()).unwrap_err();
        match &err {
            FileLoadError::InvalidJson { filename, error } => {
                assert_eq!(filename, &file.path().display().to_string());
                assert!(error.contains("line 1"), "parser message missing: {error}");
            }
            other => panic!("expected InvalidJson, got {other:?}"),
        }
        assert!(err.to_string().contains("is not a valid JSON. Error:"));
    }

    #[test]
    fn non_utf8_bytes_are_invalid_encoding() {
        let file = write_temp(&[0xff, 0xfe, 0x7b, 0x7d]);
        let err = load_json_file::<Value>(file.path()).unwrap_err();
        assert!(matches!(err, FileLoadError::InvalidEncoding { .. }));
    }

    #[test]
    fn directory_is_an_unexpected_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_json_file::<Value>(dir.path()).unwrap_err();
        assert!(matches!(err, FileLoadError::Io { .. }));
    }
}
