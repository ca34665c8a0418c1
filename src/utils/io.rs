//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
///
/// Wraps `fs::read_to_string` with consistent `Error::internal_io` formatting.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Read and deserialize a JSON file.
///
/// Syntax and shape errors map to `config.invalid_json` naming the file.
pub fn read_json<T: DeserializeOwned>(path: &Path, operation: &str) -> Result<T> {
    let content = read_file(path, operation)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "test content").unwrap();

        let content = read_file(temp.path(), "test read").unwrap();
        assert!(content.contains("test content"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let result = read_file(Path::new("/nonexistent/path.txt"), "test read");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn read_json_parses_typed_value() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, r#"{{"name": "shop"}}"#).unwrap();

        let sample: Sample = read_json(temp.path(), "read sample").unwrap();
        assert_eq!(sample.name, "shop");
    }

    #[test]
    fn read_json_reports_invalid_json_with_path() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{{ not json").unwrap();

        let err = read_json::<Sample>(temp.path(), "read sample").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
        assert_eq!(
            err.details["path"].as_str().unwrap(),
            temp.path().display().to_string()
        );
    }
}
