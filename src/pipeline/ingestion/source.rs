use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::error::{ExportError, Result};

/// Where an input table comes from: a local path or an http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl Source {
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Source::Url(trimmed.to_string())
        } else {
            Source::Path(PathBuf::from(trimmed))
        }
    }

    /// Read the whole resource into memory.
    ///
    /// Missing files, unreachable URLs, non-success statuses and empty bodies
    /// are all reported as input errors before any processing starts.
    #[instrument(skip(self), fields(source = %self))]
    pub fn load(&self, timeout: Duration) -> Result<Vec<u8>> {
        let bytes = match self {
            Source::Path(path) => {
                if !path.is_file() {
                    return Err(ExportError::input(self.to_string(), "file not found"));
                }
                fs::read(path)
                    .map_err(|e| ExportError::input(self.to_string(), format!("unreadable: {e}")))?
            }
            Source::Url(url) => fetch(url, timeout)?,
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ExportError::input(self.to_string(), "input is empty"));
        }
        debug!("Loaded {} bytes", bytes.len());
        Ok(bytes)
    }
}

fn fetch(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
    let resp = client
        .get(url)
        .send()
        .map_err(|e| ExportError::input(url, format!("unreachable: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ExportError::input(
            url,
            format!("server responded with status {}", status.as_u16()),
        ));
    }
    let bytes = resp
        .bytes()
        .map_err(|e| ExportError::input(url, format!("failed to read body: {e}")))?;
    Ok(bytes.to_vec())
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Url(url) => write!(f, "{url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_distinguishes_urls_from_paths() {
        assert_eq!(
            Source::parse("https://example.org/c.csv"),
            Source::Url("https://example.org/c.csv".to_string())
        );
        assert_eq!(
            Source::parse("HTTP://example.org/c.csv"),
            Source::Url("HTTP://example.org/c.csv".to_string())
        );
        assert_eq!(
            Source::parse("data/c.csv"),
            Source::Path(PathBuf::from("data/c.csv"))
        );
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::Path(dir.path().join("nope.csv"));
        let err = source.load(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ExportError::Input { .. }));
    }

    #[test]
    fn test_empty_file_is_input_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   ").unwrap();
        let source = Source::Path(file.path().to_path_buf());
        let err = source.load(Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("input is empty"));
    }

    #[test]
    fn test_reads_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a,b\n1,2\n").unwrap();
        let source = Source::Path(file.path().to_path_buf());
        assert_eq!(source.load(Duration::from_secs(1)).unwrap(), b"a,b\n1,2\n".to_vec());
    }
}
