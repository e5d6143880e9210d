use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::error::{ExportError, Result};
use crate::pipeline::ingestion::Source;

/// Runtime configuration for one export run.
///
/// Built from defaults, then an optional TOML file, then CLI/environment
/// overrides applied by the binary.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path or http(s) URL of the classifications export
    pub classifications: Option<String>,
    /// Path or http(s) URL of the subjects export
    pub subjects: Option<String>,
    pub output: PathBuf,
    /// Substring marking an anonymous user name
    pub anonymous_marker: String,
    /// Keep only classifications of this workflow
    pub workflow_id: Option<String>,
    /// Optional JSON run report destination
    pub report: Option<PathBuf>,
    /// Optional Prometheus text snapshot destination
    pub metrics_file: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifications: None,
            subjects: None,
            output: PathBuf::from(constants::DEFAULT_OUTPUT_FILE),
            anonymous_marker: constants::DEFAULT_ANONYMOUS_MARKER.to_string(),
            workflow_id: None,
            report: None,
            metrics_file: None,
            http_timeout_secs: constants::DEFAULT_HTTP_TIMEOUT_SECS,
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    /// Defaults, overlaid with the TOML file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    ExportError::Config(format!(
                        "Failed to read config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml_str(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let classifications = self
            .classifications
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ExportError::Config("classifications location is required".into()))?;
        let subjects = self
            .subjects
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ExportError::Config("subjects location is required".into()))?;

        if self.anonymous_marker.is_empty() {
            return Err(ExportError::Config("anonymous_marker must not be empty".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ExportError::Config("http_timeout_secs must be positive".into()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(ExportError::Config("output path must not be empty".into()));
        }
        let output = normalize_path(&self.output);
        for input in [classifications, subjects] {
            if let Source::Path(p) = Source::parse(input) {
                if normalize_path(&p) == output {
                    return Err(ExportError::Config(format!(
                        "output '{}' would overwrite an input",
                        self.output.display()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn classifications_source(&self) -> Result<Source> {
        self.classifications
            .as_deref()
            .map(Source::parse)
            .ok_or_else(|| ExportError::Config("classifications location is required".into()))
    }

    pub fn subjects_source(&self) -> Result<Source> {
        self.subjects
            .as_deref()
            .map(Source::parse)
            .ok_or_else(|| ExportError::Config("subjects location is required".into()))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Resolve the parent directory so that `./a.csv` and `a.csv` compare equal.
/// Falls back to dropping `.` components when the parent does not exist.
fn normalize_path(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect(),
    }
}
