use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    /// Missing file, unreachable URL or empty input.
    #[error("Input error for '{source_name}': {message}")]
    Input { source_name: String, message: String },

    #[error("Decode error in column '{column}' at row '{row_id}': {message}")]
    Decode {
        column: String,
        row_id: String,
        message: String,
    },

    #[error("Schema error: {table} table is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub fn input(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Input {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn decode(
        column: impl Into<String>,
        row_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Decode {
            column: column.into(),
            row_id: row_id.into(),
            message: message.into(),
        }
    }

    pub fn schema(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            column: column.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
