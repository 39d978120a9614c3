use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnricherError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("File {} is not valid text in the configured encoding", path.display())]
    Encoding { path: PathBuf },

    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Column has {got} values but the table has {expected} rows")]
    ColumnLength { expected: usize, got: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EnricherError>;
