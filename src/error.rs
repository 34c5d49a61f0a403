use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    /// Device or kernel program could not be brought up. Carries the
    /// underlying diagnostic text.
    #[error("Compute Device Error: {0}")]
    Device(String),

    #[error("Swap Batch Error: {0}")]
    Batch(String),
}

pub type GfResult<T> = Result<T, GridForgeError>;
