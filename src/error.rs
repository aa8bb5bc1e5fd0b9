use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised between query construction and plot hand-off.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The archive could not complete the request or returned malformed data.
    #[error("Query error: {0}")]
    Query(String),

    /// Query parameters violate a range constraint.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record reached the calculator with an undefined formula input.
    #[error("Data error in record {record_id}: {reason}")]
    Data { record_id: String, reason: String },

    /// A catalog file or response could not be interpreted.
    #[error("Format error: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PipelineError {
    pub fn data(record_id: impl ToString, reason: impl Into<String>) -> Self {
        PipelineError::Data {
            record_id: record_id.to_string(),
            reason: reason.into(),
        }
    }
}
