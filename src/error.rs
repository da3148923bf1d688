use thiserror::Error;

/// Failures raised while loading the table or computing a view.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The step needs a column the input header does not carry, or the
    /// derived band column before it was computed.
    #[error("missing column: {0}")]
    MissingColumn(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
