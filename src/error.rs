use thiserror::Error;

pub type NewsQuantResult<T> = Result<T, NewsQuantError>;

#[derive(Debug, Error)]
pub enum NewsQuantError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors raised while turning raw cell values into typed values.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid date in column '{column}' at row {row}: '{value}'")]
    InvalidDate {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Invalid number in column '{column}' at row {row}: '{value}'")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Local time '{value}' does not exist in timezone '{timezone}'")]
    NonexistentLocalTime { value: String, timezone: String },

    #[error("Null value in required column '{column}' at row {row}")]
    NullValue { column: String, row: usize },
}

/// Errors raised when a frame does not have the columns a stage expects.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Missing required column '{column}' (available: {available:?})")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Column '{column}' has unsupported type {dtype}")]
    UnexpectedType { column: String, dtype: String },
}

/// Errors related to data frame operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Data frame error: {0}")]
    DataFrame(String),

    #[error("Invalid indicator parameter: {0}")]
    InvalidIndicator(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Errors related to file access.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("Failed to create reader: {0}")]
    ReaderCreation(String),

    #[error("Failed to read data: {0}")]
    ReadFailed(String),
}

pub(crate) fn polars_err(stage: &str, e: polars::error::PolarsError) -> NewsQuantError {
    NewsQuantError::Data(DataError::DataFrame(format!("Error while {stage}: {e}")))
}
