use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, LaborerError>;

/// Error type covering the different failure cases that can occur while a
/// query collection is loaded, expanded, executed, harmonized, or written.
#[derive(Debug, Error)]
pub enum LaborerError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when a delimited result body cannot be tokenized.
    #[error("delimited result error: {0}")]
    Csv(#[from] csv::Error),

    /// Raised when a mandatory configuration attribute is absent.
    #[error("invalid configuration: missing mandatory field '{field}'")]
    MissingField { field: String },

    /// Raised when a configuration attribute holds a value of the wrong type.
    #[error("invalid configuration: field '{field}' expects {expected}, found {found}")]
    InvalidType {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// Raised when a configuration attribute has the right type but an
    /// unusable value.
    #[error("invalid configuration: field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Raised when multi-valued fields disagree on the number of runs.
    #[error("multi-value length mismatch in {context}: expected {expected} values, found {found}")]
    CardinalityMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// Raised when the remote endpoint could not answer a query.
    #[error("query execution failed: {0}")]
    QueryExecution(String),

    /// Raised when a result row does not match the width of the header.
    #[error("invalid row length: row {row} {content} has length {length}, while valid length is {expected}")]
    RowLength {
        row: usize,
        content: String,
        length: usize,
        expected: usize,
    },

    /// Raised when a SPARQL result document does not follow its format.
    #[error("invalid query results: {0}")]
    ResultsSyntax(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when an output location must be fresh but already exists.
    #[error("output already exists: {0}")]
    DestinationExists(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl LaborerError {
    /// Whether the error stems from the configuration document rather than
    /// from execution or output.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LaborerError::MissingField { .. }
                | LaborerError::InvalidType { .. }
                | LaborerError::InvalidValue { .. }
                | LaborerError::CardinalityMismatch { .. }
        )
    }

    pub(crate) fn invalid_type(
        field: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        LaborerError::InvalidType {
            field: field.into(),
            expected,
            found: found.to_string(),
        }
    }

    pub(crate) fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        LaborerError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
