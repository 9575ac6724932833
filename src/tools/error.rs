//! Typed failures of spreadsheet tools.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid filename '{0}'. Must be a relative path with no directory traversal.")]
    UnsafePath(String),

    #[error("Missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Column '{0}' not found.")]
    ColumnNotFound(String),

    #[error("Sheet '{name}' not found. Available sheets: {available:?}")]
    SheetNotFound { name: String, available: Vec<String> },

    #[error("{0}")]
    Rejected(String),

    #[error("Failed to read workbook '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("Failed to render chart: {0}")]
    Chart(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
