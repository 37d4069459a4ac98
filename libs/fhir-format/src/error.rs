//! Error types for parsing and encoding

use ferrite_context::DataFormatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Context(#[from] ferrite_context::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl FormatError {
    /// The structural diagnostic behind this error, if it is one
    pub fn data_format(&self) -> Option<&DataFormatError> {
        match self {
            FormatError::Context(ferrite_context::Error::DataFormat(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<DataFormatError> for FormatError {
    fn from(err: DataFormatError) -> Self {
        FormatError::Context(err.into())
    }
}

impl From<ferrite_models::Error> for FormatError {
    fn from(err: ferrite_models::Error) -> Self {
        FormatError::Context(err.into())
    }
}

pub type Result<T> = std::result::Result<T, FormatError>;
