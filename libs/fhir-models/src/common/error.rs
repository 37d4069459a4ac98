//! Error types for FHIR instance models

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid field value: {0}")]
    InvalidFieldValue(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

pub type Result<T> = std::result::Result<T, Error>;
