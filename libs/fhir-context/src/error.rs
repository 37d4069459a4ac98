//! Error types for the structure registry

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Registry build or lookup failure. Fatal: the registry cannot be used.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    DataFormat(#[from] DataFormatError),

    #[error("Model error: {0}")]
    Model(#[from] ferrite_models::Error),
}

/// Structural mismatch between instance data and the registered definitions.
///
/// Variants carry the offending element and type names so callers can report
/// precisely without parsing the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataFormatError {
    #[error(
        "{element} has type {type_name} but this is not a valid type for this element{}",
        expected_suffix(.expected)
    )]
    InvalidChildType {
        element: String,
        type_name: String,
        /// Admissible types of the slot (populated for choice slots)
        expected: Vec<String>,
    },

    #[error("Unknown element '{name}' found in {owner}")]
    UnknownElement { owner: String, name: String },

    #[error("Unknown resource type '{0}'")]
    UnknownResourceType(String),

    /// A composite value whose datatype is not registered
    #[error("Unknown datatype '{0}'")]
    UnknownDatatype(String),

    #[error("Incorrect resource type found, expected \"{expected}\" but found \"{found}\"")]
    IncorrectResourceType { expected: String, found: String },

    #[error("{element} allows at most {max} value(s)")]
    TooManyValues { element: String, max: u32 },

    #[error("Invalid value for {element}: {message}")]
    InvalidValue { element: String, message: String },
}

fn expected_suffix(expected: &[String]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        format!(" - Expected one of: [{}]", expected.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_child_type_lists_admissible_types() {
        let err = DataFormatError::InvalidChildType {
            element: "value[x]".into(),
            type_name: "HumanName".into(),
            expected: vec!["string".into(), "Quantity".into()],
        };
        assert_eq!(
            err.to_string(),
            "value[x] has type HumanName but this is not a valid type for this element - Expected one of: [string, Quantity]"
        );
    }

    #[test]
    fn invalid_child_type_without_choice() {
        let err = DataFormatError::InvalidChildType {
            element: "name".into(),
            type_name: "boolean".into(),
            expected: Vec::new(),
        };
        assert_eq!(
            err.to_string(),
            "name has type boolean but this is not a valid type for this element"
        );
    }
}
