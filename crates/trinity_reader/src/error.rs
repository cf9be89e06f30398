//! Error types for object reading

use thiserror::Error;
use trinity_resource::ResourceError;

/// A field assignment an object refused
///
/// Never fatal: the reader logs it and moves on, so object files and the
/// in-memory types can drift apart without breaking loads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The type has no field with this name
    #[error("{type_name} has no field '{field}'")]
    Unknown { type_name: String, field: String },

    /// The field exists but the value has the wrong shape
    #[error("{type_name}.{field} expects {expected}, got {found}")]
    Mismatch {
        type_name: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl FieldError {
    /// Unknown field on `type_name`
    pub fn unknown(type_name: &str, field: &str) -> Self {
        Self::Unknown {
            type_name: type_name.to_string(),
            field: field.to_string(),
        }
    }

    /// Value of the wrong shape for `type_name.field`
    pub fn mismatch(type_name: &str, field: &str, expected: &'static str, found: &'static str) -> Self {
        Self::Mismatch {
            type_name: type_name.to_string(),
            field: field.to_string(),
            expected,
            found,
        }
    }
}

/// Errors that abort a read
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReaderError {
    /// A `type` attribute names nothing in the type registry
    #[error("Unknown type '{type_name}' on node <{node}>")]
    UnknownType { type_name: String, node: String },

    /// A JSON-tagged leaf is not valid JSON
    #[error("Malformed JSON in <{node}>: {message}")]
    BadJson { node: String, message: String },

    /// A `ref` attribute names an id not registered yet
    #[error("Unresolved reference '{id}' on node <{node}>")]
    UnresolvedReference { id: String, node: String },

    /// The object file is not well-formed
    #[error("XML error: {0}")]
    Xml(String),

    /// The object file resource failed to load
    #[error("Failed to load object file '{0}'")]
    LoadFailed(String),

    /// The resource behind a path is not an object file
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Result type for reader operations
pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = ReaderError::UnknownType {
            type_name: "Trinity.Missing".into(),
            node: "root".into(),
        };
        assert!(err.to_string().contains("Trinity.Missing"));

        let field = FieldError::unknown("Mesh", "colour");
        assert_eq!(field.to_string(), "Mesh has no field 'colour'");
    }
}
