//! Error types for schema parsing, tree mutation and serialization.

use serde_json::Value;
use thiserror::Error;

/// Errors raised by the schema-class engine.
///
/// None of these are caught inside the crate. Construction and mutation
/// either fully succeed or abort with one of these variants.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document is malformed or uses an unsupported construct.
    #[error("Invalid schema at `{path}`: {reason}")]
    InvalidSchema { path: String, reason: String },

    /// A leaf conversion produced no usable value for a required field.
    #[error("Invalid value {value} on required field `{name}`")]
    InvalidValue { name: String, value: String },

    /// An enum node was explicitly set to a value outside its `enum` list.
    #[error("Invalid value {value} for `{name}`, expected one of: {allowed}")]
    InvalidUpdateValue {
        name: String,
        value: String,
        allowed: String,
    },

    /// A write addressed a key that is neither declared nor accepted as a
    /// passthrough key of an open object.
    #[error("Unknown property `{path}`")]
    UnknownProperty { path: String },

    /// A read-only node was written without the internal force flag.
    #[error("Cannot set read-only property `{name}`")]
    SettingReadOnlyProperty { name: String },

    /// A node that cannot hold live data was asked to store a value.
    #[error("Node `{name}` of type {node_type} does not implement `set`")]
    MissingImplementation { name: String, node_type: String },

    /// A path string does not follow the `name[index][index]...` grammar.
    #[error("Invalid JSON path `{path}`: {reason}")]
    InvalidJsonPath { path: String, reason: String },

    /// No serializer is registered for the mimetype.
    #[error("Unknown mimetype: {0}")]
    UnknownMimetype(String),

    /// Text encoding failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn invalid_schema(path: &str, reason: impl Into<String>) -> Self {
        SchemaError::InvalidSchema {
            path: if path.is_empty() { "#".to_string() } else { path.to_string() },
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(name: &str, value: Option<&Value>) -> Self {
        SchemaError::InvalidValue {
            name: name.to_string(),
            value: display_value(value),
        }
    }

    pub(crate) fn invalid_json_path(path: &str, reason: impl Into<String>) -> Self {
        SchemaError::InvalidJsonPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Render an optional value for error messages, `undefined` standing in for `None`.
pub(crate) fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "undefined".to_string(),
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SchemaError>;
