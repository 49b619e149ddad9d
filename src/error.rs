//! Error types for building and using partial schemas.

use thiserror::Error;

/// Errors raised while pruning, compiling or decoding with a partial schema.
///
/// Everything except [`Error::Decode`] is raised while building a schema and
/// means the selection paths do not fit the source schema; retrying the same
/// build reproduces the same error.
#[derive(Error, Debug)]
pub enum Error {
    /// A selection path segment names a field the message does not have.
    ///
    /// `descriptor` is the text-format dump of the message being searched.
    #[error("Field '{field}' not found in message '{message}': {descriptor}")]
    FieldNotFound {
        field: String,
        message: String,
        descriptor: String,
    },

    #[error("Cyclic schema: message '{message}' is re-entered via {}", .path.join(" -> "))]
    CyclicSchema { message: String, path: Vec<String> },

    #[error("Ambiguous selection: '{path}' is both a complete path and a prefix of another path")]
    AmbiguousSelection { path: String },

    #[error("Type name '{name}' in scope '{scope}' refers to both '{first}' and '{second}'")]
    TypeNameCollision {
        name: String,
        scope: String,
        first: String,
        second: String,
    },

    #[error("Unsupported type {field_type} for field '{field}' in message '{message}'")]
    UnsupportedFieldType {
        field: String,
        message: String,
        field_type: String,
    },

    /// The pruned definitions did not compile; this indicates a pruning bug
    /// rather than bad input.
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),

    #[error("Failed to decode '{message_type}': {source}")]
    Decode {
        message_type: String,
        #[source]
        source: protobuf::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Schema(#[from] proto_schema::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for pb-partial operations.
pub type Result<T> = std::result::Result<T, Error>;
