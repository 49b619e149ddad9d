//! Error types for proto-schema crate.

use thiserror::Error;

/// Errors that can occur while loading a source schema.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Protobuf parse error: {0}")]
    ProtobufParse(String),

    #[error("Descriptor build error for '{file}': {source}")]
    DescriptorBuild {
        file: String,
        #[source]
        source: protobuf::Error,
    },

    #[error("Unresolved dependencies: {0}")]
    DependencyNotFound(String),

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),

    #[error("Message name '{name}' is ambiguous, candidates: {candidates:?}")]
    AmbiguousMessageName {
        name: String,
        candidates: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for proto-schema operations.
pub type Result<T> = std::result::Result<T, Error>;
