//! Partial decoder.
//!
//! Decodes payloads of a source message type against a pruned schema.
//! Because pruning keeps field numbers, wire types and type shapes, the
//! pruned descriptor reads the source's bytes; everything else in the
//! payload is skipped by the runtime and dropped on projection.

use crate::compiler::PartialSchema;
use crate::error::{Error, Result};
use crate::selection::FieldSelection;
use crate::value::PartialMessage;
use protobuf::reflect::MessageDescriptor;
use std::sync::Arc;
use tracing::{info, trace};

/// Decoder for one source type and one set of selection paths.
///
/// Cloning is cheap and clones share the compiled schema.
#[derive(Debug, Clone)]
pub struct PartialDecoder {
    schema: Arc<PartialSchema>,
}

impl PartialDecoder {
    pub fn new(schema: PartialSchema) -> Self {
        info!(
            "Created partial decoder for '{}' with fields {:?}",
            schema.message_descriptor().full_name(),
            schema.definition().field_names()
        );
        Self {
            schema: Arc::new(schema),
        }
    }

    /// Build a decoder that reads only `paths` of `source`.
    ///
    /// An empty path list decodes every field.
    pub fn for_fields<S: AsRef<str>>(source: &MessageDescriptor, paths: &[S]) -> Result<Self> {
        let selection = FieldSelection::parse(source.name(), paths)?;
        let schema = PartialSchema::build(source, &selection)?;
        Ok(Self::new(schema))
    }

    pub fn schema(&self) -> &PartialSchema {
        &self.schema
    }

    /// Fully qualified name of the decoded message type.
    pub fn message_type(&self) -> &str {
        self.schema.message_descriptor().full_name()
    }

    /// Decode one payload of the source message type.
    pub fn decode(&self, data: &[u8]) -> Result<PartialMessage> {
        let descriptor = self.schema.message_descriptor();
        trace!("Decoding {} bytes as '{}'", data.len(), descriptor.full_name());

        let decode_error = |source| Error::Decode {
            message_type: descriptor.full_name().to_string(),
            source,
        };
        let message = descriptor.parse_from_bytes(data).map_err(decode_error)?;
        message.check_initialized_dyn().map_err(decode_error)?;

        Ok(PartialMessage::from_dyn(&*message))
    }
}
