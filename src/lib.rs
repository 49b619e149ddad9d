//! pb-partial Library
//!
//! Selective protobuf decoding: read a handful of fields out of large
//! messages without materializing the rest.
//!
//! # How it works
//!
//! - Selection: dotted paths such as `people.name` are folded into a
//!   [`FieldSelection`] tree rooted at the source message
//! - Pruning: [`prune`] walks the source descriptor and keeps only the
//!   selected fields, with the nested message, enum and map-entry types
//!   they need, under their original names and numbers
//! - Compiling: [`PartialSchema`] turns the pruned definitions into a
//!   runtime descriptor with the same fully qualified name as the source
//! - Decoding: [`PartialDecoder`] parses source payloads with the pruned
//!   descriptor; unselected fields are skipped on the wire
//!
//! A selector without children (including an empty path list) selects the
//! whole subtree below it.
//!
//! # Limitations
//!
//! - proto2 `group` fields are not supported. Pruning fails with
//!   [`Error::UnsupportedFieldType`] whenever a group field is selected,
//!   including through a wildcard; select sibling fields explicitly instead.
//! - The compiled schema is a single file in the root message's syntax.
//!   Types imported from a file of the other syntax are compiled under the
//!   root's syntax: a proto2 type pulled into a proto3 root keeps its
//!   numbers, labels and enum values, but its singular fields follow proto3
//!   presence, so zero values decode as absent.
//!
//! # Usage
//!
//! ```ignore
//! use pb_partial::PartialDecoder;
//! use proto_schema::ProtoSchema;
//!
//! let schema = ProtoSchema::from_file("proto/addressbook.proto")?;
//! let source = schema.get_message("tutorial.AddressBook")?;
//! let decoder = PartialDecoder::for_fields(&source, &["people.name"])?;
//!
//! let book = decoder.decode(&bytes)?;
//! for person in book.get("people").and_then(|v| v.as_repeated()).unwrap_or_default() {
//!     println!("{:?}", person.as_message().and_then(|p| p.get("name")));
//! }
//! ```
//!
//! Decoders can also be described in YAML, see [`PartialDecoderConfig`].

pub mod compiler;
pub mod config;
pub mod decoder;
pub mod definition;
pub mod error;
pub mod pruner;
pub mod selection;
pub mod value;

pub use compiler::{PartialSchema, Syntax};
pub use config::PartialDecoderConfig;
pub use decoder::PartialDecoder;
pub use definition::{
    EnumDefinition, EnumValue, FieldEntry, FieldLabel, FieldType, MessageDefinition, ScalarType,
};
pub use error::{Error, Result};
pub use pruner::prune;
pub use selection::FieldSelection;
pub use value::{PartialMessage, PartialValue};
