//! Source schema loading for pb-partial.
//!
//! Partial decoders are pruned from a full, authoritative message
//! descriptor. Hosts with generated code can pass `T::descriptor()`
//! directly; this crate covers the other case, where the schema only exists
//! as `.proto` text or as a serialized `FileDescriptorSet`:
//!
//! - Runtime Protobuf Support: Parse `.proto` files at runtime, no code generation
//! - Descriptor Sets: Load `protoc --descriptor_set_out` output
//! - Lookup: Find message descriptors by fully qualified or simple name
//!
//! ```ignore
//! use proto_schema::ProtoSchema;
//!
//! let schema = ProtoSchema::from_file("proto/addressbook.proto")?;
//! let address_book = schema.get_message("tutorial.AddressBook")?;
//! ```

pub mod error;
pub mod schema;

pub use error::{Error, Result};
pub use schema::ProtoSchema;
