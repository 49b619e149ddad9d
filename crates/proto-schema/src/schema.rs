use crate::error::{Error, Result};
use protobuf::descriptor::{FileDescriptorProto, FileDescriptorSet};
use protobuf::reflect::{FileDescriptor, MessageDescriptor};
use protobuf::Message;
use protobuf_parse::Parser;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A source schema: one or more runtime file descriptors, linked together.
///
/// Message descriptors looked up from here are the full, authoritative
/// shapes that partial schemas are pruned from.
#[derive(Clone)]
pub struct ProtoSchema {
    /// Files in dependency order (dependencies before dependents)
    files: Vec<FileDescriptor>,
}

impl std::fmt::Debug for ProtoSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtoSchema")
            .field(
                "files",
                &self
                    .files
                    .iter()
                    .map(|file| file.proto().name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ProtoSchema {
    /// Parse a .proto file and create a schema
    ///
    /// The file's parent directory is used as the include path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let includes: Vec<PathBuf> = p.parent().map(Path::to_path_buf).into_iter().collect();
        Self::from_files(&[p], &includes)
    }

    /// Parse several .proto files with explicit include directories.
    pub fn from_files<P, I>(inputs: &[P], includes: &[I]) -> Result<Self>
    where
        P: AsRef<Path>,
        I: AsRef<Path>,
    {
        let mut parser = Parser::new();
        parser.pure();
        for input in inputs {
            parser.input(input);
        }
        for include in includes {
            parser.include(include);
        }

        let parsed = parser
            .parse_and_typecheck()
            .map_err(|e| Error::ProtobufParse(e.to_string()))?;

        Self::from_file_descriptor_protos(parsed.file_descriptors)
    }

    /// Parse a .proto file content from string
    pub fn from_string(content: &str) -> Result<Self> {
        use std::io::Write;
        use tempfile::Builder;

        // The parser insists on a .proto extension
        let mut temp_file = Builder::new()
            .suffix(".proto")
            .tempfile()
            .map_err(|e| Error::ProtobufParse(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::ProtobufParse(format!("Failed to write temp file: {e}")))?;

        Self::from_file(temp_file.path())
    }

    /// Load a serialized `FileDescriptorSet`, as written by
    /// `protoc --include_imports --descriptor_set_out`.
    pub fn from_descriptor_set_bytes(bytes: &[u8]) -> Result<Self> {
        let set = FileDescriptorSet::parse_from_bytes(bytes)
            .map_err(|e| Error::ProtobufParse(format!("Invalid descriptor set: {e}")))?;
        Self::from_file_descriptor_protos(set.file)
    }

    /// Link raw file descriptor protos into runtime descriptors.
    ///
    /// Input order does not matter. Imports that are not part of the input
    /// fall back to the well-known types bundled with the protobuf runtime.
    pub fn from_file_descriptor_protos(protos: Vec<FileDescriptorProto>) -> Result<Self> {
        let mut files: Vec<FileDescriptor> = Vec::with_capacity(protos.len());
        let mut pending = protos;

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();

            for proto in pending {
                let deps: Option<Vec<FileDescriptor>> = proto
                    .dependency
                    .iter()
                    .map(|dep| {
                        files
                            .iter()
                            .find(|f| f.proto().name() == dep)
                            .cloned()
                            .or_else(|| well_known_file(dep))
                    })
                    .collect();

                let Some(deps) = deps else {
                    deferred.push(proto);
                    continue;
                };

                let name = proto.name().to_string();
                let file = FileDescriptor::new_dynamic(proto, &deps).map_err(|source| {
                    Error::DescriptorBuild {
                        file: name.clone(),
                        source,
                    }
                })?;
                debug!("Linked proto file '{name}' with {} dependencies", deps.len());
                files.push(file);
            }

            if deferred.len() == before {
                let names: Vec<&str> = deferred.iter().map(|p| p.name()).collect();
                return Err(Error::DependencyNotFound(names.join(", ")));
            }
            pending = deferred;
        }

        Ok(ProtoSchema { files })
    }

    /// Get a message descriptor by fully qualified or simple name.
    ///
    /// A simple name must identify exactly one message across all files.
    pub fn get_message(&self, name: &str) -> Result<MessageDescriptor> {
        let name = name.trim_start_matches('.');
        let all = self.all_messages();

        if let Some(found) = all.iter().find(|m| m.full_name() == name) {
            return Ok(found.clone());
        }

        let mut candidates: Vec<MessageDescriptor> =
            all.into_iter().filter(|m| m.name() == name).collect();
        match candidates.len() {
            0 => Err(Error::MessageTypeNotFound(name.to_string())),
            1 => Ok(candidates.remove(0)),
            _ => Err(Error::AmbiguousMessageName {
                name: name.to_string(),
                candidates: candidates.iter().map(|m| m.full_name().to_string()).collect(),
            }),
        }
    }

    /// List the fully qualified names of all messages, nested ones included.
    ///
    /// Synthetic map entry types are left out.
    pub fn list_messages(&self) -> Vec<String> {
        self.all_messages()
            .iter()
            .filter(|m| !m.proto().options.map_entry())
            .map(|m| m.full_name().to_string())
            .collect()
    }

    /// The linked files, dependencies first.
    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    fn all_messages(&self) -> Vec<MessageDescriptor> {
        let mut out = Vec::new();
        for file in &self.files {
            for message in file.messages() {
                collect_nested(message, &mut out);
            }
        }
        out
    }
}

fn collect_nested(message: MessageDescriptor, out: &mut Vec<MessageDescriptor>) {
    for nested in message.nested_messages() {
        collect_nested(nested, out);
    }
    out.push(message);
}

fn well_known_file(name: &str) -> Option<FileDescriptor> {
    use protobuf::well_known_types as wkt;

    let file = match name {
        "google/protobuf/any.proto" => wkt::any::file_descriptor(),
        "google/protobuf/api.proto" => wkt::api::file_descriptor(),
        "google/protobuf/duration.proto" => wkt::duration::file_descriptor(),
        "google/protobuf/empty.proto" => wkt::empty::file_descriptor(),
        "google/protobuf/field_mask.proto" => wkt::field_mask::file_descriptor(),
        "google/protobuf/source_context.proto" => wkt::source_context::file_descriptor(),
        "google/protobuf/struct.proto" => wkt::struct_::file_descriptor(),
        "google/protobuf/timestamp.proto" => wkt::timestamp::file_descriptor(),
        "google/protobuf/type.proto" => wkt::type_::file_descriptor(),
        "google/protobuf/wrappers.proto" => wkt::wrappers::file_descriptor(),
        "google/protobuf/descriptor.proto" => protobuf::descriptor::file_descriptor(),
        _ => return None,
    };
    Some(file.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobuf::descriptor::field_descriptor_proto::{Label, Type};

    #[test]
    fn test_parse_simple_message() {
        let proto = r#"
            syntax = "proto3";

            message User {
                string name = 1;
                int32 age = 2;
                bool active = 3;
            }
        "#;

        let schema = ProtoSchema::from_string(proto).expect("Failed to parse proto");
        assert_eq!(schema.list_messages(), vec!["User".to_string()]);

        let user_msg = schema.get_message("User").expect("User message not found");
        assert_eq!(user_msg.fields().count(), 3);

        let name_field = user_msg.field_by_name("name").expect("name field not found");
        assert_eq!(name_field.number(), 1);
        assert_eq!(name_field.proto().type_(), Type::TYPE_STRING);
        assert_eq!(name_field.proto().label(), Label::LABEL_OPTIONAL);

        let age_field = user_msg.field_by_name("age").expect("age field not found");
        assert_eq!(age_field.proto().type_(), Type::TYPE_INT32);
        assert_eq!(age_field.number(), 2);
    }

    #[test]
    fn test_parse_with_package() {
        let proto = r#"
            syntax = "proto3";
            package myapp.v1;

            message Product {
                string id = 1;
                double price = 2;
            }
        "#;

        let schema = ProtoSchema::from_string(proto).expect("Failed to parse proto");

        let by_simple = schema.get_message("Product").expect("Product not found");
        assert_eq!(by_simple.full_name(), "myapp.v1.Product");

        let by_full = schema
            .get_message("myapp.v1.Product")
            .expect("Product not found by full name");
        assert_eq!(by_full.full_name(), "myapp.v1.Product");

        let dotted = schema
            .get_message(".myapp.v1.Product")
            .expect("Product not found by dotted name");
        assert_eq!(dotted.name(), "Product");
    }

    #[test]
    fn test_nested_messages_are_listed() {
        let proto = r#"
            syntax = "proto3";
            package shop;

            message Order {
                message Line {
                    string sku = 1;
                    uint32 quantity = 2;
                }
                repeated Line lines = 1;
                map<string, string> labels = 2;
            }
        "#;

        let schema = ProtoSchema::from_string(proto).expect("Failed to parse proto");
        let mut messages = schema.list_messages();
        messages.sort();
        assert_eq!(messages, vec!["shop.Order", "shop.Order.Line"]);

        let line = schema.get_message("Line").expect("Line not found");
        assert_eq!(line.full_name(), "shop.Order.Line");

        let order = schema.get_message("Order").expect("Order not found");
        let lines = order.field_by_name("lines").expect("lines not found");
        assert_eq!(lines.proto().label(), Label::LABEL_REPEATED);
    }

    #[test]
    fn test_ambiguous_simple_name() {
        let proto = r#"
            syntax = "proto3";

            message A {
                message Item { string x = 1; }
            }
            message B {
                message Item { string y = 1; }
            }
        "#;

        let schema = ProtoSchema::from_string(proto).expect("Failed to parse proto");
        match schema.get_message("Item") {
            Err(Error::AmbiguousMessageName { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!(
                "Expected AmbiguousMessageName, got {:?}",
                other.map(|m| m.full_name().to_string())
            ),
        }
        assert!(schema.get_message("A.Item").is_ok());
    }

    #[test]
    fn test_parse_invalid_proto() {
        let proto = r#"
            syntax = "proto3";

            message InvalidMessage {
                string name
            }
        "#;

        let result = ProtoSchema::from_string(proto);
        assert!(matches!(result, Err(Error::ProtobufParse(_))));
    }

    #[test]
    fn test_get_nonexistent_message() {
        let proto = r#"
            syntax = "proto3";

            message User {
                string name = 1;
            }
        "#;

        let schema = ProtoSchema::from_string(proto).expect("Failed to parse proto");
        let result = schema.get_message("NonExistent");
        assert!(matches!(result, Err(Error::MessageTypeNotFound(_))));
    }

    #[test]
    fn test_link_out_of_order_protos() {
        let mut base = FileDescriptorProto::new();
        base.set_name("base.proto".to_string());
        base.set_syntax("proto3".to_string());
        let mut shared = protobuf::descriptor::DescriptorProto::new();
        shared.set_name("Shared".to_string());
        base.message_type.push(shared);

        let mut top = FileDescriptorProto::new();
        top.set_name("top.proto".to_string());
        top.set_syntax("proto3".to_string());
        top.dependency.push("base.proto".to_string());
        let mut holder = protobuf::descriptor::DescriptorProto::new();
        holder.set_name("Holder".to_string());
        let mut field = protobuf::descriptor::FieldDescriptorProto::new();
        field.set_name("shared".to_string());
        field.set_number(1);
        field.set_label(Label::LABEL_OPTIONAL);
        field.set_type(Type::TYPE_MESSAGE);
        field.set_type_name(".Shared".to_string());
        holder.field.push(field);
        top.message_type.push(holder);

        let schema = ProtoSchema::from_file_descriptor_protos(vec![top, base])
            .expect("Failed to link protos");
        assert_eq!(schema.files().len(), 2);
        assert_eq!(schema.files()[0].proto().name(), "base.proto");
        assert!(schema.get_message("Holder").is_ok());
    }

    #[test]
    fn test_missing_dependency() {
        let mut top = FileDescriptorProto::new();
        top.set_name("top.proto".to_string());
        top.dependency.push("missing.proto".to_string());

        let result = ProtoSchema::from_file_descriptor_protos(vec![top]);
        assert!(matches!(result, Err(Error::DependencyNotFound(_))));
    }

    #[test]
    fn test_descriptor_set_round_trip() {
        let proto = r#"
            syntax = "proto3";

            message Event {
                string id = 1;
            }
        "#;
        let schema = ProtoSchema::from_string(proto).expect("Failed to parse proto");

        let mut set = FileDescriptorSet::new();
        set.file = schema.files().iter().map(|f| f.proto().clone()).collect();
        let bytes = set.write_to_bytes().expect("Failed to encode descriptor set");

        let reloaded =
            ProtoSchema::from_descriptor_set_bytes(&bytes).expect("Failed to load descriptor set");
        assert!(reloaded.get_message("Event").is_ok());
    }
}
