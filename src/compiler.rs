//! Compiling pruned definitions into runtime descriptors.
//!
//! Definitions are lowered to a single `FileDescriptorProto` whose root
//! message keeps the source message's package and name, then linked by the
//! protobuf runtime. Lowering validates what the pruner promises (unique
//! type names per scope, unique field names and numbers, resolvable type
//! references), so a failure here points at a pruning bug.

use crate::definition::{EnumDefinition, FieldLabel, FieldType, MessageDefinition};
use crate::error::{Error, Result};
use crate::pruner::{prune, MAP_KEY_NAME, MAP_VALUE_NAME};
use crate::selection::FieldSelection;
use protobuf::descriptor::field_descriptor_proto::Type;
use protobuf::descriptor::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, OneofDescriptorProto,
};
use protobuf::reflect::{FileDescriptor, MessageDescriptor};
use std::collections::HashSet;
use tracing::debug;

/// Protobuf syntax variant of the compiled file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

impl Syntax {
    /// Syntax declared by a file; an empty declaration means proto2.
    pub fn of_file(file: &FileDescriptor) -> Self {
        match file.proto().syntax() {
            "proto3" => Syntax::Proto3,
            _ => Syntax::Proto2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

/// A compiled partial schema.
///
/// Immutable once built; the runtime descriptors are reference counted and
/// safe to share across threads.
#[derive(Clone)]
pub struct PartialSchema {
    definition: MessageDefinition,
    syntax: Syntax,
    file_proto: FileDescriptorProto,
    file: FileDescriptor,
    root: MessageDescriptor,
}

impl std::fmt::Debug for PartialSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialSchema")
            .field("message_type", &self.root.full_name())
            .field("syntax", &self.syntax)
            .field("definition", &self.definition)
            .finish()
    }
}

impl PartialSchema {
    /// Prune `source` with `selection` and compile the result.
    ///
    /// The compiled file uses the source file's package and syntax, so the
    /// root message has the same fully qualified name as `source`. Nested
    /// types imported from files of another syntax are compiled under that
    /// same syntax; the protobuf runtime accepts this even where `protoc`
    /// would not (e.g. a proto2 enum without a zero value in a proto3 file).
    pub fn build(source: &MessageDescriptor, selection: &FieldSelection) -> Result<Self> {
        let definition = prune(source, selection)?;
        let source_file = source.file_descriptor();
        Self::compile(
            definition,
            source_file.proto().package(),
            Syntax::of_file(source_file),
        )
    }

    /// Compile a root message definition.
    pub fn compile(definition: MessageDefinition, package: &str, syntax: Syntax) -> Result<Self> {
        let file_proto = to_file_descriptor_proto(&definition, package, syntax)?;
        let file = FileDescriptor::new_dynamic(file_proto.clone(), &[])
            .map_err(|e| Error::SchemaValidation(e.to_string()))?;
        let root = file
            .message_by_package_relative_name(&definition.name)
            .ok_or_else(|| Error::MessageTypeNotFound(definition.name.clone()))?;

        debug!(
            "Compiled partial schema '{}' ({}) with {} nested types",
            root.full_name(),
            syntax.as_str(),
            definition.messages.len() + definition.enums.len()
        );

        Ok(Self {
            definition,
            syntax,
            file_proto,
            file,
            root,
        })
    }

    /// Descriptor of the pruned root message.
    pub fn message_descriptor(&self) -> &MessageDescriptor {
        &self.root
    }

    pub fn definition(&self) -> &MessageDefinition {
        &self.definition
    }

    pub fn file_descriptor_proto(&self) -> &FileDescriptorProto {
        &self.file_proto
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Look up a compiled message by package-relative or fully qualified name.
    pub fn get_message(&self, name: &str) -> Option<MessageDescriptor> {
        let name = name.trim_start_matches('.');
        let package = self.file_proto.package();
        let relative = if package.is_empty() {
            name
        } else {
            name.strip_prefix(package)
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(name)
        };
        self.file.message_by_package_relative_name(relative)
    }
}

fn to_file_descriptor_proto(
    definition: &MessageDefinition,
    package: &str,
    syntax: Syntax,
) -> Result<FileDescriptorProto> {
    let mut file = FileDescriptorProto::new();
    let root_name = if package.is_empty() {
        definition.name.clone()
    } else {
        file.set_package(package.to_string());
        format!("{package}.{}", definition.name)
    };
    file.set_name(format!("{}.partial.proto", root_name.replace('.', "/")));
    file.set_syntax(syntax.as_str().to_string());

    let mut scopes = Vec::new();
    file.message_type
        .push(lower_message(definition, root_name, syntax, &mut scopes)?);
    Ok(file)
}

/// An enclosing message during lowering, for type name resolution.
struct Enclosing<'a> {
    full_name: String,
    definition: &'a MessageDefinition,
}

fn lower_message<'a>(
    definition: &'a MessageDefinition,
    full_name: String,
    syntax: Syntax,
    scopes: &mut Vec<Enclosing<'a>>,
) -> Result<DescriptorProto> {
    check_nested_names(definition, &full_name)?;
    if definition.map_entry {
        check_map_entry(definition, &full_name)?;
    }

    scopes.push(Enclosing {
        full_name: full_name.clone(),
        definition,
    });
    let result = lower_message_body(definition, &full_name, syntax, scopes);
    scopes.pop();
    result
}

fn lower_message_body<'a>(
    definition: &'a MessageDefinition,
    full_name: &str,
    syntax: Syntax,
    scopes: &mut Vec<Enclosing<'a>>,
) -> Result<DescriptorProto> {
    let mut message = DescriptorProto::new();
    message.set_name(definition.name.clone());
    if definition.map_entry {
        message.options.mut_or_insert_default().set_map_entry(true);
    }

    for enum_definition in &definition.enums {
        message.enum_type.push(lower_enum(enum_definition));
    }
    for nested in &definition.messages {
        let nested_name = format!("{full_name}.{}", nested.name);
        message
            .nested_type
            .push(lower_message(nested, nested_name, syntax, scopes)?);
    }

    // Real oneofs come first, synthetic ones are appended after them
    let mut oneofs: Vec<&str> = Vec::new();
    for name in definition.fields.iter().filter_map(|f| f.oneof.as_deref()) {
        if !oneofs.contains(&name) {
            oneofs.push(name);
            let mut oneof = OneofDescriptorProto::new();
            oneof.set_name(name.to_string());
            message.oneof_decl.push(oneof);
        }
    }

    let mut names = HashSet::new();
    let mut numbers = HashSet::new();
    for field in &definition.fields {
        if !names.insert(field.name.as_str()) {
            return Err(Error::SchemaValidation(format!(
                "Duplicate field name '{}' in '{full_name}'",
                field.name
            )));
        }
        if !numbers.insert(field.number) {
            return Err(Error::SchemaValidation(format!(
                "Duplicate field number {} in '{full_name}'",
                field.number
            )));
        }

        let mut proto = FieldDescriptorProto::new();
        proto.set_name(field.name.clone());
        proto.set_number(field.number);
        proto.set_label(field.label.to_proto());

        match &field.field_type {
            FieldType::Scalar(scalar) => proto.set_type(scalar.to_proto()),
            FieldType::Named(type_name) => {
                let (kind, resolved) = resolve(type_name, scopes).ok_or_else(|| {
                    Error::SchemaValidation(format!(
                        "Field '{}' in '{full_name}' references unknown type '{type_name}'",
                        field.name
                    ))
                })?;
                proto.set_type(kind);
                proto.set_type_name(format!(".{resolved}"));
            }
        }

        if let Some(default_value) = &field.default_value {
            proto.set_default_value(default_value.clone());
        }

        if let Some(oneof) = &field.oneof {
            if field.label != FieldLabel::Optional || field.proto3_optional {
                return Err(Error::SchemaValidation(format!(
                    "Field '{}' in '{full_name}' cannot be both {} and a member of oneof '{oneof}'",
                    field.name,
                    if field.proto3_optional {
                        "proto3 optional"
                    } else {
                        field.label.as_str()
                    }
                )));
            }
            let index = oneofs.iter().position(|name| name == oneof).unwrap_or_default();
            proto.set_oneof_index(index as i32);
        } else if field.proto3_optional && syntax == Syntax::Proto3 {
            let mut oneof = OneofDescriptorProto::new();
            oneof.set_name(format!("_{}", field.name));
            proto.set_proto3_optional(true);
            proto.set_oneof_index(message.oneof_decl.len() as i32);
            message.oneof_decl.push(oneof);
        }

        message.field.push(proto);
    }

    Ok(message)
}

fn lower_enum(definition: &EnumDefinition) -> EnumDescriptorProto {
    let mut proto = EnumDescriptorProto::new();
    proto.set_name(definition.name.clone());
    if definition.allow_alias {
        proto.options.mut_or_insert_default().set_allow_alias(true);
    }
    for value in &definition.values {
        let mut value_proto = EnumValueDescriptorProto::new();
        value_proto.set_name(value.name.clone());
        value_proto.set_number(value.number);
        proto.value.push(value_proto);
    }
    proto
}

/// Resolve a simple type name from the innermost enclosing message outward.
fn resolve(type_name: &str, scopes: &[Enclosing<'_>]) -> Option<(Type, String)> {
    scopes.iter().rev().find_map(|scope| {
        let full_name = format!("{}.{type_name}", scope.full_name);
        if scope.definition.nested_message(type_name).is_some() {
            Some((Type::TYPE_MESSAGE, full_name))
        } else if scope.definition.nested_enum(type_name).is_some() {
            Some((Type::TYPE_ENUM, full_name))
        } else {
            None
        }
    })
}

fn check_nested_names(definition: &MessageDefinition, full_name: &str) -> Result<()> {
    let mut seen = HashSet::new();
    let names = definition
        .messages
        .iter()
        .map(|m| m.name.as_str())
        .chain(definition.enums.iter().map(|e| e.name.as_str()));
    for name in names {
        if !seen.insert(name) {
            return Err(Error::SchemaValidation(format!(
                "Duplicate type name '{name}' in '{full_name}'"
            )));
        }
    }
    Ok(())
}

fn check_map_entry(definition: &MessageDefinition, full_name: &str) -> Result<()> {
    let shape_ok = definition.fields.len() == 2
        && definition
            .field(MAP_KEY_NAME)
            .is_some_and(|key| key.number == 1)
        && definition
            .field(MAP_VALUE_NAME)
            .is_some_and(|value| value.number == 2)
        && definition.messages.is_empty()
        && definition.enums.is_empty();
    if shape_ok {
        Ok(())
    } else {
        Err(Error::SchemaValidation(format!(
            "Map entry '{full_name}' must have exactly 'key' = 1 and 'value' = 2 and no nested types"
        )))
    }
}
