//! Schema definition objects.
//!
//! These are the output of pruning and the input of compilation: plain,
//! owned descriptions of messages, enums and fields. Type references between
//! definitions are by simple name and are resolved by the compiler using
//! protobuf scoping rules (innermost enclosing message first).

use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use std::fmt;

/// Field cardinality, copied from the source field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLabel {
    Optional,
    Required,
    Repeated,
}

impl FieldLabel {
    pub fn from_proto(label: Label) -> Self {
        match label {
            Label::LABEL_OPTIONAL => FieldLabel::Optional,
            Label::LABEL_REQUIRED => FieldLabel::Required,
            Label::LABEL_REPEATED => FieldLabel::Repeated,
        }
    }

    pub fn to_proto(self) -> Label {
        match self {
            FieldLabel::Optional => Label::LABEL_OPTIONAL,
            FieldLabel::Required => Label::LABEL_REQUIRED,
            FieldLabel::Repeated => Label::LABEL_REPEATED,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldLabel::Optional => "optional",
            FieldLabel::Required => "required",
            FieldLabel::Repeated => "repeated",
        }
    }
}

/// Protobuf scalar types.
///
/// `Int32`, `Sint32` and `Sfixed32` differ on the wire and are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    /// Map a descriptor type to a scalar type; `None` for message, enum and group.
    pub fn from_proto(field_type: Type) -> Option<Self> {
        Some(match field_type {
            Type::TYPE_DOUBLE => ScalarType::Double,
            Type::TYPE_FLOAT => ScalarType::Float,
            Type::TYPE_INT64 => ScalarType::Int64,
            Type::TYPE_UINT64 => ScalarType::Uint64,
            Type::TYPE_INT32 => ScalarType::Int32,
            Type::TYPE_FIXED64 => ScalarType::Fixed64,
            Type::TYPE_FIXED32 => ScalarType::Fixed32,
            Type::TYPE_BOOL => ScalarType::Bool,
            Type::TYPE_STRING => ScalarType::String,
            Type::TYPE_BYTES => ScalarType::Bytes,
            Type::TYPE_UINT32 => ScalarType::Uint32,
            Type::TYPE_SFIXED32 => ScalarType::Sfixed32,
            Type::TYPE_SFIXED64 => ScalarType::Sfixed64,
            Type::TYPE_SINT32 => ScalarType::Sint32,
            Type::TYPE_SINT64 => ScalarType::Sint64,
            Type::TYPE_MESSAGE | Type::TYPE_ENUM | Type::TYPE_GROUP => return None,
        })
    }

    pub fn to_proto(self) -> Type {
        match self {
            ScalarType::Double => Type::TYPE_DOUBLE,
            ScalarType::Float => Type::TYPE_FLOAT,
            ScalarType::Int32 => Type::TYPE_INT32,
            ScalarType::Int64 => Type::TYPE_INT64,
            ScalarType::Uint32 => Type::TYPE_UINT32,
            ScalarType::Uint64 => Type::TYPE_UINT64,
            ScalarType::Sint32 => Type::TYPE_SINT32,
            ScalarType::Sint64 => Type::TYPE_SINT64,
            ScalarType::Fixed32 => Type::TYPE_FIXED32,
            ScalarType::Fixed64 => Type::TYPE_FIXED64,
            ScalarType::Sfixed32 => Type::TYPE_SFIXED32,
            ScalarType::Sfixed64 => Type::TYPE_SFIXED64,
            ScalarType::Bool => Type::TYPE_BOOL,
            ScalarType::String => Type::TYPE_STRING,
            ScalarType::Bytes => Type::TYPE_BYTES,
        }
    }

    /// The `.proto` keyword for this type.
    pub fn type_name(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// The type of a field entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Scalar(ScalarType),
    /// A message or enum defined in an enclosing scope, by simple name
    Named(String),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(scalar) => write!(f, "{scalar}"),
            FieldType::Named(name) => f.write_str(name),
        }
    }
}

/// One field of a message definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub label: FieldLabel,
    pub field_type: FieldType,
    pub name: String,
    pub number: i32,
    /// Declared default, only for singular scalar fields
    pub default_value: Option<String>,
    /// proto3 `optional` (explicit presence)
    pub proto3_optional: bool,
    /// Enclosing `oneof`; synthetic proto3 `optional` oneofs are not recorded here
    pub oneof: Option<String>,
}

impl FieldEntry {
    pub fn new(
        label: FieldLabel,
        field_type: FieldType,
        name: impl Into<String>,
        number: i32,
    ) -> Self {
        Self {
            label,
            field_type,
            name: name.into(),
            number,
            default_value: None,
            proto3_optional: false,
            oneof: None,
        }
    }

    pub fn with_default_value(mut self, default_value: Option<String>) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn with_proto3_optional(mut self, proto3_optional: bool) -> Self {
        self.proto3_optional = proto3_optional;
        self
    }

    pub fn with_oneof(mut self, oneof: Option<String>) -> Self {
        self.oneof = oneof;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

/// An enum definition with every value of the source enum, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDefinition {
    pub name: String,
    pub values: Vec<EnumValue>,
    pub allow_alias: bool,
}

impl EnumDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            allow_alias: false,
        }
    }

    pub fn add_value(&mut self, name: impl Into<String>, number: i32) {
        self.values.push(EnumValue {
            name: name.into(),
            number,
        });
    }
}

/// A message definition with its nested types.
///
/// Nested messages and enums share one namespace per message; the pruner
/// never emits the same name twice into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDefinition {
    pub name: String,
    pub fields: Vec<FieldEntry>,
    pub messages: Vec<MessageDefinition>,
    pub enums: Vec<EnumDefinition>,
    pub map_entry: bool,
}

impl MessageDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            map_entry: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn nested_message(&self, name: &str) -> Option<&MessageDefinition> {
        self.messages.iter().find(|m| m.name == name)
    }

    pub fn nested_enum(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Whether a nested message or enum of this name is already defined.
    pub fn contains_type(&self, name: &str) -> bool {
        self.nested_message(name).is_some() || self.nested_enum(name).is_some()
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        writeln!(f, "{pad}message {} {{", self.name)?;
        if self.map_entry {
            writeln!(f, "{pad}  option map_entry = true;")?;
        }
        for nested in &self.enums {
            nested.write_indented(f, depth + 1)?;
        }
        for nested in &self.messages {
            nested.write_indented(f, depth + 1)?;
        }
        let mut open_oneof: Option<&str> = None;
        for field in &self.fields {
            let oneof = field.oneof.as_deref();
            if open_oneof.is_some() && open_oneof != oneof {
                writeln!(f, "{pad}  }}")?;
                open_oneof = None;
            }
            if open_oneof.is_none() {
                if let Some(name) = oneof {
                    writeln!(f, "{pad}  oneof {name} {{")?;
                    open_oneof = oneof;
                }
            }

            // oneof members carry no label
            if open_oneof.is_some() {
                write!(
                    f,
                    "{pad}    {} {} = {}",
                    field.field_type, field.name, field.number
                )?;
            } else {
                write!(
                    f,
                    "{pad}  {} {} {} = {}",
                    field.label.as_str(),
                    field.field_type,
                    field.name,
                    field.number
                )?;
            }
            if let Some(default) = &field.default_value {
                write!(f, " [default = {default}]")?;
            }
            writeln!(f, ";")?;
        }
        if open_oneof.is_some() {
            writeln!(f, "{pad}  }}")?;
        }
        writeln!(f, "{pad}}}")
    }
}

impl EnumDefinition {
    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        writeln!(f, "{pad}enum {} {{", self.name)?;
        if self.allow_alias {
            writeln!(f, "{pad}  option allow_alias = true;")?;
        }
        for value in &self.values {
            writeln!(f, "{pad}  {} = {};", value.name, value.number)?;
        }
        writeln!(f, "{pad}}}")
    }
}

/// Renders the definition as `.proto`-style text.
impl fmt::Display for MessageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl fmt::Display for EnumDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
