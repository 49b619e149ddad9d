//! Descriptor pruning.
//!
//! Walks a source message descriptor together with a [`FieldSelection`] and
//! emits the smallest [`MessageDefinition`] that still decodes the selected
//! fields from payloads written against the full schema. Field numbers,
//! wire types and labels are copied verbatim; every referenced message or
//! enum type is emitted into the scope of the message that references it.

use crate::definition::{
    EnumDefinition, FieldEntry, FieldLabel, FieldType, MessageDefinition, ScalarType,
};
use crate::error::{Error, Result};
use crate::selection::FieldSelection;
use protobuf::descriptor::field_descriptor_proto::Type;
use protobuf::reflect::{
    EnumDescriptor, FieldDescriptor, MessageDescriptor, RuntimeFieldType, RuntimeType,
};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const MAP_KEY_NAME: &str = "key";
pub const MAP_VALUE_NAME: &str = "value";
const MAP_KEY_NUMBER: i32 = 1;
const MAP_VALUE_NUMBER: i32 = 2;

/// Prune `source` down to the fields named by `selection`.
///
/// A leaf selector (at the root or anywhere below) selects every field of
/// the message it is applied to, recursively. Errors are fatal for the whole
/// build; no partial definition is returned.
pub fn prune(source: &MessageDescriptor, selection: &FieldSelection) -> Result<MessageDefinition> {
    let mut in_progress = Vec::new();
    let definition = prune_message(source, selection, &mut in_progress)?;
    debug!(
        "Pruned '{}' to {} of {} top-level fields",
        source.full_name(),
        definition.fields.len(),
        source.fields().count()
    );
    Ok(definition)
}

/// How a source field is carried over.
enum FieldKind {
    Scalar(ScalarType),
    Enum(EnumDescriptor),
    Message(MessageDescriptor),
    /// Map field; holds the synthetic entry type
    Map(MessageDescriptor),
}

impl FieldKind {
    fn of(message: &MessageDescriptor, field: &FieldDescriptor) -> Result<Self> {
        let field_type = field.proto().type_();
        if let Some(scalar) = ScalarType::from_proto(field_type) {
            return Ok(FieldKind::Scalar(scalar));
        }

        match (field_type, field.runtime_field_type()) {
            (
                Type::TYPE_ENUM,
                RuntimeFieldType::Singular(RuntimeType::Enum(enum_type))
                | RuntimeFieldType::Repeated(RuntimeType::Enum(enum_type)),
            ) => Ok(FieldKind::Enum(enum_type)),
            (Type::TYPE_MESSAGE, RuntimeFieldType::Map(..)) => {
                map_entry_type(message, field).map(FieldKind::Map)
            }
            (
                Type::TYPE_MESSAGE,
                RuntimeFieldType::Singular(RuntimeType::Message(message_type))
                | RuntimeFieldType::Repeated(RuntimeType::Message(message_type)),
            ) => Ok(FieldKind::Message(message_type)),
            (other, _) => Err(Error::UnsupportedFieldType {
                field: field.name().to_string(),
                message: message.full_name().to_string(),
                field_type: format!("{other:?}"),
            }),
        }
    }
}

/// Map entry types are always nested in the message declaring the map.
fn map_entry_type(
    message: &MessageDescriptor,
    field: &FieldDescriptor,
) -> Result<MessageDescriptor> {
    let type_name = field.proto().type_name().trim_start_matches('.');
    message
        .nested_messages()
        .find(|nested| nested.full_name() == type_name)
        .ok_or_else(|| Error::MessageTypeNotFound(type_name.to_string()))
}

fn field_not_found(message: &MessageDescriptor, field: &str) -> Error {
    Error::FieldNotFound {
        field: field.to_string(),
        message: message.full_name().to_string(),
        descriptor: protobuf::text_format::print_to_string(message.proto()),
    }
}

/// Name of the real `oneof` a field belongs to.
fn containing_oneof(message: &MessageDescriptor, field: &FieldDescriptor) -> Option<String> {
    let proto = field.proto();
    if !proto.has_oneof_index() || proto.proto3_optional() {
        return None;
    }
    let index = usize::try_from(proto.oneof_index()).ok()?;
    message
        .proto()
        .oneof_decl
        .get(index)
        .map(|oneof| oneof.name().to_string())
}

/// Where an emitted nested type came from.
struct Origin {
    source: String,
    /// Sub-selection a message type was pruned with; `None` for enums and map entries
    selection: Option<FieldSelection>,
}

/// The definition under construction for one message, plus the bookkeeping
/// needed to emit each nested type name only once.
struct Scope {
    source: String,
    definition: MessageDefinition,
    origins: HashMap<String, Origin>,
}

impl Scope {
    fn new(source: &MessageDescriptor) -> Self {
        Self {
            source: source.full_name().to_string(),
            definition: MessageDefinition::new(source.name()),
            origins: HashMap::new(),
        }
    }

    /// The earlier emission of `name`, if it came from the same source type.
    ///
    /// A different source type under the same simple name cannot share the
    /// slot, so that is reported instead of silently reusing the first one.
    fn emitted(&self, name: &str, source: &str) -> Result<Option<&Origin>> {
        match self.origins.get(name) {
            None => Ok(None),
            Some(origin) if origin.source == source => Ok(Some(origin)),
            Some(origin) => Err(Error::TypeNameCollision {
                name: name.to_string(),
                scope: self.source.clone(),
                first: origin.source.clone(),
                second: source.to_string(),
            }),
        }
    }

    fn add_enum(&mut self, enum_type: &EnumDescriptor) -> Result<()> {
        if self.emitted(enum_type.name(), enum_type.full_name())?.is_some() {
            return Ok(());
        }

        let mut definition = EnumDefinition::new(enum_type.name());
        for value in enum_type.values() {
            definition.add_value(value.name(), value.value());
        }
        definition.allow_alias = enum_type.proto().options.allow_alias();

        debug!(
            "Emitting enum '{}' with {} values into '{}'",
            enum_type.full_name(),
            definition.values.len(),
            self.source
        );
        self.origins.insert(
            enum_type.name().to_string(),
            Origin {
                source: enum_type.full_name().to_string(),
                selection: None,
            },
        );
        self.definition.enums.push(definition);
        Ok(())
    }

    fn add_message(
        &mut self,
        message_type: &MessageDescriptor,
        selection: &FieldSelection,
        in_progress: &mut Vec<String>,
    ) -> Result<()> {
        if let Some(origin) = self.emitted(message_type.name(), message_type.full_name())? {
            if let Some(previous) = &origin.selection {
                if !previous.same_shape(selection) {
                    warn!(
                        "Message '{}' is already emitted into '{}'; the selection under '{}' is ignored",
                        message_type.full_name(),
                        self.source,
                        selection.name()
                    );
                }
            }
            return Ok(());
        }

        let nested = prune_message(message_type, selection, in_progress)?;
        self.origins.insert(
            message_type.name().to_string(),
            Origin {
                source: message_type.full_name().to_string(),
                selection: Some(selection.clone()),
            },
        );
        self.definition.messages.push(nested);
        Ok(())
    }

    /// Emit a map entry type. The value type, if it is a message or enum,
    /// goes into this scope next to the entry: map entries carry no nested
    /// types of their own.
    fn add_map_entry(
        &mut self,
        entry: &MessageDescriptor,
        selection: &FieldSelection,
        in_progress: &mut Vec<String>,
    ) -> Result<()> {
        if self.emitted(entry.name(), entry.full_name())?.is_some() {
            return Ok(());
        }

        if let Some(unknown) = selection
            .children()
            .find(|c| c.name() != MAP_KEY_NAME && c.name() != MAP_VALUE_NAME)
        {
            return Err(field_not_found(entry, unknown.name()));
        }

        let key = entry
            .field_by_name(MAP_KEY_NAME)
            .ok_or_else(|| field_not_found(entry, MAP_KEY_NAME))?;
        let value = entry
            .field_by_name(MAP_VALUE_NAME)
            .ok_or_else(|| field_not_found(entry, MAP_VALUE_NAME))?;

        let key_type = match FieldKind::of(entry, &key)? {
            FieldKind::Scalar(scalar) => FieldType::Scalar(scalar),
            _ => {
                return Err(Error::UnsupportedFieldType {
                    field: MAP_KEY_NAME.to_string(),
                    message: entry.full_name().to_string(),
                    field_type: format!("{:?}", key.proto().type_()),
                })
            }
        };

        let value_type = match FieldKind::of(entry, &value)? {
            FieldKind::Scalar(scalar) => FieldType::Scalar(scalar),
            FieldKind::Enum(enum_type) => {
                self.add_enum(&enum_type)?;
                FieldType::Named(enum_type.name().to_string())
            }
            FieldKind::Message(message_type) => {
                let leaf;
                let value_selection = match selection.child(MAP_VALUE_NAME) {
                    Some(child) => child,
                    None => {
                        leaf = FieldSelection::new(MAP_VALUE_NAME);
                        &leaf
                    }
                };
                self.add_message(&message_type, value_selection, in_progress)?;
                FieldType::Named(message_type.name().to_string())
            }
            FieldKind::Map(_) => {
                return Err(Error::UnsupportedFieldType {
                    field: MAP_VALUE_NAME.to_string(),
                    message: entry.full_name().to_string(),
                    field_type: "map".to_string(),
                })
            }
        };

        let mut definition = MessageDefinition::new(entry.name());
        definition.map_entry = true;
        definition.fields.push(FieldEntry::new(
            FieldLabel::Optional,
            key_type,
            MAP_KEY_NAME,
            MAP_KEY_NUMBER,
        ));
        definition.fields.push(FieldEntry::new(
            FieldLabel::Optional,
            value_type,
            MAP_VALUE_NAME,
            MAP_VALUE_NUMBER,
        ));

        self.origins.insert(
            entry.name().to_string(),
            Origin {
                source: entry.full_name().to_string(),
                selection: None,
            },
        );
        self.definition.messages.push(definition);
        Ok(())
    }
}

fn prune_message(
    source: &MessageDescriptor,
    selection: &FieldSelection,
    in_progress: &mut Vec<String>,
) -> Result<MessageDefinition> {
    let full_name = source.full_name().to_string();
    if in_progress.contains(&full_name) {
        let mut path = in_progress.clone();
        path.push(full_name.clone());
        return Err(Error::CyclicSchema {
            message: full_name,
            path,
        });
    }

    in_progress.push(full_name);
    let result = prune_fields(source, selection, in_progress);
    in_progress.pop();
    result
}

/// Resolve the selected fields of `source`, in declaration order.
fn select_fields(
    source: &MessageDescriptor,
    selection: &FieldSelection,
) -> Result<Vec<FieldDescriptor>> {
    if selection.is_leaf() {
        return Ok(source.fields().collect());
    }

    if let Some(missing) = selection
        .children()
        .find(|child| source.field_by_name(child.name()).is_none())
    {
        return Err(field_not_found(source, missing.name()));
    }

    Ok(source
        .fields()
        .filter(|field| selection.has_child(field.name()))
        .collect())
}

fn prune_fields(
    source: &MessageDescriptor,
    selection: &FieldSelection,
    in_progress: &mut Vec<String>,
) -> Result<MessageDefinition> {
    let fields = select_fields(source, selection)?;
    let mut scope = Scope::new(source);

    for field in &fields {
        let leaf;
        let child = match selection.child(field.name()) {
            Some(child) => child,
            None => {
                leaf = FieldSelection::new(field.name());
                &leaf
            }
        };

        let proto = field.proto();
        let label = FieldLabel::from_proto(proto.label());

        let entry = match FieldKind::of(source, field)? {
            FieldKind::Scalar(scalar) => {
                let default_value = (label != FieldLabel::Repeated && proto.has_default_value())
                    .then(|| proto.default_value().to_string());
                FieldEntry::new(label, FieldType::Scalar(scalar), field.name(), field.number())
                    .with_default_value(default_value)
            }
            FieldKind::Enum(enum_type) => {
                scope.add_enum(&enum_type)?;
                FieldEntry::new(
                    label,
                    FieldType::Named(enum_type.name().to_string()),
                    field.name(),
                    field.number(),
                )
            }
            FieldKind::Message(message_type) => {
                scope.add_message(&message_type, child, in_progress)?;
                FieldEntry::new(
                    label,
                    FieldType::Named(message_type.name().to_string()),
                    field.name(),
                    field.number(),
                )
            }
            FieldKind::Map(entry_type) => {
                scope.add_map_entry(&entry_type, child, in_progress)?;
                FieldEntry::new(
                    FieldLabel::Repeated,
                    FieldType::Named(entry_type.name().to_string()),
                    field.name(),
                    field.number(),
                )
            }
        };

        scope.definition.fields.push(
            entry
                .with_proto3_optional(proto.proto3_optional())
                .with_oneof(containing_oneof(source, field)),
        );
    }

    Ok(scope.definition)
}
