//! Owned values produced by partial decoding.
//!
//! Decoded runtime messages are projected into these types field by field
//! through reflection. Only known fields are visited, so anything the
//! pruned schema does not describe never shows up here.

use protobuf::reflect::{ReflectFieldRef, ReflectValueRef};
use protobuf::MessageDyn;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A field value in a partially decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialValue {
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    /// `name` is `None` for numbers the enum does not declare.
    Enum {
        number: i32,
        name: Option<String>,
    },
    Message(Box<PartialMessage>),
    Repeated(Vec<PartialValue>),
    /// Entries sorted by key.
    Map(Vec<(PartialValue, PartialValue)>),
}

impl PartialValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PartialValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PartialValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PartialValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any signed or unsigned integer that fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PartialValue::Int32(v) => Some(i64::from(*v)),
            PartialValue::Int64(v) => Some(*v),
            PartialValue::Uint32(v) => Some(i64::from(*v)),
            PartialValue::Uint64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PartialValue::Uint32(v) => Some(u64::from(*v)),
            PartialValue::Uint64(v) => Some(*v),
            PartialValue::Int32(v) => u64::try_from(*v).ok(),
            PartialValue::Int64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PartialValue::Double(v) => Some(*v),
            PartialValue::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Symbolic name of an enum value.
    pub fn as_enum_name(&self) -> Option<&str> {
        match self {
            PartialValue::Enum { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    pub fn as_enum_number(&self) -> Option<i32> {
        match self {
            PartialValue::Enum { number, .. } => Some(*number),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&PartialMessage> {
        match self {
            PartialValue::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_repeated(&self) -> Option<&[PartialValue]> {
        match self {
            PartialValue::Repeated(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(PartialValue, PartialValue)]> {
        match self {
            PartialValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a map entry by string key.
    pub fn map_get(&self, key: &str) -> Option<&PartialValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    fn from_reflect(value: ReflectValueRef<'_>) -> Self {
        match value {
            ReflectValueRef::F64(v) => PartialValue::Double(v),
            ReflectValueRef::F32(v) => PartialValue::Float(v),
            ReflectValueRef::I32(v) => PartialValue::Int32(v),
            ReflectValueRef::I64(v) => PartialValue::Int64(v),
            ReflectValueRef::U32(v) => PartialValue::Uint32(v),
            ReflectValueRef::U64(v) => PartialValue::Uint64(v),
            ReflectValueRef::Bool(v) => PartialValue::Bool(v),
            ReflectValueRef::String(v) => PartialValue::String(v.to_string()),
            ReflectValueRef::Bytes(v) => PartialValue::Bytes(v.to_vec()),
            ReflectValueRef::Enum(descriptor, number) => PartialValue::Enum {
                number,
                name: descriptor
                    .value_by_number(number)
                    .map(|v| v.name().to_string()),
            },
            ReflectValueRef::Message(message) => {
                PartialValue::Message(Box::new(PartialMessage::from_dyn(&*message)))
            }
        }
    }
}

/// Map keys are integers, bools or strings.
fn key_order(a: &PartialValue, b: &PartialValue) -> Ordering {
    match (a, b) {
        (PartialValue::String(a), PartialValue::String(b)) => a.cmp(b),
        (PartialValue::Bool(a), PartialValue::Bool(b)) => a.cmp(b),
        (PartialValue::Uint64(a), PartialValue::Uint64(b)) => a.cmp(b),
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        },
    }
}

/// A partially decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialMessage {
    /// Fully qualified message type name
    pub message_type: String,
    /// Fields present in the payload, by name
    pub fields: BTreeMap<String, PartialValue>,
}

impl PartialMessage {
    /// Project a runtime message into an owned value.
    ///
    /// Singular fields follow the runtime's presence rules, so proto3
    /// implicit-presence fields holding their zero value are absent. Empty
    /// repeated and map fields are absent too.
    pub fn from_dyn(message: &dyn MessageDyn) -> Self {
        let descriptor = message.descriptor_dyn();
        let mut fields = BTreeMap::new();

        for field in descriptor.fields() {
            let value = match field.get_reflect(message) {
                ReflectFieldRef::Optional(optional) => {
                    optional.value().map(PartialValue::from_reflect)
                }
                ReflectFieldRef::Repeated(repeated) => {
                    let values: Vec<PartialValue> = (0..repeated.len())
                        .map(|i| PartialValue::from_reflect(repeated.get(i)))
                        .collect();
                    (!values.is_empty()).then_some(PartialValue::Repeated(values))
                }
                ReflectFieldRef::Map(map) => {
                    let mut entries: Vec<(PartialValue, PartialValue)> = map
                        .into_iter()
                        .map(|(k, v)| {
                            (PartialValue::from_reflect(k), PartialValue::from_reflect(v))
                        })
                        .collect();
                    entries.sort_by(|(a, _), (b, _)| key_order(a, b));
                    (!entries.is_empty()).then_some(PartialValue::Map(entries))
                }
            };

            if let Some(value) = value {
                fields.insert(field.name().to_string(), value);
            }
        }

        Self {
            message_type: descriptor.full_name().to_string(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&PartialValue> {
        self.fields.get(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Names of present fields, sorted.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
