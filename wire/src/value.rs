//! Dynamically typed wire values

use crate::signature::{SigType, Signature};
use bus_types::ObjectPath;

/// A decoded value together with enough shape to recover its signature
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    ObjectPath(ObjectPath),
    Signature(Signature),
    Variant(Box<Value>),
    /// Element type is kept so empty arrays still have a signature
    Array(SigType, Vec<Value>),
    Struct(Vec<Value>),
    DictEntry(Box<Value>, Box<Value>),
}

impl Value {
    pub fn signature(&self) -> SigType {
        match self {
            Self::Byte(_) => SigType::Byte,
            Self::Boolean(_) => SigType::Boolean,
            Self::Int16(_) => SigType::Int16,
            Self::UInt16(_) => SigType::UInt16,
            Self::Int32(_) => SigType::Int32,
            Self::UInt32(_) => SigType::UInt32,
            Self::Int64(_) => SigType::Int64,
            Self::UInt64(_) => SigType::UInt64,
            Self::Double(_) => SigType::Double,
            Self::String(_) => SigType::String,
            Self::ObjectPath(_) => SigType::ObjectPath,
            Self::Signature(_) => SigType::Signature,
            Self::Variant(_) => SigType::Variant,
            Self::Array(element, _) => SigType::Array(Box::new(element.clone())),
            Self::Struct(fields) => SigType::Struct(fields.iter().map(Value::signature).collect()),
            Self::DictEntry(key, value) => {
                SigType::DictEntry(Box::new(key.signature()), Box::new(value.signature()))
            }
        }
    }

    /// Returns the string payload of string-like values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::ObjectPath(p) => Some(p.as_str()),
            _ => None,
        }
    }
}
