//! Static type to wire type mapping
//!
//! [`Type`] ties a Rust type to exactly one complete wire type. Signatures
//! always come from the static type, never from the runtime value, so an
//! empty `Vec<String>` still marshals as `as`.

use crate::error::WireError;
use crate::signature::{SigType, Signature};
use crate::value::Value;
use bus_types::ObjectPath;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A Rust type with a fixed wire representation
pub trait Type: Sized {
    /// The complete wire type this Rust type marshals as
    fn signature() -> SigType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, WireError>;
}

fn mismatch<T: Type>() -> WireError {
    WireError::ValueMismatch(T::signature().to_string())
}

macro_rules! basic_type {
    ($ty:ty, $sig:ident, $variant:ident) => {
        impl Type for $ty {
            fn signature() -> SigType {
                SigType::$sig
            }

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Result<Self, WireError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    _ => Err(mismatch::<Self>()),
                }
            }
        }
    };
}

basic_type!(u8, Byte, Byte);
basic_type!(bool, Boolean, Boolean);
basic_type!(i16, Int16, Int16);
basic_type!(u16, UInt16, UInt16);
basic_type!(i32, Int32, Int32);
basic_type!(u32, UInt32, UInt32);
basic_type!(i64, Int64, Int64);
basic_type!(u64, UInt64, UInt64);
basic_type!(f64, Double, Double);
basic_type!(String, String, String);
basic_type!(ObjectPath, ObjectPath, ObjectPath);
basic_type!(Signature, Signature, Signature);

/// A value whose type travels with it (`v`)
#[derive(Debug, Clone, PartialEq)]
pub struct Variant(Value);

impl Variant {
    /// Wraps a statically typed value
    pub fn new<T: Type>(value: &T) -> Self {
        Self(value.to_value())
    }

    /// Wraps an already dynamic value
    pub fn from_dynamic(value: Value) -> Self {
        Self(value)
    }

    /// Type of the contained value
    pub fn inner_signature(&self) -> SigType {
        self.0.signature()
    }

    /// Extracts the contained value if it has exactly type `T`
    pub fn get<T: Type>(&self) -> Result<T, WireError> {
        let found = self.0.signature();
        let expected = T::signature();
        if found != expected {
            return Err(WireError::SignatureMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        T::from_value(self.0.clone())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Type for Variant {
    fn signature() -> SigType {
        SigType::Variant
    }

    fn to_value(&self) -> Value {
        Value::Variant(Box::new(self.0.clone()))
    }

    fn from_value(value: Value) -> Result<Self, WireError> {
        match value {
            Value::Variant(inner) => Ok(Self(*inner)),
            _ => Err(mismatch::<Self>()),
        }
    }
}

impl<T: Type> Type for Vec<T> {
    fn signature() -> SigType {
        SigType::Array(Box::new(T::signature()))
    }

    fn to_value(&self) -> Value {
        Value::Array(T::signature(), self.iter().map(Type::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, WireError> {
        match value {
            Value::Array(_, items) => items.into_iter().map(T::from_value).collect(),
            _ => Err(mismatch::<Self>()),
        }
    }
}

fn dict_entries<K: Type, V: Type>(value: Value) -> Result<Vec<(K, V)>, WireError> {
    match value {
        Value::Array(_, items) => items
            .into_iter()
            .map(|item| match item {
                Value::DictEntry(key, value) => Ok((K::from_value(*key)?, V::from_value(*value)?)),
                _ => Err(WireError::ValueMismatch(
                    SigType::DictEntry(Box::new(K::signature()), Box::new(V::signature()))
                        .to_string(),
                )),
            })
            .collect(),
        _ => Err(WireError::ValueMismatch(
            SigType::dict(K::signature(), V::signature()).to_string(),
        )),
    }
}

fn dict_value<'a, K: Type + 'a, V: Type + 'a>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Value {
    let entry = SigType::DictEntry(Box::new(K::signature()), Box::new(V::signature()));
    Value::Array(
        entry,
        entries
            .map(|(k, v)| Value::DictEntry(Box::new(k.to_value()), Box::new(v.to_value())))
            .collect(),
    )
}

impl<K: Type + Eq + Hash, V: Type> Type for HashMap<K, V> {
    fn signature() -> SigType {
        SigType::dict(K::signature(), V::signature())
    }

    fn to_value(&self) -> Value {
        dict_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, WireError> {
        Ok(dict_entries(value)?.into_iter().collect())
    }
}

impl<K: Type + Ord, V: Type> Type for BTreeMap<K, V> {
    fn signature() -> SigType {
        SigType::dict(K::signature(), V::signature())
    }

    fn to_value(&self) -> Value {
        dict_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, WireError> {
        Ok(dict_entries(value)?.into_iter().collect())
    }
}

macro_rules! tuple_type {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Type),+> Type for ($($name,)+) {
            fn signature() -> SigType {
                SigType::Struct(vec![$($name::signature()),+])
            }

            fn to_value(&self) -> Value {
                Value::Struct(vec![$(self.$idx.to_value()),+])
            }

            fn from_value(value: Value) -> Result<Self, WireError> {
                match value {
                    Value::Struct(fields) => {
                        let mut fields = fields.into_iter();
                        Ok(($(
                            $name::from_value(fields.next().ok_or_else(mismatch::<Self>)?)?,
                        )+))
                    }
                    _ => Err(mismatch::<Self>()),
                }
            }
        }
    };
}

tuple_type!(A: 0);
tuple_type!(A: 0, B: 1);
tuple_type!(A: 0, B: 1, C: 2);
tuple_type!(A: 0, B: 1, C: 2, D: 3);
tuple_type!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_type!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
tuple_type!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
tuple_type!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
