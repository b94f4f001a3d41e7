//! Typed write and read cursors over a message body

use crate::codec::{Decoder, Encoder};
use crate::error::WireError;
use crate::message::Message;
use crate::types::Type;
use crate::value::Value;

/// Appends arguments to a message body
///
/// Each write contributes the static signature of the written type, so the
/// body's signature always describes exactly what was written.
pub struct MessageWriter<'a> {
    msg: &'a mut Message,
}

impl<'a> MessageWriter<'a> {
    pub(crate) fn new(msg: &'a mut Message) -> Self {
        Self { msg }
    }

    /// Appends one argument
    pub fn write<T: Type>(&mut self, value: &T) -> &mut Self {
        self.msg.signature.push(T::signature());
        Encoder::new(&mut self.msg.body).encode(&value.to_value());
        self
    }

    /// Appends one dynamically typed argument
    pub fn write_value(&mut self, value: &Value) -> &mut Self {
        self.msg.signature.push(value.signature());
        Encoder::new(&mut self.msg.body).encode(value);
        self
    }
}

/// Consumes arguments from a message body in order
pub struct MessageReader<'a> {
    msg: &'a Message,
    decoder: Decoder<'a>,
    index: usize,
}

impl<'a> MessageReader<'a> {
    pub(crate) fn new(msg: &'a Message) -> Self {
        Self {
            msg,
            decoder: Decoder::new(&msg.body),
            index: 0,
        }
    }

    /// Reads the next argument as `T`
    ///
    /// Fails with [`WireError::SignatureMismatch`] if the next argument has a
    /// different type and with [`WireError::BodyExhausted`] if none is left.
    /// A failed read does not advance the cursor.
    pub fn read<T: Type>(&mut self) -> Result<T, WireError> {
        let expected = T::signature();
        let found = self
            .msg
            .signature
            .types()
            .get(self.index)
            .ok_or(WireError::BodyExhausted {
                consumed: self.index,
            })?;
        if *found != expected {
            return Err(WireError::SignatureMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        let value = self.read_value()?;
        T::from_value(value)
    }

    /// Reads the next argument whatever its type
    pub fn read_value(&mut self) -> Result<Value, WireError> {
        let ty = self
            .msg
            .signature
            .types()
            .get(self.index)
            .ok_or(WireError::BodyExhausted {
                consumed: self.index,
            })?;
        let value = self.decoder.decode(ty)?;
        self.index += 1;
        Ok(value)
    }

    /// Number of arguments not yet read
    pub fn remaining(&self) -> usize {
        self.msg.signature.len() - self.index
    }

    /// Fails if any argument was left unread
    pub fn finish(&self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(WireError::TrailingArguments { remaining }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus_types::ObjectPath;

    fn signal() -> Message {
        Message::signal(ObjectPath::root(), "org.example.Iface", "Changed").unwrap()
    }

    #[test]
    fn test_signature_follows_static_types() {
        let mut msg = signal();
        msg.writer()
            .write(&true)
            .write(&7u16)
            .write(&vec!["a".to_string()])
            .write(&(1i32, "b".to_string()));
        assert_eq!(msg.signature().to_string(), "bqas(is)");
    }

    #[test]
    fn test_read_wrong_type_fails() {
        let mut msg = signal();
        msg.writer().write(&42i32);
        let mut reader = msg.reader();
        let err = reader.read::<i64>().unwrap_err();
        assert_eq!(
            err,
            WireError::SignatureMismatch {
                expected: "x".to_string(),
                found: "i".to_string()
            }
        );
        // cursor did not move
        assert_eq!(reader.read::<i32>().unwrap(), 42);
    }

    #[test]
    fn test_over_and_under_consumption() {
        let mut msg = signal();
        msg.writer().write(&1u32).write(&2u32);

        let reader = msg.reader();
        assert_eq!(reader.finish(), Err(WireError::TrailingArguments { remaining: 2 }));

        let mut reader = msg.reader();
        reader.read::<u32>().unwrap();
        reader.read::<u32>().unwrap();
        assert!(reader.finish().is_ok());
        assert_eq!(
            reader.read::<u32>(),
            Err(WireError::BodyExhausted { consumed: 2 })
        );
    }

    #[test]
    fn test_write_value_matches_typed_write() {
        let mut typed = signal();
        typed.writer().write(&5i64);
        let mut dynamic = signal();
        dynamic.writer().write_value(&Value::Int64(5));
        assert_eq!(typed.signature(), dynamic.signature());
        assert_eq!(typed.body_bytes(), dynamic.body_bytes());
    }
}
