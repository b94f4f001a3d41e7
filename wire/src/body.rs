//! Whole-body marshaling
//!
//! [`Arguments`] describes the ordered argument list of a method call and
//! [`MessageBody`] the payload of a reply or signal. Both read the body
//! completely: a short or long body is an arity error, never a silent
//! truncation.

use crate::cursor::{MessageReader, MessageWriter};
use crate::error::WireError;
use crate::signature::Signature;
use crate::types::Type;

/// Ordered argument list of a method call
pub trait Arguments: Sized {
    fn signature() -> Signature;

    fn write_args(&self, writer: &mut MessageWriter<'_>);

    fn read_args(reader: &mut MessageReader<'_>) -> Result<Self, WireError>;
}

impl Arguments for () {
    fn signature() -> Signature {
        Signature::empty()
    }

    fn write_args(&self, _writer: &mut MessageWriter<'_>) {}

    fn read_args(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        reader.finish()
    }
}

macro_rules! arguments_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Type),+> Arguments for ($($name,)+) {
            fn signature() -> Signature {
                Signature::new(vec![$($name::signature()),+])
            }

            fn write_args(&self, writer: &mut MessageWriter<'_>) {
                $(writer.write(&self.$idx);)+
            }

            fn read_args(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
                let args = ($(reader.read::<$name>()?,)+);
                reader.finish()?;
                Ok(args)
            }
        }
    };
}

arguments_tuple!(A: 0);
arguments_tuple!(A: 0, B: 1);
arguments_tuple!(A: 0, B: 1, C: 2);
arguments_tuple!(A: 0, B: 1, C: 2, D: 3);
arguments_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
arguments_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Payload of a reply or signal
///
/// `()` is the empty body. Any single [`Type`] is a one-argument body.
/// Payloads with several top-level arguments implement this trait by hand.
pub trait MessageBody: Sized {
    fn signature() -> Signature;

    fn write_body(&self, writer: &mut MessageWriter<'_>);

    fn read_body(reader: &mut MessageReader<'_>) -> Result<Self, WireError>;
}

impl MessageBody for () {
    fn signature() -> Signature {
        Signature::empty()
    }

    fn write_body(&self, _writer: &mut MessageWriter<'_>) {}

    fn read_body(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        reader.finish()
    }
}

impl<T: Type> MessageBody for T {
    fn signature() -> Signature {
        Signature::new(vec![<T as Type>::signature()])
    }

    fn write_body(&self, writer: &mut MessageWriter<'_>) {
        writer.write(self);
    }

    fn read_body(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        let value = reader.read::<T>()?;
        reader.finish()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use bus_types::ObjectPath;

    fn signal() -> Message {
        Message::signal(ObjectPath::root(), "org.example.Iface", "Changed").unwrap()
    }

    #[test]
    fn test_arguments_round_trip() {
        let mut msg = signal();
        ("a".to_string(), 3u32, true).write_args(&mut msg.writer());
        assert_eq!(msg.signature().to_string(), "sub");
        assert_eq!(<(String, u32, bool) as Arguments>::signature(), *msg.signature());

        let args = <(String, u32, bool)>::read_args(&mut msg.reader()).unwrap();
        assert_eq!(args, ("a".to_string(), 3, true));
    }

    #[test]
    fn test_arguments_arity_mismatch() {
        let mut msg = signal();
        (1i32, 2i32).write_args(&mut msg.writer());
        assert!(matches!(
            <(i32,)>::read_args(&mut msg.reader()),
            Err(WireError::TrailingArguments { remaining: 1 })
        ));
        assert!(matches!(
            <(i32, i32, i32)>::read_args(&mut msg.reader()),
            Err(WireError::BodyExhausted { consumed: 2 })
        ));
        assert!(matches!(
            <()>::read_args(&mut msg.reader()),
            Err(WireError::TrailingArguments { remaining: 2 })
        ));
    }

    #[test]
    fn test_empty_body_against_value() {
        let msg = signal();
        assert!(matches!(
            <i64 as MessageBody>::read_body(&mut msg.reader()),
            Err(WireError::BodyExhausted { consumed: 0 })
        ));
        assert!(<() as MessageBody>::read_body(&mut msg.reader()).is_ok());
    }
}
