//! Bus messages and their framing
//!
//! A [`Message`] is one method call, method return, error or signal. The body
//! is kept in encoded form alongside its [`Signature`]; typed access goes
//! through [`MessageWriter`] and [`MessageReader`].
//!
//! Serials are drawn from a process-wide counter when a message is built, so
//! every message created in this process carries a distinct non-zero serial
//! and a reply can always be correlated to the call it answers.

use crate::codec::{Decoder, Encoder};
use crate::cursor::{MessageReader, MessageWriter};
use crate::error::WireError;
use crate::signature::{SigType, Signature};
use crate::value::Value;
use bus_types::{validate_error_name, validate_interface_name, validate_member_name, BusName, ObjectPath};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Protocol version written into every header
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest body accepted by [`Message::decode`] (128 MiB)
pub const MAX_BODY_LENGTH: usize = 1 << 27;

const LITTLE_ENDIAN: u8 = b'l';
const FIXED_HEADER_LENGTH: usize = 12;

const FIELD_PATH: u8 = 1;
const FIELD_INTERFACE: u8 = 2;
const FIELD_MEMBER: u8 = 3;
const FIELD_ERROR_NAME: u8 = 4;
const FIELD_REPLY_SERIAL: u8 = 5;
const FIELD_DESTINATION: u8 = 6;
const FIELD_SENDER: u8 = 7;
const FIELD_SIGNATURE: u8 = 8;

static NEXT_SERIAL: AtomicU32 = AtomicU32::new(1);

/// Returns a fresh non-zero serial
pub fn next_serial() -> u32 {
    loop {
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        if serial != 0 {
            return serial;
        }
    }
}

/// Kind of message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
}

impl MessageType {
    pub fn code(&self) -> u8 {
        match self {
            Self::MethodCall => 1,
            Self::MethodReturn => 2,
            Self::Error => 3,
            Self::Signal => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::MethodCall),
            2 => Some(Self::MethodReturn),
            3 => Some(Self::Error),
            4 => Some(Self::Signal),
            _ => None,
        }
    }

    /// Name used in match rules (`method_call`, `signal`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MethodCall => "method_call",
            Self::MethodReturn => "method_return",
            Self::Error => "error",
            Self::Signal => "signal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "method_call" => Some(Self::MethodCall),
            "method_return" => Some(Self::MethodReturn),
            "error" => Some(Self::Error),
            "signal" => Some(Self::Signal),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageFlags {
    /// The caller does not want a return or error
    pub no_reply_expected: bool,
    /// Do not launch the destination if it is not running
    pub no_auto_start: bool,
}

impl MessageFlags {
    pub const NO_REPLY_EXPECTED: u8 = 0x1;
    pub const NO_AUTO_START: u8 = 0x2;

    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.no_reply_expected {
            bits |= Self::NO_REPLY_EXPECTED;
        }
        if self.no_auto_start {
            bits |= Self::NO_AUTO_START;
        }
        bits
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            no_reply_expected: bits & Self::NO_REPLY_EXPECTED != 0,
            no_auto_start: bits & Self::NO_AUTO_START != 0,
        }
    }
}

/// One message on the bus
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    message_type: MessageType,
    flags: MessageFlags,
    serial: u32,
    reply_serial: Option<u32>,
    path: Option<ObjectPath>,
    interface: Option<String>,
    member: Option<String>,
    error_name: Option<String>,
    destination: Option<BusName>,
    sender: Option<BusName>,
    pub(crate) signature: Signature,
    pub(crate) body: Vec<u8>,
}

impl Message {
    fn empty(message_type: MessageType) -> Self {
        Self {
            message_type,
            flags: MessageFlags::default(),
            serial: next_serial(),
            reply_serial: None,
            path: None,
            interface: None,
            member: None,
            error_name: None,
            destination: None,
            sender: None,
            signature: Signature::empty(),
            body: Vec::new(),
        }
    }

    /// Builds a method call with a fresh serial
    pub fn method_call(
        destination: Option<BusName>,
        path: ObjectPath,
        interface: &str,
        member: &str,
    ) -> Result<Self, WireError> {
        validate_interface_name(interface)?;
        validate_member_name(member)?;
        let mut msg = Self::empty(MessageType::MethodCall);
        msg.destination = destination;
        msg.path = Some(path);
        msg.interface = Some(interface.to_string());
        msg.member = Some(member.to_string());
        Ok(msg)
    }

    /// Builds the successful reply to `call`
    pub fn method_return(call: &Message) -> Self {
        let mut msg = Self::empty(MessageType::MethodReturn);
        msg.reply_serial = Some(call.serial);
        msg.destination = call.sender.clone();
        msg
    }

    /// Builds an error reply to `call` carrying `description` as its body
    pub fn error(call: &Message, error_name: &str, description: &str) -> Result<Self, WireError> {
        validate_error_name(error_name)?;
        let mut msg = Self::empty(MessageType::Error);
        msg.reply_serial = Some(call.serial);
        msg.destination = call.sender.clone();
        msg.error_name = Some(error_name.to_string());
        msg.writer().write(&description.to_string());
        Ok(msg)
    }

    /// Builds a broadcast signal
    pub fn signal(path: ObjectPath, interface: &str, member: &str) -> Result<Self, WireError> {
        validate_interface_name(interface)?;
        validate_member_name(member)?;
        let mut msg = Self::empty(MessageType::Signal);
        msg.path = Some(path);
        msg.interface = Some(interface.to_string());
        msg.member = Some(member.to_string());
        Ok(msg)
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn reply_serial(&self) -> Option<u32> {
        self.reply_serial
    }

    pub fn path(&self) -> Option<&ObjectPath> {
        self.path.as_ref()
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    pub fn error_name(&self) -> Option<&str> {
        self.error_name.as_deref()
    }

    pub fn destination(&self) -> Option<&BusName> {
        self.destination.as_ref()
    }

    pub fn sender(&self) -> Option<&BusName> {
        self.sender.as_ref()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn no_reply_expected(&self) -> bool {
        self.flags.no_reply_expected
    }

    pub fn set_no_reply_expected(&mut self, value: bool) {
        self.flags.no_reply_expected = value;
    }

    /// Builder form of [`Message::set_no_reply_expected`]
    pub fn with_no_reply_expected(mut self) -> Self {
        self.flags.no_reply_expected = true;
        self
    }

    /// Stamps the sending connection's name; done by the transport
    pub fn set_sender(&mut self, sender: BusName) {
        self.sender = Some(sender);
    }

    pub fn set_destination(&mut self, destination: Option<BusName>) {
        self.destination = destination;
    }

    /// Appends typed arguments to the body
    pub fn writer(&mut self) -> MessageWriter<'_> {
        MessageWriter::new(self)
    }

    /// Reads typed arguments from the start of the body
    pub fn reader(&self) -> MessageReader<'_> {
        MessageReader::new(self)
    }

    /// Returns the human-readable description of an error message
    pub fn error_description(&self) -> Option<String> {
        if self.message_type != MessageType::Error {
            return None;
        }
        self.reader().read::<String>().ok()
    }

    /// Encodes header and body into wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = Vec::new();
        let mut field = |code: u8, value: Value| {
            fields.push(Value::Struct(vec![
                Value::Byte(code),
                Value::Variant(Box::new(value)),
            ]));
        };
        if let Some(path) = &self.path {
            field(FIELD_PATH, Value::ObjectPath(path.clone()));
        }
        if let Some(interface) = &self.interface {
            field(FIELD_INTERFACE, Value::String(interface.clone()));
        }
        if let Some(member) = &self.member {
            field(FIELD_MEMBER, Value::String(member.clone()));
        }
        if let Some(error_name) = &self.error_name {
            field(FIELD_ERROR_NAME, Value::String(error_name.clone()));
        }
        if let Some(reply_serial) = self.reply_serial {
            field(FIELD_REPLY_SERIAL, Value::UInt32(reply_serial));
        }
        if let Some(destination) = &self.destination {
            field(FIELD_DESTINATION, Value::String(destination.to_string()));
        }
        if let Some(sender) = &self.sender {
            field(FIELD_SENDER, Value::String(sender.to_string()));
        }
        if !self.signature.is_empty() {
            field(FIELD_SIGNATURE, Value::Signature(self.signature.clone()));
        }

        let mut buf = Vec::with_capacity(FIXED_HEADER_LENGTH + 64 + self.body.len());
        buf.extend_from_slice(&[
            LITTLE_ENDIAN,
            self.message_type.code(),
            self.flags.bits(),
            PROTOCOL_VERSION,
        ]);
        buf.extend_from_slice(&(self.body.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.serial.to_le_bytes());
        let mut encoder = Encoder::new(&mut buf);
        encoder.encode(&Value::Array(header_field_type(), fields));
        encoder.pad(8);
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Parses wire bytes into a message, checking the required header fields
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < FIXED_HEADER_LENGTH {
            return Err(malformed("shorter than the fixed header"));
        }
        if bytes[0] != LITTLE_ENDIAN {
            return Err(malformed("only little-endian messages are supported"));
        }
        let message_type =
            MessageType::from_code(bytes[1]).ok_or_else(|| malformed("unknown message type"))?;
        let flags = MessageFlags::from_bits(bytes[2]);
        if bytes[3] != PROTOCOL_VERSION {
            return Err(malformed("unsupported protocol version"));
        }
        let body_length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        if body_length > MAX_BODY_LENGTH {
            return Err(malformed("body too long"));
        }
        let serial = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if serial == 0 {
            return Err(malformed("serial must be non-zero"));
        }

        let mut decoder = Decoder::at(bytes, FIXED_HEADER_LENGTH);
        let fields = decoder
            .decode(&SigType::Array(Box::new(header_field_type())))
            .map_err(|e| WireError::MalformedMessage(format!("header fields: {}", e)))?;
        decoder
            .align(8)
            .map_err(|_| malformed("header padding is truncated"))?;
        let body_start = decoder.position();
        if bytes.len() != body_start + body_length {
            return Err(malformed("body length does not match the header"));
        }

        let mut msg = Self {
            message_type,
            flags,
            serial,
            reply_serial: None,
            path: None,
            interface: None,
            member: None,
            error_name: None,
            destination: None,
            sender: None,
            signature: Signature::empty(),
            body: bytes[body_start..].to_vec(),
        };
        if let Value::Array(_, entries) = fields {
            for entry in entries {
                msg.apply_header_field(entry)?;
            }
        }
        msg.check_required_fields()?;
        Ok(msg)
    }

    fn apply_header_field(&mut self, entry: Value) -> Result<(), WireError> {
        let (code, value) = match entry {
            Value::Struct(mut parts) if parts.len() == 2 => {
                let value = parts.pop();
                let code = parts.pop();
                match (code, value) {
                    (Some(Value::Byte(code)), Some(Value::Variant(value))) => (code, *value),
                    _ => return Err(malformed("header field is not (yv)")),
                }
            }
            _ => return Err(malformed("header field is not (yv)")),
        };
        match (code, value) {
            (FIELD_PATH, Value::ObjectPath(path)) => self.path = Some(path),
            (FIELD_INTERFACE, Value::String(name)) => {
                validate_interface_name(&name)?;
                self.interface = Some(name);
            }
            (FIELD_MEMBER, Value::String(name)) => {
                validate_member_name(&name)?;
                self.member = Some(name);
            }
            (FIELD_ERROR_NAME, Value::String(name)) => {
                validate_error_name(&name)?;
                self.error_name = Some(name);
            }
            (FIELD_REPLY_SERIAL, Value::UInt32(serial)) => self.reply_serial = Some(serial),
            (FIELD_DESTINATION, Value::String(name)) => self.destination = Some(BusName::new(name)?),
            (FIELD_SENDER, Value::String(name)) => self.sender = Some(BusName::new(name)?),
            (FIELD_SIGNATURE, Value::Signature(signature)) => self.signature = signature,
            (FIELD_PATH..=FIELD_SIGNATURE, _) => {
                return Err(malformed("header field has the wrong type"))
            }
            (code, _) => {
                tracing::trace!(code, "ignoring unknown header field");
            }
        }
        Ok(())
    }

    fn check_required_fields(&self) -> Result<(), WireError> {
        let missing = match self.message_type {
            MessageType::MethodCall => {
                if self.path.is_none() {
                    Some("method call without path")
                } else if self.member.is_none() {
                    Some("method call without member")
                } else {
                    None
                }
            }
            MessageType::Signal => {
                if self.path.is_none() || self.interface.is_none() || self.member.is_none() {
                    Some("signal without path, interface and member")
                } else {
                    None
                }
            }
            MessageType::Error => {
                if self.error_name.is_none() {
                    Some("error without error name")
                } else if self.reply_serial.is_none() {
                    Some("error without reply serial")
                } else {
                    None
                }
            }
            MessageType::MethodReturn => {
                if self.reply_serial.is_none() {
                    Some("method return without reply serial")
                } else {
                    None
                }
            }
        };
        match missing {
            Some(reason) => Err(malformed(reason)),
            None => Ok(()),
        }
    }
}

fn header_field_type() -> SigType {
    SigType::Struct(vec![SigType::Byte, SigType::Variant])
}

fn malformed(reason: &str) -> WireError {
    WireError::MalformedMessage(reason.to_string())
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} serial={}", self.message_type, self.serial)?;
        if let Some(reply_serial) = self.reply_serial {
            write!(f, " reply_serial={}", reply_serial)?;
        }
        if let Some(path) = &self.path {
            write!(f, " path={}", path)?;
        }
        if let Some(interface) = &self.interface {
            write!(f, " interface={}", interface)?;
        }
        if let Some(member) = &self.member {
            write!(f, " member={}", member)?;
        }
        if let Some(error_name) = &self.error_name {
            write!(f, " error={}", error_name)?;
        }
        write!(f, " signature='{}'", self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> Message {
        Message::method_call(
            Some(BusName::new("org.example.Service").unwrap()),
            ObjectPath::new("/org/example").unwrap(),
            "org.example.Iface",
            "Frobnicate",
        )
        .unwrap()
    }

    #[test]
    fn test_serials_are_fresh_and_non_zero() {
        let a = call();
        let b = call();
        assert_ne!(a.serial(), 0);
        assert_ne!(a.serial(), b.serial());
    }

    #[test]
    fn test_method_call_rejects_bad_names() {
        let path = ObjectPath::root();
        assert!(Message::method_call(None, path.clone(), "nodots", "M").is_err());
        assert!(Message::method_call(None, path, "a.b", "Bad.Member").is_err());
    }

    #[test]
    fn test_return_and_error_correlate_with_call() {
        let mut call = call();
        call.set_sender(BusName::new(":1.7").unwrap());

        let reply = Message::method_return(&call);
        assert_eq!(reply.message_type(), MessageType::MethodReturn);
        assert_eq!(reply.reply_serial(), Some(call.serial()));
        assert_eq!(reply.destination().map(|d| d.as_str()), Some(":1.7"));

        let error = Message::error(&call, "org.example.Error.Nope", "no").unwrap();
        assert_eq!(error.reply_serial(), Some(call.serial()));
        assert_eq!(error.error_name(), Some("org.example.Error.Nope"));
        assert_eq!(error.error_description().as_deref(), Some("no"));
        assert!(Message::error(&call, "bad", "no").is_err());
    }

    #[test]
    fn test_encode_decode_preserves_header_and_body() {
        let mut msg = call();
        msg.set_sender(BusName::new(":1.3").unwrap());
        msg.writer().write(&42i64).write(&"hello".to_string());

        let bytes = msg.encode();
        assert_eq!(bytes[0], b'l');
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);

        let mut reader = decoded.reader();
        assert_eq!(reader.read::<i64>().unwrap(), 42);
        assert_eq!(reader.read::<String>().unwrap(), "hello");
        reader.finish().unwrap();
    }

    #[test]
    fn test_decode_rejects_truncated_and_incomplete() {
        let bytes = call().encode();
        assert!(Message::decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(Message::decode(&bytes[..8]).is_err());

        let mut big_endian = bytes.clone();
        big_endian[0] = b'B';
        assert!(Message::decode(&big_endian).is_err());

        // A return without reply serial is never valid
        let mut raw = call().encode();
        raw[1] = MessageType::MethodReturn.code();
        assert!(matches!(
            Message::decode(&raw),
            Err(WireError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_no_reply_flag_survives_framing() {
        let msg = call().with_no_reply_expected();
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert!(decoded.no_reply_expected());
    }
}
