//! Marshaling error types

use crate::message::MessageType;
use bus_types::NameError;
use thiserror::Error;

/// Errors raised while building, framing or reading a message
///
/// Every variant is a local contract violation: the caller wrote or expected
/// something the wire data does not contain. Remote failures never appear here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    /// The next argument in the body has a different type than requested
    #[error("Signature mismatch: expected '{expected}', found '{found}'")]
    SignatureMismatch { expected: String, found: String },

    /// A read was attempted past the last argument
    #[error("Message body exhausted after {consumed} argument(s)")]
    BodyExhausted { consumed: usize },

    /// The body holds more arguments than were read
    #[error("{remaining} unread argument(s) left in message body")]
    TrailingArguments { remaining: usize },

    /// The message is of the wrong kind for the requested operation
    #[error("Unexpected message type: expected {expected}, found {found}")]
    UnexpectedMessageType {
        expected: MessageType,
        found: MessageType,
    },

    /// Body bytes do not decode under the declared signature
    #[error("Malformed message body: {0}")]
    MalformedBody(String),

    /// Header framing is invalid
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Signature string violates the type grammar
    #[error("Invalid signature '{signature}': {reason}")]
    InvalidSignature {
        signature: String,
        reason: &'static str,
    },

    /// A dynamic value did not have the shape the static type requires
    #[error("Value does not match type '{0}'")]
    ValueMismatch(String),

    /// Match rule text could not be parsed
    #[error("Invalid match rule '{0}'")]
    InvalidMatchRule(String),

    #[error(transparent)]
    Name(#[from] NameError),
}
