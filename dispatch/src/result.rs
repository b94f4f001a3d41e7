//! Outcome of one remote call

use bus_types::error_names;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use wire::{Message, MessageBody, MessageType, WireError};

/// Error view of a [`CallResult`] for use with `?`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The peer replied with an error, or the call timed out
    #[error("{0}")]
    Remote(String),

    /// The result holds neither a value nor an error
    #[error("Call has no outcome")]
    NoOutcome,
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome<T> {
    Empty,
    Value(T),
    Error(String),
}

/// Result of a remote invocation: a typed value or an error description
///
/// A default-constructed result is not an error and holds no value. An error
/// description has the form `"<error name>: <error description>"` when it
/// came from the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult<T> {
    outcome: Outcome<T>,
}

impl<T> CallResult<T> {
    pub fn from_value(value: T) -> Self {
        Self {
            outcome: Outcome::Value(value),
        }
    }

    pub fn from_error(description: impl fmt::Display) -> Self {
        Self {
            outcome: Outcome::Error(description.to_string()),
        }
    }

    /// The result recorded when no reply arrives in time
    pub fn timed_out(member: &str, timeout: Duration) -> Self {
        Self::from_error(format!(
            "{}: No reply to '{}' within {} ms",
            error_names::NO_REPLY,
            member,
            timeout.as_millis()
        ))
    }

    /// Marks the result as failed, replacing any value or earlier error
    pub fn set_error(&mut self, description: impl fmt::Display) {
        self.outcome = Outcome::Error(description.to_string());
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Error(description) => Some(description),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self.outcome {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<T, CallError> {
        match self.outcome {
            Outcome::Value(value) => Ok(value),
            Outcome::Error(description) => Err(CallError::Remote(description)),
            Outcome::Empty => Err(CallError::NoOutcome),
        }
    }
}

impl<T: MessageBody> CallResult<T> {
    /// Builds the result of a call from its reply
    ///
    /// An error reply becomes an error result. A method return must carry
    /// exactly the body `T` describes. Anything else is a local error, not a
    /// failed call.
    pub fn from_message(msg: &Message) -> Result<Self, WireError> {
        match msg.message_type() {
            MessageType::Error => {
                let name = msg.error_name().unwrap_or(error_names::FAILED);
                let description = msg.error_description().unwrap_or_default();
                Ok(Self::from_error(format!("{}: {}", name, description)))
            }
            MessageType::MethodReturn => {
                let value = T::read_body(&mut msg.reader())?;
                Ok(Self::from_value(value))
            }
            found => Err(WireError::UnexpectedMessageType {
                expected: MessageType::MethodReturn,
                found,
            }),
        }
    }
}

impl<T> Default for CallResult<T> {
    fn default() -> Self {
        Self {
            outcome: Outcome::Empty,
        }
    }
}
