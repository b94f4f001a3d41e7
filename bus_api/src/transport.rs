//! Transport abstraction

use crate::BusError;
use bus_types::BusName;
use std::time::Duration;
use wire::Message;

/// Moves whole messages between this connection and the bus
///
/// Implementations own the conversion to and from wire bytes; nothing above
/// this trait touches raw message data.
pub trait Transport: Send + Sync {
    /// Unique name the bus assigned to this connection
    fn unique_name(&self) -> &BusName;

    /// Queues `message` for delivery, stamping this connection as sender
    fn send(&self, message: Message) -> Result<(), BusError>;

    /// Waits up to `timeout` for the next incoming message
    fn receive(&self, timeout: Duration) -> Result<Option<Message>, BusError>;
}
