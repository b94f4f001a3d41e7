//! Client end of a simulated connection

use crate::bus::BusCore;
use crate::queue::Mailbox;
use bus_api::{BusError, Transport};
use bus_types::BusName;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use wire::Message;

/// One connection to a [`crate::SimulatedBus`]
///
/// Messages leave as encoded frames stamped with this connection's unique
/// name and arrive through its mailbox. Dropping the transport disconnects
/// it and releases every name it owned.
pub struct SimTransport {
    unique_name: BusName,
    core: Arc<BusCore>,
    mailbox: Arc<Mailbox>,
}

impl SimTransport {
    pub(crate) fn new(unique_name: BusName, core: Arc<BusCore>, mailbox: Arc<Mailbox>) -> Self {
        Self {
            unique_name,
            core,
            mailbox,
        }
    }

    /// Frames waiting to be received
    pub fn queued(&self) -> usize {
        self.mailbox.len()
    }
}

impl Transport for SimTransport {
    fn unique_name(&self) -> &BusName {
        &self.unique_name
    }

    fn send(&self, mut msg: Message) -> Result<(), BusError> {
        msg.set_sender(self.unique_name.clone());
        self.core.route(msg.encode())
    }

    fn receive(&self, timeout: Duration) -> Result<Option<Message>, BusError> {
        match self.mailbox.pop(timeout) {
            Some(frame) => Ok(Some(Message::decode(&frame)?)),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for SimTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimTransport")
            .field("unique_name", &self.unique_name)
            .field("queued", &self.mailbox.len())
            .finish()
    }
}

impl Drop for SimTransport {
    fn drop(&mut self) {
        self.core.disconnect(&self.unique_name);
    }
}
