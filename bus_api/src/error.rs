//! Bus error types

use bus_types::NameError;
use thiserror::Error;
use wire::WireError;

/// Local failures raised by the dispatch engine
///
/// Remote failures and timeouts are not errors at this level; they arrive
/// as error outcomes of a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// The connection to the bus is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// A message could not be handed to the transport
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// Ownership of a bus name could not be acquired under the requested flags
    #[error("Failed to acquire name '{name}': {reason}")]
    NameAcquisition { name: String, reason: String },

    /// Objects can only be exported under a name this connection owns
    #[error("Name is not owned by this connection: {0}")]
    NameNotOwned(String),

    /// An object is already exported at this path on this connection
    #[error("Object path already exported: {0}")]
    DuplicateObjectPath(String),

    /// A blocking call was issued from the thread that dispatches its reply
    #[error("Blocking call issued from the dispatch thread")]
    CalledFromDispatchThread,

    /// Handlers can only be installed on objects this process exports
    #[error("Object is not exported: {0}")]
    NotExported(String),

    /// The method may only be invoked synchronously
    #[error("Method '{0}' may only be invoked synchronously")]
    SynchronousOnly(String),

    /// A convenience call surfaced a remote failure
    #[error("Call failed: {0}")]
    CallFailed(String),

    /// A local property read found no value
    #[error("Property {interface}.{name} has no value")]
    PropertyUnset { interface: String, name: String },

    /// A write was attempted on a read-only property
    #[error("Property {interface}.{name} is read-only")]
    ReadOnlyProperty { interface: String, name: String },

    /// The executor is already driving a loop
    #[error("Executor is already running")]
    ExecutorBusy,

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Name(#[from] NameError),
}
