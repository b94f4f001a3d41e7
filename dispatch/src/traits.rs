//! Compile-time descriptors for interfaces, methods, properties and signals
//!
//! Each descriptor is a zero-sized marker type. Its wire names, timeout and
//! payload types are associated items, so a call site can only pass the
//! argument and reply types its descriptor declares.

use std::time::Duration;
use wire::{Arguments, MessageBody, Type};

/// Default timeout of a method call when its descriptor does not override it
pub const DEFAULT_METHOD_TIMEOUT: Duration = Duration::from_secs(25);

/// Maps an interface marker to its wire name
pub trait InterfaceDescriptor: 'static {
    const NAME: &'static str;
}

/// A method of an interface
pub trait MethodDescriptor: 'static {
    type Interface: InterfaceDescriptor;

    /// Member name on the wire
    const NAME: &'static str;

    /// How long a caller waits for the reply
    const DEFAULT_TIMEOUT: Duration = DEFAULT_METHOD_TIMEOUT;

    /// Asynchronous invocation is rejected when set
    const CALL_SYNCHRONOUSLY: bool = false;

    type Args: Arguments;

    type Reply: MessageBody;
}

/// A property of an interface
pub trait PropertyDescriptor: 'static {
    type Interface: InterfaceDescriptor;

    const NAME: &'static str;

    type Value: Type + Send + 'static;

    /// Whether remote peers may `Set` the property
    const WRITABLE: bool;
}

/// A signal of an interface
pub trait SignalDescriptor: 'static {
    type Interface: InterfaceDescriptor;

    const NAME: &'static str;

    type Value: MessageBody + Send + 'static;
}
