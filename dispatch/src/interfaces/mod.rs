//! Standard interfaces
//!
//! Descriptors for the daemon interface and the interfaces every exported
//! object serves: properties, introspection and peer.

/// Declares a method descriptor marker type
macro_rules! method {
    (
        $(#[$meta:meta])*
        $name:ident on $iface:ty {
            name: $wire:expr,
            args: $args:ty,
            reply: $reply:ty
            $(, timeout: $timeout:expr)?
            $(, synchronous: $sync:expr)?
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl $crate::traits::MethodDescriptor for $name {
            type Interface = $iface;
            const NAME: &'static str = $wire;
            $(const DEFAULT_TIMEOUT: std::time::Duration = $timeout;)?
            $(const CALL_SYNCHRONOUSLY: bool = $sync;)?
            type Args = $args;
            type Reply = $reply;
        }
    };
}

pub(crate) use method;

pub mod dbus;
pub mod introspectable;
pub mod peer;
pub mod properties;
