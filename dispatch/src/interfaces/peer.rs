//! `org.freedesktop.DBus.Peer`

use super::method;
use crate::traits::InterfaceDescriptor;

pub const INTERFACE: &str = "org.freedesktop.DBus.Peer";

#[derive(Debug, Clone, Copy)]
pub struct Peer;

impl InterfaceDescriptor for Peer {
    const NAME: &'static str = INTERFACE;
}

method!(Ping on Peer { name: "Ping", args: (), reply: () });
