//! The bus daemon's own interface

use super::method;
use crate::object::Object;
use crate::result::CallResult;
use crate::traits::{InterfaceDescriptor, SignalDescriptor};
use crate::Bus;
use bus_api::BusError;
use bus_types::{BusName, ObjectPath, RequestNameFlags, DBUS_INTERFACE, DBUS_PATH, DBUS_SERVICE};
use std::sync::Arc;
use wire::{
    MatchRule, Message, MessageBody, MessageReader, MessageWriter, Signature, Type, WireError,
};

/// `org.freedesktop.DBus`
#[derive(Debug, Clone, Copy)]
pub struct DBus;

impl InterfaceDescriptor for DBus {
    const NAME: &'static str = DBUS_INTERFACE;
}

method!(
    /// Registers the connection and returns its unique name
    Hello on DBus { name: "Hello", args: (), reply: String }
);

method!(
    /// Asks for ownership of a name; replies with a `RequestNameReply` code
    RequestName on DBus { name: "RequestName", args: (String, u32), reply: u32 }
);

method!(
    /// Gives up a name; replies with a `ReleaseNameReply` code
    ReleaseName on DBus { name: "ReleaseName", args: (String,), reply: u32 }
);

method!(
    /// Lists every name currently owned on the bus
    ListNames on DBus { name: "ListNames", args: (), reply: Vec<String> }
);

method!(NameHasOwner on DBus { name: "NameHasOwner", args: (String,), reply: bool });

method!(GetNameOwner on DBus { name: "GetNameOwner", args: (String,), reply: String });

method!(GetId on DBus { name: "GetId", args: (), reply: String });

method!(AddMatch on DBus { name: "AddMatch", args: (String,), reply: () });

method!(RemoveMatch on DBus { name: "RemoveMatch", args: (String,), reply: () });

/// Broadcast by the daemon whenever a name changes hands
#[derive(Debug, Clone, Copy)]
pub struct NameOwnerChanged;

impl SignalDescriptor for NameOwnerChanged {
    type Interface = DBus;
    const NAME: &'static str = "NameOwnerChanged";
    type Value = NameOwnerChangedArgs;
}

/// Body of `NameOwnerChanged(s, s, s)`; an empty owner means none
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameOwnerChangedArgs {
    pub name: String,
    pub old_owner: String,
    pub new_owner: String,
}

impl NameOwnerChangedArgs {
    /// The owner after the change, if any
    pub fn new_owner(&self) -> Option<BusName> {
        if self.new_owner.is_empty() {
            return None;
        }
        BusName::new(self.new_owner.as_str()).ok()
    }
}

impl MessageBody for NameOwnerChangedArgs {
    fn signature() -> Signature {
        Signature::new(vec![<String as Type>::signature(); 3])
    }

    fn write_body(&self, writer: &mut MessageWriter<'_>) {
        writer
            .write(&self.name)
            .write(&self.old_owner)
            .write(&self.new_owner);
    }

    fn read_body(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        let args = Self {
            name: reader.read()?,
            old_owner: reader.read()?,
            new_owner: reader.read()?,
        };
        reader.finish()?;
        Ok(args)
    }
}

/// Rule selecting the daemon's `NameOwnerChanged` broadcasts
pub(crate) fn name_owner_changed_rule() -> Result<MatchRule, BusError> {
    Ok(MatchRule::signal()
        .with_sender(DBUS_SERVICE)
        .with_path(ObjectPath::new(DBUS_PATH)?)
        .with_interface(DBUS_INTERFACE)
        .with_member(<NameOwnerChanged as SignalDescriptor>::NAME))
}

/// Handle on the daemon object
pub fn daemon(bus: &Arc<Bus>) -> Result<Arc<Object>, BusError> {
    Ok(Object::remote(
        Arc::clone(bus),
        BusName::new(DBUS_SERVICE)?,
        ObjectPath::new(DBUS_PATH)?,
    ))
}

/// Requests `name` under `flags` and waits for the daemon's answer
pub(crate) fn request_name(
    bus: &Arc<Bus>,
    name: &BusName,
    flags: RequestNameFlags,
) -> Result<CallResult<u32>, BusError> {
    daemon(bus)?.invoke_method_synchronously::<RequestName>((name.to_string(), flags.bits()))
}

fn send_no_reply(bus: &Bus, member: &str, arg: String) -> Result<(), BusError> {
    let mut msg = Message::method_call(
        Some(BusName::new(DBUS_SERVICE)?),
        ObjectPath::new(DBUS_PATH)?,
        DBUS_INTERFACE,
        member,
    )?
    .with_no_reply_expected();
    msg.writer().write(&arg);
    bus.send(msg)
}

/// Releases `name` without waiting for the daemon
pub(crate) fn release_name_no_reply(bus: &Bus, name: &BusName) -> Result<(), BusError> {
    send_no_reply(bus, "ReleaseName", name.to_string())
}

pub(crate) fn add_match_no_reply(bus: &Bus, rule: &MatchRule) -> Result<(), BusError> {
    send_no_reply(bus, "AddMatch", rule.to_string())
}

pub(crate) fn remove_match_no_reply(bus: &Bus, rule: &MatchRule) -> Result<(), BusError> {
    send_no_reply(bus, "RemoveMatch", rule.to_string())
}
