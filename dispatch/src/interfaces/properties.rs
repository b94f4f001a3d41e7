//! `org.freedesktop.DBus.Properties`
//!
//! Every call on this interface defaults to a 10 second timeout and must be
//! made synchronously.

use super::method;
use crate::traits::{InterfaceDescriptor, SignalDescriptor};
use std::collections::BTreeMap;
use std::time::Duration;
use wire::{MessageBody, MessageReader, MessageWriter, Signature, Type, Variant, WireError};

pub const INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Timeout shared by Get, Set and GetAll
pub const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct Properties;

impl InterfaceDescriptor for Properties {
    const NAME: &'static str = INTERFACE;
}

method!(
    /// `Get(interface, name) -> v`
    Get on Properties {
        name: "Get",
        args: (String, String),
        reply: Variant,
        timeout: TIMEOUT,
        synchronous: true,
    }
);

method!(
    /// `Set(interface, name, v)`
    Set on Properties {
        name: "Set",
        args: (String, String, Variant),
        reply: (),
        timeout: TIMEOUT,
        synchronous: true,
    }
);

method!(
    /// `GetAll(interface) -> a{sv}`
    GetAll on Properties {
        name: "GetAll",
        args: (String,),
        reply: BTreeMap<String, Variant>,
        timeout: TIMEOUT,
        synchronous: true,
    }
);

/// Emitted by an exported object whenever one of its properties changes
#[derive(Debug, Clone, Copy)]
pub struct PropertiesChanged;

impl SignalDescriptor for PropertiesChanged {
    type Interface = Properties;
    const NAME: &'static str = "PropertiesChanged";
    type Value = PropertiesChangedArgs;
}

/// Body of `PropertiesChanged(s, a{sv}, as)`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertiesChangedArgs {
    pub interface: String,
    pub changed: BTreeMap<String, Variant>,
    pub invalidated: Vec<String>,
}

impl MessageBody for PropertiesChangedArgs {
    fn signature() -> Signature {
        Signature::new(vec![
            <String as Type>::signature(),
            <BTreeMap<String, Variant> as Type>::signature(),
            <Vec<String> as Type>::signature(),
        ])
    }

    fn write_body(&self, writer: &mut MessageWriter<'_>) {
        writer
            .write(&self.interface)
            .write(&self.changed)
            .write(&self.invalidated);
    }

    fn read_body(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        let args = Self {
            interface: reader.read()?,
            changed: reader.read()?,
            invalidated: reader.read()?,
        };
        reader.finish()?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus_types::ObjectPath;
    use wire::Message;

    #[test]
    fn test_properties_changed_body() {
        let mut changed = BTreeMap::new();
        changed.insert("Dummy".to_string(), Variant::new(&4242i64));
        let args = PropertiesChangedArgs {
            interface: "org.example.Iface".to_string(),
            changed,
            invalidated: Vec::new(),
        };
        let mut msg = Message::signal(ObjectPath::root(), INTERFACE, "PropertiesChanged").unwrap();
        args.write_body(&mut msg.writer());
        assert_eq!(msg.signature().to_string(), "sa{sv}as");
        assert_eq!(
            <PropertiesChangedArgs as MessageBody>::signature(),
            *msg.signature()
        );
        let back = PropertiesChangedArgs::read_body(&mut msg.reader()).unwrap();
        assert_eq!(back, args);
    }
}
