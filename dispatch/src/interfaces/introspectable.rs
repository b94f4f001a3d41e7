//! `org.freedesktop.DBus.Introspectable`
//!
//! Exported objects answer `Introspect` with an XML description generated
//! from their registered methods, properties and signals, plus the child
//! nodes exported below them.

use super::method;
use crate::traits::InterfaceDescriptor;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;
use wire::{SigType, Signature};

pub const INTERFACE: &str = "org.freedesktop.DBus.Introspectable";
pub const INTROSPECT: &str = "Introspect";

const DOCTYPE: &str = "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n \"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n";

#[derive(Debug, Clone, Copy)]
pub struct Introspectable;

impl InterfaceDescriptor for Introspectable {
    const NAME: &'static str = INTERFACE;
}

method!(
    /// `Introspect() -> s`
    Introspect on Introspectable {
        name: INTROSPECT,
        args: (),
        reply: String,
        timeout: Duration::from_secs(10),
        synchronous: true,
    }
);

/// What one interface of an object exposes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceSummary {
    /// Method name to (input, output) signatures
    pub methods: BTreeMap<String, (Signature, Signature)>,
    /// Property name to (type, writable)
    pub properties: BTreeMap<String, (SigType, bool)>,
    /// Signal name to payload signature
    pub signals: BTreeMap<String, Signature>,
}

fn write_args(xml: &mut String, signature: &Signature, direction: Option<&str>) {
    for ty in signature.types() {
        match direction {
            Some(direction) => {
                let _ = writeln!(xml, "      <arg type=\"{}\" direction=\"{}\"/>", ty, direction);
            }
            None => {
                let _ = writeln!(xml, "      <arg type=\"{}\"/>", ty);
            }
        }
    }
}

/// Renders an introspection document
pub fn render(interfaces: &BTreeMap<String, InterfaceSummary>, children: &[String]) -> String {
    let mut xml = String::from(DOCTYPE);
    xml.push_str("<node>\n");
    for (name, summary) in interfaces {
        let _ = writeln!(xml, "  <interface name=\"{}\">", name);
        for (method, (inputs, outputs)) in &summary.methods {
            let _ = writeln!(xml, "    <method name=\"{}\">", method);
            write_args(&mut xml, inputs, Some("in"));
            write_args(&mut xml, outputs, Some("out"));
            xml.push_str("    </method>\n");
        }
        for (property, (ty, writable)) in &summary.properties {
            let access = if *writable { "readwrite" } else { "read" };
            let _ = writeln!(
                xml,
                "    <property name=\"{}\" type=\"{}\" access=\"{}\"/>",
                property, ty, access
            );
        }
        for (signal, payload) in &summary.signals {
            let _ = writeln!(xml, "    <signal name=\"{}\">", signal);
            write_args(&mut xml, payload, None);
            xml.push_str("    </signal>\n");
        }
        xml.push_str("  </interface>\n");
    }
    for child in children {
        let _ = writeln!(xml, "  <node name=\"{}\"/>", child);
    }
    xml.push_str("</node>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_interface_and_children() {
        let mut summary = InterfaceSummary::default();
        summary.methods.insert(
            "Method".to_string(),
            (Signature::empty(), Signature::parse("x").unwrap()),
        );
        summary
            .properties
            .insert("Dummy".to_string(), (SigType::Int64, true));
        summary
            .signals
            .insert("Dummy".to_string(), Signature::parse("x").unwrap());
        let mut interfaces = BTreeMap::new();
        interfaces.insert("org.example.Iface".to_string(), summary);

        let xml = render(&interfaces, &["child".to_string()]);
        assert!(xml.starts_with("<!DOCTYPE node"));
        assert!(xml.contains("<interface name=\"org.example.Iface\">"));
        assert!(xml.contains("<arg type=\"x\" direction=\"out\"/>"));
        assert!(xml.contains("<property name=\"Dummy\" type=\"x\" access=\"readwrite\"/>"));
        assert!(xml.contains("<signal name=\"Dummy\">"));
        assert!(xml.contains("<node name=\"child\"/>"));
        assert!(xml.trim_end().ends_with("</node>"));
    }

    #[test]
    fn test_render_empty_node() {
        let xml = render(&BTreeMap::new(), &[]);
        assert!(xml.contains("<node>\n</node>"));
    }
}
