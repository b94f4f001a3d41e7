//! Addressable endpoints
//!
//! An [`Object`] is a bus name plus an object path. A remote handle only
//! sends calls. An exported object additionally owns the handlers, property
//! values and signal metadata that incoming traffic is dispatched against,
//! and serves the standard Properties, Introspectable and Peer interfaces.

use crate::bus::Bus;
use crate::interfaces::introspectable::{self, InterfaceSummary};
use crate::interfaces::peer;
use crate::interfaces::properties::{self, PropertiesChanged, PropertiesChangedArgs};
use crate::property::Property;
use crate::result::CallResult;
use crate::signal::Signal;
use crate::traits::{InterfaceDescriptor, MethodDescriptor, PropertyDescriptor, SignalDescriptor};
use bus_api::{BusError, Completion};
use bus_types::{error_names, BusName, ObjectPath};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use wire::{Arguments, Message, MessageBody, SigType, Signature, Type, Value, Variant};

/// Handler for one incoming method call
///
/// Runs on the dispatch thread and is responsible for sending the return or
/// error message itself.
pub type MethodHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Error a typed handler answers a call with
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{name}: {description}")]
pub struct MethodError {
    pub name: String,
    pub description: String,
}

impl MethodError {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// `org.freedesktop.DBus.Error.Failed` with `description`
    pub fn failed(description: impl Into<String>) -> Self {
        Self::new(error_names::FAILED, description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MemberKey {
    interface: String,
    member: String,
}

impl MemberKey {
    fn new(interface: &str, member: &str) -> Self {
        Self {
            interface: interface.to_string(),
            member: member.to_string(),
        }
    }

    fn method<M: MethodDescriptor>() -> Self {
        Self::new(<M::Interface as InterfaceDescriptor>::NAME, M::NAME)
    }

    fn property<P: PropertyDescriptor>() -> Self {
        Self::new(<P::Interface as InterfaceDescriptor>::NAME, P::NAME)
    }

    fn signal<S: SignalDescriptor>() -> Self {
        Self::new(<S::Interface as InterfaceDescriptor>::NAME, S::NAME)
    }
}

struct HandlerEntry {
    handler: MethodHandler,
    inputs: Signature,
    outputs: Signature,
}

struct PropertySlot {
    signature: SigType,
    writable: bool,
    value: Option<Value>,
}

impl PropertySlot {
    fn for_property<P: PropertyDescriptor>() -> Self {
        Self {
            signature: <P::Value as Type>::signature(),
            writable: P::WRITABLE,
            value: None,
        }
    }
}

/// An endpoint of method, property and signal traffic
pub struct Object {
    bus: Arc<Bus>,
    destination: BusName,
    path: ObjectPath,
    exported: bool,
    handlers: RwLock<BTreeMap<MemberKey, HandlerEntry>>,
    properties: RwLock<BTreeMap<MemberKey, PropertySlot>>,
    signals: RwLock<BTreeMap<MemberKey, Signature>>,
}

impl Object {
    fn with_role(bus: Arc<Bus>, destination: BusName, path: ObjectPath, exported: bool) -> Self {
        Self {
            bus,
            destination,
            path,
            exported,
            handlers: RwLock::new(BTreeMap::new()),
            properties: RwLock::new(BTreeMap::new()),
            signals: RwLock::new(BTreeMap::new()),
        }
    }

    /// Handle for calls against `path` on whichever peer owns `destination`
    ///
    /// Nothing is checked on the bus; the first call may fail instead.
    pub fn remote(bus: Arc<Bus>, destination: BusName, path: ObjectPath) -> Arc<Self> {
        Arc::new(Self::with_role(bus, destination, path, false))
    }

    /// Exports a new object at `path` on `bus`
    pub(crate) fn exported(
        bus: Arc<Bus>,
        destination: BusName,
        path: ObjectPath,
    ) -> Result<Arc<Self>, BusError> {
        let object = Arc::new(Self::with_role(Arc::clone(&bus), destination, path, true));
        bus.export(&object)?;
        Ok(object)
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Name of the service the object belongs to
    pub fn destination(&self) -> &BusName {
        &self.destination
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    fn method_call<M: MethodDescriptor>(&self, args: &M::Args) -> Result<Message, BusError> {
        let mut msg = Message::method_call(
            Some(self.destination.clone()),
            self.path.clone(),
            <M::Interface as InterfaceDescriptor>::NAME,
            M::NAME,
        )?;
        args.write_args(&mut msg.writer());
        Ok(msg)
    }

    /// Calls `M` and blocks until the reply arrives or `M::DEFAULT_TIMEOUT`
    /// elapses
    ///
    /// Error replies and timeouts are error outcomes of the returned
    /// [`CallResult`]. A reply that does not decode as `M::Reply` is a local
    /// error.
    pub fn invoke_method_synchronously<M: MethodDescriptor>(
        &self,
        args: M::Args,
    ) -> Result<CallResult<M::Reply>, BusError> {
        let msg = self.method_call::<M>(&args)?;
        tracing::debug!(
            destination = %self.destination,
            path = %self.path,
            member = M::NAME,
            serial = msg.serial(),
            "synchronous call"
        );
        match self.bus.call_blocking(msg, M::DEFAULT_TIMEOUT)? {
            Completion::Reply(reply) => Ok(CallResult::from_message(&reply)?),
            Completion::TimedOut => Ok(CallResult::timed_out(M::NAME, M::DEFAULT_TIMEOUT)),
        }
    }

    /// Calls `M` without blocking
    ///
    /// `continuation` runs on the dispatch thread with the outcome. A reply
    /// that does not decode as `M::Reply` is logged and handed over as an
    /// error outcome.
    pub fn invoke_method_asynchronously<M, F>(
        &self,
        args: M::Args,
        continuation: F,
    ) -> Result<(), BusError>
    where
        M: MethodDescriptor,
        F: FnOnce(CallResult<M::Reply>) + Send + 'static,
    {
        if M::CALL_SYNCHRONOUSLY {
            return Err(BusError::SynchronousOnly(M::NAME.to_string()));
        }
        let msg = self.method_call::<M>(&args)?;
        tracing::debug!(
            destination = %self.destination,
            path = %self.path,
            member = M::NAME,
            serial = msg.serial(),
            "asynchronous call"
        );
        self.bus
            .call_with_continuation(msg, M::DEFAULT_TIMEOUT, move |completion| {
                let result = match completion {
                    Completion::Reply(reply) => CallResult::from_message(&reply)
                        .unwrap_or_else(|err| {
                            tracing::error!(member = M::NAME, error = %err, "undecodable reply");
                            CallResult::from_error(err)
                        }),
                    Completion::TimedOut => CallResult::timed_out(M::NAME, M::DEFAULT_TIMEOUT),
                };
                continuation(result);
            })
    }

    /// Routes incoming calls of `M` on this object to `handler`
    ///
    /// Replaces any handler installed earlier for `M`.
    pub fn install_method_handler<M, F>(&self, handler: F) -> Result<(), BusError>
    where
        M: MethodDescriptor,
        F: Fn(&Message) + Send + Sync + 'static,
    {
        if !self.exported {
            return Err(BusError::NotExported(self.path.to_string()));
        }
        let entry = HandlerEntry {
            handler: Arc::new(handler),
            inputs: <M::Args as Arguments>::signature(),
            outputs: <M::Reply as MessageBody>::signature(),
        };
        if self
            .handlers
            .write()
            .insert(MemberKey::method::<M>(), entry)
            .is_some()
        {
            tracing::debug!(path = %self.path, member = M::NAME, "method handler replaced");
        }
        Ok(())
    }

    /// Installs a handler that receives decoded arguments and whose result
    /// becomes the reply
    ///
    /// Calls whose body does not decode as `M::Args` are answered with
    /// `InvalidArgs` without reaching `handler`.
    pub fn install_typed_handler<M, F>(&self, handler: F) -> Result<(), BusError>
    where
        M: MethodDescriptor,
        F: Fn(M::Args) -> Result<M::Reply, MethodError> + Send + Sync + 'static,
    {
        let bus = Arc::downgrade(&self.bus);
        self.install_method_handler::<M, _>(move |call| {
            if let Some(bus) = bus.upgrade() {
                respond::<M, _>(&bus, call, &handler);
            }
        })
    }

    /// Sends `value` as the return of `call`
    pub fn reply<B: MessageBody>(&self, call: &Message, value: &B) {
        send_return(&self.bus, call, value);
    }

    /// Typed handle on property `P` of this object
    pub fn get_property<P: PropertyDescriptor>(self: &Arc<Self>) -> Property<P> {
        if self.exported {
            self.properties
                .write()
                .entry(MemberKey::property::<P>())
                .or_insert_with(PropertySlot::for_property::<P>);
        }
        Property::new(Arc::clone(self))
    }

    /// Typed handle on signal `S` of this object
    pub fn get_signal<S: SignalDescriptor>(self: &Arc<Self>) -> Signal<S> {
        if self.exported {
            self.signals
                .write()
                .insert(MemberKey::signal::<S>(), <S::Value as MessageBody>::signature());
        }
        Signal::new(Arc::clone(self))
    }

    /// Broadcasts `value` as signal `S` from this object's path
    pub fn emit_signal<S: SignalDescriptor>(&self, value: &S::Value) -> Result<(), BusError> {
        let mut msg = Message::signal(
            self.path.clone(),
            <S::Interface as InterfaceDescriptor>::NAME,
            S::NAME,
        )?;
        value.write_body(&mut msg.writer());
        tracing::debug!(path = %self.path, signal = S::NAME, serial = msg.serial(), "emitting signal");
        self.bus.send(msg)
    }

    pub(crate) fn load_property<P: PropertyDescriptor>(&self) -> Result<P::Value, BusError> {
        let value = self
            .properties
            .read()
            .get(&MemberKey::property::<P>())
            .and_then(|slot| slot.value.clone());
        match value {
            Some(value) => Ok(<P::Value as Type>::from_value(value)?),
            None => Err(BusError::PropertyUnset {
                interface: <P::Interface as InterfaceDescriptor>::NAME.to_string(),
                name: P::NAME.to_string(),
            }),
        }
    }

    pub(crate) fn store_property<P: PropertyDescriptor>(&self, value: &P::Value) {
        let value = value.to_value();
        self.properties
            .write()
            .entry(MemberKey::property::<P>())
            .or_insert_with(PropertySlot::for_property::<P>)
            .value = Some(value.clone());
        self.notify_property_changed(<P::Interface as InterfaceDescriptor>::NAME, P::NAME, value);
    }

    fn notify_property_changed(&self, interface: &str, name: &str, value: Value) {
        let mut changed = BTreeMap::new();
        changed.insert(name.to_string(), Variant::from_dynamic(value));
        let args = PropertiesChangedArgs {
            interface: interface.to_string(),
            changed,
            invalidated: Vec::new(),
        };
        if let Err(err) = self.emit_signal::<PropertiesChanged>(&args) {
            tracing::warn!(path = %self.path, property = name, error = %err, "failed to announce property change");
        }
    }

    /// Dispatches an incoming call addressed to this object
    ///
    /// Returns false when no handler or standard interface serves it.
    pub(crate) fn handle_call(&self, msg: &Message) -> bool {
        let Some(member) = msg.member() else {
            return false;
        };
        let handler = {
            let handlers = self.handlers.read();
            let entry = match msg.interface() {
                Some(interface) => handlers.get(&MemberKey::new(interface, member)),
                None => handlers
                    .iter()
                    .find(|(key, _)| key.member == member)
                    .map(|(_, entry)| entry),
            };
            let handler: Option<MethodHandler> = entry.map(|entry| Arc::clone(&entry.handler));
            handler
        };
        match handler {
            Some(handler) => {
                handler(msg);
                true
            }
            None => self.serve_standard(msg),
        }
    }

    fn serve_standard(&self, msg: &Message) -> bool {
        if targets::<properties::Get>(msg) {
            respond::<properties::Get, _>(&self.bus, msg, |(interface, name)| {
                self.property_variant(&interface, &name)
            });
        } else if targets::<properties::Set>(msg) {
            respond::<properties::Set, _>(&self.bus, msg, |(interface, name, value)| {
                self.apply_set(&interface, &name, value)
            });
        } else if targets::<properties::GetAll>(msg) {
            respond::<properties::GetAll, _>(&self.bus, msg, |(interface,)| {
                Ok(self.all_properties(&interface))
            });
        } else if targets::<introspectable::Introspect>(msg) {
            respond::<introspectable::Introspect, _>(&self.bus, msg, |()| Ok(self.introspect()));
        } else if targets::<peer::Ping>(msg) {
            respond::<peer::Ping, _>(&self.bus, msg, |()| Ok(()));
        } else {
            return false;
        }
        true
    }

    fn property_variant(&self, interface: &str, name: &str) -> Result<Variant, MethodError> {
        let properties = self.properties.read();
        let slot = properties
            .get(&MemberKey::new(interface, name))
            .ok_or_else(|| unknown_property(interface, name))?;
        match &slot.value {
            Some(value) => Ok(Variant::from_dynamic(value.clone())),
            None => Err(MethodError::failed(format!(
                "Property '{}' of interface '{}' has no value",
                name, interface
            ))),
        }
    }

    fn all_properties(&self, interface: &str) -> BTreeMap<String, Variant> {
        self.properties
            .read()
            .iter()
            .filter(|(key, _)| key.interface == interface)
            .filter_map(|(key, slot)| {
                let value = slot.value.clone()?;
                Some((key.member.clone(), Variant::from_dynamic(value)))
            })
            .collect()
    }

    fn apply_set(&self, interface: &str, name: &str, value: Variant) -> Result<(), MethodError> {
        let stored = {
            let mut properties = self.properties.write();
            let slot = properties
                .get_mut(&MemberKey::new(interface, name))
                .ok_or_else(|| unknown_property(interface, name))?;
            if !slot.writable {
                return Err(MethodError::new(
                    error_names::PROPERTY_READ_ONLY,
                    format!("Property '{}' of interface '{}' is read-only", name, interface),
                ));
            }
            if value.inner_signature() != slot.signature {
                return Err(MethodError::new(
                    error_names::INVALID_ARGS,
                    format!(
                        "Property '{}' has type '{}', not '{}'",
                        name,
                        slot.signature,
                        value.inner_signature()
                    ),
                ));
            }
            let value = value.into_value();
            slot.value = Some(value.clone());
            value
        };
        tracing::debug!(path = %self.path, interface, property = name, "property set remotely");
        self.notify_property_changed(interface, name, stored);
        Ok(())
    }

    fn introspect(&self) -> String {
        let mut interfaces = standard_interfaces();
        for (key, entry) in self.handlers.read().iter() {
            interfaces
                .entry(key.interface.clone())
                .or_default()
                .methods
                .insert(key.member.clone(), (entry.inputs.clone(), entry.outputs.clone()));
        }
        for (key, slot) in self.properties.read().iter() {
            interfaces
                .entry(key.interface.clone())
                .or_default()
                .properties
                .insert(key.member.clone(), (slot.signature.clone(), slot.writable));
        }
        for (key, signature) in self.signals.read().iter() {
            interfaces
                .entry(key.interface.clone())
                .or_default()
                .signals
                .insert(key.member.clone(), signature.clone());
        }
        introspectable::render(&interfaces, &self.bus.child_nodes(&self.path))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("destination", &self.destination)
            .field("path", &self.path)
            .field("exported", &self.exported)
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        if self.exported {
            self.bus.unexport_dead(&self.path);
        }
    }
}

/// Whether `msg` calls `M`; calls without an interface match on member only
fn targets<M: MethodDescriptor>(msg: &Message) -> bool {
    msg.member() == Some(M::NAME)
        && msg
            .interface()
            .map_or(true, |interface| interface == <M::Interface as InterfaceDescriptor>::NAME)
}

fn unknown_property(interface: &str, name: &str) -> MethodError {
    MethodError::new(
        error_names::UNKNOWN_PROPERTY,
        format!("No such property '{}' in interface '{}'", name, interface),
    )
}

fn send_return<B: MessageBody>(bus: &Bus, call: &Message, value: &B) {
    if call.no_reply_expected() {
        return;
    }
    let mut reply = Message::method_return(call);
    value.write_body(&mut reply.writer());
    bus.send_reply(reply);
}

/// Decodes the arguments of `call`, runs `handler` and sends its outcome
fn respond<M, F>(bus: &Bus, call: &Message, handler: F)
where
    M: MethodDescriptor,
    F: FnOnce(M::Args) -> Result<M::Reply, MethodError>,
{
    let args = match <M::Args as Arguments>::read_args(&mut call.reader()) {
        Ok(args) => args,
        Err(err) => {
            tracing::debug!(member = M::NAME, error = %err, "rejecting call with invalid arguments");
            bus.reply_error(call, error_names::INVALID_ARGS, &err.to_string());
            return;
        }
    };
    match handler(args) {
        Ok(value) => send_return(bus, call, &value),
        Err(err) => bus.reply_error(call, &err.name, &err.description),
    }
}

fn describe<M: MethodDescriptor>(interfaces: &mut BTreeMap<String, InterfaceSummary>) {
    interfaces
        .entry(<M::Interface as InterfaceDescriptor>::NAME.to_string())
        .or_default()
        .methods
        .insert(
            M::NAME.to_string(),
            (
                <M::Args as Arguments>::signature(),
                <M::Reply as MessageBody>::signature(),
            ),
        );
}

/// Interfaces every exported object serves
fn standard_interfaces() -> BTreeMap<String, InterfaceSummary> {
    let mut interfaces = BTreeMap::new();
    describe::<properties::Get>(&mut interfaces);
    describe::<properties::Set>(&mut interfaces);
    describe::<properties::GetAll>(&mut interfaces);
    describe::<introspectable::Introspect>(&mut interfaces);
    describe::<peer::Ping>(&mut interfaces);
    interfaces
        .entry(properties::INTERFACE.to_string())
        .or_default()
        .signals
        .insert(
            <PropertiesChanged as SignalDescriptor>::NAME.to_string(),
            <PropertiesChangedArgs as MessageBody>::signature(),
        );
    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_interfaces_cover_builtins() {
        let interfaces = standard_interfaces();
        let props = &interfaces[properties::INTERFACE];
        assert_eq!(props.methods["Get"].0.to_string(), "ss");
        assert_eq!(props.methods["Get"].1.to_string(), "v");
        assert_eq!(props.methods["Set"].0.to_string(), "ssv");
        assert_eq!(props.methods["GetAll"].1.to_string(), "a{sv}");
        assert_eq!(props.signals["PropertiesChanged"].to_string(), "sa{sv}as");
        assert_eq!(
            interfaces[introspectable::INTERFACE].methods["Introspect"]
                .1
                .to_string(),
            "s"
        );
        assert!(interfaces[peer::INTERFACE].methods.contains_key("Ping"));
    }

    #[test]
    fn test_targets_matches_interface_or_bare_member() {
        let mut msg = Message::method_call(
            None,
            ObjectPath::root(),
            properties::INTERFACE,
            "Get",
        )
        .unwrap();
        assert!(targets::<properties::Get>(&msg));
        assert!(!targets::<properties::Set>(&msg));
        assert!(!targets::<peer::Ping>(&msg));

        msg = Message::method_call(None, ObjectPath::root(), "org.example.Other", "Get").unwrap();
        assert!(!targets::<properties::Get>(&msg));
    }

    #[test]
    fn test_method_error_display() {
        let err = MethodError::failed("broken");
        assert_eq!(err.to_string(), "org.freedesktop.DBus.Error.Failed: broken");
    }
}
