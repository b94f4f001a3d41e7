//! In-process bus daemon
//!
//! Every connection gets a unique name and a bounded mailbox. Sending hands
//! an encoded frame to the daemon, which routes it synchronously: calls to
//! `org.freedesktop.DBus` are answered in place, addressed messages go to
//! the destination's owner, and broadcast signals go to every connection
//! with a matching rule. Every change of a well-known name's primary
//! owner is broadcast as `NameOwnerChanged` from the daemon.

use crate::config::SimBusConfig;
use crate::daemon;
use crate::queue::{Frame, Mailbox};
use crate::registry::NameRegistry;
use crate::transport::SimTransport;
use bus_api::BusError;
use bus_types::{error_names, BusId, BusName, ObjectPath, DBUS_INTERFACE, DBUS_PATH, DBUS_SERVICE};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wire::{MatchRule, Message, MessageType};

pub(crate) struct Connection {
    mailbox: Arc<Mailbox>,
    rules: Vec<MatchRule>,
}

#[derive(Default)]
pub(crate) struct State {
    pub(crate) connections: BTreeMap<BusName, Connection>,
    pub(crate) registry: NameRegistry,
}

fn resolve_in(
    connections: &BTreeMap<BusName, Connection>,
    registry: &NameRegistry,
    name: &BusName,
) -> Option<BusName> {
    if name.is_unique() {
        return connections.contains_key(name).then(|| name.clone());
    }
    if name.as_str() == DBUS_SERVICE {
        return Some(name.clone());
    }
    registry.owner(name).cloned()
}

fn owner_changed(
    name: &BusName,
    old: Option<&BusName>,
    new: Option<&BusName>,
) -> Result<Message, BusError> {
    let owner = |owner: Option<&BusName>| owner.map(BusName::to_string).unwrap_or_default();
    let mut signal = Message::signal(ObjectPath::new(DBUS_PATH)?, DBUS_INTERFACE, "NameOwnerChanged")?;
    signal.set_sender(BusName::new(DBUS_SERVICE)?);
    signal
        .writer()
        .write(&name.to_string())
        .write(&owner(old))
        .write(&owner(new));
    Ok(signal)
}

impl State {
    /// Connection currently behind `name`
    pub(crate) fn resolve(&self, name: &BusName) -> Option<BusName> {
        resolve_in(&self.connections, &self.registry, name)
    }

    pub(crate) fn list_names(&self) -> Vec<String> {
        std::iter::once(DBUS_SERVICE.to_string())
            .chain(self.connections.keys().map(BusName::to_string))
            .chain(self.registry.names().map(BusName::to_string))
            .collect()
    }

    pub(crate) fn add_match(&mut self, connection: &BusName, rule: MatchRule) {
        if let Some(connection) = self.connections.get_mut(connection) {
            connection.rules.push(rule);
        }
    }

    pub(crate) fn remove_match(&mut self, connection: &BusName, rule: &MatchRule) -> bool {
        let Some(connection) = self.connections.get_mut(connection) else {
            return false;
        };
        match connection.rules.iter().position(|candidate| candidate == rule) {
            Some(index) => {
                connection.rules.remove(index);
                true
            }
            None => false,
        }
    }

    fn deliver(&self, target: &BusName, frame: Frame) -> Result<(), BusError> {
        let connection = self
            .connections
            .get(target)
            .ok_or_else(|| BusError::SendFailed(format!("{} is not connected", target)))?;
        connection
            .mailbox
            .push(frame)
            .map_err(|err| BusError::SendFailed(format!("{}: {}", target, err)))
    }

    /// Broadcasts `NameOwnerChanged` when `name` moved from `old` to `new`
    pub(crate) fn announce_owner_change(
        &self,
        name: &BusName,
        old: Option<&BusName>,
        new: Option<&BusName>,
    ) {
        if old == new {
            return;
        }
        match owner_changed(name, old, new) {
            Ok(signal) => {
                tracing::debug!(%name, ?old, ?new, "name owner changed");
                self.broadcast(&signal, &signal.encode());
            }
            Err(err) => tracing::error!(error = %err, "cannot build NameOwnerChanged"),
        }
    }

    fn broadcast(&self, msg: &Message, frame: &Frame) {
        let resolve = |name: &str| {
            BusName::new(name)
                .ok()
                .and_then(|name| resolve_in(&self.connections, &self.registry, &name))
        };
        for (name, connection) in &self.connections {
            if !connection
                .rules
                .iter()
                .any(|rule| rule.matches_resolved(msg, &resolve))
            {
                continue;
            }
            if let Err(err) = connection.mailbox.push(frame.clone()) {
                tracing::warn!(connection = %name, error = %err, "dropping signal");
            }
        }
    }
}

pub(crate) struct BusCore {
    id: BusId,
    config: SimBusConfig,
    next_connection: AtomicU64,
    state: Mutex<State>,
}

impl BusCore {
    pub(crate) fn route(&self, frame: Frame) -> Result<(), BusError> {
        let msg = Message::decode(&frame)?;
        let sender = msg
            .sender()
            .cloned()
            .ok_or_else(|| BusError::SendFailed("message has no sender".to_string()))?;
        tracing::trace!(message = %msg, "routing");
        let mut state = self.state.lock();
        match msg.destination() {
            Some(destination) if destination.as_str() == DBUS_SERVICE => {
                if msg.message_type() != MessageType::MethodCall {
                    return Ok(());
                }
                let reply = daemon::answer(&mut state, &self.id, &sender, &msg);
                if let Some(reply) = reply.filter(|_| !msg.no_reply_expected()) {
                    if let Err(err) = state.deliver(&sender, reply.encode()) {
                        tracing::warn!(%sender, error = %err, "dropping daemon reply");
                    }
                }
                Ok(())
            }
            Some(destination) => match state.resolve(destination) {
                Some(target) => state.deliver(&target, frame),
                None => {
                    tracing::debug!(%destination, "no owner for destination");
                    if msg.message_type() == MessageType::MethodCall && !msg.no_reply_expected() {
                        let mut error = Message::error(
                            &msg,
                            error_names::SERVICE_UNKNOWN,
                            &format!("The name {} was not provided by any service", destination),
                        )?;
                        error.set_sender(BusName::new(DBUS_SERVICE)?);
                        state.deliver(&sender, error.encode())?;
                    }
                    Ok(())
                }
            },
            None if msg.message_type() == MessageType::Signal => {
                state.broadcast(&msg, &frame);
                Ok(())
            }
            None => {
                tracing::warn!(message = %msg, "dropping message without destination");
                Ok(())
            }
        }
    }

    pub(crate) fn disconnect(&self, unique_name: &BusName) {
        let mut state = self.state.lock();
        state.connections.remove(unique_name);
        let released = state.registry.release_all(unique_name);
        for name in &released {
            let successor = state.registry.owner(name).cloned();
            state.announce_owner_change(name, Some(unique_name), successor.as_ref());
        }
        tracing::debug!(connection = %unique_name, released = released.len(), "connection closed");
    }
}

/// A bus daemon living inside the current process
#[derive(Clone)]
pub struct SimulatedBus {
    core: Arc<BusCore>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::with_config(SimBusConfig::default())
    }

    pub fn with_config(config: SimBusConfig) -> Self {
        Self {
            core: Arc::new(BusCore {
                id: BusId::new(),
                config,
                next_connection: AtomicU64::new(1),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn id(&self) -> BusId {
        self.core.id
    }

    pub fn config(&self) -> &SimBusConfig {
        &self.core.config
    }

    /// Opens a new connection with a fresh unique name
    pub fn connect(&self) -> Result<SimTransport, BusError> {
        let index = self.core.next_connection.fetch_add(1, Ordering::Relaxed);
        let unique_name = BusName::new(format!(":1.{}", index))?;
        let mailbox = Arc::new(Mailbox::with_capacity(self.core.config.queue_capacity));
        self.core.state.lock().connections.insert(
            unique_name.clone(),
            Connection {
                mailbox: Arc::clone(&mailbox),
                rules: Vec::new(),
            },
        );
        tracing::debug!(connection = %unique_name, "connection opened");
        Ok(SimTransport::new(unique_name, Arc::clone(&self.core), mailbox))
    }

    pub fn connection_count(&self) -> usize {
        self.core.state.lock().connections.len()
    }

    /// Unique name of the connection currently owning `name`
    pub fn owner_of(&self, name: &BusName) -> Option<BusName> {
        self.core.state.lock().resolve(name)
    }

    pub fn list_names(&self) -> Vec<String> {
        self.core.state.lock().list_names()
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}
