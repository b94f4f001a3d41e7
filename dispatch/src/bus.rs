//! Bus connection
//!
//! A [`Bus`] sits on one [`Transport`] and owns the state every other piece
//! shares: the table of calls awaiting replies, the exported objects, and
//! the signal routes. Incoming messages are dispatched by [`Bus::dispatch`],
//! which an [`Executor`] reaches through the [`MessagePump`] impl.
//!
//! No lock is held while a handler, continuation or signal callback runs,
//! so callbacks may freely call back into the bus.
//!
//! Signals are only delivered from their rule's sender. Rules naming a
//! well-known name are checked against a cache of that name's current
//! owner, kept fresh from the daemon's `NameOwnerChanged` broadcasts.

use crate::config::ConnectionConfig;
use crate::interfaces::dbus::{self, GetNameOwner, NameOwnerChangedArgs};
use crate::interfaces::introspectable;
use crate::object::Object;
use bus_api::{BusError, Completion, Executor, MessagePump, PendingCall, Transport};
use bus_types::{error_names, BusName, ObjectPath, DBUS_SERVICE};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use wire::{MatchRule, Message, MessageBody, MessageType};

/// Callback receiving every signal that matches a route
pub type SignalSink = Arc<dyn Fn(&Message) + Send + Sync>;

struct SignalRoute {
    id: u64,
    rule: MatchRule,
    sink: SignalSink,
}

/// Last known owner of a watched well-known name
#[derive(Debug, Default)]
struct NameOwner {
    owner: Option<BusName>,
    watchers: usize,
    /// Bumped on every change notice so stale lookups can be discarded
    generation: u64,
}

/// One connection to the bus
pub struct Bus {
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    executor: RwLock<Option<Arc<dyn Executor>>>,
    dispatch_thread: Mutex<Option<ThreadId>>,
    pending: Mutex<HashMap<u32, Arc<PendingCall>>>,
    exports: RwLock<BTreeMap<ObjectPath, Weak<Object>>>,
    signal_routes: Mutex<Vec<SignalRoute>>,
    next_route_id: AtomicU64,
    name_owners: RwLock<HashMap<BusName, NameOwner>>,
    owner_tracking: Mutex<Option<u64>>,
}

impl Bus {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::with_config(transport, ConnectionConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: ConnectionConfig) -> Arc<Self> {
        tracing::debug!(
            unique_name = %transport.unique_name(),
            bus = %config.bus,
            "bus connection created"
        );
        Arc::new(Self {
            transport,
            config,
            executor: RwLock::new(None),
            dispatch_thread: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            exports: RwLock::new(BTreeMap::new()),
            signal_routes: Mutex::new(Vec::new()),
            next_route_id: AtomicU64::new(1),
            name_owners: RwLock::new(HashMap::new()),
            owner_tracking: Mutex::new(None),
        })
    }

    /// Unique name the bus assigned to this connection
    pub fn unique_name(&self) -> &BusName {
        self.transport.unique_name()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Installs the executor that [`Bus::run`] drives
    pub fn install_executor(&self, executor: Arc<dyn Executor>) {
        *self.executor.write() = Some(executor);
    }

    pub fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.executor.read().clone()
    }

    /// Runs the dispatch loop on the calling thread until [`Bus::stop`]
    pub fn run(&self) -> Result<(), BusError> {
        let executor = self
            .executor()
            .ok_or_else(|| BusError::Config("no executor installed".to_string()))?;
        *self.dispatch_thread.lock() = Some(thread::current().id());
        tracing::debug!(unique_name = %self.unique_name(), "dispatch loop started");
        let result = executor.run(self);
        *self.dispatch_thread.lock() = None;
        tracing::debug!(unique_name = %self.unique_name(), "dispatch loop stopped");
        result
    }

    /// Asks the installed executor to leave its loop
    pub fn stop(&self) {
        if let Some(executor) = self.executor() {
            executor.stop();
        }
    }

    fn is_dispatch_thread(&self) -> bool {
        *self.dispatch_thread.lock() == Some(thread::current().id())
    }

    fn running_executor(&self) -> Option<Arc<dyn Executor>> {
        self.executor().filter(|executor| executor.is_running())
    }

    pub fn send(&self, msg: Message) -> Result<(), BusError> {
        tracing::trace!(message = %msg, "sending");
        self.transport.send(msg)
    }

    /// Sends a call and blocks for [`ConnectionConfig::default_call_timeout`]
    pub fn call(&self, msg: Message) -> Result<Completion, BusError> {
        self.call_blocking(msg, self.config.default_call_timeout())
    }

    /// Sends a call and blocks until its reply arrives or `timeout` elapses
    ///
    /// While an executor is running on another thread the caller just waits
    /// on the completion handoff. Without one, the caller pumps the
    /// connection itself.
    pub fn call_blocking(&self, msg: Message, timeout: Duration) -> Result<Completion, BusError> {
        if self.is_dispatch_thread() {
            return Err(BusError::CalledFromDispatchThread);
        }
        let serial = msg.serial();
        let deadline = Instant::now() + timeout;
        let call = Arc::new(PendingCall::new(serial, deadline));
        self.pending.lock().insert(serial, Arc::clone(&call));
        if let Err(err) = self.send(msg) {
            self.pending.lock().remove(&serial);
            return Err(err);
        }

        let slice = self.config.poll_interval();
        while !call.is_resolved() {
            let now = Instant::now();
            if now >= deadline {
                let expired = self.pending.lock().remove(&serial);
                match expired {
                    Some(expired) => {
                        expired.resolve(Completion::TimedOut);
                    }
                    // Someone else took the entry and is about to resolve it
                    None => {
                        call.wait_until(now + slice);
                    }
                }
                continue;
            }
            let until = deadline.min(now + slice);
            match self.running_executor() {
                Some(executor) => {
                    executor.block_on(&call, until);
                }
                None => {
                    self.pump_once(until - now)?;
                }
            }
        }
        Ok(call.take_completion().unwrap_or(Completion::TimedOut))
    }

    /// Sends a call whose outcome is handed to `continuation`
    ///
    /// The continuation runs on the dispatch thread when the reply arrives,
    /// or when the executor notices the deadline has passed.
    pub fn call_with_continuation<F>(
        &self,
        msg: Message,
        timeout: Duration,
        continuation: F,
    ) -> Result<(), BusError>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let serial = msg.serial();
        let call = PendingCall::with_continuation(serial, Instant::now() + timeout, continuation);
        self.pending.lock().insert(serial, Arc::new(call));
        if let Err(err) = self.send(msg) {
            self.pending.lock().remove(&serial);
            return Err(err);
        }
        Ok(())
    }

    /// Resolves every pending call whose deadline is at or before `now`
    pub fn expire_pending(&self, now: Instant) {
        let expired: Vec<Arc<PendingCall>> = {
            let mut pending = self.pending.lock();
            let serials: Vec<u32> = pending
                .values()
                .filter(|call| call.deadline() <= now)
                .map(|call| call.serial())
                .collect();
            serials
                .into_iter()
                .filter_map(|serial| pending.remove(&serial))
                .collect()
        };
        for call in expired {
            tracing::debug!(serial = call.serial(), "call timed out");
            call.resolve(Completion::TimedOut);
        }
    }

    /// Number of calls still awaiting an outcome
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    /// Routes one incoming message
    pub fn dispatch(&self, msg: Message) {
        tracing::trace!(message = %msg, "dispatching");
        match msg.message_type() {
            MessageType::MethodReturn | MessageType::Error => self.dispatch_reply(msg),
            MessageType::Signal => self.dispatch_signal(&msg),
            MessageType::MethodCall => self.dispatch_call(&msg),
        }
    }

    fn dispatch_reply(&self, msg: Message) {
        let Some(serial) = msg.reply_serial() else {
            tracing::warn!(message = %msg, "reply without reply serial");
            return;
        };
        let call = self.pending.lock().remove(&serial);
        match call {
            Some(call) => {
                call.resolve(Completion::Reply(msg));
            }
            None => tracing::debug!(serial, "reply for a call that is no longer pending"),
        }
    }

    fn dispatch_signal(&self, msg: &Message) {
        let sinks: Vec<SignalSink> = self
            .signal_routes
            .lock()
            .iter()
            .filter(|route| route.rule.matches_resolved(msg, |name| self.resolve_sender(name)))
            .map(|route| Arc::clone(&route.sink))
            .collect();
        if sinks.is_empty() {
            tracing::trace!(message = %msg, "signal has no local subscribers");
        }
        for sink in sinks {
            sink(msg);
        }
    }

    fn dispatch_call(&self, msg: &Message) {
        let Some(path) = msg.path() else {
            return;
        };
        let object = self.exports.read().get(path).and_then(Weak::upgrade);
        let handled = match &object {
            Some(object) => object.handle_call(msg),
            None => self.introspect_intermediate_node(path, msg),
        };
        if handled || msg.no_reply_expected() {
            return;
        }
        let member = msg.member().unwrap_or_default();
        let (name, description) = match object {
            Some(_) => (
                error_names::UNKNOWN_METHOD,
                format!(
                    "No such method '{}' in interface '{}' at object path '{}'",
                    member,
                    msg.interface().unwrap_or_default(),
                    path
                ),
            ),
            None => (
                error_names::UNKNOWN_OBJECT,
                format!("No such object path '{}'", path),
            ),
        };
        tracing::debug!(%path, member, error = name, "rejecting incoming call");
        self.reply_error(msg, name, &description);
    }

    /// Answers `Introspect` on a path with exported descendants but no object
    fn introspect_intermediate_node(&self, path: &ObjectPath, msg: &Message) -> bool {
        if msg.member() != Some(introspectable::INTROSPECT)
            || msg.interface().is_some_and(|i| i != introspectable::INTERFACE)
        {
            return false;
        }
        let children = self.child_nodes(path);
        if children.is_empty() {
            return false;
        }
        let mut reply = Message::method_return(msg);
        reply
            .writer()
            .write(&introspectable::render(&BTreeMap::new(), &children));
        self.send_reply(reply);
        true
    }

    /// Sends a reply from inside a handler, logging instead of failing
    pub fn send_reply(&self, reply: Message) {
        if let Err(err) = self.send(reply) {
            tracing::warn!(error = %err, "failed to send reply");
        }
    }

    /// Sends an error reply to `call` unless it asked for no reply
    pub fn reply_error(&self, call: &Message, name: &str, description: &str) {
        if call.no_reply_expected() {
            return;
        }
        match Message::error(call, name, description) {
            Ok(reply) => self.send_reply(reply),
            Err(err) => tracing::error!(error = %err, name, "cannot build error reply"),
        }
    }

    pub(crate) fn export(&self, object: &Arc<Object>) -> Result<(), BusError> {
        let mut exports = self.exports.write();
        let path = object.path().clone();
        if exports.get(&path).and_then(Weak::upgrade).is_some() {
            return Err(BusError::DuplicateObjectPath(path.to_string()));
        }
        tracing::debug!(%path, "object exported");
        exports.insert(path, Arc::downgrade(object));
        Ok(())
    }

    /// Removes the export at `path` if its object is gone
    pub(crate) fn unexport_dead(&self, path: &ObjectPath) {
        let mut exports = self.exports.write();
        if exports.get(path).is_some_and(|weak| weak.strong_count() == 0) {
            exports.remove(path);
            tracing::debug!(%path, "object unexported");
        }
    }

    /// Removes the export at `path` if it refers to `object`
    pub(crate) fn unexport(&self, object: &Arc<Object>) {
        let mut exports = self.exports.write();
        let path = object.path();
        if exports
            .get(path)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(object)))
        {
            exports.remove(path);
            tracing::debug!(%path, "object unexported");
        }
    }

    /// Paths of all live exported objects
    pub fn exported_paths(&self) -> Vec<ObjectPath> {
        self.exports
            .read()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Names of the direct children of `path` that lead to exported objects
    pub fn child_nodes(&self, path: &ObjectPath) -> Vec<String> {
        let mut children: Vec<String> = self
            .exported_paths()
            .iter()
            .filter_map(|descendant| path.child_segment(descendant).map(str::to_string))
            .collect();
        children.dedup();
        children
    }

    /// Registers `sink` for signals matching `rule`; returns the route id
    pub fn add_signal_route(&self, rule: MatchRule, sink: SignalSink) -> u64 {
        let id = self.next_route_id.fetch_add(1, Ordering::Relaxed);
        self.signal_routes.lock().push(SignalRoute { id, rule, sink });
        id
    }

    pub fn remove_signal_route(&self, id: u64) {
        self.signal_routes.lock().retain(|route| route.id != id);
    }

    /// Connection currently allowed to send as `name`
    ///
    /// Unique names and the daemon stand for themselves. Well-known names
    /// resolve through the owner cache and yield `None` unless watched.
    pub fn resolve_sender(&self, name: &str) -> Option<BusName> {
        if name == DBUS_SERVICE {
            return BusName::new(DBUS_SERVICE).ok();
        }
        let name = BusName::new(name).ok()?;
        if name.is_unique() {
            return Some(name);
        }
        self.name_owners
            .read()
            .get(&name)
            .and_then(|entry| entry.owner.clone())
    }

    /// Starts following the owner of `name` for sender checks
    ///
    /// The first watcher of a name looks up its current owner. Calls made
    /// from the dispatch thread look it up asynchronously, so signals sent
    /// before the answer arrives are not delivered.
    pub(crate) fn watch_name_owner(self: &Arc<Self>, name: &BusName) -> Result<(), BusError> {
        if name.is_unique() || name.as_str() == DBUS_SERVICE {
            return Ok(());
        }
        let first = {
            let mut owners = self.name_owners.write();
            let entry = owners.entry(name.clone()).or_default();
            entry.watchers += 1;
            entry.watchers == 1
        };
        if first {
            let looked_up = self
                .track_owner_changes()
                .and_then(|()| self.refresh_name_owner(name));
            if let Err(err) = looked_up {
                self.unwatch_name_owner(name);
                return Err(err);
            }
        }
        Ok(())
    }

    pub(crate) fn unwatch_name_owner(&self, name: &BusName) {
        let mut owners = self.name_owners.write();
        if let Some(entry) = owners.get_mut(name) {
            entry.watchers = entry.watchers.saturating_sub(1);
            if entry.watchers == 0 {
                owners.remove(name);
            }
        }
    }

    /// Subscribes once per connection to `NameOwnerChanged`
    fn track_owner_changes(self: &Arc<Self>) -> Result<(), BusError> {
        let mut tracking = self.owner_tracking.lock();
        if tracking.is_some() {
            return Ok(());
        }
        let rule = dbus::name_owner_changed_rule()?;
        let bus = Arc::downgrade(self);
        let sink: SignalSink = Arc::new(move |msg: &Message| {
            if let Some(bus) = bus.upgrade() {
                bus.note_owner_change(msg);
            }
        });
        let route = self.add_signal_route(rule.clone(), sink);
        if let Err(err) = dbus::add_match_no_reply(self, &rule) {
            self.remove_signal_route(route);
            return Err(err);
        }
        *tracking = Some(route);
        Ok(())
    }

    fn refresh_name_owner(self: &Arc<Self>, name: &BusName) -> Result<(), BusError> {
        let Some(generation) = self.name_owners.read().get(name).map(|e| e.generation) else {
            return Ok(());
        };
        let daemon = dbus::daemon(self)?;
        let args = (name.to_string(),);
        if self.is_dispatch_thread() {
            let bus = Arc::downgrade(self);
            let name = name.clone();
            daemon.invoke_method_asynchronously::<GetNameOwner, _>(args, move |result| {
                if let Some(bus) = bus.upgrade() {
                    bus.record_owner(&name, generation, result.value().map(String::as_str));
                }
            })
        } else {
            let result = daemon.invoke_method_synchronously::<GetNameOwner>(args)?;
            self.record_owner(name, generation, result.value().map(String::as_str));
            Ok(())
        }
    }

    /// Stores a looked-up owner unless a change notice overtook the lookup
    fn record_owner(&self, name: &BusName, generation: u64, owner: Option<&str>) {
        let mut owners = self.name_owners.write();
        let Some(entry) = owners.get_mut(name) else {
            return;
        };
        if entry.generation != generation {
            return;
        }
        entry.owner = owner.and_then(|owner| BusName::new(owner).ok());
        tracing::debug!(%name, owner = ?entry.owner, "name owner looked up");
    }

    fn note_owner_change(&self, msg: &Message) {
        let change = match NameOwnerChangedArgs::read_body(&mut msg.reader()) {
            Ok(change) => change,
            Err(err) => {
                tracing::warn!(error = %err, "undecodable NameOwnerChanged");
                return;
            }
        };
        let Ok(name) = BusName::new(change.name.as_str()) else {
            return;
        };
        let mut owners = self.name_owners.write();
        if let Some(entry) = owners.get_mut(&name) {
            entry.owner = change.new_owner();
            entry.generation += 1;
            tracing::debug!(%name, owner = ?entry.owner, "name owner changed");
        }
    }
}

impl MessagePump for Bus {
    fn pump_once(&self, timeout: Duration) -> Result<bool, BusError> {
        let received = self.transport.receive(timeout)?;
        let dispatched = match received {
            Some(msg) => {
                self.dispatch(msg);
                true
            }
            None => false,
        };
        self.expire_pending(Instant::now());
        Ok(dispatched)
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        let pending: Vec<Arc<PendingCall>> =
            self.pending.lock().drain().map(|(_, call)| call).collect();
        for call in pending {
            call.resolve(Completion::TimedOut);
        }
    }
}
