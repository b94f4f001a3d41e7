//! Typed signal handles
//!
//! Subscribing installs one route on the connection and one match rule on
//! the daemon per handle, shared by every callback connected through it.
//! Both are removed when the last clone of the handle is dropped.
//!
//! A rule always names its sender: this connection for exported objects,
//! the object's destination otherwise. Two services exporting the same
//! path therefore never see each other's signals.

use crate::bus::SignalSink;
use crate::interfaces::dbus;
use crate::object::Object;
use crate::traits::{InterfaceDescriptor, SignalDescriptor};
use bus_api::BusError;
use bus_types::BusName;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use wire::{MatchRule, Message, MessageBody};

type Subscriber<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Subscription {
    route: u64,
    rule: MatchRule,
    watched: Option<BusName>,
}

struct SignalInner<S: SignalDescriptor> {
    object: Arc<Object>,
    subscribers: Arc<Mutex<Vec<Subscriber<S::Value>>>>,
    subscription: Mutex<Option<Subscription>>,
}

/// Handle on signal `S` of one object
pub struct Signal<S: SignalDescriptor> {
    inner: Arc<SignalInner<S>>,
}

impl<S: SignalDescriptor> Signal<S> {
    pub(crate) fn new(object: Arc<Object>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                object,
                subscribers: Arc::new(Mutex::new(Vec::new())),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Runs `callback` on the dispatch thread for every matching signal
    pub fn connect<F>(&self, callback: F) -> Result<(), BusError>
    where
        F: Fn(S::Value) + Send + Sync + 'static,
    {
        let mut subscription = self.inner.subscription.lock();
        if subscription.is_none() {
            *subscription = Some(self.subscribe()?);
        }
        self.inner.subscribers.lock().push(Arc::new(callback));
        Ok(())
    }

    fn subscribe(&self) -> Result<Subscription, BusError> {
        let object = &self.inner.object;
        let bus = object.bus();
        let (sender, watched) = if object.is_exported() {
            (bus.unique_name().clone(), None)
        } else {
            let destination = object.destination().clone();
            bus.watch_name_owner(&destination)?;
            (destination.clone(), Some(destination))
        };
        let rule = MatchRule::signal()
            .with_sender(sender.to_string())
            .with_path(object.path().clone())
            .with_interface(<S::Interface as InterfaceDescriptor>::NAME)
            .with_member(S::NAME);
        let subscribers = Arc::clone(&self.inner.subscribers);
        let sink: SignalSink = Arc::new(move |msg: &Message| deliver::<S>(&subscribers, msg));
        let route = bus.add_signal_route(rule.clone(), sink);

        if let Err(err) = dbus::add_match_no_reply(bus, &rule) {
            bus.remove_signal_route(route);
            if let Some(name) = &watched {
                bus.unwatch_name_owner(name);
            }
            return Err(err);
        }
        tracing::debug!(%rule, route, "signal subscribed");
        Ok(Subscription {
            route,
            rule,
            watched,
        })
    }

    /// Sends `value` as this signal
    pub fn emit(&self, value: &S::Value) -> Result<(), BusError> {
        self.inner.object.emit_signal::<S>(value)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

fn deliver<S: SignalDescriptor>(subscribers: &Mutex<Vec<Subscriber<S::Value>>>, msg: &Message) {
    let subscribers: Vec<Subscriber<S::Value>> = subscribers.lock().clone();
    for subscriber in subscribers {
        match <S::Value as MessageBody>::read_body(&mut msg.reader()) {
            Ok(value) => subscriber(value),
            Err(err) => {
                tracing::error!(signal = S::NAME, error = %err, "dropping undecodable signal");
                return;
            }
        }
    }
}

impl<S: SignalDescriptor> Drop for SignalInner<S> {
    fn drop(&mut self) {
        let Some(subscription) = self.subscription.lock().take() else {
            return;
        };
        let bus = self.object.bus();
        bus.remove_signal_route(subscription.route);
        if let Some(name) = &subscription.watched {
            bus.unwatch_name_owner(name);
        }
        if let Err(err) = dbus::remove_match_no_reply(bus, &subscription.rule) {
            tracing::warn!(rule = %subscription.rule, error = %err, "failed to remove match rule");
        }
    }
}

impl<S: SignalDescriptor> Clone for Signal<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SignalDescriptor> fmt::Debug for Signal<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("interface", &<S::Interface as InterfaceDescriptor>::NAME)
            .field("name", &S::NAME)
            .field("path", self.inner.object.path())
            .finish()
    }
}
