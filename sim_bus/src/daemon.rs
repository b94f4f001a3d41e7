//! The daemon's `org.freedesktop.DBus` interface
//!
//! The daemon answers on any object path. It owns `org.freedesktop.DBus`
//! itself, so that name can never be requested or released.

use crate::bus::State;
use bus_types::{error_names, BusId, BusName, RequestNameFlags, DBUS_INTERFACE, DBUS_SERVICE};
use wire::{Arguments, MatchRule, Message};

struct Refusal {
    name: &'static str,
    description: String,
}

impl Refusal {
    fn new(name: &'static str, description: impl Into<String>) -> Self {
        Self {
            name,
            description: description.into(),
        }
    }
}

fn args<A: Arguments>(call: &Message) -> Result<A, Refusal> {
    A::read_args(&mut call.reader()).map_err(|err| Refusal::new(error_names::INVALID_ARGS, err.to_string()))
}

/// A well-known name other than the daemon's own
fn claimable(caller: &BusName, text: &str) -> Result<BusName, Refusal> {
    let name = BusName::new(text)
        .map_err(|err| Refusal::new(error_names::INVALID_ARGS, err.to_string()))?;
    if name.is_unique() {
        return Err(Refusal::new(
            error_names::INVALID_ARGS,
            format!("Cannot acquire a name starting with ':' such as '{}'", name),
        ));
    }
    if name.as_str() == DBUS_SERVICE {
        return Err(Refusal::new(
            error_names::INVALID_ARGS,
            format!(
                "Connection '{}' is not allowed to own the name '{}' because it is reserved",
                caller, name
            ),
        ));
    }
    Ok(name)
}

/// Answers one call addressed to the daemon
///
/// Returns `None` only when no reply can be built.
pub(crate) fn answer(state: &mut State, bus_id: &BusId, caller: &BusName, call: &Message) -> Option<Message> {
    let outcome = match call.interface() {
        Some(interface) if interface != DBUS_INTERFACE => Err(Refusal::new(
            error_names::UNKNOWN_INTERFACE,
            format!("Interface '{}' is not served by the daemon", interface),
        )),
        _ => reply(state, bus_id, caller, call),
    };
    let mut message = match outcome {
        Ok(message) => message,
        Err(refusal) => {
            tracing::debug!(%caller, member = call.member().unwrap_or_default(), error = refusal.name, "daemon refused call");
            match Message::error(call, refusal.name, &refusal.description) {
                Ok(message) => message,
                Err(err) => {
                    tracing::error!(error = %err, "cannot build daemon error reply");
                    return None;
                }
            }
        }
    };
    if let Ok(daemon) = BusName::new(DBUS_SERVICE) {
        message.set_sender(daemon);
    }
    Some(message)
}

fn reply(state: &mut State, bus_id: &BusId, caller: &BusName, call: &Message) -> Result<Message, Refusal> {
    let mut reply = Message::method_return(call);
    let member = call.member().unwrap_or_default();
    match member {
        "Hello" => {
            args::<()>(call)?;
            reply.writer().write(&caller.to_string());
        }
        "RequestName" => {
            let (name, flags): (String, u32) = args(call)?;
            let name = claimable(caller, &name)?;
            let flags = RequestNameFlags::from_bits(flags);
            let before = state.registry.owner(&name).cloned();
            let outcome = state.registry.request(&name, caller, flags);
            tracing::debug!(%caller, %name, %outcome, "name requested");
            let after = state.registry.owner(&name).cloned();
            state.announce_owner_change(&name, before.as_ref(), after.as_ref());
            reply.writer().write(&outcome.code());
        }
        "ReleaseName" => {
            let (name,): (String,) = args(call)?;
            let name = claimable(caller, &name)?;
            let before = state.registry.owner(&name).cloned();
            let outcome = state.registry.release(&name, caller);
            tracing::debug!(%caller, %name, code = outcome.code(), "name released");
            let after = state.registry.owner(&name).cloned();
            state.announce_owner_change(&name, before.as_ref(), after.as_ref());
            reply.writer().write(&outcome.code());
        }
        "ListNames" => {
            args::<()>(call)?;
            reply.writer().write(&state.list_names());
        }
        "NameHasOwner" => {
            let (name,): (String,) = args(call)?;
            let owned = name == DBUS_SERVICE
                || BusName::new(name).ok().and_then(|name| state.resolve(&name)).is_some();
            reply.writer().write(&owned);
        }
        "GetNameOwner" => {
            let (name,): (String,) = args(call)?;
            let owner = if name == DBUS_SERVICE {
                Some(name.clone())
            } else {
                BusName::new(name.as_str())
                    .ok()
                    .and_then(|bus_name| state.resolve(&bus_name))
                    .map(|owner| owner.to_string())
            };
            let owner = owner.ok_or_else(|| {
                Refusal::new(
                    error_names::NAME_HAS_NO_OWNER,
                    format!("Could not get owner of name '{}': no such name", name),
                )
            })?;
            reply.writer().write(&owner);
        }
        "GetId" => {
            args::<()>(call)?;
            reply.writer().write(&bus_id.to_hex());
        }
        "AddMatch" => {
            let (text,): (String,) = args(call)?;
            let rule = MatchRule::parse(&text)
                .map_err(|err| Refusal::new(error_names::MATCH_RULE_INVALID, err.to_string()))?;
            state.add_match(caller, rule);
        }
        "RemoveMatch" => {
            let (text,): (String,) = args(call)?;
            let rule = MatchRule::parse(&text)
                .map_err(|err| Refusal::new(error_names::MATCH_RULE_INVALID, err.to_string()))?;
            if !state.remove_match(caller, &rule) {
                return Err(Refusal::new(
                    error_names::MATCH_RULE_NOT_FOUND,
                    format!("The given match rule '{}' wasn't found", text),
                ));
            }
        }
        _ => {
            return Err(Refusal::new(
                error_names::UNKNOWN_METHOD,
                format!("Unknown method '{}' on the daemon", member),
            ))
        }
    }
    Ok(reply)
}
