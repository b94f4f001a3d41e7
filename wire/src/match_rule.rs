//! Match rules for signal subscription
//!
//! A rule is a conjunction of header constraints; absent keys match
//! anything. The text form is the one the daemon's `AddMatch` accepts,
//! e.g. `type='signal',interface='org.example.Iface',member='Changed'`.

use crate::error::WireError;
use crate::message::{Message, MessageType};
use bus_types::{BusName, ObjectPath};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MatchRule {
    pub message_type: Option<MessageType>,
    pub sender: Option<String>,
    pub path: Option<ObjectPath>,
    pub interface: Option<String>,
    pub member: Option<String>,
}

impl MatchRule {
    /// A rule matching every signal
    pub fn signal() -> Self {
        Self {
            message_type: Some(MessageType::Signal),
            ..Self::default()
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_path(mut self, path: ObjectPath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn parse(text: &str) -> Result<Self, WireError> {
        let invalid = || WireError::InvalidMatchRule(text.to_string());
        let mut rule = Self::default();
        for clause in text.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (key, value) = clause.split_once('=').ok_or_else(invalid)?;
            let value = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .ok_or_else(invalid)?;
            match key.trim() {
                "type" => {
                    rule.message_type = Some(MessageType::from_name(value).ok_or_else(invalid)?)
                }
                "sender" => rule.sender = Some(value.to_string()),
                "path" => rule.path = Some(ObjectPath::new(value)?),
                "interface" => rule.interface = Some(value.to_string()),
                "member" => rule.member = Some(value.to_string()),
                _ => return Err(invalid()),
            }
        }
        Ok(rule)
    }

    /// Checks `msg` against the rule, comparing the sender literally
    pub fn matches(&self, msg: &Message) -> bool {
        self.matches_resolved(msg, |name| BusName::new(name).ok())
    }

    /// Checks `msg` against the rule, mapping a well-known sender in the
    /// rule to its current owner through `resolve`
    pub fn matches_resolved<F>(&self, msg: &Message, resolve: F) -> bool
    where
        F: Fn(&str) -> Option<BusName>,
    {
        if let Some(message_type) = self.message_type {
            if msg.message_type() != message_type {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if msg.path() != Some(path) {
                return false;
            }
        }
        if let Some(interface) = &self.interface {
            if msg.interface() != Some(interface.as_str()) {
                return false;
            }
        }
        if let Some(member) = &self.member {
            if msg.member() != Some(member.as_str()) {
                return false;
            }
        }
        if let Some(sender) = &self.sender {
            let owner = resolve(sender);
            if owner.is_none() || msg.sender() != owner.as_ref() {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clauses = Vec::new();
        if let Some(message_type) = self.message_type {
            clauses.push(format!("type='{}'", message_type));
        }
        if let Some(sender) = &self.sender {
            clauses.push(format!("sender='{}'", sender));
        }
        if let Some(path) = &self.path {
            clauses.push(format!("path='{}'", path));
        }
        if let Some(interface) = &self.interface {
            clauses.push(format!("interface='{}'", interface));
        }
        if let Some(member) = &self.member {
            clauses.push(format!("member='{}'", member));
        }
        f.write_str(&clauses.join(","))
    }
}

impl FromStr for MatchRule {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
