//! Well-known name ownership
//!
//! Each well-known name has at most one primary owner and a queue of
//! connections waiting to take over. Ownership follows the daemon's
//! `RequestName` rules: an owner that allowed replacement loses the name to
//! a requester asking to replace it, and otherwise the requester queues
//! unless it asked not to.

use bus_types::{BusName, ReleaseNameReply, RequestNameFlags, RequestNameReply};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    connection: BusName,
    flags: RequestNameFlags,
}

#[derive(Debug, Clone)]
struct NameEntry {
    owner: Claim,
    queue: VecDeque<Claim>,
}

impl NameEntry {
    fn dequeue(&mut self, connection: &BusName) -> bool {
        let before = self.queue.len();
        self.queue.retain(|claim| &claim.connection != connection);
        self.queue.len() != before
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: BTreeMap<BusName, NameEntry>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(
        &mut self,
        name: &BusName,
        connection: &BusName,
        flags: RequestNameFlags,
    ) -> RequestNameReply {
        let claim = Claim {
            connection: connection.clone(),
            flags,
        };
        let Some(entry) = self.names.get_mut(name) else {
            self.names.insert(
                name.clone(),
                NameEntry {
                    owner: claim,
                    queue: VecDeque::new(),
                },
            );
            return RequestNameReply::PrimaryOwner;
        };

        if &entry.owner.connection == connection {
            entry.owner.flags = flags;
            return RequestNameReply::AlreadyOwner;
        }

        if entry.owner.flags.allow_replacement && flags.replace_existing {
            entry.dequeue(connection);
            let previous = std::mem::replace(&mut entry.owner, claim);
            if !previous.flags.do_not_queue {
                entry.queue.push_front(previous);
            }
            return RequestNameReply::PrimaryOwner;
        }

        if flags.do_not_queue {
            entry.dequeue(connection);
            return RequestNameReply::Exists;
        }

        match entry
            .queue
            .iter_mut()
            .find(|queued| &queued.connection == connection)
        {
            Some(queued) => queued.flags = flags,
            None => entry.queue.push_back(claim),
        }
        RequestNameReply::InQueue
    }

    pub fn release(&mut self, name: &BusName, connection: &BusName) -> ReleaseNameReply {
        let Some(entry) = self.names.get_mut(name) else {
            return ReleaseNameReply::NonExistent;
        };
        if &entry.owner.connection == connection {
            match entry.queue.pop_front() {
                Some(next) => entry.owner = next,
                None => {
                    self.names.remove(name);
                }
            }
            return ReleaseNameReply::Released;
        }
        if entry.dequeue(connection) {
            return ReleaseNameReply::Released;
        }
        ReleaseNameReply::NotOwner
    }

    /// Drops every claim `connection` holds or waits for
    pub fn release_all(&mut self, connection: &BusName) -> Vec<BusName> {
        let owned: Vec<BusName> = self
            .names
            .iter()
            .filter(|(_, entry)| &entry.owner.connection == connection)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &owned {
            self.release(name, connection);
        }
        for entry in self.names.values_mut() {
            entry.dequeue(connection);
        }
        owned
    }

    /// Primary owner of a well-known name
    pub fn owner(&self, name: &BusName) -> Option<&BusName> {
        self.names.get(name).map(|entry| &entry.owner.connection)
    }

    pub fn names(&self) -> impl Iterator<Item = &BusName> {
        self.names.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> BusName {
        BusName::new(text).unwrap()
    }

    #[test]
    fn test_first_request_owns() {
        let mut registry = NameRegistry::new();
        let reply = registry.request(&name("org.example.A"), &name(":1.1"), RequestNameFlags::default());
        assert_eq!(reply, RequestNameReply::PrimaryOwner);
        assert_eq!(registry.owner(&name("org.example.A")), Some(&name(":1.1")));
        let again = registry.request(&name("org.example.A"), &name(":1.1"), RequestNameFlags::default());
        assert_eq!(again, RequestNameReply::AlreadyOwner);
    }

    #[test]
    fn test_replacement_requires_permission() {
        let mut registry = NameRegistry::new();
        let service = name("org.example.A");
        registry.request(&service, &name(":1.1"), RequestNameFlags::default());

        // The owner did not allow replacement, so the requester queues
        let reply = registry.request(&service, &name(":1.2"), RequestNameFlags::default());
        assert_eq!(reply, RequestNameReply::InQueue);
        assert_eq!(registry.owner(&service), Some(&name(":1.1")));

        let reply = registry.request(
            &service,
            &name(":1.3"),
            RequestNameFlags::default().with_do_not_queue(true),
        );
        assert_eq!(reply, RequestNameReply::Exists);
    }

    #[test]
    fn test_replacement_when_allowed() {
        let mut registry = NameRegistry::new();
        let service = name("org.example.A");
        registry.request(
            &service,
            &name(":1.1"),
            RequestNameFlags::default().with_allow_replacement(true),
        );
        let reply = registry.request(&service, &name(":1.2"), RequestNameFlags::default());
        assert_eq!(reply, RequestNameReply::PrimaryOwner);
        assert_eq!(registry.owner(&service), Some(&name(":1.2")));

        // The previous owner waits in the queue and takes over on release
        assert_eq!(registry.release(&service, &name(":1.2")), ReleaseNameReply::Released);
        assert_eq!(registry.owner(&service), Some(&name(":1.1")));
    }

    #[test]
    fn test_release_replies() {
        let mut registry = NameRegistry::new();
        let service = name("org.example.A");
        assert_eq!(registry.release(&service, &name(":1.1")), ReleaseNameReply::NonExistent);
        registry.request(&service, &name(":1.1"), RequestNameFlags::default());
        assert_eq!(registry.release(&service, &name(":1.2")), ReleaseNameReply::NotOwner);
        assert_eq!(registry.release(&service, &name(":1.1")), ReleaseNameReply::Released);
        assert_eq!(registry.owner(&service), None);
    }

    #[test]
    fn test_release_all_promotes_queue() {
        let mut registry = NameRegistry::new();
        let a = name("org.example.A");
        let b = name("org.example.B");
        registry.request(&a, &name(":1.1"), RequestNameFlags::default());
        registry.request(&b, &name(":1.1"), RequestNameFlags::default());
        registry.request(&a, &name(":1.2"), RequestNameFlags::default());

        let released = registry.release_all(&name(":1.1"));
        assert_eq!(released, vec![a.clone(), b.clone()]);
        assert_eq!(registry.owner(&a), Some(&name(":1.2")));
        assert_eq!(registry.owner(&b), None);
    }
}
