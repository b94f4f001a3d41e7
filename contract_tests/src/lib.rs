//! # Interface Contract Tests
//!
//! "Golden" tests for the standard bus interfaces, so their wire contracts
//! don't drift accidentally over time.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: every name, signature and timeout a peer
//!   relies on is written down as a constant here
//! - **Testability first**: contract tests fail when a descriptor changes
//! - **Mechanism not policy**: pin what goes on the wire, not how it is used
//!
//! ## Structure
//!
//! Each interface has a module with contract tests that verify:
//! - Interface and member names
//! - Argument and reply signatures
//! - Default timeouts and synchronous-only markers
//! - Flag bits and reply codes

pub mod daemon;
pub mod names;
pub mod standard;

/// Common helpers for contract validation
pub mod test_helpers {
    use bus_types::{BusName, ObjectPath};
    use dispatch::{InterfaceDescriptor, MethodDescriptor};
    use std::time::Duration;
    use wire::{Arguments, Message, MessageBody};

    /// Builds the call a stub sends for `M`, framed and parsed back
    pub fn framed_call<M: MethodDescriptor>(args: &M::Args) -> Message {
        let mut call = Message::method_call(
            Some(BusName::new("org.example.Contract").expect("valid name")),
            ObjectPath::root(),
            <M::Interface as InterfaceDescriptor>::NAME,
            M::NAME,
        )
        .expect("valid call header");
        args.write_args(&mut call.writer());
        Message::decode(&call.encode()).expect("call survives framing")
    }

    /// Verifies the names and signatures of `M`
    pub fn verify_method_contract<M: MethodDescriptor>(
        interface: &str,
        member: &str,
        args: &str,
        reply: &str,
    ) {
        assert_eq!(
            <M::Interface as InterfaceDescriptor>::NAME,
            interface,
            "Interface of {} changed",
            member
        );
        assert_eq!(M::NAME, member, "Member name changed");
        assert_eq!(
            <M::Args as Arguments>::signature().to_string(),
            args,
            "Argument signature of {} changed",
            member
        );
        assert_eq!(
            <M::Reply as MessageBody>::signature().to_string(),
            reply,
            "Reply signature of {} changed",
            member
        );
    }

    /// Verifies the timeout and invocation mode of `M`
    pub fn verify_call_policy<M: MethodDescriptor>(timeout: Duration, synchronous: bool) {
        assert_eq!(M::DEFAULT_TIMEOUT, timeout, "Timeout of {} changed", M::NAME);
        assert_eq!(
            M::CALL_SYNCHRONOUSLY,
            synchronous,
            "Invocation mode of {} changed",
            M::NAME
        );
    }
}
