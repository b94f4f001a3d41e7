//! # Simulated Bus
//!
//! An in-process stand-in for a message bus daemon.
//!
//! ## Philosophy
//!
//! The dispatch engine only needs a [`bus_api::Transport`]. This crate
//! provides one whose far end is a small daemon living in the same
//! process, so skeletons and stubs can talk to each other in tests
//! without sockets.
//!
//! ## Design Goals
//!
//! 1. **Wire fidelity**: messages cross the transport as encoded frames
//! 2. **Daemon semantics**: name ownership, owner queues and match rules
//!    behave like the real daemon's `org.freedesktop.DBus` interface
//! 3. **Bounded queues**: a full mailbox fails the send instead of growing
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A cross-process bus (no sockets, no authentication)
//! - A policy engine or service activator

pub mod bus;
pub mod config;
mod daemon;
pub mod queue;
pub mod registry;
pub mod transport;

pub use bus::SimulatedBus;
pub use config::SimBusConfig;
pub use queue::{Mailbox, MessageQueue, QueueError};
pub use registry::NameRegistry;
pub use transport::SimTransport;
