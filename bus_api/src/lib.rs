//! # Bus API
//!
//! This crate defines the boundary between the dispatch engine and the two
//! collaborators it does not implement itself: the transport that moves
//! messages and the executor that drives the dispatch loop.
//!
//! ## Philosophy
//!
//! The engine consumes **mechanisms**, not policies:
//! - A transport only sends a message and delivers the next incoming one
//! - An executor only runs the loop, stops it, and blocks a caller until a
//!   pending call resolves or its deadline passes
//!
//! ## Design Goals
//!
//! 1. **Testability**: an in-process bus can stand in for a real daemon
//! 2. **Thread handoff**: a call may block on one thread while another
//!    thread runs the loop that resolves it
//! 3. **Single resolution**: a pending call resolves exactly once
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A socket or authentication layer
//! - An event loop (any conforming [`Executor`] plugs in)

pub mod error;
pub mod executor;
pub mod pending;
pub mod transport;

pub use error::BusError;
pub use executor::{Executor, MessagePump};
pub use pending::{Completion, PendingCall};
pub use transport::Transport;
