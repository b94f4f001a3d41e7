//! # Dispatch
//!
//! Typed method, property and signal dispatch over a message bus.
//!
//! ## Philosophy
//!
//! - **Descriptors, not strings**: every method, property and signal is a
//!   marker type whose names, timeout and payload types are fixed at
//!   compile time. A call site cannot pass arguments its descriptor does
//!   not declare.
//! - **Two error tiers**: error replies and timeouts are outcomes of a
//!   [`CallResult`]. Misuse and corrupted replies are [`BusError`]s.
//! - **One loop**: handlers, signal callbacks and continuations all run on
//!   the executor's thread in delivery order.
//!
//! ## Design Goals
//!
//! 1. **Skeleton and stub on one engine**: the same [`Object`] type exports
//!    an implementation or calls a remote one
//! 2. **Blocking calls without a second loop**: a synchronous call is a
//!    pending entry plus a blocking handoff that the loop resolves
//! 3. **No retries**: failed or timed-out calls are reissued by the caller
//!
//! ## Key Types
//!
//! - [`Bus`]: one connection; pending calls, exports, signal routes
//! - [`Service`]: an owned or referenced bus name
//! - [`Object`]: an addressable path under a service
//! - [`Property`] / [`Signal`]: typed front-ends over an object
//! - [`CallResult`]: outcome of one remote call
//! - [`ThreadExecutor`]: polling executor for a dedicated thread

pub mod bus;
pub mod config;
pub mod executor;
pub mod interfaces;
pub mod object;
pub mod property;
pub mod result;
pub mod service;
pub mod signal;
pub mod skeleton;
pub mod traits;

pub use bus::{Bus, SignalSink};
pub use bus_api::BusError;
pub use config::ConnectionConfig;
pub use executor::ThreadExecutor;
pub use object::{MethodError, MethodHandler, Object};
pub use property::Property;
pub use result::{CallError, CallResult};
pub use service::Service;
pub use signal::Signal;
pub use skeleton::{Skeleton, Stub};
pub use traits::{
    InterfaceDescriptor, MethodDescriptor, PropertyDescriptor, SignalDescriptor,
    DEFAULT_METHOD_TIMEOUT,
};
