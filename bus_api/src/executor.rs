//! Executor contract

use crate::{BusError, PendingCall};
use std::time::{Duration, Instant};

/// One step of a connection's read and dispatch loop
pub trait MessagePump: Send + Sync {
    /// Waits up to `timeout` for one incoming message and dispatches it,
    /// then expires overdue pending calls
    ///
    /// Returns whether a message was dispatched.
    fn pump_once(&self, timeout: Duration) -> Result<bool, BusError>;
}

/// Drives a connection's dispatch loop
///
/// All handler callbacks, signal subscribers and asynchronous continuations
/// run on the thread inside [`Executor::run`], in delivery order.
pub trait Executor: Send + Sync {
    /// Pumps `pump` until [`Executor::stop`] is called
    fn run(&self, pump: &dyn MessagePump) -> Result<(), BusError>;

    /// Requests the loop to exit; callable from any thread, including from
    /// inside a dispatched callback
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Blocks the calling thread until `call` resolves or `deadline` passes
    ///
    /// Must not require the calling thread to process incoming data.
    /// Returns whether the call resolved.
    fn block_on(&self, call: &PendingCall, deadline: Instant) -> bool {
        call.wait_until(deadline)
    }
}
