//! Completion handoff for outstanding calls
//!
//! A [`PendingCall`] is created when a call is sent and resolved by whichever
//! thread sees its outcome first: the dispatch thread when the reply arrives,
//! or the deadline sweep when it expires. Resolution happens once; later
//! attempts are rejected and logged.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::time::Instant;
use wire::Message;

/// Outcome of a call
#[derive(Debug, Clone)]
pub enum Completion {
    /// A method return or error correlated with the call
    Reply(Message),
    /// No reply arrived before the deadline
    TimedOut,
}

type Continuation = Box<dyn FnOnce(Completion) + Send>;

enum State {
    Waiting(Option<Continuation>),
    Resolved(Option<Completion>),
}

/// One call awaiting its reply
pub struct PendingCall {
    serial: u32,
    deadline: Instant,
    state: Mutex<State>,
    resolved: Condvar,
}

impl PendingCall {
    /// A call whose outcome is collected by a blocked waiter
    pub fn new(serial: u32, deadline: Instant) -> Self {
        Self {
            serial,
            deadline,
            state: Mutex::new(State::Waiting(None)),
            resolved: Condvar::new(),
        }
    }

    /// A call whose outcome is handed to `continuation` by the resolving thread
    pub fn with_continuation<F>(serial: u32, deadline: Instant, continuation: F) -> Self
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        Self {
            serial,
            deadline,
            state: Mutex::new(State::Waiting(Some(Box::new(continuation)))),
            resolved: Condvar::new(),
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Resolves the call; returns false if it was already resolved
    ///
    /// The continuation, if any, runs on the calling thread after the
    /// internal lock is released.
    pub fn resolve(&self, completion: Completion) -> bool {
        let deferred = {
            let mut state = self.state.lock();
            let continuation = match &mut *state {
                State::Resolved(_) => {
                    tracing::warn!(serial = self.serial, "pending call already resolved");
                    return false;
                }
                State::Waiting(continuation) => continuation.take(),
            };
            match continuation {
                Some(continuation) => {
                    *state = State::Resolved(None);
                    Some((continuation, completion))
                }
                None => {
                    *state = State::Resolved(Some(completion));
                    None
                }
            }
        };
        self.resolved.notify_all();
        if let Some((continuation, completion)) = deferred {
            continuation(completion);
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.lock(), State::Resolved(_))
    }

    /// Blocks until the call resolves or `deadline` passes
    ///
    /// Returns whether the call is resolved.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while !matches!(*state, State::Resolved(_)) {
            if self.resolved.wait_until(&mut state, deadline).timed_out() {
                return matches!(*state, State::Resolved(_));
            }
        }
        true
    }

    /// Takes the outcome of a resolved call without a continuation
    pub fn take_completion(&self) -> Option<Completion> {
        match &mut *self.state.lock() {
            State::Resolved(completion) => completion.take(),
            State::Waiting(_) => None,
        }
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("serial", &self.serial)
            .field("deadline", &self.deadline)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn later(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn test_resolve_once() {
        let call = PendingCall::new(1, later(1000));
        assert!(!call.is_resolved());
        assert!(call.resolve(Completion::TimedOut));
        assert!(!call.resolve(Completion::TimedOut));
        assert!(call.is_resolved());
        assert!(matches!(call.take_completion(), Some(Completion::TimedOut)));
        assert!(call.take_completion().is_none());
    }

    #[test]
    fn test_wait_times_out_without_resolution() {
        let call = PendingCall::new(2, later(10));
        assert!(!call.wait_until(later(20)));
    }

    #[test]
    fn test_waiter_unblocked_by_other_thread() {
        let call = Arc::new(PendingCall::new(3, later(5000)));
        let resolver = {
            let call = Arc::clone(&call);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                call.resolve(Completion::TimedOut)
            })
        };
        assert!(call.wait_until(later(5000)));
        assert!(resolver.join().unwrap());
    }

    #[test]
    fn test_continuation_runs_exactly_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let call = {
            let hits = Arc::clone(&hits);
            PendingCall::with_continuation(4, later(1000), move |completion| {
                assert!(matches!(completion, Completion::TimedOut));
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(call.resolve(Completion::TimedOut));
        assert!(!call.resolve(Completion::TimedOut));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(call.take_completion().is_none());
    }
}
