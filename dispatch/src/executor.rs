//! Thread-driven executor
//!
//! [`ThreadExecutor`] runs the dispatch loop on whichever thread calls
//! [`Executor::run`], usually a dedicated one. The loop pumps one message at
//! a time and checks the stop flag between pumps, so [`Executor::stop`] takes
//! effect within one poll interval from any thread, including from inside a
//! callback the loop itself is running.

use bus_api::{BusError, Executor, MessagePump};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct ThreadExecutor {
    poll_interval: Duration,
    running: AtomicBool,
    stop_requested: AtomicBool,
}

impl ThreadExecutor {
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_millis(20))
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadExecutor {
    fn run(&self, pump: &dyn MessagePump) -> Result<(), BusError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BusError::ExecutorBusy);
        }
        let result = loop {
            if self.stop_requested.swap(false, Ordering::SeqCst) {
                break Ok(());
            }
            if let Err(err) = pump.pump_once(self.poll_interval) {
                tracing::warn!(error = %err, "dispatch loop terminated");
                break Err(err);
            }
        };
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
