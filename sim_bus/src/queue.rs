//! Bounded per-connection message queues
//!
//! Frames are delivered in FIFO order. A full queue rejects new frames
//! instead of growing.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// One encoded message
pub type Frame = Vec<u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Queue is full")]
    Full,
}

/// Bounded FIFO queue of frames
#[derive(Debug, Clone)]
pub struct MessageQueue {
    capacity: usize,
    frames: VecDeque<Frame>,
}

impl MessageQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            frames: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), QueueError> {
        if self.frames.len() >= self.capacity {
            return Err(QueueError::Full);
        }
        self.frames.push_back(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

/// A queue that a receiver can block on
#[derive(Debug)]
pub struct Mailbox {
    queue: Mutex<MessageQueue>,
    available: Condvar,
}

impl Mailbox {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(MessageQueue::with_capacity(capacity)),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, frame: Frame) -> Result<(), QueueError> {
        self.queue.lock().push(frame)?;
        self.available.notify_one();
        Ok(())
    }

    /// Takes the next frame, waiting up to `timeout` for one to arrive
    pub fn pop(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();
        loop {
            if let Some(frame) = queue.pop() {
                return Some(frame);
            }
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
