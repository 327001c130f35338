//! Outbound typing indicator.
//!
//! The first keystroke announces `typing=true`. Each keystroke pushes the
//! deadline out; once it passes, `typing=false` is announced exactly once.
//! The runtime sleeps until `deadline()` and then calls `poll`.

use std::time::{Duration, Instant};

pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub struct TypingIndicator {
    timeout: Duration,
    /// Set while we have announced `typing=true`.
    deadline: Option<Instant>,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(TYPING_TIMEOUT)
    }
}

impl TypingIndicator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Register a keystroke. Returns `Some(true)` when typing starts.
    pub fn keystroke(&mut self, now: Instant) -> Option<bool> {
        let started = self.deadline.is_none();
        self.deadline = Some(now + self.timeout);
        started.then_some(true)
    }

    /// Returns `Some(false)` once the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<bool> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(false)
            }
            _ => None,
        }
    }

    /// Stop immediately (message sent or conversation closed).
    pub fn stop(&mut self) -> Option<bool> {
        self.deadline.take().map(|_| false)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
