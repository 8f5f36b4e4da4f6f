use crate::domain::{Duration, Timestamp};

/// Nanosecond virtual time. Only moves forward.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VirtualClock {
    now: Timestamp,
}

impl VirtualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn advance(&mut self, by: Duration) {
        self.now = Timestamp(self.now.0.saturating_add(by.0));
    }

    /// Jump to `at` unless the clock is already past it
    pub fn advance_to(&mut self, at: Timestamp) {
        self.now = self.now.max(at);
    }
}
