use std::time::Duration;

use tokio::time::Instant;

use crate::config::ThrottleMode;

/// What to do with a value offered to the throttle
#[derive(Debug, Clone, PartialEq)]
pub enum ThrottleDecision<T> {
    /// Outside the window, publish now
    Fire(T),
    /// Held as pending, flush after the delay
    Schedule(Duration),
    /// Replaced an already pending value
    Coalesced,
    /// Inside the window in leading mode, discarded
    Dropped,
}

/// Rate limiter for publishes and chat. Not a debounce: the first value after a quiet
/// window always goes out immediately.
#[derive(Debug)]
pub struct Throttle<T> {
    window: Duration,
    mode: ThrottleMode,
    last_fire: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(window: Duration, mode: ThrottleMode) -> Self {
        Self {
            window,
            mode,
            last_fire: None,
            pending: None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn offer(&mut self, value: T, now: Instant) -> ThrottleDecision<T> {
        let window = self.window;
        let window_end = match self.last_fire {
            Some(last) if now.saturating_duration_since(last) < window => last + window,
            _ => {
                self.mark_fired(now);
                return ThrottleDecision::Fire(value);
            }
        };

        match self.mode {
            ThrottleMode::Leading => ThrottleDecision::Dropped,
            ThrottleMode::Trailing => {
                if self.pending.replace(value).is_some() {
                    ThrottleDecision::Coalesced
                } else {
                    ThrottleDecision::Schedule(window_end.saturating_duration_since(now))
                }
            }
        }
    }

    /// Take the pending value; a flushed value opens a new window.
    pub fn flush(&mut self, now: Instant) -> Option<T> {
        let value = self.pending.take()?;
        self.last_fire = Some(now);
        Some(value)
    }

    /// Record an out-of-band publish. Any pending value is stale after it.
    pub fn mark_fired(&mut self, now: Instant) {
        self.last_fire = Some(now);
        self.pending = None;
    }

    pub fn reset(&mut self) {
        self.last_fire = None;
        self.pending = None;
    }
}
