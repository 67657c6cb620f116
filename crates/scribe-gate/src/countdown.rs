//! Per-presentation skip countdown.
//!
//! The countdown owns no thread. The host calls [`CountdownGate::poll`] from its
//! loop (or [`CountdownGate::tick`] directly); once stopped, polling has no effect
//! until the next [`CountdownGate::start`].

use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct Ticker {
    last_tick: Instant,
}

/// Counts down from the configured timeout, one second per tick.
#[derive(Debug, Clone, Default)]
pub struct CountdownGate {
    remaining: u32,
    ticker: Option<Ticker>,
}

impl CountdownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to `total` seconds and arm the tick source.
    pub fn start(&mut self, total: u32, now: Instant) {
        self.remaining = total;
        self.ticker = Some(Ticker { last_tick: now });
    }

    /// Release the tick source.
    pub fn stop(&mut self) {
        self.ticker = None;
    }

    /// Whether the tick source is armed.
    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Seconds left before skipping is allowed.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Whether the countdown has reached zero.
    pub fn can_skip(&self) -> bool {
        self.remaining == 0
    }

    /// Advance by one second. Returns whether the remaining time changed.
    pub fn tick(&mut self) -> bool {
        if self.ticker.is_none() || self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Apply one tick per whole second elapsed since the previous tick.
    pub fn poll(&mut self, now: Instant) -> u32 {
        let Some(ticker) = self.ticker.as_mut() else {
            return 0;
        };
        let elapsed = now.saturating_duration_since(ticker.last_tick);
        let due = u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX);
        if due == 0 {
            return 0;
        }
        ticker.last_tick += TICK * due;
        let applied = due.min(self.remaining);
        self.remaining -= applied;
        applied
    }
}
