//! Process-wide LLM circuit breaker (SPEC_FULL.md §4.9).

use chrono::{DateTime, Duration, Utc};

const WINDOW: Duration = Duration::minutes(5);
const ERROR_THRESHOLD: usize = 5;
const COOLDOWN: Duration = Duration::minutes(10);

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Closed,
    Open { opened_at: DateTime<Utc> },
}

/// Shared, process-wide: every recorded non-2xx or exception within a
/// rolling 5-minute window counts toward opening the circuit. Once open, the
/// breaker stays closed to calls for a 10-minute cooldown, after which the
/// next call is let through as a probe.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: State,
    error_timestamps: Vec<DateTime<Utc>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: State::Closed,
            error_timestamps: Vec::new(),
        }
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a call may proceed right now. A call allowed while the
    /// circuit is technically `Open` is a probe: the caller must follow up
    /// with `record_success` or `record_error`.
    pub fn allow_call(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            State::Closed => true,
            State::Open { opened_at } => now - opened_at >= COOLDOWN,
        }
    }

    pub fn record_error(&mut self, now: DateTime<Utc>) {
        self.error_timestamps.push(now);
        self.error_timestamps.retain(|t| now - *t <= WINDOW);
        if self.state == State::Closed && self.error_timestamps.len() >= ERROR_THRESHOLD {
            self.state = State::Open { opened_at: now };
        } else if matches!(self.state, State::Open { .. }) {
            // A probe that failed re-opens the cooldown window.
            self.state = State::Open { opened_at: now };
        }
    }

    pub fn record_success(&mut self) {
        self.state = State::Closed;
        self.error_timestamps.clear();
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        !self.allow_call(now)
    }
}
