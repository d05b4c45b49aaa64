//! Per-cycle LLM request throttle (SPEC_FULL.md §4.9).

use chrono::{DateTime, Duration, Utc};
use vestnik_common::LlmThrottleConfig;

#[derive(Debug)]
pub struct CycleThrottle {
    config: LlmThrottleConfig,
    requests_this_cycle: u32,
    consecutive_429: u32,
    minute_window: Vec<DateTime<Utc>>,
}

impl CycleThrottle {
    pub fn new(config: LlmThrottleConfig) -> Self {
        Self {
            config,
            requests_this_cycle: 0,
            consecutive_429: 0,
            minute_window: Vec::new(),
        }
    }

    /// Resets the per-cycle counters. The 429 streak also resets — it tracks
    /// consecutive throttling within a cycle, not across cycles.
    pub fn reset_cycle(&mut self) {
        self.requests_this_cycle = 0;
        self.consecutive_429 = 0;
    }

    pub fn can_call(&mut self, now: DateTime<Utc>) -> bool {
        if self.requests_this_cycle >= self.config.max_requests_per_cycle {
            return false;
        }
        if self.consecutive_429 >= self.config.max_consecutive_429 {
            return false;
        }
        self.minute_window.retain(|t| now - *t < Duration::minutes(1));
        self.minute_window.len() < self.config.max_requests_per_minute as usize
    }

    pub fn record_call(&mut self, now: DateTime<Utc>) {
        self.requests_this_cycle += 1;
        self.minute_window.push(now);
    }

    pub fn record_429(&mut self) {
        self.consecutive_429 += 1;
    }

    pub fn record_success(&mut self) {
        self.consecutive_429 = 0;
    }

    pub fn consecutive_429(&self) -> u32 {
        self.consecutive_429
    }

    pub fn exhausted(&self) -> bool {
        self.requests_this_cycle >= self.config.max_requests_per_cycle
            || self.consecutive_429 >= self.config.max_consecutive_429
    }
}
