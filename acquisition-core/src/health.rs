//! Connection-health monitor for the shared ADC.
//!
//! Every sample attempt feeds the monitor. A run of [`FAILURE_THRESHOLD`]
//! consecutive failures arms a trip that survives later successes; at the next
//! completed channel cycle the orchestrator evaluates it, the "system ready"
//! indicator is cleared and a fault is latched until
//! [`ConnectionHealth::clear_fault`] is called.

use crate::channels::LedId;
use crate::config::FAILURE_THRESHOLD;
use crate::leds::LedFlags;

/// Health transitions surfaced to the orchestrator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HealthEvent {
    /// The fault latched; `failures` is the count that tripped it.
    FaultRaised { failures: u8 },
}

/// Consecutive-failure tracker with a latched fault.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionHealth {
    consecutive_failures: u8,
    threshold: u8,
    /// Longest streak at or above the threshold since the last evaluation.
    tripped: Option<u8>,
    faulted: bool,
}

impl ConnectionHealth {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_threshold(FAILURE_THRESHOLD)
    }

    #[must_use]
    pub const fn with_threshold(threshold: u8) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
            tripped: None,
            faulted: false,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.threshold {
            let streak = self.consecutive_failures;
            self.tripped = Some(self.tripped.map_or(streak, |peak| peak.max(streak)));
        }
    }

    /// Acts on a streak that reached the threshold since the last evaluation.
    ///
    /// A trip clears the status flag and resets the counter. The returned event
    /// fires only on the first trip after a clear.
    pub fn evaluate(&mut self, flags: &LedFlags) -> Option<HealthEvent> {
        let failures = self.tripped.take()?;
        self.consecutive_failures = 0;
        flags.set(LedId::Status, false);

        if self.faulted {
            None
        } else {
            self.faulted = true;
            Some(HealthEvent::FaultRaised { failures })
        }
    }

    /// Releases the latch and raises the status indicator again.
    pub fn clear_fault(&mut self, flags: &LedFlags) {
        self.faulted = false;
        self.consecutive_failures = 0;
        self.tripped = None;
        flags.set(LedId::Status, true);
    }

    /// Forgets all history without touching the indicator.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.tripped = None;
        self.faulted = false;
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u8 {
        self.consecutive_failures
    }

    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        self.faulted
    }
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}
