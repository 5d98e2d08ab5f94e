#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Monotonic instant used by the acquisition loop on the MCU.
//!
//! Wraps `embassy_time::Instant` so the shared core can add `core::time`
//! durations to it and measure telemetry intervals.

use core::ops::Add;
use core::time::Duration;

use acquisition_core::telemetry::TelemetryInstant;
use embassy_time::{Duration as EmbassyDuration, Instant};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        self.0.as_millis()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        let instant = self
            .0
            .checked_add(EmbassyDuration::from_micros(micros))
            .unwrap_or(Instant::MAX);
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_core_durations() {
        let start = FirmwareInstant::from_micros(1_000);
        let later = start + Duration::from_millis(5);
        assert_eq!(later, FirmwareInstant::from_micros(6_000));
        assert_eq!(later.as_millis(), 6);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let start = FirmwareInstant::from_micros(10);
        assert_eq!(start + Duration::MAX, FirmwareInstant::from(Instant::MAX));
        assert_eq!(
            start.saturating_duration_since(FirmwareInstant::from_micros(50)),
            Duration::ZERO
        );
    }

    #[test]
    fn converts_back_to_embassy_time() {
        let instant = FirmwareInstant::from(Instant::from_millis(42));
        assert_eq!(instant.into_embassy(), Instant::from_millis(42));
        assert_eq!(instant.as_millis(), 42);
    }
}
