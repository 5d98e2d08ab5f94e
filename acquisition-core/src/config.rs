//! Per-channel timing configuration and its validation.
//!
//! Defaults follow the bench host tool: 100 ms of excitation, 50 ms of settle
//! time, then a short burst of samples. Invalid values are rejected with a
//! [`ConfigError`] rather than clamped.

use core::fmt;
use core::time::Duration;

use crate::channels::{ALL_CHANNELS, CHANNEL_COUNT, ChannelId};

/// Default excitation time per cycle.
pub const DEFAULT_LED_ON: Duration = Duration::from_millis(100);
/// Default settle time between LED-off and the first sample.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(50);
/// Default number of sample attempts per read phase.
pub const DEFAULT_SAMPLES_PER_READ: u8 = 8;
/// Capacity of the per-cycle sample accumulator.
pub const MAX_SAMPLES_PER_CYCLE: usize = 32;
/// Consecutive failed sample attempts that trip the connection fault.
pub const FAILURE_THRESHOLD: u8 = 4;

/// How long a channel stays in its read phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadWindow {
    /// Attempt exactly this many samples, one per tick.
    Samples(u8),
    /// Sample once per tick until the window elapses.
    Duration(Duration),
}

impl fmt::Display for ReadWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadWindow::Samples(count) => write!(f, "{count}"),
            ReadWindow::Duration(window) => write!(f, "{}ms", window.as_millis()),
        }
    }
}

/// Timing for one channel's cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelTiming {
    pub led_on: Duration,
    pub settle: Duration,
    pub read: ReadWindow,
    pub enabled: bool,
}

impl ChannelTiming {
    pub const DEFAULT: Self = Self::new(
        DEFAULT_LED_ON,
        DEFAULT_SETTLE,
        ReadWindow::Samples(DEFAULT_SAMPLES_PER_READ),
    );

    /// Creates an enabled channel timing.
    #[must_use]
    pub const fn new(led_on: Duration, settle: Duration, read: ReadWindow) -> Self {
        Self {
            led_on,
            settle,
            read,
            enabled: true,
        }
    }

    /// Returns a copy with the enabled flag replaced.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Checks the timing values for `channel`.
    pub fn validate(&self, channel: ChannelId) -> Result<(), ConfigError> {
        if self.led_on.is_zero() {
            return Err(ConfigError::ZeroLedOn(channel));
        }
        if self.settle.is_zero() {
            return Err(ConfigError::ZeroSettle(channel));
        }

        match self.read {
            ReadWindow::Samples(count)
                if count == 0 || usize::from(count) > MAX_SAMPLES_PER_CYCLE =>
            {
                Err(ConfigError::InvalidSampleCount {
                    channel,
                    requested: count,
                })
            }
            ReadWindow::Duration(window) if window.is_zero() => {
                Err(ConfigError::ZeroReadWindow(channel))
            }
            _ => Ok(()),
        }
    }
}

impl Default for ChannelTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Timing for every channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AcquisitionConfig {
    channels: [ChannelTiming; CHANNEL_COUNT],
}

impl AcquisitionConfig {
    /// Applies the same timing to every channel.
    #[must_use]
    pub const fn uniform(timing: ChannelTiming) -> Self {
        Self {
            channels: [timing; CHANNEL_COUNT],
        }
    }

    /// Builder-style override for one channel.
    #[must_use]
    pub const fn with_channel(mut self, channel: ChannelId, timing: ChannelTiming) -> Self {
        self.channels[channel.as_index()] = timing;
        self
    }

    #[must_use]
    pub const fn timing(&self, channel: ChannelId) -> ChannelTiming {
        self.channels[channel.as_index()]
    }

    pub fn is_enabled(&self, channel: ChannelId) -> bool {
        self.channels[channel.as_index()].enabled
    }

    /// Validates every channel and requires at least one enabled channel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for descriptor in &ALL_CHANNELS {
            self.timing(descriptor.id).validate(descriptor.id)?;
        }

        if self.channels.iter().any(|timing| timing.enabled) {
            Ok(())
        } else {
            Err(ConfigError::NoChannelEnabled)
        }
    }

    /// Replaces one channel's timing if the resulting configuration is valid.
    pub fn update(&mut self, channel: ChannelId, timing: ChannelTiming) -> Result<(), ConfigError> {
        let candidate = self.with_channel(channel, timing);
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// First enabled channel at or after `from` in round-robin order.
    pub fn next_enabled(&self, from: ChannelId) -> Option<ChannelId> {
        let mut candidate = from;
        for _ in 0..CHANNEL_COUNT {
            if self.is_enabled(candidate) {
                return Some(candidate);
            }
            candidate = candidate.next();
        }
        None
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::uniform(ChannelTiming::DEFAULT)
    }
}

/// Rejected configuration values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroLedOn(ChannelId),
    ZeroSettle(ChannelId),
    InvalidSampleCount { channel: ChannelId, requested: u8 },
    ZeroReadWindow(ChannelId),
    NoChannelEnabled,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroLedOn(channel) => write!(f, "{channel}: led on-time must be non-zero"),
            ConfigError::ZeroSettle(channel) => {
                write!(f, "{channel}: settle delay must be non-zero")
            }
            ConfigError::InvalidSampleCount { channel, requested } => write!(
                f,
                "{channel}: sample count {requested} outside 1..={MAX_SAMPLES_PER_CYCLE}"
            ),
            ConfigError::ZeroReadWindow(channel) => {
                write!(f, "{channel}: read window must be non-zero")
            }
            ConfigError::NoChannelEnabled => f.write_str("at least one channel must be enabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(AcquisitionConfig::default().validate(), Ok(()));
        assert_eq!(ChannelTiming::DEFAULT.led_on, Duration::from_millis(100));
        assert_eq!(ChannelTiming::DEFAULT.settle, Duration::from_millis(50));
    }

    #[test]
    fn rejects_each_invalid_class() {
        let base = ChannelTiming::DEFAULT;
        let cases = [
            (
                ChannelTiming {
                    led_on: Duration::ZERO,
                    ..base
                },
                ConfigError::ZeroLedOn(ChannelId::Ch2),
            ),
            (
                ChannelTiming {
                    settle: Duration::ZERO,
                    ..base
                },
                ConfigError::ZeroSettle(ChannelId::Ch2),
            ),
            (
                ChannelTiming {
                    read: ReadWindow::Samples(0),
                    ..base
                },
                ConfigError::InvalidSampleCount {
                    channel: ChannelId::Ch2,
                    requested: 0,
                },
            ),
            (
                ChannelTiming {
                    read: ReadWindow::Samples(33),
                    ..base
                },
                ConfigError::InvalidSampleCount {
                    channel: ChannelId::Ch2,
                    requested: 33,
                },
            ),
            (
                ChannelTiming {
                    read: ReadWindow::Duration(Duration::ZERO),
                    ..base
                },
                ConfigError::ZeroReadWindow(ChannelId::Ch2),
            ),
        ];

        for (timing, expected) in cases {
            let mut config = AcquisitionConfig::default();
            assert_eq!(config.update(ChannelId::Ch2, timing), Err(expected));
            assert_eq!(config, AcquisitionConfig::default(), "rejected update applied");
        }
    }

    #[test]
    fn rejects_disabling_every_channel() {
        let config = AcquisitionConfig::uniform(ChannelTiming::DEFAULT.with_enabled(false));
        assert_eq!(config.validate(), Err(ConfigError::NoChannelEnabled));

        let mut config = AcquisitionConfig::uniform(ChannelTiming::DEFAULT.with_enabled(false))
            .with_channel(ChannelId::Ch1, ChannelTiming::DEFAULT);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(
            config.update(
                ChannelId::Ch1,
                ChannelTiming::DEFAULT.with_enabled(false)
            ),
            Err(ConfigError::NoChannelEnabled)
        );
    }

    #[test]
    fn next_enabled_skips_disabled_channels() {
        let config = AcquisitionConfig::default()
            .with_channel(ChannelId::Ch1, ChannelTiming::DEFAULT.with_enabled(false))
            .with_channel(ChannelId::Ch2, ChannelTiming::DEFAULT.with_enabled(false));

        assert_eq!(config.next_enabled(ChannelId::Ch1), Some(ChannelId::Ch3));
        assert_eq!(config.next_enabled(ChannelId::Ch0), Some(ChannelId::Ch0));
    }

    #[test]
    fn accepts_maximum_sample_count_and_duration_window() {
        let timing = ChannelTiming::new(
            Duration::from_millis(1),
            Duration::from_millis(1),
            ReadWindow::Samples(32),
        );
        assert_eq!(timing.validate(ChannelId::Ch0), Ok(()));

        let timing = ChannelTiming::new(
            Duration::from_millis(100),
            Duration::from_millis(50),
            ReadWindow::Duration(Duration::from_millis(10)),
        );
        assert_eq!(timing.validate(ChannelId::Ch3), Ok(()));
    }
}
