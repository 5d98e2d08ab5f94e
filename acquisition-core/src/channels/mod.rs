//! Channel catalog and per-channel phase model shared by firmware and host targets.
//!
//! Each acquisition channel pairs one excitation LED with one single-ended ADC
//! input. The catalog below records how those lines are routed on the board so
//! the firmware, the emulator and the control protocol agree on names.

use core::fmt;

use crate::adc::AdcInput;

/// Number of acquisition channels multiplexed onto the shared ADC.
pub const CHANNEL_COUNT: usize = 4;
/// Number of LED outputs: one per channel plus the status indicator.
pub const LED_COUNT: usize = CHANNEL_COUNT + 1;
/// Register slot reserved for the "system ready" indicator.
pub const STATUS_LED_INDEX: usize = CHANNEL_COUNT;

/// Identifier for the acquisition channels.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ChannelId {
    Ch0,
    Ch1,
    Ch2,
    Ch3,
}

impl ChannelId {
    /// Deterministic index for lookups into [`ALL_CHANNELS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ChannelId::Ch0 => 0,
            ChannelId::Ch1 => 1,
            ChannelId::Ch2 => 2,
            ChannelId::Ch3 => 3,
        }
    }

    /// Attempts to construct a [`ChannelId`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ChannelId::Ch0),
            1 => Some(ChannelId::Ch1),
            2 => Some(ChannelId::Ch2),
            3 => Some(ChannelId::Ch3),
            _ => None,
        }
    }

    /// Channel that follows `self` in round-robin order.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            ChannelId::Ch0 => ChannelId::Ch1,
            ChannelId::Ch1 => ChannelId::Ch2,
            ChannelId::Ch2 => ChannelId::Ch3,
            ChannelId::Ch3 => ChannelId::Ch0,
        }
    }

    /// LED driven while this channel is excited.
    #[must_use]
    pub const fn led(self) -> LedId {
        LedId::Channel(self)
    }

    /// ADC input wired to this channel's sensor.
    #[must_use]
    pub const fn adc_input(self) -> AdcInput {
        ALL_CHANNELS[self.as_index()].adc_input
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.as_index())
    }
}

/// Identifier for a slot in the LED toggle register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LedId {
    Channel(ChannelId),
    Status,
}

impl LedId {
    /// Register index; channel LEDs first, status indicator last.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            LedId::Channel(channel) => channel.as_index(),
            LedId::Status => STATUS_LED_INDEX,
        }
    }

    /// Attempts to construct a [`LedId`] from a register index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index == STATUS_LED_INDEX {
            return Some(LedId::Status);
        }

        match ChannelId::from_index(index) {
            Some(channel) => Some(LedId::Channel(channel)),
            None => None,
        }
    }
}

impl fmt::Display for LedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ALL_LEDS[self.as_index()].name)
    }
}

/// Metadata describing how an LED line is routed on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LedLine {
    pub id: LedId,
    pub name: &'static str,
    pub mcu_pin: &'static str,
    /// Pin number on the legacy sensor board header.
    pub board_pin: u8,
}

impl LedLine {
    #[must_use]
    pub const fn new(id: LedId, name: &'static str, mcu_pin: &'static str, board_pin: u8) -> Self {
        Self {
            id,
            name,
            mcu_pin,
            board_pin,
        }
    }
}

/// Compile-time catalog of every LED line, indexed by [`LedId::as_index`].
pub const ALL_LEDS: [LedLine; LED_COUNT] = [
    LedLine::new(LedId::Channel(ChannelId::Ch0), "LED0", "PA4", 4),
    LedLine::new(LedId::Channel(ChannelId::Ch1), "LED1", "PA5", 5),
    LedLine::new(LedId::Channel(ChannelId::Ch2), "LED2", "PA6", 6),
    LedLine::new(LedId::Channel(ChannelId::Ch3), "LED3", "PA7", 7),
    LedLine::new(LedId::Status, "READY", "PB0", 22),
];

/// Metadata for an acquisition channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelDescriptor {
    pub id: ChannelId,
    pub led: LedLine,
    pub adc_input: AdcInput,
}

impl ChannelDescriptor {
    #[must_use]
    pub const fn new(id: ChannelId, adc_input: AdcInput) -> Self {
        Self {
            id,
            led: ALL_LEDS[id.as_index()],
            adc_input,
        }
    }
}

/// Compile-time catalog of every acquisition channel.
pub const ALL_CHANNELS: [ChannelDescriptor; CHANNEL_COUNT] = [
    ChannelDescriptor::new(ChannelId::Ch0, AdcInput::Ain0),
    ChannelDescriptor::new(ChannelId::Ch1, AdcInput::Ain1),
    ChannelDescriptor::new(ChannelId::Ch2, AdcInput::Ain2),
    ChannelDescriptor::new(ChannelId::Ch3, AdcInput::Ain3),
];

/// Phases of a single channel's acquisition cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ChannelState {
    /// Waiting to be selected by the orchestrator.
    #[default]
    Idle,
    /// Excitation LED lit for the configured on-time.
    LedOn,
    /// LED dark; waiting for the sensor to settle.
    DelayCounting,
    /// Sampling the channel's ADC input.
    AdcReading,
    /// Samples finalized; waiting for the orchestrator to collect them.
    CycleComplete,
}

impl ChannelState {
    /// Returns `true` when the channel's LED must be lit in this state.
    #[must_use]
    pub const fn led_lit(self) -> bool {
        matches!(self, ChannelState::LedOn)
    }

    /// Returns `true` while the channel owns the ADC.
    #[must_use]
    pub const fn is_reading(self) -> bool {
        matches!(self, ChannelState::AdcReading)
    }

    /// Phases reached in the current cycle.
    #[must_use]
    pub const fn progress(self) -> PhaseProgress {
        match self {
            ChannelState::Idle => PhaseProgress::new(false, false, false),
            ChannelState::LedOn => PhaseProgress::new(true, false, false),
            ChannelState::DelayCounting => PhaseProgress::new(true, true, false),
            ChannelState::AdcReading | ChannelState::CycleComplete => {
                PhaseProgress::new(true, true, true)
            }
        }
    }

    /// Short lowercase label used by status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ChannelState::Idle => "idle",
            ChannelState::LedOn => "led-on",
            ChannelState::DelayCounting => "delay",
            ChannelState::AdcReading => "reading",
            ChannelState::CycleComplete => "complete",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Phases reached by a channel in its current cycle.
///
/// Derived from [`ChannelState`] on demand rather than stored, so it always
/// agrees with the state machine.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PhaseProgress {
    pub led: bool,
    pub delay: bool,
    pub adc_read: bool,
}

impl PhaseProgress {
    #[must_use]
    pub const fn new(led: bool, delay: bool, adc_read: bool) -> Self {
        Self {
            led,
            delay,
            adc_read,
        }
    }

    /// No phase is marked unless its predecessor is.
    #[must_use]
    pub const fn is_consistent(self) -> bool {
        (!self.delay || self.led) && (!self.adc_read || self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [ChannelState; 5] = [
        ChannelState::Idle,
        ChannelState::LedOn,
        ChannelState::DelayCounting,
        ChannelState::AdcReading,
        ChannelState::CycleComplete,
    ];

    #[test]
    fn channel_indices_round_trip() {
        for (index, descriptor) in ALL_CHANNELS.iter().enumerate() {
            assert_eq!(descriptor.id.as_index(), index);
            assert_eq!(ChannelId::from_index(index), Some(descriptor.id));
        }
        assert_eq!(ChannelId::from_index(CHANNEL_COUNT), None);
    }

    #[test]
    fn round_robin_wraps_after_last_channel() {
        assert_eq!(ChannelId::Ch3.next(), ChannelId::Ch0);
        assert_eq!(ChannelId::Ch0.next().next(), ChannelId::Ch2);
    }

    #[test]
    fn status_led_occupies_last_register_slot() {
        assert_eq!(LedId::Status.as_index(), 4);
        assert_eq!(LedId::from_index(4), Some(LedId::Status));
        assert_eq!(
            LedId::from_index(2),
            Some(LedId::Channel(ChannelId::Ch2))
        );
        assert_eq!(LedId::from_index(LED_COUNT), None);
    }

    #[test]
    fn catalog_preserves_board_pin_mapping() {
        let pins: [u8; LED_COUNT] = core::array::from_fn(|index| ALL_LEDS[index].board_pin);
        assert_eq!(pins, [4, 5, 6, 7, 22]);
        assert_eq!(ChannelId::Ch3.adc_input(), AdcInput::Ain3);
    }

    #[test]
    fn progress_is_consistent_for_every_state() {
        for state in ALL_STATES {
            let progress = state.progress();
            assert!(progress.is_consistent(), "{state:?} -> {progress:?}");
        }

        assert_eq!(ChannelState::Idle.progress(), PhaseProgress::default());
        assert_eq!(
            ChannelState::DelayCounting.progress(),
            PhaseProgress::new(true, true, false)
        );
    }

    #[test]
    fn inconsistent_progress_is_detected() {
        assert!(!PhaseProgress::new(false, true, false).is_consistent());
        assert!(!PhaseProgress::new(true, false, true).is_consistent());
    }

    #[test]
    fn only_led_on_lights_the_led() {
        for state in ALL_STATES {
            assert_eq!(state.led_lit(), state == ChannelState::LedOn);
        }
    }
}
