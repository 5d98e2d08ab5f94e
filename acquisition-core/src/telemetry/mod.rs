//! Telemetry event catalog and recorder shared by firmware and host targets.
//!
//! The core crate never logs directly. Instead the orchestrator records typed
//! events into a fixed-size ring that the firmware renders through `defmt` and
//! the emulator prints to its console. Event kinds encode to compact numeric
//! codes so they can travel over diagnostics channels.

use core::{convert::TryFrom, fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::adc::AdcError;
use crate::channels::ChannelId;

/// Monotonic identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events shared across all targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    LedOn(ChannelId),
    LedOff(ChannelId),
    ReadStarted(ChannelId),
    SampleMissed(ChannelId),
    CycleComplete(ChannelId),
    ConnectionFault,
    FaultCleared,
    Started,
    Stopped,
    Reset,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::LedOn(channel) => write!(f, "led-on {channel}"),
            TelemetryEventKind::LedOff(channel) => write!(f, "led-off {channel}"),
            TelemetryEventKind::ReadStarted(channel) => write!(f, "read-started {channel}"),
            TelemetryEventKind::SampleMissed(channel) => write!(f, "sample-missed {channel}"),
            TelemetryEventKind::CycleComplete(channel) => write!(f, "cycle-complete {channel}"),
            TelemetryEventKind::ConnectionFault => f.write_str("connection-fault"),
            TelemetryEventKind::FaultCleared => f.write_str("fault-cleared"),
            TelemetryEventKind::Started => f.write_str("started"),
            TelemetryEventKind::Stopped => f.write_str("stopped"),
            TelemetryEventKind::Reset => f.write_str("reset"),
        }
    }
}

impl TelemetryEventKind {
    const LED_ON_BASE: u16 = 0x0000;
    const LED_OFF_BASE: u16 = 0x0004;
    const READ_STARTED_BASE: u16 = 0x0008;
    const SAMPLE_MISSED_BASE: u16 = 0x000C;
    const CYCLE_COMPLETE_BASE: u16 = 0x0010;
    const CONNECTION_FAULT_CODE: u16 = 0x0020;
    const FAULT_CLEARED_CODE: u16 = 0x0021;
    const STARTED_CODE: u16 = 0x0030;
    const STOPPED_CODE: u16 = 0x0031;
    const RESET_CODE: u16 = 0x0032;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::LedOn(channel) => Self::LED_ON_BASE + channel_code(channel),
            TelemetryEventKind::LedOff(channel) => Self::LED_OFF_BASE + channel_code(channel),
            TelemetryEventKind::ReadStarted(channel) => {
                Self::READ_STARTED_BASE + channel_code(channel)
            }
            TelemetryEventKind::SampleMissed(channel) => {
                Self::SAMPLE_MISSED_BASE + channel_code(channel)
            }
            TelemetryEventKind::CycleComplete(channel) => {
                Self::CYCLE_COMPLETE_BASE + channel_code(channel)
            }
            TelemetryEventKind::ConnectionFault => Self::CONNECTION_FAULT_CODE,
            TelemetryEventKind::FaultCleared => Self::FAULT_CLEARED_CODE,
            TelemetryEventKind::Started => Self::STARTED_CODE,
            TelemetryEventKind::Stopped => Self::STOPPED_CODE,
            TelemetryEventKind::Reset => Self::RESET_CODE,
        }
    }

    /// Decodes a raw discriminant. Codes outside the event table yield `None`.
    #[must_use]
    pub fn from_raw(code: u16) -> Option<Self> {
        let per_channel = |base: u16, build: fn(ChannelId) -> Self| {
            ChannelId::from_index(usize::from(code - base)).map(build)
        };

        match code {
            Self::CONNECTION_FAULT_CODE => Some(TelemetryEventKind::ConnectionFault),
            Self::FAULT_CLEARED_CODE => Some(TelemetryEventKind::FaultCleared),
            Self::STARTED_CODE => Some(TelemetryEventKind::Started),
            Self::STOPPED_CODE => Some(TelemetryEventKind::Stopped),
            Self::RESET_CODE => Some(TelemetryEventKind::Reset),
            value if value < Self::LED_OFF_BASE => {
                per_channel(Self::LED_ON_BASE, TelemetryEventKind::LedOn)
            }
            value if value < Self::READ_STARTED_BASE => {
                per_channel(Self::LED_OFF_BASE, TelemetryEventKind::LedOff)
            }
            value if value < Self::SAMPLE_MISSED_BASE => {
                per_channel(Self::READ_STARTED_BASE, TelemetryEventKind::ReadStarted)
            }
            value if value < Self::CYCLE_COMPLETE_BASE => {
                per_channel(Self::SAMPLE_MISSED_BASE, TelemetryEventKind::SampleMissed)
            }
            value if value < Self::CYCLE_COMPLETE_BASE + 4 => {
                per_channel(Self::CYCLE_COMPLETE_BASE, TelemetryEventKind::CycleComplete)
            }
            _ => None,
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Time the LED spent in its previous level.
    Led(LedTelemetry),
    /// Why a sample attempt produced nothing.
    Sample(AdcError),
    /// Summary of a finished channel cycle.
    Cycle(CycleTelemetry),
    /// Failure count that tripped the connection fault.
    Fault { failures: u8 },
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Metadata attached to LED transitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LedTelemetry {
    pub elapsed_since_previous: Option<Duration>,
}

/// Metadata attached to cycle completions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CycleTelemetry {
    pub cycle: u32,
    pub samples: u8,
    pub missed: u8,
    pub duration: Option<Duration>,
}

impl CycleTelemetry {
    #[must_use]
    pub const fn new(cycle: u32, samples: u8, missed: u8, duration: Option<Duration>) -> Self {
        Self {
            cycle,
            samples,
            missed,
            duration,
        }
    }
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_led_transition_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_led_transition_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Identifier the next recorded event will receive.
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records an LED level change with the time since the previous LED change.
    pub fn record_led_transition(
        &mut self,
        channel: ChannelId,
        lit: bool,
        timestamp: TInstant,
    ) -> EventId {
        let elapsed = self
            .last_led_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_led_transition_at = Some(timestamp);

        let payload = TelemetryPayload::Led(LedTelemetry {
            elapsed_since_previous: elapsed,
        });
        let event = if lit {
            TelemetryEventKind::LedOn(channel)
        } else {
            TelemetryEventKind::LedOff(channel)
        };
        self.record(event, payload, timestamp)
    }

    /// Records a sample attempt that returned no value.
    pub fn record_sample_missed(
        &mut self,
        channel: ChannelId,
        error: AdcError,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::SampleMissed(channel),
            TelemetryPayload::Sample(error),
            timestamp,
        )
    }

    /// Records a finished channel cycle.
    pub fn record_cycle_complete(
        &mut self,
        channel: ChannelId,
        cycle: u32,
        samples: usize,
        missed: u8,
        started_at: Option<TInstant>,
        timestamp: TInstant,
    ) -> EventId {
        let duration = started_at.map(|start| timestamp.saturating_duration_since(start));
        let payload = TelemetryPayload::Cycle(CycleTelemetry::new(
            cycle,
            truncate_count(samples),
            missed,
            duration,
        ));

        self.record(TelemetryEventKind::CycleComplete(channel), payload, timestamp)
    }

    /// Drops every record; event ids keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.last_led_transition_at = None;
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}

const fn channel_code(channel: ChannelId) -> u16 {
    match channel {
        ChannelId::Ch0 => 0,
        ChannelId::Ch1 => 1,
        ChannelId::Ch2 => 2,
        ChannelId::Ch3 => 3,
    }
}
