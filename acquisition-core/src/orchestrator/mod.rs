//! Acquisition orchestrator shared by firmware and host targets.
//!
//! [`Acquisition`] owns the four channel sequencers, the ADC shim and the
//! connection-health monitor. Each call to [`Acquisition::tick`] advances only
//! the channel at the sequencer cursor, which is what keeps the ADC
//! single-owner: no other channel can be in its read phase at the same time.
//! When the active channel completes, its samples are collected into a
//! [`CycleReport`] and the cursor moves to the next enabled channel; that
//! channel leaves `Idle` on the following tick.

use core::ops::Add;
use core::time::Duration;

use crate::adc::SampleSource;
use crate::channels::{CHANNEL_COUNT, ChannelId, ChannelState, LED_COUNT, LedId};
use crate::config::{AcquisitionConfig, ChannelTiming, ConfigError};
use crate::health::{ConnectionHealth, HealthEvent};
use crate::leds::LedFlags;
use crate::report::{CycleReport, ReportSink};
use crate::sequencer::ChannelSequencer;
use crate::telemetry::{
    TELEMETRY_RING_CAPACITY, TelemetryEventKind, TelemetryInstant, TelemetryPayload,
    TelemetryRecorder,
};

/// Global run state toggled by the control link.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

impl RunState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
        }
    }
}

/// Point-in-time view of one channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelStatus {
    pub id: ChannelId,
    pub state: ChannelState,
    /// Configured timing; applies from the channel's next cycle.
    pub timing: ChannelTiming,
    pub failure_counter: u8,
}

/// Point-in-time view of the whole acquisition system.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AcquisitionStatus {
    pub run_state: RunState,
    pub process_pos: ChannelId,
    pub process_itr: u32,
    pub channels: [ChannelStatus; CHANNEL_COUNT],
    pub consecutive_failures: u8,
    pub faulted: bool,
    pub leds: [bool; LED_COUNT],
}

/// Multiplexed acquisition over a shared ADC.
pub struct Acquisition<'flags, A, Instant, const TELEMETRY: usize = TELEMETRY_RING_CAPACITY>
where
    Instant: Copy,
{
    config: AcquisitionConfig,
    channels: [ChannelSequencer<Instant>; CHANNEL_COUNT],
    process_pos: ChannelId,
    process_itr: u32,
    run_state: RunState,
    adc: A,
    flags: &'flags LedFlags,
    health: ConnectionHealth,
    telemetry: TelemetryRecorder<Instant, TELEMETRY>,
}

impl<'flags, A, Instant, const TELEMETRY: usize> Acquisition<'flags, A, Instant, TELEMETRY>
where
    A: SampleSource,
    Instant: Copy + Ord + Add<Duration, Output = Instant> + TelemetryInstant,
{
    /// Builds the system around a validated configuration. Every channel starts
    /// `Idle` and the run state is [`RunState::Idle`].
    pub fn new(
        config: AcquisitionConfig,
        adc: A,
        flags: &'flags LedFlags,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let process_pos = config
            .next_enabled(ChannelId::Ch0)
            .ok_or(ConfigError::NoChannelEnabled)?;

        Ok(Self {
            config,
            channels: [
                ChannelSequencer::new(ChannelId::Ch0),
                ChannelSequencer::new(ChannelId::Ch1),
                ChannelSequencer::new(ChannelId::Ch2),
                ChannelSequencer::new(ChannelId::Ch3),
            ],
            process_pos,
            process_itr: 0,
            run_state: RunState::Idle,
            adc,
            flags,
            health: ConnectionHealth::new(),
            telemetry: TelemetryRecorder::new(),
        })
    }

    /// Advances the active channel by one step. Never blocks.
    ///
    /// Returns the finished report when the active channel completed its cycle
    /// during this tick.
    pub fn tick(&mut self, now: Instant) -> Option<CycleReport<Instant>> {
        if self.run_state != RunState::Running {
            return None;
        }

        if self.active().state() == ChannelState::Idle {
            self.activate_next(now);
            return None;
        }

        let id = self.process_pos;
        let channel = &mut self.channels[id.as_index()];
        let step = channel.tick(now, &mut self.adc, self.flags);

        match step.sample {
            Some(Ok(_)) => self.health.record_success(),
            Some(Err(error)) => {
                self.health.record_failure();
                self.telemetry.record_sample_missed(id, error, now);
            }
            None => {}
        }

        match step.transition {
            Some((_, ChannelState::DelayCounting)) => {
                self.telemetry.record_led_transition(id, false, now);
                None
            }
            Some((_, ChannelState::AdcReading)) => {
                self.telemetry.record(
                    TelemetryEventKind::ReadStarted(id),
                    TelemetryPayload::none(),
                    now,
                );
                None
            }
            Some((_, ChannelState::CycleComplete)) => self.complete_cycle(now),
            _ => None,
        }
    }

    /// Runs [`Self::tick`] and hands any finished report to `sink`.
    pub fn tick_into<S>(&mut self, now: Instant, sink: &mut S) -> bool
    where
        S: ReportSink<Instant> + ?Sized,
    {
        match self.tick(now) {
            Some(report) => {
                sink.publish(&report);
                true
            }
            None => false,
        }
    }

    fn activate_next(&mut self, now: Instant) {
        // Configuration changes may have disabled the channel under the cursor.
        if let Some(next) = self.config.next_enabled(self.process_pos) {
            self.process_pos = next;
        }

        let id = self.process_pos;
        let timing = self.config.timing(id);
        if self.channels[id.as_index()].activate(now, timing, self.flags) {
            self.telemetry.record_led_transition(id, true, now);
        }
    }

    fn complete_cycle(&mut self, now: Instant) -> Option<CycleReport<Instant>> {
        let id = self.process_pos;
        let channel = &mut self.channels[id.as_index()];
        let started_at = channel.cycle_started_at();
        let completed = channel.acknowledge()?;

        self.process_itr = self.process_itr.wrapping_add(1);
        self.telemetry.record_cycle_complete(
            id,
            self.process_itr,
            completed.samples.len(),
            completed.missed,
            started_at,
            now,
        );

        if let Some(HealthEvent::FaultRaised { failures }) = self.health.evaluate(self.flags) {
            self.telemetry.record(
                TelemetryEventKind::ConnectionFault,
                TelemetryPayload::Fault { failures },
                now,
            );
        }

        if let Some(next) = self.config.next_enabled(id.next()) {
            self.process_pos = next;
        }

        Some(CycleReport {
            channel: id,
            cycle: self.process_itr,
            completed_at: now,
            samples: completed.samples,
            missed: completed.missed,
        })
    }

    /// Enters [`RunState::Running`] and raises the status indicator unless a
    /// connection fault is latched. Idempotent.
    pub fn start(&mut self, now: Instant) {
        if self.run_state == RunState::Running {
            return;
        }

        self.run_state = RunState::Running;
        if !self.health.is_faulted() {
            self.flags.set(LedId::Status, true);
        }
        self.telemetry
            .record(TelemetryEventKind::Started, TelemetryPayload::none(), now);
    }

    /// Leaves [`RunState::Running`], abandoning the active channel's cycle.
    /// Counters and the cursor are kept.
    pub fn stop(&mut self, now: Instant) {
        if self.run_state == RunState::Idle {
            return;
        }

        critical_section::with(|_| {
            self.run_state = RunState::Idle;
            self.channels[self.process_pos.as_index()].reset(self.flags);
        });
        self.telemetry
            .record(TelemetryEventKind::Stopped, TelemetryPayload::none(), now);
    }

    /// Returns every channel to `Idle` and clears all flags and counters.
    ///
    /// Runs inside a critical section so the LED interrupt never observes a
    /// half-cleared register.
    pub fn reset(&mut self, now: Instant) {
        critical_section::with(|_| {
            self.run_state = RunState::Idle;
            for channel in &mut self.channels {
                channel.reset(self.flags);
            }
            self.flags.clear_all();
            self.process_itr = 0;
            self.process_pos = self
                .config
                .next_enabled(ChannelId::Ch0)
                .unwrap_or(ChannelId::Ch0);
            self.health.reset();
        });
        self.telemetry.clear();
        self.telemetry
            .record(TelemetryEventKind::Reset, TelemetryPayload::none(), now);
    }

    /// Releases a latched connection fault.
    pub fn clear_fault(&mut self, now: Instant) {
        if self.run_state == RunState::Running {
            self.health.clear_fault(self.flags);
        } else {
            self.health.reset();
        }
        self.telemetry
            .record(TelemetryEventKind::FaultCleared, TelemetryPayload::none(), now);
    }

    /// Replaces one channel's timing. Takes effect at that channel's next cycle.
    pub fn set_timing(
        &mut self,
        channel: ChannelId,
        timing: ChannelTiming,
    ) -> Result<(), ConfigError> {
        self.config.update(channel, timing)
    }

    /// Enables or disables one channel. A channel mid-cycle finishes that cycle.
    pub fn set_enabled(&mut self, channel: ChannelId, enabled: bool) -> Result<(), ConfigError> {
        let timing = self.config.timing(channel).with_enabled(enabled);
        self.config.update(channel, timing)
    }

    /// Captures the current state for status reporting.
    pub fn snapshot(&self) -> AcquisitionStatus {
        AcquisitionStatus {
            run_state: self.run_state,
            process_pos: self.process_pos,
            process_itr: self.process_itr,
            channels: core::array::from_fn(|index| {
                let channel = &self.channels[index];
                ChannelStatus {
                    id: channel.id(),
                    state: channel.state(),
                    timing: self.config.timing(channel.id()),
                    failure_counter: channel.failure_counter(),
                }
            }),
            consecutive_failures: self.health.consecutive_failures(),
            faulted: self.health.is_faulted(),
            leds: self.flags.snapshot(),
        }
    }

    fn active(&self) -> &ChannelSequencer<Instant> {
        &self.channels[self.process_pos.as_index()]
    }

    pub fn channel(&self, id: ChannelId) -> &ChannelSequencer<Instant> {
        &self.channels[id.as_index()]
    }

    /// Number of channels currently in their read phase (never more than one).
    pub fn reading_channels(&self) -> usize {
        self.channels
            .iter()
            .filter(|channel| channel.state().is_reading())
            .count()
    }

    pub const fn process_pos(&self) -> ChannelId {
        self.process_pos
    }

    /// Completed channel cycles since start-up or the last reset.
    pub const fn process_itr(&self) -> u32 {
        self.process_itr
    }

    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    pub const fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub const fn health(&self) -> &ConnectionHealth {
        &self.health
    }

    pub const fn flags(&self) -> &'flags LedFlags {
        self.flags
    }

    pub const fn telemetry(&self) -> &TelemetryRecorder<Instant, TELEMETRY> {
        &self.telemetry
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    /// Mutable access to the ADC shim (fault injection on host targets).
    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}
