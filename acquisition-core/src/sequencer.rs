//! Per-channel acquisition state machine.
//!
//! A [`ChannelSequencer`] walks one channel through
//! `Idle -> LedOn -> DelayCounting -> AdcReading -> CycleComplete` using
//! deadline checks only; every call to [`ChannelSequencer::tick`] returns
//! immediately. The orchestrator decides when a channel leaves `Idle` and
//! collects the finished sample set with [`ChannelSequencer::acknowledge`].

use core::ops::Add;
use core::time::Duration;

use heapless::Vec;

use crate::adc::{AdcError, SampleSource};
use crate::channels::{ChannelId, ChannelState, PhaseProgress};
use crate::config::{ChannelTiming, MAX_SAMPLES_PER_CYCLE, ReadWindow};
use crate::leds::LedFlags;

/// Samples gathered during one read phase.
pub type SampleBuffer = Vec<i16, MAX_SAMPLES_PER_CYCLE>;

/// What a single tick did.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickReport {
    /// State change performed by this tick as `(from, to)`.
    pub transition: Option<(ChannelState, ChannelState)>,
    /// Outcome of the sample attempt made by this tick.
    pub sample: Option<Result<i16, AdcError>>,
}

impl TickReport {
    const fn transition(from: ChannelState, to: ChannelState) -> Self {
        Self {
            transition: Some((from, to)),
            sample: None,
        }
    }
}

/// Finalized output of one channel cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompletedCycle {
    pub samples: SampleBuffer,
    pub attempts: u8,
    pub missed: u8,
}

/// Acquisition state for one channel.
#[derive(Clone, Debug)]
pub struct ChannelSequencer<Instant> {
    id: ChannelId,
    state: ChannelState,
    timing: ChannelTiming,
    cycle_started_at: Option<Instant>,
    phase_started_at: Option<Instant>,
    deadline: Option<Instant>,
    samples: SampleBuffer,
    attempts: u8,
    missed: u8,
    failure_counter: u8,
}

impl<Instant> ChannelSequencer<Instant>
where
    Instant: Copy + Ord + Add<Duration, Output = Instant>,
{
    #[must_use]
    pub const fn new(id: ChannelId) -> Self {
        Self {
            id,
            state: ChannelState::Idle,
            timing: ChannelTiming::DEFAULT,
            cycle_started_at: None,
            phase_started_at: None,
            deadline: None,
            samples: Vec::new(),
            attempts: 0,
            missed: 0,
            failure_counter: 0,
        }
    }

    /// Starts a cycle: lights the LED and arms the on-time deadline.
    ///
    /// `timing` is latched for the whole cycle. Returns `false` when the
    /// channel is not idle.
    pub fn activate(&mut self, now: Instant, timing: ChannelTiming, flags: &LedFlags) -> bool {
        if self.state != ChannelState::Idle {
            return false;
        }

        self.timing = timing;
        self.samples.clear();
        self.attempts = 0;
        self.missed = 0;
        self.cycle_started_at = Some(now);
        flags.set(self.id.led(), true);
        self.enter(ChannelState::LedOn, now, Some(now + timing.led_on));
        true
    }

    /// Advances the state machine by at most one transition or sample attempt.
    pub fn tick<A>(&mut self, now: Instant, adc: &mut A, flags: &LedFlags) -> TickReport
    where
        A: SampleSource + ?Sized,
    {
        match self.state {
            ChannelState::Idle | ChannelState::CycleComplete => TickReport::default(),
            ChannelState::LedOn => {
                if !self.deadline_reached(now) {
                    return TickReport::default();
                }
                flags.set(self.id.led(), false);
                let settle_until = now + self.timing.settle;
                self.enter(ChannelState::DelayCounting, now, Some(settle_until));
                TickReport::transition(ChannelState::LedOn, ChannelState::DelayCounting)
            }
            ChannelState::DelayCounting => {
                if !self.deadline_reached(now) {
                    return TickReport::default();
                }
                let window_end = match self.timing.read {
                    ReadWindow::Samples(_) => None,
                    ReadWindow::Duration(window) => Some(now + window),
                };
                self.enter(ChannelState::AdcReading, now, window_end);
                TickReport::transition(ChannelState::DelayCounting, ChannelState::AdcReading)
            }
            ChannelState::AdcReading => self.read_step(now, adc),
        }
    }

    fn read_step<A>(&mut self, now: Instant, adc: &mut A) -> TickReport
    where
        A: SampleSource + ?Sized,
    {
        if let ReadWindow::Duration(_) = self.timing.read
            && self.deadline_reached(now)
        {
            return self.finish(now, None);
        }

        let sample = adc.read_sample(self.id.adc_input());
        self.attempts = self.attempts.saturating_add(1);
        match sample {
            Ok(value) => {
                self.failure_counter = 0;
                // Capacity is checked below before another attempt is made.
                let _ = self.samples.push(value);
            }
            Err(_) => {
                self.failure_counter = self.failure_counter.saturating_add(1);
                self.missed = self.missed.saturating_add(1);
            }
        }

        let quota_met = match self.timing.read {
            ReadWindow::Samples(count) => self.attempts >= count,
            ReadWindow::Duration(_) => false,
        };

        if quota_met || self.samples.is_full() {
            self.finish(now, Some(sample))
        } else {
            TickReport {
                transition: None,
                sample: Some(sample),
            }
        }
    }

    fn finish(&mut self, now: Instant, sample: Option<Result<i16, AdcError>>) -> TickReport {
        self.enter(ChannelState::CycleComplete, now, None);
        TickReport {
            transition: Some((ChannelState::AdcReading, ChannelState::CycleComplete)),
            sample,
        }
    }

    /// Hands out the finished sample set and returns the channel to `Idle`.
    pub fn acknowledge(&mut self) -> Option<CompletedCycle> {
        if self.state != ChannelState::CycleComplete {
            return None;
        }

        let completed = CompletedCycle {
            samples: core::mem::take(&mut self.samples),
            attempts: self.attempts,
            missed: self.missed,
        };
        self.attempts = 0;
        self.missed = 0;
        self.state = ChannelState::Idle;
        self.cycle_started_at = None;
        self.phase_started_at = None;
        self.deadline = None;
        Some(completed)
    }

    /// Abandons any cycle in progress and darkens the channel LED.
    pub fn reset(&mut self, flags: &LedFlags) {
        flags.set(self.id.led(), false);
        self.state = ChannelState::Idle;
        self.cycle_started_at = None;
        self.phase_started_at = None;
        self.deadline = None;
        self.samples.clear();
        self.attempts = 0;
        self.missed = 0;
        self.failure_counter = 0;
    }

    fn enter(&mut self, state: ChannelState, now: Instant, deadline: Option<Instant>) {
        self.state = state;
        self.phase_started_at = Some(now);
        self.deadline = deadline;
    }

    fn deadline_reached(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    #[must_use]
    pub const fn progress(&self) -> PhaseProgress {
        self.state.progress()
    }

    /// Consecutive failed attempts on this channel.
    #[must_use]
    pub const fn failure_counter(&self) -> u8 {
        self.failure_counter
    }

    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// When the current cycle left `Idle`.
    #[must_use]
    pub const fn cycle_started_at(&self) -> Option<Instant> {
        self.cycle_started_at
    }

    #[must_use]
    pub const fn phase_started_at(&self) -> Option<Instant> {
        self.phase_started_at
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Timing latched for the current cycle.
    #[must_use]
    pub const fn timing(&self) -> ChannelTiming {
        self.timing
    }
}
