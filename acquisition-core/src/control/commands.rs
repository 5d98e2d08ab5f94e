//! High-level control command dispatcher.
//!
//! This module glues parsed control lines to the acquisition orchestrator. It
//! stays `no_std` friendly so the firmware and emulator crates share the same
//! implementation; front-ends only render the returned [`CommandOutcome`].

use core::fmt;
use core::ops::Add;
use core::time::Duration;

use crate::adc::SampleSource;
use crate::channels::ChannelId;
use crate::config::{ChannelTiming, ConfigError};
use crate::orchestrator::{Acquisition, AcquisitionStatus};
use crate::telemetry::TelemetryInstant;

use super::grammar::{self, Command, TimingCommand};

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome<'a> {
    Started,
    Stopped,
    Reset,
    FaultCleared,
    Status(AcquisitionStatus),
    TimingUpdated {
        channel: ChannelId,
        timing: ChannelTiming,
    },
    ChannelEnabled {
        channel: ChannelId,
        enabled: bool,
    },
    Help(Option<&'a str>),
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    UnknownChannel(u8),
    Config(ConfigError),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<ConfigError> for CommandError<'_> {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => err.fmt(f),
            CommandError::UnknownChannel(index) => write!(f, "unknown channel {index}"),
            CommandError::Config(err) => err.fmt(f),
        }
    }
}

type CommandResult<'a> = Result<CommandOutcome<'a>, CommandError<'a>>;

/// Operations the control line can perform on an acquisition system.
pub trait AcquisitionControl {
    type Instant: Copy;

    fn start(&mut self, now: Self::Instant);
    fn stop(&mut self, now: Self::Instant);
    fn reset(&mut self, now: Self::Instant);
    fn clear_fault(&mut self, now: Self::Instant);
    fn timing(&self, channel: ChannelId) -> ChannelTiming;
    fn set_timing(&mut self, channel: ChannelId, timing: ChannelTiming)
    -> Result<(), ConfigError>;
    fn set_enabled(&mut self, channel: ChannelId, enabled: bool) -> Result<(), ConfigError>;
    fn status(&self) -> AcquisitionStatus;
}

impl<A, Instant, const TELEMETRY: usize> AcquisitionControl
    for Acquisition<'_, A, Instant, TELEMETRY>
where
    A: SampleSource,
    Instant: Copy + Ord + Add<Duration, Output = Instant> + TelemetryInstant,
{
    type Instant = Instant;

    fn start(&mut self, now: Instant) {
        Acquisition::start(self, now);
    }

    fn stop(&mut self, now: Instant) {
        Acquisition::stop(self, now);
    }

    fn reset(&mut self, now: Instant) {
        Acquisition::reset(self, now);
    }

    fn clear_fault(&mut self, now: Instant) {
        Acquisition::clear_fault(self, now);
    }

    fn timing(&self, channel: ChannelId) -> ChannelTiming {
        self.config().timing(channel)
    }

    fn set_timing(
        &mut self,
        channel: ChannelId,
        timing: ChannelTiming,
    ) -> Result<(), ConfigError> {
        Acquisition::set_timing(self, channel, timing)
    }

    fn set_enabled(&mut self, channel: ChannelId, enabled: bool) -> Result<(), ConfigError> {
        Acquisition::set_enabled(self, channel, enabled)
    }

    fn status(&self) -> AcquisitionStatus {
        self.snapshot()
    }
}

/// Dispatches control commands into the acquisition system.
pub struct CommandExecutor<T> {
    target: T,
}

impl<T> CommandExecutor<T> {
    /// Creates a new executor around the provided acquisition system.
    pub const fn new(target: T) -> Self {
        Self { target }
    }

    /// Returns an immutable reference to the underlying acquisition system.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Returns a mutable reference to the underlying acquisition system.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Consumes the executor and yields the inner acquisition system.
    pub fn into_inner(self) -> T {
        self.target
    }
}

impl<T> CommandExecutor<T>
where
    T: AcquisitionControl,
{
    /// Parses and executes a control line.
    pub fn execute<'a>(&mut self, line: &'a str, now: T::Instant) -> CommandResult<'a> {
        let command = grammar::parse(line)?;
        self.dispatch(command, now)
    }

    /// Executes an already parsed command.
    pub fn dispatch<'a>(&mut self, command: Command<'a>, now: T::Instant) -> CommandResult<'a> {
        match command {
            Command::Start => {
                self.target.start(now);
                Ok(CommandOutcome::Started)
            }
            Command::Stop => {
                self.target.stop(now);
                Ok(CommandOutcome::Stopped)
            }
            Command::Reset => {
                self.target.reset(now);
                Ok(CommandOutcome::Reset)
            }
            Command::Status => Ok(CommandOutcome::Status(self.target.status())),
            Command::Timing(update) => self.apply_timing(update),
            Command::Enable(index) => self.toggle_channel(index, true),
            Command::Disable(index) => self.toggle_channel(index, false),
            Command::FaultClear => {
                self.target.clear_fault(now);
                Ok(CommandOutcome::FaultCleared)
            }
            Command::Help(help) => Ok(CommandOutcome::Help(help.topic)),
        }
    }

    fn apply_timing<'a>(&mut self, update: TimingCommand) -> CommandResult<'a> {
        let channel = resolve_channel(update.channel)?;
        let current = self.target.timing(channel);
        let timing = ChannelTiming {
            led_on: update.led_on.unwrap_or(current.led_on),
            settle: update.settle.unwrap_or(current.settle),
            read: update.read.unwrap_or(current.read),
            enabled: current.enabled,
        };

        self.target.set_timing(channel, timing)?;
        Ok(CommandOutcome::TimingUpdated { channel, timing })
    }

    fn toggle_channel<'a>(&mut self, index: u8, enabled: bool) -> CommandResult<'a> {
        let channel = resolve_channel(index)?;
        self.target.set_enabled(channel, enabled)?;
        Ok(CommandOutcome::ChannelEnabled { channel, enabled })
    }
}

fn resolve_channel<'a>(index: u8) -> Result<ChannelId, CommandError<'a>> {
    ChannelId::from_index(usize::from(index)).ok_or(CommandError::UnknownChannel(index))
}
