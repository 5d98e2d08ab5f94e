//! Shared textual rendering for control-line responses.
//!
//! [`StatusFormatter`] keeps the `status` output consistent across the
//! firmware and the emulator; [`write_outcome`] renders every other command
//! acknowledgement the same way on both front-ends.

use core::fmt;
use core::time::Duration;

use crate::channels::{ALL_LEDS, ChannelId};
use crate::config::ChannelTiming;
use crate::orchestrator::AcquisitionStatus;

use super::commands::CommandOutcome;
use super::{HELP_TOPICS, help_for};

/// Helper that renders an [`AcquisitionStatus`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    status: &'a AcquisitionStatus,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(status: &'a AcquisitionStatus) -> Self {
        Self { status }
    }

    /// Writes the run line (e.g. `acquisition state=running pos=ch1 cycles=42`).
    pub fn write_run_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "acquisition state={} pos={} cycles={}",
            self.status.run_state.label(),
            self.status.process_pos,
            self.status.process_itr
        )
    }

    /// Writes one line per channel (e.g. `ch0 reading open=100ms delay=50ms read=8 failures=0`).
    pub fn write_channel_line<W: fmt::Write>(
        &self,
        writer: &mut W,
        channel: ChannelId,
    ) -> fmt::Result {
        let entry = &self.status.channels[channel.as_index()];
        write!(writer, "{} {}", entry.id, entry.state)?;
        if !entry.timing.enabled {
            writer.write_str(" disabled")?;
        }
        writer.write_char(' ')?;
        write_timing_fields(writer, &entry.timing)?;
        write!(writer, " failures={}", entry.failure_counter)
    }

    /// Writes the health line (e.g. `health failures=0 fault=no leds LED0=on ...`).
    pub fn write_health_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "health failures={} fault={} leds",
            self.status.consecutive_failures,
            if self.status.faulted { "latched" } else { "no" }
        )?;
        for (line, lit) in ALL_LEDS.iter().zip(self.status.leds.iter()) {
            write!(writer, " {}={}", line.name, if *lit { "on" } else { "off" })?;
        }
        Ok(())
    }

    /// Writes every status line separated by `\n`.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_run_line(writer)?;
        for channel in self.status.channels.iter().map(|entry| entry.id) {
            writer.write_char('\n')?;
            self.write_channel_line(writer, channel)?;
        }
        writer.write_char('\n')?;
        self.write_health_line(writer)
    }
}

/// Renders a command acknowledgement as one or more `\n`-separated lines.
pub fn write_outcome<W: fmt::Write>(writer: &mut W, outcome: &CommandOutcome<'_>) -> fmt::Result {
    match outcome {
        CommandOutcome::Started => writer.write_str("OK started"),
        CommandOutcome::Stopped => writer.write_str("OK stopped"),
        CommandOutcome::Reset => writer.write_str("OK reset"),
        CommandOutcome::FaultCleared => writer.write_str("OK fault cleared"),
        CommandOutcome::Status(status) => StatusFormatter::new(status).write_all(writer),
        CommandOutcome::TimingUpdated { channel, timing } => {
            write!(writer, "OK timing {channel} ")?;
            write_timing_fields(writer, timing)
        }
        CommandOutcome::ChannelEnabled { channel, enabled } => write!(
            writer,
            "OK {channel} {}",
            if *enabled { "enabled" } else { "disabled" }
        ),
        CommandOutcome::Help(Some(topic)) => match help_for(topic) {
            Some(usage) => writer.write_str(usage),
            None => write!(writer, "ERR unknown help topic `{topic}`"),
        },
        CommandOutcome::Help(None) => {
            writer.write_str("commands:")?;
            for (name, _) in &HELP_TOPICS {
                write!(writer, " {name}")?;
            }
            Ok(())
        }
    }
}

fn write_timing_fields<W: fmt::Write>(writer: &mut W, timing: &ChannelTiming) -> fmt::Result {
    writer.write_str("open=")?;
    write_duration(writer, timing.led_on)?;
    writer.write_str(" delay=")?;
    write_duration(writer, timing.settle)?;
    write!(writer, " read={}", timing.read)
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Duration) -> fmt::Result {
    if duration >= Duration::from_secs(1) && duration.subsec_millis() == 0 {
        write!(writer, "{}s", duration.as_secs())
    } else {
        write!(writer, "{}ms", duration.as_millis())
    }
}
