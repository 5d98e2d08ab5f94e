//! Finished-cycle reports and their hand-off to transports.

use core::fmt::{self, Write};

use crate::channels::ChannelId;
use crate::sequencer::SampleBuffer;

/// Results of one completed channel cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CycleReport<Instant> {
    pub channel: ChannelId,
    /// Value of the cycle counter after this cycle.
    pub cycle: u32,
    pub completed_at: Instant,
    pub samples: SampleBuffer,
    pub missed: u8,
}

impl<Instant> CycleReport<Instant> {
    /// Arithmetic mean of the collected samples, truncated toward zero.
    #[must_use]
    pub fn mean(&self) -> Option<i16> {
        if self.samples.is_empty() {
            return None;
        }

        let sum: i32 = self.samples.iter().map(|&sample| i32::from(sample)).sum();
        let count = i32::try_from(self.samples.len()).ok()?;
        i16::try_from(sum / count).ok()
    }

    /// Writes `[channel,cycle,timestamp_ms,mean,count,missed]`.
    ///
    /// A cycle without samples reports `-` for the mean.
    pub fn write_line<W: Write>(&self, out: &mut W, timestamp_ms: u64) -> fmt::Result {
        write!(
            out,
            "[{},{},{timestamp_ms},",
            self.channel.as_index(),
            self.cycle
        )?;
        match self.mean() {
            Some(mean) => write!(out, "{mean}")?,
            None => out.write_char('-')?,
        }
        write!(out, ",{},{}]", self.samples.len(), self.missed)
    }
}

/// Destination for finished cycle reports.
pub trait ReportSink<Instant> {
    fn publish(&mut self, report: &CycleReport<Instant>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    fn report(samples: &[i16], missed: u8) -> CycleReport<u64> {
        CycleReport {
            channel: ChannelId::Ch2,
            cycle: 17,
            completed_at: 0,
            samples: SampleBuffer::from_slice(samples).expect("samples"),
            missed,
        }
    }

    #[test]
    fn mean_truncates_toward_zero() {
        assert_eq!(report(&[10, 11], 0).mean(), Some(10));
        assert_eq!(report(&[-10, -11], 0).mean(), Some(-10));
        assert_eq!(report(&[i16::MAX, i16::MAX], 0).mean(), Some(i16::MAX));
        assert_eq!(report(&[], 4).mean(), None);
    }

    #[test]
    fn line_encoding_lists_summary_fields() {
        let mut line: String<64> = String::new();
        report(&[100, 200, 300], 1)
            .write_line(&mut line, 1_250)
            .expect("line fits");
        assert_eq!(line.as_str(), "[2,17,1250,200,3,1]");

        let mut line: String<64> = String::new();
        report(&[], 8).write_line(&mut line, 9).expect("line fits");
        assert_eq!(line.as_str(), "[2,17,9,-,0,8]");
    }
}
