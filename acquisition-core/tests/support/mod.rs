#![allow(dead_code)]

use core::convert::Infallible;
use core::ops::Add;
use core::time::Duration;

use acquisition_core::adc::{AdcError, AdcInput, SampleSource};
use acquisition_core::config::{AcquisitionConfig, ChannelTiming, ReadWindow};
use acquisition_core::leds::{LedBank, LedFlags};
use acquisition_core::orchestrator::Acquisition;
use acquisition_core::telemetry::TelemetryInstant;
use embedded_hal::digital::{ErrorType, OutputPin};
use heapless::Vec as HeaplessVec;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct MockInstant(u64);

impl MockInstant {
    pub fn micros(value: u64) -> Self {
        Self(value)
    }

    pub fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }

    pub fn as_millis(self) -> u64 {
        self.0 / 1_000
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).expect("duration overflow");
        Self(self.0 + micros)
    }
}

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// ADC that replays a script and then repeats `fallback`.
pub struct ScriptedAdc {
    script: HeaplessVec<Result<i16, AdcError>, 64>,
    cursor: usize,
    pub fallback: Result<i16, AdcError>,
    pub reads: HeaplessVec<AdcInput, 256>,
}

impl ScriptedAdc {
    pub fn always(result: Result<i16, AdcError>) -> Self {
        Self::scripted(&[], result)
    }

    pub fn scripted(script: &[Result<i16, AdcError>], fallback: Result<i16, AdcError>) -> Self {
        Self {
            script: HeaplessVec::from_slice(script).expect("script too long"),
            cursor: 0,
            fallback,
            reads: HeaplessVec::new(),
        }
    }
}

impl SampleSource for ScriptedAdc {
    fn read_sample(&mut self, input: AdcInput) -> Result<i16, AdcError> {
        self.reads.push(input).expect("read log overflow");
        let result = self.script.get(self.cursor).copied().unwrap_or(self.fallback);
        self.cursor += 1;
        result
    }
}

/// Output pin that counts level transitions.
#[derive(Default)]
pub struct RecordingPin {
    pub high: bool,
    pub writes: usize,
    pub rising_edges: usize,
    pub falling_edges: usize,
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.high {
            self.falling_edges += 1;
        }
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.high {
            self.rising_edges += 1;
        }
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}

pub fn recording_bank() -> LedBank<RecordingPin> {
    LedBank::new(core::array::from_fn(|_| RecordingPin::default()))
}

/// 10 ms on, 10 ms settle, `samples` attempts.
pub fn fast_timing(samples: u8) -> ChannelTiming {
    ChannelTiming::new(
        Duration::from_millis(10),
        Duration::from_millis(10),
        ReadWindow::Samples(samples),
    )
}

pub fn fast_config(samples: u8) -> AcquisitionConfig {
    AcquisitionConfig::uniform(fast_timing(samples))
}

pub type TestAcquisition<'a> = Acquisition<'a, ScriptedAdc, MockInstant>;

pub fn running(flags: &LedFlags, config: AcquisitionConfig, adc: ScriptedAdc) -> TestAcquisition<'_> {
    let mut acquisition = Acquisition::new(config, adc, flags).expect("valid config");
    acquisition.start(MockInstant::millis(0));
    acquisition
}
