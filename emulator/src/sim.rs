//! Simulated hardware for the host emulator.
//!
//! The clock only moves when the session ticks it, the ADC answers from a
//! per-input level table with injectable failures, and a background thread
//! stands in for the timer interrupt that mirrors [`LedFlags`] onto the pins.

use core::convert::Infallible;
use core::ops::Add;
use core::time::Duration;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use acquisition_core::adc::{AdcError, AdcInput, SampleSource};
use acquisition_core::channels::{CHANNEL_COUNT, LED_COUNT};
use acquisition_core::leds::{LedBank, LedFlags};
use acquisition_core::telemetry::TelemetryInstant;
use embedded_hal::digital::{ErrorType, OutputPin};

/// Period of the emulated LED interrupt.
pub const REFRESH_PERIOD: Duration = Duration::from_millis(1);

/// Levels reported by each input until changed with `adc set`.
pub const DEFAULT_LEVELS: [i16; CHANNEL_COUNT] = [1000, 2000, 3000, 4000];

/// Simulated monotonic time in microseconds since session start.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    pub const ZERO: Self = Self(0);

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000))
    }

    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// ADC model with fault injection.
#[derive(Clone, Debug)]
pub struct SimulatedAdc {
    levels: [i16; CHANNEL_COUNT],
    pending_failures: u32,
    connected: bool,
    reads: u64,
}

impl SimulatedAdc {
    pub const fn new() -> Self {
        Self {
            levels: DEFAULT_LEVELS,
            pending_failures: 0,
            connected: true,
            reads: 0,
        }
    }

    /// Makes the next `count` conversions time out.
    pub fn fail_next(&mut self, count: u32) {
        self.pending_failures = count;
    }

    /// A disconnected ADC never acknowledges.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn set_level(&mut self, input: AdcInput, value: i16) {
        self.levels[usize::from(input.as_index())] = value;
    }

    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    pub const fn pending_failures(&self) -> u32 {
        self.pending_failures
    }

    /// Conversions attempted so far, failed ones included.
    pub const fn reads(&self) -> u64 {
        self.reads
    }
}

impl Default for SimulatedAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SimulatedAdc {
    fn read_sample(&mut self, input: AdcInput) -> Result<i16, AdcError> {
        self.reads = self.reads.saturating_add(1);
        if !self.connected {
            return Err(AdcError::NoResponse);
        }
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(AdcError::Timeout);
        }
        Ok(self.levels[usize::from(input.as_index())])
    }
}

/// Output line that remembers its level.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimPin {
    high: bool,
}

impl SimPin {
    pub const fn is_high(self) -> bool {
        self.high
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

type SharedBank = Arc<Mutex<LedBank<SimPin>>>;

/// Background thread playing the periodic LED interrupt.
pub struct LedRefresher {
    flags: &'static LedFlags,
    bank: SharedBank,
    passes: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl LedRefresher {
    pub fn spawn(flags: &'static LedFlags) -> io::Result<Self> {
        let mut bank = LedBank::new([SimPin::default(); LED_COUNT]);
        // SimPin is infallible.
        let _ = bank.begin();
        let bank: SharedBank = Arc::new(Mutex::new(bank));
        let passes = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let bank = Arc::clone(&bank);
            let passes = Arc::clone(&passes);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("led-refresh".into())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        refresh(&bank, flags);
                        passes.fetch_add(1, Ordering::Relaxed);
                        thread::sleep(REFRESH_PERIOD);
                    }
                })?
        };

        Ok(Self {
            flags,
            bank,
            passes,
            stop,
            worker: Some(worker),
        })
    }

    /// Runs one refresh immediately and returns the resulting pin levels.
    pub fn levels(&self) -> [bool; LED_COUNT] {
        refresh(&self.bank, self.flags);
        lock(&self.bank).pins().map(SimPin::is_high)
    }

    /// Pin levels as left by the last refresh, without refreshing.
    #[cfg(test)]
    fn applied_levels(&self) -> [bool; LED_COUNT] {
        lock(&self.bank).pins().map(SimPin::is_high)
    }

    /// Refresh passes made by the background thread.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }
}

impl Drop for LedRefresher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// One interrupt pass. The critical section keeps it from interleaving with
/// `Acquisition::reset`, as the interrupt priority does on the MCU.
fn refresh(bank: &SharedBank, flags: &LedFlags) {
    critical_section::with(|_| {
        let _ = lock(bank).reconcile_all(flags);
    });
}

fn lock(bank: &SharedBank) -> MutexGuard<'_, LedBank<SimPin>> {
    bank.lock().unwrap_or_else(PoisonError::into_inner)
}
