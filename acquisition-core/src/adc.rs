//! Shared ADC access shim.
//!
//! The acquisition state machine only needs "read one sample from input N".
//! [`SampleSource`] expresses that capability; [`Ads1115`] implements it for the
//! TI ADS1115 over any `embedded_hal` 1.0 I2C bus using single-shot conversions
//! and a bounded ready poll so a caller never blocks on a missing device.

use core::fmt;

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

/// Single-ended ADC inputs (referenced to GND).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdcInput {
    Ain0,
    Ain1,
    Ain2,
    Ain3,
}

impl AdcInput {
    const fn mux_bits(self) -> u16 {
        match self {
            AdcInput::Ain0 => 0b100,
            AdcInput::Ain1 => 0b101,
            AdcInput::Ain2 => 0b110,
            AdcInput::Ain3 => 0b111,
        }
    }

    #[must_use]
    pub const fn as_index(self) -> u8 {
        match self {
            AdcInput::Ain0 => 0,
            AdcInput::Ain1 => 1,
            AdcInput::Ain2 => 2,
            AdcInput::Ain3 => 3,
        }
    }
}

impl fmt::Display for AdcInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AIN{}", self.as_index())
    }
}

/// Reasons a sample attempt produced no value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdcError {
    /// The device did not acknowledge its address.
    NoResponse,
    /// The conversion did not finish within the poll budget.
    Timeout,
    /// Any other bus-level failure.
    Bus,
}

impl fmt::Display for AdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcError::NoResponse => f.write_str("adc not responding"),
            AdcError::Timeout => f.write_str("adc conversion timed out"),
            AdcError::Bus => f.write_str("adc bus error"),
        }
    }
}

/// Capability to take one sample from the shared ADC.
pub trait SampleSource {
    /// Performs a single conversion on `input`. Must not block indefinitely.
    fn read_sample(&mut self, input: AdcInput) -> Result<i16, AdcError>;
}

impl<T> SampleSource for &mut T
where
    T: SampleSource + ?Sized,
{
    fn read_sample(&mut self, input: AdcInput) -> Result<i16, AdcError> {
        (**self).read_sample(input)
    }
}

/// Default 7-bit address (ADDR pin tied to GND).
pub const ADS1115_DEFAULT_ADDRESS: u8 = 0x48;
/// Ready-flag polls before a conversion is declared lost. At 860 SPS a
/// conversion completes well inside this many bus round trips.
pub const MAX_READY_POLLS: u8 = 16;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const CONFIG_OS_SINGLE: u16 = 1 << 15;
const CONFIG_PGA_4V096: u16 = 0b001 << 9;
const CONFIG_MODE_SINGLE_SHOT: u16 = 1 << 8;
const CONFIG_DR_860SPS: u16 = 0b111 << 5;
const CONFIG_COMP_DISABLE: u16 = 0b11;

/// Configuration word that starts a single-shot conversion of `input` against GND.
#[must_use]
pub const fn config_word(input: AdcInput) -> u16 {
    CONFIG_OS_SINGLE
        | (input.mux_bits() << 12)
        | CONFIG_PGA_4V096
        | CONFIG_MODE_SINGLE_SHOT
        | CONFIG_DR_860SPS
        | CONFIG_COMP_DISABLE
}

/// ADS1115 driver reduced to the single-sample capability.
pub struct Ads1115<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> Ads1115<I2C>
where
    I2C: I2c,
{
    /// Creates a driver at the default address.
    pub const fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, ADS1115_DEFAULT_ADDRESS)
    }

    pub const fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Returns the underlying bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Reads the config register to confirm the device answers.
    pub fn probe(&mut self) -> Result<u16, AdcError> {
        self.read_register(REG_CONFIG)
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<(), AdcError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[register, hi, lo])
            .map_err(|err| map_bus_error(err.kind()))
    }

    fn read_register(&mut self, register: u8) -> Result<u16, AdcError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|err| map_bus_error(err.kind()))?;
        Ok(u16::from_be_bytes(buf))
    }

    fn wait_ready(&mut self) -> Result<(), AdcError> {
        for _ in 0..MAX_READY_POLLS {
            if self.read_register(REG_CONFIG)? & CONFIG_OS_SINGLE != 0 {
                return Ok(());
            }
        }

        Err(AdcError::Timeout)
    }
}

impl<I2C> SampleSource for Ads1115<I2C>
where
    I2C: I2c,
{
    fn read_sample(&mut self, input: AdcInput) -> Result<i16, AdcError> {
        self.write_register(REG_CONFIG, config_word(input))?;
        self.wait_ready()?;
        let raw = self.read_register(REG_CONVERSION)?;
        Ok(i16::from_be_bytes(raw.to_be_bytes()))
    }
}

fn map_bus_error(kind: ErrorKind) -> AdcError {
    match kind {
        ErrorKind::NoAcknowledge(_) => AdcError::NoResponse,
        _ => AdcError::Bus,
    }
}
