//! Board wiring for the STM32G0 target.
//!
//! LED0..LED3 sit on PA4..PA7 and the READY indicator on PB0, all push-pull
//! and active high. The ADS1115 hangs off I2C1 on PB8 (SCL) / PB9 (SDA).

use acquisition_core::adc::{ADS1115_DEFAULT_ADDRESS, Ads1115};
use acquisition_core::leds::LedBank;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Blocking;
use embassy_stm32::time::Hertz;
use embassy_stm32::Peri;

pub type LedPin = Output<'static>;
pub type BoardLeds = LedBank<LedPin>;
pub type AdcBus = I2c<'static, Blocking>;
pub type BoardAdc = Ads1115<AdcBus>;

/// Fast-mode I2C clock used for the ADC.
const ADC_BUS_FREQUENCY: Hertz = Hertz(400_000);

/// Builds the LED bank in `LedId` order with every output low.
pub fn led_bank(
    led0: Peri<'static, hal::peripherals::PA4>,
    led1: Peri<'static, hal::peripherals::PA5>,
    led2: Peri<'static, hal::peripherals::PA6>,
    led3: Peri<'static, hal::peripherals::PA7>,
    ready: Peri<'static, hal::peripherals::PB0>,
) -> BoardLeds {
    LedBank::new([
        Output::new(led0, Level::Low, Speed::Low),
        Output::new(led1, Level::Low, Speed::Low),
        Output::new(led2, Level::Low, Speed::Low),
        Output::new(led3, Level::Low, Speed::Low),
        Output::new(ready, Level::Low, Speed::Low),
    ])
}

/// Opens I2C1 in blocking mode and wraps it in the ADS1115 driver.
pub fn adc(
    i2c: Peri<'static, hal::peripherals::I2C1>,
    scl: Peri<'static, hal::peripherals::PB8>,
    sda: Peri<'static, hal::peripherals::PB9>,
) -> BoardAdc {
    let config = i2c::Config {
        frequency: ADC_BUS_FREQUENCY,
        ..i2c::Config::default()
    };
    let bus = I2c::new_blocking(i2c, scl, sda, config);
    Ads1115::with_address(bus, ADS1115_DEFAULT_ADDRESS)
}
