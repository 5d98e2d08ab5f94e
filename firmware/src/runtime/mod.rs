use acquisition_core::config::AcquisitionConfig;
use acquisition_core::leds::LedFlags;
use acquisition_core::orchestrator::Acquisition;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32 as hal;
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use static_cell::StaticCell;

use crate::hw;
use crate::status;
use crate::usb;

mod acquisition_task;
mod led_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        cortex_m::interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                cortex_m::interrupt::enable();
            }
        }
    }
}

/// Desired LED levels, written by the acquisition task and mirrored by the LED task.
pub(super) static LED_FLAGS: LedFlags = LedFlags::new();
pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

/// Executor for the LED refresh task; preempts the thread-mode executor.
static LED_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SPI2_3() {
    unsafe { LED_EXECUTOR.on_interrupt() }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA4,
        PA5,
        PA6,
        PA7,
        PB0,
        PB8,
        PB9,
        I2C1,
        USB,
        PA11,
        PA12,
        ..
    } = hal::init(config);

    let mut leds = hw::led_bank(PA4, PA5, PA6, PA7, PB0);
    // Output<'static> is infallible.
    let _ = leds.begin();

    let mut adc = hw::adc(I2C1, PB8, PB9);
    match adc.probe() {
        Ok(word) => {
            status::set_adc_present(true);
            defmt::info!("adc: ADS1115 present config=0x{:04x}", word);
        }
        Err(error) => {
            status::set_adc_present(false);
            defmt::warn!("adc: probe failed: {}", defmt::Display2Format(&error));
        }
    }

    let acquisition = Acquisition::new(AcquisitionConfig::default(), adc, &LED_FLAGS)
        .expect("default acquisition config");

    interrupt::SPI2_3.set_priority(Priority::P1);
    let led_spawner = LED_EXECUTOR.start(interrupt::SPI2_3);
    led_spawner
        .spawn(led_task::run(leds, &LED_FLAGS))
        .expect("failed to spawn LED task");

    spawner
        .spawn(acquisition_task::run(acquisition))
        .expect("failed to spawn acquisition task");

    spawner
        .spawn(usb_task::run(USB, PA12, PA11))
        .expect("failed to spawn USB task");

    core::future::pending::<()>().await;
}
