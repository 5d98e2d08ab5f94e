use acquisition_core::leds::LedFlags;
use embassy_time::{Duration, Ticker};

use crate::hw::BoardLeds;
use crate::status;

/// Period of the LED refresh; flags set by the acquisition task reach the pins
/// within one period.
const REFRESH_PERIOD: Duration = Duration::from_millis(1);

#[embassy_executor::task]
pub async fn run(mut leds: BoardLeds, flags: &'static LedFlags) -> ! {
    let mut ticker = Ticker::every(REFRESH_PERIOD);
    loop {
        ticker.next().await;
        // Output<'static> is infallible.
        let _ = leds.reconcile_all(flags);
        status::record_led_refresh();
    }
}
