#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Firmware-only status counters.
//!
//! Lightweight atomics track the USB link, dropped console output, the LED
//! refresh interrupt and the ADC probe result so the `status` command can
//! append a `link` line without touching task-owned state.

use core::fmt;

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Tracks whether the host has the console open (DTR asserted).
static LINK_ATTACHED: AtomicBool = AtomicBool::new(false);
/// Console frames discarded because the TX queue was full.
static FRAMES_DROPPED: AtomicU32 = AtomicU32::new(0);
/// Passes made by the LED refresh task.
static LED_REFRESHES: AtomicU32 = AtomicU32::new(0);
/// Whether the ADC acknowledged its address at start-up.
static ADC_PRESENT: AtomicBool = AtomicBool::new(false);

/// Updates the cached console attachment flag.
pub fn set_link_attached(attached: bool) {
    LINK_ATTACHED.store(attached, Ordering::Relaxed);
}

pub fn record_frames_dropped(count: usize) {
    if count == 0 {
        return;
    }
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    FRAMES_DROPPED.fetch_add(count, Ordering::Relaxed);
}

pub fn record_led_refresh() {
    LED_REFRESHES.fetch_add(1, Ordering::Relaxed);
}

pub fn set_adc_present(present: bool) {
    ADC_PRESENT.store(present, Ordering::Relaxed);
}

/// Point-in-time copy of the firmware counters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LinkStatus {
    pub attached: bool,
    pub frames_dropped: u32,
    pub led_refreshes: u32,
    pub adc_present: bool,
}

impl LinkStatus {
    /// Writes `link usb=attached adc=ok dropped=0 led-refresh=1234`.
    pub fn write_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "link usb={} adc={} dropped={} led-refresh={}",
            if self.attached { "attached" } else { "detached" },
            if self.adc_present { "ok" } else { "missing" },
            self.frames_dropped,
            self.led_refreshes
        )
    }
}

pub fn snapshot() -> LinkStatus {
    LinkStatus {
        attached: LINK_ATTACHED.load(Ordering::Relaxed),
        frames_dropped: FRAMES_DROPPED.load(Ordering::Relaxed),
        led_refreshes: LED_REFRESHES.load(Ordering::Relaxed),
        adc_present: ADC_PRESENT.load(Ordering::Relaxed),
    }
}
