//! Panic handler: logs the location over RTT, then traps so an attached
//! debugger halts on the faulting core.

use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    let message = defmt::Display2Format(&info.message());
    match info.location() {
        Some(location) => defmt::error!(
            "panic at {}:{}: {}",
            location.file(),
            location.line(),
            message
        ),
        None => defmt::error!("panic: {}", message),
    }
    cortex_m::asm::udf();
}
