use super::USB_STORAGE;
use crate::console::{CONSOLE_RX_QUEUE, CONSOLE_TX_QUEUE, ConsoleFrame};
use crate::status;
use crate::usb::{self, UsbDeviceStrings};
use embassy_futures::join::join;
use embassy_futures::select::{Either3, select3};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_usb::driver::EndpointError;

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);

    let usb::UsbConsole { mut device, port } =
        usb::UsbConsole::new(driver, storage, UsbDeviceStrings::default());

    join(device.run(), run_console(port)).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_console<D>(port: usb::ConsolePort<D>) -> !
where
    D: embassy_usb::driver::Driver<'static>,
{
    let usb::ConsolePort {
        mut sender,
        mut receiver,
        control,
    } = port;
    let rx_queue = CONSOLE_RX_QUEUE.sender();
    let tx_queue = CONSOLE_TX_QUEUE.receiver();
    let mut ingress = [0u8; usb::MAX_PACKET_SIZE as usize];
    let mut pending_tx: Option<ConsoleFrame> = None;

    loop {
        status::set_link_attached(false);
        join(receiver.wait_connection(), sender.wait_connection()).await;
        while !sender.dtr() {
            control.control_changed().await;
        }
        // Drop output produced while nobody was listening.
        pending_tx.take();
        while tx_queue.try_receive().is_ok() {}

        status::set_link_attached(true);
        defmt::info!("usb: console connected");

        loop {
            match select3(
                receiver.read_packet(&mut ingress),
                async {
                    if pending_tx.is_none() {
                        pending_tx = Some(tx_queue.receive().await);
                    }

                    let result = match pending_tx.as_ref() {
                        Some(frame) => sender.write_packet(frame).await,
                        None => Ok(()),
                    };
                    if result.is_ok() {
                        pending_tx.take();
                    }
                    result
                },
                control.control_changed(),
            )
            .await
            {
                Either3::First(Ok(0)) => {}
                Either3::First(Ok(count)) => {
                    let mut frame = ConsoleFrame::new();
                    if frame.extend_from_slice(&ingress[..count]).is_err() {
                        defmt::warn!("usb: dropping console frame len={} (overflow)", count);
                        continue;
                    }
                    rx_queue.send(frame).await;
                }
                Either3::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console interface disabled");
                    break;
                }
                Either3::First(Err(_)) => {
                    defmt::warn!("usb: console read error");
                }
                Either3::Second(Ok(())) => {}
                Either3::Second(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console write disabled");
                    break;
                }
                Either3::Second(Err(_)) => {
                    defmt::warn!("usb: console write error");
                }
                Either3::Third(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: host dropped DTR");
                        break;
                    }
                }
            }
        }
    }
}
