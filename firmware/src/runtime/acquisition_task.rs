use core::fmt::{self, Write};

use acquisition_core::control::commands::{CommandExecutor, CommandOutcome};
use acquisition_core::control::status::write_outcome;
use acquisition_core::orchestrator::Acquisition;
use acquisition_core::report::{CycleReport, ReportSink};
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};
use heapless::String;

use crate::clock::FirmwareInstant;
use crate::console::{self, CONSOLE_RX_QUEUE, CONSOLE_TX_QUEUE, LineAssembler};
use crate::hw::BoardAdc;
use crate::status;
use crate::telemetry::TelemetryLog;

pub type FirmwareAcquisition = Acquisition<'static, BoardAdc, FirmwareInstant>;

/// Acquisition step period. Phase durations are multiples of this in practice.
const TICK_PERIOD: Duration = Duration::from_millis(1);

/// Largest rendered response (the `status` output plus the link line).
const RESPONSE_CAPACITY: usize = 512;

/// Writes each finished cycle to the console as one `[...]` line.
struct ConsoleReportSink;

impl ReportSink<FirmwareInstant> for ConsoleReportSink {
    fn publish(&mut self, report: &CycleReport<FirmwareInstant>) {
        let mut line: String<48> = String::new();
        if report
            .write_line(&mut line, report.completed_at.as_millis())
            .is_ok()
        {
            status::record_frames_dropped(console::send_text(&CONSOLE_TX_QUEUE, &line));
        }
    }
}

#[embassy_executor::task]
pub async fn run(acquisition: FirmwareAcquisition) -> ! {
    let mut executor = CommandExecutor::new(acquisition);
    let mut assembler = LineAssembler::new();
    let mut telemetry = TelemetryLog::new();
    let mut sink = ConsoleReportSink;
    let mut ticker = Ticker::every(TICK_PERIOD);
    let inbound = CONSOLE_RX_QUEUE.receiver();

    defmt::info!("acquisition: ready, waiting for `start`");

    loop {
        match select(ticker.next(), inbound.receive()).await {
            Either::First(()) => {
                executor
                    .target_mut()
                    .tick_into(FirmwareInstant::now(), &mut sink);
            }
            Either::Second(frame) => {
                for &byte in &frame {
                    handle_byte(&mut executor, &mut assembler, byte);
                }
            }
        }

        telemetry.drain(executor.target().telemetry());
    }
}

fn handle_byte(
    executor: &mut CommandExecutor<FirmwareAcquisition>,
    assembler: &mut LineAssembler,
    byte: u8,
) {
    let mut response: String<RESPONSE_CAPACITY> = String::new();
    let rendered = match assembler.push(byte) {
        Ok(None) => return,
        Ok(Some(line)) => render_line(executor, &line, &mut response),
        Err(error) => write!(response, "ERR {error}"),
    };

    if rendered.is_err() {
        response.clear();
        let _ = response.push_str("ERR response too long");
    }
    status::record_frames_dropped(console::send_text(&CONSOLE_TX_QUEUE, &response));
}

fn render_line<W: Write>(
    executor: &mut CommandExecutor<FirmwareAcquisition>,
    line: &str,
    out: &mut W,
) -> fmt::Result {
    match executor.execute(line, FirmwareInstant::now()) {
        Ok(outcome) => {
            if matches!(
                outcome,
                CommandOutcome::Started | CommandOutcome::Stopped | CommandOutcome::Reset
            ) {
                defmt::info!("acquisition: {}", line);
            }
            write_outcome(out, &outcome)?;
            if matches!(outcome, CommandOutcome::Status(_)) {
                out.write_char('\n')?;
                status::snapshot().write_line(out)?;
            }
            Ok(())
        }
        Err(error) => {
            defmt::warn!("acquisition: rejected `{}`", line);
            write!(out, "ERR {error}")
        }
    }
}
