#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Telemetry logging helpers.
//!
//! The acquisition core records typed events into its own ring. This module
//! walks the records that appeared since the previous call and mirrors them to
//! defmt (or stdout on the host) for inspection during bring-up.

use acquisition_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryPayload, TelemetryRecord, TelemetryRecorder,
};

use crate::clock::FirmwareInstant;

/// Remembers which telemetry records have already been logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct TelemetryLog {
    next_id: EventId,
}

impl TelemetryLog {
    pub const fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Logs every record newer than the previous drain. Returns how many were emitted.
    pub fn drain<const CAPACITY: usize>(
        &mut self,
        recorder: &TelemetryRecorder<FirmwareInstant, CAPACITY>,
    ) -> usize {
        let mut emitted = 0;
        for record in recorder.oldest_first() {
            if record.id < self.next_id {
                continue;
            }
            log_record(record);
            emitted += 1;
        }
        self.next_id = recorder.next_event_id();
        emitted
    }
}

fn log_record(record: &TelemetryRecord<FirmwareInstant>) {
    let timestamp_us = record.timestamp.into_embassy().as_micros();
    match record.details {
        TelemetryPayload::Led(led) => emit_log(
            record.event,
            timestamp_us,
            led.elapsed_since_previous.map(elapsed_micros),
        ),
        TelemetryPayload::Cycle(cycle) => emit_log(
            record.event,
            timestamp_us,
            cycle.duration.map(elapsed_micros),
        ),
        TelemetryPayload::None | TelemetryPayload::Sample(_) | TelemetryPayload::Fault { .. } => {
            emit_log(record.event, timestamp_us, None);
        }
    }
}

fn elapsed_micros(elapsed: core::time::Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(target_os = "none")]
fn emit_log(event: TelemetryEventKind, timestamp_us: u64, delta_us: Option<u64>) {
    if let Some(delta) = delta_us {
        defmt::info!(
            "telemetry:{} t={}us Δ={}us",
            defmt::Display2Format(&event),
            timestamp_us,
            delta
        );
    } else {
        defmt::info!(
            "telemetry:{} t={}us",
            defmt::Display2Format(&event),
            timestamp_us
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(event: TelemetryEventKind, timestamp_us: u64, delta_us: Option<u64>) {
    if let Some(delta) = delta_us {
        println!("telemetry:{event} t={timestamp_us}us Δ={delta}us");
    } else {
        println!("telemetry:{event} t={timestamp_us}us");
    }
}
