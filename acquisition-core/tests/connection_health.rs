mod support;

use acquisition_core::adc::AdcError;
use acquisition_core::channels::{ChannelId, LedId, STATUS_LED_INDEX};
use acquisition_core::leds::{LedBank, LedFlags};
use acquisition_core::telemetry::{TelemetryEventKind, TelemetryPayload};

use support::{MockInstant, RecordingPin, ScriptedAdc, TestAcquisition, fast_config, running};

/// Ticks every 10 ms and mirrors the flags onto the bank after each tick, the
/// way the LED interrupt would.
fn run_ticks(
    acquisition: &mut TestAcquisition<'_>,
    bank: &mut LedBank<RecordingPin>,
    flags: &LedFlags,
    start_ms: u64,
    ticks: u64,
) -> u64 {
    for tick in 0..ticks {
        acquisition.tick(MockInstant::millis(start_ms + tick * 10));
        bank.reconcile_all(flags).expect("infallible pins");
    }
    start_ms + ticks * 10
}

fn status_pin(bank: &LedBank<RecordingPin>) -> &RecordingPin {
    &bank.pins()[STATUS_LED_INDEX]
}

fn fault_events(acquisition: &TestAcquisition<'_>) -> usize {
    acquisition
        .telemetry()
        .oldest_first()
        .filter(|record| record.event == TelemetryEventKind::ConnectionFault)
        .count()
}

#[test]
fn four_failed_reads_drop_the_ready_indicator_once() {
    let flags = LedFlags::new();
    let mut bank = support::recording_bank();
    bank.begin().expect("infallible pins");
    let adc = ScriptedAdc::always(Err(AdcError::NoResponse));
    let mut acquisition = running(&flags, fast_config(4), adc);
    bank.reconcile_all(&flags).expect("infallible pins");
    assert!(status_pin(&bank).high);

    // Activate, settle, enter read, then three failed attempts.
    let now = run_ticks(&mut acquisition, &mut bank, &flags, 0, 6);
    assert_eq!(acquisition.health().consecutive_failures(), 3);
    assert!(status_pin(&bank).high);

    let now = run_ticks(&mut acquisition, &mut bank, &flags, now, 1);
    assert!(!flags.is_lit(LedId::Status));
    assert!(!status_pin(&bank).high);
    assert_eq!(status_pin(&bank).falling_edges, 1);
    assert_eq!(acquisition.health().consecutive_failures(), 0);
    assert!(acquisition.health().is_faulted());

    let fault = acquisition
        .telemetry()
        .oldest_first()
        .find(|record| record.event == TelemetryEventKind::ConnectionFault)
        .expect("fault recorded");
    assert_eq!(fault.details, TelemetryPayload::Fault { failures: 4 });

    // Later failing cycles keep the indicator dark without new edges or events.
    run_ticks(&mut acquisition, &mut bank, &flags, now, 21);
    assert!(acquisition.process_itr() >= 3);
    assert_eq!(status_pin(&bank).falling_edges, 1);
    assert_eq!(status_pin(&bank).rising_edges, 1);
    assert_eq!(fault_events(&acquisition), 1);
}

#[test]
fn a_success_resets_the_failure_streak() {
    let flags = LedFlags::new();
    let mut bank = support::recording_bank();
    let adc = ScriptedAdc::scripted(
        &[
            Err(AdcError::Timeout),
            Err(AdcError::Timeout),
            Err(AdcError::Timeout),
            Ok(512),
        ],
        Err(AdcError::Bus),
    );
    let mut acquisition = running(&flags, fast_config(4), adc);

    run_ticks(&mut acquisition, &mut bank, &flags, 0, 7);
    assert_eq!(acquisition.process_itr(), 1);
    assert_eq!(acquisition.health().consecutive_failures(), 0);
    assert!(!acquisition.health().is_faulted());
    assert!(flags.is_lit(LedId::Status));
    assert_eq!(status_pin(&bank).falling_edges, 0);
}

#[test]
fn a_streak_recovered_within_the_window_still_trips() {
    let flags = LedFlags::new();
    let mut bank = support::recording_bank();
    bank.begin().expect("infallible pins");
    let adc = ScriptedAdc::scripted(
        &[
            Err(AdcError::NoResponse),
            Err(AdcError::NoResponse),
            Err(AdcError::NoResponse),
            Err(AdcError::NoResponse),
        ],
        Ok(1),
    );
    let mut acquisition = running(&flags, fast_config(8), adc);
    bank.reconcile_all(&flags).expect("infallible pins");

    // Activate, settle, enter read, then four failures and four successes.
    run_ticks(&mut acquisition, &mut bank, &flags, 0, 11);
    assert_eq!(acquisition.process_itr(), 1);
    assert_eq!(acquisition.health().consecutive_failures(), 0);
    assert!(acquisition.health().is_faulted());
    assert!(!flags.is_lit(LedId::Status));
    assert_eq!(status_pin(&bank).falling_edges, 1);

    let fault = acquisition
        .telemetry()
        .oldest_first()
        .find(|record| record.event == TelemetryEventKind::ConnectionFault)
        .expect("fault recorded");
    assert_eq!(fault.details, TelemetryPayload::Fault { failures: 4 });
}

#[test]
fn failures_accumulate_across_channels() {
    let flags = LedFlags::new();
    let mut bank = support::recording_bank();
    let adc = ScriptedAdc::always(Err(AdcError::NoResponse));
    let mut acquisition = running(&flags, fast_config(2), adc);

    // Ch0 completes with two failures; still below the threshold.
    let now = run_ticks(&mut acquisition, &mut bank, &flags, 0, 5);
    assert_eq!(acquisition.process_pos(), ChannelId::Ch1);
    assert_eq!(acquisition.health().consecutive_failures(), 2);
    assert!(flags.is_lit(LedId::Status));

    // Ch1 adds two more and trips the monitor at its completion.
    run_ticks(&mut acquisition, &mut bank, &flags, now, 5);
    assert_eq!(acquisition.process_itr(), 2);
    assert!(acquisition.health().is_faulted());
    assert!(!flags.is_lit(LedId::Status));
    assert_eq!(acquisition.channel(ChannelId::Ch1).failure_counter(), 2);
}

#[test]
fn recovered_reads_do_not_release_the_latch() {
    let flags = LedFlags::new();
    let mut bank = support::recording_bank();
    let adc = ScriptedAdc::always(Err(AdcError::NoResponse));
    let mut acquisition = running(&flags, fast_config(4), adc);

    let now = run_ticks(&mut acquisition, &mut bank, &flags, 0, 7);
    assert!(acquisition.health().is_faulted());

    acquisition.adc_mut().fallback = Ok(100);
    run_ticks(&mut acquisition, &mut bank, &flags, now, 14);
    assert!(acquisition.health().is_faulted());
    assert_eq!(acquisition.health().consecutive_failures(), 0);
    assert!(!flags.is_lit(LedId::Status));
}

#[test]
fn clearing_the_fault_rearms_the_monitor() {
    let flags = LedFlags::new();
    let mut bank = support::recording_bank();
    let adc = ScriptedAdc::always(Err(AdcError::NoResponse));
    let mut acquisition = running(&flags, fast_config(4), adc);

    let now = run_ticks(&mut acquisition, &mut bank, &flags, 0, 7);
    assert_eq!(status_pin(&bank).falling_edges, 1);

    acquisition.clear_fault(MockInstant::millis(now));
    bank.reconcile_all(&flags).expect("infallible pins");
    assert!(!acquisition.health().is_faulted());
    assert!(status_pin(&bank).high);

    // The next channel fails its four attempts and trips the monitor again.
    run_ticks(&mut acquisition, &mut bank, &flags, now, 7);
    assert!(acquisition.health().is_faulted());
    assert_eq!(status_pin(&bank).falling_edges, 2);
    assert_eq!(fault_events(&acquisition), 2);
}

#[test]
fn clearing_while_idle_leaves_the_indicator_dark() {
    let flags = LedFlags::new();
    let adc = ScriptedAdc::always(Err(AdcError::NoResponse));
    let mut acquisition = running(&flags, fast_config(4), adc);
    let mut bank = support::recording_bank();

    let now = run_ticks(&mut acquisition, &mut bank, &flags, 0, 7);
    acquisition.stop(MockInstant::millis(now));
    acquisition.clear_fault(MockInstant::millis(now));

    assert!(!acquisition.health().is_faulted());
    assert!(!flags.is_lit(LedId::Status));

    acquisition.start(MockInstant::millis(now + 10));
    assert!(flags.is_lit(LedId::Status));
}
