mod support;

use core::time::Duration;

use acquisition_core::adc::AdcInput;
use acquisition_core::channels::{ALL_CHANNELS, ChannelId, ChannelState, LedId};
use acquisition_core::config::{ChannelTiming, ReadWindow};
use acquisition_core::leds::LedFlags;
use acquisition_core::orchestrator::{Acquisition, RunState};
use acquisition_core::report::{CycleReport, ReportSink};
use heapless::Vec as HeaplessVec;

use support::{MockInstant, ScriptedAdc, fast_config, running};

fn assert_invariants(acquisition: &support::TestAcquisition<'_>, flags: &LedFlags, tick: u64) {
    assert!(
        acquisition.reading_channels() <= 1,
        "tick {tick}: more than one channel reading"
    );

    for descriptor in &ALL_CHANNELS {
        let channel = acquisition.channel(descriptor.id);
        assert_eq!(
            flags.is_lit(LedId::Channel(descriptor.id)),
            channel.state() == ChannelState::LedOn,
            "tick {tick}: LED flag disagrees with {:?} on {}",
            channel.state(),
            descriptor.id
        );
        assert!(channel.progress().is_consistent());
        if descriptor.id != acquisition.process_pos() {
            assert_eq!(
                channel.state(),
                ChannelState::Idle,
                "tick {tick}: inactive channel {} left idle",
                descriptor.id
            );
        }
    }
}

#[test]
fn twenty_ticks_walk_the_cursor_in_order() {
    let flags = LedFlags::new();
    let mut acquisition = running(&flags, fast_config(1), ScriptedAdc::always(Ok(100)));

    let expected_pos = [
        (4, ChannelId::Ch1),
        (8, ChannelId::Ch2),
        (12, ChannelId::Ch3),
        (16, ChannelId::Ch0),
        (20, ChannelId::Ch1),
    ];

    let mut reports: HeaplessVec<(ChannelId, u32), 8> = HeaplessVec::new();
    for tick in 1..=20u64 {
        let now = MockInstant::millis((tick - 1) * 10);
        if let Some(report) = acquisition.tick(now) {
            reports.push((report.channel, report.cycle)).expect("report log");
        }
        assert_invariants(&acquisition, &flags, tick);

        if let Some((_, pos)) = expected_pos.iter().find(|(at, _)| *at == tick) {
            assert_eq!(acquisition.process_pos(), *pos, "cursor after tick {tick}");
        }
    }

    assert_eq!(acquisition.process_itr(), 5);
    assert_eq!(
        reports.as_slice(),
        &[
            (ChannelId::Ch0, 1),
            (ChannelId::Ch1, 2),
            (ChannelId::Ch2, 3),
            (ChannelId::Ch3, 4),
            (ChannelId::Ch0, 5),
        ]
    );
    assert_eq!(
        acquisition.adc().reads.as_slice(),
        &[
            AdcInput::Ain0,
            AdcInput::Ain1,
            AdcInput::Ain2,
            AdcInput::Ain3,
            AdcInput::Ain0
        ]
    );
}

#[test]
fn channel_zero_walks_every_phase() {
    let flags = LedFlags::new();
    let timing = ChannelTiming::new(
        Duration::from_millis(100),
        Duration::from_millis(50),
        ReadWindow::Samples(3),
    );
    let config = acquisition_core::config::AcquisitionConfig::uniform(timing);
    let adc = ScriptedAdc::scripted(&[Ok(11), Ok(12), Ok(13)], Ok(0));
    let mut acquisition = running(&flags, config, adc);

    assert_eq!(acquisition.channel(ChannelId::Ch0).state(), ChannelState::Idle);
    acquisition.tick(MockInstant::millis(0));
    assert_eq!(acquisition.channel(ChannelId::Ch0).state(), ChannelState::LedOn);

    acquisition.tick(MockInstant::millis(99));
    assert_eq!(acquisition.channel(ChannelId::Ch0).state(), ChannelState::LedOn);

    acquisition.tick(MockInstant::millis(100));
    assert_eq!(
        acquisition.channel(ChannelId::Ch0).state(),
        ChannelState::DelayCounting
    );

    acquisition.tick(MockInstant::millis(149));
    assert_eq!(
        acquisition.channel(ChannelId::Ch0).state(),
        ChannelState::DelayCounting
    );

    acquisition.tick(MockInstant::millis(150));
    assert_eq!(
        acquisition.channel(ChannelId::Ch0).state(),
        ChannelState::AdcReading
    );

    assert!(acquisition.tick(MockInstant::millis(151)).is_none());
    assert!(acquisition.tick(MockInstant::millis(152)).is_none());
    assert_eq!(acquisition.channel(ChannelId::Ch0).samples(), &[11, 12]);

    let report = acquisition
        .tick(MockInstant::millis(153))
        .expect("cycle should complete on the third sample");
    assert_eq!(report.channel, ChannelId::Ch0);
    assert_eq!(report.samples.as_slice(), &[11, 12, 13]);
    assert_eq!(report.missed, 0);
    assert_eq!(report.mean(), Some(12));
    assert_eq!(report.completed_at, MockInstant::millis(153));

    // Passed through Idle; the next channel lights on the following tick.
    assert_eq!(acquisition.channel(ChannelId::Ch0).state(), ChannelState::Idle);
    assert_eq!(acquisition.channel(ChannelId::Ch1).state(), ChannelState::Idle);
    acquisition.tick(MockInstant::millis(154));
    assert_eq!(acquisition.channel(ChannelId::Ch1).state(), ChannelState::LedOn);
}

#[test]
fn disabled_channels_are_skipped() {
    let flags = LedFlags::new();
    let config = fast_config(1)
        .with_channel(ChannelId::Ch1, support::fast_timing(1).with_enabled(false))
        .with_channel(ChannelId::Ch2, support::fast_timing(1).with_enabled(false));
    let mut acquisition = running(&flags, config, ScriptedAdc::always(Ok(1)));

    let mut order: HeaplessVec<ChannelId, 8> = HeaplessVec::new();
    for tick in 0..16u64 {
        if let Some(report) = acquisition.tick(MockInstant::millis(tick * 10)) {
            order.push(report.channel).expect("order log");
        }
    }

    assert_eq!(
        order.as_slice(),
        &[ChannelId::Ch0, ChannelId::Ch3, ChannelId::Ch0, ChannelId::Ch3]
    );
}

#[test]
fn disabling_the_next_channel_takes_effect_at_selection() {
    let flags = LedFlags::new();
    let mut acquisition = running(&flags, fast_config(1), ScriptedAdc::always(Ok(1)));

    for tick in 0..4u64 {
        acquisition.tick(MockInstant::millis(tick * 10));
    }
    assert_eq!(acquisition.process_pos(), ChannelId::Ch1);

    acquisition
        .set_enabled(ChannelId::Ch1, false)
        .expect("other channels remain enabled");
    acquisition.tick(MockInstant::millis(40));
    assert_eq!(acquisition.process_pos(), ChannelId::Ch2);
    assert_eq!(acquisition.channel(ChannelId::Ch2).state(), ChannelState::LedOn);
}

#[test]
fn timing_changes_apply_from_the_next_cycle() {
    let flags = LedFlags::new();
    let mut acquisition = running(&flags, fast_config(1), ScriptedAdc::always(Ok(1)));

    acquisition.tick(MockInstant::millis(0));
    let longer = ChannelTiming::new(
        Duration::from_millis(500),
        Duration::from_millis(10),
        ReadWindow::Samples(1),
    );
    acquisition
        .set_timing(ChannelId::Ch0, longer)
        .expect("valid timing");

    // The cycle already in flight keeps its 10 ms on-time.
    acquisition.tick(MockInstant::millis(10));
    assert_eq!(
        acquisition.channel(ChannelId::Ch0).state(),
        ChannelState::DelayCounting
    );
    assert_eq!(acquisition.config().timing(ChannelId::Ch0), longer);
}

#[test]
fn idle_run_state_does_not_advance() {
    let flags = LedFlags::new();
    let mut acquisition: support::TestAcquisition<'_> =
        Acquisition::new(fast_config(1), ScriptedAdc::always(Ok(1)), &flags).expect("config");

    for tick in 0..10u64 {
        assert!(acquisition.tick(MockInstant::millis(tick * 10)).is_none());
    }
    assert_eq!(acquisition.run_state(), RunState::Idle);
    assert_eq!(acquisition.process_itr(), 0);
    assert!(acquisition.adc().reads.is_empty());
}

#[test]
fn reset_returns_everything_to_idle() {
    let flags = LedFlags::new();
    let mut acquisition = running(&flags, fast_config(2), ScriptedAdc::always(Ok(5)));

    for tick in 0..7u64 {
        acquisition.tick(MockInstant::millis(tick * 10));
    }
    assert!(acquisition.process_itr() > 0);
    assert!(flags.is_lit(LedId::Status));

    acquisition.reset(MockInstant::millis(70));

    assert_eq!(acquisition.run_state(), RunState::Idle);
    assert_eq!(acquisition.process_itr(), 0);
    assert_eq!(acquisition.process_pos(), ChannelId::Ch0);
    assert_eq!(flags.snapshot(), [false; 5]);
    for descriptor in &ALL_CHANNELS {
        let channel = acquisition.channel(descriptor.id);
        assert_eq!(channel.state(), ChannelState::Idle);
        assert!(channel.samples().is_empty());
    }
}

#[test]
fn stop_abandons_the_active_cycle_but_keeps_counters() {
    let flags = LedFlags::new();
    let mut acquisition = running(&flags, fast_config(1), ScriptedAdc::always(Ok(5)));

    for tick in 0..5u64 {
        acquisition.tick(MockInstant::millis(tick * 10));
    }
    assert_eq!(acquisition.process_itr(), 1);
    assert!(flags.is_lit(LedId::Channel(ChannelId::Ch1)));

    acquisition.stop(MockInstant::millis(50));
    assert_eq!(acquisition.channel(ChannelId::Ch1).state(), ChannelState::Idle);
    assert!(!flags.is_lit(LedId::Channel(ChannelId::Ch1)));
    assert_eq!(acquisition.process_itr(), 1);
    assert_eq!(acquisition.process_pos(), ChannelId::Ch1);

    acquisition.start(MockInstant::millis(60));
    acquisition.tick(MockInstant::millis(60));
    assert_eq!(acquisition.channel(ChannelId::Ch1).state(), ChannelState::LedOn);
}

#[derive(Default)]
struct CollectingSink {
    lines: HeaplessVec<heapless::String<48>, 8>,
}

impl ReportSink<MockInstant> for CollectingSink {
    fn publish(&mut self, report: &CycleReport<MockInstant>) {
        let mut line = heapless::String::new();
        report
            .write_line(&mut line, report.completed_at.as_millis())
            .expect("line fits");
        self.lines.push(line).expect("sink capacity");
    }
}

#[test]
fn reports_are_handed_to_the_sink() {
    let flags = LedFlags::new();
    let adc = ScriptedAdc::scripted(&[Ok(10), Ok(20), Ok(30), Ok(40)], Ok(0));
    let mut acquisition = running(&flags, fast_config(1), adc);
    let mut sink = CollectingSink::default();

    let mut published = 0;
    for tick in 0..8u64 {
        if acquisition.tick_into(MockInstant::millis(tick * 10), &mut sink) {
            published += 1;
        }
    }

    assert_eq!(published, 2);
    assert_eq!(sink.lines[0].as_str(), "[0,1,30,10,1,0]");
    assert_eq!(sink.lines[1].as_str(), "[1,2,70,20,1,0]");
}
