mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use acquisition_core::channels::{ChannelId, LED_COUNT, LedId};
use acquisition_core::leds::LedFlags;

use support::{MockInstant, ScriptedAdc, fast_config, running};

static FLAGS: LedFlags = LedFlags::new();

#[test]
fn reconciler_thread_mirrors_the_final_flag_state() {
    let done = AtomicBool::new(false);

    let bank = thread::scope(|scope| {
        let reconciler = scope.spawn(|| {
            let mut bank = support::recording_bank();
            bank.begin().expect("infallible pins");
            while !done.load(Ordering::Acquire) {
                bank.reconcile_all(&FLAGS).expect("infallible pins");
                thread::yield_now();
            }
            bank.reconcile_all(&FLAGS).expect("infallible pins");
            bank
        });

        let mut acquisition = running(&FLAGS, fast_config(2), ScriptedAdc::always(Ok(7)));
        for tick in 0..200u64 {
            acquisition.tick(MockInstant::millis(tick * 10));
            if tick % 7 == 0 {
                thread::yield_now();
            }
        }
        done.store(true, Ordering::Release);
        reconciler.join().expect("reconciler thread")
    });

    let expected = FLAGS.snapshot();
    for (index, pin) in bank.pins().iter().enumerate() {
        assert_eq!(pin.high, expected[index], "pin {index}");
    }
    assert!(bank.pins()[LED_COUNT - 1].high, "ready indicator stays lit");
}

#[test]
fn reconciling_unchanged_flags_writes_nothing() {
    let flags = LedFlags::new();
    let mut bank = support::recording_bank();

    flags.set(LedId::Channel(ChannelId::Ch2), true);
    assert_eq!(bank.reconcile_all(&flags), Ok(LED_COUNT));
    assert_eq!(bank.reconcile_all(&flags), Ok(0));
    assert_eq!(bank.reconcile_all(&flags), Ok(0));

    let writes: usize = bank.pins().iter().map(|pin| pin.writes).sum();
    assert_eq!(writes, LED_COUNT);
    assert_eq!(bank.applied(LedId::Channel(ChannelId::Ch2)), Some(true));

    flags.set(LedId::Channel(ChannelId::Ch2), false);
    assert_eq!(bank.reconcile(LedId::Channel(ChannelId::Ch2), &flags), Ok(true));
    assert_eq!(bank.reconcile(LedId::Channel(ChannelId::Ch2), &flags), Ok(false));
    assert_eq!(bank.pins()[ChannelId::Ch2.as_index()].falling_edges, 1);
}

#[test]
fn each_channel_led_lights_exactly_once_per_cycle() {
    let flags = LedFlags::new();
    let mut bank = support::recording_bank();
    let mut acquisition = running(&flags, fast_config(1), ScriptedAdc::always(Ok(3)));

    // Two full rounds: four ticks per channel cycle.
    for tick in 0..32u64 {
        acquisition.tick(MockInstant::millis(tick * 10));
        bank.reconcile_all(&flags).expect("infallible pins");
    }

    for channel in [ChannelId::Ch0, ChannelId::Ch1, ChannelId::Ch2, ChannelId::Ch3] {
        let pin = &bank.pins()[channel.as_index()];
        assert_eq!(pin.rising_edges, 2, "{channel}");
        assert_eq!(pin.falling_edges, 2, "{channel}");
    }
}
