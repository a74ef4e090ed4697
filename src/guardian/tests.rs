use std::time::Duration;

use pretty_assertions::assert_eq;
use test_log::test;

use super::testing::*;
use super::*;

type TestGuardian = PowerStateGuardian<FakeBluetooth, FakeWifi, SimulatedClock>;

fn guardian(bluetooth: BluetoothPower, wifi: bool) -> TestGuardian {
    PowerStateGuardian::new(
        FakeBluetooth::new(bluetooth),
        FakeWifi::new(wifi),
        SimulatedClock::default(),
    )
}

#[test]
fn startup_captures_current_hardware_state() {
    let g = guardian(BluetoothPower::On, false);
    assert_eq!(
        g.prior(),
        PriorPowerState { bluetooth: BluetoothPower::On, wifi: false }
    );
    assert!(g.bluetooth().sets().is_empty());
    assert!(g.wifi().attempts().is_empty());
}

#[test]
fn sleep_then_unlock_round_trips_every_combination() {
    for bluetooth in [BluetoothPower::Off, BluetoothPower::On] {
        for wifi in [false, true] {
            let mut g = guardian(bluetooth, wifi);
            g.on_sleep_or_power_off(SleepEvent::WillSleep);
            assert_eq!(g.bluetooth().state(), BluetoothPower::Off);
            assert!(!g.wifi().powered());

            g.on_unlock();
            assert_eq!(g.bluetooth().state(), bluetooth, "bluetooth={bluetooth:?} wifi={wifi}");
            assert_eq!(g.wifi().powered(), wifi, "bluetooth={bluetooth:?} wifi={wifi}");
        }
    }
}

#[test]
fn both_on_disables_then_restores_once_each() {
    let mut g = guardian(BluetoothPower::On, true);

    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    assert_eq!(g.bluetooth().sets(), vec![BluetoothPower::Off]);
    assert_eq!(g.wifi().attempts(), vec![false]);

    g.bluetooth().clear();
    g.wifi().clear();

    g.on_unlock();
    assert_eq!(g.bluetooth().sets(), vec![BluetoothPower::On]);
    assert_eq!(g.wifi().attempts(), vec![true]);
}

#[test]
fn both_off_still_disables_but_never_powers_on() {
    let mut g = guardian(BluetoothPower::Off, false);

    g.on_sleep_or_power_off(SleepEvent::WillPowerOff);
    assert_eq!(g.bluetooth().sets(), vec![BluetoothPower::Off]);
    assert_eq!(g.wifi().attempts(), vec![false]);

    g.on_unlock();
    assert_eq!(g.bluetooth().count(BluetoothPower::On), 0);
    assert_eq!(g.wifi().count(true), 0);
}

#[test]
fn radio_that_was_off_is_left_alone_on_unlock() {
    let mut g = guardian(BluetoothPower::On, false);
    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    g.on_unlock();
    assert_eq!(g.bluetooth().count(BluetoothPower::On), 1);
    assert_eq!(g.wifi().count(true), 0);

    let mut g = guardian(BluetoothPower::Off, true);
    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    g.on_unlock();
    assert_eq!(g.bluetooth().count(BluetoothPower::On), 0);
    assert_eq!(g.wifi().count(true), 1);
}

#[test]
fn each_sleep_rereads_hardware_state() {
    let mut g = guardian(BluetoothPower::On, true);
    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    assert_eq!(
        g.prior(),
        PriorPowerState { bluetooth: BluetoothPower::On, wifi: true }
    );

    // Radios stay off through a wake that never reaches unlock; the next
    // sleep must see that, not the earlier capture.
    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    assert_eq!(
        g.prior(),
        PriorPowerState { bluetooth: BluetoothPower::Off, wifi: false }
    );

    g.bluetooth().flip_to(BluetoothPower::On);
    g.on_sleep_or_power_off(SleepEvent::WillPowerOff);
    assert_eq!(
        g.prior(),
        PriorPowerState { bluetooth: BluetoothPower::On, wifi: false }
    );
}

#[test]
fn unlock_without_sleep_uses_startup_baseline() {
    let mut g = guardian(BluetoothPower::On, true);
    g.on_unlock();
    assert_eq!(g.bluetooth().sets(), vec![BluetoothPower::On]);
    assert_eq!(g.wifi().attempts(), vec![true]);

    let mut g = guardian(BluetoothPower::Off, false);
    g.on_unlock();
    assert!(g.bluetooth().sets().is_empty());
    assert!(g.wifi().attempts().is_empty());
}

#[test]
fn unlock_does_not_touch_prior_state() {
    let mut g = guardian(BluetoothPower::On, true);
    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    let before = g.prior();
    g.bluetooth().flip_to(BluetoothPower::Off);
    g.wifi().flip_to(false);
    g.on_unlock();
    assert_eq!(g.prior(), before);
}

#[test]
fn manual_toggle_while_awake_is_not_observed() {
    let mut g = guardian(BluetoothPower::On, true);
    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    g.on_unlock();

    // The user turns Bluetooth off by hand, then unlocks again without an
    // intervening sleep: the stale capture wins.
    g.bluetooth().flip_to(BluetoothPower::Off);
    g.bluetooth().clear();
    g.on_unlock();
    assert_eq!(g.bluetooth().sets(), vec![BluetoothPower::On]);
}

#[test]
fn wifi_restore_succeeds_after_transient_failures() {
    let mut g = guardian(BluetoothPower::Off, true);
    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    g.wifi().clear();
    let slept_before = g.sleeper().elapsed();

    g.wifi().fail_next(3);
    g.on_unlock();

    assert_eq!(g.wifi().attempts(), vec![true; 4]);
    assert_eq!(g.sleeper().elapsed() - slept_before, Duration::from_millis(300));
    assert!(g.wifi().powered());
}

#[test]
fn wifi_restore_is_abandoned_after_ten_failures() {
    let mut g = guardian(BluetoothPower::Off, true);
    g.on_sleep_or_power_off(SleepEvent::WillSleep);
    g.wifi().clear();

    g.wifi().fail_next(u32::MAX);
    g.on_unlock();

    assert_eq!(g.wifi().attempts(), vec![true; 10]);
    assert!(!g.wifi().powered());
    assert_eq!(g.sleeper().elapsed(), Duration::from_millis(1000));
}

#[test]
fn abandoned_wifi_change_is_not_reported_above_debug() {
    use tracing_subscriber::layer::SubscriberExt;

    let recorder = LevelRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    let g = guardian(BluetoothPower::Off, false);
    g.wifi().fail_next(u32::MAX);

    tracing::subscriber::with_default(subscriber, || g.set_wifi_power(true));

    let levels = recorder.levels();
    assert!(levels.contains(&tracing::Level::DEBUG), "{levels:?}");
    assert!(
        !levels.contains(&tracing::Level::WARN) && !levels.contains(&tracing::Level::ERROR),
        "{levels:?}"
    );
    assert_eq!(g.wifi().attempts().len(), 10);
}

#[test]
fn set_wifi_power_stops_at_first_success() {
    for failures in 0..10 {
        let g = guardian(BluetoothPower::Off, false);
        g.wifi().fail_next(failures);
        g.set_wifi_power(true);
        assert_eq!(g.wifi().attempts().len(), failures as usize + 1);
        assert!(g.wifi().powered());
    }
}

#[test]
fn failed_disable_does_not_block_bluetooth_or_capture() {
    let mut g = guardian(BluetoothPower::On, true);
    g.wifi().fail_next(u32::MAX);
    g.on_sleep_or_power_off(SleepEvent::WillSleep);

    assert_eq!(g.bluetooth().sets(), vec![BluetoothPower::Off]);
    assert_eq!(g.wifi().count(false), 10);
    assert!(g.wifi().powered());
    assert_eq!(
        g.prior(),
        PriorPowerState { bluetooth: BluetoothPower::On, wifi: true }
    );
}
