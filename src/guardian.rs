//! Saves radio power state when the machine goes to sleep and restores it on
//! unlock.
//!
//! The guardian is driven by two independent notification channels, one for
//! sleep/power-off and one for screen unlock. Each channel sees the guardian
//! only through its handler trait so the two subscriptions stay separate.

use tracing::{debug, info, info_span};

use crate::radio::{BluetoothControl, BluetoothPower, WifiControl};
use crate::retry::{RetryError, RetryPolicy, Sleeper, ThreadSleeper, WIFI_POWER_RETRY};

#[cfg(test)]
mod tests;
#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepEvent {
    WillSleep,
    WillPowerOff,
}

/// Receives events from the workspace lifecycle channel.
pub trait SleepHandler {
    fn on_sleep_or_power_off(&mut self, event: SleepEvent);
}

/// Receives events from the system-wide distributed channel.
pub trait UnlockHandler {
    fn on_unlock(&mut self);
}

/// Radio states captured immediately before the most recent sleep, or at
/// startup if no sleep has happened yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorPowerState {
    pub bluetooth: BluetoothPower,
    pub wifi: bool,
}

pub struct PowerStateGuardian<B, W, S = ThreadSleeper> {
    bluetooth: B,
    wifi: W,
    sleeper: S,
    wifi_retry: RetryPolicy,
    prior: PriorPowerState,
}

impl<B: BluetoothControl, W: WifiControl, S: Sleeper> PowerStateGuardian<B, W, S> {
    pub fn new(bluetooth: B, wifi: W, sleeper: S) -> Self {
        let prior = PriorPowerState {
            bluetooth: bluetooth.power_state(),
            wifi: wifi.is_powered_on(),
        };
        debug!(?prior, "captured startup radio baseline");
        Self {
            bluetooth,
            wifi,
            sleeper,
            wifi_retry: WIFI_POWER_RETRY,
            prior,
        }
    }

    pub fn prior(&self) -> PriorPowerState { self.prior }

    pub fn bluetooth(&self) -> &B { &self.bluetooth }

    pub fn wifi(&self) -> &W { &self.wifi }

    pub fn sleeper(&self) -> &S { &self.sleeper }

    pub fn sleep_or_power_off(&mut self) {
        self.prior.bluetooth = self.bluetooth.power_state();
        self.bluetooth.set_power_state(BluetoothPower::Off);

        self.prior.wifi = self.wifi.is_powered_on();
        self.set_wifi_power(false);

        info!(prior = ?self.prior, "radios disabled");
    }

    pub fn unlock(&self) {
        let prior = self.prior;
        if prior.bluetooth.is_on() {
            self.bluetooth.set_power_state(BluetoothPower::On);
        }
        if prior.wifi {
            self.set_wifi_power(true);
        }
        info!(?prior, "radios restored");
    }

    /// Toggles Wi-Fi, retrying transient failures. Gives up quietly once the
    /// retry budget is spent; the radio is left in whatever state it reached.
    pub fn set_wifi_power(&self, on: bool) {
        let res = self.wifi_retry.run(
            &self.sleeper,
            |_attempt| self.wifi.set_power(on),
            |_| true,
        );
        match res {
            Ok(()) => debug!(on, "wifi power set"),
            Err(RetryError::Exhausted { attempts, last }) => {
                debug!(on, attempts, "abandoning wifi power change: {last}");
            }
            Err(RetryError::Fatal { attempt, error }) => {
                debug!(on, attempt, "abandoning wifi power change: {error}");
            }
        }
    }
}

impl<B: BluetoothControl, W: WifiControl, S: Sleeper> SleepHandler for PowerStateGuardian<B, W, S> {
    fn on_sleep_or_power_off(&mut self, event: SleepEvent) {
        let span = info_span!("guardian::on_sleep_or_power_off", ?event);
        let _s = span.enter();
        self.sleep_or_power_off();
    }
}

impl<B: BluetoothControl, W: WifiControl, S: Sleeper> UnlockHandler for PowerStateGuardian<B, W, S> {
    fn on_unlock(&mut self) {
        let span = info_span!("guardian::on_unlock");
        let _s = span.enter();
        self.unlock();
    }
}
