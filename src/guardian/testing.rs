use std::cell::{Cell, RefCell};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::radio::{BluetoothControl, BluetoothPower, TransientHardwareError, WifiControl};
use crate::retry::Sleeper;

#[derive(Debug, Default)]
pub struct FakeBluetooth {
    state: Cell<BluetoothPower>,
    sets: RefCell<Vec<BluetoothPower>>,
}

impl FakeBluetooth {
    pub fn new(state: BluetoothPower) -> Self {
        Self { state: Cell::new(state), ..Default::default() }
    }

    /// Changes the hardware state behind the guardian's back.
    pub fn flip_to(&self, state: BluetoothPower) { self.state.set(state) }

    pub fn state(&self) -> BluetoothPower { self.state.get() }

    pub fn sets(&self) -> Vec<BluetoothPower> { self.sets.borrow().clone() }

    pub fn count(&self, state: BluetoothPower) -> usize {
        self.sets.borrow().iter().filter(|s| **s == state).count()
    }

    pub fn clear(&self) { self.sets.borrow_mut().clear() }
}

impl BluetoothControl for FakeBluetooth {
    fn power_state(&self) -> BluetoothPower { self.state.get() }

    fn set_power_state(&self, state: BluetoothPower) {
        self.sets.borrow_mut().push(state);
        self.state.set(state);
    }
}

#[derive(Debug, Default)]
pub struct FakeWifi {
    powered: Cell<bool>,
    failures_remaining: Cell<u32>,
    attempts: RefCell<Vec<bool>>,
}

impl FakeWifi {
    pub fn new(powered: bool) -> Self {
        Self { powered: Cell::new(powered), ..Default::default() }
    }

    /// The next `n` calls to `set_power` fail without changing state.
    pub fn fail_next(&self, n: u32) { self.failures_remaining.set(n) }

    pub fn flip_to(&self, powered: bool) { self.powered.set(powered) }

    pub fn powered(&self) -> bool { self.powered.get() }

    pub fn attempts(&self) -> Vec<bool> { self.attempts.borrow().clone() }

    pub fn count(&self, on: bool) -> usize {
        self.attempts.borrow().iter().filter(|a| **a == on).count()
    }

    pub fn clear(&self) { self.attempts.borrow_mut().clear() }
}

impl WifiControl for FakeWifi {
    fn is_powered_on(&self) -> bool { self.powered.get() }

    fn set_power(&self, on: bool) -> Result<(), TransientHardwareError> {
        self.attempts.borrow_mut().push(on);
        let remaining = self.failures_remaining.get();
        if remaining > 0 {
            self.failures_remaining.set(remaining - 1);
            return Err(TransientHardwareError("interface busy".to_string()));
        }
        self.powered.set(on);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimulatedClock {
    elapsed: Cell<Duration>,
}

impl SimulatedClock {
    pub fn elapsed(&self) -> Duration { self.elapsed.get() }
}

impl Sleeper for SimulatedClock {
    fn sleep(&self, duration: Duration) { self.elapsed.set(self.elapsed.get() + duration) }
}

/// Collects the level of every event emitted while installed as a layer.
#[derive(Debug, Clone, Default)]
pub struct LevelRecorder(Arc<Mutex<Vec<Level>>>);

impl LevelRecorder {
    pub fn levels(&self) -> Vec<Level> {
        self.0.lock().map(|levels| levels.clone()).unwrap_or_default()
    }
}

impl<S: Subscriber> Layer<S> for LevelRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if let Ok(mut levels) = self.0.lock() {
            levels.push(*event.metadata().level());
        }
    }
}
