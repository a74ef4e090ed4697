//! Power-state types and the control seams for the two radios.
//!
//! The host implementations live in `sys::bluetooth` and `sys::wifi`; tests
//! substitute fakes from `guardian::testing`.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BluetoothPower {
    #[default]
    Off,
    On,
}

impl BluetoothPower {
    /// IOBluetooth reports the controller state as an integer; anything
    /// non-zero means powered.
    pub fn from_raw(raw: i32) -> Self {
        if raw != 0 { BluetoothPower::On } else { BluetoothPower::Off }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            BluetoothPower::Off => 0,
            BluetoothPower::On => 1,
        }
    }

    pub fn is_on(self) -> bool { self == BluetoothPower::On }
}

impl From<bool> for BluetoothPower {
    fn from(on: bool) -> Self {
        if on { BluetoothPower::On } else { BluetoothPower::Off }
    }
}

/// The only failure the radios report: the Wi-Fi driver was busy (or the
/// interface was briefly unavailable) and the toggle did not take.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transient hardware error: {0}")]
pub struct TransientHardwareError(pub String);

pub trait BluetoothControl {
    fn power_state(&self) -> BluetoothPower;

    /// Fire-and-forget; the controller applies the change asynchronously and
    /// never reports failure.
    fn set_power_state(&self, state: BluetoothPower);
}

pub trait WifiControl {
    fn is_powered_on(&self) -> bool;

    fn set_power(&self, on: bool) -> Result<(), TransientHardwareError>;
}
