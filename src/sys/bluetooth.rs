use tracing::trace;

use crate::radio::{BluetoothControl, BluetoothPower};

// Private but long-standing IOBluetooth entry points used by blueutil and
// friends. There is no public API for toggling the controller.
#[link(name = "IOBluetooth", kind = "framework")]
unsafe extern "C" {
    fn IOBluetoothPreferenceGetControllerPowerState() -> i32;
    fn IOBluetoothPreferenceSetControllerPowerState(state: i32);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBluetooth;

impl BluetoothControl for SystemBluetooth {
    fn power_state(&self) -> BluetoothPower {
        BluetoothPower::from_raw(unsafe { IOBluetoothPreferenceGetControllerPowerState() })
    }

    fn set_power_state(&self, state: BluetoothPower) {
        trace!(?state, "setting bluetooth controller power");
        unsafe { IOBluetoothPreferenceSetControllerPowerState(state.as_raw()) }
    }
}
