use objc2::rc::Retained;
use objc2_core_wlan::{CWInterface, CWWiFiClient};
use tracing::{trace, warn};

use crate::radio::{TransientHardwareError, WifiControl};

/// The default Wi-Fi interface, looked up on every call since it can come and
/// go (e.g. while the driver restarts across sleep).
#[derive(Debug, Default)]
pub struct SystemWifi;

impl SystemWifi {
    fn interface(&self) -> Option<Retained<CWInterface>> {
        let client = unsafe { CWWiFiClient::sharedWiFiClient() };
        unsafe { client.interface() }
    }
}

impl WifiControl for SystemWifi {
    fn is_powered_on(&self) -> bool {
        match self.interface() {
            Some(iface) => unsafe { iface.powerOn() },
            None => {
                warn!("no Wi-Fi interface; treating as powered off");
                false
            }
        }
    }

    fn set_power(&self, on: bool) -> Result<(), TransientHardwareError> {
        let Some(iface) = self.interface() else {
            return Err(TransientHardwareError("no Wi-Fi interface".to_string()));
        };
        trace!(on, "setting wifi interface power");
        unsafe { iface.setPower_error(on) }
            .map_err(|err| TransientHardwareError(err.localizedDescription().to_string()))
    }
}
