//! Turns Bluetooth and Wi-Fi off when the Mac sleeps and back on at unlock.

pub mod common;
pub mod guardian;
pub mod radio;
pub mod retry;
pub mod sys;
#[cfg(target_os = "macos")]
pub mod ui;
