pub mod service;

#[cfg(target_os = "macos")]
pub mod bluetooth;
#[cfg(target_os = "macos")]
pub mod lifecycle;
#[cfg(target_os = "macos")]
pub mod wifi;
