//! The seam between the device SDK and host code.
//!
//! The SDK reports hardware events through C callbacks. This module
//! defines the Rust listener contracts, the native entry points and the
//! dispatcher that connects the two.

pub mod dispatch;
pub mod ffi;
pub mod listener;

#[cfg(feature = "extended-events")]
pub use dispatch::register_extended_listener;
pub use dispatch::{Dispatcher, ListenerHandle, register_listener};
#[cfg(feature = "extended-events")]
pub use listener::ExtendedDeviceEventListener;
pub use listener::DeviceEventListener;

/// Serializes tests that go through the process-wide dispatcher.
#[cfg(test)]
pub(crate) fn global_test_lock() -> parking_lot::MutexGuard<'static, ()> {
   static LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
   LOCK.lock()
}
