//! Callback contracts the host implements.

use crate::device::{DeviceId, DeviceInfo};
#[cfg(feature = "extended-events")]
use crate::device::{BatteryStatus, HidInput};

/// Receives device attach/remove notifications from the SDK.
///
/// Calls arrive on threads owned by the SDK, possibly concurrently with
/// each other and with the rest of the host, so implementations carry
/// their own synchronization. They must return promptly: a blocked
/// callback stalls further event delivery. There is no error channel;
/// failures are handled (and logged) inside the implementation.
pub trait DeviceEventListener: Send + Sync {
   /// A supported device connected. `info` is owned by the listener.
   fn on_device_attached(&self, info: DeviceInfo);

   /// A previously attached device disconnected.
   fn on_device_removed(&self, id: DeviceId);
}

/// Optional notifications beyond attach/remove.
///
/// Every method defaults to a no-op so implementors only pick what they
/// need.
#[cfg(feature = "extended-events")]
pub trait ExtendedDeviceEventListener: DeviceEventListener {
   /// Raw HID report pass-through.
   fn on_button_input(&self, _id: DeviceId, _usage_page: u16, _usage: u16, _pressed: bool) {}

   /// Button event decoded by the SDK.
   fn on_button_input_translated(&self, _id: DeviceId, _input: HidInput, _pressed: bool) {}

   fn on_battery_status_update(&self, _id: DeviceId, _status: BatteryStatus) {}

   /// The SDK finished its initial device scan.
   fn on_first_scan_done(&self) {}
}
