//! Native side of the callback boundary.
//!
//! `#[repr(C)]` mirrors of the SDK structures that cross the boundary and
//! the `extern "C"` entry points the SDK invokes. The entry points copy
//! everything they need out of SDK memory, hand SDK-owned memory back to
//! the SDK when linked against it, and forward to
//! [`Dispatcher::global`]. Nothing is allowed to unwind into the SDK.

use std::{
   borrow::Cow,
   ffi::{CStr, c_char, c_int, c_uchar, c_ulong, c_ushort},
   panic::{self, AssertUnwindSafe},
   slice,
};

use log::error;
use smol_str::SmolStr;

#[cfg(feature = "extended-events")]
use crate::device::HidInput;
use crate::{
   boundary::dispatch::{Dispatcher, panic_message},
   device::{
      BatteryComponent, BatteryStatus, BatteryUnit, ConnectionType, DeviceId, DeviceInfo,
      DeviceListType, PairedDevice, PairingList,
   },
   sdk::codes::ErrorStatus,
};

/// Mirror of `Jabra_DeviceInfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawDeviceInfo {
   pub device_id: c_ushort,
   pub product_id: c_ushort,
   pub vendor_id: c_ushort,
   pub device_name: *mut c_char,
   pub usb_device_path: *mut c_char,
   pub parent_instance_id: *mut c_char,
   pub err_status: c_int,
   pub is_dongle: bool,
   pub dongle_name: *mut c_char,
   pub variant: *mut c_char,
   pub serial_number: *mut c_char,
   pub is_in_firmware_update_mode: bool,
   pub device_connection: c_int,
   pub connection_id: c_ulong,
   pub parent_device_id: c_ushort,
}

/// Mirror of `Jabra_BatteryStatusUnit`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawBatteryStatusUnit {
   pub level_in_percent: u8,
   pub component: c_int,
}

/// Mirror of `Jabra_BatteryStatus`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawBatteryStatus {
   pub level_in_percent: u8,
   pub charging: bool,
   pub battery_low: bool,
   pub component: c_int,
   pub extra_units_count: u32,
   pub extra_units: *mut RawBatteryStatusUnit,
}

/// Mirror of `Jabra_PairedDevice`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPairedDevice {
   pub device_name: *mut c_char,
   pub device_bt_addr: [u8; 6],
   pub is_connected: bool,
}

/// Mirror of `Jabra_PairingList`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPairingList {
   pub count: c_ushort,
   pub list_type: c_int,
   pub paired_device: *mut RawPairedDevice,
}

pub type FirstScanDoneFn = unsafe extern "C" fn();
pub type DeviceAttachedFn = unsafe extern "C" fn(RawDeviceInfo);
pub type DeviceRemovedFn = unsafe extern "C" fn(c_ushort);
pub type ButtonInRawHidFn = unsafe extern "C" fn(c_ushort, c_ushort, c_ushort, c_uchar);
pub type ButtonInTranslatedFn = unsafe extern "C" fn(c_ushort, c_int, bool);
pub type BatteryStatusUpdateFn = unsafe extern "C" fn(c_ushort, *mut RawBatteryStatus);

/// Copies a nullable C string. Invalid UTF-8 is replaced.
///
/// # Safety
/// `ptr` is null or points to a NUL-terminated string valid for the call.
unsafe fn copy_str(ptr: *const c_char) -> SmolStr {
   if ptr.is_null() {
      return SmolStr::default();
   }
   // SAFETY: checked for null above, validity is the caller's contract
   match unsafe { CStr::from_ptr(ptr) }.to_string_lossy() {
      Cow::Borrowed(s) => SmolStr::new(s),
      Cow::Owned(s) => SmolStr::from(s),
   }
}

impl RawDeviceInfo {
   /// Copies the descriptor into an owned [`DeviceInfo`].
   ///
   /// # Safety
   /// Every string pointer is null or a valid NUL-terminated string.
   pub unsafe fn to_owned_info(&self) -> DeviceInfo {
      // SAFETY: forwarded from the caller
      unsafe {
         DeviceInfo {
            id: DeviceId::new(self.device_id),
            product_id: self.product_id,
            vendor_id: self.vendor_id,
            name: copy_str(self.device_name),
            usb_device_path: copy_str(self.usb_device_path),
            parent_instance_id: copy_str(self.parent_instance_id),
            error_status: ErrorStatus::from_raw(self.err_status),
            is_dongle: self.is_dongle,
            dongle_name: copy_str(self.dongle_name),
            variant: copy_str(self.variant),
            serial_number: copy_str(self.serial_number),
            in_firmware_update_mode: self.is_in_firmware_update_mode,
            connection: ConnectionType::from_raw(self.device_connection),
            connection_id: u32::try_from(self.connection_id).unwrap_or(u32::MAX),
            parent_device_id: DeviceId::new(self.parent_device_id),
         }
      }
   }
}

impl RawBatteryStatus {
   /// Copies the status, including its extra units, into an owned value.
   ///
   /// # Safety
   /// `extra_units` is null or points to `extra_units_count` entries.
   pub unsafe fn to_owned_status(&self) -> BatteryStatus {
      let units: &[RawBatteryStatusUnit] =
         if self.extra_units.is_null() || self.extra_units_count == 0 {
            &[]
         } else {
            // SAFETY: non-null, length supplied alongside by the SDK
            unsafe { slice::from_raw_parts(self.extra_units, self.extra_units_count as usize) }
         };
      BatteryStatus {
         level: self.level_in_percent,
         charging: self.charging,
         low: self.battery_low,
         component: BatteryComponent::from_raw(self.component),
         extra_units: units
            .iter()
            .map(|u| BatteryUnit {
               level: u.level_in_percent,
               component: BatteryComponent::from_raw(u.component),
            })
            .collect(),
      }
   }
}

impl RawPairedDevice {
   /// Borrows `device` as the SDK expects it. The name pointer is only
   /// valid while `name` is alive.
   pub fn borrowed(device: &PairedDevice, name: &CStr) -> Self {
      Self {
         device_name: name.as_ptr().cast_mut(),
         device_bt_addr: device.address.octets(),
         is_connected: device.connected,
      }
   }
}

impl RawPairingList {
   /// Copies the list and its device names into an owned value.
   ///
   /// # Safety
   /// `paired_device` is null or points to `count` entries whose names are
   /// null or valid NUL-terminated strings.
   pub unsafe fn to_owned_list(&self) -> PairingList {
      let devices: &[RawPairedDevice] = if self.paired_device.is_null() {
         &[]
      } else {
         // SAFETY: non-null, sized by `count` per the caller's contract
         unsafe { slice::from_raw_parts(self.paired_device, usize::from(self.count)) }
      };
      PairingList {
         list_type: DeviceListType::from_raw(self.list_type),
         devices: devices
            .iter()
            .map(|d| PairedDevice {
               // SAFETY: forwarded from the caller
               name: unsafe { copy_str(d.device_name) },
               address: d.device_bt_addr.into(),
               connected: d.is_connected,
            })
            .collect(),
      }
   }
}

/// Runs a callback body, logging instead of unwinding into the SDK.
fn contain(what: &str, f: impl FnOnce()) {
   if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
      error!("Panic in {what} callback: {}", panic_message(payload.as_ref()));
   }
}

/// SDK callback: a device was attached.
///
/// # Safety
/// Called by the SDK with a descriptor whose strings stay valid for the
/// duration of the call.
#[unsafe(export_name = "deviceAttachedFunc")]
pub unsafe extern "C" fn device_attached_func(raw: RawDeviceInfo) {
   contain("device attached", || {
      // SAFETY: the SDK keeps the descriptor alive during the callback
      let info = unsafe { raw.to_owned_info() };
      release_device_info(raw);
      Dispatcher::global().device_attached(info);
   });
}

/// SDK callback: a device was removed.
#[unsafe(export_name = "deviceRemovedFunc")]
pub extern "C" fn device_removed_func(device_id: c_ushort) {
   contain("device removed", || {
      Dispatcher::global().device_removed(DeviceId::new(device_id));
   });
}

/// SDK callback: the initial device scan finished.
#[cfg(feature = "extended-events")]
#[unsafe(export_name = "firstScanForDevicesDone")]
pub extern "C" fn first_scan_done_func() {
   contain("first scan done", || Dispatcher::global().first_scan_done());
}

/// SDK callback: raw HID button data. The SDK passes the button state as
/// an `unsigned char`; any non-zero value means pressed.
#[cfg(feature = "extended-events")]
#[unsafe(export_name = "buttonInDataRawHidFunc")]
pub extern "C" fn button_in_raw_hid_func(
   device_id: c_ushort,
   usage_page: c_ushort,
   usage: c_ushort,
   button_in_data: c_uchar,
) {
   contain("raw button input", || {
      Dispatcher::global().button_input(
         DeviceId::new(device_id),
         usage_page,
         usage,
         button_in_data != 0,
      );
   });
}

/// SDK callback: translated button data.
#[cfg(feature = "extended-events")]
#[unsafe(export_name = "buttonInDataTranslatedFunc")]
pub extern "C" fn button_in_translated_func(
   device_id: c_ushort,
   translated_in_data: c_int,
   button_in_data: bool,
) {
   contain("translated button input", || {
      Dispatcher::global().button_input_translated(
         DeviceId::new(device_id),
         HidInput::from_raw(translated_in_data),
         button_in_data,
      );
   });
}

/// SDK callback: battery status changed. The status is owned by the SDK
/// until released.
///
/// # Safety
/// `status` is null or a valid status allocated by the SDK.
#[cfg(feature = "extended-events")]
#[unsafe(export_name = "batteryStatusUpdate")]
pub unsafe extern "C" fn battery_status_update_func(
   device_id: c_ushort,
   status: *mut RawBatteryStatus,
) {
   contain("battery status", || {
      // SAFETY: null or valid per the SDK contract
      let Some(raw) = (unsafe { status.as_ref() }) else {
         return;
      };
      // SAFETY: the SDK sizes extra_units by extra_units_count
      let owned = unsafe { raw.to_owned_status() };
      release_battery_status(status);
      Dispatcher::global().battery_status_update(DeviceId::new(device_id), owned);
   });
}

#[cfg(feature = "native")]
fn release_device_info(raw: RawDeviceInfo) {
   crate::sdk::native::free_device_info(raw);
}

/// Without the native SDK the caller owns the descriptor.
#[cfg(not(feature = "native"))]
fn release_device_info(_raw: RawDeviceInfo) {}

#[cfg(all(feature = "extended-events", feature = "native"))]
fn release_battery_status(status: *mut RawBatteryStatus) {
   crate::sdk::native::free_battery_status(status);
}

#[cfg(all(feature = "extended-events", not(feature = "native")))]
fn release_battery_status(_status: *mut RawBatteryStatus) {}

#[cfg(test)]
mod tests {
   use std::{ffi::CString, ptr};
   #[cfg(not(feature = "native"))]
   use std::sync::Arc;

   use super::*;
   #[cfg(not(feature = "native"))]
   use crate::boundary::{
      dispatch::tests::{Recorder, Seen},
      global_test_lock,
   };

   fn raw_info(id: u16, name: &CString, serial: &CString) -> RawDeviceInfo {
      RawDeviceInfo {
         device_id: id,
         product_id: 0x24b8,
         vendor_id: 0x0b0e,
         device_name: name.as_ptr().cast_mut(),
         usb_device_path: ptr::null_mut(),
         parent_instance_id: ptr::null_mut(),
         err_status: 18,
         is_dongle: false,
         dongle_name: ptr::null_mut(),
         variant: ptr::null_mut(),
         serial_number: serial.as_ptr().cast_mut(),
         is_in_firmware_update_mode: false,
         device_connection: 1,
         connection_id: 77,
         parent_device_id: 0,
      }
   }

   #[test]
   fn test_raw_device_info_conversion() {
      let name = CString::new("Evolve2 85").unwrap();
      let serial = CString::new("0123ABCD").unwrap();
      let raw = raw_info(9, &name, &serial);

      let info = unsafe { raw.to_owned_info() };
      assert_eq!(info.id, DeviceId::new(9));
      assert_eq!(info.product_id, 0x24b8);
      assert_eq!(info.vendor_id, 0x0b0e);
      assert_eq!(info.name, "Evolve2 85");
      assert_eq!(info.serial_number, "0123ABCD");
      assert!(info.usb_device_path.is_empty());
      assert!(info.dongle_name.is_empty());
      assert_eq!(info.error_status, ErrorStatus::DeviceNotReady);
      assert_eq!(info.connection, ConnectionType::Bluetooth);
      assert_eq!(info.connection_id, 77);
   }

   #[test]
   fn test_invalid_utf8_is_replaced() {
      let name = CString::new(vec![b'J', 0xff, b'X']).unwrap();
      let serial = CString::new("").unwrap();
      let raw = raw_info(1, &name, &serial);
      let info = unsafe { raw.to_owned_info() };
      assert_eq!(info.name, "J\u{fffd}X");
   }

   #[test]
   fn test_raw_pairing_list_conversion() {
      let phone = CString::new("Pixel 8").unwrap();
      let mut devices = [
         RawPairedDevice {
            device_name: phone.as_ptr().cast_mut(),
            device_bt_addr: [0x50, 0xc2, 0xed, 1, 2, 3],
            is_connected: true,
         },
         RawPairedDevice {
            device_name: ptr::null_mut(),
            device_bt_addr: [0; 6],
            is_connected: false,
         },
      ];
      let raw = RawPairingList {
         count: 2,
         list_type: 1,
         paired_device: devices.as_mut_ptr(),
      };

      let list = unsafe { raw.to_owned_list() };
      assert_eq!(list.list_type, DeviceListType::PairedDevices);
      assert_eq!(list.len(), 2);
      assert_eq!(list.devices[0].name, "Pixel 8");
      assert_eq!(list.devices[0].address.to_string(), "50:C2:ED:01:02:03");
      assert!(list.devices[0].connected);
      assert!(list.devices[1].name.is_empty());

      let none = RawPairingList {
         count: 4,
         list_type: 9,
         paired_device: ptr::null_mut(),
      };
      let list = unsafe { none.to_owned_list() };
      assert!(list.is_empty());
      assert_eq!(list.list_type, DeviceListType::Unknown);

      let name = CString::new("Pixel 8").unwrap();
      let borrowed = RawPairedDevice::borrowed(&PairedDevice::new("Pixel 8", [7; 6]), &name);
      assert_eq!(borrowed.device_bt_addr, [7; 6]);
      assert!(!borrowed.is_connected);
   }

   #[test]
   fn test_raw_battery_conversion() {
      let mut units = [
         RawBatteryStatusUnit {
            level_in_percent: 40,
            component: 3,
         },
         RawBatteryStatusUnit {
            level_in_percent: 45,
            component: 5,
         },
      ];
      let raw = RawBatteryStatus {
         level_in_percent: 42,
         charging: true,
         battery_low: false,
         component: 4,
         extra_units_count: units.len() as u32,
         extra_units: units.as_mut_ptr(),
      };

      let status = unsafe { raw.to_owned_status() };
      assert_eq!(status.level, 42);
      assert!(status.charging);
      assert_eq!(status.component, BatteryComponent::Left);
      assert_eq!(status.extra_units.len(), 2);
      assert_eq!(status.extra_units[1].level, 45);
      assert_eq!(status.extra_units[1].component, BatteryComponent::Cradle);

      let empty = RawBatteryStatus {
         extra_units: ptr::null_mut(),
         extra_units_count: 3,
         ..raw
      };
      assert!(unsafe { empty.to_owned_status() }.extra_units.is_empty());
   }

   // Linked against the SDK, the trampolines free what they are handed.
   #[cfg(not(feature = "native"))]
   #[test]
   fn test_trampolines_reach_global_listeners() {
      let _lock = global_test_lock();
      let recorder = Arc::new(Recorder::default());
      let handle = Dispatcher::global().register(recorder.clone());

      let name = CString::new("Speak 750").unwrap();
      let serial = CString::new("S750").unwrap();
      unsafe { device_attached_func(raw_info(901, &name, &serial)) };
      unsafe { device_attached_func(raw_info(902, &name, &serial)) };
      device_removed_func(901);
      device_removed_func(901);
      device_removed_func(902);

      assert_eq!(
         recorder.seen(),
         vec![
            Seen::Attached(901),
            Seen::Attached(902),
            Seen::Removed(901),
            Seen::Removed(902),
         ]
      );
      drop(handle);

      unsafe { device_attached_func(raw_info(903, &name, &serial)) };
      assert_eq!(recorder.seen().len(), 4);
      Dispatcher::global().detach_all();
   }

   #[cfg(all(feature = "extended-events", not(feature = "native")))]
   #[test]
   fn test_extended_trampolines() {
      let _lock = global_test_lock();
      let recorder = Arc::new(Recorder::default());
      let _handle = Dispatcher::global().register_extended(recorder.clone());

      let name = CString::new("Evolve 75").unwrap();
      let serial = CString::new("E75").unwrap();
      unsafe { device_attached_func(raw_info(911, &name, &serial)) };
      button_in_translated_func(911, 2, true);
      button_in_translated_func(911, 2, false);

      let mut raw = RawBatteryStatus {
         level_in_percent: 64,
         charging: false,
         battery_low: false,
         component: 1,
         extra_units_count: 0,
         extra_units: ptr::null_mut(),
      };
      unsafe { battery_status_update_func(911, &mut raw) };
      unsafe { battery_status_update_func(911, ptr::null_mut()) };
      first_scan_done_func();
      device_removed_func(911);

      assert_eq!(
         recorder.seen(),
         vec![
            Seen::Attached(911),
            Seen::Button(911, HidInput::Mute, true),
            Seen::Button(911, HidInput::Mute, false),
            Seen::Battery(911, 64),
            Seen::FirstScan,
            Seen::Removed(911),
         ]
      );
   }

   #[cfg(all(feature = "extended-events", not(feature = "native")))]
   #[test]
   fn test_raw_button_state_is_a_byte() {
      let _lock = global_test_lock();
      let recorder = Arc::new(Recorder::default());
      let _handle = Dispatcher::global().register_extended(recorder.clone());

      let name = CString::new("Engage 75").unwrap();
      let serial = CString::new("EN75").unwrap();
      unsafe { device_attached_func(raw_info(921, &name, &serial)) };
      button_in_raw_hid_func(921, 0x0b, 0x20, 2);
      button_in_raw_hid_func(921, 0x0b, 0x20, 0);
      button_in_raw_hid_func(921, 0x0b, 0x2f, 0xff);
      device_removed_func(921);

      assert_eq!(
         recorder.seen(),
         vec![
            Seen::Attached(921),
            Seen::RawButton(921, 0x0b, 0x20, true),
            Seen::RawButton(921, 0x0b, 0x20, false),
            Seen::RawButton(921, 0x0b, 0x2f, true),
            Seen::Removed(921),
         ]
      );
   }
}
