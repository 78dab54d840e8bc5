//! Binding to the vendor SDK (`libjabra`).
//!
//! Only the calls the host needs are declared. The SDK is process-global,
//! so [`NativeSdk`] enforces a single live session.
//!
//! Pairing calls take the dongle's id and, where they act on one paired
//! device, a descriptor borrowed from the owned [`PairedDevice`].

use std::{
   ffi::{CStr, CString, c_char, c_int, c_ushort, c_void},
   ptr,
   slice,
   sync::atomic::{AtomicBool, Ordering},
};

use log::{error, info};
use smol_str::SmolStr;

#[cfg(feature = "extended-events")]
use crate::boundary::ffi::{ButtonInRawHidFn, ButtonInTranslatedFn, FirstScanDoneFn};
use crate::{
   boundary::{
      Dispatcher,
      ffi::{
         self, BatteryStatusUpdateFn, DeviceAttachedFn, DeviceRemovedFn, RawBatteryStatus,
         RawDeviceInfo, RawPairedDevice, RawPairingList,
      },
   },
   config::Config,
   device::{BatteryStatus, DeviceId, DeviceListType, FeatureSet, PairedDevice, PairingList},
   error::{JlinkError, Result},
   sdk::{DeviceSdk, codes},
};

const VERSION_BUFFER_LEN: usize = 16;

#[cfg(not(feature = "extended-events"))]
type FirstScanDoneFn = unsafe extern "C" fn();
#[cfg(not(feature = "extended-events"))]
type ButtonInRawHidFn = unsafe extern "C" fn(c_ushort, c_ushort, c_ushort, u8);
#[cfg(not(feature = "extended-events"))]
type ButtonInTranslatedFn = unsafe extern "C" fn(c_ushort, c_int, bool);

#[link(name = "jabra")]
unsafe extern "C" {
   fn Jabra_SetAppID(app_id: *const c_char);
   fn Jabra_InitializeV2(
      first_scan_done: Option<FirstScanDoneFn>,
      attached: Option<DeviceAttachedFn>,
      removed: Option<DeviceRemovedFn>,
      button_raw: Option<ButtonInRawHidFn>,
      button_translated: Option<ButtonInTranslatedFn>,
      non_jabra_device_detection: bool,
      config_params: *mut c_void,
   ) -> bool;
   fn Jabra_Uninitialize() -> bool;
   fn Jabra_GetVersion(version: *mut c_char, count: c_int) -> c_int;
   fn Jabra_GetBatteryStatusV2(device_id: c_ushort, status: *mut *mut RawBatteryStatus) -> c_int;
   fn Jabra_FreeBatteryStatus(status: *mut RawBatteryStatus);
   fn Jabra_GetSupportedFeatures(device_id: c_ushort, count: *mut u32) -> *const u32;
   fn Jabra_FreeSupportedFeatures(features: *const u32);
   fn Jabra_FreeDeviceInfo(info: RawDeviceInfo);
   fn Jabra_RegisterBatteryStatusUpdateCallbackV2(callback: Option<BatteryStatusUpdateFn>);
   fn Jabra_GetSupportedDeviceEvents(device_id: c_ushort) -> u32;
   fn Jabra_FactoryReset(device_id: c_ushort) -> c_int;

   fn Jabra_GetPairingList(device_id: c_ushort) -> *mut RawPairingList;
   fn Jabra_GetSearchDeviceList(device_id: c_ushort) -> *mut RawPairingList;
   fn Jabra_FreePairingList(list: *mut RawPairingList);
   fn Jabra_ClearPairingList(device_id: c_ushort) -> c_int;
   fn Jabra_GetAutoPairing(device_id: c_ushort) -> bool;
   fn Jabra_SetAutoPairing(device_id: c_ushort, value: bool) -> c_int;
   fn Jabra_ConnectPairedDevice(device_id: c_ushort, device: *mut RawPairedDevice) -> c_int;
   fn Jabra_DisConnectPairedDevice(device_id: c_ushort, device: *mut RawPairedDevice) -> c_int;
   fn Jabra_ClearPairedDevice(device_id: c_ushort, device: *mut RawPairedDevice) -> c_int;
   fn Jabra_ConnectNewDevice(device_id: c_ushort, device: *mut RawPairedDevice) -> c_int;
   fn Jabra_SetBTPairing(device_id: c_ushort) -> c_int;
   fn Jabra_StopBTPairing(device_id: c_ushort) -> c_int;
   fn Jabra_SearchNewDevices(device_id: c_ushort) -> c_int;
   fn Jabra_ConnectBTDevice(device_id: c_ushort) -> c_int;
   fn Jabra_DisconnectBTDevice(device_id: c_ushort) -> c_int;
}

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Returns a descriptor handed over in the attach callback to the SDK.
pub(crate) fn free_device_info(info: RawDeviceInfo) {
   // SAFETY: `info` came from the SDK's attach callback and is freed once
   unsafe { Jabra_FreeDeviceInfo(info) }
}

pub(crate) fn free_battery_status(status: *mut RawBatteryStatus) {
   if !status.is_null() {
      // SAFETY: non-null status allocated by the SDK, freed once
      unsafe { Jabra_FreeBatteryStatus(status) }
   }
}

/// Copies a list returned by the SDK and frees it. Null yields `None`.
fn take_pairing_list(raw: *mut RawPairingList) -> Option<PairingList> {
   // SAFETY: null or a list allocated by the SDK
   let list = unsafe { raw.as_ref() }?;
   // SAFETY: the SDK sizes the device array by `count`
   let owned = unsafe { list.to_owned_list() };
   // SAFETY: allocated by the SDK, freed once
   unsafe { Jabra_FreePairingList(raw) };
   Some(owned)
}

/// Runs a call that takes one paired device descriptor.
fn with_paired_device(
   device: &PairedDevice,
   call: impl FnOnce(*mut RawPairedDevice) -> c_int,
) -> Result<()> {
   let name = CString::new(device.name.as_str())?;
   let mut raw = RawPairedDevice::borrowed(device, &name);
   codes::check(call(&mut raw))
}

/// A live SDK session. Uninitializes the SDK when dropped.
pub struct NativeSdk {
   // The SDK keeps the pointer passed to `Jabra_SetAppID`.
   _app_id: CString,
   active: bool,
}

impl NativeSdk {
   /// Registers the app id and the callback entry points, then starts the
   /// SDK's device scan. Fails with [`JlinkError::SessionActive`] while
   /// another session is alive.
   pub fn start(config: &Config) -> Result<Self> {
      let app_id = CString::new(config.app_id.as_str())?;
      if SESSION_ACTIVE.swap(true, Ordering::AcqRel) {
         return Err(JlinkError::SessionActive);
      }

      // SAFETY: `app_id` is stored in the session and outlives the SDK's use
      unsafe { Jabra_SetAppID(app_id.as_ptr()) };

      #[cfg(feature = "extended-events")]
      let (first_scan_done, button_raw, button_translated) = (
         Some(ffi::first_scan_done_func as FirstScanDoneFn),
         Some(ffi::button_in_raw_hid_func as ButtonInRawHidFn),
         Some(ffi::button_in_translated_func as ButtonInTranslatedFn),
      );
      #[cfg(not(feature = "extended-events"))]
      let (first_scan_done, button_raw, button_translated) = (None, None, None);

      // SAFETY: every callback is an `extern "C"` entry point that never
      // unwinds; the config pointer may be null
      let initialized = unsafe {
         Jabra_InitializeV2(
            first_scan_done,
            Some(ffi::device_attached_func as DeviceAttachedFn),
            Some(ffi::device_removed_func as DeviceRemovedFn),
            button_raw,
            button_translated,
            config.non_jabra_device_detection,
            ptr::null_mut(),
         )
      };
      if !initialized {
         SESSION_ACTIVE.store(false, Ordering::Release);
         return Err(JlinkError::SdkInit);
      }

      #[cfg(feature = "extended-events")]
      if config.battery_callback {
         // SAFETY: registers a non-unwinding `extern "C"` entry point
         unsafe {
            Jabra_RegisterBatteryStatusUpdateCallbackV2(Some(
               ffi::battery_status_update_func as BatteryStatusUpdateFn,
            ));
         }
         info!("Battery status callback registered");
      }

      info!("Device SDK initialized as {:?}", config.app_id);
      Ok(Self {
         _app_id: app_id,
         active: true,
      })
   }

   /// Uninitializes the SDK, reporting failure instead of only logging it.
   pub fn stop(mut self) -> Result<()> {
      self.shutdown()
   }

   fn shutdown(&mut self) -> Result<()> {
      if !std::mem::replace(&mut self.active, false) {
         return Ok(());
      }
      // SAFETY: the session owns the initialized SDK
      let ok = unsafe { Jabra_Uninitialize() };
      // No more callbacks arrive; listeners see every device go away.
      Dispatcher::global().detach_all();
      SESSION_ACTIVE.store(false, Ordering::Release);
      if ok {
         info!("Device SDK uninitialized");
         Ok(())
      } else {
         Err(JlinkError::SdkUninit)
      }
   }
}

impl Drop for NativeSdk {
   fn drop(&mut self) {
      if let Err(e) = self.shutdown() {
         error!("{e}");
      }
   }
}

impl DeviceSdk for NativeSdk {
   fn version(&self) -> Result<SmolStr> {
      let mut buf = [0u8; VERSION_BUFFER_LEN];
      // SAFETY: the SDK writes at most `VERSION_BUFFER_LEN` bytes
      codes::check(unsafe {
         Jabra_GetVersion(buf.as_mut_ptr().cast::<c_char>(), VERSION_BUFFER_LEN as c_int)
      })?;
      let version = CStr::from_bytes_until_nul(&buf).map_err(|_| JlinkError::NoData)?;
      Ok(SmolStr::new(version.to_string_lossy()))
   }

   fn battery_status(&self, id: DeviceId) -> Result<BatteryStatus> {
      let mut raw: *mut RawBatteryStatus = ptr::null_mut();
      // SAFETY: out-pointer to a local
      codes::check(unsafe { Jabra_GetBatteryStatusV2(id.get(), &mut raw) })?;
      // SAFETY: on success the SDK hands over a valid status or null
      let Some(status) = (unsafe { raw.as_ref() }) else {
         return Err(JlinkError::NoData);
      };
      // SAFETY: extra units are sized by the SDK
      let owned = unsafe { status.to_owned_status() };
      free_battery_status(raw);
      Ok(owned)
   }

   fn supported_features(&self, id: DeviceId) -> Result<FeatureSet> {
      let mut count = 0u32;
      // SAFETY: out-pointer to a local
      let features = unsafe { Jabra_GetSupportedFeatures(id.get(), &mut count) };
      if features.is_null() {
         return Ok(FeatureSet::empty());
      }
      // SAFETY: the SDK returns `count` feature codes
      let set = FeatureSet::from_codes(unsafe { slice::from_raw_parts(features, count as usize) });
      // SAFETY: allocated by the SDK above, freed once
      unsafe { Jabra_FreeSupportedFeatures(features) };
      Ok(set)
   }

   fn device_events_mask(&self, id: DeviceId) -> Result<u32> {
      // SAFETY: plain query by id
      Ok(unsafe { Jabra_GetSupportedDeviceEvents(id.get()) })
   }

   fn factory_reset(&self, id: DeviceId) -> Result<()> {
      // SAFETY: plain command by id
      codes::check(unsafe { Jabra_FactoryReset(id.get()) })?;
      info!("Factory reset of device {id} requested");
      Ok(())
   }

   fn pairing_list(&self, dongle: DeviceId) -> Result<PairingList> {
      // SAFETY: plain query by id, the result is handed to `take_pairing_list`
      let list = take_pairing_list(unsafe { Jabra_GetPairingList(dongle.get()) });
      Ok(list.unwrap_or_else(|| PairingList::new(DeviceListType::Unknown, Vec::new())))
   }

   fn clear_pairing_list(&self, dongle: DeviceId) -> Result<()> {
      // SAFETY: plain command by id
      codes::check(unsafe { Jabra_ClearPairingList(dongle.get()) })
   }

   fn auto_pairing(&self, dongle: DeviceId) -> Result<bool> {
      // SAFETY: plain query by id
      Ok(unsafe { Jabra_GetAutoPairing(dongle.get()) })
   }

   fn set_auto_pairing(&self, dongle: DeviceId, enabled: bool) -> Result<()> {
      // SAFETY: plain command by id
      codes::check(unsafe { Jabra_SetAutoPairing(dongle.get(), enabled) })
   }

   fn connect_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      // SAFETY: the descriptor and its name outlive the call
      with_paired_device(device, |raw| unsafe { Jabra_ConnectPairedDevice(dongle.get(), raw) })
   }

   fn disconnect_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      // SAFETY: the descriptor and its name outlive the call
      with_paired_device(device, |raw| unsafe { Jabra_DisConnectPairedDevice(dongle.get(), raw) })
   }

   fn remove_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      // SAFETY: the descriptor and its name outlive the call
      with_paired_device(device, |raw| unsafe { Jabra_ClearPairedDevice(dongle.get(), raw) })
   }

   fn set_bt_pairing(&self, dongle: DeviceId, pairing: bool) -> Result<()> {
      // SAFETY: plain commands by id
      codes::check(unsafe {
         if pairing {
            Jabra_SetBTPairing(dongle.get())
         } else {
            Jabra_StopBTPairing(dongle.get())
         }
      })
   }

   fn search_new_devices(&self, dongle: DeviceId) -> Result<()> {
      // SAFETY: plain command by id
      codes::check(unsafe { Jabra_SearchNewDevices(dongle.get()) })
   }

   fn search_device_list(&self, dongle: DeviceId) -> Result<PairingList> {
      // SAFETY: plain query by id, the result is handed to `take_pairing_list`
      take_pairing_list(unsafe { Jabra_GetSearchDeviceList(dongle.get()) }).ok_or(JlinkError::NoData)
   }

   fn connect_new_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      // SAFETY: the descriptor and its name outlive the call
      with_paired_device(device, |raw| unsafe { Jabra_ConnectNewDevice(dongle.get(), raw) })
   }

   fn connect_bt_device(&self, dongle: DeviceId) -> Result<()> {
      // SAFETY: plain command by id
      codes::check(unsafe { Jabra_ConnectBTDevice(dongle.get()) })
   }

   fn disconnect_bt_device(&self, dongle: DeviceId) -> Result<()> {
      // SAFETY: plain command by id
      codes::check(unsafe { Jabra_DisconnectBTDevice(dongle.get()) })
   }
}
