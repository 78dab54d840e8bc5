//! In-process stand-in for the vendor SDK.
//!
//! `SimulatedSdk` keeps native copies of its virtual devices and reports
//! them through the same `extern "C"` entry points the real SDK calls, so
//! everything past the boundary runs exactly as it would against
//! hardware. Only available without the `native` feature, where the
//! entry points hand descriptors back to `libjabra` for freeing.
//!
//! Virtual dongles also keep Bluetooth pairing state, enough to walk
//! through pairing, searching and connecting the way a real dongle
//! answers those calls.

use std::{
   collections::HashMap,
   ffi::{CString, c_char, c_int},
   sync::Arc,
};

use log::debug;
use parking_lot::Mutex;
use smol_str::SmolStr;

#[cfg(feature = "extended-events")]
use std::ptr;

#[cfg(feature = "extended-events")]
use crate::{
   boundary::ffi::{RawBatteryStatus, RawBatteryStatusUnit},
   device::HidInput,
};
use crate::{
   boundary::ffi::{self, RawDeviceInfo},
   device::{
      BatteryStatus, BtAddress, DeviceId, DeviceInfo, DeviceListType, FeatureSet, PairedDevice,
      PairingList,
   },
   error::{JlinkError, Result},
   sdk::{DeviceSdk, codes::ReturnCode},
};

const SIMULATED_VERSION: &str = "1.0.0-simulated";

/// C strings backing the native descriptor of a virtual device.
struct NativeStrings {
   name: CString,
   usb_device_path: CString,
   parent_instance_id: CString,
   dongle_name: CString,
   variant: CString,
   serial_number: CString,
}

impl NativeStrings {
   fn new(info: &DeviceInfo) -> Result<Self> {
      Ok(Self {
         name: CString::new(info.name.as_str())?,
         usb_device_path: CString::new(info.usb_device_path.as_str())?,
         parent_instance_id: CString::new(info.parent_instance_id.as_str())?,
         dongle_name: CString::new(info.dongle_name.as_str())?,
         variant: CString::new(info.variant.as_str())?,
         serial_number: CString::new(info.serial_number.as_str())?,
      })
   }
}

fn c_ptr(s: &CString) -> *mut c_char {
   s.as_ptr().cast_mut()
}

/// Builds the native descriptor the SDK would pass. Valid while `strings`
/// is alive.
fn raw_info(info: &DeviceInfo, strings: &NativeStrings) -> RawDeviceInfo {
   RawDeviceInfo {
      device_id: info.id.get(),
      product_id: info.product_id,
      vendor_id: info.vendor_id,
      device_name: c_ptr(&strings.name),
      usb_device_path: c_ptr(&strings.usb_device_path),
      parent_instance_id: c_ptr(&strings.parent_instance_id),
      err_status: info.error_status as c_int,
      is_dongle: info.is_dongle,
      dongle_name: c_ptr(&strings.dongle_name),
      variant: c_ptr(&strings.variant),
      serial_number: c_ptr(&strings.serial_number),
      is_in_firmware_update_mode: info.in_firmware_update_mode,
      device_connection: info.connection as c_int,
      connection_id: info.connection_id.into(),
      parent_device_id: info.parent_device_id.get(),
   }
}

/// Bluetooth state of a virtual dongle.
#[derive(Default)]
struct DonglePairing {
   paired: Vec<PairedDevice>,
   auto_pairing: bool,
   in_pairing_mode: bool,
   searching: bool,
   found: Vec<PairedDevice>,
}

impl DonglePairing {
   fn position(&self, address: BtAddress) -> Result<usize> {
      self
         .paired
         .iter()
         .position(|d| d.address == address)
         .ok_or_else(|| ReturnCode::ParameterFail.into())
   }

   /// Links the dongle to the paired device at `index`, dropping any
   /// other link.
   fn connect(&mut self, index: usize) {
      for (i, device) in self.paired.iter_mut().enumerate() {
         device.connected = i == index;
      }
   }
}

struct VirtualDevice {
   info: DeviceInfo,
   strings: Arc<NativeStrings>,
   battery: Option<BatteryStatus>,
   features: FeatureSet,
   events_mask: u32,
   pairing: DonglePairing,
}

/// A simulated SDK session with a set of virtual devices.
pub struct SimulatedSdk {
   version: SmolStr,
   devices: Mutex<HashMap<DeviceId, VirtualDevice>>,
}

impl Default for SimulatedSdk {
   fn default() -> Self {
      Self::new()
   }
}

impl SimulatedSdk {
   pub fn new() -> Self {
      Self {
         version: SmolStr::new_static(SIMULATED_VERSION),
         devices: Mutex::new(HashMap::new()),
      }
   }

   /// Plugs in a virtual device and reports it through the attach entry
   /// point. Re-attaching a known id replaces it, battery and features
   /// included.
   pub fn attach(&self, info: DeviceInfo) -> Result<()> {
      let strings = Arc::new(NativeStrings::new(&info)?);
      let raw = raw_info(&info, &strings);
      debug!("Simulating attach of {} ({})", info.display_name(), info.id);

      self.devices.lock().insert(
         info.id,
         VirtualDevice {
            info,
            strings: strings.clone(),
            battery: None,
            features: FeatureSet::empty(),
            events_mask: 0,
            pairing: DonglePairing::default(),
         },
      );

      // SAFETY: `strings` outlives the call and holds every pointer in `raw`
      unsafe { ffi::device_attached_func(raw) };
      Ok(())
   }

   /// Unplugs a device. The removal is reported even for ids the
   /// simulation never attached, the way a misbehaving SDK would.
   pub fn remove(&self, id: DeviceId) -> bool {
      let known = self.devices.lock().remove(&id).is_some();
      debug!("Simulating removal of {id} (known: {known})");
      ffi::device_removed_func(id.get());
      known
   }

   /// Replays the attach callback for every virtual device, the way the
   /// SDK rescans after initialization.
   pub fn rescan(&self) {
      let devices: Vec<_> = {
         let devices = self.devices.lock();
         let mut devices: Vec<_> = devices
            .values()
            .map(|d| (d.info.clone(), d.strings.clone()))
            .collect();
         devices.sort_by_key(|(info, _)| info.id);
         devices
      };
      for (info, strings) in devices {
         // SAFETY: `strings` is held for the duration of the call
         unsafe { ffi::device_attached_func(raw_info(&info, &strings)) };
      }
   }

   pub fn attached_ids(&self) -> Vec<DeviceId> {
      let mut ids: Vec<_> = self.devices.lock().keys().copied().collect();
      ids.sort_unstable();
      ids
   }

   fn with_device<T>(
      &self,
      id: DeviceId,
      f: impl FnOnce(&mut VirtualDevice) -> Result<T>,
   ) -> Result<T> {
      let mut devices = self.devices.lock();
      let device = devices.get_mut(&id).ok_or(ReturnCode::DeviceUnknown)?;
      f(device)
   }

   /// Pairing calls are only answered by dongles.
   fn with_dongle<T>(
      &self,
      id: DeviceId,
      f: impl FnOnce(&mut DonglePairing) -> Result<T>,
   ) -> Result<T> {
      self.with_device(id, |device| {
         if !device.info.is_dongle {
            return Err(ReturnCode::NotSupported.into());
         }
         f(&mut device.pairing)
      })
   }

   /// Sets the battery state returned by [`DeviceSdk::battery_status`]
   /// without notifying anyone.
   pub fn set_battery(&self, id: DeviceId, status: BatteryStatus) -> Result<()> {
      self.with_device(id, |d| {
         d.battery = Some(status);
         Ok(())
      })
   }

   /// Makes the device stop reporting a battery state.
   pub fn clear_battery(&self, id: DeviceId) -> Result<()> {
      self.with_device(id, |d| {
         d.battery = None;
         Ok(())
      })
   }

   pub fn set_features(&self, id: DeviceId, features: FeatureSet) -> Result<()> {
      self.with_device(id, |d| {
         d.features = features;
         Ok(())
      })
   }

   pub fn set_events_mask(&self, id: DeviceId, mask: u32) -> Result<()> {
      self.with_device(id, |d| {
         d.events_mask = mask;
         Ok(())
      })
   }

   /// Replaces what a dongle remembers as paired.
   pub fn set_paired_devices(&self, dongle: DeviceId, devices: Vec<PairedDevice>) -> Result<()> {
      self.with_dongle(dongle, |p| {
         p.paired = devices;
         Ok(())
      })
   }

   /// Devices a search on this dongle will find.
   pub fn set_discoverable(&self, dongle: DeviceId, devices: Vec<PairedDevice>) -> Result<()> {
      self.with_dongle(dongle, |p| {
         p.found = devices;
         Ok(())
      })
   }

   /// Reports a decoded button event.
   #[cfg(feature = "extended-events")]
   pub fn press(&self, id: DeviceId, input: HidInput, pressed: bool) {
      ffi::button_in_translated_func(id.get(), input as c_int, pressed);
   }

   /// Reports a raw HID button report.
   #[cfg(feature = "extended-events")]
   pub fn raw_button(&self, id: DeviceId, usage_page: u16, usage: u16, pressed: bool) {
      ffi::button_in_raw_hid_func(id.get(), usage_page, usage, u8::from(pressed));
   }

   /// Stores a battery state and reports it through the battery callback.
   #[cfg(feature = "extended-events")]
   pub fn report_battery(&self, id: DeviceId, status: BatteryStatus) -> Result<()> {
      self.set_battery(id, status.clone())?;

      let mut units: Vec<_> = status
         .extra_units
         .iter()
         .map(|u| RawBatteryStatusUnit {
            level_in_percent: u.level,
            component: u.component as c_int,
         })
         .collect();
      let mut raw = RawBatteryStatus {
         level_in_percent: status.level,
         charging: status.charging,
         battery_low: status.low,
         component: status.component as c_int,
         extra_units_count: units.len() as u32,
         extra_units: if units.is_empty() {
            ptr::null_mut()
         } else {
            units.as_mut_ptr()
         },
      };
      // SAFETY: `raw` and `units` live across the call
      unsafe { ffi::battery_status_update_func(id.get(), &mut raw) };
      Ok(())
   }

   #[cfg(feature = "extended-events")]
   pub fn first_scan_done(&self) {
      ffi::first_scan_done_func();
   }
}

impl DeviceSdk for SimulatedSdk {
   fn version(&self) -> Result<SmolStr> {
      Ok(self.version.clone())
   }

   fn battery_status(&self, id: DeviceId) -> Result<BatteryStatus> {
      let devices = self.devices.lock();
      let device = devices.get(&id).ok_or(ReturnCode::DeviceUnknown)?;
      device
         .battery
         .clone()
         .ok_or_else(|| ReturnCode::NoInformation.into())
   }

   fn supported_features(&self, id: DeviceId) -> Result<FeatureSet> {
      let devices = self.devices.lock();
      let device = devices.get(&id).ok_or(ReturnCode::DeviceUnknown)?;
      Ok(device.features)
   }

   fn device_events_mask(&self, id: DeviceId) -> Result<u32> {
      self.with_device(id, |d| Ok(d.events_mask))
   }

   fn factory_reset(&self, id: DeviceId) -> Result<()> {
      self.with_device(id, |d| {
         debug!("Simulating factory reset of {id}");
         d.pairing = DonglePairing::default();
         Ok(())
      })
   }

   fn pairing_list(&self, dongle: DeviceId) -> Result<PairingList> {
      self.with_dongle(dongle, |p| {
         Ok(PairingList::new(DeviceListType::PairedDevices, p.paired.clone()))
      })
   }

   fn clear_pairing_list(&self, dongle: DeviceId) -> Result<()> {
      self.with_dongle(dongle, |p| {
         p.paired.clear();
         Ok(())
      })
   }

   fn auto_pairing(&self, dongle: DeviceId) -> Result<bool> {
      self.with_dongle(dongle, |p| Ok(p.auto_pairing))
   }

   fn set_auto_pairing(&self, dongle: DeviceId, enabled: bool) -> Result<()> {
      self.with_dongle(dongle, |p| {
         p.auto_pairing = enabled;
         Ok(())
      })
   }

   fn connect_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      self.with_dongle(dongle, |p| {
         let index = p.position(device.address)?;
         if p.paired[index].connected {
            return Err(ReturnCode::DeviceAlreadyConnected.into());
         }
         p.connect(index);
         Ok(())
      })
   }

   fn disconnect_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      self.with_dongle(dongle, |p| {
         let index = p.position(device.address)?;
         let paired = &mut p.paired[index];
         if !paired.connected {
            return Err(ReturnCode::DeviceNotConnected.into());
         }
         paired.connected = false;
         Ok(())
      })
   }

   fn remove_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      self.with_dongle(dongle, |p| {
         let index = p.position(device.address)?;
         if p.paired[index].connected {
            return Err(ReturnCode::CannotClearDeviceConnected.into());
         }
         p.paired.remove(index);
         Ok(())
      })
   }

   fn set_bt_pairing(&self, dongle: DeviceId, pairing: bool) -> Result<()> {
      self.with_dongle(dongle, |p| {
         p.in_pairing_mode = pairing;
         if !pairing {
            p.searching = false;
         }
         Ok(())
      })
   }

   fn search_new_devices(&self, dongle: DeviceId) -> Result<()> {
      self.with_dongle(dongle, |p| {
         if !p.in_pairing_mode {
            return Err(ReturnCode::DeviceBadState.into());
         }
         p.searching = true;
         Ok(())
      })
   }

   fn search_device_list(&self, dongle: DeviceId) -> Result<PairingList> {
      self.with_dongle(dongle, |p| {
         if !p.searching {
            return Err(JlinkError::NoData);
         }
         Ok(PairingList::new(DeviceListType::SearchComplete, p.found.clone()))
      })
   }

   fn connect_new_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      self.with_dongle(dongle, |p| {
         let found = p
            .found
            .iter()
            .position(|d| d.address == device.address)
            .ok_or(ReturnCode::ParameterFail)?;
         let new = p.found.remove(found);
         let index = match p.position(new.address) {
            Ok(index) => index,
            Err(_) => {
               p.paired.push(new);
               p.paired.len() - 1
            },
         };
         p.connect(index);
         Ok(())
      })
   }

   fn connect_bt_device(&self, dongle: DeviceId) -> Result<()> {
      self.with_dongle(dongle, |p| {
         if p.paired.iter().any(|d| d.connected) {
            return Err(ReturnCode::DeviceAlreadyConnected.into());
         }
         // The most recently paired device is the one to come back.
         let last = p.paired.len().checked_sub(1).ok_or(ReturnCode::NoInformation)?;
         p.connect(last);
         Ok(())
      })
   }

   fn disconnect_bt_device(&self, dongle: DeviceId) -> Result<()> {
      self.with_dongle(dongle, |p| {
         let Some(device) = p.paired.iter_mut().find(|d| d.connected) else {
            return Err(ReturnCode::DeviceNotConnected.into());
         };
         device.connected = false;
         Ok(())
      })
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   #[cfg(feature = "extended-events")]
   use crate::{device::ButtonInput, event::DeviceEvent};
   use crate::{
      boundary::{Dispatcher, global_test_lock},
      device::{ConnectionType, DeviceKind, SupportedFeature, registry::tests::registry},
      error::JlinkError,
   };

   fn headset(id: u16, name: &str) -> DeviceInfo {
      let mut info = DeviceInfo::new(id, name);
      info.serial_number = format!("70BF92C0A1{id:04X}").into();
      info.connection = ConnectionType::Bluetooth;
      info.product_id = 0x24b8;
      info
   }

   fn dongle(id: u16) -> DeviceInfo {
      let mut info = DeviceInfo::new(id, "");
      info.is_dongle = true;
      info.dongle_name = "Link 380".into();
      info.serial_number = format!("0AE1{id:04X}").into();
      info.connection = ConnectionType::Usb;
      info
   }

   #[test]
   fn test_attach_and_remove_reach_registry() {
      let _lock = global_test_lock();
      let (registry, _bus) = registry();
      let _handle = Dispatcher::global().register(registry.clone());
      let sdk = SimulatedSdk::new();

      sdk.attach(headset(601, "Evolve2 65")).unwrap();
      sdk.attach(headset(602, "Evolve2 85")).unwrap();
      assert_eq!(registry.ids(), vec![DeviceId::new(601), DeviceId::new(602)]);

      let record = registry.get(DeviceId::new(602)).unwrap();
      assert_eq!(record.info.name, "Evolve2 85");
      assert_eq!(record.info.serial_number, "70BF92C0A1025A");
      assert_eq!(record.info.connection, ConnectionType::Bluetooth);
      assert_eq!(record.info.product_id, 0x24b8);

      assert!(sdk.remove(DeviceId::new(601)));
      assert!(!sdk.remove(DeviceId::new(601)));
      assert_eq!(registry.ids(), vec![DeviceId::new(602)]);

      sdk.remove(DeviceId::new(602));
      assert!(registry.is_empty());
      assert!(sdk.attached_ids().is_empty());
   }

   #[test]
   fn test_rescan_replays_attachments() {
      let _lock = global_test_lock();
      let sdk = SimulatedSdk::new();
      sdk.attach(headset(612, "Speak 510")).unwrap();
      sdk.attach(headset(611, "Speak 710")).unwrap();

      let (registry, _bus) = registry();
      let _handle = Dispatcher::global().register(registry.clone());
      sdk.rescan();
      assert_eq!(registry.ids(), vec![DeviceId::new(611), DeviceId::new(612)]);
      assert_eq!(Dispatcher::global().attached_ids().len(), 2);

      Dispatcher::global().detach_all();
      assert!(registry.is_empty());
   }

   #[test]
   fn test_nul_in_name_is_rejected() {
      let _lock = global_test_lock();
      let sdk = SimulatedSdk::new();
      let err = sdk.attach(headset(621, "bad\0name")).unwrap_err();
      assert!(matches!(err, JlinkError::InteriorNul(_)));
      assert!(sdk.attached_ids().is_empty());
      assert!(!Dispatcher::global().is_attached(DeviceId::new(621)));
   }

   #[test]
   fn test_queries() {
      let _lock = global_test_lock();
      let sdk = SimulatedSdk::new();
      let id = DeviceId::new(631);
      assert_eq!(sdk.version().unwrap(), SIMULATED_VERSION);
      assert!(matches!(
         sdk.battery_status(id),
         Err(JlinkError::Sdk(ReturnCode::DeviceUnknown))
      ));

      sdk.attach(headset(631, "Evolve2 75")).unwrap();
      assert!(matches!(
         sdk.battery_status(id),
         Err(JlinkError::Sdk(ReturnCode::NoInformation))
      ));
      assert!(sdk.supported_features(id).unwrap().is_empty());

      sdk.set_battery(id, BatteryStatus::new(55, true)).unwrap();
      let features: FeatureSet = [SupportedFeature::BusyLight, SupportedFeature::MusicEqualizer]
         .into_iter()
         .collect();
      sdk.set_features(id, features).unwrap();
      assert_eq!(sdk.battery_status(id).unwrap().level, 55);
      assert_eq!(sdk.supported_features(id).unwrap(), features);

      sdk.remove(id);
      assert!(sdk.set_battery(id, BatteryStatus::new(1, false)).is_err());
   }

   #[cfg(feature = "extended-events")]
   #[test]
   fn test_extended_events_reach_registry() {
      let _lock = global_test_lock();
      let (registry, bus) = registry();
      let _handle = Dispatcher::global().register_extended(registry.clone());
      let sdk = SimulatedSdk::new();
      let id = DeviceId::new(641);

      sdk.attach(headset(641, "Evolve 75")).unwrap();
      sdk.press(id, HidInput::OffHook, true);
      sdk.raw_button(id, 0x0b, 0x20, true);
      sdk.report_battery(id, BatteryStatus::new(80, false)).unwrap();
      sdk.report_battery(id, BatteryStatus::new(80, false)).unwrap();
      sdk.first_scan_done();

      assert!(registry.first_scan_done());
      assert_eq!(registry.get(id).unwrap().battery.unwrap().level, 80);

      let events: Vec<_> = bus.take().into_iter().map(|(_, e)| e).collect();
      assert!(matches!(events[0], DeviceEvent::Attached(_)));
      assert_eq!(
         events[1..].to_vec(),
         vec![
            DeviceEvent::ButtonInput(ButtonInput::Translated {
               input: HidInput::OffHook,
               pressed: true,
            }),
            DeviceEvent::ButtonInput(ButtonInput::Raw {
               usage_page: 0x0b,
               usage: 0x20,
               pressed: true,
            }),
            DeviceEvent::BatteryUpdated(BatteryStatus::new(80, false)),
            DeviceEvent::FirstScanDone,
         ]
      );

      sdk.remove(id);
   }

   #[test]
   fn test_reattach_with_same_serial_keeps_one_record() {
      let _lock = global_test_lock();
      let (registry, _bus) = registry();
      let _handle = Dispatcher::global().register(registry.clone());
      let sdk = SimulatedSdk::new();

      let mut first = headset(651, "Evolve2 65");
      first.serial_number = "SN1".into();
      let mut second = headset(652, "Evolve2 65");
      second.serial_number = "SN1".into();
      sdk.attach(first).unwrap();
      sdk.attach(second).unwrap();
      sdk.attach(DeviceInfo::new(653, "No serial")).unwrap();

      assert_eq!(registry.ids_of_kind(DeviceKind::Headset), vec![DeviceId::new(652)]);
      assert_eq!(registry.len(), 1);
      assert_eq!(Dispatcher::global().attached_ids().len(), 3);

      Dispatcher::global().detach_all();
      assert!(registry.is_empty());
   }

   #[test]
   fn test_pairing_calls_need_a_dongle() {
      let _lock = global_test_lock();
      let sdk = SimulatedSdk::new();
      sdk.attach(headset(661, "Evolve2 65")).unwrap();

      let id = DeviceId::new(661);
      assert!(matches!(
         sdk.pairing_list(id),
         Err(JlinkError::Sdk(ReturnCode::NotSupported))
      ));
      assert!(matches!(
         sdk.auto_pairing(DeviceId::new(669)),
         Err(JlinkError::Sdk(ReturnCode::DeviceUnknown))
      ));
      sdk.set_events_mask(id, 0x5).unwrap();
      assert_eq!(sdk.device_events_mask(id).unwrap(), 0x5);
      sdk.remove(id);
   }

   #[test]
   fn test_paired_device_lifecycle() {
      let _lock = global_test_lock();
      let sdk = SimulatedSdk::new();
      let id = DeviceId::new(671);
      sdk.attach(dongle(671)).unwrap();

      let phone = PairedDevice::new("Phone", [1, 1, 1, 1, 1, 1]);
      let laptop = PairedDevice::new("Laptop", [2, 2, 2, 2, 2, 2]);
      sdk.set_paired_devices(id, vec![phone.clone(), laptop.clone()]).unwrap();

      let list = sdk.pairing_list(id).unwrap();
      assert_eq!(list.list_type, DeviceListType::PairedDevices);
      assert_eq!(list.len(), 2);
      assert!(list.connected().is_none());

      sdk.connect_paired_device(id, &phone).unwrap();
      assert!(matches!(
         sdk.connect_paired_device(id, &phone),
         Err(JlinkError::Sdk(ReturnCode::DeviceAlreadyConnected))
      ));
      sdk.connect_paired_device(id, &laptop).unwrap();
      assert_eq!(sdk.pairing_list(id).unwrap().connected().unwrap().name, "Laptop");

      assert!(matches!(
         sdk.remove_paired_device(id, &laptop),
         Err(JlinkError::Sdk(ReturnCode::CannotClearDeviceConnected))
      ));
      sdk.disconnect_paired_device(id, &laptop).unwrap();
      assert!(matches!(
         sdk.disconnect_paired_device(id, &laptop),
         Err(JlinkError::Sdk(ReturnCode::DeviceNotConnected))
      ));
      sdk.remove_paired_device(id, &laptop).unwrap();
      assert_eq!(sdk.pairing_list(id).unwrap().devices, vec![phone.clone()]);

      sdk.connect_bt_device(id).unwrap();
      assert!(sdk.pairing_list(id).unwrap().devices[0].connected);
      sdk.disconnect_bt_device(id).unwrap();
      assert!(sdk.disconnect_bt_device(id).is_err());

      sdk.clear_pairing_list(id).unwrap();
      assert!(sdk.pairing_list(id).unwrap().is_empty());
      assert!(matches!(
         sdk.connect_bt_device(id),
         Err(JlinkError::Sdk(ReturnCode::NoInformation))
      ));
      assert!(matches!(
         sdk.connect_paired_device(id, &phone),
         Err(JlinkError::Sdk(ReturnCode::ParameterFail))
      ));
      sdk.remove(id);
   }

   #[test]
   fn test_search_and_pair_new_device() {
      let _lock = global_test_lock();
      let sdk = SimulatedSdk::new();
      let id = DeviceId::new(681);
      sdk.attach(dongle(681)).unwrap();
      let speaker = PairedDevice::new("Speak 750", [0x50, 0xc2, 0xed, 7, 5, 0]);
      sdk.set_discoverable(id, vec![speaker.clone()]).unwrap();

      assert!(matches!(
         sdk.search_new_devices(id),
         Err(JlinkError::Sdk(ReturnCode::DeviceBadState))
      ));
      assert!(matches!(sdk.search_device_list(id), Err(JlinkError::NoData)));

      sdk.search_for_new_devices(id).unwrap();
      let found = sdk.search_device_list(id).unwrap();
      assert_eq!(found.list_type, DeviceListType::SearchComplete);
      assert_eq!(found.devices, vec![speaker.clone()]);

      sdk.pair_new_device(id, &speaker).unwrap();
      let paired = sdk.pairing_list(id).unwrap();
      assert_eq!(paired.connected().unwrap().address, speaker.address);
      // Pairing mode is left again.
      assert!(sdk.search_new_devices(id).is_err());

      // A failed connect still leaves pairing mode and reports the failure.
      sdk.search_for_new_devices(id).unwrap();
      assert!(matches!(
         sdk.pair_new_device(id, &PairedDevice::new("Gone", [9; 6])),
         Err(JlinkError::Sdk(ReturnCode::ParameterFail))
      ));
      assert!(sdk.search_new_devices(id).is_err());
      sdk.remove(id);
   }

   #[test]
   fn test_auto_pairing_and_factory_reset() {
      let _lock = global_test_lock();
      let sdk = SimulatedSdk::new();
      let id = DeviceId::new(691);
      sdk.attach(dongle(691)).unwrap();

      assert!(!sdk.auto_pairing(id).unwrap());
      sdk.set_auto_pairing(id, true).unwrap();
      assert!(sdk.auto_pairing(id).unwrap());
      sdk.set_paired_devices(id, vec![PairedDevice::new("Phone", [3; 6])]).unwrap();

      sdk.factory_reset(id).unwrap();
      assert!(!sdk.auto_pairing(id).unwrap());
      assert!(sdk.pairing_list(id).unwrap().is_empty());
      assert!(sdk.factory_reset(DeviceId::new(699)).is_err());
      sdk.remove(id);
   }
}
