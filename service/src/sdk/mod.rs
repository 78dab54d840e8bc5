//! Host-to-SDK side of the boundary.
//!
//! The callbacks cover everything the SDK pushes to the host. Queries and
//! commands the host issues itself (version, battery, features, dongle
//! pairing) go through [`DeviceSdk`], implemented by the native binding
//! and by a simulated SDK that drives the real callback entry points.

use smol_str::SmolStr;

use log::warn;

use crate::{
   device::{BatteryStatus, DeviceId, FeatureSet, PairedDevice, PairingList},
   error::Result,
   sdk::codes::ReturnCode,
};

pub mod codes;
#[cfg(feature = "native")]
pub mod native;
pub mod poller;
#[cfg(not(feature = "native"))]
pub mod simulated;

/// Queries the host issues against the device SDK.
///
/// Never call these from inside a listener callback: the SDK may hold
/// internal locks while it delivers events.
pub trait DeviceSdk: Send + Sync {
   /// SDK library version string.
   fn version(&self) -> Result<SmolStr>;

   /// Current battery state of a device.
   fn battery_status(&self, id: DeviceId) -> Result<BatteryStatus>;

   /// Features the device reports as supported.
   fn supported_features(&self, id: DeviceId) -> Result<FeatureSet>;

   /// Bit mask of the device events the SDK reports for a device.
   fn device_events_mask(&self, id: DeviceId) -> Result<u32> {
      let _ = id;
      Err(ReturnCode::NotSupported.into())
   }

   /// Restores factory settings. Dongles forget every paired device.
   fn factory_reset(&self, id: DeviceId) -> Result<()> {
      let _ = id;
      Err(ReturnCode::NotSupported.into())
   }

   /// Devices paired with a dongle. A dongle that returns no list yields
   /// an empty list of type [`DeviceListType::Unknown`].
   ///
   /// [`DeviceListType::Unknown`]: crate::device::DeviceListType::Unknown
   fn pairing_list(&self, dongle: DeviceId) -> Result<PairingList> {
      let _ = dongle;
      Err(ReturnCode::NotSupported.into())
   }

   /// Forgets every device paired with a dongle.
   fn clear_pairing_list(&self, dongle: DeviceId) -> Result<()> {
      let _ = dongle;
      Err(ReturnCode::NotSupported.into())
   }

   fn auto_pairing(&self, dongle: DeviceId) -> Result<bool> {
      let _ = dongle;
      Err(ReturnCode::NotSupported.into())
   }

   fn set_auto_pairing(&self, dongle: DeviceId, enabled: bool) -> Result<()> {
      let _ = (dongle, enabled);
      Err(ReturnCode::NotSupported.into())
   }

   fn connect_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      let _ = (dongle, device);
      Err(ReturnCode::NotSupported.into())
   }

   fn disconnect_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      let _ = (dongle, device);
      Err(ReturnCode::NotSupported.into())
   }

   /// Removes one device from the dongle's pairing list.
   fn remove_paired_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      let _ = (dongle, device);
      Err(ReturnCode::NotSupported.into())
   }

   /// Puts the dongle into Bluetooth pairing mode, or takes it out.
   fn set_bt_pairing(&self, dongle: DeviceId, pairing: bool) -> Result<()> {
      let _ = (dongle, pairing);
      Err(ReturnCode::NotSupported.into())
   }

   /// Starts a search for new devices. The dongle must be in pairing mode.
   fn search_new_devices(&self, dongle: DeviceId) -> Result<()> {
      let _ = dongle;
      Err(ReturnCode::NotSupported.into())
   }

   /// Devices found by the running or last search.
   fn search_device_list(&self, dongle: DeviceId) -> Result<PairingList> {
      let _ = dongle;
      Err(ReturnCode::NotSupported.into())
   }

   /// Pairs with and connects to a device from the search result.
   fn connect_new_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      let _ = (dongle, device);
      Err(ReturnCode::NotSupported.into())
   }

   /// Reconnects the dongle to its last Bluetooth device.
   fn connect_bt_device(&self, dongle: DeviceId) -> Result<()> {
      let _ = dongle;
      Err(ReturnCode::NotSupported.into())
   }

   fn disconnect_bt_device(&self, dongle: DeviceId) -> Result<()> {
      let _ = dongle;
      Err(ReturnCode::NotSupported.into())
   }

   /// Enters pairing mode and starts searching.
   fn search_for_new_devices(&self, dongle: DeviceId) -> Result<()> {
      self.set_bt_pairing(dongle, true)?;
      self.search_new_devices(dongle)
   }

   /// Connects a device found by a search, then leaves pairing mode even
   /// if connecting failed. The connect error wins over the other.
   fn pair_new_device(&self, dongle: DeviceId, device: &PairedDevice) -> Result<()> {
      let connected = self.connect_new_device(dongle, device);
      let stopped = self.set_bt_pairing(dongle, false);
      match (connected, stopped) {
         (Err(e), Err(stop)) => {
            warn!("Could not leave pairing mode on {dongle}: {stop}");
            Err(e)
         },
         (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
         (Ok(()), Ok(())) => Ok(()),
      }
   }
}
