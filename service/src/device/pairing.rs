//! Bluetooth pairing state of a dongle.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use smol_str::SmolStr;

/// Bluetooth device address, most significant octet first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BtAddress([u8; 6]);

impl BtAddress {
   pub const fn new(octets: [u8; 6]) -> Self {
      Self(octets)
   }

   pub const fn octets(self) -> [u8; 6] {
      self.0
   }
}

impl From<[u8; 6]> for BtAddress {
   fn from(octets: [u8; 6]) -> Self {
      Self(octets)
   }
}

impl fmt::Display for BtAddress {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let [a, b, c, d, e, g] = self.0;
      write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
   }
}

/// What a device list returned by a dongle contains.
#[repr(i32)]
#[derive(
   Debug,
   Default,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Serialize,
   Deserialize,
   strum::FromRepr,
   strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceListType {
   /// Devices found by a search still in progress.
   SearchResult = 0,
   PairedDevices = 1,
   /// Devices found by a finished search.
   SearchComplete = 2,
   /// The dongle returned no list.
   #[default]
   Unknown = -1,
}

impl DeviceListType {
   pub fn from_raw(raw: i32) -> Self {
      Self::from_repr(raw).unwrap_or_default()
   }
}

/// One Bluetooth device a dongle knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedDevice {
   pub name: SmolStr,
   pub address: BtAddress,
   pub connected: bool,
}

impl PairedDevice {
   pub fn new(name: impl Into<SmolStr>, address: impl Into<BtAddress>) -> Self {
      Self {
         name: name.into(),
         address: address.into(),
         connected: false,
      }
   }
}

/// Pairing list or search result of a dongle.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingList {
   pub list_type: DeviceListType,
   pub devices: Vec<PairedDevice>,
}

impl PairingList {
   pub fn new(list_type: DeviceListType, devices: Vec<PairedDevice>) -> Self {
      Self { list_type, devices }
   }

   pub fn len(&self) -> usize {
      self.devices.len()
   }

   pub fn is_empty(&self) -> bool {
      self.devices.is_empty()
   }

   pub fn find(&self, address: BtAddress) -> Option<&PairedDevice> {
      self.devices.iter().find(|d| d.address == address)
   }

   /// The device the dongle currently has a link to, if any.
   pub fn connected(&self) -> Option<&PairedDevice> {
      self.devices.iter().find(|d| d.connected)
   }

   pub fn to_json(&self) -> serde_json::Value {
      json!({
          "type": self.list_type.to_string(),
          "devices": self
             .devices
             .iter()
             .map(|d| json!({
                "name": d.name.as_str(),
                "address": d.address.to_string(),
                "connected": d.connected,
             }))
             .collect::<Vec<_>>(),
      })
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_address_display() {
      let addr = BtAddress::new([0x50, 0xc2, 0xed, 0x0a, 0x1b, 0x2c]);
      assert_eq!(addr.to_string(), "50:C2:ED:0A:1B:2C");
      assert_eq!(addr.octets()[5], 0x2c);
   }

   #[test]
   fn test_list_type_from_raw() {
      assert_eq!(DeviceListType::from_raw(1), DeviceListType::PairedDevices);
      assert_eq!(DeviceListType::from_raw(2), DeviceListType::SearchComplete);
      assert_eq!(DeviceListType::from_raw(7), DeviceListType::Unknown);
   }

   #[test]
   fn test_lookup_and_json() {
      let mut phone = PairedDevice::new("Pixel 8", [1, 2, 3, 4, 5, 6]);
      phone.connected = true;
      let list = PairingList::new(
         DeviceListType::PairedDevices,
         vec![PairedDevice::new("Laptop", [9, 9, 9, 9, 9, 9]), phone.clone()],
      );

      assert_eq!(list.len(), 2);
      assert_eq!(list.connected(), Some(&phone));
      assert_eq!(list.find(BtAddress::new([9; 6])).unwrap().name, "Laptop");
      assert!(list.find(BtAddress::default()).is_none());

      let json = list.to_json();
      assert_eq!(json["type"], "paired_devices");
      assert_eq!(json["devices"][1]["address"], "01:02:03:04:05:06");
      assert_eq!(json["devices"][1]["connected"], true);
      assert!(PairingList::default().is_empty());
   }
}
