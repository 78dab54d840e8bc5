//! Device identity and descriptor types.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::sdk::codes::ErrorStatus;

/// Short-lived handle the SDK assigns to a connected device instance.
///
/// Valid from the attach notification until the matching remove; the SDK
/// does not reuse an id while the device is still attached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct DeviceId(u16);

impl DeviceId {
   pub const fn new(raw: u16) -> Self {
      Self(raw)
   }

   pub const fn get(self) -> u16 {
      self.0
   }
}

impl From<u16> for DeviceId {
   fn from(raw: u16) -> Self {
      Self(raw)
   }
}

impl From<DeviceId> for u16 {
   fn from(id: DeviceId) -> Self {
      id.0
   }
}

impl fmt::Display for DeviceId {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "#{}", self.0)
   }
}

/// Transport a device is attached through.
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
   strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionType {
   #[default]
   Usb = 0,
   Bluetooth = 1,
   Dect = 2,
   Unknown = -1,
}

impl ConnectionType {
   pub fn from_raw(raw: i32) -> Self {
      Self::from_repr(raw).unwrap_or(Self::Unknown)
   }
}

/// Coarse role of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
   Headset,
   Dongle,
}

/// Device descriptor owned by the host.
///
/// Every field is copied out of the SDK's native descriptor while the
/// attach callback runs, so nothing here points into SDK memory.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
   pub id: DeviceId,
   pub product_id: u16,
   pub vendor_id: u16,
   pub name: SmolStr,
   pub usb_device_path: SmolStr,
   pub parent_instance_id: SmolStr,
   pub error_status: ErrorStatus,
   pub is_dongle: bool,
   pub dongle_name: SmolStr,
   pub variant: SmolStr,
   pub serial_number: SmolStr,
   pub in_firmware_update_mode: bool,
   pub connection: ConnectionType,
   pub connection_id: u32,
   pub parent_device_id: DeviceId,
}

impl DeviceInfo {
   /// Creates a descriptor with the given id and name and default fields.
   pub fn new(id: impl Into<DeviceId>, name: impl Into<SmolStr>) -> Self {
      Self {
         id: id.into(),
         name: name.into(),
         ..Default::default()
      }
   }

   pub const fn kind(&self) -> DeviceKind {
      if self.is_dongle {
         DeviceKind::Dongle
      } else {
         DeviceKind::Headset
      }
   }

   /// Name to show for the device, falling back to the dongle name.
   pub fn display_name(&self) -> &str {
      if self.name.is_empty() {
         self.dongle_name.as_str()
      } else {
         self.name.as_str()
      }
   }
}
