//! The host's view of attached devices.
//!
//! `DeviceRegistry` is the host-side implementation of the listener
//! contracts. Callbacks only touch the synchronized map and emit events;
//! anything slow (SDK queries, UI) happens in whoever consumes the
//! `EventBus`.
//!
//! Devices are tracked by serial number. A device without one is not
//! tracked at all, and a device that comes back under a new id (same
//! kind, serial and connection) keeps its record.

use std::{
   collections::{HashMap, HashSet},
   sync::atomic::{AtomicBool, AtomicU64, Ordering},
   time::Instant,
};

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::json;

#[cfg(feature = "extended-events")]
use crate::{
   boundary::ExtendedDeviceEventListener,
   device::{ButtonInput, HidInput},
};
use crate::{
   boundary::DeviceEventListener,
   device::{BatteryStatus, DeviceId, DeviceInfo, DeviceKind, FeatureSet, PairingList, SupportedFeature},
   event::{DeviceEvent, EventSender},
};

/// Outcome of replacing an optional piece of device state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOp<T> {
   Noop,
   /// Nothing was stored before.
   Inserted,
   /// The value was cleared; holds what was removed.
   Deleted(T),
   /// The value changed; holds the new value.
   Updated(T),
}

impl<T: PartialEq + Clone> UpdateOp<T> {
   /// Stores `next` into `slot` and reports what happened.
   fn apply(slot: &mut Option<T>, next: Option<T>) -> Self {
      if *slot == next {
         return Self::Noop;
      }
      match (std::mem::replace(slot, next.clone()), next) {
         (None, _) => Self::Inserted,
         (Some(prev), None) => Self::Deleted(prev),
         (Some(_), Some(n)) => Self::Updated(n),
      }
   }

   pub const fn is_noop(&self) -> bool {
      matches!(self, Self::Noop)
   }

   /// A value is stored and differs from before.
   pub const fn is_updated(&self) -> bool {
      matches!(self, Self::Inserted | Self::Updated(_))
   }
}

/// Everything the host knows about one attached device.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
   pub info: DeviceInfo,
   pub battery: Option<BatteryStatus>,
   pub features: FeatureSet,
   /// Device events the SDK reports for this device.
   pub events_mask: u32,
   /// Only kept for dongles that support pairing lists.
   pub pairing_list: Option<PairingList>,
   pub attached_at: Instant,
   seq: u64,
}

impl DeviceRecord {
   /// Same physical device seen through another id.
   fn is_same_device(&self, info: &DeviceInfo) -> bool {
      self.info.kind() == info.kind()
         && self.info.serial_number == info.serial_number
         && self.info.connection == info.connection
   }

   pub fn to_json(&self) -> serde_json::Value {
      let mut value = json!({
          "id": self.info.id.get(),
          "name": self.info.display_name(),
          "kind": self.info.kind().to_string(),
          "serial_number": self.info.serial_number.as_str(),
          "connection": self.info.connection.to_string(),
          "product_id": self.info.product_id,
          "vendor_id": self.info.vendor_id,
          "features": self.features.to_json(),
          "events_mask": self.events_mask,
      });
      if self.info.error_status.is_error() {
         value["error"] = json!(self.info.error_status.to_string());
      }
      if let Some(battery) = &self.battery {
         value["battery"] = battery.to_json();
      }
      if let Some(list) = &self.pairing_list {
         value["pairing_list"] = list.to_json();
      }
      value
   }
}

/// Thread-safe set of attached devices.
pub struct DeviceRegistry {
   devices: Mutex<HashMap<DeviceId, DeviceRecord>>,
   /// Attached ids without a record: no serial number, or superseded by
   /// a reattachment under another id.
   untracked: Mutex<HashSet<DeviceId>>,
   next_seq: AtomicU64,
   first_scan_done: AtomicBool,
   events: EventSender,
}

impl DeviceRegistry {
   pub fn new(events: EventSender) -> Self {
      Self {
         devices: Mutex::new(HashMap::new()),
         untracked: Mutex::new(HashSet::new()),
         next_seq: AtomicU64::new(0),
         first_scan_done: AtomicBool::new(false),
         events,
      }
   }

   pub fn contains(&self, id: DeviceId) -> bool {
      self.devices.lock().contains_key(&id)
   }

   /// Attached ids in ascending order.
   pub fn ids(&self) -> Vec<DeviceId> {
      let mut ids: Vec<_> = self.devices.lock().keys().copied().collect();
      ids.sort_unstable();
      ids
   }

   pub fn len(&self) -> usize {
      self.devices.lock().len()
   }

   pub fn is_empty(&self) -> bool {
      self.devices.lock().is_empty()
   }

   pub fn get(&self, id: DeviceId) -> Option<DeviceRecord> {
      self.devices.lock().get(&id).cloned()
   }

   /// All records, oldest attachment first.
   pub fn snapshot(&self) -> Vec<DeviceRecord> {
      let mut records: Vec<_> = self.devices.lock().values().cloned().collect();
      records.sort_by_key(|r| r.seq);
      records
   }

   /// Ids of attached devices of a kind, oldest attachment first.
   pub fn ids_of_kind(&self, kind: DeviceKind) -> Vec<DeviceId> {
      self
         .snapshot()
         .into_iter()
         .filter(|r| r.info.kind() == kind)
         .map(|r| r.info.id)
         .collect()
   }

   /// Dongles whose feature list includes pairing list support.
   pub fn pairing_dongles(&self) -> Vec<DeviceId> {
      self
         .snapshot()
         .into_iter()
         .filter(|r| {
            r.info.kind() == DeviceKind::Dongle && r.features.contains(SupportedFeature::PairingList)
         })
         .map(|r| r.info.id)
         .collect()
   }

   fn primary(&self, kind: DeviceKind) -> Option<DeviceRecord> {
      self
         .devices
         .lock()
         .values()
         .filter(|r| r.info.kind() == kind)
         .min_by_key(|r| r.seq)
         .cloned()
   }

   /// The earliest attached headset still present.
   pub fn headset(&self) -> Option<DeviceRecord> {
      self.primary(DeviceKind::Headset)
   }

   /// The earliest attached dongle still present.
   pub fn dongle(&self) -> Option<DeviceRecord> {
      self.primary(DeviceKind::Dongle)
   }

   pub fn first_scan_done(&self) -> bool {
      self.first_scan_done.load(Ordering::Relaxed)
   }

   /// Replaces the battery status of a device, emitting an event when it
   /// changed. Unknown devices are ignored.
   pub fn update_battery(&self, id: DeviceId, status: BatteryStatus) -> UpdateOp<BatteryStatus> {
      self.replace_battery(id, Some(status))
   }

   /// Drops the stored battery reading, e.g. once the SDK stops reporting
   /// one. Emits `BatteryCleared` if there was a reading.
   pub fn clear_battery(&self, id: DeviceId) -> UpdateOp<BatteryStatus> {
      self.replace_battery(id, None)
   }

   fn replace_battery(&self, id: DeviceId, status: Option<BatteryStatus>) -> UpdateOp<BatteryStatus> {
      let (op, became_low) = {
         let mut devices = self.devices.lock();
         let Some(record) = devices.get_mut(&id) else {
            debug!("Battery status for unknown device {id}");
            return UpdateOp::Noop;
         };
         let was_low = record.battery.as_ref().is_some_and(|b| b.low);
         let is_low = status.as_ref().is_some_and(|b| b.low);
         (UpdateOp::apply(&mut record.battery, status.clone()), is_low && !was_low)
      };

      if became_low && let Some(status) = &status {
         warn!("Battery low on device {id}: {}%", status.level);
      }
      match (&op, status) {
         (UpdateOp::Deleted(_), _) => self.events.emit(id, DeviceEvent::BatteryCleared),
         (UpdateOp::Inserted | UpdateOp::Updated(_), Some(status)) => {
            self.events.emit(id, DeviceEvent::BatteryUpdated(status));
         },
         _ => {},
      }
      op
   }

   /// Stores the supported feature set of a device.
   pub fn set_features(&self, id: DeviceId, features: FeatureSet) -> bool {
      let changed = {
         let mut devices = self.devices.lock();
         let Some(record) = devices.get_mut(&id) else {
            return false;
         };
         let changed = record.features != features;
         record.features = features;
         changed
      };
      if changed {
         self.events.emit(id, DeviceEvent::FeaturesResolved(features));
      }
      changed
   }

   /// Stores the mask of device events the SDK reports for a device.
   pub fn set_events_mask(&self, id: DeviceId, mask: u32) -> bool {
      match self.devices.lock().get_mut(&id) {
         Some(record) => {
            record.events_mask = mask;
            true
         },
         None => false,
      }
   }

   /// Replaces the pairing list of a dongle, emitting an event when it
   /// changed. Unknown devices and headsets are ignored.
   pub fn update_pairing_list(&self, id: DeviceId, list: PairingList) -> UpdateOp<PairingList> {
      let op = {
         let mut devices = self.devices.lock();
         let Some(record) = devices.get_mut(&id) else {
            debug!("Pairing list for unknown device {id}");
            return UpdateOp::Noop;
         };
         if record.info.kind() != DeviceKind::Dongle {
            debug!("Pairing list for non-dongle device {id}");
            return UpdateOp::Noop;
         }
         UpdateOp::apply(&mut record.pairing_list, Some(list.clone()))
      };
      if !op.is_noop() {
         debug!("Pairing list of {id}: {} device(s)", list.len());
         self.events.emit(id, DeviceEvent::PairingListUpdated(list));
      }
      op
   }

   pub fn to_json(&self) -> serde_json::Value {
      self
         .snapshot()
         .iter()
         .map(DeviceRecord::to_json)
         .collect::<Vec<_>>()
         .into()
   }
}

impl DeviceEventListener for DeviceRegistry {
   fn on_device_attached(&self, info: DeviceInfo) {
      let id = info.id;
      if info.serial_number.is_empty() {
         debug!("Not tracking {} ({id}): no serial number", info.display_name());
         self.untracked.lock().insert(id);
         return;
      }
      self.untracked.lock().remove(&id);

      let previous = {
         let mut devices = self.devices.lock();
         let previous = devices
            .iter()
            .find(|(other, r)| **other != id && r.is_same_device(&info))
            .map(|(other, _)| *other);
         let record = match previous.and_then(|other| devices.remove(&other)) {
            Some(record) => DeviceRecord {
               info: info.clone(),
               ..record
            },
            None => DeviceRecord {
               info: info.clone(),
               battery: None,
               features: FeatureSet::empty(),
               events_mask: 0,
               pairing_list: None,
               attached_at: Instant::now(),
               seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
         };
         if let Some(prev) = devices.insert(id, record) {
            warn!(
               "Device {id} was already registered as {}, replacing it",
               prev.info.display_name()
            );
         }
         previous
      };

      match previous {
         Some(previous) => {
            self.untracked.lock().insert(previous);
            info!(
               "{} {} (serial {:?}) moved from {previous} to {id}",
               info.kind(),
               info.display_name(),
               info.serial_number.as_str()
            );
            self.events.emit(id, DeviceEvent::Reattached { previous, info });
         },
         None => {
            info!(
               "Registered {} {} ({id}, serial {:?})",
               info.kind(),
               info.display_name(),
               info.serial_number.as_str()
            );
            self.events.emit(id, DeviceEvent::Attached(info));
         },
      }
   }

   fn on_device_removed(&self, id: DeviceId) {
      let removed = self.devices.lock().remove(&id);
      match removed {
         Some(record) => {
            info!("Unregistered {} ({id})", record.info.display_name());
            self.events.emit(id, DeviceEvent::Removed);
         },
         None if self.untracked.lock().remove(&id) => {
            debug!("Untracked device {id} removed");
         },
         None => warn!("Removal of unknown device {id}, ignoring"),
      }
   }
}

#[cfg(feature = "extended-events")]
impl ExtendedDeviceEventListener for DeviceRegistry {
   fn on_button_input(&self, id: DeviceId, usage_page: u16, usage: u16, pressed: bool) {
      if !self.contains(id) {
         return;
      }
      debug!("Raw button on {id}: page={usage_page:#06x} usage={usage:#06x} pressed={pressed}");
      self.events.emit(
         id,
         DeviceEvent::ButtonInput(ButtonInput::Raw {
            usage_page,
            usage,
            pressed,
         }),
      );
   }

   fn on_button_input_translated(&self, id: DeviceId, input: HidInput, pressed: bool) {
      if !self.contains(id) {
         return;
      }
      debug!("Button on {id}: {input} pressed={pressed}");
      self
         .events
         .emit(id, DeviceEvent::ButtonInput(ButtonInput::Translated { input, pressed }));
   }

   fn on_battery_status_update(&self, id: DeviceId, status: BatteryStatus) {
      self.update_battery(id, status);
   }

   fn on_first_scan_done(&self) {
      if !self.first_scan_done.swap(true, Ordering::Relaxed) {
         self.events.emit(DeviceId::default(), DeviceEvent::FirstScanDone);
      }
   }
}
