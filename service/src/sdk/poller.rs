//! Periodic polling of device state.
//!
//! The SDK's battery callback is not delivered reliably by every device,
//! and dongles never report changes to their pairing list. The host asks
//! for both on a timer and feeds the answers into the registry.

use std::{sync::Arc, time::Duration};

use log::{debug, error, warn};
use tokio::{
   task::{self, JoinHandle},
   time::{self, MissedTickBehavior},
};

use crate::{
   device::{DeviceKind, DeviceRegistry},
   error::JlinkError,
   sdk::{DeviceSdk, codes::ReturnCode},
};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls every attached headset once. Dongles have no battery and are
/// skipped. A headset that stops reporting a battery loses its stored
/// reading. Returns how many devices changed state.
pub fn poll_once(sdk: &dyn DeviceSdk, registry: &DeviceRegistry) -> usize {
   let mut changed = 0;
   for id in registry.ids_of_kind(DeviceKind::Headset) {
      let op = match sdk.battery_status(id) {
         Ok(status) => registry.update_battery(id, status),
         Err(JlinkError::Sdk(ReturnCode::NoInformation | ReturnCode::NotSupported)) => {
            debug!("No battery information for device {id}");
            registry.clear_battery(id)
         },
         Err(e) => {
            warn!("Failed to read battery of device {id}: {e}");
            continue;
         },
      };
      if !op.is_noop() {
         changed += 1;
      }
   }
   changed
}

/// Reads the pairing list of every dongle that supports one. Returns how
/// many lists changed.
pub fn poll_pairing_lists_once(sdk: &dyn DeviceSdk, registry: &DeviceRegistry) -> usize {
   registry
      .pairing_dongles()
      .into_iter()
      .filter(|&id| match sdk.pairing_list(id) {
         Ok(list) => registry.update_pairing_list(id, list).is_updated(),
         Err(e) => {
            warn!("Failed to read pairing list of dongle {id}: {e}");
            false
         },
      })
      .count()
}

/// Keeps a poller running; dropping it stops polling.
#[derive(Debug)]
pub struct PollerHandle(JoinHandle<()>);

impl PollerHandle {
   pub fn is_running(&self) -> bool {
      !self.0.is_finished()
   }
}

impl Drop for PollerHandle {
   fn drop(&mut self) {
      self.0.abort();
   }
}

/// Runs `poll` every `period` on the blocking pool, since SDK queries
/// block on device I/O.
fn spawn_poller(
   what: &'static str,
   sdk: Arc<dyn DeviceSdk>,
   registry: Arc<DeviceRegistry>,
   period: Duration,
   poll: fn(&dyn DeviceSdk, &DeviceRegistry) -> usize,
) -> PollerHandle {
   let period = period.max(MIN_POLL_INTERVAL);
   let handle = tokio::spawn(async move {
      let mut interval = time::interval(period);
      interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

      loop {
         interval.tick().await;
         let sdk = sdk.clone();
         let registry = registry.clone();
         match task::spawn_blocking(move || poll(sdk.as_ref(), &registry)).await {
            Ok(0) => {},
            Ok(n) => debug!("{what} poll updated {n} device(s)"),
            Err(e) => error!("{what} poll task failed: {e}"),
         }
      }
   });
   PollerHandle(handle)
}

/// Spawns a task running [`poll_once`] every `period`. Must be called
/// from within a tokio runtime.
pub fn spawn_battery_poller(
   sdk: Arc<dyn DeviceSdk>,
   registry: Arc<DeviceRegistry>,
   period: Duration,
) -> PollerHandle {
   spawn_poller("Battery", sdk, registry, period, poll_once)
}

/// Spawns a task running [`poll_pairing_lists_once`] every `period`.
/// Must be called from within a tokio runtime.
pub fn spawn_pairing_list_poller(
   sdk: Arc<dyn DeviceSdk>,
   registry: Arc<DeviceRegistry>,
   period: Duration,
) -> PollerHandle {
   spawn_poller("Pairing list", sdk, registry, period, poll_pairing_lists_once)
}

#[cfg(test)]
mod tests {
   use std::collections::HashMap;

   use parking_lot::Mutex;
   use smol_str::SmolStr;

   use super::*;
   use crate::{
      boundary::DeviceEventListener,
      device::{
         BatteryStatus, DeviceId, DeviceListType, FeatureSet, PairedDevice, PairingList,
         SupportedFeature,
         registry::tests::{dongle, headset, registry},
      },
      error::Result,
      event::DeviceEvent,
   };

   #[derive(Default)]
   struct FakeSdk {
      batteries: Mutex<HashMap<DeviceId, BatteryStatus>>,
      pairings: Mutex<HashMap<DeviceId, Vec<PairedDevice>>>,
      queried: Mutex<Vec<DeviceId>>,
   }

   impl FakeSdk {
      fn set(&self, id: u16, level: u8) {
         self
            .batteries
            .lock()
            .insert(DeviceId::new(id), BatteryStatus::new(level, false));
      }

      fn unset(&self, id: u16) {
         self.batteries.lock().remove(&DeviceId::new(id));
      }

      fn pair(&self, dongle: u16, name: &str, octet: u8) {
         self
            .pairings
            .lock()
            .entry(DeviceId::new(dongle))
            .or_default()
            .push(PairedDevice::new(name, [octet; 6]));
      }
   }

   impl DeviceSdk for FakeSdk {
      fn version(&self) -> Result<SmolStr> {
         Ok(SmolStr::new_static("fake"))
      }

      fn battery_status(&self, id: DeviceId) -> Result<BatteryStatus> {
         self.queried.lock().push(id);
         if id.get() == 13 {
            return Err(ReturnCode::DeviceReadFail.into());
         }
         self
            .batteries
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| ReturnCode::NoInformation.into())
      }

      fn supported_features(&self, _id: DeviceId) -> Result<FeatureSet> {
         Ok(FeatureSet::empty())
      }

      fn pairing_list(&self, dongle: DeviceId) -> Result<PairingList> {
         self.queried.lock().push(dongle);
         if dongle.get() == 33 {
            return Err(ReturnCode::DeviceReadFail.into());
         }
         let devices = self.pairings.lock().get(&dongle).cloned().unwrap_or_default();
         Ok(PairingList::new(DeviceListType::PairedDevices, devices))
      }
   }

   fn pairing_features() -> FeatureSet {
      [SupportedFeature::PairingList].into_iter().collect()
   }

   #[test]
   fn test_poll_once_skips_dongles_and_errors() {
      let (registry, bus) = registry();
      registry.on_device_attached(headset(11, "Evolve2 65"));
      registry.on_device_attached(dongle(12));
      registry.on_device_attached(headset(13, "Broken"));
      registry.on_device_attached(headset(14, "No battery"));
      bus.take();

      let sdk = FakeSdk::default();
      sdk.set(11, 70);
      sdk.set(12, 100);

      assert_eq!(poll_once(&sdk, &registry), 1);
      let mut queried = sdk.queried.lock().clone();
      queried.sort();
      assert_eq!(queried, vec![DeviceId::new(11), DeviceId::new(13), DeviceId::new(14)]);
      assert_eq!(registry.get(DeviceId::new(11)).unwrap().battery.unwrap().level, 70);
      assert!(registry.get(DeviceId::new(12)).unwrap().battery.is_none());

      // Unchanged state emits nothing.
      assert_eq!(poll_once(&sdk, &registry), 0);
      sdk.set(11, 65);
      assert_eq!(poll_once(&sdk, &registry), 1);

      let events: Vec<_> = bus.take().into_iter().map(|(_, e)| e).collect();
      assert_eq!(
         events,
         vec![
            DeviceEvent::BatteryUpdated(BatteryStatus::new(70, false)),
            DeviceEvent::BatteryUpdated(BatteryStatus::new(65, false)),
         ]
      );
   }

   #[test]
   fn test_poll_once_clears_vanished_battery() {
      let (registry, bus) = registry();
      registry.on_device_attached(headset(15, "Evolve2 75"));
      let sdk = FakeSdk::default();
      sdk.set(15, 20);
      assert_eq!(poll_once(&sdk, &registry), 1);

      sdk.unset(15);
      assert_eq!(poll_once(&sdk, &registry), 1);
      assert_eq!(poll_once(&sdk, &registry), 0);
      assert!(registry.get(DeviceId::new(15)).unwrap().battery.is_none());
      assert_eq!(bus.take().last().unwrap().1, DeviceEvent::BatteryCleared);
   }

   #[test]
   fn test_poll_once_without_devices() {
      let (registry, _bus) = registry();
      let sdk = FakeSdk::default();
      assert_eq!(poll_once(&sdk, &registry), 0);
      assert!(sdk.queried.lock().is_empty());
   }

   #[test]
   fn test_pairing_poll_covers_capable_dongles() {
      let (registry, bus) = registry();
      registry.on_device_attached(dongle(31));
      registry.on_device_attached(dongle(32));
      registry.on_device_attached(dongle(33));
      registry.on_device_attached(headset(34, "Evolve2 65"));
      registry.set_features(DeviceId::new(31), pairing_features());
      registry.set_features(DeviceId::new(33), pairing_features());
      registry.set_features(DeviceId::new(34), pairing_features());
      bus.take();

      let sdk = FakeSdk::default();
      sdk.pair(31, "Phone", 1);
      assert_eq!(poll_pairing_lists_once(&sdk, &registry), 1);
      assert_eq!(*sdk.queried.lock(), vec![DeviceId::new(31), DeviceId::new(33)]);
      assert_eq!(registry.get(DeviceId::new(31)).unwrap().pairing_list.unwrap().len(), 1);
      assert!(registry.get(DeviceId::new(32)).unwrap().pairing_list.is_none());

      assert_eq!(poll_pairing_lists_once(&sdk, &registry), 0);
      sdk.pair(31, "Laptop", 2);
      assert_eq!(poll_pairing_lists_once(&sdk, &registry), 1);

      let events = bus.take();
      assert_eq!(events.len(), 2);
      let DeviceEvent::PairingListUpdated(list) = &events[1].1 else {
         panic!("unexpected event {:?}", events[1]);
      };
      assert_eq!(list.devices[1].name, "Laptop");
   }

   #[tokio::test]
   async fn test_poller_runs_until_dropped() {
      let (registry, _bus) = registry();
      registry.on_device_attached(headset(21, "Speak 750"));
      let sdk = Arc::new(FakeSdk::default());
      sdk.set(21, 40);

      let handle = spawn_battery_poller(sdk.clone(), registry.clone(), Duration::from_millis(20));
      time::sleep(Duration::from_millis(150)).await;
      assert!(handle.is_running());
      assert_eq!(registry.get(DeviceId::new(21)).unwrap().battery.unwrap().level, 40);

      drop(handle);
      time::sleep(Duration::from_millis(30)).await;
      sdk.set(21, 35);
      time::sleep(Duration::from_millis(100)).await;
      assert_eq!(registry.get(DeviceId::new(21)).unwrap().battery.unwrap().level, 40);
   }

   #[tokio::test]
   async fn test_pairing_list_poller_picks_up_changes() {
      let (registry, _bus) = registry();
      registry.on_device_attached(dongle(41));
      registry.set_features(DeviceId::new(41), pairing_features());
      let sdk = Arc::new(FakeSdk::default());

      let handle =
         spawn_pairing_list_poller(sdk.clone(), registry.clone(), Duration::from_millis(20));
      time::sleep(Duration::from_millis(80)).await;
      assert!(registry.get(DeviceId::new(41)).unwrap().pairing_list.unwrap().is_empty());

      sdk.pair(41, "Phone", 4);
      time::sleep(Duration::from_millis(120)).await;
      assert_eq!(registry.get(DeviceId::new(41)).unwrap().pairing_list.unwrap().len(), 1);
      drop(handle);
   }
}
