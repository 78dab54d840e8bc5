//! `jlink` host service
//!
//! Starts the device SDK, keeps the device registry current from its
//! callbacks and reports every device event until interrupted.

use std::sync::{
   Arc,
   atomic::{AtomicBool, Ordering},
};

use crossbeam::queue::SegQueue;
use log::{debug, info, warn};
use tokio::{
   signal,
   sync::Notify,
   task::{self, JoinHandle},
};

use jlink::{
   config::Config,
   device::{DeviceId, DeviceKind, DeviceRegistry, SupportedFeature},
   error::Result,
   event::{DeviceEvent, EventBus},
   sdk::{DeviceSdk, poller},
};

#[tokio::main]
async fn main() -> Result<()> {
   env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

   info!("Starting jlink...");

   // Load configuration
   let config = Config::load()?;
   info!(
      "Loaded configuration (app id {:?}, battery polling {}, pairing list polling {})",
      config.app_id, config.battery_polling, config.pairing_list_polling
   );

   // Create event channel and the registry feeding it
   let event_bus = EventProcessor::new();
   let registry = Arc::new(DeviceRegistry::new(event_bus.clone()));

   #[cfg(feature = "extended-events")]
   let listener = jlink::register_extended_listener(registry.clone());
   #[cfg(not(feature = "extended-events"))]
   let listener = jlink::register_listener(registry.clone());

   let sdk = start_sdk(&config)?;
   match sdk.version() {
      Ok(version) => info!("Device SDK version {version}"),
      Err(e) => warn!("Could not read SDK version: {e}"),
   }

   // Start event processor
   let dispatcher = event_bus.spawn_dispatcher(sdk.clone(), registry.clone());

   let battery_poller = config.battery_polling.then(|| {
      poller::spawn_battery_poller(sdk.clone(), registry.clone(), config.battery_poll_interval())
   });
   let pairing_poller = config.pairing_list_polling.then(|| {
      poller::spawn_pairing_list_poller(
         sdk.clone(),
         registry.clone(),
         config.pairing_list_poll_interval(),
      )
   });

   // Wait for shutdown signal
   signal::ctrl_c().await?;
   info!("Shutting down jlink...");

   drop(battery_poller);
   drop(pairing_poller);
   listener.deregister();

   // Handle what is still queued, then let the dispatcher finish.
   event_bus.close();
   if let Err(e) = dispatcher.await {
      warn!("Event dispatcher failed: {e}");
   }
   info!("Devices at shutdown: {}", registry.to_json());

   Ok(())
}

#[cfg(feature = "native")]
fn start_sdk(config: &Config) -> Result<Arc<dyn DeviceSdk>> {
   Ok(Arc::new(jlink::sdk::native::NativeSdk::start(config)?))
}

/// Without the vendor library, plug in a dongle and a headset paired to
/// it so the rest of the host has something to work with.
#[cfg(not(feature = "native"))]
fn start_sdk(_config: &Config) -> Result<Arc<dyn DeviceSdk>> {
   use jlink::{
      device::{BatteryStatus, ConnectionType, DeviceInfo, PairedDevice},
      sdk::simulated::SimulatedSdk,
   };

   warn!("Built without the native SDK, simulating devices");
   let sdk = SimulatedSdk::new();

   let mut dongle = DeviceInfo::new(1, "");
   dongle.is_dongle = true;
   dongle.dongle_name = "Jabra Link 380".into();
   dongle.vendor_id = 0x0b0e;
   dongle.product_id = 0x2e56;
   dongle.serial_number = "0AE1D2C3B4A5".into();
   dongle.connection = ConnectionType::Usb;
   sdk.attach(dongle)?;

   let dongle_id = DeviceId::new(1);
   sdk.set_features(dongle_id, [SupportedFeature::PairingList].into_iter().collect())?;
   let mut paired = PairedDevice::new("Jabra Evolve2 65", [0x50, 0xc2, 0xed, 0x2a, 0x11, 0x07]);
   paired.connected = true;
   sdk.set_paired_devices(dongle_id, vec![paired])?;

   let mut headset = DeviceInfo::new(2, "Jabra Evolve2 65");
   headset.vendor_id = 0x0b0e;
   headset.product_id = 0x02e6;
   headset.serial_number = "70BF92C0A1E4".into();
   headset.connection = ConnectionType::Bluetooth;
   headset.parent_device_id = DeviceId::new(1);
   sdk.attach(headset)?;

   let id = DeviceId::new(2);
   sdk.set_battery(id, BatteryStatus::new(87, false))?;
   sdk.set_features(
      id,
      [
         SupportedFeature::BusyLight,
         SupportedFeature::RemoteMmi,
         SupportedFeature::MusicEqualizer,
         SupportedFeature::VoiceAssistant,
      ]
      .into_iter()
      .collect(),
   )?;

   #[cfg(feature = "extended-events")]
   sdk.first_scan_done();

   Ok(Arc::new(sdk))
}

/// Reads what the SDK knows about a freshly attached device. Runs outside
/// of callback context.
fn refresh_device(sdk: &dyn DeviceSdk, registry: &DeviceRegistry, id: DeviceId) {
   match sdk.supported_features(id) {
      Ok(features) => {
         registry.set_features(id, features);
      },
      Err(e) => debug!("No feature list for device {id}: {e}"),
   }
   match sdk.device_events_mask(id) {
      Ok(mask) => {
         registry.set_events_mask(id, mask);
      },
      Err(e) => debug!("No device events for device {id}: {e}"),
   }

   let Some(record) = registry.get(id) else {
      return;
   };
   match record.info.kind() {
      DeviceKind::Headset => match sdk.battery_status(id) {
         Ok(status) => {
            registry.update_battery(id, status);
         },
         Err(e) => debug!("No battery status for device {id}: {e}"),
      },
      DeviceKind::Dongle if record.features.contains(SupportedFeature::PairingList) => {
         match sdk.pairing_list(id) {
            Ok(list) => {
               registry.update_pairing_list(id, list);
            },
            Err(e) => warn!("Failed to read pairing list of dongle {id}: {e}"),
         }
         match sdk.auto_pairing(id) {
            Ok(enabled) => info!("Auto pairing on dongle {id}: {enabled}"),
            Err(e) => debug!("No auto pairing state for dongle {id}: {e}"),
         }
      },
      DeviceKind::Dongle => {},
   }
}

/// Queue between the registry, which emits from SDK callback threads, and
/// the task reacting to device events.
struct EventProcessor {
   queue: SegQueue<(DeviceId, DeviceEvent)>,
   notifier: Notify,
   closed: AtomicBool,
}

impl EventProcessor {
   fn new() -> Arc<Self> {
      Arc::new(Self {
         queue: SegQueue::new(),
         notifier: Notify::new(),
         closed: AtomicBool::new(false),
      })
   }

   /// Ends the dispatcher once everything queued so far is handled.
   fn close(&self) {
      self.closed.store(true, Ordering::Release);
      self.notifier.notify_waiters();
   }

   /// Next queued event, or `None` once closed and drained.
   async fn recv(&self) -> Option<(DeviceId, DeviceEvent)> {
      loop {
         // Registered before checking, so a wakeup in between is not lost.
         let wakeup = self.notifier.notified();
         if let Some(event) = self.queue.pop() {
            return Some(event);
         }
         if self.closed.load(Ordering::Acquire) {
            return None;
         }
         wakeup.await;
      }
   }

   async fn dispatch(
      &self,
      sdk: &Arc<dyn DeviceSdk>,
      registry: &Arc<DeviceRegistry>,
      (device, event): (DeviceId, DeviceEvent),
   ) {
      match event {
         DeviceEvent::Attached(info) => {
            info!(
               "{} attached: {} ({device}, {})",
               info.kind(),
               info.display_name(),
               info.connection
            );
            refresh(sdk, registry, device).await;
         },
         DeviceEvent::Reattached { previous, info } => {
            info!("{} reattached as {device} (was {previous})", info.display_name());
            refresh(sdk, registry, device).await;
         },
         DeviceEvent::Removed => {
            info!("Device {device} removed");
         },
         DeviceEvent::BatteryUpdated(battery) => {
            info!("Battery of {device}: {}", battery.to_json());
         },
         DeviceEvent::BatteryCleared => {
            info!("Battery of {device} no longer reported");
         },
         DeviceEvent::FeaturesResolved(features) => {
            info!("Device {device} supports: {features}");
         },
         DeviceEvent::PairingListUpdated(list) => {
            info!("Pairing list of {device}: {}", list.to_json());
         },
         DeviceEvent::ButtonInput(input) => {
            info!("Button input on {device}: {input:?}");
         },
         DeviceEvent::FirstScanDone => {
            info!("Initial device scan done, {} device(s) attached", registry.len());
         },
      }
   }

   fn spawn_dispatcher(
      self: &Arc<Self>,
      sdk: Arc<dyn DeviceSdk>,
      registry: Arc<DeviceRegistry>,
   ) -> JoinHandle<()> {
      let this = self.clone();
      tokio::spawn(async move {
         while let Some(event) = this.recv().await {
            this.dispatch(&sdk, &registry, event).await;
         }
         debug!("Event dispatcher stopped");
      })
   }
}

/// Runs [`refresh_device`] on the blocking pool.
async fn refresh(sdk: &Arc<dyn DeviceSdk>, registry: &Arc<DeviceRegistry>, id: DeviceId) {
   let (sdk, registry) = (sdk.clone(), registry.clone());
   if let Err(e) = task::spawn_blocking(move || refresh_device(sdk.as_ref(), &registry, id)).await {
      warn!("Failed to query device {id}: {e}");
   }
}

impl EventBus for EventProcessor {
   fn emit(&self, device: DeviceId, event: DeviceEvent) {
      self.queue.push((device, event));
      self.notifier.notify_waiters();
   }
}
