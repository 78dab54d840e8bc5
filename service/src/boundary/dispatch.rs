//! Fan-out of SDK notifications to registered listeners.
//!
//! The dispatcher is the only place that talks to listeners. It keeps the
//! set of currently attached devices so every listener observes a clean
//! attach/remove sequence even if the SDK does not, serializes delivery
//! across SDK threads and contains panics raised by listeners.

use std::{
   any::Any,
   cell::RefCell,
   collections::HashMap,
   panic::{self, AssertUnwindSafe},
   sync::{
      Arc, LazyLock, Weak,
      atomic::{AtomicU64, Ordering},
   },
};

use log::{debug, error, info, warn};
use parking_lot::{ReentrantMutex, RwLock};

#[cfg(feature = "extended-events")]
use crate::boundary::listener::ExtendedDeviceEventListener;
#[cfg(feature = "extended-events")]
use crate::device::{BatteryStatus, HidInput};
use crate::{
   boundary::listener::DeviceEventListener,
   device::{DeviceId, DeviceInfo},
};

static GLOBAL: LazyLock<Dispatcher> = LazyLock::new(Dispatcher::new);

#[derive(Clone)]
struct Slot {
   id: u64,
   listener: Arc<dyn DeviceEventListener>,
   #[cfg(feature = "extended-events")]
   extended: Option<Arc<dyn ExtendedDeviceEventListener>>,
}

#[derive(Default)]
struct DispatcherInner {
   slots: RwLock<Vec<Slot>>,
   next_slot: AtomicU64,
   /// Held for the whole delivery of an event. Reentrant so listeners
   /// may drop handles or register from inside a callback.
   delivery: ReentrantMutex<RefCell<HashMap<DeviceId, DeviceInfo>>>,
}

/// Routes device notifications to listeners.
///
/// This type is cheaply cloneable. The native trampolines feed
/// [`Dispatcher::global`]; standalone instances are useful for embedding
/// and tests.
#[derive(Clone, Default)]
pub struct Dispatcher(Arc<DispatcherInner>);

/// Keeps a listener registered. Dropping it deregisters the listener;
/// once the drop returns no further callbacks reach it.
#[derive(Debug)]
#[must_use = "dropping the handle deregisters the listener"]
pub struct ListenerHandle {
   dispatcher: Weak<DispatcherInner>,
   slot: u64,
}

impl ListenerHandle {
   /// Explicitly deregisters the listener.
   pub fn deregister(self) {}

   pub fn is_registered(&self) -> bool {
      self
         .dispatcher
         .upgrade()
         .is_some_and(|inner| inner.slots.read().iter().any(|s| s.id == self.slot))
   }
}

impl Drop for ListenerHandle {
   fn drop(&mut self) {
      let Some(inner) = self.dispatcher.upgrade() else {
         return;
      };
      // Wait for any in-flight delivery on other threads.
      let _delivery = inner.delivery.lock();
      inner.slots.write().retain(|s| s.id != self.slot);
      debug!("Listener {} deregistered", self.slot);
   }
}

/// Registers a listener with the process-wide dispatcher.
pub fn register_listener<L>(listener: Arc<L>) -> ListenerHandle
where
   L: DeviceEventListener + 'static,
{
   Dispatcher::global().register(listener)
}

/// Registers a listener for all notifications, including the extended ones.
#[cfg(feature = "extended-events")]
pub fn register_extended_listener<L>(listener: Arc<L>) -> ListenerHandle
where
   L: ExtendedDeviceEventListener + 'static,
{
   Dispatcher::global().register_extended(listener)
}

impl Dispatcher {
   pub fn new() -> Self {
      Self::default()
   }

   /// The dispatcher the native callbacks deliver to.
   pub fn global() -> &'static Self {
      &GLOBAL
   }

   pub fn register<L>(&self, listener: Arc<L>) -> ListenerHandle
   where
      L: DeviceEventListener + 'static,
   {
      self.insert(Slot {
         id: 0,
         listener,
         #[cfg(feature = "extended-events")]
         extended: None,
      })
   }

   #[cfg(feature = "extended-events")]
   pub fn register_extended<L>(&self, listener: Arc<L>) -> ListenerHandle
   where
      L: ExtendedDeviceEventListener + 'static,
   {
      self.insert(Slot {
         id: 0,
         listener: listener.clone(),
         extended: Some(listener),
      })
   }

   fn insert(&self, mut slot: Slot) -> ListenerHandle {
      let delivery = self.0.delivery.lock();
      slot.id = self.0.next_slot.fetch_add(1, Ordering::Relaxed);

      let mut replay: Vec<DeviceInfo> = delivery.borrow().values().cloned().collect();
      replay.sort_by_key(|info| info.id);

      self.0.slots.write().push(slot.clone());
      debug!(
         "Listener {} registered, replaying {} attached devices",
         slot.id,
         replay.len()
      );

      for info in replay {
         guard("device attached", || slot.listener.on_device_attached(info));
      }

      ListenerHandle {
         dispatcher: Arc::downgrade(&self.0),
         slot: slot.id,
      }
   }

   fn snapshot(&self) -> Vec<Slot> {
      self.0.slots.read().clone()
   }

   pub fn listener_count(&self) -> usize {
      self.0.slots.read().len()
   }

   /// Ids of devices currently attached, in ascending order.
   pub fn attached_ids(&self) -> Vec<DeviceId> {
      let delivery = self.0.delivery.lock();
      let mut ids: Vec<_> = delivery.borrow().keys().copied().collect();
      ids.sort_unstable();
      ids
   }

   pub fn is_attached(&self, id: DeviceId) -> bool {
      self.0.delivery.lock().borrow().contains_key(&id)
   }

   /// Delivers an attach notification.
   ///
   /// An attach for an id that is still attached means a removal was
   /// missed; listeners get a removal for the stale instance first.
   pub fn device_attached(&self, info: DeviceInfo) {
      let delivery = self.0.delivery.lock();
      let id = info.id;
      let stale = delivery.borrow_mut().insert(id, info.clone()).is_some();
      let slots = self.snapshot();

      if stale {
         warn!("Device {id} attached again without a removal, replacing it");
         for slot in &slots {
            guard("device removed", || slot.listener.on_device_removed(id));
         }
      }

      info!("Device attached: {} ({id})", info.display_name());
      for slot in &slots {
         let info = info.clone();
         guard("device attached", || slot.listener.on_device_attached(info));
      }
   }

   /// Delivers a removal. Unknown ids are logged and dropped.
   pub fn device_removed(&self, id: DeviceId) {
      let delivery = self.0.delivery.lock();
      let Some(info) = delivery.borrow_mut().remove(&id) else {
         warn!("Ignoring removal of unknown device {id}");
         return;
      };

      info!("Device removed: {} ({id})", info.display_name());
      for slot in &self.snapshot() {
         guard("device removed", || slot.listener.on_device_removed(id));
      }
   }

   /// Delivers a removal for every attached device, e.g. after the SDK
   /// shut down and will not report them anymore.
   pub fn detach_all(&self) {
      let delivery = self.0.delivery.lock();
      let mut ids: Vec<_> = delivery.borrow().keys().copied().collect();
      ids.sort_unstable();
      for id in ids {
         self.device_removed(id);
      }
      drop(delivery);
   }

   #[cfg(feature = "extended-events")]
   fn deliver_extended(
      &self,
      id: Option<DeviceId>,
      what: &str,
      f: impl Fn(&dyn ExtendedDeviceEventListener),
   ) {
      let delivery = self.0.delivery.lock();
      if let Some(id) = id
         && !delivery.borrow().contains_key(&id)
      {
         debug!("Dropping {what} for unknown device {id}");
         return;
      }
      for slot in &self.snapshot() {
         if let Some(listener) = &slot.extended {
            guard(what, || f(listener.as_ref()));
         }
      }
   }

   #[cfg(feature = "extended-events")]
   pub fn button_input(&self, id: DeviceId, usage_page: u16, usage: u16, pressed: bool) {
      self.deliver_extended(Some(id), "button input", |l| {
         l.on_button_input(id, usage_page, usage, pressed);
      });
   }

   #[cfg(feature = "extended-events")]
   pub fn button_input_translated(&self, id: DeviceId, input: HidInput, pressed: bool) {
      self.deliver_extended(Some(id), "translated button input", |l| {
         l.on_button_input_translated(id, input, pressed);
      });
   }

   #[cfg(feature = "extended-events")]
   pub fn battery_status_update(&self, id: DeviceId, status: BatteryStatus) {
      self.deliver_extended(Some(id), "battery status", |l| {
         l.on_battery_status_update(id, status.clone());
      });
   }

   #[cfg(feature = "extended-events")]
   pub fn first_scan_done(&self) {
      info!("SDK finished its first device scan");
      self.deliver_extended(None, "first scan done", |l| l.on_first_scan_done());
   }
}

/// Runs a listener callback, containing any panic it raises.
fn guard(what: &str, f: impl FnOnce()) {
   if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
      error!("Listener panicked in {what}: {}", panic_message(payload.as_ref()));
   }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
   if let Some(s) = payload.downcast_ref::<&'static str>() {
      s
   } else if let Some(s) = payload.downcast_ref::<String>() {
      s.as_str()
   } else {
      "<non-string panic>"
   }
}
