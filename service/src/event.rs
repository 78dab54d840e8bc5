//! Event handling for device state changes.
//!
//! The registry turns boundary callbacks into `DeviceEvent`s and hands
//! them to an `EventBus`, which lets the host react outside of the SDK's
//! callback context.

use std::sync::Arc;

use crate::device::{BatteryStatus, ButtonInput, DeviceId, DeviceInfo, FeatureSet, PairingList};

/// Events that can be emitted by the device registry.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
   Attached(DeviceInfo),
   /// A known device came back under a new id. Its state moved along.
   Reattached {
      previous: DeviceId,
      info: DeviceInfo,
   },
   Removed,
   BatteryUpdated(BatteryStatus),
   /// The last battery reading is no longer valid.
   BatteryCleared,
   FeaturesResolved(FeatureSet),
   PairingListUpdated(PairingList),
   ButtonInput(ButtonInput),
   FirstScanDone,
}

/// Trait for implementing event emission.
pub trait EventBus: Send + Sync {
   /// Emits an event for a device. `FirstScanDone` carries the default id.
   fn emit(&self, device: DeviceId, event: DeviceEvent);
}

/// Type alias for a thread-safe event sender.
pub type EventSender = Arc<dyn EventBus>;
