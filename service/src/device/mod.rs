//! Host-side device model.
//!
//! Value types copied out of the SDK at the callback boundary, plus the
//! registry the host application keeps its view of attached devices in.

pub mod battery;
pub mod features;
pub mod info;
pub mod input;
pub mod pairing;
pub mod registry;

pub use battery::{BatteryComponent, BatteryStatus, BatteryUnit};
pub use features::{FeatureSet, SupportedFeature};
pub use info::{ConnectionType, DeviceId, DeviceInfo, DeviceKind};
pub use input::{ButtonInput, HidInput};
pub use pairing::{BtAddress, DeviceListType, PairedDevice, PairingList};
pub use registry::{DeviceRecord, DeviceRegistry, UpdateOp};
