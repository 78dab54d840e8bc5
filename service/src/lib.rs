//! Host side of the Jabra headset SDK.
//!
//! The SDK reports hardware events through C callbacks on its own
//! threads. `jlink` exposes those as Rust listener traits
//! ([`DeviceEventListener`] and, with the `extended-events` feature,
//! [`ExtendedDeviceEventListener`]), copies every native structure into
//! owned values at the boundary and keeps the host's view of attached
//! devices in a [`DeviceRegistry`].
//!
//! Build with the `native` feature to link against `libjabra`; without it
//! a simulated SDK drives the same entry points.

pub mod boundary;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod sdk;

#[cfg(feature = "extended-events")]
pub use boundary::{ExtendedDeviceEventListener, register_extended_listener};
pub use boundary::{DeviceEventListener, Dispatcher, ListenerHandle, register_listener};
pub use device::{DeviceId, DeviceInfo, DeviceRegistry};
pub use error::{JlinkError, Result};
