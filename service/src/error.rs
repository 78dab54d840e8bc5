//! Error types for the `jlink` host.
//!
//! Callbacks coming from the SDK have no error channel, so everything in
//! here is only ever returned from host-initiated operations: SDK calls,
//! session setup and configuration handling.

use std::ffi::NulError;

use thiserror::Error;

use crate::sdk::codes::ReturnCode;

/// Main error type for the `jlink` host.
#[derive(Error, Debug)]
pub enum JlinkError {
   #[error("SDK call failed: {0}")]
   Sdk(#[from] ReturnCode),

   #[error("SDK returned unknown code {0}")]
   UnknownReturnCode(i32),

   #[error("Failed to initialize the device SDK")]
   SdkInit,

   #[error("Failed to uninitialize the device SDK")]
   SdkUninit,

   #[error("An SDK session is already active")]
   SessionActive,

   #[error("SDK returned no data")]
   NoData,

   #[error("String passed to the SDK contains a NUL byte: {0}")]
   InteriorNul(#[from] NulError),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   #[error("Could not determine config directory")]
   ConfigDirNotFound,

   #[error("TOML parsing error: {0}")]
   TomlParse(#[from] toml::de::Error),

   #[error("TOML serialization error: {0}")]
   TomlSerialize(#[from] toml::ser::Error),
}

/// Convenience type alias for Results with `JlinkError`.
pub type Result<T> = std::result::Result<T, JlinkError>;
