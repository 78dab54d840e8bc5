//! Status and return codes reported by the device SDK.

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{JlinkError, Result};

/// Non-success return codes of SDK calls. `0` means success and has no
/// variant here.
#[repr(i32)]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr)]
pub enum ReturnCode {
   #[error("The device is not known")]
   DeviceUnknown = 1,
   #[error("The device is invalid")]
   DeviceInvalid = 2,
   #[error("The device is not supported")]
   NotSupported = 3,
   #[error("One or more parameters are wrong")]
   ParameterFail = 4,
   #[error("The setting you are attempting to write is protected")]
   ProtectedSettingWrite = 5,
   #[error("No info available")]
   NoInformation = 6,
   #[error("Network failure")]
   NetworkRequestFail = 7,
   #[error("Failed writing to the device")]
   DeviceWriteFail = 8,
   #[error("Failed reading from the device")]
   DeviceReadFail = 9,
   #[error("Factory reset is not supported or allowed")]
   NoFactorySupported = 10,
   #[error("System error")]
   SystemError = 11,
   #[error("The device is in a bad state")]
   DeviceBadState = 12,
   #[error("Failed writing to file")]
   FileWriteFail = 13,
   #[error("The file already exists")]
   FileAlreadyExists = 14,
   #[error("The file is not accessible")]
   FileNotAccessible = 15,
   #[error("Firmware is up-to-date")]
   FirmwareUpToDate = 16,
   #[error("Firmware is available")]
   FirmwareAvailable = 17,
   #[error("Asynch operation has started in the background")]
   Async = 18,
   #[error("Authorization failure")]
   InvalidAuthorization = 19,
   #[error("The FW updater application is unavailable")]
   FwuApplicationNotAvailable = 20,
   #[error("The device is already connected")]
   DeviceAlreadyConnected = 21,
   #[error("The device is not connected")]
   DeviceNotConnected = 22,
   #[error("Unable to clear, device is connected")]
   CannotClearDeviceConnected = 23,
   #[error("The device rebooted")]
   DeviceRebooted = 24,
   #[error("Upload is already in progress")]
   UploadAlreadyInProgress = 25,
   #[error("Download is already in progress")]
   DownloadAlreadyInProgress = 26,
   #[error("The SDK is too old to update the selected firmware")]
   SdkTooOldForFwUpdate = 27,
   #[error("Firmware update through OTA is not supported for this device")]
   NoOtaUpdateSupport = 28,
   #[error("Non Jabra device detection is disabled")]
   NonJabraDeviceDetectionDisabled = 29,
   #[error("Device is locked")]
   DeviceLock = 30,
   #[error("Device is not locked")]
   DeviceNotLock = 31,
   #[error("Operation timed out")]
   Timeout = 32,
}

/// Maps a raw SDK return code to a `Result`.
pub fn check(code: i32) -> Result<()> {
   if code == 0 {
      return Ok(());
   }
   match ReturnCode::from_repr(code) {
      Some(rc) => Err(JlinkError::Sdk(rc)),
      None => Err(JlinkError::UnknownReturnCode(code)),
   }
}

/// Per-device status the SDK attaches to a device descriptor.
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
pub enum ErrorStatus {
   #[default]
   #[strum(to_string = "No Error")]
   NoError = 0,
   #[strum(to_string = "SSL Handshake failed")]
   SslError = 1,
   #[strum(to_string = "Failed to Authenticate Server Certificate")]
   CertError = 2,
   #[strum(to_string = "Unable to download the files")]
   NetworkError = 3,
   #[strum(to_string = "Setting files download failed")]
   DownloadError = 4,
   #[strum(to_string = "Unable to retrieve device settings")]
   ParseError = 5,
   #[strum(to_string = "Unknown error")]
   OtherError = 6,
   #[strum(to_string = "Unable to retrieve device information")]
   DeviceInfoError = 7,
   #[strum(to_string = "File is not accessible")]
   FileNotAccessible = 8,
   #[strum(to_string = "File is not compatible for the device")]
   FileNotCompatible = 9,
   #[strum(to_string = "The specified device is not found")]
   DeviceNotFound = 10,
   #[strum(to_string = "Incorrect parameters")]
   ParameterFail = 11,
   #[strum(to_string = "Authorization failed")]
   AuthorizationFailed = 12,
   #[strum(to_string = "Files are not available for the device")]
   FileNotAvailable = 13,
   #[strum(to_string = "Config XML parse error")]
   ConfigParseError = 14,
   #[strum(to_string = "Error in applying settings")]
   SetSettingsFail = 15,
   #[strum(to_string = "Device will reboot due to change in the settings")]
   DeviceReboot = 16,
   #[strum(to_string = "Unable to read settings from the device")]
   DeviceReadFail = 17,
   #[strum(to_string = "The device is not ready")]
   DeviceNotReady = 18,
   #[strum(to_string = "Partial Settings loaded")]
   FilePartiallyCompatible = 19,
   #[strum(to_string = "The SDK is too old to update the selected firmware")]
   SdkTooOldForFwUpdate = 20,
   #[strum(to_string = "The resource is not yet ready to be updated")]
   UpdateIsNotReady = 21,
}

impl ErrorStatus {
   /// Decodes a raw status, folding unknown values into `OtherError`.
   pub fn from_raw(raw: i32) -> Self {
      Self::from_repr(raw).unwrap_or_else(|| {
         debug!("Unknown device error status {raw}");
         Self::OtherError
      })
   }

   pub const fn is_error(self) -> bool {
      !matches!(self, Self::NoError)
   }
}
