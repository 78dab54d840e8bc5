//! Configuration management for the `jlink` host.
//!
//! This module handles loading and saving the TOML configuration, which
//! controls how the SDK session is set up and how battery and dongle
//! pairing state are refreshed.

use std::{
   env, fs,
   path::{Path, PathBuf},
   time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{JlinkError, Result};

/// Main configuration structure for the host.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
   /// Application id registered with the SDK before initialization.
   #[serde(default = "default_app_id")]
   pub app_id: String,

   /// Also report devices from other vendors.
   #[serde(default)]
   pub non_jabra_device_detection: bool,

   #[serde(default = "default_battery_polling")]
   pub battery_polling: bool,

   #[serde(default = "default_battery_poll_interval")]
   pub battery_poll_interval_ms: u64,

   /// Register the SDK's battery callback in addition to polling. Some
   /// devices report late or stale levels through it.
   #[serde(default)]
   pub battery_callback: bool,

   /// Poll the pairing list of dongles that support one.
   #[serde(default = "default_pairing_list_polling")]
   pub pairing_list_polling: bool,

   #[serde(default = "default_pairing_list_poll_interval")]
   pub pairing_list_poll_interval_ms: u64,
}

fn default_app_id() -> String {
   "JabraLink".to_string()
}

const fn default_battery_polling() -> bool {
   true
}

const fn default_battery_poll_interval() -> u64 {
   1000
}

const fn default_pairing_list_polling() -> bool {
   true
}

const fn default_pairing_list_poll_interval() -> u64 {
   1000
}

impl Default for Config {
   fn default() -> Self {
      Self {
         app_id: default_app_id(),
         non_jabra_device_detection: false,
         battery_polling: default_battery_polling(),
         battery_poll_interval_ms: default_battery_poll_interval(),
         battery_callback: false,
         pairing_list_polling: default_pairing_list_polling(),
         pairing_list_poll_interval_ms: default_pairing_list_poll_interval(),
      }
   }
}

impl Config {
   /// Loads configuration from disk or creates default if not exists.
   pub fn load() -> Result<Self> {
      Self::load_from(&Self::config_path()?)
   }

   /// Saves the current configuration to disk.
   pub fn save(&self) -> Result<()> {
      self.save_to(&Self::config_path()?)
   }

   pub fn load_from(path: &Path) -> Result<Self> {
      if path.exists() {
         let contents = fs::read_to_string(path)?;
         Ok(toml::from_str(&contents)?)
      } else {
         let config = Self::default();
         config.save_to(path)?;
         Ok(config)
      }
   }

   pub fn save_to(&self, path: &Path) -> Result<()> {
      // Ensure directory exists
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent)?;
      }

      let contents = toml::to_string_pretty(self)?;
      fs::write(path, contents)?;

      Ok(())
   }

   pub const fn battery_poll_interval(&self) -> Duration {
      Duration::from_millis(self.battery_poll_interval_ms)
   }

   pub const fn pairing_list_poll_interval(&self) -> Duration {
      Duration::from_millis(self.pairing_list_poll_interval_ms)
   }

   pub fn config_path() -> Result<PathBuf> {
      let config_dir = if let Ok(jlink_home) = env::var("JLINK_HOME") {
         PathBuf::from(jlink_home)
      } else if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
         PathBuf::from(config_home)
      } else if let Ok(home) = env::var("HOME") {
         PathBuf::from(home).join(".config")
      } else {
         dirs::config_dir().ok_or(JlinkError::ConfigDirNotFound)?
      };

      Ok(config_dir.join("jlink").join("config.toml"))
   }
}
