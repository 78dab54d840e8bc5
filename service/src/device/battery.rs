//! Battery status types.

use serde::{Deserialize, Serialize};
use serde_json::json;
use smallvec::SmallVec;

/// Which part of a device a battery reading belongs to.
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
#[strum(serialize_all = "snake_case")]
pub enum BatteryComponent {
   #[default]
   Unknown = 0,
   /// Headsets with a single battery in the headband.
   Headband = 1,
   /// Several batteries reported as one reading.
   Combined = 2,
   Right = 3,
   Left = 4,
   Cradle = 5,
   RemoteControl = 6,
}

impl BatteryComponent {
   pub fn from_raw(raw: i32) -> Self {
      Self::from_repr(raw).unwrap_or_default()
   }
}

/// Battery level of one additional unit (e.g. the other earbud).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryUnit {
   pub level: u8,
   pub component: BatteryComponent,
}

/// Battery state of a device.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryStatus {
   pub level: u8,
   pub charging: bool,
   pub low: bool,
   pub component: BatteryComponent,
   pub extra_units: SmallVec<[BatteryUnit; 2]>,
}

impl BatteryStatus {
   pub fn new(level: u8, charging: bool) -> Self {
      Self {
         level,
         charging,
         ..Default::default()
      }
   }

   pub fn to_json(&self) -> serde_json::Value {
      let extra: Vec<_> = self
         .extra_units
         .iter()
         .map(|u| json!({ "level": u.level, "component": <&str>::from(u.component) }))
         .collect();
      json!({
          "level": u32::from(self.level),
          "charging": self.charging,
          "low": self.low,
          "component": <&str>::from(self.component),
          "extra_units": extra,
      })
   }
}
