//! Button input reported by the SDK.

use serde::{Deserialize, Serialize};

/// Semantic button/state codes the SDK translates HID reports into.
#[repr(i32)]
#[derive(
   Debug,
   Default,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Hash,
   Serialize,
   Deserialize,
   strum::FromRepr,
   strum::Display,
   strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum HidInput {
   #[default]
   Undefined = 0,
   OffHook,
   Mute,
   Flash,
   Redial,
   Key0,
   Key1,
   Key2,
   Key3,
   Key4,
   Key5,
   Key6,
   Key7,
   Key8,
   Key9,
   KeyStar,
   KeyPound,
   KeyClear,
   Online,
   SpeedDial,
   VoiceMail,
   LineBusy,
   RejectCall,
   OutOfRange,
   PseudoOffHook,
   Button1,
   Button2,
   Button3,
   VolumeUp,
   VolumeDown,
   FireAlarm,
   JackConnection,
   QdConnection,
   HeadsetConnection,
}

impl HidInput {
   pub fn from_raw(raw: i32) -> Self {
      Self::from_repr(raw).unwrap_or_default()
   }
}

/// One button notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonInput {
   /// Raw HID usage pass-through.
   Raw {
      usage_page: u16,
      usage: u16,
      pressed: bool,
   },
   /// Input decoded by the SDK.
   Translated { input: HidInput, pressed: bool },
}
