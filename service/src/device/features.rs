//! Feature flags the SDK reports per device.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Feature codes as numbered by the SDK.
#[repr(u32)]
#[derive(
   Debug,
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
   strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum SupportedFeature {
   BusyLight = 1000,
   FactoryReset,
   PairingList,
   RemoteMmi,
   MusicEqualizer,
   EarbudInterconnectionStatus,
   StepRate,
   HeartRate,
   RrInterval,
   RingtoneUpload,
   ImageUpload,
   NeedsExplicitRebootAfterOta,
   NeedsToBePutInCradleToCompleteFwu,
   RemoteMmiV2,
   Logging,
   PreferredSoftphoneListInDevice,
   VoiceAssistant,
   PlayRingtone,
   SetDateTime,
   FullWizardMode,
   LimitedWizardMode,
   OnHeadDetection,
   SettingsChangeNotification,
   AudioStreaming,
   CustomerSupport,
   MySound,
   UiConfigurableButtons,
   ManualBusyLight,
   Whiteboard,
   Video,
   AmbienceModes,
   SealingTest,
   AmaSupport,
   AmbienceModesLoop,
   Ffanc,
   GoogleBisto,
   VirtualDirector,
   PictureInPicture,
   DateTimeIsUtc,
   RemoteControl,
   UserConfigurableHdr,
   DectBasicPairing,
   DectSecurePairing,
   DectOtaFwuSupported,
   XpressUrl,
   PasswordProvisioning,
   Ethernet,
   Wlan,
   EthernetAuthenticationCertificate,
   EthernetAuthenticationMschapv2,
   WlanAuthenticationCertificate,
   WlanAuthenticationMschapv2,
}

const FEATURE_BASE: u32 = SupportedFeature::BusyLight as u32;

impl SupportedFeature {
   pub const fn code(self) -> u32 {
      self as u32
   }

   const fn mask(self) -> u64 {
      1 << (self as u32 - FEATURE_BASE)
   }
}

/// Set of supported features, one bit per `SupportedFeature`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FeatureSet(u64);

impl FeatureSet {
   pub const fn empty() -> Self {
      Self(0)
   }

   /// Builds a set from raw SDK codes; codes it does not know are skipped.
   pub fn from_codes(codes: &[u32]) -> Self {
      codes
         .iter()
         .filter_map(|&code| SupportedFeature::from_repr(code))
         .collect()
   }

   pub fn insert(&mut self, feature: SupportedFeature) -> bool {
      let prev = self.0 & feature.mask() != 0;
      self.0 |= feature.mask();
      !prev
   }

   pub const fn contains(&self, feature: SupportedFeature) -> bool {
      self.0 & feature.mask() != 0
   }

   pub const fn is_empty(&self) -> bool {
      self.0 == 0
   }

   pub const fn len(&self) -> usize {
      self.0.count_ones() as usize
   }

   pub fn iter(&self) -> impl Iterator<Item = SupportedFeature> + '_ {
      SupportedFeature::iter().filter(|f| self.contains(*f))
   }

   pub fn to_json(&self) -> serde_json::Value {
      self.iter().map(<&str>::from).collect::<Vec<_>>().into()
   }
}

impl FromIterator<SupportedFeature> for FeatureSet {
   fn from_iter<I: IntoIterator<Item = SupportedFeature>>(iter: I) -> Self {
      let mut set = Self::empty();
      for feature in iter {
         set.insert(feature);
      }
      set
   }
}

impl fmt::Display for FeatureSet {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut first = true;
      for feature in self.iter() {
         if !first {
            f.write_str(",")?;
         }
         first = false;
         f.write_str(feature.into())?;
      }
      Ok(())
   }
}
