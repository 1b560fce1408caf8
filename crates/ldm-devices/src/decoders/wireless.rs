/*!
 * Bluetooth and ieee80211 decoder. Both only contribute the `WIRELESS` bit.
 */
use crate::decoders::{KindDecoder, RawDevice};
use crate::device::{Decoded, DeviceType};
use crate::kind::{DeviceKind, Subsystem};

/// Marks radios as wireless
#[derive(Debug, Clone, Copy)]
pub struct WirelessDecoder {
    subsystem: Subsystem,
}

impl WirelessDecoder {
    /// Decoder for `bluetooth` adapters
    pub fn bluetooth() -> Self {
        Self {
            subsystem: Subsystem::Bluetooth,
        }
    }

    /// Decoder for `ieee80211` adapters
    pub fn wifi() -> Self {
        Self {
            subsystem: Subsystem::Wifi,
        }
    }
}

impl KindDecoder for WirelessDecoder {
    fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    fn decode(&self, _raw: &RawDevice) -> Decoded {
        Decoded {
            device_type: Some(DeviceType::WIRELESS),
            kind: Some(DeviceKind::for_subsystem(self.subsystem)),
            ..Decoded::default()
        }
    }
}
