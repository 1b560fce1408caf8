/*!
 * DMI decoder. DMI carries no IDs or type bits, only board identification.
 */
use crate::decoders::{KindDecoder, RawDevice};
use crate::device::Decoded;
use crate::kind::{DeviceKind, DmiInfo, Subsystem};

/// Records `board_vendor` and `product_name`
#[derive(Debug, Default, Clone, Copy)]
pub struct DmiDecoder;

impl KindDecoder for DmiDecoder {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Dmi
    }

    fn decode(&self, raw: &RawDevice) -> Decoded {
        let info = DmiInfo {
            board_vendor: raw.sysattr("board_vendor").map(str::to_string),
            product_name: raw.sysattr("product_name").map(str::to_string),
        };
        Decoded {
            kind: Some(DeviceKind::Dmi(info)),
            ..Decoded::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dmi() {
        let raw = RawDevice::new("/sys/devices/virtual/dmi/id", "dmi")
            .with_sysattr("board_vendor", "LENOVO\n")
            .with_sysattr("product_name", "20KH006JUK\n");

        let decoded = DmiDecoder.decode(&raw);
        assert_eq!(decoded.device_type, None);
        assert_eq!(
            decoded.kind,
            Some(DeviceKind::Dmi(DmiInfo {
                board_vendor: Some("LENOVO".to_string()),
                product_name: Some("20KH006JUK".to_string()),
            }))
        );
    }
}
