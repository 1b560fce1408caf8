/*!
 * HID decoder.
 */
use crate::decoders::{parse_hex, KindDecoder, RawDevice};
use crate::device::{Decoded, DeviceType};
use crate::kind::{DeviceKind, HidInfo, Subsystem};

/// Decodes `HID_ID=bus:vendor:product`
#[derive(Debug, Default, Clone, Copy)]
pub struct HidDecoder;

impl KindDecoder for HidDecoder {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Hid
    }

    fn decode(&self, raw: &RawDevice) -> Decoded {
        let mut decoded = Decoded {
            device_type: Some(DeviceType::HID),
            ..Decoded::default()
        };
        let mut info = HidInfo::default();

        if let Some(id) = raw.property("HID_ID") {
            let mut fields = id.split(':');
            let bus = fields.next().and_then(parse_hex);
            if let Some(bus) = bus.and_then(|bus| u16::try_from(bus).ok()) {
                info.bus_type = bus;
            }
            decoded.vendor_id = fields.next().and_then(parse_hex);
            decoded.product_id = fields.next().and_then(parse_hex);
        }

        decoded.kind = Some(DeviceKind::Hid(info));
        decoded
    }
}
