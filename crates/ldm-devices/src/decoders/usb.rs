/*!
 * USB decoder.
 *
 * Handles both `usb_device` and `usb_interface` records. Interfaces are marked
 * with the `INTERFACE` attribute and contribute the type bits of their class,
 * which then show up on the parent device through the composite queries.
 */
use crate::decoders::{parse_hex, KindDecoder, RawDevice};
use crate::device::{Decoded, DeviceAttribute, DeviceType};
use crate::kind::{DeviceKind, Subsystem, UsbInfo};

/// Type bits for a USB (interface) class code
fn class_type(class: u8) -> DeviceType {
    match class {
        0x01 => DeviceType::AUDIO,
        0x03 => DeviceType::HID,
        0x06 => DeviceType::IMAGE,
        0x07 => DeviceType::PRINTER,
        0x08 => DeviceType::STORAGE,
        0x0e => DeviceType::VIDEO,
        0xe0 => DeviceType::WIRELESS,
        _ => DeviceType::empty(),
    }
}

/// First field of a decimal `class/subclass/protocol` triple
fn leading_class(triple: &str) -> Option<u8> {
    triple.split('/').next().and_then(|c| c.trim().parse().ok())
}

/// Decodes `ID_VENDOR_ID`/`ID_MODEL_ID` (or `PRODUCT`), `DEVTYPE` and class codes
#[derive(Debug, Default, Clone, Copy)]
pub struct UsbDecoder;

impl KindDecoder for UsbDecoder {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Usb
    }

    fn decode(&self, raw: &RawDevice) -> Decoded {
        let mut decoded = Decoded::default();

        decoded.vendor_id = raw.property("ID_VENDOR_ID").and_then(parse_hex);
        decoded.product_id = raw.property("ID_MODEL_ID").and_then(parse_hex);

        // PRODUCT=vendor/product/bcdDevice, hex without padding
        if decoded.vendor_id.is_none() || decoded.product_id.is_none() {
            if let Some(product) = raw.property("PRODUCT") {
                let mut fields = product.split('/');
                let vendor = fields.next().and_then(parse_hex);
                let model = fields.next().and_then(parse_hex);
                decoded.vendor_id = decoded.vendor_id.or(vendor);
                decoded.product_id = decoded.product_id.or(model);
            }
        }

        let interface = raw.property("DEVTYPE") == Some("usb_interface");
        let class = if interface {
            raw.property("INTERFACE").and_then(leading_class)
        } else {
            raw.property("TYPE").and_then(leading_class)
        };

        let mut device_type = DeviceType::USB;
        if let Some(class) = class {
            device_type |= class_type(class);
        }
        decoded.device_type = Some(device_type);

        if interface {
            decoded.attributes = Some(DeviceAttribute::INTERFACE);
        }

        decoded.kind = Some(DeviceKind::Usb(UsbInfo { interface, class }));
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_device_ids() {
        let raw = RawDevice::new("/sys/devices/pci0000:00/0000:00:14.0/usb1/1-2", "usb")
            .with_property("DEVTYPE", "usb_device")
            .with_property("ID_VENDOR_ID", "046d")
            .with_property("ID_MODEL_ID", "c52b")
            .with_property("TYPE", "0/0/0");

        let decoded = UsbDecoder.decode(&raw);
        assert_eq!(decoded.vendor_id, Some(0x046d));
        assert_eq!(decoded.product_id, Some(0xc52b));
        assert_eq!(decoded.device_type, Some(DeviceType::USB));
        assert_eq!(decoded.attributes, None);
        assert_eq!(
            decoded.kind,
            Some(DeviceKind::Usb(UsbInfo {
                interface: false,
                class: Some(0)
            }))
        );
    }

    #[test]
    fn test_decode_product_fallback() {
        let raw = RawDevice::new("/sys/bus/usb/devices/2-1", "usb")
            .with_property("DEVTYPE", "usb_device")
            .with_property("PRODUCT", "46d/825/10");

        let decoded = UsbDecoder.decode(&raw);
        assert_eq!(decoded.vendor_id, Some(0x046d));
        assert_eq!(decoded.product_id, Some(0x0825));
    }

    #[test]
    fn test_decode_interfaces() {
        let video = RawDevice::new("/sys/bus/usb/devices/2-1/2-1:1.0", "usb")
            .with_property("DEVTYPE", "usb_interface")
            .with_property("INTERFACE", "14/1/0");
        let decoded = UsbDecoder.decode(&video);
        assert_eq!(decoded.device_type, Some(DeviceType::USB | DeviceType::VIDEO));
        assert_eq!(decoded.attributes, Some(DeviceAttribute::INTERFACE));

        let hid = RawDevice::new("/sys/bus/usb/devices/1-2/1-2:1.0", "usb")
            .with_property("DEVTYPE", "usb_interface")
            .with_property("INTERFACE", "3/1/2");
        assert_eq!(
            UsbDecoder.decode(&hid).device_type,
            Some(DeviceType::USB | DeviceType::HID)
        );

        let vendor_specific = RawDevice::new("/sys/bus/usb/devices/1-3/1-3:1.0", "usb")
            .with_property("DEVTYPE", "usb_interface")
            .with_property("INTERFACE", "255/0/0");
        assert_eq!(
            UsbDecoder.decode(&vendor_specific).device_type,
            Some(DeviceType::USB)
        );
    }

    #[test]
    fn test_class_types() {
        assert_eq!(class_type(0x01), DeviceType::AUDIO);
        assert_eq!(class_type(0x06), DeviceType::IMAGE);
        assert_eq!(class_type(0x07), DeviceType::PRINTER);
        assert_eq!(class_type(0x08), DeviceType::STORAGE);
        assert_eq!(class_type(0xe0), DeviceType::WIRELESS);
        assert!(class_type(0x09).is_empty());
    }
}
