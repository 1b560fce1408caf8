/*!
 * PCI decoder.
 */
use crate::decoders::{parse_hex, KindDecoder, RawDevice};
use crate::device::{Decoded, DeviceAttribute, DeviceType};
use crate::kind::{DeviceKind, PciAddress, PciInfo, Subsystem};

/// PCI base class for display controllers
const PCI_BASE_CLASS_DISPLAY: u8 = 0x03;

/// Decodes `PCI_ID`, `PCI_CLASS` and the `boot_vga` attribute
#[derive(Debug, Default, Clone, Copy)]
pub struct PciDecoder;

impl KindDecoder for PciDecoder {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Pci
    }

    fn decode(&self, raw: &RawDevice) -> Decoded {
        let mut decoded = Decoded::default();
        let mut device_type = DeviceType::PCI;

        if let Some((vendor, product)) = raw.property("PCI_ID").and_then(|id| id.split_once(':')) {
            decoded.vendor_id = parse_hex(vendor);
            decoded.product_id = parse_hex(product);
        }

        let info = PciInfo {
            address: PciAddress::from_sysfs_path(&raw.path),
            class: raw.property("PCI_CLASS").and_then(parse_hex).unwrap_or(0),
        };
        if info.base_class() == PCI_BASE_CLASS_DISPLAY {
            device_type |= DeviceType::GPU;
        }

        if raw.sysattr("boot_vga") == Some("1") {
            decoded.attributes = Some(DeviceAttribute::BOOT_VGA);
        }

        decoded.device_type = Some(device_type);
        decoded.kind = Some(DeviceKind::Pci(info));
        decoded
    }
}
