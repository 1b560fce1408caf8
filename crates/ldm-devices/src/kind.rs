/*!
 * Device kinds.
 *
 * The subsystem label reported by the enumeration source picks one kind out
 * of a closed set. Each kind carries whatever its decoder could extract.
 */
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ldm_core::error::Error;

/// PCI vendor ID for Intel
pub const PCI_VENDOR_ID_INTEL: u32 = 0x8086;
/// PCI vendor ID for NVIDIA
pub const PCI_VENDOR_ID_NVIDIA: u32 = 0x10de;
/// PCI vendor ID for AMD
pub const PCI_VENDOR_ID_AMD: u32 = 0x1002;

/// Short vendor label for the GPU vendors we care about
pub fn pci_vendor_label(vendor_id: u32) -> Option<&'static str> {
    match vendor_id {
        PCI_VENDOR_ID_INTEL => Some("Intel"),
        PCI_VENDOR_ID_NVIDIA => Some("NVIDIA"),
        PCI_VENDOR_ID_AMD => Some("AMD"),
        _ => None,
    }
}

/// Kernel subsystem families with a dedicated decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    /// Anything without a dedicated decoder
    Generic,
    /// `usb`
    Usb,
    /// `pci`
    Pci,
    /// `dmi`
    Dmi,
    /// `hid`
    Hid,
    /// `bluetooth`
    Bluetooth,
    /// `ieee80211`
    Wifi,
}

impl Subsystem {
    /// Pick the kind for a raw subsystem label. Matching is exact; unknown
    /// labels map to [`Subsystem::Generic`].
    pub fn specialize(label: &str) -> Self {
        match label {
            "usb" => Subsystem::Usb,
            "pci" => Subsystem::Pci,
            "dmi" => Subsystem::Dmi,
            "hid" => Subsystem::Hid,
            "bluetooth" => Subsystem::Bluetooth,
            "ieee80211" => Subsystem::Wifi,
            _ => Subsystem::Generic,
        }
    }

    /// The kernel label for this subsystem, `None` for generic devices
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Subsystem::Generic => None,
            Subsystem::Usb => Some("usb"),
            Subsystem::Pci => Some("pci"),
            Subsystem::Dmi => Some("dmi"),
            Subsystem::Hid => Some("hid"),
            Subsystem::Bluetooth => Some("bluetooth"),
            Subsystem::Wifi => Some("ieee80211"),
        }
    }
}

/// Location of a PCI function, as found in the last sysfs path component
/// (`dddd:bb:dd.f`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PciAddress {
    /// PCI domain (segment)
    pub domain: u16,
    /// Bus number
    pub bus: u8,
    /// Device (slot) number
    pub device: u8,
    /// Function number
    pub function: u8,
}

impl PciAddress {
    /// Parse the address from the final component of a sysfs path
    pub fn from_sysfs_path(path: &str) -> Option<Self> {
        path.rsplit('/').next().and_then(|last| last.parse().ok())
    }

    /// Bus ID in the decimal form X.Org expects, e.g. `PCI:1:0:0`
    pub fn xorg_id(&self) -> String {
        format!("PCI:{}:{}:{}", self.bus, self.device, self.function)
    }
}

impl FromStr for PciAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::other(format!("Invalid PCI address: {}", s));

        let (slot, function) = s.rsplit_once('.').ok_or_else(invalid)?;
        let mut parts = slot.split(':');
        let (domain, bus, device) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(domain), Some(bus), Some(device), None) => (domain, bus, device),
            _ => return Err(invalid()),
        };

        Ok(Self {
            domain: u16::from_str_radix(domain, 16).map_err(|_| invalid())?,
            bus: u8::from_str_radix(bus, 16).map_err(|_| invalid())?,
            device: u8::from_str_radix(device, 16).map_err(|_| invalid())?,
            function: u8::from_str_radix(function, 16).map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

/// PCI payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciInfo {
    /// Bus location, when the path carries one
    pub address: Option<PciAddress>,
    /// 24-bit class code (base, sub, prog-if)
    pub class: u32,
}

impl PciInfo {
    /// Base class byte of the class code
    pub fn base_class(&self) -> u8 {
        ((self.class >> 16) & 0xff) as u8
    }
}

/// USB payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbInfo {
    /// Whether this is an interface rather than the device itself
    pub interface: bool,
    /// Device class (for devices) or interface class (for interfaces)
    pub class: Option<u8>,
}

/// HID payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidInfo {
    /// Bus type from `HID_ID` (3 = USB, 5 = Bluetooth, ...)
    pub bus_type: u16,
}

/// DMI payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmiInfo {
    /// Board vendor
    pub board_vendor: Option<String>,
    /// Product name
    pub product_name: Option<String>,
}

/// The closed set of device kinds, each with its own payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceKind {
    /// No dedicated decoder
    Generic,
    /// USB device or interface
    Usb(UsbInfo),
    /// PCI function
    Pci(PciInfo),
    /// Firmware DMI tables
    Dmi(DmiInfo),
    /// HID device
    Hid(HidInfo),
    /// Bluetooth adapter
    Bluetooth,
    /// Wireless (ieee80211) adapter
    Wifi,
}

impl DeviceKind {
    /// A kind with an empty payload for the given subsystem
    pub fn for_subsystem(subsystem: Subsystem) -> Self {
        match subsystem {
            Subsystem::Generic => DeviceKind::Generic,
            Subsystem::Usb => DeviceKind::Usb(UsbInfo::default()),
            Subsystem::Pci => DeviceKind::Pci(PciInfo::default()),
            Subsystem::Dmi => DeviceKind::Dmi(DmiInfo::default()),
            Subsystem::Hid => DeviceKind::Hid(HidInfo::default()),
            Subsystem::Bluetooth => DeviceKind::Bluetooth,
            Subsystem::Wifi => DeviceKind::Wifi,
        }
    }

    /// The subsystem this kind belongs to
    pub fn subsystem(&self) -> Subsystem {
        match self {
            DeviceKind::Generic => Subsystem::Generic,
            DeviceKind::Usb(_) => Subsystem::Usb,
            DeviceKind::Pci(_) => Subsystem::Pci,
            DeviceKind::Dmi(_) => Subsystem::Dmi,
            DeviceKind::Hid(_) => Subsystem::Hid,
            DeviceKind::Bluetooth => Subsystem::Bluetooth,
            DeviceKind::Wifi => Subsystem::Wifi,
        }
    }

    /// PCI payload, if this is a PCI device
    pub fn as_pci(&self) -> Option<&PciInfo> {
        match self {
            DeviceKind::Pci(info) => Some(info),
            _ => None,
        }
    }

    /// USB payload, if this is a USB device or interface
    pub fn as_usb(&self) -> Option<&UsbInfo> {
        match self {
            DeviceKind::Usb(info) => Some(info),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialize() {
        assert_eq!(Subsystem::specialize("usb"), Subsystem::Usb);
        assert_eq!(Subsystem::specialize("pci"), Subsystem::Pci);
        assert_eq!(Subsystem::specialize("dmi"), Subsystem::Dmi);
        assert_eq!(Subsystem::specialize("hid"), Subsystem::Hid);
        assert_eq!(Subsystem::specialize("bluetooth"), Subsystem::Bluetooth);
        assert_eq!(Subsystem::specialize("ieee80211"), Subsystem::Wifi);
        assert_eq!(Subsystem::specialize("block"), Subsystem::Generic);
        // exact match only
        assert_eq!(Subsystem::specialize("PCI"), Subsystem::Generic);
        assert_eq!(Subsystem::specialize("usb "), Subsystem::Generic);
    }

    #[test]
    fn test_label_round_trip() {
        for subsystem in [
            Subsystem::Usb,
            Subsystem::Pci,
            Subsystem::Dmi,
            Subsystem::Hid,
            Subsystem::Bluetooth,
            Subsystem::Wifi,
        ] {
            let label = subsystem.label().unwrap();
            assert_eq!(Subsystem::specialize(label), subsystem);
        }
        assert_eq!(Subsystem::Generic.label(), None);
    }

    #[test]
    fn test_pci_address() {
        let addr = PciAddress::from_sysfs_path("/sys/devices/pci0000:00/0000:00:01.0/0000:01:00.0")
            .unwrap();
        assert_eq!(
            addr,
            PciAddress {
                domain: 0,
                bus: 1,
                device: 0,
                function: 0
            }
        );
        assert_eq!(addr.to_string(), "0000:01:00.0");

        let addr: PciAddress = "0000:3b:1f.7".parse().unwrap();
        assert_eq!(addr.bus, 0x3b);
        assert_eq!(addr.device, 0x1f);
        assert_eq!(addr.function, 7);
        assert_eq!(addr.xorg_id(), "PCI:59:31:7");

        assert!(PciAddress::from_sysfs_path("/sys/devices/platform/serial8250").is_none());
        assert!("00:02.0".parse::<PciAddress>().is_err());
    }

    #[test]
    fn test_kind_for_subsystem() {
        assert_eq!(DeviceKind::for_subsystem(Subsystem::Generic), DeviceKind::Generic);
        assert_eq!(
            DeviceKind::for_subsystem(Subsystem::Pci).subsystem(),
            Subsystem::Pci
        );
        assert!(DeviceKind::for_subsystem(Subsystem::Usb).as_usb().is_some());
        assert!(DeviceKind::Wifi.as_pci().is_none());
    }

    #[test]
    fn test_vendor_label() {
        assert_eq!(pci_vendor_label(0x8086), Some("Intel"));
        assert_eq!(pci_vendor_label(0x10DE), Some("NVIDIA"));
        assert_eq!(pci_vendor_label(0x1002), Some("AMD"));
        assert_eq!(pci_vendor_label(0x1234), None);
    }

    #[test]
    fn test_pci_base_class() {
        let info = PciInfo {
            address: None,
            class: 0x030000,
        };
        assert_eq!(info.base_class(), 0x03);
    }
}
