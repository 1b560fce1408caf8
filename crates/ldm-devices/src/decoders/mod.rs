/*!
 * Kind-specific decoders.
 *
 * A decoder turns the raw record of a device into the handful of fields the
 * tree cares about: IDs, type bits, attribute bits and the kind payload.
 * One decoder is registered per [`Subsystem`] in the classifier and any of
 * them can be swapped out.
 */
use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::device::Decoded;
use crate::kind::Subsystem;

mod dmi;
mod hid;
mod pci;
mod usb;
mod wireless;

pub use dmi::DmiDecoder;
pub use hid::HidDecoder;
pub use pci::PciDecoder;
pub use usb::UsbDecoder;
pub use wireless::WirelessDecoder;

/// The raw record of a device as reported by the enumeration source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDevice {
    /// Sysfs path
    pub path: String,
    /// Raw subsystem label (`pci`, `usb`, ...)
    pub subsystem: String,
    /// Kernel modalias
    #[serde(default)]
    pub modalias: Option<String>,
    /// udev/hwdb properties
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// Sysfs attributes read alongside the properties (`boot_vga`, ...)
    #[serde(default)]
    pub sysattrs: HashMap<String, String>,
}

impl RawDevice {
    /// Create a raw record with no properties
    pub fn new(path: impl Into<String>, subsystem: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            subsystem: subsystem.into(),
            ..Self::default()
        }
    }

    /// Set the modalias
    pub fn with_modalias(mut self, modalias: impl Into<String>) -> Self {
        self.modalias = Some(modalias.into());
        self
    }

    /// Add a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a sysfs attribute
    pub fn with_sysattr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.sysattrs.insert(key.into(), value.into());
        self
    }

    /// Look up a property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Look up a sysfs attribute, trimmed of the trailing newline sysfs adds
    pub fn sysattr(&self, key: &str) -> Option<&str> {
        self.sysattrs.get(key).map(|v| v.trim())
    }
}

/// Decoder for one device kind
pub trait KindDecoder: Send + Sync + Debug {
    /// The subsystem this decoder handles
    fn subsystem(&self) -> Subsystem;

    /// Extract whatever fields the raw record provides
    fn decode(&self, raw: &RawDevice) -> Decoded;
}

/// The decoders installed in a default classifier
pub fn builtin() -> Vec<Box<dyn KindDecoder>> {
    vec![
        Box::new(PciDecoder),
        Box::new(UsbDecoder),
        Box::new(HidDecoder),
        Box::new(DmiDecoder),
        Box::new(WirelessDecoder::bluetooth()),
        Box::new(WirelessDecoder::wifi()),
    ]
}

/// Parse a hexadecimal ID, with or without a `0x` prefix
pub(crate) fn parse_hex(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("8086"), Some(0x8086));
        assert_eq!(parse_hex("0x10DE"), Some(0x10de));
        assert_eq!(parse_hex(" 1002\n"), Some(0x1002));
        assert_eq!(parse_hex("zz"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn test_builtin_covers_every_dedicated_kind() {
        let subsystems: Vec<Subsystem> = builtin().iter().map(|d| d.subsystem()).collect();
        for expected in [
            Subsystem::Pci,
            Subsystem::Usb,
            Subsystem::Hid,
            Subsystem::Dmi,
            Subsystem::Bluetooth,
            Subsystem::Wifi,
        ] {
            assert!(subsystems.contains(&expected), "missing {:?}", expected);
        }
        assert!(!subsystems.contains(&Subsystem::Generic));
    }

    #[test]
    fn test_raw_device_builder() {
        let raw = RawDevice::new("/sys/x", "pci")
            .with_modalias("pci:v00008086d00003E92")
            .with_property("PCI_ID", "8086:3E92")
            .with_sysattr("boot_vga", "1\n");
        assert_eq!(raw.property("PCI_ID"), Some("8086:3E92"));
        assert_eq!(raw.sysattr("boot_vga"), Some("1"));
        assert_eq!(raw.modalias.as_deref(), Some("pci:v00008086d00003E92"));
    }
}
