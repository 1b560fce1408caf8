/*!
 * GPU configuration resolver.
 *
 * A read-only view over a [`DeviceTree`] that works out whether the machine
 * has a single GPU or an Optimus (integrated boot GPU + discrete GPU) pair,
 * and which devices play which role. The view borrows the tree, so it has to
 * be rebuilt after any removal.
 */
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ldm_core::error::{Error, Result};

use crate::device::{DeviceAttribute, DeviceNode, DeviceType};
use crate::kind::pci_vendor_label;
use crate::tree::DeviceTree;

/// GPU topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuKind {
    /// Exactly one GPU
    Single,
    /// Two or more GPUs, exactly one of which booted the system
    Optimus,
    /// Anything else, including no GPU at all
    Unknown,
}

impl fmt::Display for GpuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GpuKind::Single => "single",
            GpuKind::Optimus => "optimus",
            GpuKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Resolved GPU configuration
#[derive(Debug, Clone)]
pub struct GpuConfig<'a> {
    gpus: Vec<&'a DeviceNode>,
    kind: GpuKind,
}

impl<'a> GpuConfig<'a> {
    /// Resolve the GPU configuration of `tree`
    pub fn new(tree: &'a DeviceTree) -> Self {
        let gpus = tree.devices_with_type(DeviceType::GPU);
        let boot_count = gpus.iter().filter(|gpu| is_boot_vga(gpu)).count();

        let kind = match (gpus.len(), boot_count) {
            (1, _) => GpuKind::Single,
            (n, 1) if n >= 2 => GpuKind::Optimus,
            _ => GpuKind::Unknown,
        };
        debug!(gpus = gpus.len(), boot_vga = boot_count, %kind, "Resolved GPU configuration");

        Self { gpus, kind }
    }

    /// The configuration kind
    pub fn kind(&self) -> GpuKind {
        self.kind
    }

    /// Whether the configuration is of the given kind
    pub fn has_kind(&self, kind: GpuKind) -> bool {
        self.kind == kind
    }

    /// Every GPU-capable device found, in traversal order
    pub fn gpus(&self) -> &[&'a DeviceNode] {
        &self.gpus
    }

    /// The device used for detection: the boot GPU if there is one, otherwise
    /// the first GPU found.
    pub fn detection_device(&self) -> Result<&'a DeviceNode> {
        self.gpus
            .iter()
            .find(|gpu| is_boot_vga(gpu))
            .or_else(|| self.gpus.first())
            .copied()
            .ok_or_else(|| Error::not_found("no GPU devices"))
    }

    /// The discrete GPU of an Optimus pair, i.e. the one that did not boot
    /// the system.
    pub fn primary_device(&self) -> Result<&'a DeviceNode> {
        if self.kind != GpuKind::Optimus {
            return Err(Error::invalid_state(format!(
                "primary device is only defined for optimus configurations, not {}",
                self.kind
            )));
        }
        self.gpus
            .iter()
            .find(|gpu| !is_boot_vga(gpu))
            .copied()
            .ok_or_else(|| Error::not_found("no non-boot GPU"))
    }

    /// Owned summary suitable for logging or serializing
    pub fn report(&self) -> GpuReport {
        GpuReport {
            kind: self.kind,
            detection: self.detection_device().ok().map(GpuSummary::from),
            primary: self.primary_device().ok().map(GpuSummary::from),
            gpus: self.gpus.len(),
        }
    }
}

fn is_boot_vga(gpu: &DeviceNode) -> bool {
    gpu.has_attribute(DeviceAttribute::BOOT_VGA)
}

/// Summary of one GPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSummary {
    /// Sysfs path
    pub path: String,
    /// Vendor string, or the short label for well-known vendor IDs
    pub vendor: Option<String>,
    /// Display name
    pub name: String,
    /// PCI vendor ID
    pub vendor_id: u32,
    /// PCI product ID
    pub product_id: u32,
    /// X.Org bus ID, for PCI devices
    pub xorg_id: Option<String>,
}

impl From<&DeviceNode> for GpuSummary {
    fn from(node: &DeviceNode) -> Self {
        let vendor = node
            .vendor()
            .map(str::to_string)
            .or_else(|| pci_vendor_label(node.vendor_id()).map(str::to_string));
        let xorg_id = node
            .kind()
            .as_pci()
            .and_then(|pci| pci.address)
            .map(|address| address.xorg_id());

        Self {
            path: node.path().to_string(),
            vendor,
            name: node.name().to_string(),
            vendor_id: node.vendor_id(),
            product_id: node.product_id(),
            xorg_id,
        }
    }
}

impl fmt::Display for GpuSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{:04x}:{:04x}]",
            self.vendor.as_deref().unwrap_or("<unknown>"),
            self.name,
            self.vendor_id,
            self.product_id
        )?;
        if let Some(xorg_id) = &self.xorg_id {
            write!(f, " ({})", xorg_id)?;
        }
        Ok(())
    }
}

/// Owned result of a GPU resolution pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuReport {
    /// Configuration kind
    pub kind: GpuKind,
    /// Detection device, if any GPU exists
    pub detection: Option<GpuSummary>,
    /// Primary device, only for Optimus
    pub primary: Option<GpuSummary>,
    /// Number of GPU-capable devices found
    pub gpus: usize,
}
