/*!
 * Device nodes and their composite type/attribute masks.
 *
 * A [`DeviceNode`] is a single entry of the device tree. Every node exclusively
 * owns its children, keyed by sysfs path, so dropping or replacing a node drops
 * its entire subtree. The parent link is only the parent's path and never owns
 * anything.
 *
 * Capability queries are composite: a USB camera whose interfaces carry the
 * `VIDEO` and `AUDIO` bits answers `true` for both at the device level.
 */
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bitflags::bitflags;
use tracing::{debug, trace};

use ldm_core::error::{Error, Result};

use crate::kind::{DeviceKind, Subsystem};

bitflags! {
    /// Primary use-cases of a device. Composite devices carry several bits,
    /// e.g. `HID | IMAGE` for a camera with buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceType: u32 {
        /// Audio device
        const AUDIO = 1 << 0;
        /// Graphics device (onboard, NVIDIA, etc.)
        const GPU = 1 << 1;
        /// Human interface device (mouse, keyboard, etc.)
        const HID = 1 << 2;
        /// Imaging device such as a camera
        const IMAGE = 1 << 3;
        /// Connected via PCI
        const PCI = 1 << 4;
        /// Printer
        const PRINTER = 1 << 5;
        /// Storage device
        const STORAGE = 1 << 6;
        /// Video device, perhaps a webcam
        const VIDEO = 1 << 7;
        /// Wireless device, i.e. dongle or mouse
        const WIRELESS = 1 << 8;
        /// Connected via USB
        const USB = 1 << 9;
    }
}

bitflags! {
    /// Special attributes queried beyond the device type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceAttribute: u32 {
        /// The GPU used to boot the system
        const BOOT_VGA = 1 << 0;
        /// Pseudo-device (USB interface, etc.)
        const INTERFACE = 1 << 1;
    }
}

impl DeviceType {
    /// The empty mask. Every node satisfies it, see [`DeviceNode::has_type`].
    pub const ANY: Self = Self::empty();
}

impl DeviceAttribute {
    /// The empty mask. Every node satisfies it, see [`DeviceNode::has_attribute`].
    pub const NONE: Self = Self::empty();
}

/// Property key holding the hwdb vendor string
pub const PROP_VENDOR_FROM_DATABASE: &str = "ID_VENDOR_FROM_DATABASE";
/// Property key holding the raw vendor string
pub const PROP_VENDOR: &str = "ID_VENDOR";
/// Property key holding the hwdb model string
pub const PROP_MODEL_FROM_DATABASE: &str = "ID_MODEL_FROM_DATABASE";
/// Property key holding the raw model string
pub const PROP_MODEL: &str = "ID_MODEL";

/// Fields a kind decoder may contribute to a node under construction.
///
/// Anything left as `None` keeps the node default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// Hardware vendor ID
    pub vendor_id: Option<u32>,
    /// Hardware product ID
    pub product_id: Option<u32>,
    /// Type bits
    pub device_type: Option<DeviceType>,
    /// Attribute bits
    pub attributes: Option<DeviceAttribute>,
    /// Kind-specific payload
    pub kind: Option<DeviceKind>,
}

/// A device in the tree
#[derive(Debug, Clone)]
pub struct DeviceNode {
    path: String,
    modalias: Option<String>,
    name: String,
    vendor: Option<String>,
    vendor_id: u32,
    product_id: u32,
    device_type: DeviceType,
    attributes: DeviceAttribute,
    kind: DeviceKind,
    properties: HashMap<String, String>,
    parent: Option<String>,
    children: BTreeMap<String, DeviceNode>,
}

impl DeviceNode {
    /// Create a new childless node.
    ///
    /// `parent` is only used to record the back-reference; the node still has
    /// to be handed to [`DeviceNode::add_child`] on that parent. Vendor and name
    /// are resolved from the hwdb properties, with the name falling back to
    /// `"Device <product id>"`.
    ///
    /// Fails with [`Error::ConstructionFailure`] if `path` is empty.
    pub fn new<I, K, V>(
        parent: Option<&DeviceNode>,
        path: impl Into<String>,
        modalias: Option<String>,
        properties: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let path = path.into();
        if path.is_empty() {
            return Err(Error::construction("device path must not be empty"));
        }

        let properties: HashMap<String, String> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let vendor = resolve(&properties, PROP_VENDOR_FROM_DATABASE, PROP_VENDOR);
        let name = resolve(&properties, PROP_MODEL_FROM_DATABASE, PROP_MODEL)
            .unwrap_or_else(|| fallback_name(0));

        Ok(Self {
            path,
            modalias,
            name,
            vendor,
            vendor_id: 0,
            product_id: 0,
            device_type: DeviceType::ANY,
            attributes: DeviceAttribute::NONE,
            kind: DeviceKind::Generic,
            properties,
            parent: parent.map(|p| p.path.clone()),
            children: BTreeMap::new(),
        })
    }

    /// Apply the kind decoder output. Runs once, before the node joins a tree.
    pub(crate) fn apply(&mut self, subsystem: Subsystem, decoded: Decoded) {
        if let Some(vendor_id) = decoded.vendor_id {
            self.vendor_id = vendor_id;
        }
        if let Some(product_id) = decoded.product_id {
            self.product_id = product_id;
        }
        if let Some(device_type) = decoded.device_type {
            self.device_type |= device_type;
        }
        if let Some(attributes) = decoded.attributes {
            self.attributes |= attributes;
        }
        self.kind = decoded.kind.unwrap_or_else(|| DeviceKind::for_subsystem(subsystem));

        // The fallback name must reflect the decoded product ID
        if resolve(&self.properties, PROP_MODEL_FROM_DATABASE, PROP_MODEL).is_none() {
            self.name = fallback_name(self.product_id);
        }
    }

    /// The sysfs path, unique among siblings
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The kernel modalias, if the device has one
    pub fn modalias(&self) -> Option<&str> {
        self.modalias.as_deref()
    }

    /// Display name (model)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display vendor (manufacturer)
    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// Hardware vendor ID, 0 if unknown
    pub fn vendor_id(&self) -> u32 {
        self.vendor_id
    }

    /// Hardware product ID, 0 if unknown
    pub fn product_id(&self) -> u32 {
        self.product_id
    }

    /// Type bits of this node alone
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Attribute bits of this node alone
    pub fn attributes(&self) -> DeviceAttribute {
        self.attributes
    }

    /// Kind selected from the subsystem, with its payload
    pub fn kind(&self) -> &DeviceKind {
        &self.kind
    }

    /// Raw hardware database properties
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Look up a single raw property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Path of the parent device, `None` for roots
    pub fn parent_path(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Whether this node is a root
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Test the type mask against this node, then depth-first against every
    /// descendant.
    ///
    /// Matching uses `(type & mask) == mask`, so an empty mask
    /// ([`DeviceType::ANY`]) is satisfied by every node.
    pub fn has_type(&self, mask: DeviceType) -> bool {
        self.device_type.contains(mask) || self.children.values().any(|c| c.has_type(mask))
    }

    /// Test the attribute mask against this node, then depth-first against
    /// every descendant.
    ///
    /// An empty mask ([`DeviceAttribute::NONE`]) is satisfied by every node.
    pub fn has_attribute(&self, mask: DeviceAttribute) -> bool {
        self.attributes.contains(mask) || self.children.values().any(|c| c.has_attribute(mask))
    }

    /// Take ownership of `child`, destroying any existing child (and its
    /// subtree) registered under the same path. Returns the attached child.
    ///
    /// The child must have been constructed with this node as its parent;
    /// nodes cannot be re-parented.
    pub fn add_child(&mut self, child: DeviceNode) -> Result<&DeviceNode> {
        if child.parent.as_deref() != Some(self.path.as_str()) {
            return Err(Error::invalid_state(format!(
                "{} was not constructed as a child of {}",
                child.path, self.path
            )));
        }

        let attached = match self.children.entry(child.path.clone()) {
            Entry::Occupied(mut slot) => {
                let old = slot.insert(child);
                debug!(
                    "Replaced {} under {} ({} descendants dropped)",
                    old.path,
                    self.path,
                    old.descendant_count()
                );
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(child),
        };
        Ok(attached)
    }

    /// Remove and destroy the child with the same path as `child`
    pub fn remove_child(&mut self, child: &DeviceNode) -> bool {
        self.remove_child_by_path(&child.path)
    }

    /// Remove and destroy the child registered under `path` together with its
    /// subtree. Returns `false` when there was no such child.
    pub fn remove_child_by_path(&mut self, path: &str) -> bool {
        self.take_child(path).is_some()
    }

    /// Detach the child registered under `path` and hand it back
    pub(crate) fn take_child(&mut self, path: &str) -> Option<DeviceNode> {
        let old = self.children.remove(path)?;
        trace!("Removed {} from {}", old.path, self.path);
        Some(old)
    }

    /// Immediate child registered under `path`
    pub fn get_child_by_path(&self, path: &str) -> Option<&DeviceNode> {
        self.children.get(path)
    }

    /// Snapshot of the immediate children, ordered by path
    pub fn children(&self) -> Vec<&DeviceNode> {
        self.children.values().collect()
    }

    /// Whether the node has any children
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.children
            .values()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }

    pub(crate) fn child_mut(&mut self, path: &str) -> Option<&mut DeviceNode> {
        self.children.get_mut(path)
    }
}

impl fmt::Display for DeviceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.vendor {
            Some(vendor) => write!(f, "{} {} ({})", vendor, self.name, self.path),
            None => write!(f, "{} ({})", self.name, self.path),
        }
    }
}

fn resolve(
    properties: &HashMap<String, String>,
    primary: &str,
    secondary: &str,
) -> Option<String> {
    properties
        .get(primary)
        .or_else(|| properties.get(secondary))
        .cloned()
}

fn fallback_name(product_id: u32) -> String {
    format!("Device {:x}", product_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(parent: Option<&DeviceNode>, path: &str) -> DeviceNode {
        DeviceNode::new(parent, path, None, Vec::<(String, String)>::new()).unwrap()
    }

    fn typed(parent: Option<&DeviceNode>, path: &str, device_type: DeviceType) -> DeviceNode {
        let mut n = node(parent, path);
        n.apply(
            Subsystem::Generic,
            Decoded {
                device_type: Some(device_type),
                ..Decoded::default()
            },
        );
        n
    }

    #[test]
    fn test_new_defaults() -> Result<()> {
        let n = DeviceNode::new(
            None,
            "/sys/devices/platform/foo",
            Some("platform:foo".to_string()),
            [("KEY", "value")],
        )?;

        assert_eq!(n.path(), "/sys/devices/platform/foo");
        assert_eq!(n.modalias(), Some("platform:foo"));
        assert_eq!(n.device_type(), DeviceType::ANY);
        assert_eq!(n.attributes(), DeviceAttribute::NONE);
        assert_eq!(n.vendor_id(), 0);
        assert_eq!(n.product_id(), 0);
        assert!(n.children().is_empty());
        assert!(n.is_root());
        assert_eq!(n.property("KEY"), Some("value"));
        assert_eq!(n.name(), "Device 0");
        assert_eq!(n.vendor(), None);
        Ok(())
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = DeviceNode::new(None, "", None, Vec::<(String, String)>::new()).unwrap_err();
        assert!(matches!(err, Error::ConstructionFailure(_)));
    }

    #[test]
    fn test_vendor_and_name_resolution() -> Result<()> {
        let n = DeviceNode::new(
            None,
            "/sys/a",
            None,
            [
                (PROP_VENDOR, "raw vendor"),
                (PROP_VENDOR_FROM_DATABASE, "Intel Corporation"),
                (PROP_MODEL, "UHD Graphics"),
            ],
        )?;
        assert_eq!(n.vendor(), Some("Intel Corporation"));
        assert_eq!(n.name(), "UHD Graphics");

        let n = DeviceNode::new(
            None,
            "/sys/b",
            None,
            [(PROP_VENDOR, "Logitech"), (PROP_MODEL_FROM_DATABASE, "Unifying Receiver")],
        )?;
        assert_eq!(n.vendor(), Some("Logitech"));
        assert_eq!(n.name(), "Unifying Receiver");
        Ok(())
    }

    #[test]
    fn test_fallback_name_uses_decoded_product_id() {
        let mut n = node(None, "/sys/c");
        n.apply(
            Subsystem::Generic,
            Decoded {
                product_id: Some(0x1234),
                ..Decoded::default()
            },
        );
        assert_eq!(n.name(), "Device 1234");
        assert_eq!(n.vendor(), None);
    }

    #[test]
    fn test_add_child_requires_matching_parent() {
        let mut a = node(None, "/sys/a");
        let b = node(None, "/sys/b");
        let stray = node(Some(&b), "/sys/b/1");

        let err = a.add_child(stray).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(!a.has_children());
    }

    #[test]
    fn test_add_child_replaces_same_path() -> Result<()> {
        let mut root = node(None, "/sys/usb1");

        let mut first = typed(Some(&root), "/sys/usb1/1-1", DeviceType::HID);
        let grandchild = node(Some(&first), "/sys/usb1/1-1/1-1:1.0");
        first.add_child(grandchild)?;
        root.add_child(first)?;
        assert_eq!(root.descendant_count(), 2);

        let second = typed(Some(&root), "/sys/usb1/1-1", DeviceType::STORAGE);
        let attached = root.add_child(second)?;
        assert_eq!(attached.device_type(), DeviceType::STORAGE);
        assert!(!attached.has_children());

        assert_eq!(root.children().len(), 1);
        let survivor = root.get_child_by_path("/sys/usb1/1-1").unwrap();
        assert_eq!(survivor.device_type(), DeviceType::STORAGE);
        assert!(survivor.get_child_by_path("/sys/usb1/1-1/1-1:1.0").is_none());
        assert!(!root.has_type(DeviceType::HID));
        Ok(())
    }

    #[test]
    fn test_remove_child_cascades() -> Result<()> {
        let mut root = node(None, "/sys/usb1");
        let mut dev = node(Some(&root), "/sys/usb1/1-1");
        let iface = typed(Some(&dev), "/sys/usb1/1-1/1-1:1.0", DeviceType::VIDEO);
        dev.add_child(iface)?;
        root.add_child(dev)?;
        assert!(root.has_type(DeviceType::VIDEO));

        assert!(root.remove_child_by_path("/sys/usb1/1-1"));
        assert!(root.children().is_empty());
        assert!(!root.has_type(DeviceType::VIDEO));

        // absent paths are not an error
        assert!(!root.remove_child_by_path("/sys/usb1/1-1"));
        Ok(())
    }

    #[test]
    fn test_remove_child_by_reference() -> Result<()> {
        let mut root = node(None, "/sys/r");
        let child = node(Some(&root), "/sys/r/c");
        let handle = child.clone();
        root.add_child(child)?;

        assert!(root.remove_child(&handle));
        assert!(root.get_child_by_path("/sys/r/c").is_none());
        Ok(())
    }

    #[test]
    fn test_has_type_is_composite() -> Result<()> {
        let mut camera = typed(None, "/sys/usb1/1-2", DeviceType::USB);
        let video = typed(Some(&camera), "/sys/usb1/1-2/1-2:1.0", DeviceType::VIDEO);
        let audio = typed(Some(&camera), "/sys/usb1/1-2/1-2:1.2", DeviceType::AUDIO);
        camera.add_child(video)?;
        camera.add_child(audio)?;

        assert!(camera.has_type(DeviceType::USB));
        assert!(camera.has_type(DeviceType::VIDEO));
        assert!(camera.has_type(DeviceType::AUDIO));
        // bits must be satisfied by a single node
        assert!(!camera.has_type(DeviceType::VIDEO | DeviceType::AUDIO));
        assert!(!camera.has_type(DeviceType::PRINTER));
        Ok(())
    }

    #[test]
    fn test_zero_mask_always_matches() {
        let n = node(None, "/sys/empty");
        assert!(n.has_type(DeviceType::ANY));
        assert!(n.has_attribute(DeviceAttribute::NONE));
    }

    #[test]
    fn test_has_attribute_walks_children() -> Result<()> {
        let mut root = node(None, "/sys/usb2");
        let mut iface = node(Some(&root), "/sys/usb2/2-1:1.0");
        iface.apply(
            Subsystem::Usb,
            Decoded {
                attributes: Some(DeviceAttribute::INTERFACE),
                ..Decoded::default()
            },
        );
        root.add_child(iface)?;

        assert!(root.has_attribute(DeviceAttribute::INTERFACE));
        assert!(!root.has_attribute(DeviceAttribute::BOOT_VGA));
        Ok(())
    }

    #[test]
    fn test_display() -> Result<()> {
        let props = [(PROP_VENDOR, "ACME"), (PROP_MODEL, "Widget")];
        let n = DeviceNode::new(None, "/sys/x", None, props)?;
        assert_eq!(n.to_string(), "ACME Widget (/sys/x)");
        Ok(())
    }
}
