/*!
 * Hotplug events consumed by the daemon.
 *
 * Events are plain serde values so that they can be replayed from JSON lines
 * as easily as they are produced by a live scan:
 *
 * ```json
 * {"event":"discovered","path":"/sys/devices/pci0000:00/0000:00:02.0","subsystem":"pci"}
 * {"event":"removed","path":"/sys/devices/pci0000:00/0000:00:02.0"}
 * ```
 */
use std::fmt;

use serde::{Deserialize, Serialize};

use ldm_devices::RawDevice;

/// A device showing up, either during the initial scan or later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    /// Path of the parent device, `None` for roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,

    /// Everything the classifier needs
    #[serde(flatten)]
    pub device: RawDevice,
}

impl Discovery {
    /// A root device discovery
    pub fn root(device: RawDevice) -> Self {
        Self {
            parent_path: None,
            device,
        }
    }

    /// A discovery attached under `parent_path`
    pub fn child(parent_path: impl Into<String>, device: RawDevice) -> Self {
        Self {
            parent_path: Some(parent_path.into()),
            device,
        }
    }
}

/// Device events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum DeviceEvent {
    /// A device was added
    Discovered(Discovery),
    /// A device went away
    Removed {
        /// Sysfs path of the removed device
        path: String,
    },
}

impl DeviceEvent {
    /// Shorthand for a root discovery
    pub fn discovered(device: RawDevice) -> Self {
        DeviceEvent::Discovered(Discovery::root(device))
    }

    /// Shorthand for a child discovery
    pub fn discovered_under(parent_path: impl Into<String>, device: RawDevice) -> Self {
        DeviceEvent::Discovered(Discovery::child(parent_path, device))
    }

    /// Shorthand for a removal
    pub fn removed(path: impl Into<String>) -> Self {
        DeviceEvent::Removed { path: path.into() }
    }

    /// The path the event is about
    pub fn path(&self) -> &str {
        match self {
            DeviceEvent::Discovered(discovery) => &discovery.device.path,
            DeviceEvent::Removed { path } => path,
        }
    }

    /// Short event name, as used in logs and the JSON tag
    pub fn name(&self) -> &'static str {
        match self {
            DeviceEvent::Discovered(_) => "discovered",
            DeviceEvent::Removed { .. } => "removed",
        }
    }

    /// Whether this is a discovery
    pub fn is_discovery(&self) -> bool {
        matches!(self, DeviceEvent::Discovered(_))
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.path())
    }
}
