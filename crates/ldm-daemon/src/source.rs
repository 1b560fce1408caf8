/*!
 * Enumeration sources.
 *
 * A source delivers the initial bulk scan synchronously and then feeds
 * steady-state events into the daemon's queue from its own task.
 */
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use ldm_core::error::{Error, Result};
use ldm_devices::RawDevice;

use crate::event::DeviceEvent;

/// Where devices come from
pub trait EnumerationSource: Send + Debug {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// The initial bulk scan, parents before children.
    ///
    /// Failing here is fatal for the daemon.
    fn scan(&mut self) -> Result<Vec<DeviceEvent>>;

    /// Start delivering steady-state events into `tx`. The daemon's run loop
    /// ends once every sender has been dropped.
    fn subscribe(&mut self, tx: mpsc::Sender<DeviceEvent>) -> JoinHandle<()>;
}

/// Replays JSON-lines event records.
///
/// The leading block of `discovered` records is the initial scan; every
/// record after the first non-discovery is delivered as a steady-state event.
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Default)]
pub struct ReplaySource {
    initial: Vec<DeviceEvent>,
    pending: Vec<DeviceEvent>,
}

impl ReplaySource {
    /// Parse every record from `reader`
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let event: DeviceEvent = serde_json::from_str(line)
                .map_err(|e| Error::serialization(format!("line {}: {}", index + 1, e)))?;
            events.push(event);
        }

        let split = events
            .iter()
            .position(|event| !event.is_discovery())
            .unwrap_or(events.len());
        let pending = events.split_off(split);

        debug!(initial = events.len(), pending = pending.len(), "Loaded replay events");
        Ok(Self {
            initial: events,
            pending,
        })
    }

    /// Open and parse a replay file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| {
            Error::other(format!("Failed to open replay file {}: {}", path.display(), e))
        })?;
        info!("Replaying device events from {}", path.display());
        Self::from_reader(BufReader::new(file))
    }

    /// Number of steady-state events not yet delivered
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl EnumerationSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn scan(&mut self) -> Result<Vec<DeviceEvent>> {
        Ok(std::mem::take(&mut self.initial))
    }

    fn subscribe(&mut self, tx: mpsc::Sender<DeviceEvent>) -> JoinHandle<()> {
        let pending = std::mem::take(&mut self.pending);
        tokio::spawn(async move {
            for event in pending {
                if tx.send(event).await.is_err() {
                    warn!("Event queue closed, dropping remaining replay events");
                    break;
                }
            }
            debug!("Replay finished");
        })
    }
}

/// Scans PCI functions from a sysfs mount.
///
/// Every function is reported as a root device; bridges are not modelled as
/// parents. There is no hotplug monitor, so after the scan the source only
/// keeps the queue open until the process is interrupted.
#[derive(Debug, Clone)]
pub struct SysfsPciSource {
    root: PathBuf,
}

impl SysfsPciSource {
    /// Create a source reading from `sysfs_root` (normally `/sys`)
    pub fn new<P: Into<PathBuf>>(sysfs_root: P) -> Self {
        Self {
            root: sysfs_root.into(),
        }
    }

    /// The directory holding one symlink per PCI function
    pub fn devices_dir(&self) -> PathBuf {
        self.root.join("bus").join("pci").join("devices")
    }

    fn read_device(link: &Path) -> Result<RawDevice> {
        let path = fs::canonicalize(link)?;
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::other(format!("Non UTF-8 sysfs path {}", path.display())))?
            .to_string();

        let mut raw = RawDevice::new(path_str, "pci");
        if let Some(uevent) = read_attr(&path, "uevent") {
            raw.properties = parse_uevent(&uevent);
        }
        raw.modalias = read_attr(&path, "modalias").map(|m| m.trim().to_string());
        if let Some(boot_vga) = read_attr(&path, "boot_vga") {
            raw.sysattrs.insert("boot_vga".to_string(), boot_vga);
        }

        trace!(path = %raw.path, properties = raw.properties.len(), "Read PCI device");
        Ok(raw)
    }
}

impl EnumerationSource for SysfsPciSource {
    fn name(&self) -> &'static str {
        "sysfs-pci"
    }

    fn scan(&mut self) -> Result<Vec<DeviceEvent>> {
        let dir = self.devices_dir();
        let entries = fs::read_dir(&dir)
            .map_err(|e| Error::other(format!("Failed to read {}: {}", dir.display(), e)))?;

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry?;
            match Self::read_device(&entry.path()) {
                Ok(raw) => devices.push(raw),
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }
        devices.sort_by(|a, b| a.path.cmp(&b.path));

        info!("Found {} PCI devices under {}", devices.len(), dir.display());
        Ok(devices.into_iter().map(DeviceEvent::discovered).collect())
    }

    fn subscribe(&mut self, tx: mpsc::Sender<DeviceEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to wait for interrupt: {}", e);
            }
            debug!("Interrupted, closing the event queue");
            drop(tx);
        })
    }
}

fn read_attr(device: &Path, name: &str) -> Option<String> {
    fs::read_to_string(device.join(name)).ok()
}

/// Parse `KEY=VALUE` lines as written by the kernel into `uevent`
fn parse_uevent(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
