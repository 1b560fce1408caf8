/*!
 * The event daemon.
 *
 * Owns the device tree and is its only writer. Events are applied one at a
 * time: classify, attach, notify observers; or notify observers, detach.
 */
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ldm_core::config::DaemonConfig;
use ldm_core::error::{Error, Result};
use ldm_core::logging::{component_span, event_span};
use ldm_devices::{Classifier, DeviceTree, DeviceType, GpuConfig, GpuKind, GpuReport};

use crate::event::{DeviceEvent, Discovery};
use crate::observer::DeviceObserver;
use crate::source::EnumerationSource;

/// Daemon lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Constructed, initial scan not consumed yet
    Idle,
    /// Initial scan done, accepting steady-state events
    Running,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonState::Idle => write!(f, "idle"),
            DaemonState::Running => write!(f, "running"),
        }
    }
}

/// Hotplug event daemon
pub struct Daemon {
    config: DaemonConfig,
    classifier: Classifier,
    tree: DeviceTree,
    observers: Vec<Box<dyn DeviceObserver>>,
    state: DaemonState,
}

impl Daemon {
    /// Create an idle daemon with the built-in classifier
    pub fn new(config: DaemonConfig) -> Self {
        Self::with_classifier(config, Classifier::new())
    }

    /// Create an idle daemon with a custom classifier
    pub fn with_classifier(config: DaemonConfig, classifier: Classifier) -> Self {
        Self {
            config,
            classifier,
            tree: DeviceTree::new(),
            observers: Vec::new(),
            state: DaemonState::Idle,
        }
    }

    /// Add an observer. Observers are called in registration order.
    pub fn register_observer<O: DeviceObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Current lifecycle state
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Daemon configuration
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// The device tree
    pub fn tree(&self) -> &DeviceTree {
        &self.tree
    }

    /// Resolve the GPU configuration of the current tree
    pub fn gpu_config(&self) -> GpuConfig<'_> {
        GpuConfig::new(&self.tree)
    }

    /// Consume the initial scan of `source` and resolve the GPU
    /// configuration once.
    ///
    /// Only a failing scan is an error; bad records are logged and skipped.
    pub fn start(&mut self, source: &mut dyn EnumerationSource) -> Result<GpuReport> {
        if self.state != DaemonState::Idle {
            return Err(Error::invalid_state(format!("daemon is already {}", self.state)));
        }

        let span = component_span("daemon", Some(source.name()));
        let _entered = span.enter();

        let events = source.scan()?;
        let notify = self.config.notify_initial_scan;
        let mut skipped = 0;
        for event in &events {
            if let Err(e) = self.apply(event, notify) {
                warn!("Skipping {} during initial scan: {}", event, e);
                skipped += 1;
            }
        }
        info!(
            "Initial scan: {} devices in tree, {} records skipped",
            self.tree.len(),
            skipped
        );

        self.state = DaemonState::Running;

        let report = self.gpu_config().report();
        log_gpu_report(&report);
        Ok(report)
    }

    /// Apply one steady-state event
    pub fn handle_event(&mut self, event: &DeviceEvent) -> Result<()> {
        if self.state != DaemonState::Running {
            return Err(Error::invalid_state(format!(
                "cannot handle events while {}",
                self.state
            )));
        }

        // Any earlier resolution is stale once a GPU comes or goes
        if self.apply(event, true)? {
            log_gpu_report(&self.gpu_config().report());
        }
        Ok(())
    }

    /// Drain `rx` until every sender is gone. Failed events are logged and
    /// skipped. Returns the number of events applied.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<DeviceEvent>) -> Result<usize> {
        if self.state != DaemonState::Running {
            return Err(Error::invalid_state("daemon must be started before running"));
        }

        let mut applied = 0;
        while let Some(event) = rx.recv().await {
            let span = event_span(event.name(), event.path());
            match span.in_scope(|| self.handle_event(&event)) {
                Ok(()) => applied += 1,
                Err(e) if e.is_recoverable() => warn!("Failed to handle {}: {}", event, e),
                Err(e) => error!("Failed to handle {}: {}", event, e),
            }
        }

        info!("Event queue closed after {} events", applied);
        Ok(applied)
    }

    /// Returns whether a GPU was attached, replaced or detached
    fn apply(&mut self, event: &DeviceEvent, notify: bool) -> Result<bool> {
        match event {
            DeviceEvent::Discovered(discovery) => self.add_device(discovery, notify),
            DeviceEvent::Removed { path } => self.remove_device(path, notify),
        }
    }

    fn add_device(&mut self, discovery: &Discovery, notify: bool) -> Result<bool> {
        let parent = match discovery.parent_path.as_deref() {
            Some(parent_path) => Some(
                self.tree
                    .get(parent_path)
                    .ok_or_else(|| Error::not_found(format!("parent device {}", parent_path)))?,
            ),
            None => None,
        };

        let replaced = match parent {
            Some(parent) => parent.get_child_by_path(&discovery.device.path),
            None => self.tree.root(&discovery.device.path),
        };
        let replaced_gpu = replaced.map_or(false, |old| old.has_type(DeviceType::GPU));

        let node = self.classifier.classify(parent, &discovery.device)?;
        let node = self.tree.insert(node)?;
        debug!(path = %node.path(), "Device attached");

        if notify {
            for observer in self.observers.iter_mut() {
                observer.device_added(node);
            }
        }
        Ok(replaced_gpu || node.has_type(DeviceType::GPU))
    }

    fn remove_device(&mut self, path: &str, notify: bool) -> Result<bool> {
        let gpu = match self.tree.get(path) {
            Some(node) => node.has_type(DeviceType::GPU),
            None => return Err(Error::not_found(format!("device {}", path))),
        };

        if notify {
            for observer in self.observers.iter_mut() {
                observer.device_removed(path);
            }
        }
        self.tree.remove(path);
        debug!(path = %path, "Device detached");
        Ok(gpu)
    }
}

impl fmt::Debug for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon")
            .field("state", &self.state)
            .field("devices", &self.tree.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Log a GPU report
pub fn log_gpu_report(report: &GpuReport) {
    match &report.detection {
        Some(detection) => info!("Detection GPU: {}", detection),
        None => {
            warn!("No GPU devices found");
            return;
        }
    }

    match (report.kind, &report.primary) {
        (GpuKind::Optimus, Some(primary)) => {
            info!("Optimus configuration, primary GPU: {}", primary)
        }
        (kind, _) => info!("GPU configuration: {} ({} devices)", kind, report.gpus),
    }
}
