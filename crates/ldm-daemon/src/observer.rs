/*!
 * Device observers.
 *
 * Observers are called synchronously, in registration order, for every
 * device the daemon adds or removes. An observer only ever sees a borrowed
 * node; anything it wants to keep has to be copied out.
 */
use std::fmt;

use tracing::info;

use ldm_devices::{DeviceNode, DeviceType};

/// Receives add/remove notifications from the daemon
pub trait DeviceObserver: Send {
    /// Called after `node` has been attached to the tree
    fn device_added(&mut self, node: &DeviceNode);

    /// Called before the device at `path` (and its subtree) is removed
    fn device_removed(&mut self, path: &str);
}

/// Closure adapter for [`DeviceObserver`]
pub struct FnObserver<A, R> {
    added: A,
    removed: R,
}

impl<A, R> FnObserver<A, R>
where
    A: FnMut(&DeviceNode) + Send,
    R: FnMut(&str) + Send,
{
    /// Create an observer from an add and a remove callback
    pub fn new(added: A, removed: R) -> Self {
        Self { added, removed }
    }
}

impl<A> FnObserver<A, fn(&str)>
where
    A: FnMut(&DeviceNode) + Send,
{
    /// Create an observer that only cares about additions
    pub fn on_added(added: A) -> Self {
        Self {
            added,
            removed: |_| {},
        }
    }
}

impl<A, R> DeviceObserver for FnObserver<A, R>
where
    A: FnMut(&DeviceNode) + Send,
    R: FnMut(&str) + Send,
{
    fn device_added(&mut self, node: &DeviceNode) {
        (self.added)(node)
    }

    fn device_removed(&mut self, path: &str) {
        (self.removed)(path)
    }
}

impl<A, R> fmt::Debug for FnObserver<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver").finish_non_exhaustive()
    }
}

/// Logs every addition and removal
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl DeviceObserver for LoggingObserver {
    fn device_added(&mut self, node: &DeviceNode) {
        info!(
            path = %node.path(),
            "Device added: {} {}",
            node.vendor().unwrap_or("<unknown>"),
            node.name()
        );
        if node.has_type(DeviceType::HID) {
            info!(path = %node.path(), "HID device");
        }
        if node.has_type(DeviceType::STORAGE) {
            info!(path = %node.path(), "Storage device");
        }
    }

    fn device_removed(&mut self, path: &str) {
        info!(path = %path, "Device removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use ldm_devices::{Classifier, RawDevice};

    fn webcam() -> DeviceNode {
        let raw = RawDevice::new("/usb1/1-2", "usb")
            .with_property("ID_VENDOR_FROM_DATABASE", "Logitech, Inc.")
            .with_property("ID_MODEL_FROM_DATABASE", "Webcam C270");
        Classifier::new().classify(None, &raw).unwrap()
    }

    #[test]
    fn test_fn_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let added = seen.clone();
        let removed = seen.clone();
        let mut observer = FnObserver::new(
            move |node: &DeviceNode| added.lock().unwrap().push(format!("+{}", node.name())),
            move |path: &str| removed.lock().unwrap().push(format!("-{}", path)),
        );

        observer.device_added(&webcam());
        observer.device_removed("/usb1/1-2");

        assert_eq!(*seen.lock().unwrap(), vec!["+Webcam C270", "-/usb1/1-2"]);
    }

    #[test]
    fn test_on_added_ignores_removals() {
        let mut count = 0;
        {
            let mut observer = FnObserver::on_added(|_: &DeviceNode| count += 1);
            observer.device_added(&webcam());
            observer.device_removed("/usb1/1-2");
        }
        assert_eq!(count, 1);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured_logs(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn keyboard() -> DeviceNode {
        let raw = RawDevice::new("/usb1/1-1/1-1:1.0", "usb")
            .with_property("DEVTYPE", "usb_interface")
            .with_property("INTERFACE", "3/1/1")
            .with_property("ID_MODEL", "USB Keyboard");
        Classifier::new().classify(None, &raw).unwrap()
    }

    #[test]
    fn test_logging_observer_on_add() {
        let logs = captured_logs(|| LoggingObserver.device_added(&webcam()));
        assert!(logs.contains("Device added: Logitech, Inc. Webcam C270"));
        assert!(logs.contains("path=/usb1/1-2"));
        assert!(!logs.contains("HID device"));
        assert!(!logs.contains("Storage device"));

        let logs = captured_logs(|| LoggingObserver.device_added(&keyboard()));
        assert!(logs.contains("Device added: <unknown> USB Keyboard"));
        assert!(logs.contains("HID device"));
        assert!(!logs.contains("Storage device"));
    }

    #[test]
    fn test_logging_observer_on_remove() {
        let logs = captured_logs(|| LoggingObserver.device_removed("/usb1/1-2"));
        assert!(logs.contains("Device removed"));
        assert!(logs.contains("path=/usb1/1-2"));
    }
}
