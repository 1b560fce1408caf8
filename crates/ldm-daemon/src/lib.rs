/*!
 * Linux Driver Management Daemon
 *
 * This crate provides the hotplug event daemon: device events, observers,
 * enumeration sources, and the daemon that ties them to the device tree.
 */

#![warn(missing_docs)]

// Re-export core types
pub use ldm_core::prelude;

pub mod daemon;
pub mod event;
pub mod observer;
pub mod source;

pub use daemon::{log_gpu_report, Daemon, DaemonState};
pub use event::{DeviceEvent, Discovery};
pub use observer::{DeviceObserver, FnObserver, LoggingObserver};
pub use source::{EnumerationSource, ReplaySource, SysfsPciSource};

/// Daemon crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the daemon crate and the crates it builds on
pub fn init() -> Result<(), ldm_core::error::Error> {
    ldm_devices::init()?;
    tracing::info!("linux-driver-management daemon {} initialized", VERSION);
    Ok(())
}
