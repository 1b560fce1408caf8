/*!
 * Linux Driver Management Devices
 *
 * This crate provides the device model for linux-driver-management: device
 * nodes and the tree that owns them, the type/attribute classifier with its
 * per-kind decoders, and the GPU configuration resolver.
 */

#![warn(missing_docs)]

// Re-export core types
pub use ldm_core::prelude;

pub mod classifier;
pub mod decoders;
pub mod device;
pub mod gpu;
pub mod kind;
pub mod tree;

pub use classifier::Classifier;
pub use decoders::{KindDecoder, RawDevice};
pub use device::{DeviceAttribute, DeviceNode, DeviceType};
pub use gpu::{GpuConfig, GpuKind, GpuReport, GpuSummary};
pub use kind::{DeviceKind, PciAddress, Subsystem};
pub use tree::DeviceTree;

/// Devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the device system
pub fn init() -> Result<(), ldm_core::error::Error> {
    tracing::info!("linux-driver-management devices {} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_init() {
        assert!(!VERSION.is_empty());
        assert!(init().is_ok());
    }
}
