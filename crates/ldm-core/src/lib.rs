/*!
 * Linux Driver Management Core
 *
 * This crate provides the functionality shared by every linux-driver-management
 * crate: the error type, layered configuration, and logging setup.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;

/// Core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
