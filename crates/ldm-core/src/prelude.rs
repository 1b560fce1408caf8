/*!
 * Prelude module for the core crate.
 *
 * Re-exports the types and macros almost every other crate in the workspace
 * needs.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, DaemonConfig, LoggingConfig};

// Re-export logging helpers and macros
pub use crate::logging::{component_span, event_span};
pub use tracing::{debug, error, info, trace, warn};
