/*!
 * Logging setup for linux-driver-management.
 *
 * With a configured filter `RUST_LOG` wins when set. A filter passed
 * explicitly, such as one given on the command line, wins over both.
 */
use tracing::Span;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system from a [`LoggingConfig`], unless
/// `RUST_LOG` is set
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    install(build_filter(&config.level, true)?, config.with_target)
}

/// Initialize the logging system with a specific filter, ignoring `RUST_LOG`
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "ldm_daemon=trace")
/// * `with_target` - Whether to print the event target
pub fn init_with_filter(filter: &str, with_target: bool) -> Result<()> {
    install(build_filter(filter, false)?, with_target)
}

fn build_filter(filter: &str, prefer_env: bool) -> Result<EnvFilter> {
    if prefer_env {
        if let Ok(from_env) = EnvFilter::try_from_default_env() {
            return Ok(from_env);
        }
    }
    EnvFilter::try_new(filter)
        .map_err(|e| Error::logging(format!("Invalid log filter {:?}: {}", filter, e)))
}

fn install(filter: EnvFilter, with_target: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(with_target))
        .with(filter)
        .try_init()
        .map_err(|e| Error::logging(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Create a new span for a component
///
/// # Arguments
///
/// * `name` - The name of the component
/// * `id` - An optional ID for the component instance
pub fn component_span(name: &str, id: Option<&str>) -> Span {
    match id {
        Some(id) => tracing::info_span!("component", name = %name, id = %id),
        None => tracing::info_span!("component", name = %name),
    }
}

/// Create a new span for handling a single device event
///
/// # Arguments
///
/// * `event` - The event kind ("discovered", "removed")
/// * `path` - The sysfs path the event refers to
pub fn event_span(event: &str, path: &str) -> Span {
    tracing::debug_span!("device_event", event = %event, path = %path)
}
