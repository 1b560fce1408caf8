/*!
 * Error types shared across the linux-driver-management crates.
 */
use thiserror::Error;

/// Error type for device tree, classification and daemon operations
#[derive(Error, Debug)]
pub enum Error {
    /// A path, child or GPU device could not be found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A device node could not be constructed from a discovery record
    #[error("Construction failure: {0}")]
    ConstructionFailure(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging setup error
    #[error("Logging error: {0}")]
    Logging(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for linux-driver-management operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new not found error
    pub fn not_found<S: AsRef<str>>(msg: S) -> Self {
        Error::NotFound(msg.as_ref().to_string())
    }

    /// Create a new invalid state error
    pub fn invalid_state<S: AsRef<str>>(msg: S) -> Self {
        Error::InvalidState(msg.as_ref().to_string())
    }

    /// Create a new construction failure
    pub fn construction<S: AsRef<str>>(msg: S) -> Self {
        Error::ConstructionFailure(msg.as_ref().to_string())
    }

    /// Create a new configuration error
    pub fn config<S: AsRef<str>>(msg: S) -> Self {
        Error::Config(msg.as_ref().to_string())
    }

    /// Create a new logging error
    pub fn logging<S: AsRef<str>>(msg: S) -> Self {
        Error::Logging(msg.as_ref().to_string())
    }

    /// Create a new serialization error
    pub fn serialization<S: AsRef<str>>(msg: S) -> Self {
        Error::Serialization(msg.as_ref().to_string())
    }

    /// Create a new other error
    pub fn other<S: AsRef<str>>(msg: S) -> Self {
        Error::Other(msg.as_ref().to_string())
    }

    /// Whether the daemon can log this error and carry on with the next event
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::InvalidState(_) | Error::ConstructionFailure(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::not_found("/sys/x").to_string(), "Not found: /sys/x");
        assert_eq!(
            Error::invalid_state("not optimus").to_string(),
            "Invalid state: not optimus"
        );
        assert_eq!(
            Error::construction("empty path").to_string(),
            "Construction failure: empty path"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::not_found("x").is_recoverable());
        assert!(Error::invalid_state("x").is_recoverable());
        assert!(Error::construction("x").is_recoverable());
        assert!(!Error::config("x").is_recoverable());
        assert!(!Error::other("x").is_recoverable());
    }
}
