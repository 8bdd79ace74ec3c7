//! Error types and handling for Chargerkit
//!
//! Every fallible operation in the crate returns [`ChargerError`]. Errors
//! raised before a device is touched (`InvalidArgument`, `Validation`) are
//! kept apart from errors reported by the device or vendor service
//! (`Modbus`, `Http`, `Api`) so callers can tell a local rejection from a
//! remote one.

use thiserror::Error;

/// Result type alias for Chargerkit operations
pub type Result<T> = std::result::Result<T, ChargerError>;

/// Main error type for Chargerkit
#[derive(Debug, Error)]
pub enum ChargerError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Modbus communication errors
    #[error("Modbus error: {message}")]
    Modbus { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Non-success HTTP response; the body is kept for vendor error messages
    #[error("HTTP error: status {status}")]
    Http { status: u16, body: String },

    /// Vendor API reported an error
    #[error("API error: {message}")]
    Api { message: String },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Argument rejected locally, no device write was attempted
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Device answered with something outside its documented protocol
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// No factory registered under this driver type
    #[error("Driver not found: {name}")]
    DriverNotFound { name: String },

    /// A factory is already registered under this driver type
    #[error("Driver already registered: {name}")]
    DuplicateDriver { name: String },

    /// Registration attempted after the registry started creating chargers
    #[error("Driver registry is sealed, cannot register: {name}")]
    RegistrySealed { name: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl ChargerError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ChargerError::Config {
            message: message.into(),
        }
    }

    /// Create a new Modbus error
    pub fn modbus<S: Into<String>>(message: S) -> Self {
        ChargerError::Modbus {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        ChargerError::Network {
            message: message.into(),
        }
    }

    /// Create a new HTTP status error
    pub fn http<S: Into<String>>(status: u16, body: S) -> Self {
        ChargerError::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        ChargerError::Api {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        ChargerError::Auth {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ChargerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        ChargerError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        ChargerError::Protocol {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ChargerError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        ChargerError::Serialization {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ChargerError::Io {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        ChargerError::Generic {
            message: message.into(),
        }
    }

    /// Whether the error was raised locally before any device write
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ChargerError::InvalidArgument { .. })
    }

    /// Whether the error indicates a lost or unreachable connection
    pub fn is_connection_error(&self) -> bool {
        match self {
            ChargerError::Modbus { message } => {
                let msg = message.to_lowercase();
                msg.contains("connection")
                    || msg.contains("not connected")
                    || msg.contains("broken pipe")
                    || msg.contains("disconnected")
            }
            ChargerError::Timeout { .. } | ChargerError::Network { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for ChargerError {
    fn from(err: std::io::Error) -> Self {
        ChargerError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChargerError {
    fn from(err: serde_yaml::Error) -> Self {
        ChargerError::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChargerError {
    fn from(err: serde_json::Error) -> Self {
        ChargerError::serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ChargerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChargerError::timeout(err.to_string())
        } else {
            ChargerError::network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ChargerError::config("test config error");
        assert!(matches!(err, ChargerError::Config { .. }));

        let err = ChargerError::modbus("test modbus error");
        assert!(matches!(err, ChargerError::Modbus { .. }));

        let err = ChargerError::validation("field", "test validation error");
        assert!(matches!(err, ChargerError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = ChargerError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = ChargerError::invalid_argument("invalid current 5.0");
        assert_eq!(format!("{}", err), "Invalid argument: invalid current 5.0");
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_connection_error_classification() {
        assert!(ChargerError::modbus("Not connected to Modbus server").is_connection_error());
        assert!(ChargerError::timeout("Read operation timeout").is_connection_error());
        assert!(!ChargerError::modbus("Modbus exception: IllegalDataAddress").is_connection_error());
        assert!(!ChargerError::invalid_argument("x").is_connection_error());
    }
}
