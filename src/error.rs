//! Error types for netpolicy

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum PolicyError {
    /// IO error
    Io(io::Error),
    /// Activation of a profile was rejected or failed
    ActivationFailed { profile: String, reason: String },
    /// Deactivation of an active session failed
    DeactivationFailed { path: String, reason: String },
    /// Profile not found
    ProfileNotFound(String),
    /// Device not found
    DeviceNotFound(String),
    /// A referenced secondary profile is unusable
    InvalidSecondary(String),
    /// Configuration error
    ConfigError(String),
    /// Permission denied
    PermissionDenied(String),
    /// Hostname could not be read or written
    HostnameError(String),
    /// Name resolution failed
    ResolverError(String),
    /// Operation was cancelled
    Cancelled,
    /// Invalid state
    InvalidState(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::Io(e) => write!(f, "IO error: {}", e),
            PolicyError::ActivationFailed { profile, reason } => {
                write!(f, "Activation of '{}' failed: {}", profile, reason)
            }
            PolicyError::DeactivationFailed { path, reason } => {
                write!(f, "Deactivation of '{}' failed: {}", path, reason)
            }
            PolicyError::ProfileNotFound(uuid) => write!(f, "Profile not found: {}", uuid),
            PolicyError::DeviceNotFound(name) => write!(f, "Device not found: {}", name),
            PolicyError::InvalidSecondary(msg) => write!(f, "Invalid secondary: {}", msg),
            PolicyError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            PolicyError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            PolicyError::HostnameError(msg) => write!(f, "Hostname error: {}", msg),
            PolicyError::ResolverError(msg) => write!(f, "Resolver error: {}", msg),
            PolicyError::Cancelled => write!(f, "Operation cancelled"),
            PolicyError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for PolicyError {}

impl From<io::Error> for PolicyError {
    fn from(error: io::Error) -> Self {
        PolicyError::Io(error)
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
