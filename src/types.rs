//! Core state enumerations shared by the policy engine and its collaborators

use serde::{Deserialize, Serialize};

/// Device state
///
/// Variant order matches the activation sequence; comparisons rely on it
/// (e.g. "past disconnected" or "between prepare and activated").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceState {
    /// Device state is unknown
    Unknown,
    /// Device is not managed
    Unmanaged,
    /// Device cannot be used (no carrier, rfkill, missing firmware)
    Unavailable,
    /// Device is ready but not activating
    Disconnected,
    /// Device is preparing to connect
    Prepare,
    /// Device is being configured
    Config,
    /// Device is waiting for secrets
    NeedAuth,
    /// Device is requesting IP configuration
    IpConfig,
    /// Device is checking IP connectivity
    IpCheck,
    /// Device is waiting for secondary connections
    Secondaries,
    /// Device is active
    Activated,
    /// Device is being deactivated
    Deactivating,
    /// Device activation failed
    Failed,
}

/// Reason accompanying a device state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStateReason {
    /// No reason given
    None,
    /// Unknown error
    Unknown,
    /// Device is now managed
    NowManaged,
    /// Device is now unmanaged
    NowUnmanaged,
    /// Configuration of the device failed
    ConfigFailed,
    /// Secrets were required, but not provided
    NoSecrets,
    /// Disconnected by user or client request
    UserRequested,
    /// Carrier/link changed
    Carrier,
    /// The session's profile was removed
    ConnectionRemoved,
    /// An existing link configuration was adopted
    ConnectionAssumed,
    /// The manager went to sleep
    Sleeping,
    /// A secondary session of the base session failed
    SecondaryConnectionFailed,
    /// A dependency of the profile failed
    DependencyFailed,
    /// A new activation was enqueued
    NewActivation,
}

/// How a profile is brought up on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationType {
    /// Run the full activation sequence
    Full,
    /// Adopt an already-configured link without reconfiguring it
    Assume,
}

/// Active session state
///
/// Ordered; "still usable" is `<= Activated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActiveSessionState {
    Unknown,
    Activating,
    Activated,
    Deactivating,
    Deactivated,
}

/// Internal state of a VPN session
///
/// Ordered; end states compare greater than `Activated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VpnSessionState {
    Unknown,
    Prepare,
    NeedAuth,
    Connecting,
    IpConfigGet,
    Activated,
    Failed,
    Disconnected,
}

/// Address family, used to parameterize the per-family arbitration paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddrFamily {
    V4,
    V6,
}

impl AddrFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddrFamily::V4 => "IPv4",
            AddrFamily::V6 => "IPv6",
        }
    }
}

/// Per-profile gate preventing auto-activation until explicitly cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockedReason {
    /// Not blocked
    None,
    /// Blocked because required secrets were not provided
    NoSecrets,
    /// Blocked by an explicit user disconnect
    UserRequested,
}

/// Who requested an activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    /// Initiated by the engine or another internal component
    Internal,
    /// Initiated by a user request
    User,
}

impl Subject {
    pub fn is_internal(&self) -> bool {
        matches!(self, Subject::Internal)
    }
}
