//! Device interface consumed by the policy engine
//!
//! Devices are owned by the manager; the engine holds shared handles and
//! only acts on them through this interface.

use crate::ip_config::{DhcpConfig, IpConfig};
use crate::profile::Profile;
use crate::types::{AddrFamily, DeviceState, DeviceStateReason, Subject};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Stable device identity, valid across state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// Result of asking a device whether it would auto-connect with a profile
#[derive(Debug, Clone, Default)]
pub struct AutoconnectMatch {
    /// Optional device-specific target, e.g. an access-point path
    pub specific_object: Option<String>,
}

/// A managed network device
pub trait Device: Send + Sync {
    fn id(&self) -> DeviceId;

    /// Interface name
    fn iface(&self) -> &str;

    /// Kernel interface index
    fn ifindex(&self) -> i32;

    fn state(&self) -> DeviceState;

    /// Whether the device is administratively enabled
    fn is_enabled(&self) -> bool;

    /// The device's user-facing autoconnect flag
    fn autoconnect(&self) -> bool;

    /// Whether the device permits auto-activation right now; stricter than
    /// [`Device::autoconnect`] (the device may veto based on its own state)
    fn autoconnect_allowed(&self) -> bool;

    /// Software devices (bridges, bonds, tunnels) may be destroyed and
    /// recreated; profile-level blocking has to outlive them
    fn is_software(&self) -> bool;

    fn ip_config(&self, family: AddrFamily) -> Option<Arc<IpConfig>>;

    fn dhcp_config(&self, family: AddrFamily) -> Option<Arc<DhcpConfig>>;

    /// Whether an activation request is bound to the device
    fn has_active_request(&self) -> bool;

    /// Exported path of the bound activation request, if any
    fn active_request_path(&self) -> Option<String>;

    /// Profile of the bound activation request, if any
    fn active_profile(&self) -> Option<Arc<dyn Profile>>;

    /// Subject of the bound activation request, if any
    fn active_subject(&self) -> Option<Subject>;

    /// True while the device is between prepare and activated
    fn is_activating(&self) -> bool;

    /// Takes the one-shot hint naming a profile whose configuration already
    /// matches the link. Consuming the hint clears it.
    fn take_assume_uuid(&self) -> Option<Uuid>;

    /// Whether the profile is available on this device for a user request
    fn check_profile_available(&self, profile: &dyn Profile) -> bool;

    /// Whether the profile is compatible with this device at all
    fn check_profile_compatible(&self, profile: &dyn Profile) -> bool;

    /// Whether the device would auto-connect with the profile right now;
    /// on a match it may name a specific object to activate against
    fn can_auto_connect(&self, profile: &dyn Profile) -> Option<AutoconnectMatch>;

    /// Marks the device as having a pending action, visible to external
    /// waiters that gate on device readiness
    fn add_pending_action(&self, action: &str);

    fn remove_pending_action(&self, action: &str);

    /// Requests a state transition; the device applies it asynchronously
    fn queue_state_change(&self, state: DeviceState, reason: DeviceStateReason);

    /// Re-applies the bound profile's settings to the running configuration
    fn reapply_settings(&self);
}
