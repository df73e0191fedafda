//! Events consumed and notifications published by the policy engine
//!
//! Collaborators deliver [`PolicyEvent`]s into the engine's single event
//! queue; the engine publishes [`PolicyUpdate`]s on a broadcast channel,
//! and only when a published value actually changed.

use crate::device::{Device, DeviceId};
use crate::ip_config::IpConfig;
use crate::profile::Profile;
use crate::session::ActiveSession;
use crate::types::{AddrFamily, DeviceState, DeviceStateReason, VpnSessionState};
use std::sync::Arc;

/// An event delivered to the policy engine.
///
/// Device-scoped events must be delivered after the device itself finished
/// reacting to the underlying change, so the engine observes settled state.
pub enum PolicyEvent {
    /// A device became visible to the manager
    DeviceAdded(Arc<dyn Device>),
    /// A device disappeared
    DeviceRemoved(Arc<dyn Device>),
    /// A device changed state
    DeviceStateChanged {
        device: Arc<dyn Device>,
        new_state: DeviceState,
        old_state: DeviceState,
        reason: DeviceStateReason,
    },
    /// A device's IPv4 configuration was replaced
    DeviceIp4ConfigChanged {
        device: Arc<dyn Device>,
        new_config: Option<Arc<IpConfig>>,
        old_config: Option<Arc<IpConfig>>,
    },
    /// A device's IPv6 configuration was replaced
    DeviceIp6ConfigChanged {
        device: Arc<dyn Device>,
        new_config: Option<Arc<IpConfig>>,
        old_config: Option<Arc<IpConfig>>,
    },
    /// A device's autoconnect permission changed
    DeviceAutoconnectChanged(Arc<dyn Device>),
    /// A device asks to be reconsidered for auto-activation
    DeviceRecheckAutoActivate(Arc<dyn Device>),

    /// An active session was created
    SessionAdded(Arc<dyn ActiveSession>),
    /// An active session was destroyed
    SessionRemoved(Arc<dyn ActiveSession>),
    /// An active session's state changed
    SessionStateChanged(Arc<dyn ActiveSession>),

    /// A VPN session's internal state changed
    VpnStateChanged {
        session: Arc<dyn ActiveSession>,
        new_state: VpnSessionState,
        old_state: VpnSessionState,
    },
    /// A VPN session asks to be reconnected after a post-connect failure
    VpnRetryAfterFailure(Arc<dyn ActiveSession>),

    /// The manager's configured hostname changed
    HostnameChanged,
    /// The manager's sleeping or networking-enabled property changed
    SleepingChanged,

    /// A profile was added to the settings store
    ProfileAdded(Arc<dyn Profile>),
    /// A profile was updated
    ProfileUpdated {
        profile: Arc<dyn Profile>,
        by_user: bool,
    },
    /// A profile was removed
    ProfileRemoved(Arc<dyn Profile>),
    /// A profile's visibility changed
    ProfileVisibilityChanged(Arc<dyn Profile>),
    /// A secret agent registered with the settings store
    SecretAgentRegistered,

    /// The DNS manager rewrote resolver configuration
    DnsConfigChanged,
    /// The firewall daemon became available
    FirewallStarted,

    /// Deferred task: run the auto-activation decider for one device
    AutoActivate(DeviceId),
    /// Deferred task: re-check auto-activation for every device
    ActivateAll,
    /// Deferred task: the timed retry-counter reset fired
    ResetRetryTimer,
    /// A reverse-DNS lookup finished
    HostnameLookupDone { result: Result<String, String> },
}

/// A change to one of the engine's observable properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyUpdate {
    /// The default device for a family changed
    DefaultDeviceChanged {
        family: AddrFamily,
        device: Option<DeviceId>,
    },
    /// The best activating candidate for a family changed
    ActivatingDeviceChanged {
        family: AddrFamily,
        device: Option<DeviceId>,
    },
}
