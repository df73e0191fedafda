//! Active session interfaces
//!
//! An active session is the runtime instance of a profile being brought up
//! or in effect. Sessions are owned by the manager; VPN sessions expose the
//! extra capability surface through [`ActiveSession::as_vpn`] instead of
//! downcasting.

use crate::device::Device;
use crate::ip_config::IpConfig;
use crate::profile::Profile;
use crate::types::{ActivationType, ActiveSessionState, AddrFamily, Subject};
use std::sync::Arc;

/// A running activation
pub trait ActiveSession: Send + Sync {
    /// Exported object path; doubles as the session's identity
    fn path(&self) -> &str;

    fn profile(&self) -> Arc<dyn Profile>;

    /// The bound device. VPN sessions may be unbound until arbitration
    /// picks a device to tunnel over.
    fn device(&self) -> Option<Arc<dyn Device>>;

    /// Late-binds a device to the session
    fn set_device(&self, device: Arc<dyn Device>);

    fn state(&self) -> ActiveSessionState;

    fn subject(&self) -> Subject;

    fn activation_type(&self) -> ActivationType;

    /// Whether this session carries the default route for `family`
    fn is_default(&self, family: AddrFamily) -> bool;

    fn set_default(&self, family: AddrFamily, is_default: bool);

    /// Narrows to the VPN capability surface, if this is a VPN session
    fn as_vpn(&self) -> Option<&dyn VpnSession> {
        None
    }
}

/// Capability surface of a VPN session
pub trait VpnSession: ActiveSession {
    /// IP configuration received from the VPN service for `family`
    fn ip_config(&self, family: AddrFamily) -> Option<Arc<IpConfig>>;

    /// Tunnel interface name, falling back to the bound device's interface
    fn ip_iface(&self) -> String;
}
