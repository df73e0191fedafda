//! Firewall manager interface

use crate::device::Device;

/// Bridge to the host firewall daemon
pub trait FirewallManager: Send + Sync {
    /// Moves the device's interface into the zone its profile names
    fn update_firewall_zone(&self, device: &dyn Device);
}
