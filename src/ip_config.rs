//! IP and DHCP configuration snapshots
//!
//! These are immutable value objects produced by the address configuration
//! machinery (DHCP client, RA, static config). The engine compares them by
//! handle identity, never by content, because the DNS manager tracks the
//! exact handles it was given.

use crate::types::AddrFamily;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// IP configuration applied to an interface for one address family
#[derive(Debug, Clone)]
pub struct IpConfig {
    family: AddrFamily,
    addresses: Vec<IpAddr>,
}

impl IpConfig {
    pub fn new(family: AddrFamily, addresses: Vec<IpAddr>) -> Self {
        Self { family, addresses }
    }

    pub fn family(&self) -> AddrFamily {
        self.family
    }

    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    /// The primary address, used for reverse-DNS hostname discovery
    pub fn first_address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }
}

/// Returns true if `a` and `b` are the same configuration handle.
pub fn same_config(a: &Arc<IpConfig>, b: &Arc<IpConfig>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Options received from a DHCP server
#[derive(Debug, Clone, Default)]
pub struct DhcpConfig {
    options: HashMap<String, String>,
}

impl DhcpConfig {
    pub fn new(options: HashMap<String, String>) -> Self {
        Self { options }
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(|s| s.as_str())
    }
}
