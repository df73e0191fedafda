//! DNS manager interface
//!
//! The DNS manager owns resolver configuration. The engine registers and
//! removes per-interface IP configurations and tags each with how it was
//! chosen; the manager orders upstream servers by tag.

use crate::ip_config::IpConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How an IP configuration was selected, used for resolver ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnsConfigTag {
    /// Config of some activated device
    Device,
    /// Config of the device chosen as default for its family
    BestDevice,
    /// Config of a VPN carrying the default route
    Vpn,
}

/// Resolver configuration writer
pub trait DnsManager: Send + Sync {
    /// Opens a batched update window. Nested calls are reference-counted;
    /// every `begin_updates` must be paired with an `end_updates` on all
    /// return paths.
    fn begin_updates(&self, caller: &str);

    fn end_updates(&self, caller: &str);

    fn add_ip4_config(&self, iface: &str, config: Arc<IpConfig>, tag: DnsConfigTag);

    fn add_ip6_config(&self, iface: &str, config: Arc<IpConfig>, tag: DnsConfigTag);

    fn remove_ip4_config(&self, config: &Arc<IpConfig>);

    fn remove_ip6_config(&self, config: &Arc<IpConfig>);

    /// Seeds the manager with the hostname captured at startup
    fn set_initial_hostname(&self, hostname: Option<&str>);

    /// Informs the manager of a hostname change so a domain suffix can be
    /// added to the search list
    fn set_hostname(&self, hostname: Option<&str>);
}
