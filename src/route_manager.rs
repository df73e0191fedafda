//! Default-route manager interface
//!
//! The route manager owns the routing tables and can rank candidates for
//! the default route of each address family. The engine asks it for the
//! best device and the best configuration and records the winners.

use crate::device::Device;
use crate::ip_config::IpConfig;
use crate::session::ActiveSession;
use crate::types::AddrFamily;
use std::sync::Arc;

/// The best default-route candidate for one family
pub struct BestConfig {
    /// IP configuration of the winner
    pub config: Arc<IpConfig>,
    /// Interface the configuration applies to
    pub ip_iface: String,
    /// The winning session. A VPN winner answers to
    /// [`ActiveSession::as_vpn`].
    pub session: Arc<dyn ActiveSession>,
    /// The best device. May be unset when a VPN wins while tunneling over
    /// a device that has no configuration for this family.
    pub device: Option<Arc<dyn Device>>,
}

/// Ranker for default-route candidates
pub trait DefaultRouteManager: Send + Sync {
    /// Picks the best device for `family` out of `devices`. With
    /// `fully_activated` set, only devices that finished activating
    /// qualify. `last_best` breaks ties in favor of the incumbent.
    fn best_device(
        &self,
        family: AddrFamily,
        devices: &[Arc<dyn Device>],
        fully_activated: bool,
        last_best: Option<&Arc<dyn Device>>,
    ) -> Option<Arc<dyn Device>>;

    /// Picks the best configuration and session for `family`.
    /// `ignore_never_default` also considers candidates whose profile opts
    /// out of the default route, for DNS purposes.
    fn best_config(&self, family: AddrFamily, ignore_never_default: bool) -> Option<BestConfig>;
}
