//! Default route and DNS arbitration, per address family
//!
//! IPv4 and IPv6 are arbitrated independently: the route manager ranks
//! the candidates, the engine records the winner, keeps at most one
//! session flagged default per family, and re-registers the winning
//! configuration with the DNS manager.

use super::Policy;
use crate::device::Device;
use crate::dns::{DnsConfigTag, DnsManager};
use crate::events::PolicyUpdate;
use crate::ip_config::IpConfig;
use crate::manager::Manager;
use crate::profile::Profile;
use crate::route_manager::DefaultRouteManager;
use crate::session::{ActiveSession, VpnSession};
use crate::types::AddrFamily;
use std::sync::Arc;
use tracing::info;

impl Policy {
    pub(crate) fn best_device(
        &self,
        family: AddrFamily,
        fully_activated: bool,
    ) -> Option<Arc<dyn Device>> {
        self.route_manager.best_device(
            family,
            &self.manager.devices(),
            fully_activated,
            self.default_device_ref(family),
        )
    }

    fn default_device_ref(&self, family: AddrFamily) -> Option<&Arc<dyn Device>> {
        match family {
            AddrFamily::V4 => self.default_device4.as_ref(),
            AddrFamily::V6 => self.default_device6.as_ref(),
        }
    }

    pub(crate) fn default_device(&self, family: AddrFamily) -> Option<Arc<dyn Device>> {
        self.default_device_ref(family).cloned()
    }

    fn set_default_device(&mut self, family: AddrFamily, device: Option<Arc<dyn Device>>) {
        match family {
            AddrFamily::V4 => self.default_device4 = device,
            AddrFamily::V6 => self.default_device6 = device,
        }
    }

    pub(crate) fn dns_add_config(
        &self,
        family: AddrFamily,
        iface: &str,
        config: Arc<IpConfig>,
        tag: DnsConfigTag,
    ) {
        match family {
            AddrFamily::V4 => self.dns.add_ip4_config(iface, config, tag),
            AddrFamily::V6 => self.dns.add_ip6_config(iface, config, tag),
        }
    }

    pub(crate) fn dns_remove_config(&self, family: AddrFamily, config: &Arc<IpConfig>) {
        match family {
            AddrFamily::V4 => self.dns.remove_ip4_config(config),
            AddrFamily::V6 => self.dns.remove_ip6_config(config),
        }
    }

    /// Re-registers the best configuration for `family` so the DNS manager
    /// can order it ahead of plain device configs.
    pub(crate) fn update_dns(&self, family: AddrFamily) {
        // Never-default candidates still get to provide DNS servers.
        if let Some(best) = self.route_manager.best_config(family, true) {
            let tag = if best.session.as_vpn().is_some() {
                DnsConfigTag::Vpn
            } else {
                DnsConfigTag::BestDevice
            };
            self.dns_add_config(family, &best.ip_iface, best.config.clone(), tag);
        }
    }

    /// Recomputes the default device for `family` and maintains the
    /// single-default invariant across active sessions.
    pub(crate) fn update_routing(&mut self, family: AddrFamily, force_update: bool) {
        // A VPN for this family can tunnel over a device that only has the
        // other family configured, so the winner may carry no best device.
        let best = match self.route_manager.best_config(family, false) {
            Some(best) => best,
            None => {
                let changed = self.default_device(family).is_some();
                self.set_default_device(family, None);
                if changed {
                    self.notify(PolicyUpdate::DefaultDeviceChanged {
                        family,
                        device: None,
                    });
                }
                return;
            }
        };

        if !force_update {
            if let (Some(best_device), Some(current)) = (&best.device, self.default_device(family))
            {
                if best_device.id() == current.id() {
                    return;
                }
            }
        }

        if let Some(best_device) = &best.device {
            // Late-bind VPN sessions that have a config for this family
            // but no device yet: they tunnel over the device chosen now.
            for session in self.manager.active_sessions() {
                let unbound_vpn = session
                    .as_vpn()
                    .map_or(false, |vpn| vpn.ip_config(family).is_some())
                    && session.device().is_none();
                if unbound_vpn {
                    session.set_device(best_device.clone());
                }
            }
        }

        let default_device = if best.session.as_vpn().is_some() {
            best.session.device()
        } else {
            best.device.clone()
        };

        // Clear the default flag on every other session first, then set it
        // on the winner, so two sessions never hold it at once.
        for session in self.manager.active_sessions() {
            if session.path() != best.session.path() {
                session.set_default(family, false);
            }
        }
        best.session.set_default(family, true);

        if default_device.as_ref().map(|d| d.id()) == self.default_device(family).map(|d| d.id()) {
            return;
        }

        self.set_default_device(family, default_device.clone());
        info!(
            "set '{}' ({}) as default for {} routing and DNS",
            best.session.profile().id(),
            best.ip_iface,
            family.as_str()
        );
        self.notify(PolicyUpdate::DefaultDeviceChanged {
            family,
            device: default_device.map(|d| d.id()),
        });
    }

    /// Recomputes routing, DNS and the system hostname for both families
    /// inside one batched DNS update window.
    pub(crate) fn update_routing_and_dns(&mut self, force_update: bool) {
        self.dns.begin_updates("routing-and-dns");

        self.update_dns(AddrFamily::V4);
        self.update_dns(AddrFamily::V6);

        self.update_routing(AddrFamily::V4, force_update);
        self.update_routing(AddrFamily::V6, force_update);

        let best4 = self.default_device4.clone();
        let best6 = self.default_device6.clone();
        self.update_system_hostname(best4, best6);

        self.dns.end_updates("routing-and-dns");
    }

    /// Refreshes the best-activating-candidate properties. Both families
    /// are recomputed before either notification goes out, so observers
    /// see them change together.
    pub(crate) fn check_activating_devices(&mut self) {
        let best4 = self.best_device(AddrFamily::V4, false);
        let best6 = self.best_device(AddrFamily::V6, false);

        let mut pending = Vec::new();

        if best4.as_ref().map(|d| d.id()) != self.activating_device4.as_ref().map(|d| d.id()) {
            self.activating_device4 = best4;
            pending.push(PolicyUpdate::ActivatingDeviceChanged {
                family: AddrFamily::V4,
                device: self.activating_device4.as_ref().map(|d| d.id()),
            });
        }
        if best6.as_ref().map(|d| d.id()) != self.activating_device6.as_ref().map(|d| d.id()) {
            self.activating_device6 = best6;
            pending.push(PolicyUpdate::ActivatingDeviceChanged {
                family: AddrFamily::V6,
                device: self.activating_device6.as_ref().map(|d| d.id()),
            });
        }

        for update in pending {
            self.notify(update);
        }
    }
}
