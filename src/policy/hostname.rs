//! System hostname pipeline
//!
//! The hostname is chosen by a precedence ladder: configured hostname,
//! DHCP-supplied hostname of the best device, the hostname captured at
//! startup, and finally reverse DNS of the best device's primary address.
//! The reverse lookup is asynchronous and restarted from scratch whenever
//! anything upstream changes.

use super::Policy;
use crate::device::Device;
use crate::dispatcher::{Dispatcher, DispatcherAction};
use crate::dns::DnsManager;
use crate::error::PolicyError;
use crate::events::PolicyEvent;
use crate::manager::Manager;
use crate::platform::Platform;
use crate::resolver::HostnameResolver;
use crate::settings::Settings;
use crate::types::AddrFamily;
use crate::validation::is_specific_hostname;
use std::net::IpAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl Policy {
    /// Runs the precedence ladder. `best4`/`best6` are passed by callers
    /// that already arbitrated; otherwise they are re-queried.
    pub(crate) fn update_system_hostname(
        &mut self,
        best4: Option<Arc<dyn Device>>,
        best6: Option<Arc<dyn Device>>,
    ) {
        // Whatever the ladder decides, the previous lookup is stale.
        if let Some(token) = self.lookup_cancel.take() {
            token.cancel();
        }

        if let Some(configured) = self.manager.hostname().filter(|h| is_specific_hostname(h)) {
            self.set_system_hostname(Some(&configured), "from system configuration");
            return;
        }

        let best4 = best4.or_else(|| self.best_device(AddrFamily::V4, true));
        let best6 = best6.or_else(|| self.best_device(AddrFamily::V6, true));

        if best4.is_none() && best6.is_none() {
            let orig = self.orig_hostname.clone();
            self.set_system_hostname(orig.as_deref(), "no default device");
            return;
        }

        let option = self.config.dhcp_hostname_option.clone();
        if let Some(device) = &best4 {
            if let Some(dhcp) = device.dhcp_config(AddrFamily::V4) {
                if let Some(name) = dhcp.option(&option) {
                    if !name.is_empty() {
                        let trimmed = name.trim_start();
                        if !trimmed.is_empty() {
                            let trimmed = trimmed.to_string();
                            self.set_system_hostname(Some(&trimmed), "from DHCPv4");
                            return;
                        }
                        warn!(
                            "DHCPv4-provided hostname '{}' looks invalid; ignoring it",
                            name
                        );
                    }
                }
            }
        } else if let Some(device) = &best6 {
            if let Some(dhcp) = device.dhcp_config(AddrFamily::V6) {
                if let Some(name) = dhcp.option(&option) {
                    if !name.is_empty() {
                        let trimmed = name.trim_start();
                        if !trimmed.is_empty() {
                            let trimmed = trimmed.to_string();
                            self.set_system_hostname(Some(&trimmed), "from DHCPv6");
                            return;
                        }
                        warn!(
                            "DHCPv6-provided hostname '{}' looks invalid; ignoring it",
                            name
                        );
                    }
                }
            }
        }

        if self.orig_hostname.is_some() {
            let orig = self.orig_hostname.clone();
            self.set_system_hostname(orig.as_deref(), "from system startup");
            return;
        }

        // Nothing configured, supplied or remembered: reverse-resolve the
        // best device's primary address.
        let ip4 = best4.as_ref().and_then(|d| d.ip_config(AddrFamily::V4));
        let ip6 = best6.as_ref().and_then(|d| d.ip_config(AddrFamily::V6));

        let addr = ip4
            .and_then(|c| c.first_address())
            .or_else(|| ip6.and_then(|c| c.first_address()));
        let Some(addr) = addr else {
            self.set_system_hostname(None, "no IP config");
            return;
        };

        self.lookup_addr = Some(addr);
        self.start_lookup(addr);
    }

    /// Adopts `new_hostname` as the desired hostname and pushes it to the
    /// kernel if it actually differs. `None` falls back to the configured
    /// placeholder name.
    pub(crate) fn set_system_hostname(&mut self, new_hostname: Option<&str>, msg: &str) {
        // A resolved hostname means reverse DNS is no longer wanted; keep
        // the address only while the ladder still ends in a lookup.
        if new_hostname.is_some() {
            self.lookup_addr = None;
        }

        if self.orig_hostname.is_some()
            && !self.hostname_changed
            && self.orig_hostname.as_deref() == new_hostname
        {
            // The first change would restore the startup name; nothing to do.
        } else if self.cur_hostname.as_deref() == new_hostname {
            // Not actually changing.
        } else {
            self.cur_hostname = new_hostname.map(|s| s.to_string());
            self.hostname_changed = true;

            // Let the DNS manager pull the domain part, if present, into
            // its search list.
            self.dns.set_hostname(self.cur_hostname.as_deref());
        }

        let name = match new_hostname {
            None => self.config.fallback_hostname.clone(),
            Some("") => {
                warn!("refusing to set an empty hostname");
                self.config.fallback_hostname.clone()
            }
            Some(name) => name.to_string(),
        };

        match self.platform.hostname() {
            Ok(old_hostname) if old_hostname == name => return,
            Ok(_) => {}
            Err(e) => warn!("couldn't get the system hostname: {}", e),
        }

        info!("setting system hostname to '{}' ({})", name, msg);
        self.spawn_hostname_commit(name);
    }

    /// Commits the hostname through the settings store's hostname service,
    /// falling back to the kernel directly, and fires the dispatcher hook
    /// on success.
    fn spawn_hostname_commit(&self, name: String) {
        let settings = self.settings.clone();
        let platform = self.platform.clone();
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            match settings.set_transient_hostname(&name).await {
                Ok(()) => dispatcher.call(DispatcherAction::Hostname),
                Err(_) => match platform.set_hostname(&name) {
                    Ok(()) => dispatcher.call(DispatcherAction::Hostname),
                    Err(e) => {
                        warn!("couldn't set the system hostname to '{}': {}", name, e);
                        if matches!(e, PolicyError::PermissionDenied(_)) {
                            warn!(
                                "a privileged hostname daemon must be used when direct \
                                 hostname changes are restricted"
                            );
                        }
                    }
                },
            }
        });
    }

    fn start_lookup(&mut self, addr: IpAddr) {
        let token = CancellationToken::new();
        self.lookup_cancel = Some(token.clone());

        let resolver = self.resolver.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = resolver.lookup_by_address(addr) => {
                    let _ = tx.send(PolicyEvent::HostnameLookupDone {
                        result: result.map_err(|e| e.to_string()),
                    });
                }
            }
        });
    }

    pub(crate) fn on_hostname_lookup_done(&mut self, result: Result<String, String>) {
        // A cancelled lookup's late completion must not touch anything.
        if self.lookup_cancel.is_none() {
            return;
        }

        match result {
            Ok(hostname) => self.set_system_hostname(Some(&hostname), "from address lookup"),
            Err(e) => self.set_system_hostname(None, &e),
        }

        self.lookup_cancel = None;
    }

    pub(crate) fn on_dns_config_changed(&mut self) {
        // A lookup racing the DNS rewrite may have used the old servers;
        // restart it against the new configuration.
        if let Some(token) = self.lookup_cancel.take() {
            token.cancel();
        }

        if let Some(addr) = self.lookup_addr {
            debug!("restarting reverse-lookup for address {}", addr);
            self.start_lookup(addr);
        }
    }
}
