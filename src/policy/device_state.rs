//! Device state and IP configuration change handling
//!
//! Device state transitions drive retry bookkeeping, DNS registration,
//! default arbitration and secondary activation; IP configuration changes
//! keep the DNS manager's view of per-device configs current.

use super::Policy;
use crate::device::Device;
use crate::dns::{DnsConfigTag, DnsManager};
use crate::ip_config::{same_config, IpConfig};
use crate::profile::Profile;
use crate::types::{AddrFamily, BlockedReason, DeviceState, DeviceStateReason};
use std::sync::Arc;
use tracing::{debug, info};

impl Policy {
    pub(crate) fn on_device_state_changed(
        &mut self,
        device: &Arc<dyn Device>,
        new_state: DeviceState,
        old_state: DeviceState,
        reason: DeviceStateReason,
    ) {
        match new_state {
            DeviceState::Failed => {
                // A profile that failed during activation must not be
                // chosen over and over again.
                if let Some(profile) = device.active_profile() {
                    if (DeviceState::Prepare..=DeviceState::Activated).contains(&old_state) {
                        if reason == DeviceStateReason::NoSecrets {
                            debug!(
                                "connection '{}' now blocked from autoconnect due to no secrets",
                                profile.id()
                            );
                            profile.set_blocked_reason(BlockedReason::NoSecrets);
                        } else {
                            let tries = profile.autoconnect_retries();
                            if tries > 0 {
                                debug!(
                                    "connection '{}' failed to autoconnect; {} tries left",
                                    profile.id(),
                                    tries - 1
                                );
                                profile.set_autoconnect_retries(tries - 1);
                            }
                        }

                        if profile.autoconnect_retries() == 0 {
                            info!("disabling autoconnect for connection '{}'", profile.id());
                            self.schedule_retry_reset(&profile);
                        }

                        profile.clear_secrets();
                    }
                }
            }
            DeviceState::Activated => {
                if let Some(profile) = device.active_profile() {
                    // The connection worked; restore the retry counter and
                    // drop cached secrets so the next activation requests
                    // fresh ones.
                    profile.reset_autoconnect_retries();
                    profile.clear_secrets();
                }

                self.dns.begin_updates("device-activated");

                if let Some(config) = device.ip_config(AddrFamily::V4) {
                    self.dns
                        .add_ip4_config(device.iface(), config, DnsConfigTag::Device);
                }
                if let Some(config) = device.ip_config(AddrFamily::V6) {
                    self.dns
                        .add_ip6_config(device.iface(), config, DnsConfigTag::Device);
                }

                self.update_routing_and_dns(false);

                self.dns.end_updates("device-activated");
            }
            DeviceState::Unmanaged | DeviceState::Unavailable => {
                if old_state > DeviceState::Disconnected {
                    self.update_routing_and_dns(false);
                }
            }
            DeviceState::Deactivating => {
                if reason == DeviceStateReason::UserRequested {
                    if !device.autoconnect() {
                        // The whole device was disconnected; block every
                        // profile on it.
                        self.block_autoconnect_for_device(device);
                    } else if let Some(profile) = device.active_profile() {
                        // Only this session's profile was deactivated.
                        debug!(
                            "blocking autoconnect of connection '{}' by user request",
                            profile.id()
                        );
                        profile.set_blocked_reason(BlockedReason::UserRequested);
                    }
                }
            }
            DeviceState::Disconnected => {
                // A cable plugged back in should reconnect even if the
                // profiles ran out of retries while it was unplugged.
                if reason == DeviceStateReason::Carrier && old_state == DeviceState::Unavailable {
                    self.reset_autoconnect_all(Some(device));
                }

                if old_state > DeviceState::Disconnected {
                    self.update_routing_and_dns(false);
                }

                // Device is now available for auto-activation.
                self.schedule_activate_check(device);
            }
            DeviceState::Prepare => {
                self.activate_slave_profiles(device);
            }
            DeviceState::IpConfig => {
                // Reaching IP configuration proves the secrets worked.
                if let Some(profile) = device.active_profile() {
                    profile.set_blocked_reason(BlockedReason::None);
                }
            }
            DeviceState::Secondaries => match device.active_profile() {
                Some(profile) if !profile.secondaries().is_empty() => {
                    // Make routes and DNS current before the dependent
                    // sessions come up over them.
                    self.update_routing_and_dns(false);

                    if !self.activate_secondaries(&profile, device) {
                        device.queue_state_change(
                            DeviceState::Failed,
                            DeviceStateReason::SecondaryConnectionFailed,
                        );
                    }
                }
                _ => {
                    device.queue_state_change(DeviceState::Activated, DeviceStateReason::None);
                }
            },
            _ => {}
        }

        self.check_activating_devices();
    }

    pub(crate) fn on_device_ip_config_changed(
        &mut self,
        family: AddrFamily,
        device: &Arc<dyn Device>,
        new_config: Option<Arc<IpConfig>>,
        old_config: Option<Arc<IpConfig>>,
    ) {
        self.dns.begin_updates("device-ip-config");

        // While the device is activating, every change is picked up in one
        // pass when it reaches the activated state; re-registering each
        // intermediate config would churn DNS for nothing. Old configs are
        // dropped right away either way.
        if !device.is_activating() {
            let replaced = match (&old_config, &new_config) {
                (Some(old), Some(new)) => !same_config(old, new),
                (None, None) => false,
                _ => true,
            };
            if replaced {
                if let Some(old) = &old_config {
                    self.dns_remove_config(family, old);
                }
                if let Some(new) = &new_config {
                    self.dns_add_config(family, device.iface(), new.clone(), DnsConfigTag::Device);
                }
            }

            self.update_dns(family);
            self.update_routing(family, true);

            let best4 = self.default_device4.clone();
            let best6 = self.default_device6.clone();
            self.update_system_hostname(best4, best6);
        } else if let Some(old) = &old_config {
            self.dns_remove_config(family, old);
        }

        self.dns.end_updates("device-ip-config");
    }
}
