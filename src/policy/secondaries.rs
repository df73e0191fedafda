//! Secondary (VPN) session sequencing
//!
//! A base session entering the secondaries phase launches its declared
//! dependent profiles; the base is promoted when all of them come up and
//! failed when any of them goes down first.

use super::Policy;
use crate::device::Device;
use crate::dns::{DnsConfigTag, DnsManager};
use crate::manager::Manager;
use crate::profile::Profile;
use crate::session::{ActiveSession, VpnSession};
use crate::settings::Settings;
use crate::types::{
    ActivationType, ActiveSessionState, AddrFamily, DeviceState, DeviceStateReason, Subject,
    VpnSessionState,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Secondary sessions a base device is still waiting on.
/// The session set is non-empty for as long as the entry exists.
pub(crate) struct PendingSecondaries {
    pub(crate) device: Arc<dyn Device>,
    pub(crate) sessions: Vec<Arc<dyn ActiveSession>>,
}

impl Policy {
    /// Launches the secondaries declared by `profile`, in declared order,
    /// inheriting the base request's subject and path.
    ///
    /// A secondary that does not exist, is not a VPN, or fails to launch
    /// aborts the batch: sessions launched so far are released and the
    /// caller fails the base device.
    pub(crate) fn activate_secondaries(
        &mut self,
        profile: &Arc<dyn Profile>,
        device: &Arc<dyn Device>,
    ) -> bool {
        let request_path = device.active_request_path();
        let subject = device.active_subject().unwrap_or(Subject::Internal);

        let mut launched: Vec<Arc<dyn ActiveSession>> = Vec::new();
        let mut success = true;

        for sec_uuid in profile.secondaries() {
            let secondary = match self.settings.profile_by_uuid(sec_uuid) {
                Some(secondary) => secondary,
                None => {
                    warn!(
                        "secondary connection '{}' auto-activation failed: the connection doesn't exist",
                        sec_uuid
                    );
                    success = false;
                    break;
                }
            };

            if !secondary.is_vpn() {
                warn!(
                    "secondary connection '{} ({})' auto-activation failed: the connection is not a VPN",
                    secondary.id(),
                    sec_uuid
                );
                success = false;
                break;
            }

            debug!(
                "activating secondary connection '{} ({})' for base connection '{} ({})'",
                secondary.id(),
                sec_uuid,
                profile.id(),
                profile.uuid()
            );
            match self.manager.activate(
                secondary.clone(),
                request_path.as_deref(),
                Some(device.clone()),
                subject,
                ActivationType::Full,
            ) {
                Ok(session) => launched.push(session),
                Err(e) => {
                    warn!(
                        "secondary connection '{} ({})' auto-activation failed: {}",
                        secondary.id(),
                        sec_uuid,
                        e
                    );
                    success = false;
                    break;
                }
            }
        }

        if success {
            if !launched.is_empty() {
                self.pending_secondaries.push(PendingSecondaries {
                    device: device.clone(),
                    sessions: launched,
                });
            }
            true
        } else {
            for session in launched {
                if let Err(e) = self
                    .manager
                    .deactivate(session.path(), DeviceStateReason::SecondaryConnectionFailed)
                {
                    info!(
                        "error releasing partially launched secondary '{}': {}",
                        session.path(),
                        e
                    );
                }
            }
            false
        }
    }

    /// Follows a secondary's outcome: removes it from its base's entry on
    /// success, promoting the base once the set empties; discards the
    /// whole entry and fails the base on failure.
    pub(crate) fn process_secondaries(&mut self, session: &Arc<dyn ActiveSession>, connected: bool) {
        let path = session.path().to_string();

        let mut index = 0;
        while index < self.pending_secondaries.len() {
            let position = self.pending_secondaries[index]
                .sessions
                .iter()
                .position(|candidate| candidate.path() == path);
            let Some(position) = position else {
                index += 1;
                continue;
            };

            let base = self.pending_secondaries[index].device.clone();

            if connected {
                debug!(
                    "secondary connection '{}' succeeded; active path '{}'",
                    session.profile().id(),
                    path
                );

                self.pending_secondaries[index].sessions.remove(position);
                if self.pending_secondaries[index].sessions.is_empty() {
                    // Nothing left to wait for on this base.
                    self.pending_secondaries.remove(index);
                    if base.state() == DeviceState::Secondaries {
                        base.queue_state_change(DeviceState::Activated, DeviceStateReason::None);
                    }
                } else {
                    index += 1;
                }
            } else {
                debug!(
                    "secondary connection '{}' failed; active path '{}'",
                    session.profile().id(),
                    path
                );

                // One failure ends the whole batch.
                self.pending_secondaries.remove(index);
                if matches!(
                    base.state(),
                    DeviceState::Secondaries | DeviceState::Activated
                ) {
                    base.queue_state_change(
                        DeviceState::Failed,
                        DeviceStateReason::SecondaryConnectionFailed,
                    );
                }
            }
        }
    }

    pub(crate) fn on_session_state_changed(&mut self, session: &Arc<dyn ActiveSession>) {
        match session.state() {
            ActiveSessionState::Activated => self.process_secondaries(session, true),
            ActiveSessionState::Deactivated => self.process_secondaries(session, false),
            _ => {}
        }
    }

    pub(crate) fn on_vpn_state_changed(
        &mut self,
        session: &Arc<dyn ActiveSession>,
        new_state: VpnSessionState,
        old_state: VpnSessionState,
    ) {
        if new_state == VpnSessionState::Activated {
            self.vpn_session_activated(session);
        } else if new_state >= VpnSessionState::Failed
            && (VpnSessionState::IpConfigGet..=VpnSessionState::Activated).contains(&old_state)
        {
            // Only clean up IP and DNS state the session actually reached.
            self.vpn_session_deactivated(session);
        }
    }

    fn vpn_session_activated(&mut self, session: &Arc<dyn ActiveSession>) {
        self.dns.begin_updates("vpn-activated");

        if let Some(vpn) = session.as_vpn() {
            let iface = vpn.ip_iface();
            if let Some(config) = vpn.ip_config(AddrFamily::V4) {
                self.dns.add_ip4_config(&iface, config, DnsConfigTag::Vpn);
            }
            if let Some(config) = vpn.ip_config(AddrFamily::V6) {
                self.dns.add_ip6_config(&iface, config, DnsConfigTag::Vpn);
            }
        }

        self.update_routing_and_dns(true);

        self.dns.end_updates("vpn-activated");
    }

    fn vpn_session_deactivated(&mut self, session: &Arc<dyn ActiveSession>) {
        self.dns.begin_updates("vpn-deactivated");

        if let Some(vpn) = session.as_vpn() {
            if let Some(config) = vpn.ip_config(AddrFamily::V4) {
                self.dns.remove_ip4_config(&config);
            }
            if let Some(config) = vpn.ip_config(AddrFamily::V6) {
                self.dns.remove_ip6_config(&config);
            }
        }

        self.update_routing_and_dns(true);

        self.dns.end_updates("vpn-deactivated");
    }

    /// Reconnects a VPN that failed after having been connected, with no
    /// device override and the session's own subject.
    pub(crate) fn on_vpn_retry_after_failure(&mut self, session: &Arc<dyn ActiveSession>) {
        let profile = session.profile();
        if let Err(e) = self.manager.activate(
            profile.clone(),
            None,
            None,
            session.subject(),
            ActivationType::Full,
        ) {
            warn!("VPN '{}' reconnect failed: {}", profile.id(), e);
        }
    }
}
