//! Retry bookkeeping and profile event handling
//!
//! Retry counters and blocked reasons live in the settings store; the
//! engine updates them on device state transitions and re-enables profiles
//! on the events that may have fixed the underlying failure (secret agent
//! registration, carrier up, user edits, wake from sleep).

use super::Policy;
use crate::device::Device;
use crate::events::PolicyEvent;
use crate::manager::Manager;
use crate::platform::Platform;
use crate::profile::Profile;
use crate::scheduler::TaskScheduler;
use crate::session::ActiveSession;
use crate::settings::Settings;
use crate::types::{ActiveSessionState, BlockedReason, DeviceStateReason};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

impl Policy {
    /// Re-enables autoconnect for all profiles, or for the profiles
    /// compatible with `device` when one is given.
    pub(crate) fn reset_autoconnect_all(&self, device: Option<&Arc<dyn Device>>) {
        match device {
            Some(device) => debug!(
                "re-enabling autoconnect for all connections on {}",
                device.iface()
            ),
            None => debug!("re-enabling autoconnect for all connections"),
        }

        for profile in self.settings.profiles_sorted() {
            if device.map_or(true, |d| d.check_profile_compatible(&*profile)) {
                profile.reset_autoconnect_retries();
                profile.set_blocked_reason(BlockedReason::None);
            }
        }
    }

    /// Re-enables only the profiles blocked for missing secrets
    pub(crate) fn reset_autoconnect_for_failed_secrets(&self) {
        debug!("re-enabling autoconnect for all connections with failed secrets");

        for profile in self.settings.profiles_sorted() {
            if profile.blocked_reason() == BlockedReason::NoSecrets {
                profile.reset_autoconnect_retries();
                profile.set_blocked_reason(BlockedReason::None);
            }
        }
    }

    /// Blocks autoconnect of every profile compatible with `device`.
    ///
    /// Only software devices need profile-level blocking: their device
    /// object may be destroyed and recreated, losing any device-level
    /// autoconnect state.
    pub(crate) fn block_autoconnect_for_device(&self, device: &Arc<dyn Device>) {
        debug!(
            "blocking autoconnect for all connections on {}",
            device.iface()
        );

        if !device.is_software() {
            return;
        }

        for profile in self.settings.profiles_sorted() {
            if device.check_profile_compatible(&*profile) {
                profile.set_blocked_reason(BlockedReason::UserRequested);
            }
        }
    }

    /// Arms the shared retry-reset timer for `profile`'s retry time, if no
    /// timer is pending yet.
    pub(crate) fn schedule_retry_reset(&mut self, profile: &Arc<dyn Profile>) {
        if self.reset_retry_timer.is_some() {
            return;
        }

        let retry_time = profile.autoconnect_retry_time();
        if retry_time == 0 {
            warn!(
                "connection '{}' ran out of retries without a retry time",
                profile.id()
            );
        }
        let delay = (retry_time - self.platform.monotonic_seconds()).max(0);
        self.reset_retry_timer = Some(self.scheduler.schedule_after(
            Duration::from_secs(delay as u64),
            PolicyEvent::ResetRetryTimer,
        ));
    }

    /// Timer body: restore the counter of every profile whose retry time
    /// has passed, re-arm for the next earliest one, and re-check the
    /// fleet if anything changed.
    pub(crate) fn on_reset_retry_timer(&mut self) {
        self.reset_retry_timer = None;

        let now = self.platform.monotonic_seconds();
        let mut earliest: i64 = 0;
        let mut changed = false;

        for profile in self.settings.profiles_sorted() {
            let retry_time = profile.autoconnect_retry_time();
            if retry_time == 0 {
                continue;
            }

            if retry_time <= now {
                profile.reset_autoconnect_retries();
                changed = true;
            } else if earliest == 0 || earliest > retry_time {
                earliest = retry_time;
            }
        }

        if earliest != 0 {
            self.reset_retry_timer = Some(self.scheduler.schedule_after(
                Duration::from_secs((earliest - now) as u64),
                PolicyEvent::ResetRetryTimer,
            ));
        }

        if changed {
            self.schedule_activate_all();
        }
    }

    /// A master device entered prepare: re-enable its slave profiles and
    /// re-check the fleet so they activate alongside it.
    pub(crate) fn activate_slave_profiles(&mut self, device: &Arc<dyn Device>) {
        let master_iface = device.iface().to_string();
        let master_uuid = device.active_profile().map(|p| p.uuid().to_string());
        let internal = device
            .active_subject()
            .map_or(false, |subject| subject.is_internal());

        // An internal activation already went through this path on its own
        // master; only user-initiated ones pull their slaves in.
        if !internal {
            for profile in self.settings.profiles_sorted() {
                let Some(master) = profile.master() else {
                    continue;
                };
                if master == master_iface || Some(&master) == master_uuid.as_ref() {
                    profile.reset_autoconnect_retries();
                }
            }
        }

        self.schedule_activate_all();
    }

    pub(crate) fn on_sleeping_changed(&self) {
        // Reset retries on all profiles so they are re-checked on wakeup.
        if self.manager.is_sleeping() || !self.manager.networking_enabled() {
            self.reset_autoconnect_all(None);
        }
    }

    pub(crate) fn on_secret_agent_registered(&mut self) {
        // The new agent may provide the secrets whose absence blocked
        // these profiles.
        self.reset_autoconnect_for_failed_secrets();
        self.schedule_activate_all();
    }

    pub(crate) fn on_profile_updated(&mut self, profile: &Arc<dyn Profile>, by_user: bool) {
        if by_user {
            let bound_device = self.manager.devices().into_iter().find(|device| {
                device
                    .active_profile()
                    .map(|p| p.uuid() == profile.uuid())
                    .unwrap_or(false)
            });
            if let Some(device) = bound_device {
                device.reapply_settings();
            }

            profile.reset_autoconnect_retries();
        }

        self.schedule_activate_all();
    }

    pub(crate) fn on_profile_visibility_changed(&mut self, profile: &Arc<dyn Profile>) {
        if profile.is_visible() {
            self.schedule_activate_all();
        } else {
            self.deactivate_if_active(profile);
        }
    }

    /// Tears down every session still using `profile`
    pub(crate) fn deactivate_if_active(&self, profile: &Arc<dyn Profile>) {
        for session in self.manager.active_sessions() {
            if session.profile().uuid() != profile.uuid() {
                continue;
            }
            if session.state() > ActiveSessionState::Activated {
                continue;
            }
            if let Err(e) = self
                .manager
                .deactivate(session.path(), DeviceStateReason::ConnectionRemoved)
            {
                info!(
                    "connection '{}' disappeared, but error deactivating it: {}",
                    profile.id(),
                    e
                );
            }
        }
    }
}
