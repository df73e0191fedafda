//! Auto-activation scheduling and profile selection
//!
//! Decision requests are coalesced per device: at most one pending check
//! exists per device, and the actual decision runs from a deferred task so
//! bursts of triggering events collapse into a single pass.

use super::Policy;
use crate::device::{Device, DeviceId};
use crate::events::PolicyEvent;
use crate::manager::Manager;
use crate::platform::Platform;
use crate::profile::{cmp_by_autoconnect_priority, Profile};
use crate::scheduler::{TaskHandle, TaskScheduler};
use crate::session::ActiveSession;
use crate::settings::Settings;
use crate::types::{ActivationType, Subject};
use std::sync::Arc;
use tracing::{debug, info};

/// Pending-action marker placed on a device while a decision is queued
pub(crate) const PENDING_ACTION_AUTOACTIVATE: &str = "autoactivate";

/// A queued auto-activation decision for one device
pub(crate) struct PendingActivation {
    pub(crate) device: Arc<dyn Device>,
    pub(crate) task: TaskHandle,
}

impl Policy {
    /// Queues an auto-activation check for `device` unless one is already
    /// queued or the device cannot auto-activate right now.
    pub(crate) fn schedule_activate_check(&mut self, device: &Arc<dyn Device>) {
        if self.manager.is_sleeping() {
            return;
        }
        if !device.is_enabled() {
            return;
        }
        if !device.autoconnect_allowed() {
            return;
        }
        if self.pending_activations.contains_key(&device.id()) {
            return;
        }
        if self
            .manager
            .active_sessions()
            .iter()
            .any(|session| session.device().map(|d| d.id()) == Some(device.id()))
        {
            return;
        }

        device.add_pending_action(PENDING_ACTION_AUTOACTIVATE);

        let task = self
            .scheduler
            .schedule_idle(PolicyEvent::AutoActivate(device.id()));
        self.pending_activations.insert(
            device.id(),
            PendingActivation {
                device: device.clone(),
                task,
            },
        );
    }

    /// Cancels a queued auto-activation check before it fires
    pub(crate) fn clear_pending_activate_check(&mut self, device_id: DeviceId) {
        if let Some(pending) = self.pending_activations.remove(&device_id) {
            pending.task.cancel();
            pending.device.remove_pending_action(PENDING_ACTION_AUTOACTIVATE);
        }
    }

    /// Deferred task body: run the decider for one device, then drain the
    /// pending entry and its readiness marker.
    pub(crate) fn on_auto_activate(&mut self, device_id: DeviceId) {
        let device = match self.pending_activations.get(&device_id) {
            Some(pending) => pending.device.clone(),
            None => return,
        };

        self.auto_activate_device(&device);

        if let Some(pending) = self.pending_activations.remove(&device_id) {
            pending.device.remove_pending_action(PENDING_ACTION_AUTOACTIVATE);
        }
    }

    /// Picks a profile for `device` and asks the manager to activate it.
    ///
    /// An adoptable link (the device names a profile to assume) wins over
    /// the priority scan. Activation failures are logged and dropped;
    /// retry bookkeeping happens through subsequent device state changes.
    fn auto_activate_device(&mut self, device: &Arc<dyn Device>) {
        // TODO: a device already activating is left alone even if a
        // higher-priority profile has appeared; preempting it would need a
        // deactivate/activate pair here.
        if device.has_active_request() {
            return;
        }

        let mut specific_object: Option<String> = None;
        let mut activation_type = ActivationType::Full;

        let best_profile = match self.find_profile_to_assume(device) {
            Some(profile) => {
                activation_type = ActivationType::Assume;
                Some(profile)
            }
            None => {
                let mut candidates = self.manager.activatable_profiles();
                // Stable sort: equal-priority profiles keep their
                // recency order.
                candidates.sort_by(cmp_by_autoconnect_priority);

                let mut best = None;
                for candidate in candidates {
                    if !candidate.can_autoconnect() {
                        continue;
                    }
                    if let Some(found) = device.can_auto_connect(&*candidate) {
                        specific_object = found.specific_object;
                        best = Some(candidate);
                        break;
                    }
                }
                best
            }
        };

        if let Some(profile) = best_profile {
            info!("auto-activating connection '{}'", profile.id());
            if let Err(e) = self.manager.activate(
                profile.clone(),
                specific_object.as_deref(),
                Some(device.clone()),
                Subject::Internal,
                activation_type,
            ) {
                info!("connection '{}' auto-activation failed: {}", profile.id(), e);
            }
        }
    }

    /// Checks whether the device presents an adoptable link configuration.
    ///
    /// The profile named by the device's assume hint is accepted only when
    /// it exists, is not bound to another device, is available here for a
    /// user request, and the kernel link agrees with the profile's slave
    /// role: a slave profile needs the link still enslaved, a non-slave
    /// profile needs the link up and not enslaved.
    fn find_profile_to_assume(&self, device: &Arc<dyn Device>) -> Option<Arc<dyn Profile>> {
        let uuid = device.take_assume_uuid()?;

        let profile = self.settings.profile_by_uuid(uuid)?;

        if self.manager.profile_device(&*profile).is_some() {
            // Already active on another device.
            return None;
        }

        if !device.check_profile_available(&*profile) {
            return None;
        }

        let link = self.platform.link_get(device.ifindex())?;

        if profile.is_slave() {
            if link.master <= 0 {
                return None;
            }
        } else if link.master > 0 || !link.up {
            return None;
        }

        debug!(
            "adopting existing configuration of {} with connection '{}'",
            device.iface(),
            profile.id()
        );
        Some(profile)
    }

    /// Re-checks auto-activation for every device once the current event
    /// batch has settled. Always restarts the idle task so other queued
    /// events are handled first.
    pub(crate) fn schedule_activate_all(&mut self) {
        if let Some(task) = self.activate_all_task.take() {
            task.cancel();
        }
        self.activate_all_task = Some(self.scheduler.schedule_idle(PolicyEvent::ActivateAll));
    }

    pub(crate) fn on_activate_all(&mut self) {
        self.activate_all_task = None;
        for device in self.manager.devices() {
            self.schedule_activate_check(&device);
        }
    }
}
